use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use scholar_types::AnnouncementPage;

use super::{ResourceCell, Snapshot};
use crate::error::ClientError;
use crate::loader::LoadGate;
use crate::services::AnnouncementsApi;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub struct AnnouncementsHolder {
    api: Arc<dyn AnnouncementsApi>,
    gate: LoadGate,
    cell: ResourceCell<AnnouncementPage>,
}

impl AnnouncementsHolder {
    pub fn new(api: Arc<dyn AnnouncementsApi>, gate: LoadGate) -> Self {
        Self {
            api,
            gate,
            cell: ResourceCell::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot<AnnouncementPage> {
        self.cell.snapshot()
    }

    /// Re-fetch the first page.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.load_page(0, DEFAULT_PAGE_SIZE).await
    }

    pub async fn load_page(&self, page: u32, size: u32) -> Result<(), ClientError> {
        self.cell.begin();
        match self.api.list(page, size).await {
            Ok(page) => {
                self.cell.fill(page);
                Ok(())
            }
            Err(e) => Err(self.cell.fail(e)),
        }
    }

    /// Mark one announcement read. Already read (or not on this page) means
    /// nothing to do.
    pub async fn mark_read(&self, id: Uuid) -> Result<(), ClientError> {
        let unread = self.cell.read(|s| {
            s.value
                .announcements
                .iter()
                .any(|a| a.id == id && !a.read)
        });
        if !unread {
            debug!("Announcement {} already read", id);
            return Ok(());
        }

        if let Err(e) = self.api.mark_read(id).await {
            return Err(self.cell.fail(e));
        }
        self.cell.update(|s| {
            if let Some(a) = s.value.announcements.iter_mut().find(|a| a.id == id) {
                a.read = true;
            }
        });
        Ok(())
    }

    pub fn unread_count(&self) -> usize {
        self.cell
            .read(|s| s.value.announcements.iter().filter(|a| !a.read).count())
    }

    pub async fn ensure_loaded(&self) {
        if self.gate.is_loading() {
            return;
        }
        if !self.cell.is_populated() {
            let _ = self.refresh().await;
        }
    }

    pub(crate) fn apply(&self, page: AnnouncementPage) {
        self.cell.fill(page);
    }

    pub fn clear(&self) {
        self.cell.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fakes::*;

    fn holder() -> (AnnouncementsHolder, Arc<FakeAnnouncements>) {
        let fake = Arc::new(FakeAnnouncements::default());
        (AnnouncementsHolder::new(fake.clone(), LoadGate::new()), fake)
    }

    #[tokio::test]
    async fn test_refresh_and_unread_count() {
        let (holder, fake) = holder();
        fake.list.push(Ok(page(vec![
            announcement(1, false),
            announcement(2, true),
            announcement(3, false),
        ])));

        holder.refresh().await.unwrap();
        assert_eq!(holder.snapshot().value.total, 3);
        assert_eq!(holder.unread_count(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_is_one_way() {
        let (holder, fake) = holder();
        holder.apply(page(vec![announcement(1, false)]));
        fake.mark_read.push(Ok(()));
        let id = announcement(1, false).id;

        holder.mark_read(id).await.unwrap();
        assert_eq!(holder.unread_count(), 0);

        // second call is a no-op locally
        holder.mark_read(id).await.unwrap();
        assert_eq!(fake.mark_read.calls(), 1);
        assert!(holder.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_mark_read_failure_leaves_unread() {
        let (holder, fake) = holder();
        holder.apply(page(vec![announcement(1, false)]));
        fake.mark_read.push(Err(server_error()));

        assert!(holder.mark_read(announcement(1, false).id).await.is_err());
        assert_eq!(holder.unread_count(), 1);
        assert_eq!(
            holder.snapshot().error.as_deref(),
            Some("Internal server error")
        );
    }

    #[tokio::test]
    async fn test_clear_resets_page() {
        let (holder, _) = holder();
        holder.apply(page(vec![announcement(1, false)]));

        holder.clear();
        assert_eq!(holder.snapshot().value, AnnouncementPage::default());
        assert_eq!(holder.unread_count(), 0);
    }
}
