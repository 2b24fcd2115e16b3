//! Dashboard prefetch: fan out the independent per-resource fetches, bound the
//! whole group by a deadline, and keep one failure from sinking the others.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use tokio::sync::watch;
use tracing::{error, info, warn};

use scholar_types::{AnnouncementPage, Payment, Profile, UploadedResult};

use crate::error::ClientError;
use crate::services::Services;
use crate::state::announcements::DEFAULT_PAGE_SIZE;
use crate::state::{
    AnnouncementsHolder, PaymentsHolder, ProfileHolder, ResultsHolder, SessionHolder,
};

pub const ALL_FAILED_MESSAGE: &str = "Failed to load user data. Please refresh or try again later.";

/// The aggregate loading flag and error banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStatus {
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Shared view of the aggregate [`LoadStatus`]. Holders consult it to defer
/// their own fetches while a prefetch is running.
#[derive(Clone)]
pub struct LoadGate {
    tx: Arc<watch::Sender<LoadStatus>>,
}

impl Default for LoadGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadGate {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(LoadStatus::default())),
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.tx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.tx.borrow().is_loading
    }

    /// Resolve once no prefetch is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close under us.
        let _ = rx.wait_for(|s| !s.is_loading).await;
    }

    pub(crate) fn start(&self) {
        self.tx.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    pub(crate) fn finish(&self, error: Option<String>) {
        self.tx.send_modify(|s| {
            s.is_loading = false;
            s.error = error;
        });
    }

    fn clear_loading(&self) {
        self.tx.send_if_modified(|s| std::mem::replace(&mut s.is_loading, false));
    }
}

/// How one task ended.
#[derive(Debug)]
pub enum Outcome<T> {
    Ready(T),
    /// The task failed; carries the user-facing message.
    Failed(String),
    /// Still running at the deadline, and cancelled.
    Pending,
}

#[derive(Debug)]
pub struct Settled<T> {
    pub label: &'static str,
    pub outcome: Outcome<T>,
}

#[derive(Debug)]
pub struct JoinReport<T> {
    /// In the order the tasks were given.
    pub settled: Vec<Settled<T>>,
    pub timed_out: bool,
}

impl<T> JoinReport<T> {
    pub fn all_failed(&self) -> bool {
        !self.settled.is_empty()
            && self
                .settled
                .iter()
                .all(|s| matches!(s.outcome, Outcome::Failed(_)))
    }

    pub fn ready_count(&self) -> usize {
        self.settled
            .iter()
            .filter(|s| matches!(s.outcome, Outcome::Ready(_)))
            .count()
    }
}

pub type LabeledTask<'a, T> = (&'static str, BoxFuture<'a, Result<T, ClientError>>);

/// Run every task concurrently until all settle or `deadline` passes.
///
/// A failing task is logged and recorded as [`Outcome::Failed`]; it never
/// aborts the others. Tasks still running at the deadline are dropped and
/// recorded as [`Outcome::Pending`].
pub async fn join_with_deadline<'a, T>(
    tasks: Vec<LabeledTask<'a, T>>,
    deadline: Duration,
) -> JoinReport<T> {
    let labels: Vec<&'static str> = tasks.iter().map(|(label, _)| *label).collect();
    let mut outcomes: Vec<Outcome<T>> = labels.iter().map(|_| Outcome::Pending).collect();

    let mut running: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(idx, (_, fut))| async move { (idx, fut.await) })
        .collect();

    let sleep = tokio::time::sleep(deadline);
    tokio::pin!(sleep);

    let mut timed_out = false;
    loop {
        tokio::select! {
            biased;
            next = running.next() => match next {
                Some((idx, Ok(value))) => outcomes[idx] = Outcome::Ready(value),
                Some((idx, Err(e))) => {
                    warn!("Loading {} failed: {}", labels[idx], e);
                    outcomes[idx] = Outcome::Failed(e.user_message());
                }
                None => break,
            },
            _ = &mut sleep => {
                timed_out = true;
                break;
            }
        }
    }
    drop(running);

    JoinReport {
        settled: labels
            .into_iter()
            .zip(outcomes)
            .map(|(label, outcome)| Settled { label, outcome })
            .collect(),
        timed_out,
    }
}

/// One prefetched resource, routed to its holder.
pub enum Prefetched {
    Results(Vec<UploadedResult>),
    Profile(Profile),
    Announcements(AnnouncementPage),
    Payments(Vec<Payment>),
}

/// Clears the loading flag however `load_all` exits, including when its
/// future is dropped mid-flight.
struct LoadingGuard<'a> {
    gate: &'a LoadGate,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.gate.clear_loading();
    }
}

pub struct UserDataLoader {
    services: Services,
    session: Arc<SessionHolder>,
    profile: Arc<ProfileHolder>,
    payments: Arc<PaymentsHolder>,
    results: Arc<ResultsHolder>,
    announcements: Arc<AnnouncementsHolder>,
    gate: LoadGate,
    timeout: Duration,
}

impl UserDataLoader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        services: Services,
        session: Arc<SessionHolder>,
        profile: Arc<ProfileHolder>,
        payments: Arc<PaymentsHolder>,
        results: Arc<ResultsHolder>,
        announcements: Arc<AnnouncementsHolder>,
        gate: LoadGate,
        timeout: Duration,
    ) -> Self {
        Self {
            services,
            session,
            profile,
            payments,
            results,
            announcements,
            gate,
            timeout,
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.gate.status()
    }

    /// Prefetch results, profile, announcements and payments for the current
    /// session. No retry: calling again starts over.
    pub async fn load_all(&self) -> LoadStatus {
        if !self.session.is_authenticated() {
            self.gate.finish(None);
            return self.gate.status();
        }

        self.gate.start();
        let _guard = LoadingGuard { gate: &self.gate };

        let services = &self.services;
        let tasks: Vec<LabeledTask<'_, Prefetched>> = vec![
            (
                "results",
                async move { services.results.list().await.map(Prefetched::Results) }.boxed(),
            ),
            (
                "profile",
                async move {
                    services.profile.fetch_profile().await.map(Prefetched::Profile)
                }
                .boxed(),
            ),
            (
                "announcements",
                async move {
                    services
                        .announcements
                        .list(0, DEFAULT_PAGE_SIZE)
                        .await
                        .map(Prefetched::Announcements)
                }
                .boxed(),
            ),
            (
                "payments",
                async move { services.payments.history().await.map(Prefetched::Payments) }.boxed(),
            ),
        ];

        let report = join_with_deadline(tasks, self.timeout).await;

        let all_failed = report.all_failed();
        let loaded = report.ready_count();
        let timed_out = report.timed_out;
        for settled in report.settled {
            if let Outcome::Ready(value) = settled.outcome {
                self.apply(value);
            }
        }

        let error = if timed_out {
            Some(format!(
                "Data loading error: Data loading timeout after {} seconds",
                self.timeout.as_secs()
            ))
        } else if all_failed {
            Some(ALL_FAILED_MESSAGE.to_string())
        } else {
            None
        };

        match &error {
            Some(msg) => error!("{}", msg),
            None => info!("User data loaded ({} of 4 sources)", loaded),
        }

        self.gate.finish(error);
        self.gate.status()
    }

    fn apply(&self, value: Prefetched) {
        match value {
            Prefetched::Results(list) => self.results.apply(list),
            Prefetched::Profile(profile) => self.profile.apply(profile),
            Prefetched::Announcements(page) => self.announcements.apply(page),
            Prefetched::Payments(list) => self.payments.apply(list),
        }
    }

    /// Forget the last banner, e.g. on logout.
    pub fn reset(&self) {
        self.gate.finish(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fakes::*;
    use crate::storage::LocalStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn task<'a, T: Send + 'a>(
        label: &'static str,
        delay: Duration,
        result: Result<T, ClientError>,
    ) -> LabeledTask<'a, T> {
        (
            label,
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                result
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_keeps_input_order_regardless_of_completion() {
        let report = join_with_deadline(
            vec![
                task("slow", Duration::from_secs(3), Ok(1)),
                task("fast", Duration::from_secs(1), Ok(2)),
            ],
            Duration::from_secs(15),
        )
        .await;

        assert!(!report.timed_out);
        assert_eq!(report.settled[0].label, "slow");
        assert!(matches!(report.settled[0].outcome, Outcome::Ready(1)));
        assert!(matches!(report.settled[1].outcome, Outcome::Ready(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_isolates_failures() {
        let report = join_with_deadline(
            vec![
                task("ok", Duration::from_millis(10), Ok(1)),
                task("broken", Duration::from_millis(5), Err(server_error())),
            ],
            Duration::from_secs(15),
        )
        .await;

        assert!(!report.all_failed());
        assert!(matches!(report.settled[0].outcome, Outcome::Ready(1)));
        assert!(matches!(
            &report.settled[1].outcome,
            Outcome::Failed(msg) if msg == "Internal server error"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_marks_stragglers_pending_at_deadline() {
        let start = tokio::time::Instant::now();
        let report = join_with_deadline(
            vec![
                task("quick", Duration::from_secs(1), Ok(1)),
                task("stuck", Duration::from_secs(60), Ok(2)),
            ],
            Duration::from_secs(15),
        )
        .await;

        assert!(report.timed_out);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert!(matches!(report.settled[0].outcome, Outcome::Ready(1)));
        assert!(matches!(report.settled[1].outcome, Outcome::Pending));
    }

    #[tokio::test]
    async fn test_join_of_nothing_is_immediate() {
        let report: JoinReport<()> = join_with_deadline(vec![], Duration::from_secs(15)).await;
        assert!(!report.timed_out);
        assert!(!report.all_failed());
    }

    #[tokio::test]
    async fn test_loading_guard_clears_flag_on_drop() {
        let gate = LoadGate::new();
        gate.start();
        {
            let _guard = LoadingGuard { gate: &gate };
            assert!(gate.is_loading());
        }
        assert!(!gate.is_loading());
    }

    struct Rig {
        loader: UserDataLoader,
        gate: LoadGate,
        profile: Arc<ProfileHolder>,
        payments: Arc<PaymentsHolder>,
        results: Arc<ResultsHolder>,
        announcements: Arc<AnnouncementsHolder>,
        fake_profile: Arc<FakeProfile>,
        fake_payments: Arc<FakePayments>,
        fake_results: Arc<FakeResults>,
        fake_announcements: Arc<FakeAnnouncements>,
    }

    async fn rig(signed_in: bool) -> Rig {
        let store = LocalStore::in_memory();
        let gate = LoadGate::new();
        let fake_auth = Arc::new(FakeAuth::default());
        fake_auth.login.push(Ok(scholar_types::api::LoginResponse {
            message: String::new(),
            token: "tok".into(),
            user: session_user(),
        }));
        let fake_profile = Arc::new(FakeProfile::default());
        let fake_payments = Arc::new(FakePayments::default());
        let fake_results = Arc::new(FakeResults::default());
        let fake_announcements = Arc::new(FakeAnnouncements::default());
        let services = Services {
            auth: fake_auth.clone(),
            profile: fake_profile.clone(),
            payments: fake_payments.clone(),
            results: fake_results.clone(),
            announcements: fake_announcements.clone(),
            settings: Arc::new(FakeSettings::default()),
            documents: Arc::new(FakeDocuments::default()),
        };

        let session = Arc::new(SessionHolder::new(services.auth.clone(), store.clone()));
        if signed_in {
            session.login("asha@example.com", "Str0ng!pass").await.unwrap();
        }
        let profile = Arc::new(ProfileHolder::new(services.profile.clone(), gate.clone()));
        let payments = Arc::new(PaymentsHolder::new(
            services.payments.clone(),
            store.clone(),
            gate.clone(),
        ));
        let results = Arc::new(ResultsHolder::new(services.results.clone(), gate.clone()));
        let announcements = Arc::new(AnnouncementsHolder::new(
            services.announcements.clone(),
            gate.clone(),
        ));
        let loader = UserDataLoader::new(
            services,
            session,
            profile.clone(),
            payments.clone(),
            results.clone(),
            announcements.clone(),
            gate.clone(),
            Duration::from_secs(15),
        );
        Rig {
            loader,
            gate,
            profile,
            payments,
            results,
            announcements,
            fake_profile,
            fake_payments,
            fake_results,
            fake_announcements,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_sources_succeed() {
        let rig = rig(true).await;
        rig.fake_results
            .list
            .push_delayed(Duration::from_secs(4), Ok(vec![result("sem1.pdf", 10)]));
        rig.fake_profile.fetch.push_delayed(Duration::from_secs(1), Ok(profile()));
        rig.fake_announcements
            .list
            .push_delayed(Duration::from_secs(2), Ok(page(vec![announcement(1, false)])));
        rig.fake_payments
            .history
            .push_delayed(Duration::from_secs(3), Ok(vec![payment("123456789012")]));

        let status = rig.loader.load_all().await;

        assert_eq!(status, LoadStatus::default());
        assert!(!rig.gate.is_loading());
        assert_eq!(rig.results.snapshot().value.len(), 1);
        assert!(rig.profile.snapshot().value.is_some());
        assert_eq!(rig.announcements.unread_count(), 1);
        assert_eq!(rig.payments.snapshot().value.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_shows_no_banner() {
        let rig = rig(true).await;
        rig.fake_results.list.push(Err(server_error()));
        rig.fake_profile.fetch.push(Ok(profile()));
        rig.fake_announcements.list.push(Err(server_error()));
        rig.fake_payments.history.push(Ok(vec![]));

        let status = rig.loader.load_all().await;

        assert!(status.error.is_none());
        assert!(!status.is_loading);
        assert!(rig.profile.snapshot().value.is_some());
        assert!(rig.results.snapshot().value.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_sets_banner() {
        let rig = rig(true).await;
        rig.fake_results.list.push(Err(server_error()));
        rig.fake_profile.fetch.push(Err(server_error()));
        rig.fake_announcements.list.push(Err(server_error()));
        rig.fake_payments.history.push(Err(server_error()));

        let status = rig.loader.load_all().await;

        assert_eq!(status.error.as_deref(), Some(ALL_FAILED_MESSAGE));
        assert!(!status.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_sets_banner_and_clears_flag() {
        let rig = rig(true).await;
        rig.fake_results.list.push(Ok(vec![]));
        rig.fake_profile
            .fetch
            .push_delayed(Duration::from_secs(20), Ok(profile()));
        rig.fake_announcements.list.push(Ok(page(vec![])));
        rig.fake_payments.history.push(Ok(vec![]));

        let status = rig.loader.load_all().await;

        assert_eq!(
            status.error.as_deref(),
            Some("Data loading error: Data loading timeout after 15 seconds")
        );
        assert!(!status.is_loading);

        // the straggler was cancelled; letting its time pass changes nothing
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rig.profile.snapshot().value.is_none());
        assert!(rig.loader.status().error.is_some());
    }

    #[tokio::test]
    async fn test_without_session_returns_immediately() {
        let rig = rig(false).await;
        let status = rig.loader.load_all().await;
        assert_eq!(status, LoadStatus::default());
        assert_eq!(rig.fake_profile.fetch.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_load_all_clears_flag() {
        let rig = rig(true).await;
        rig.fake_results
            .list
            .push_delayed(Duration::from_secs(10), Ok(vec![]));
        rig.fake_profile.fetch.push(Ok(profile()));
        rig.fake_announcements.list.push(Ok(page(vec![])));
        rig.fake_payments.history.push(Ok(vec![]));

        let saw_loading = AtomicBool::new(false);
        let observe = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            saw_loading.store(rig.gate.is_loading(), Ordering::SeqCst);
        };
        tokio::select! {
            _ = rig.loader.load_all() => panic!("load finished early"),
            _ = async { observe.await; tokio::time::sleep(Duration::from_secs(1)).await } => {}
        }

        assert!(saw_loading.load(Ordering::SeqCst));
        assert!(!rig.gate.is_loading());
    }
}
