//! Per-resource state holders. Each owns exactly one resource type; nothing
//! else mutates it.

pub mod announcements;
pub mod mentorship;
pub mod messaging;
pub mod payments;
pub mod profile;
pub mod results;
pub mod session;
pub mod settings;

use std::sync::{PoisonError, RwLock};

pub use announcements::AnnouncementsHolder;
pub use mentorship::MentorshipHolder;
pub use messaging::MessagingHolder;
pub use payments::PaymentsHolder;
pub use profile::ProfileHolder;
pub use results::ResultsHolder;
pub use session::SessionHolder;
pub use settings::{PreferenceChange, SettingsHolder};

use crate::error::ClientError;

/// What a holder exposes to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct Slot<T> {
    snapshot: Snapshot<T>,
    /// Set once a value has arrived from the server (directly or prefetched).
    populated: bool,
}

/// Lock-protected snapshot shared by a holder's methods.
pub(crate) struct ResourceCell<T> {
    slot: RwLock<Slot<T>>,
}

impl<T: Clone + Default> ResourceCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                snapshot: Snapshot::default(),
                populated: false,
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.read(Clone::clone)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Snapshot<T>) -> R) -> R {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        f(&slot.snapshot)
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Snapshot<T>) -> R) -> R {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut slot.snapshot)
    }

    pub(crate) fn is_populated(&self) -> bool {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).populated
    }

    pub(crate) fn begin(&self) {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    /// Store a fresh server value and clear loading/error.
    pub(crate) fn fill(&self, value: T) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.snapshot = Snapshot {
            value,
            is_loading: false,
            error: None,
        };
        slot.populated = true;
    }

    /// Record a failure as the user-facing string and hand the error back.
    pub(crate) fn fail(&self, err: ClientError) -> ClientError {
        let message = err.user_message();
        self.update(|s| {
            s.is_loading = false;
            s.error = Some(message);
        });
        err
    }

    pub(crate) fn reset(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.snapshot = Snapshot::default();
        slot.populated = false;
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Scripted service fakes shared by the holder, loader and portal tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use scholar_types::api::{
        ChangePasswordRequest, CompleteProfileRequest, LoginResponse, MessageResponse,
        SetPasswordRequest,
    };
    use scholar_types::*;

    use crate::error::ClientError;
    use crate::services::*;

    pub type Reply<T> = Result<T, ClientError>;

    /// A queue of canned replies, each optionally delayed. When the queue runs
    /// dry the fallback is cloned.
    pub struct Script<T> {
        queue: Mutex<VecDeque<(Duration, Reply<T>)>>,
        fallback: Mutex<Option<T>>,
        pub calls: AtomicUsize,
    }

    impl<T: Clone> Script<T> {
        pub fn new() -> Self {
            Self {
                queue: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn always(value: T) -> Self {
            let s = Self::new();
            *s.fallback.lock().unwrap() = Some(value);
            s
        }

        pub fn push(&self, reply: Reply<T>) -> &Self {
            self.queue.lock().unwrap().push_back((Duration::ZERO, reply));
            self
        }

        pub fn push_delayed(&self, delay: Duration, reply: Reply<T>) -> &Self {
            self.queue.lock().unwrap().push_back((delay, reply));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub async fn next(&self) -> Reply<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.queue.lock().unwrap().pop_front();
            match next {
                Some((delay, reply)) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    reply
                }
                None => self
                    .fallback
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or_else(|| ClientError::Decode("script exhausted".into())),
            }
        }
    }

    pub fn server_error() -> ClientError {
        ClientError::Status {
            status: 500,
            message: "Internal server error".into(),
        }
    }

    pub fn conflict() -> ClientError {
        ClientError::Status {
            status: 409,
            message: "Preferences were changed elsewhere. Please try again.".into(),
        }
    }

    pub fn session_user() -> SessionUser {
        SessionUser {
            id: Uuid::from_u128(1),
            name: "Asha Mwakyusa".into(),
            email: "asha@example.com".into(),
            role: Role::Student,
            profile_completed: true,
        }
    }

    pub fn profile() -> Profile {
        Profile {
            id: Uuid::from_u128(1),
            name: "Asha Mwakyusa".into(),
            sex: "Female".into(),
            email: "asha@example.com".into(),
            mobile_phone: "0712345678".into(),
            university_name: "University of Dar es Salaam".into(),
            university_registration_id: "2022-04-01234".into(),
            program_name: "BSc Computer Engineering".into(),
            enrolled_year: "2022".into(),
            enrollment_status: EnrollmentStatus::Active,
            batch_number: 3,
            profile_image: None,
        }
    }

    pub fn payment(control_number: &str) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            control_number: control_number.into(),
            kind: PaymentKind::University,
            status: PaymentStatus::Pending,
            description: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn result(file_name: &str, size: u64) -> UploadedResult {
        UploadedResult {
            id: file_name.into(),
            file_name: file_name.into(),
            file_size: size,
            file_type: "application/pdf".into(),
            upload_date: chrono::Utc::now(),
            status: ResultStatus::Submitted,
        }
    }

    pub fn announcement(n: u128, read: bool) -> Announcement {
        Announcement {
            id: Uuid::from_u128(100 + n),
            title: format!("Announcement {}", n),
            content: "Details inside".into(),
            sender_name: "Scholarship Office".into(),
            sender_id: Uuid::from_u128(99),
            created_at: chrono::Utc::now(),
            read,
        }
    }

    pub fn document(id: i64, file_name: &str) -> CareerDocument {
        CareerDocument {
            id,
            file_name: file_name.into(),
            file_type: "application/pdf".into(),
            file_size: 2048,
            upload_date: chrono::Utc::now(),
        }
    }

    pub fn page(items: Vec<Announcement>) -> AnnouncementPage {
        let total = items.len() as u64;
        AnnouncementPage {
            announcements: items,
            page: 0,
            size: 10,
            total,
        }
    }

    #[derive(Default)]
    pub struct FakeAuth {
        pub login: Script<LoginResponse>,
        pub me: Script<SessionUser>,
        pub logout: Script<()>,
        pub message: Script<MessageResponse>,
        pub verified_with: Mutex<Vec<(String, String)>>,
        pub completed: Mutex<Vec<CompleteProfileRequest>>,
    }

    impl<T: Clone> Default for Script<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn request_verification(&self, _email: &str) -> Reply<MessageResponse> {
            self.message.next().await
        }
        async fn verify_token(&self, email: &str, token: &str) -> Reply<MessageResponse> {
            self.verified_with
                .lock()
                .unwrap()
                .push((email.to_string(), token.to_string()));
            self.message.next().await
        }
        async fn set_password(&self, _req: &SetPasswordRequest) -> Reply<MessageResponse> {
            self.message.next().await
        }
        async fn complete_profile(&self, req: &CompleteProfileRequest) -> Reply<MessageResponse> {
            self.completed.lock().unwrap().push(req.clone());
            self.message.next().await
        }
        async fn login(&self, _email: &str, _password: &str) -> Reply<LoginResponse> {
            self.login.next().await
        }
        async fn current_user(&self) -> Reply<SessionUser> {
            self.me.next().await
        }
        async fn logout(&self) -> Reply<()> {
            self.logout.next().await
        }
    }

    #[derive(Default)]
    pub struct FakeProfile {
        pub fetch: Script<Profile>,
        pub update: Script<Profile>,
    }

    #[async_trait]
    impl ProfileApi for FakeProfile {
        async fn fetch_profile(&self) -> Reply<Profile> {
            self.fetch.next().await
        }
        async fn update_profile(&self, _update: &ProfileUpdate) -> Reply<Profile> {
            self.update.next().await
        }
    }

    #[derive(Default)]
    pub struct FakePayments {
        pub history: Script<Vec<Payment>>,
        pub submit: Script<MessageResponse>,
        pub submitted: Mutex<Vec<(PaymentKind, String)>>,
    }

    #[async_trait]
    impl PaymentsApi for FakePayments {
        async fn history(&self) -> Reply<Vec<Payment>> {
            self.history.next().await
        }
        async fn submit(&self, kind: PaymentKind, control_number: &str) -> Reply<MessageResponse> {
            self.submitted
                .lock()
                .unwrap()
                .push((kind, control_number.to_string()));
            self.submit.next().await
        }
    }

    #[derive(Default)]
    pub struct FakeResults {
        pub list: Script<Vec<UploadedResult>>,
        pub upload: Script<UploadedResult>,
        pub delete: Script<()>,
        pub download: Script<Vec<u8>>,
    }

    #[async_trait]
    impl ResultsApi for FakeResults {
        async fn list(&self) -> Reply<Vec<UploadedResult>> {
            self.list.next().await
        }
        async fn upload(&self, _file: &ResultFile) -> Reply<UploadedResult> {
            self.upload.next().await
        }
        async fn delete(&self, _file_name: &str) -> Reply<()> {
            self.delete.next().await
        }
        async fn download(&self, _file_name: &str) -> Reply<Vec<u8>> {
            self.download.next().await
        }
    }

    #[derive(Default)]
    pub struct FakeAnnouncements {
        pub list: Script<AnnouncementPage>,
        pub mark_read: Script<()>,
    }

    #[async_trait]
    impl AnnouncementsApi for FakeAnnouncements {
        async fn list(&self, _page: u32, _size: u32) -> Reply<AnnouncementPage> {
            self.list.next().await
        }
        async fn mark_read(&self, _id: Uuid) -> Reply<()> {
            self.mark_read.next().await
        }
    }

    #[derive(Default)]
    pub struct FakeSettings {
        pub fetch: Script<NotificationPreferences>,
        pub update: Script<NotificationPreferences>,
        pub sent: Mutex<Vec<NotificationPreferences>>,
        pub password: Script<MessageResponse>,
    }

    #[async_trait]
    impl SettingsApi for FakeSettings {
        async fn preferences(&self) -> Reply<NotificationPreferences> {
            self.fetch.next().await
        }
        async fn update_notifications(
            &self,
            prefs: &NotificationPreferences,
        ) -> Reply<NotificationPreferences> {
            self.sent.lock().unwrap().push(prefs.clone());
            self.update.next().await
        }
        async fn change_password(&self, _req: &ChangePasswordRequest) -> Reply<MessageResponse> {
            self.password.next().await
        }
    }

    #[derive(Default)]
    pub struct FakeDocuments {
        pub templates: Script<Vec<CareerDocument>>,
        pub download: Script<Vec<u8>>,
    }

    #[async_trait]
    impl DocumentsApi for FakeDocuments {
        async fn resume_templates(&self) -> Reply<Vec<CareerDocument>> {
            self.templates.next().await
        }
        async fn download_document(&self, _id: i64) -> Reply<Vec<u8>> {
            self.download.next().await
        }
    }
}
