//! Drives the real router over HTTP with the portal client: signup, login,
//! dashboard prefetch and every per-resource mutation.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use scholar_api::mailer::CodeMailer;
use scholar_api::storage::FileStorage;
use scholar_api::{AppState, AppStateInner};
use reqwest::multipart::{Form, Part};
use scholar_client::api::{HttpClient, session_events};
use scholar_client::services::{AuthApi, ResultFile};
use scholar_client::state::PreferenceChange;
use scholar_client::storage::{LocalStore, TokenStore};
use scholar_client::routes::{Access, Route};
use scholar_client::{ClientConfig, ClientError, Portal};
use scholar_db::Database;
use scholar_types::api::{CompleteProfileRequest, CreateAnnouncementRequest};
use scholar_types::{Announcement, CareerDocument, PaymentKind};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    fn last_code(&self) -> String {
        self.sent.lock().unwrap().last().unwrap().1.clone()
    }
}

impl CodeMailer for RecordingMailer {
    fn send_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

struct TestServer {
    addr: SocketAddr,
    mailer: Arc<RecordingMailer>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("scholar.db")).unwrap();
        scholar_api::auth::seed_admin(&db, "admin@example.com", "Adm1n!secret").unwrap();
        let storage = FileStorage::new(dir.path().join("results")).await.unwrap();
        let documents = FileStorage::new(dir.path().join("documents")).await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());

        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: "integration-test-secret".into(),
            storage,
            documents,
            mailer: mailer.clone(),
            token_ttl: chrono::Duration::hours(1),
            code_ttl: chrono::Duration::minutes(15),
        });
        let app = scholar_api::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            mailer,
            _dir: dir,
        }
    }

    fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: format!("http://{}/api", self.addr),
            ..ClientConfig::default()
        }
    }

    async fn admin_client(&self) -> HttpClient {
        let tokens = TokenStore::new(LocalStore::in_memory());
        let client = HttpClient::new(&self.config(), tokens.clone(), session_events()).unwrap();
        let login = client
            .login("admin@example.com", "Adm1n!secret")
            .await
            .unwrap();
        tokens.set(&login.token).unwrap();
        client
    }
}

const EMAIL: &str = "asha@example.com";
const PASSWORD: &str = "Str0ng!pass";

fn profile_form() -> CompleteProfileRequest {
    CompleteProfileRequest {
        name: "Asha Mwakyusa".into(),
        sex: "Female".into(),
        mobile_phone: "0712345678".into(),
        university_name: "University of Dar es Salaam".into(),
        university_registration_id: "2022-04-01234".into(),
        program_name: "BSc Computer Engineering".into(),
        enrolled_year: "2022".into(),
        batch_number: 3,
        ..Default::default()
    }
}

async fn signed_up(server: &TestServer) -> Portal {
    let portal = Portal::new(server.config()).unwrap();
    let mut flow = portal.start_signup(EMAIL).await.unwrap();
    flow.verify(&server.mailer.last_code()).await.unwrap();
    flow.set_password(PASSWORD, PASSWORD).await.unwrap();
    flow.complete_profile(profile_form()).await.unwrap();
    portal
}

#[tokio::test]
async fn test_signup_login_and_dashboard() {
    let server = TestServer::start().await;
    let portal = signed_up(&server).await;

    // a verified, password-protected account cannot be re-registered
    let err = portal.start_signup(EMAIL).await.err().unwrap();
    assert!(err.is_conflict());

    let err = portal.session.login(EMAIL, "Wrong!pass1").await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid credentials");

    let user = portal.session.login(EMAIL, PASSWORD).await.unwrap();
    assert!(user.profile_completed);
    assert_eq!(user.name, "Asha Mwakyusa");

    let status = portal.on_session_change(Some(&user)).await;
    assert!(status.error.is_none(), "{:?}", status.error);
    let profile = portal.profile.snapshot().value.unwrap();
    assert_eq!(profile.batch_number, 3);
    assert!(portal.payments.snapshot().value.is_empty());
    assert!(portal.results.snapshot().value.is_empty());
    assert_eq!(portal.announcements.unread_count(), 0);
}

#[tokio::test]
async fn test_payments_results_and_profile() {
    let server = TestServer::start().await;
    let portal = signed_up(&server).await;
    portal.session.login(EMAIL, PASSWORD).await.unwrap();

    portal
        .payments
        .submit(PaymentKind::University, "123456789012")
        .await
        .unwrap();
    portal
        .payments
        .submit(PaymentKind::Nhif, "210987654321")
        .await
        .unwrap();
    let payments = portal.payments.snapshot().value;
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].kind, PaymentKind::Nhif);

    let err = portal
        .payments
        .submit(PaymentKind::University, "123")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let pdf = b"%PDF-1.4\n%test document\n".to_vec();
    let file = ResultFile::new("semester 1.pdf", "application/pdf", pdf.clone());
    let uploaded = portal.results.upload(&file).await.unwrap();
    portal.results.refresh().await.unwrap();
    assert_eq!(portal.results.snapshot().value.len(), 1);
    assert_eq!(
        portal.results.download(&uploaded.file_name).await.unwrap(),
        pdf
    );
    portal.results.delete(&uploaded.file_name).await.unwrap();
    portal.results.refresh().await.unwrap();
    assert!(portal.results.snapshot().value.is_empty());

    let update = scholar_types::ProfileUpdate {
        program_name: Some("MSc Data Science".into()),
        ..Default::default()
    };
    let updated = portal.profile.update(&update).await.unwrap();
    assert_eq!(updated.program_name, "MSc Data Science");
    assert_eq!(updated.name, "Asha Mwakyusa");
}

#[tokio::test]
async fn test_announcements_and_settings() {
    let server = TestServer::start().await;
    let portal = signed_up(&server).await;
    portal.session.login(EMAIL, PASSWORD).await.unwrap();

    let admin = server.admin_client().await;
    let posted: Announcement = admin
        .post_json(
            "/announcements/admin",
            &CreateAnnouncementRequest {
                title: "Stipend schedule".into(),
                content: "Stipends go out on the 5th.".into(),
            },
        )
        .await
        .unwrap();

    portal.announcements.refresh().await.unwrap();
    assert_eq!(portal.announcements.unread_count(), 1);
    portal.announcements.mark_read(posted.id).await.unwrap();
    portal.announcements.refresh().await.unwrap();
    assert_eq!(portal.announcements.unread_count(), 0);

    let before = portal.settings.refresh().await.unwrap();
    let saved = portal
        .settings
        .update(PreferenceChange {
            receive_announcements: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!saved.receive_announcements);
    assert!(saved.version > before.version);

    let err = portal
        .settings
        .change_password("Wrong!pass1", "N3w!password", "N3w!password")
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Current password is incorrect");
    // wrong current password is not a session expiry
    assert!(portal.session.is_authenticated());

    portal
        .settings
        .change_password(PASSWORD, "N3w!password", "N3w!password")
        .await
        .unwrap();
    portal.session.logout().await;
    portal.session.login(EMAIL, "N3w!password").await.unwrap();
}

#[tokio::test]
async fn test_logout_revokes_access() {
    let server = TestServer::start().await;
    let portal = signed_up(&server).await;
    portal.session.login(EMAIL, PASSWORD).await.unwrap();

    portal.session.logout().await;
    assert!(!portal.session.is_authenticated());

    let err = portal.results.refresh().await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_completed_profile_cannot_be_overwritten_anonymously() {
    let server = TestServer::start().await;
    let _portal = signed_up(&server).await;

    let anonymous = HttpClient::new(
        &server.config(),
        TokenStore::new(LocalStore::in_memory()),
        session_events(),
    )
    .unwrap();
    for email in [EMAIL, "admin@example.com"] {
        let form = CompleteProfileRequest {
            email: email.into(),
            name: "Mallory".into(),
            ..profile_form()
        };
        let err = anonymous.complete_profile(&form).await.unwrap_err();
        assert!(err.is_conflict(), "{:?}", err);
        assert_eq!(err.user_message(), "Profile has already been completed");
    }

    let login = anonymous.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(login.user.name, "Asha Mwakyusa");
}

#[tokio::test]
async fn test_resume_templates_published_by_admin() {
    let server = TestServer::start().await;
    let portal = signed_up(&server).await;
    portal.session.login(EMAIL, PASSWORD).await.unwrap();

    let admin = server.admin_client().await;
    let part = Part::bytes(b"%PDF-1.4 template".to_vec())
        .file_name("cv-template.pdf")
        .mime_str("application/pdf")
        .unwrap();
    let uploaded: CareerDocument = admin
        .post_multipart("/documents/admin/upload", Form::new().part("file", part))
        .await
        .unwrap();
    assert_eq!(uploaded.file_name, "cv-template.pdf");
    assert_eq!(uploaded.file_size, 17);

    // students cannot publish
    let part = Part::bytes(b"x".to_vec()).file_name("x.txt");
    let tokens = TokenStore::new(LocalStore::in_memory());
    let student = HttpClient::new(&server.config(), tokens.clone(), session_events()).unwrap();
    tokens.set(&student.login(EMAIL, PASSWORD).await.unwrap().token).unwrap();
    let err = student
        .post_multipart::<CareerDocument>("/documents/admin/upload", Form::new().part("file", part))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Administrator access required");

    assert!(matches!(portal.open(Route::Mentorship, None).await, Access::Allow));
    let templates = portal.mentorship.templates();
    assert_eq!(templates.value.len(), 1);
    assert_eq!(templates.value[0].id, uploaded.id);

    let (name, data) = portal.mentorship.download_template(uploaded.id).await.unwrap();
    assert_eq!(name, "cv-template.pdf");
    assert_eq!(data, b"%PDF-1.4 template");

    let err = portal.mentorship.download_template(uploaded.id + 100).await.unwrap_err();
    assert_eq!(err.user_message(), "Document not found");
}
