use std::sync::{Arc, Weak};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scholar_types::SessionUser;

use crate::api::{HttpClient, SessionEvent, session_events};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::loader::{LoadGate, LoadStatus, UserDataLoader};
use crate::routes::{self, Access, Route};
use crate::services::Services;
use crate::signup::{SignupContext, SignupFlow};
use crate::state::{
    AnnouncementsHolder, MentorshipHolder, MessagingHolder, PaymentsHolder, ProfileHolder,
    ResultsHolder, SessionHolder, SettingsHolder,
};
use crate::storage::{LocalStore, TokenStore};

/// Everything the portal front end talks to, wired together.
pub struct Portal {
    config: ClientConfig,
    services: Services,
    events: broadcast::Sender<SessionEvent>,
    gate: LoadGate,
    loader: UserDataLoader,
    pub session: Arc<SessionHolder>,
    pub profile: Arc<ProfileHolder>,
    pub payments: Arc<PaymentsHolder>,
    pub results: Arc<ResultsHolder>,
    pub announcements: Arc<AnnouncementsHolder>,
    pub settings: Arc<SettingsHolder>,
    pub messaging: Arc<MessagingHolder>,
    pub mentorship: Arc<MentorshipHolder>,
}

impl Portal {
    /// Build a portal speaking HTTP to `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let store = match &config.store_path {
            Some(path) => LocalStore::open(path)?,
            None => LocalStore::in_memory(),
        };
        let events = session_events();
        let client = HttpClient::new(&config, TokenStore::new(store.clone()), events.clone())?;
        Ok(Self::from_parts(config, store, Services::http(client), events))
    }

    /// Assemble from pre-built services. `events` must be the channel the
    /// services report expired sessions on.
    pub fn from_parts(
        config: ClientConfig,
        store: LocalStore,
        services: Services,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let gate = LoadGate::new();
        let session = Arc::new(SessionHolder::new(services.auth.clone(), store.clone()));
        let profile = Arc::new(ProfileHolder::new(services.profile.clone(), gate.clone()));
        let payments = Arc::new(PaymentsHolder::new(
            services.payments.clone(),
            store,
            gate.clone(),
        ));
        let results = Arc::new(ResultsHolder::new(services.results.clone(), gate.clone()));
        let announcements = Arc::new(AnnouncementsHolder::new(
            services.announcements.clone(),
            gate.clone(),
        ));
        let settings = Arc::new(SettingsHolder::new(services.settings.clone()));
        let mentorship = Arc::new(MentorshipHolder::new(services.documents.clone()));
        let loader = UserDataLoader::new(
            services.clone(),
            session.clone(),
            profile.clone(),
            payments.clone(),
            results.clone(),
            announcements.clone(),
            gate.clone(),
            config.load_timeout,
        );

        Self {
            config,
            services,
            events,
            gate,
            loader,
            session,
            profile,
            payments,
            results,
            announcements,
            settings,
            messaging: Arc::new(MessagingHolder::new()),
            mentorship,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn load_status(&self) -> LoadStatus {
        self.gate.status()
    }

    /// Sign-in prefetches the dashboard; sign-out wipes every holder.
    pub async fn on_session_change(&self, user: Option<&SessionUser>) -> LoadStatus {
        match user {
            Some(user) => {
                debug!("Session acquired for {}", user.email);
                self.messaging.seed_for(user);
                self.loader.load_all().await
            }
            None => {
                self.clear_all();
                self.load_status()
            }
        }
    }

    /// Re-run the dashboard prefetch.
    pub async fn refresh(&self) -> LoadStatus {
        self.loader.load_all().await
    }

    /// Pick up a persisted session and, if one survives, prefetch for it.
    pub async fn restore(&self) -> Option<SessionUser> {
        let user = self.session.restore().await?;
        self.on_session_change(Some(&user)).await;
        Some(user)
    }

    pub fn clear_all(&self) {
        self.profile.clear();
        self.payments.clear();
        self.results.clear();
        self.announcements.clear();
        self.settings.clear();
        self.messaging.clear();
        self.mentorship.clear();
        self.loader.reset();
        info!("Cleared cached portal data");
    }

    pub fn guard(&self, route: Route, signup: Option<&SignupContext>) -> Access {
        routes::guard(route, self.session.current().as_ref(), signup)
    }

    /// Show a page: check the guard, then make sure the resource the page
    /// displays is loaded. A prefetch in flight is waited out instead of
    /// racing it with a second fetch.
    pub async fn open(&self, route: Route, signup: Option<&SignupContext>) -> Access {
        let access = self.guard(route, signup);
        if access != Access::Allow {
            return access;
        }

        if self.gate.is_loading() {
            debug!("Opening {} after the running prefetch", route);
            self.gate.wait_idle().await;
        }
        match route {
            Route::Profile => self.profile.ensure_loaded().await,
            Route::Results => self.results.ensure_loaded().await,
            Route::Payments => self.payments.ensure_loaded().await,
            Route::Announcements => self.announcements.ensure_loaded().await,
            Route::Mentorship => self.mentorship.ensure_loaded().await,
            _ => {}
        }
        access
    }

    pub async fn start_signup(&self, email: &str) -> Result<SignupFlow, ClientError> {
        SignupFlow::start(self.services.auth.clone(), email).await
    }

    pub fn resume_signup(&self, context: SignupContext) -> SignupFlow {
        SignupFlow::resume(self.services.auth.clone(), context)
    }

    /// Follow session changes in the background: prefetch on sign-in, clear
    /// on sign-out, and turn expired-token reports into a sign-out. The task
    /// ends once the portal is dropped.
    pub fn spawn_session_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut users = self.session.subscribe();
        let mut events = self.events.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = users.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let user = users.borrow_and_update().clone();
                        let Some(portal) = weak.upgrade() else { break };
                        portal.on_session_change(user.as_ref()).await;
                    }
                    event = events.recv() => match event {
                        Ok(SessionEvent::Expired { message }) => {
                            let Some(portal) = weak.upgrade() else { break };
                            portal.session.expire(&message);
                        }
                        Err(RecvError::Lagged(n)) => warn!("Missed {} session events", n),
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Session watcher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SESSION_EXPIRED_MESSAGE;
    use crate::state::fakes::*;
    use scholar_types::api::LoginResponse;
    use std::time::Duration;

    struct Fakes {
        auth: Arc<FakeAuth>,
        profile: Arc<FakeProfile>,
        payments: Arc<FakePayments>,
        results: Arc<FakeResults>,
        announcements: Arc<FakeAnnouncements>,
        documents: Arc<FakeDocuments>,
    }

    fn portal() -> (Arc<Portal>, Fakes) {
        let fakes = Fakes {
            auth: Arc::new(FakeAuth::default()),
            profile: Arc::new(FakeProfile {
                fetch: Script::always(profile()),
                ..Default::default()
            }),
            payments: Arc::new(FakePayments {
                history: Script::always(vec![payment("123456789012")]),
                ..Default::default()
            }),
            results: Arc::new(FakeResults {
                list: Script::always(vec![result("sem1.pdf", 10)]),
                ..Default::default()
            }),
            announcements: Arc::new(FakeAnnouncements {
                list: Script::always(page(vec![announcement(1, false)])),
                ..Default::default()
            }),
            documents: Arc::new(FakeDocuments {
                templates: Script::always(vec![document(1, "cv-template.pdf")]),
                ..Default::default()
            }),
        };
        let services = Services {
            auth: fakes.auth.clone(),
            profile: fakes.profile.clone(),
            payments: fakes.payments.clone(),
            results: fakes.results.clone(),
            announcements: fakes.announcements.clone(),
            settings: Arc::new(FakeSettings::default()),
            documents: fakes.documents.clone(),
        };
        let portal = Portal::from_parts(
            ClientConfig::default(),
            LocalStore::in_memory(),
            services,
            session_events(),
        );
        (Arc::new(portal), fakes)
    }

    fn login_ok() -> LoginResponse {
        LoginResponse {
            message: "Login successful".into(),
            token: "tok".into(),
            user: session_user(),
        }
    }

    async fn eventually(check: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition never held");
    }

    #[tokio::test]
    async fn test_session_change_prefetches_and_clears() {
        let (portal, _fakes) = portal();
        let user = session_user();

        let status = portal.on_session_change(Some(&user)).await;
        assert!(status.error.is_none());
        assert!(portal.profile.snapshot().value.is_some());
        assert_eq!(portal.payments.snapshot().value.len(), 1);
        assert_eq!(portal.messaging.chats(None).len(), 3);

        portal.on_session_change(None).await;
        assert!(portal.profile.snapshot().value.is_none());
        assert!(portal.results.snapshot().value.is_empty());
        assert!(portal.messaging.chats(None).is_empty());
    }

    #[tokio::test]
    async fn test_watcher_follows_login_and_expiry() {
        let (portal, fakes) = portal();
        fakes.auth.login.push(Ok(login_ok()));
        let watcher = portal.spawn_session_watcher();

        portal
            .session
            .login("asha@example.com", "Str0ng!pass")
            .await
            .unwrap();
        eventually(|| portal.announcements.unread_count() == 1).await;

        portal.events.send(SessionEvent::Expired {
            message: SESSION_EXPIRED_MESSAGE.into(),
        })
        .unwrap();
        eventually(|| !portal.session.is_authenticated()).await;
        eventually(|| portal.profile.snapshot().value.is_none()).await;
        assert_eq!(
            portal.session.snapshot().error.as_deref(),
            Some(SESSION_EXPIRED_MESSAGE)
        );

        watcher.abort();
    }

    #[tokio::test]
    async fn test_watcher_stops_when_portal_dropped() {
        let (portal, _fakes) = portal();
        let watcher = portal.spawn_session_watcher();
        drop(portal);

        tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .expect("watcher kept running")
            .unwrap();
    }

    #[tokio::test]
    async fn test_guard_uses_current_session() {
        let (portal, fakes) = portal();
        assert_eq!(
            portal.guard(Route::Results, None),
            Access::Redirect(Route::Login)
        );

        fakes.auth.login.push(Ok(login_ok()));
        portal
            .session
            .login("asha@example.com", "Str0ng!pass")
            .await
            .unwrap();
        assert_eq!(portal.guard(Route::Results, None), Access::Allow);
    }

    #[tokio::test]
    async fn test_guard_redirects_after_logout() {
        let (portal, fakes) = portal();
        fakes.auth.login.push(Ok(login_ok()));
        fakes.auth.logout.push(Ok(()));
        portal
            .session
            .login("asha@example.com", "Str0ng!pass")
            .await
            .unwrap();
        assert_eq!(portal.guard(Route::Payments, None), Access::Allow);

        portal.session.logout().await;
        assert_eq!(fakes.auth.logout.calls(), 1);
        for route in [Route::Payments, Route::Results, Route::Settings] {
            assert_eq!(portal.guard(route, None), Access::Redirect(Route::Login));
        }
    }

    #[tokio::test]
    async fn test_open_waits_for_prefetch_then_loads_once() {
        let (portal, fakes) = portal();
        fakes.auth.login.push(Ok(login_ok()));
        portal
            .session
            .login("asha@example.com", "Str0ng!pass")
            .await
            .unwrap();

        portal.gate.start();
        let opening = tokio::spawn({
            let portal = portal.clone();
            async move { portal.open(Route::Results, None).await }
        });
        tokio::task::yield_now().await;
        assert!(!opening.is_finished());
        assert_eq!(fakes.results.list.calls(), 0);

        portal.gate.finish(None);
        assert_eq!(opening.await.unwrap(), Access::Allow);
        assert_eq!(fakes.results.list.calls(), 1);
        assert_eq!(portal.results.snapshot().value.len(), 1);

        // already populated: a second visit does not fetch again
        portal.open(Route::Results, None).await;
        assert_eq!(fakes.results.list.calls(), 1);
    }

    #[tokio::test]
    async fn test_open_redirects_without_fetching() {
        let (portal, fakes) = portal();

        let access = portal.open(Route::Mentorship, None).await;
        assert_eq!(access, Access::Redirect(Route::Login));
        assert_eq!(fakes.documents.templates.calls(), 0);
        assert_eq!(fakes.profile.fetch.calls(), 0);
    }

    #[tokio::test]
    async fn test_open_mentorship_loads_templates_and_sign_out_clears() {
        let (portal, fakes) = portal();
        let user = session_user();
        fakes.auth.login.push(Ok(login_ok()));
        portal
            .session
            .login("asha@example.com", "Str0ng!pass")
            .await
            .unwrap();

        assert_eq!(portal.open(Route::Mentorship, None).await, Access::Allow);
        assert_eq!(portal.mentorship.templates().value.len(), 1);
        assert_eq!(portal.mentorship.articles().len(), 4);

        portal.on_session_change(Some(&user)).await;
        portal.on_session_change(None).await;
        assert!(portal.mentorship.templates().value.is_empty());
    }
}
