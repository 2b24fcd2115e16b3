use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use scholar_types::SessionUser;

use super::{ResourceCell, Snapshot};
use crate::error::ClientError;
use crate::services::AuthApi;
use crate::storage::{LocalStore, TokenStore, USER_KEY};
use crate::validation;

/// The signed-in user. Changes are published on a watch channel so the
/// portal can prefetch on sign-in and clear everything on sign-out.
pub struct SessionHolder {
    api: Arc<dyn AuthApi>,
    store: LocalStore,
    tokens: TokenStore,
    cell: ResourceCell<Option<SessionUser>>,
    tx: watch::Sender<Option<SessionUser>>,
}

impl SessionHolder {
    pub fn new(api: Arc<dyn AuthApi>, store: LocalStore) -> Self {
        let tokens = TokenStore::new(store.clone());
        Self {
            api,
            store,
            tokens,
            cell: ResourceCell::new(),
            tx: watch::Sender::new(None),
        }
    }

    pub fn snapshot(&self) -> Snapshot<Option<SessionUser>> {
        self.cell.snapshot()
    }

    pub fn current(&self) -> Option<SessionUser> {
        self.cell.read(|s| s.value.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.read(|s| s.value.is_some())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionUser>> {
        self.tx.subscribe()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, ClientError> {
        let email = email.trim();
        let checked = validation::email(email)
            .and_then(|_| validation::required("Password", password));
        if let Err(e) = checked {
            return Err(self.cell.fail(e.into()));
        }

        self.cell.begin();
        let response = match self.api.login(email, password).await {
            Ok(r) => r,
            Err(e) => return Err(self.cell.fail(e)),
        };

        if let Err(e) = self
            .tokens
            .set(&response.token)
            .and_then(|_| self.store.set(USER_KEY, &response.user))
        {
            return Err(self.cell.fail(e));
        }
        info!("Signed in as {}", response.user.email);
        self.publish(Some(response.user.clone()));
        Ok(response.user)
    }

    /// Best-effort server logout; the local session is cleared regardless.
    pub async fn logout(&self) {
        if self.tokens.get().is_some() {
            if let Err(e) = self.api.logout().await {
                warn!("Server logout failed, clearing local session anyway: {}", e);
            }
        }
        self.tokens.clear();
        self.publish(None);
        info!("Signed out");
    }

    /// Pick up a token persisted by an earlier run and check it against the
    /// server. A rejected token destroys the session; an unreachable server
    /// falls back to the cached user.
    pub async fn restore(&self) -> Option<SessionUser> {
        self.tokens.get()?;

        self.cell.begin();
        match self.api.current_user().await {
            Ok(user) => {
                if let Err(e) = self.store.set(USER_KEY, &user) {
                    warn!("Could not cache the current user: {}", e);
                }
                self.publish(Some(user.clone()));
                Some(user)
            }
            Err(e) if e.is_unauthorized() => {
                self.tokens.clear();
                self.publish(None);
                self.cell.fail(e);
                None
            }
            Err(e) => {
                let cached: Option<SessionUser> = self.store.get(USER_KEY);
                warn!("Could not validate stored session: {}", e);
                self.publish(cached.clone());
                self.cell.fail(e);
                cached
            }
        }
    }

    /// The server said the token is no longer good.
    pub fn expire(&self, message: &str) {
        let was_signed_in = self.is_authenticated();
        self.tokens.clear();
        self.publish(None);
        self.cell.update(|s| s.error = Some(message.to_string()));
        if was_signed_in {
            info!("Session expired");
        }
    }

    fn publish(&self, user: Option<SessionUser>) {
        self.cell.fill(user.clone());
        self.tx.send_if_modified(|current| {
            if *current == user {
                return false;
            }
            *current = user;
            true
        });
    }
}
