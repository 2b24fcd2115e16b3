use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";
pub const PAYMENT_CACHE_KEY: &str = "paymentCache";

struct StoreInner {
    values: BTreeMap<String, Value>,
    path: Option<PathBuf>,
}

/// String-keyed JSON values that survive restarts when backed by a file.
/// Every mutation is written through immediately.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                values: BTreeMap::new(),
                path: None,
            })),
        }
    }

    /// Open (or start) a store file. A missing file is an empty store; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(path: &Path) -> Result<Self, ClientError> {
        let values = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Ignoring unreadable store {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Local store opened at {}", path.display());
        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner {
                values,
                path: Some(path.to_path_buf()),
            })),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.lock();
        let value = inner.values.get(key)?.clone();
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Stored value '{}' has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ClientError> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.lock();
        inner.values.insert(key.to_string(), value);
        persist(&inner)
    }

    pub fn remove(&self, key: &str) -> Result<(), ClientError> {
        let mut inner = self.lock();
        if inner.values.remove(key).is_some() {
            persist(&inner)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn persist(inner: &StoreInner) -> Result<(), ClientError> {
    let Some(path) = &inner.path else {
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(&inner.values)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// The bearer token slot, shared by the HTTP client and the session holder.
#[derive(Clone)]
pub struct TokenStore {
    store: LocalStore,
}

impl TokenStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Option<String> {
        self.store.get(AUTH_TOKEN_KEY)
    }

    pub fn set(&self, token: &str) -> Result<(), ClientError> {
        self.store.set(AUTH_TOKEN_KEY, &token)
    }

    /// Drop the token and the cached user together.
    pub fn clear(&self) {
        for key in [AUTH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to clear '{}' from local store: {}", key, e);
            }
        }
    }
}
