use crate::error::StorageError;
use crate::model::CredentialRecord;
use crate::secrets::SecretBackend;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

pub const KEY_TOKEN: &str = "auth_token";
pub const KEY_USER_ID: &str = "user_id";
pub const KEY_USERNAME: &str = "username";
pub const KEY_PASSWORD: &str = "password";

const ALL_KEYS: [&str; 4] = [KEY_TOKEN, KEY_USER_ID, KEY_USERNAME, KEY_PASSWORD];

/// Durable store for the credential record.
///
/// Every operation runs on the blocking pool. `save` and `clear` hold the
/// write side of `gate`, so readers never observe a partially written record.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn SecretBackend>,
    gate: RwLock<()>,
}

impl Inner {
    fn read_record(&self) -> Result<CredentialRecord, StorageError> {
        let _guard = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        Ok(CredentialRecord {
            token: self.backend.get(KEY_TOKEN)?,
            user_id: self.backend.get(KEY_USER_ID)?,
            username: self.backend.get(KEY_USERNAME)?,
            password: self.backend.get(KEY_PASSWORD)?,
        })
    }

    fn read_one(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.backend.get(key)
    }

    fn delete_all(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in ALL_KEYS {
            if let Err(err) = self.backend.delete(key) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                gate: RwLock::new(()),
            }),
        }
    }

    async fn run<R, F>(&self, op: F) -> Result<R, StorageError>
    where
        R: Send + 'static,
        F: FnOnce(&Inner) -> Result<R, StorageError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner)).await?
    }

    pub async fn is_logged_in(&self) -> Result<bool, StorageError> {
        Ok(self.load().await?.is_logged_in())
    }

    pub async fn load(&self) -> Result<CredentialRecord, StorageError> {
        self.run(Inner::read_record).await
    }

    pub async fn save(
        &self,
        token: &str,
        user_id: &str,
        username: &str,
        password: &str,
    ) -> Result<(), StorageError> {
        let values = [
            (KEY_TOKEN, token.to_string()),
            (KEY_USER_ID, user_id.to_string()),
            (KEY_USERNAME, username.to_string()),
            (KEY_PASSWORD, password.to_string()),
        ];
        self.run(move |inner| {
            let _guard = inner.gate.write().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in &values {
                if let Err(err) = inner.backend.set(key, value) {
                    // A half-written record must never read back as logged in.
                    if let Err(rollback) = inner.delete_all() {
                        warn!(error = %rollback, "Credential rollback failed");
                    }
                    return Err(err);
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.run(|inner| {
            let _guard = inner.gate.write().unwrap_or_else(PoisonError::into_inner);
            inner.delete_all()
        })
        .await
    }

    pub async fn token(&self) -> Result<Option<String>, StorageError> {
        self.run(|inner| inner.read_one(KEY_TOKEN)).await
    }

    pub async fn user_id(&self) -> Result<Option<String>, StorageError> {
        self.run(|inner| inner.read_one(KEY_USER_ID)).await
    }

    pub async fn username(&self) -> Result<Option<String>, StorageError> {
        self.run(|inner| inner.read_one(KEY_USERNAME)).await
    }

    pub async fn password(&self) -> Result<Option<String>, StorageError> {
        self.run(|inner| inner.read_one(KEY_PASSWORD)).await
    }
}
