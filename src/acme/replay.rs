use crate::types;
use chrono::prelude::*;
use std::collections::HashMap;

const NONCE_BYTES: usize = 16;

/// Nonces are single use and live at most 15 minutes.
fn nonce_lifetime() -> chrono::Duration {
    chrono::Duration::minutes(15)
}

pub type SharedNonces = std::sync::Arc<dyn NonceStore>;

/// Anti-replay token oracle. The in-process implementation below suffices for a
/// single server; a shared deployment would put the same interface over an
/// external store.
#[rocket::async_trait]
pub trait NonceStore: Send + Sync {
    async fn issue(&self) -> crate::acme::ACMEResult<String>;
    async fn consume(&self, nonce: &str) -> crate::acme::ACMEResult<()>;
    async fn sweep(&self);
}

struct NonceEntry {
    issued_at: DateTime<Utc>,
    used: bool,
}

pub struct MemoryNonceStore {
    nonces: std::sync::RwLock<HashMap<String, NonceEntry>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        MemoryNonceStore {
            nonces: std::sync::RwLock::new(HashMap::new()),
        }
    }

    fn consume_at(&self, nonce: &str, now: DateTime<Utc>) -> crate::acme::ACMEResult<()> {
        let mut nonces = self.nonces.write().unwrap();
        let entry = match nonces.get_mut(nonce) {
            Some(e) => e,
            None => {
                return Err(bad_nonce("The nonce is not one we issued"));
            }
        };
        if entry.used {
            return Err(bad_nonce("The nonce has already been used"));
        }
        if now - entry.issued_at > nonce_lifetime() {
            nonces.remove(nonce);
            return Err(bad_nonce("The nonce has expired"));
        }
        entry.used = true;
        Ok(())
    }

    fn sweep_at(&self, now: DateTime<Utc>) {
        let mut nonces = self.nonces.write().unwrap();
        nonces.retain(|_, e| !e.used && now - e.issued_at <= nonce_lifetime());
    }

    #[cfg(test)]
    fn insert_issued_at(&self, nonce: &str, issued_at: DateTime<Utc>) {
        self.nonces.write().unwrap().insert(nonce.to_string(), NonceEntry {
            issued_at,
            used: false,
        });
    }
}

fn bad_nonce(detail: &str) -> types::error::Error {
    types::error::Error {
        error_type: types::error::Type::BadNonce,
        status: 400,
        title: "Bad nonce".to_string(),
        detail: detail.to_string(),
        sub_problems: vec![],
        instance: None,
        identifier: None,
    }
}

#[rocket::async_trait]
impl NonceStore for MemoryNonceStore {
    async fn issue(&self) -> crate::acme::ACMEResult<String> {
        let nonce = match crate::util::rand_b64(NONCE_BYTES) {
            Ok(v) => v,
            Err(err) => {
                error!("Unable to generate nonce: {}", err);
                return Err(crate::internal_server_error!());
            }
        };
        self.nonces.write().unwrap().insert(nonce.clone(), NonceEntry {
            issued_at: Utc::now(),
            used: false,
        });
        Ok(nonce)
    }

    async fn consume(&self, nonce: &str) -> crate::acme::ACMEResult<()> {
        self.consume_at(nonce, Utc::now())
    }

    async fn sweep(&self) {
        self.sweep_at(Utc::now());
    }
}

/// Periodic sweep of used and expired nonces, run from a background task.
pub fn start_sweeper(nonces: SharedNonces) {
    rocket::tokio::spawn(async move {
        let mut interval = rocket::tokio::time::interval(std::time::Duration::from_secs(300));
        interval.tick().await;
        loop {
            interval.tick().await;
            nonces.sweep().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn nonces_are_unique_and_single_use() {
        let store = MemoryNonceStore::new();
        let a = store.issue().await.unwrap();
        let b = store.issue().await.unwrap();
        assert_ne!(a, b);

        assert!(store.consume(&a).await.is_ok());
        let err = store.consume(&a).await.unwrap_err();
        assert_eq!(err.error_type, types::error::Type::BadNonce);

        assert!(store.consume(&b).await.is_ok());
    }

    #[rocket::async_test]
    async fn unknown_nonces_are_rejected() {
        let store = MemoryNonceStore::new();
        let err = store.consume("bm90LWEtbm9uY2U").await.unwrap_err();
        assert_eq!(err.error_type, types::error::Type::BadNonce);
    }

    #[test]
    fn expired_nonces_are_rejected() {
        let store = MemoryNonceStore::new();
        let now = Utc::now();
        store.insert_issued_at("old", now - chrono::Duration::minutes(16));
        let err = store.consume_at("old", now).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::BadNonce);

        // a fresh value at the edge of the window still passes
        store.insert_issued_at("fresh", now - chrono::Duration::minutes(14));
        assert!(store.consume_at("fresh", now).is_ok());
    }

    #[test]
    fn sweep_drops_used_and_expired_entries() {
        let store = MemoryNonceStore::new();
        let now = Utc::now();
        store.insert_issued_at("expired", now - chrono::Duration::minutes(20));
        store.insert_issued_at("used", now);
        store.insert_issued_at("live", now);
        store.consume_at("used", now).unwrap();

        store.sweep_at(now);

        assert!(store.consume_at("live", now).is_ok());
        let err = store.consume_at("expired", now).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::BadNonce);
        let err = store.consume_at("used", now).unwrap_err();
        assert_eq!(err.error_type, types::error::Type::BadNonce);
    }

    #[rocket::async_test]
    async fn issued_nonces_have_expected_entropy() {
        let store = MemoryNonceStore::new();
        let nonce = store.issue().await.unwrap();
        use base64::prelude::*;
        assert_eq!(BASE64_URL_SAFE_NO_PAD.decode(&nonce).unwrap().len(), 16);
    }
}
