//! Service-token manager.
//!
//! Responsibilities:
//! - Return the cached credential while `now < expires_at`.
//! - Renew through [`ServiceLogin`] when the credential is missing or expired.
//! - Single-flight renewal: concurrent callers that observe an expired
//!   credential wait on one login and share its result, success or failure.
use crate::login::ServiceLogin;
use partnergate_types::{AuthError, Credential, StoreError, TokenStore};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::Mutex;

/// Outcome of the most recent renewal attempt, guarded by the renewal lock.
#[derive(Default)]
struct RenewalRound {
    /// Completed attempts, mirrored in [`TokenManager::attempts`].
    attempts: u64,
    /// Message of the last attempt if it failed.
    failure: Option<String>,
}

pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    login: ServiceLogin,
    renewal: Mutex<RenewalRound>,
    attempts: AtomicU64,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, login: ServiceLogin) -> Self {
        Self {
            store,
            login,
            renewal: Mutex::new(RenewalRound::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return a currently valid service token, renewing it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the store cannot be read or renewal fails.
    /// A failed renewal leaves the store untouched. Callers that queued behind
    /// a failed renewal get [`AuthError::RenewalFailed`] without logging in again.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let seen = self.attempts.load(Ordering::Acquire);
        if let Some(valid) = self.valid_credential().await? {
            return Ok(valid.token);
        }

        let mut round = self.renewal.lock().await;
        // Another caller may have renewed while we waited for the lock.
        if let Some(valid) = self.valid_credential().await? {
            tracing::debug!("service token renewed by a concurrent caller");
            return Ok(valid.token);
        }
        if round.attempts != seen
            && let Some(message) = &round.failure
        {
            tracing::debug!("service token renewal failed in a concurrent caller");
            return Err(AuthError::RenewalFailed(message.clone()));
        }
        self.renew_locked(&mut round).await
    }

    /// The stored credential, valid or not, for status reporting.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store cannot be read.
    pub async fn credential(&self) -> Result<Option<Credential>, AuthError> {
        Ok(self.store.get().await?)
    }

    /// Drop the cached service credential; the next [`Self::get_token`] renews.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store cannot be cleared.
    pub async fn clear_token(&self) -> Result<(), AuthError> {
        self.store.clear().await?;
        tracing::info!("service token cleared");
        Ok(())
    }

    /// Discard the cached credential and log in again immediately.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if renewal fails.
    pub async fn force_renew(&self) -> Result<String, AuthError> {
        let mut round = self.renewal.lock().await;
        self.renew_locked(&mut round).await
    }

    /// A corrupt token file counts as a miss so the next renewal overwrites it;
    /// I/O failures still propagate.
    async fn valid_credential(&self) -> Result<Option<Credential>, AuthError> {
        match self.store.get().await {
            Ok(cred) => Ok(cred.filter(Credential::is_valid)),
            Err(e @ StoreError::Corrupt { .. }) => {
                tracing::warn!(error = %e, "cached service token unreadable, renewing");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn renew_locked(&self, round: &mut RenewalRound) -> Result<String, AuthError> {
        let result = self.renew().await;
        round.attempts += 1;
        round.failure = result.as_ref().err().map(ToString::to_string);
        self.attempts.store(round.attempts, Ordering::Release);
        result
    }

    async fn renew(&self) -> Result<String, AuthError> {
        tracing::info!("renewing service token");
        let grant = self.login.login().await.inspect_err(|e| {
            tracing::error!(error = %e, "service token renewal failed");
        })?;
        let credential = self.store.save(&grant.token, grant.expires_at).await?;
        tracing::info!(expires_at = credential.expires_at, "service token renewed");
        Ok(credential.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_swap::ArcSwap;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use partnergate_config::Config;
    use partnergate_store::{FileTokenStore, InMemoryTokenStore};
    use partnergate_types::unix_now;
    use serde_json::{Value, json};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    const TTL: Duration = Duration::from_secs(3600);

    #[derive(Clone)]
    struct Upstream {
        calls: Arc<AtomicUsize>,
        status: StatusCode,
        body: Value,
        delay: Duration,
    }

    async fn login_handler(
        State(up): State<Upstream>,
        Json(req): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        assert_eq!(req["email"], "svc@example.com");
        assert_eq!(req["password"], "secret");
        let n = up.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(up.delay).await;
        let mut body = up.body.clone();
        if let Some(tok) = body.get_mut("token").filter(|t| t.as_str() == Some("seq")) {
            *tok = json!(format!("tok-{n}"));
        }
        (up.status, Json(body))
    }

    async fn spawn_upstream(status: StatusCode, body: Value, delay: Duration) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/partner/login", post(login_handler))
            .with_state(Upstream {
                calls: Arc::clone(&calls),
                status,
                body,
                delay,
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    fn make_config(base_url: &str) -> Arc<ArcSwap<Config>> {
        let mut config = Config::default();
        config.upstream.base_url = base_url.to_string();
        config.service.email = Some("svc@example.com".into());
        config.service.password = Some("secret".into());
        Arc::new(ArcSwap::from_pointee(config))
    }

    fn make_manager(base_url: &str, store: Arc<dyn TokenStore>) -> TokenManager {
        TokenManager::new(store, ServiceLogin::new(reqwest::Client::new(), make_config(base_url)))
    }

    #[tokio::test]
    async fn test_login_then_cached_reuse() {
        let (url, calls) = spawn_upstream(StatusCode::OK, json!({"token": "abc"}), Duration::ZERO).await;
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = make_manager(&url, store.clone());

        assert_eq!(m.get_token().await.unwrap(), "abc");
        assert_eq!(m.get_token().await.unwrap(), "abc");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let saved = store.get().await.unwrap().unwrap();
        assert_eq!(saved.token, "abc");
        assert!(saved.created_at < saved.expires_at);
        assert!(saved.expires_at > unix_now());
    }

    #[tokio::test]
    async fn test_valid_cached_token_skips_network() {
        let cached = Credential {
            token: "T".into(),
            created_at: unix_now(),
            expires_at: unix_now() + 600,
        };
        let store = Arc::new(InMemoryTokenStore::with_credential(cached, TTL));
        // Nothing listens on port 9; any network attempt would fail.
        let m = make_manager("http://127.0.0.1:9", store);
        assert_eq!(m.get_token().await.unwrap(), "T");
    }

    #[tokio::test]
    async fn test_expiry_boundary_triggers_renewal() {
        let (url, calls) = spawn_upstream(StatusCode::OK, json!({"token": "fresh"}), Duration::ZERO).await;
        let now = unix_now();
        let stale = Credential {
            token: "stale".into(),
            created_at: now - 10,
            expires_at: now,
        };
        let store = Arc::new(InMemoryTokenStore::with_credential(stale, TTL));
        let m = make_manager(&url, store.clone());

        assert_eq!(m.get_token().await.unwrap(), "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get().await.unwrap().unwrap().token, "fresh");
    }

    #[tokio::test]
    async fn test_expires_in_is_honoured() {
        let (url, _) = spawn_upstream(StatusCode::OK, json!({"token": "abc", "expires_in": 120}), Duration::ZERO).await;
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = make_manager(&url, store.clone());
        m.get_token().await.unwrap();
        let saved = store.get().await.unwrap().unwrap();
        assert!(saved.expires_at - saved.created_at <= 121);
    }

    #[tokio::test]
    async fn test_renewal_failure_leaves_store_empty() {
        let (url, _) = spawn_upstream(StatusCode::UNAUTHORIZED, json!({"message": "bad creds"}), Duration::ZERO).await;
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = make_manager(&url, store.clone());

        let err = m.get_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
        assert!(err.to_string().contains("bad creds"));
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_success_without_token_is_an_error() {
        let (url, _) = spawn_upstream(StatusCode::OK, json!({"message": "welcome"}), Duration::ZERO).await;
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = make_manager(&url, store.clone());
        assert!(matches!(m.get_token().await.unwrap_err(), AuthError::MissingToken));
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let config = Arc::new(ArcSwap::from_pointee(Config::default()));
        let m = TokenManager::new(store, ServiceLogin::new(reqwest::Client::new(), config));
        assert!(matches!(m.get_token().await.unwrap_err(), AuthError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = make_manager("http://127.0.0.1:9", store);
        assert!(matches!(m.get_token().await.unwrap_err(), AuthError::Transport(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_renewal() {
        let (url, calls) = spawn_upstream(StatusCode::OK, json!({"token": "seq"}), Duration::from_millis(100)).await;
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = Arc::new(make_manager(&url, store));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                tokio::spawn(async move { m.get_token().await.unwrap() })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), "tok-1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_failed_renewal() {
        let (url, calls) = spawn_upstream(
            StatusCode::UNAUTHORIZED,
            json!({"message": "bad creds"}),
            Duration::from_millis(100),
        )
        .await;
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = Arc::new(make_manager(&url, store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                tokio::spawn(async move { m.get_token().await.unwrap_err() })
            })
            .collect();
        for h in handles {
            let err = h.await.unwrap();
            assert!(err.to_string().contains("bad creds"), "{err}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.get().await.unwrap().is_none());

        // A fresh call after the failed round tries again.
        assert!(m.get_token().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_token_file_is_renewed() {
        let (url, calls) = spawn_upstream(StatusCode::OK, json!({"token": "fresh"}), Duration::ZERO).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "").unwrap();
        let store = Arc::new(FileTokenStore::new(path.clone(), TTL));
        let m = make_manager(&url, store.clone());

        assert_eq!(m.get_token().await.unwrap(), "fresh");
        assert_eq!(m.get_token().await.unwrap(), "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get().await.unwrap().unwrap().token, "fresh");
    }

    #[tokio::test]
    async fn test_clear_then_renew() {
        let (url, calls) = spawn_upstream(StatusCode::OK, json!({"token": "seq"}), Duration::ZERO).await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTokenStore::new(dir.path().join("token.json"), TTL));
        let m = make_manager(&url, store);

        assert_eq!(m.get_token().await.unwrap(), "tok-1");
        m.clear_token().await.unwrap();
        m.clear_token().await.unwrap();
        assert!(m.credential().await.unwrap().is_none());
        assert_eq!(m.get_token().await.unwrap(), "tok-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_renew_replaces_valid_token() {
        let (url, _) = spawn_upstream(StatusCode::OK, json!({"token": "seq"}), Duration::ZERO).await;
        let store = Arc::new(InMemoryTokenStore::new(TTL));
        let m = make_manager(&url, store);
        assert_eq!(m.get_token().await.unwrap(), "tok-1");
        assert_eq!(m.force_renew().await.unwrap(), "tok-2");
        assert_eq!(m.get_token().await.unwrap(), "tok-2");
    }
}
