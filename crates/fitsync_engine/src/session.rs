//! Login and logout.
//!
//! Both purge the whole cache under every root lock, so nothing cached for
//! one account is ever served to another and no read started before the
//! switch can store its result after it.

use crate::auth::SessionToken;
use crate::entities::users::me_query;
use crate::error::SyncResult;
use crate::state::SessionState;
use crate::sync::Synchronizer;
use crate::transport::ApiTransport;
use fitsync_protocol::model::{LoginCredentials, LoginResponse, User};
use fitsync_protocol::ApiRequest;
use tracing::{info, warn};

impl<T: ApiTransport> Synchronizer<T> {
    fn transition(&self, next: SessionState) -> SyncResult<SessionState> {
        let mut session = self.session.write();
        session.check_transition(next)?;
        Ok(std::mem::replace(&mut *session, next))
    }

    /// Exchanges credentials for a session token, purges the cache and
    /// refetches the current user.
    pub async fn login(&self, credentials: &LoginCredentials) -> SyncResult<User> {
        let request = ApiRequest::post("/auth/login/").with_body(credentials)?;
        self.transition(SessionState::Authenticating)?;

        if let Err(err) = self.authenticate(&request).await {
            let fallback = if self.credentials.token().is_some() {
                SessionState::Authenticated
            } else {
                SessionState::Anonymous
            };
            *self.session.write() = fallback;
            warn!(username = %credentials.username, error = %err, "login failed");
            return Err(err);
        }
        info!(username = %credentials.username, "logged in");

        self.read_as(&me_query().forced()).await
    }

    async fn authenticate(&self, request: &ApiRequest) -> SyncResult<()> {
        let response = self.call(&self.config.write_retry, request, None).await?;
        let login: LoginResponse = serde_json::from_value(response)?;

        let _guards = self.locks.acquire_all().await;
        let purged = self.cache.purge_all();
        self.credentials.store(SessionToken::new(login.token))?;
        self.transition(SessionState::Authenticated)?;
        info!(purged, "purged cache for new session");
        Ok(())
    }

    /// Ends the session.
    ///
    /// The cache is purged and the server told first; the stored token is
    /// deleted even if the server call fails. The navigator is sent to the
    /// login screen last.
    pub async fn logout(&self) -> SyncResult<()> {
        self.transition(SessionState::LoggingOut)?;
        let token = self.credentials.token();

        let guards = self.locks.acquire_all().await;
        let purged = self.cache.purge_all();
        if let Some(token) = token.as_ref() {
            let request = ApiRequest::post("/auth/logout/");
            if let Err(err) = self.call(&self.config.write_retry, &request, Some(token)).await {
                warn!(error = %err, "server logout failed, clearing local session anyway");
            }
        }
        let deleted = self.credentials.delete();
        self.transition(SessionState::Anonymous)?;
        drop(guards);

        info!(purged, "logged out");
        self.navigator.redirect_to_login();
        deleted
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::{MemoryCredentialStore, Navigator, SessionToken};
    use crate::config::SyncConfig;
    use crate::error::SyncError;
    use crate::state::SessionState;
    use crate::sync::{ReadQuery, Synchronizer};
    use crate::transport::MockTransport;
    use fitsync_cache::QueryKey;
    use fitsync_protocol::model::LoginCredentials;
    use fitsync_protocol::{ApiRequest, EntityKind, HttpMethod};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingNavigator(AtomicUsize);

    impl Navigator for CountingNavigator {
        fn redirect_to_login(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn credentials() -> LoginCredentials {
        LoginCredentials {
            username: "ana".into(),
            password: "secret".into(),
        }
    }

    fn setup(
        token: Option<&str>,
    ) -> (
        Arc<MockTransport>,
        Arc<CountingNavigator>,
        Synchronizer<MockTransport>,
    ) {
        let transport = Arc::new(MockTransport::new());
        let navigator = Arc::new(CountingNavigator::default());
        let store = match token {
            Some(t) => MemoryCredentialStore::with_token(SessionToken::new(t)),
            None => MemoryCredentialStore::new(),
        };
        let sync = Synchronizer::new(
            SyncConfig::new("http://api"),
            Arc::clone(&transport),
            Arc::new(store),
            navigator.clone(),
        );
        (transport, navigator, sync)
    }

    async fn seed_programs(transport: &MockTransport, sync: &Synchronizer<MockTransport>) {
        transport.respond(HttpMethod::Get, "/programs/", json!([{"id": 1, "name": "old"}]));
        let query = ReadQuery::new(
            QueryKey::root(EntityKind::Program).segment("list"),
            ApiRequest::get("/programs/"),
        );
        sync.read(&query).await.unwrap();
    }

    #[tokio::test]
    async fn login_stores_token_and_refetches_me() {
        let (transport, _, sync) = setup(Some("old"));
        seed_programs(&transport, &sync).await;
        transport.respond(HttpMethod::Post, "/auth/login/", json!({"token": "fresh"}));
        transport.respond(HttpMethod::Get, "/users/me/", json!({"id": 5, "username": "ana"}));

        let me = sync.login(&credentials()).await.unwrap();

        assert_eq!(me.username, "ana");
        assert_eq!(sync.session_state(), SessionState::Authenticated);
        assert!(sync.cache().keys(&EntityKind::Program.into()).is_empty());
        let calls = transport.calls();
        assert_eq!(calls[1].token, None);
        assert_eq!(calls[2].token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn failed_login_keeps_previous_state() {
        let (transport, _, sync) = setup(None);
        transport.fail(HttpMethod::Post, "/auth/login/", 401);

        let err = sync.login(&credentials()).await.unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(sync.session_state(), SessionState::Anonymous);
        assert!(!sync.is_authenticated());
    }

    #[tokio::test]
    async fn logout_survives_server_failure() {
        let (transport, navigator, sync) = setup(Some("t"));
        seed_programs(&transport, &sync).await;
        transport.fail(HttpMethod::Post, "/auth/logout/", 500);

        sync.logout().await.unwrap();

        assert!(sync.cache().is_empty());
        assert!(!sync.is_authenticated());
        assert_eq!(sync.session_state(), SessionState::Anonymous);
        assert_eq!(navigator.0.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls_to(HttpMethod::Post, "/auth/logout/"), 1);
    }

    #[tokio::test]
    async fn anonymous_logout_skips_server() {
        let (transport, navigator, sync) = setup(None);
        sync.logout().await.unwrap();
        assert_eq!(transport.call_count(), 0);
        assert_eq!(navigator.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reads_after_logout_are_gated() {
        let (transport, _, sync) = setup(Some("t"));
        transport.respond(HttpMethod::Post, "/auth/logout/", json!(null));
        sync.logout().await.unwrap();

        let err = sync.users().me().await.unwrap_err();
        assert!(matches!(err, SyncError::NotAuthenticated));
        assert_eq!(transport.call_count(), 1);
    }
}
