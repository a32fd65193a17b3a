//! A synchronizer wired to a scripted transport.

use fitsync_engine::{
    CredentialStore, MemoryCredentialStore, MockTransport, Navigator, RetryConfig, SessionToken,
    SyncConfig, Synchronizer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Token stored by [`Harness::logged_in`].
pub const TEST_TOKEN: &str = "test-token";

/// Counts login redirects.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: AtomicUsize,
}

impl RecordingNavigator {
    /// Number of redirects so far.
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test configuration: two attempts, millisecond backoff, no jitter.
pub fn fast_config() -> SyncConfig {
    SyncConfig::new("http://api.test").with_retry(
        RetryConfig::new(2)
            .with_initial_delay(Duration::from_millis(1))
            .without_jitter(),
    )
}

/// Everything a synchronizer test touches.
pub struct Harness {
    /// Scripted API.
    pub transport: Arc<MockTransport>,
    /// Synchronizer under test.
    pub sync: Synchronizer<MockTransport>,
    /// Redirect counter.
    pub navigator: Arc<RecordingNavigator>,
    /// Credential store shared with the synchronizer.
    pub credentials: Arc<MemoryCredentialStore>,
}

impl Harness {
    /// A session holding [`TEST_TOKEN`].
    pub fn logged_in() -> Self {
        Self::build(MemoryCredentialStore::with_token(SessionToken::new(TEST_TOKEN)))
    }

    /// A session without a token.
    pub fn anonymous() -> Self {
        Self::build(MemoryCredentialStore::new())
    }

    fn build(credentials: MemoryCredentialStore) -> Self {
        let transport = Arc::new(MockTransport::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let credentials = Arc::new(credentials);
        let sync = Synchronizer::new(
            fast_config(),
            Arc::clone(&transport),
            Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        Self {
            transport,
            sync,
            navigator,
            credentials,
        }
    }

    /// The stored token, if any.
    pub fn token(&self) -> Option<String> {
        self.credentials.token().map(|t| t.expose().to_string())
    }
}
