//! Session credentials and the login redirect hook.

use crate::error::SyncResult;
use parking_lot::RwLock;
use std::fmt;
use zeroize::Zeroizing;

/// Opaque session token issued by the login endpoint.
///
/// The token text is wiped from memory when the last copy is dropped and
/// never appears in `Debug` output.
#[derive(Clone)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    /// Wraps a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// The raw token, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for SessionToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for SessionToken {}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Platform storage for the single session token.
pub trait CredentialStore: Send + Sync {
    /// Current token, if one is stored.
    fn token(&self) -> Option<SessionToken>;

    /// Replaces the stored token.
    fn store(&self, token: SessionToken) -> SyncResult<()>;

    /// Deletes the stored token. Deleting nothing succeeds.
    fn delete(&self) -> SyncResult<()>;
}

/// Keeps the token in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<SessionToken>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `token`.
    pub fn with_token(token: SessionToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<SessionToken> {
        self.token.read().clone()
    }

    fn store(&self, token: SessionToken) -> SyncResult<()> {
        *self.token.write() = Some(token);
        Ok(())
    }

    fn delete(&self) -> SyncResult<()> {
        *self.token.write() = None;
        Ok(())
    }
}

/// Routes the user back to the login screen.
pub trait Navigator: Send + Sync {
    /// Called once logout has purged the cache and deleted the credential.
    fn redirect_to_login(&self);
}

/// A navigator that does nothing, for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to_login(&self) {}
}
