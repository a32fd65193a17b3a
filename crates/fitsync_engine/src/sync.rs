//! The synchronizer: reads, writes and the per-root locks between them.

use crate::auth::{CredentialStore, Navigator, SessionToken};
use crate::cascade::Trigger;
use crate::config::{RetryConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::state::{SessionState, SyncStats};
use crate::transport::ApiTransport;
use fitsync_cache::{scopes, CacheRule, KeyPattern, Lookup, QueryCache, QueryKey};
use fitsync_protocol::{ApiRequest, EntityKind};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Builds the speculative rules of an optimistic write from the current
/// cache. Runs while the write holds its root locks.
pub type Speculate = Box<dyn FnOnce(&QueryCache) -> SyncResult<Vec<CacheRule>> + Send>;

/// Builds the rules that fold a server response into the cache.
pub type Reconcile =
    Box<dyn FnOnce(&serde_json::Value, &QueryCache) -> SyncResult<Vec<CacheRule>> + Send>;

/// A cached read.
#[derive(Debug, Clone)]
pub struct ReadQuery {
    /// Cache key the result is stored under.
    pub key: QueryKey,
    /// Call that produces the result.
    pub request: ApiRequest,
    /// Overrides the configured stale time.
    pub stale_time: Option<Duration>,
    /// Skip the cache and refetch.
    pub force: bool,
    /// Refuse to run without a session.
    pub requires_auth: bool,
}

impl ReadQuery {
    /// Authenticated read of `request` cached under `key`.
    pub fn new(key: QueryKey, request: ApiRequest) -> Self {
        Self {
            key,
            request,
            stale_time: None,
            force: false,
            requires_auth: true,
        }
    }

    /// Sets the stale time.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Refetches even if cached data is fresh.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Allows the read without a session.
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}

/// How a write reaches the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Issue the call, then apply rules built from the response.
    ConfirmThenUpdate,
    /// Apply speculative rules first, roll them back if the call fails.
    Optimistic,
}

/// A write against the API and its effect on the cache.
pub struct Mutation {
    request: ApiRequest,
    roots: Vec<EntityKind>,
    speculate: Option<Speculate>,
    reconcile: Option<Reconcile>,
    cascade: Option<Trigger>,
    requires_auth: bool,
}

impl Mutation {
    /// A confirm-then-update write.
    pub fn confirm(request: ApiRequest) -> Self {
        Self {
            request,
            roots: Vec::new(),
            speculate: None,
            reconcile: None,
            cascade: None,
            requires_auth: true,
        }
    }

    /// An optimistic write whose speculative rules come from `speculate`.
    pub fn optimistic<F>(request: ApiRequest, speculate: F) -> Self
    where
        F: FnOnce(&QueryCache) -> SyncResult<Vec<CacheRule>> + Send + 'static,
    {
        Self {
            speculate: Some(Box::new(speculate)),
            ..Self::confirm(request)
        }
    }

    /// Declares a root the write's rules touch. Optimistic writes hold the
    /// lock of every declared root for their whole duration.
    pub fn touching(mut self, kind: EntityKind) -> Self {
        if !self.roots.contains(&kind) {
            self.roots.push(kind);
        }
        self
    }

    /// Sets the reconcile step.
    pub fn reconcile<F>(mut self, reconcile: F) -> Self
    where
        F: FnOnce(&serde_json::Value, &QueryCache) -> SyncResult<Vec<CacheRule>> + Send + 'static,
    {
        self.reconcile = Some(Box::new(reconcile));
        self
    }

    /// Invalidates the targets of `trigger` once the write succeeds.
    pub fn cascade(mut self, trigger: Trigger) -> Self {
        self.cascade = Some(trigger);
        self
    }

    /// Allows the write without a session.
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Write mode.
    pub fn mode(&self) -> WriteMode {
        if self.speculate.is_some() {
            WriteMode::Optimistic
        } else {
            WriteMode::ConfirmThenUpdate
        }
    }

    /// The call.
    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    /// Declared roots.
    pub fn roots(&self) -> &[EntityKind] {
        &self.roots
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("request", &self.request)
            .field("mode", &self.mode())
            .field("roots", &self.roots)
            .field("cascade", &self.cascade)
            .finish()
    }
}

/// One async mutex per entity root.
pub(crate) struct RootLocks {
    locks: Vec<Mutex<()>>,
}

impl RootLocks {
    fn new() -> Self {
        Self {
            locks: EntityKind::ALL.iter().map(|_| Mutex::new(())).collect(),
        }
    }

    /// Locks `roots` in declaration order of [`EntityKind`].
    pub(crate) async fn acquire(&self, roots: &[EntityKind]) -> Vec<MutexGuard<'_, ()>> {
        let mut roots = roots.to_vec();
        roots.sort();
        roots.dedup();
        let mut guards = Vec::with_capacity(roots.len());
        for kind in roots {
            guards.push(self.locks[kind as usize].lock().await);
        }
        guards
    }

    /// Locks every root.
    pub(crate) async fn acquire_all(&self) -> Vec<MutexGuard<'_, ()>> {
        self.acquire(&EntityKind::ALL).await
    }
}

/// Keeps the query cache consistent with the API.
///
/// Every read goes through [`read`](Self::read) and every write through
/// [`write`](Self::write); the entity handles ([`users`](Self::users),
/// [`posts`](Self::posts), ...) build their queries and mutations.
pub struct Synchronizer<T: ApiTransport> {
    pub(crate) config: SyncConfig,
    pub(crate) transport: Arc<T>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) cache: Arc<QueryCache>,
    pub(crate) locks: RootLocks,
    pub(crate) session: RwLock<SessionState>,
    pub(crate) stats: RwLock<SyncStats>,
}

impl<T: ApiTransport> Synchronizer<T> {
    /// Creates a synchronizer with a fresh cache.
    pub fn new(
        config: SyncConfig,
        transport: Arc<T>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let cache = Arc::new(QueryCache::new(config.cache.clone()));
        Self::with_cache(config, transport, credentials, navigator, cache)
    }

    /// Creates a synchronizer over an existing cache, e.g. one hydrated
    /// from a persisted image.
    pub fn with_cache(
        config: SyncConfig,
        transport: Arc<T>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        cache: Arc<QueryCache>,
    ) -> Self {
        let session = if credentials.token().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        Self {
            config,
            transport,
            credentials,
            navigator,
            cache,
            locks: RootLocks::new(),
            session: RwLock::new(session),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The shared query cache.
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// The transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Session state.
    pub fn session_state(&self) -> SessionState {
        *self.session.read()
    }

    /// Returns true if a session token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.credentials.token().is_some()
    }

    /// Statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Marks everything under `pattern` for refetch.
    pub fn invalidate(&self, pattern: impl Into<KeyPattern>) -> usize {
        self.cache.apply_rules(&[CacheRule::invalidate(pattern)])
    }

    fn auth_gate(&self, required: bool) -> SyncResult<Option<SessionToken>> {
        let token = self.credentials.token();
        if required && token.is_none() {
            debug!("refusing unauthenticated call");
            return Err(SyncError::NotAuthenticated);
        }
        Ok(token)
    }

    /// Serves `query` from the cache or fetches it.
    pub async fn read(&self, query: &ReadQuery) -> SyncResult<serde_json::Value> {
        self.stats.write().reads += 1;
        let token = self.auth_gate(query.requires_auth)?;

        if !query.force {
            let stale_time = query
                .stale_time
                .unwrap_or_else(|| self.config.default_stale_time());
            if let Lookup::Fresh(data) = self.cache.lookup(&query.key, stale_time) {
                self.stats.write().cache_hits += 1;
                return Ok(data);
            }
        }

        let ticket = self.cache.begin_fetch(&query.key);
        let data = self
            .call(&self.config.retry, &query.request, token.as_ref())
            .await?;
        if self.cache.complete_fetch(&ticket, data.clone()) {
            Ok(data)
        } else {
            self.stats.write().reads_cancelled += 1;
            debug!(key = %query.key, "read superseded, result discarded");
            Err(SyncError::Cancelled)
        }
    }

    /// Like [`read`](Self::read), decoding the result.
    pub async fn read_as<R: DeserializeOwned>(&self, query: &ReadQuery) -> SyncResult<R> {
        Ok(serde_json::from_value(self.read(query).await?)?)
    }

    /// Issues a write and keeps the cache consistent with its outcome.
    ///
    /// Confirm-then-update writes touch the cache only after the call
    /// succeeds. Optimistic writes snapshot the scope of their speculative
    /// rules, apply them, and restore the snapshot if the call fails.
    pub async fn write(&self, mutation: Mutation) -> SyncResult<serde_json::Value> {
        let Mutation {
            request,
            roots,
            speculate,
            reconcile,
            cascade,
            requires_auth,
        } = mutation;
        let id = Uuid::new_v4();
        self.stats.write().writes += 1;
        let token = self.auth_gate(requires_auth)?;
        let retry = &self.config.write_retry;

        let Some(speculate) = speculate else {
            let response = self.call(retry, &request, token.as_ref()).await?;
            let _guards = self.locks.acquire(&roots).await;
            self.settle(id, &roots, &response, reconcile, cascade);
            debug!(mutation = %id, %request, "write confirmed");
            return Ok(response);
        };

        let _guards = self.locks.acquire(&roots).await;
        let rules = speculate(self.cache.as_ref())?;
        let scope = scopes(&rules);
        self.cache.cancel(&scope);
        let snapshot = self.cache.snapshot(&scope);
        self.cache.apply_rules(&rules);
        debug!(mutation = %id, %request, rules = rules.len(), "applied speculative rules");

        match self.call(retry, &request, token.as_ref()).await {
            Ok(response) => {
                self.settle(id, &roots, &response, reconcile, cascade);
                Ok(response)
            }
            Err(err) => {
                self.cache.restore(snapshot);
                self.stats.write().rollbacks += 1;
                warn!(mutation = %id, %request, error = %err, "write failed, rolled back");
                Err(err)
            }
        }
    }

    /// Like [`write`](Self::write), decoding the response.
    pub async fn write_as<R: DeserializeOwned>(&self, mutation: Mutation) -> SyncResult<R> {
        Ok(serde_json::from_value(self.write(mutation).await?)?)
    }

    /// Applies reconcile and cascade rules after a successful call.
    fn settle(
        &self,
        id: Uuid,
        roots: &[EntityKind],
        response: &serde_json::Value,
        reconcile: Option<Reconcile>,
        cascade: Option<Trigger>,
    ) {
        let mut rules = match reconcile.map(|reconcile| reconcile(response, self.cache.as_ref())) {
            Some(Ok(rules)) => rules,
            Some(Err(err)) => {
                warn!(mutation = %id, error = %err, "cannot reconcile response, invalidating roots");
                roots.iter().map(|kind| CacheRule::invalidate(*kind)).collect()
            }
            None => Vec::new(),
        };
        // reads started before the response would overwrite it
        let written: Vec<KeyPattern> = rules
            .iter()
            .filter(|rule| !matches!(rule, CacheRule::Invalidate { .. }))
            .map(CacheRule::scope)
            .collect();
        self.cache.cancel(&written);
        if let Some(trigger) = cascade {
            rules.extend(trigger.rules());
        }
        let applied = self.cache.apply_rules(&rules);
        debug!(mutation = %id, applied, "write settled");
    }

    /// Runs one call under `retry`.
    pub(crate) async fn call(
        &self,
        retry: &RetryConfig,
        request: &ApiRequest,
        token: Option<&SessionToken>,
    ) -> SyncResult<serde_json::Value> {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
                self.stats.write().retries += 1;
            }
            attempt += 1;

            match self.transport.execute(request, token).await {
                Ok(body) => {
                    self.stats.write().last_success = Some(Instant::now());
                    return Ok(body);
                }
                Err(err) if err.is_retryable() && retry.allows_retry_after(attempt) => {
                    warn!(%request, attempt, error = %err, "call failed, retrying");
                }
                Err(err) => {
                    let err = if err.is_retryable() && attempt > 1 {
                        SyncError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        }
                    } else {
                        err
                    };
                    self.stats.write().last_error = Some(err.to_string());
                    return Err(err);
                }
            }
        }
    }
}
