//! The query cache.
//!
//! [`QueryCache`] owns every cached query result. Data enters it only through
//! three paths:
//! - [`QueryCache::complete_fetch`], which stores a read result if the fetch
//!   was not cancelled in the meantime
//! - [`QueryCache::apply_rules`], the rule executor
//! - [`QueryCache::restore`] and the purge operations
//!
//! Each path runs under one exclusive lock, so readers never observe half of
//! a rule set.

use crate::change_feed::{CacheChange, CacheEvent, ChangeFeed};
use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::key::{KeyPattern, QueryKey};
use crate::list;
use crate::rule::CacheRule;
use crate::snapshot::CacheSnapshot;
use crate::stats::CacheStats;
use fitsync_protocol::EntityId;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Result of looking a key up for a read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Servable data.
    Fresh(serde_json::Value),
    /// Data exists but must be refetched.
    Stale(serde_json::Value),
    /// Nothing cached.
    Missing,
}

/// Permission to store the result of one fetch.
///
/// A ticket goes stale when its key is cancelled or purged, or when the
/// whole cache is purged, after it was issued. A ticket whose key is
/// invalidated after issue still stores its result, but the entry stays
/// marked for refetch.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
    epoch: u64,
    issued: u64,
}

impl FetchTicket {
    /// Key being fetched.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    generations: HashMap<QueryKey, u64>,
    invalidated_at: HashMap<QueryKey, u64>,
    clock: u64,
    epoch: u64,
    sequence: u64,
}

impl CacheState {
    fn event(&mut self, key: QueryKey, change: CacheChange) -> CacheEvent {
        self.sequence += 1;
        CacheEvent {
            sequence: self.sequence,
            key,
            change,
        }
    }

    fn matching_keys(&self, patterns: &[KeyPattern]) -> Vec<QueryKey> {
        self.entries
            .keys()
            .filter(|k| patterns.iter().any(|p| p.matches(k)))
            .cloned()
            .collect()
    }

    fn cancel(&mut self, patterns: &[KeyPattern]) -> usize {
        let mut cancelled = 0;
        for (key, generation) in &mut self.generations {
            if patterns.iter().any(|p| p.matches(key)) {
                *generation += 1;
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Records that every fetched key `pattern` selects was invalidated now.
    fn stamp_invalidation(&mut self, pattern: &KeyPattern) {
        self.clock += 1;
        let at = self.clock;
        for key in self.generations.keys().filter(|k| pattern.matches(k)) {
            self.invalidated_at.insert(key.clone(), at);
        }
    }

    fn invalidated_since(&self, ticket: &FetchTicket) -> bool {
        self.invalidated_at
            .get(&ticket.key)
            .is_some_and(|&at| at > ticket.issued)
    }
}

/// Process-wide cache of query results.
pub struct QueryCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
    stats: CacheStats,
    feed: ChangeFeed,
}

impl QueryCache {
    /// Creates an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        let feed = ChangeFeed::with_max_history(config.max_history);
        Self {
            config,
            state: RwLock::new(CacheState::default()),
            stats: CacheStats::default(),
            feed,
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> Receiver<CacheEvent> {
        self.feed.subscribe()
    }

    /// Polls change events after `cursor`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<CacheEvent> {
        self.feed.poll(cursor, limit)
    }

    /// Copy of an entry, without touching statistics.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.state.read().entries.get(key).cloned()
    }

    /// Cached data of an entry, fresh or not.
    pub fn data(&self, key: &QueryKey) -> Option<serde_json::Value> {
        self.state.read().entries.get(key).map(|e| e.data.clone())
    }

    /// Looks a key up for a read, counting a hit or a miss.
    pub fn lookup(&self, key: &QueryKey, stale_time: Duration) -> Lookup {
        let lookup = match self.state.read().entries.get(key) {
            None => Lookup::Missing,
            Some(entry) if entry.is_stale(stale_time) => Lookup::Stale(entry.data.clone()),
            Some(entry) => Lookup::Fresh(entry.data.clone()),
        };
        if matches!(lookup, Lookup::Fresh(_)) {
            self.stats.record_hit();
            tracing::debug!(key = %key, "cache hit");
        } else {
            self.stats.record_miss();
            tracing::debug!(key = %key, fingerprint = %key.fingerprint(), "cache miss");
        }
        lookup
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Keys selected by a pattern.
    pub fn keys(&self, pattern: &KeyPattern) -> Vec<QueryKey> {
        self.state
            .read()
            .matching_keys(std::slice::from_ref(pattern))
    }

    /// Finds a record by id in the entries selected by `pattern`.
    ///
    /// Single-record entries are preferred over list members.
    pub fn find_record(&self, pattern: &KeyPattern, id: &EntityId) -> Option<serde_json::Value> {
        let state = self.state.read();
        let mut from_list = None;
        for (key, entry) in &state.entries {
            if !pattern.matches(key) {
                continue;
            }
            if let Some(found) = list::find(&entry.data, id) {
                if !list::is_list(&entry.data) {
                    return Some(found.clone());
                }
                from_list.get_or_insert_with(|| found.clone());
            }
        }
        from_list
    }

    /// Every distinct record held by the entries selected by `pattern`.
    ///
    /// Records with an id are returned once; the single-record copy wins.
    pub fn records(&self, pattern: &KeyPattern) -> Vec<serde_json::Value> {
        let state = self.state.read();
        let mut singles = Vec::new();
        let mut listed = Vec::new();
        for (key, entry) in &state.entries {
            if !pattern.matches(key) {
                continue;
            }
            if list::is_list(&entry.data) {
                listed.extend(list::records(&entry.data));
            } else {
                singles.extend(list::records(&entry.data));
            }
        }
        let mut seen = HashSet::new();
        singles
            .into_iter()
            .chain(listed)
            .filter(|r| match EntityId::of_record(r) {
                Some(id) => seen.insert(id),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Issues a ticket for fetching `key`.
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchTicket {
        let mut state = self.state.write();
        let generation = *state.generations.entry(key.clone()).or_insert(0);
        state.clock += 1;
        FetchTicket {
            key: key.clone(),
            generation,
            epoch: state.epoch,
            issued: state.clock,
        }
    }

    /// Returns true if the ticket has not been cancelled.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        let state = self.state.read();
        Self::ticket_current(&state, ticket)
    }

    fn ticket_current(state: &CacheState, ticket: &FetchTicket) -> bool {
        state.epoch == ticket.epoch
            && state.generations.get(&ticket.key).copied() == Some(ticket.generation)
    }

    /// Stores a fetch result if its ticket is still current.
    ///
    /// Returns false, storing nothing, if the fetch was cancelled.
    pub fn complete_fetch(&self, ticket: &FetchTicket, data: serde_json::Value) -> bool {
        let event = {
            let mut state = self.state.write();
            if !Self::ticket_current(&state, ticket) {
                None
            } else {
                let outdated = state.invalidated_since(ticket);
                if outdated {
                    tracing::debug!(key = %ticket.key, "fetch finished after an invalidation, keeping it stale");
                }
                let entry = state
                    .entries
                    .entry(ticket.key.clone())
                    .or_insert_with(|| CacheEntry::new(serde_json::Value::Null));
                entry.touch(data);
                entry.invalidated = outdated;
                Some(state.event(ticket.key.clone(), CacheChange::Updated))
            }
        };
        self.stats.record_fetch(event.is_some());
        match event {
            Some(event) => {
                self.feed.emit_batch(vec![event]);
                true
            }
            None => {
                tracing::debug!(key = %ticket.key, "discarded cancelled fetch");
                false
            }
        }
    }

    /// Cancels in-flight fetches of every key selected by `patterns`.
    pub fn cancel(&self, patterns: &[KeyPattern]) -> usize {
        let cancelled = self.state.write().cancel(patterns);
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled in-flight fetches");
        }
        cancelled
    }

    /// Executes rules in order under one exclusive section.
    ///
    /// Each rule sees the state left by the previous one. Returns the number
    /// of entry edits made.
    pub fn apply_rules(&self, rules: &[CacheRule]) -> usize {
        if rules.is_empty() {
            return 0;
        }
        let mut invalidated = 0;
        let events = {
            let mut state = self.state.write();
            let mut changes = Vec::new();
            for rule in rules {
                let before = changes.len();
                if let CacheRule::Invalidate { pattern } = rule {
                    state.stamp_invalidation(pattern);
                }
                apply_rule(&mut state.entries, rule, &mut changes);
                tracing::debug!(
                    rule = rule.name(),
                    scope = %rule.scope(),
                    edits = changes.len() - before,
                    "applied cache rule"
                );
            }
            changes
                .into_iter()
                .map(|(key, change)| {
                    if change == CacheChange::Invalidated {
                        invalidated += 1;
                    }
                    state.event(key, change)
                })
                .collect::<Vec<_>>()
        };
        self.stats.record_rules(rules.len());
        self.stats.record_invalidations(invalidated);
        let edits = events.len();
        self.feed.emit_batch(events);
        edits
    }

    /// Captures every entry `scope` selects.
    ///
    /// Exact patterns with no entry are recorded as absent, so a restore
    /// removes entries created after the snapshot.
    pub fn snapshot(&self, scope: &[KeyPattern]) -> CacheSnapshot {
        let state = self.state.read();
        let mut entries: Vec<(QueryKey, Option<CacheEntry>)> = state
            .entries
            .iter()
            .filter(|(k, _)| scope.iter().any(|p| p.matches(k)))
            .map(|(k, e)| (k.clone(), Some(e.clone())))
            .collect();
        for pattern in scope {
            if let KeyPattern::Exact(key) = pattern {
                if !state.entries.contains_key(key) && !entries.iter().any(|(k, _)| k == key) {
                    entries.push((key.clone(), None));
                }
            }
        }
        drop(state);
        self.stats.record_snapshot();
        CacheSnapshot::new(scope.to_vec(), entries)
    }

    /// Puts every entry in the snapshot's scope back to its captured state.
    ///
    /// Entries created in scope after the snapshot are removed.
    pub fn restore(&self, snapshot: CacheSnapshot) {
        let (scope, captured) = snapshot.into_parts();
        let events = {
            let mut state = self.state.write();
            let mut events = Vec::new();
            let captured_keys: HashSet<&QueryKey> = captured.iter().map(|(k, _)| k).collect();
            for key in state.matching_keys(&scope) {
                if !captured_keys.contains(&key) {
                    state.entries.remove(&key);
                    events.push((key, CacheChange::Removed));
                }
            }
            for (key, entry) in captured {
                match entry {
                    Some(entry) => {
                        let changed = state.entries.get(&key) != Some(&entry);
                        state.entries.insert(key.clone(), entry);
                        if changed {
                            events.push((key, CacheChange::Updated));
                        }
                    }
                    None => {
                        if state.entries.remove(&key).is_some() {
                            events.push((key, CacheChange::Removed));
                        }
                    }
                }
            }
            events
                .into_iter()
                .map(|(key, change)| state.event(key, change))
                .collect::<Vec<_>>()
        };
        self.stats.record_rollback();
        tracing::warn!(restored = events.len(), "restored cache snapshot");
        self.feed.emit_batch(events);
    }

    /// Removes every entry `patterns` select and cancels their fetches.
    pub fn purge(&self, patterns: &[KeyPattern]) -> usize {
        let events = {
            let mut state = self.state.write();
            state.cancel(patterns);
            let keys = state.matching_keys(patterns);
            for key in &keys {
                state.entries.remove(key);
            }
            keys.into_iter()
                .map(|key| state.event(key, CacheChange::Removed))
                .collect::<Vec<_>>()
        };
        self.stats.record_purge();
        let removed = events.len();
        self.feed.emit_batch(events);
        removed
    }

    /// Removes everything and invalidates every outstanding fetch ticket.
    pub fn purge_all(&self) -> usize {
        let events = {
            let mut state = self.state.write();
            state.epoch += 1;
            state.generations.clear();
            state.invalidated_at.clear();
            let keys: Vec<QueryKey> = state.entries.drain().map(|(k, _)| k).collect();
            keys.into_iter()
                .map(|key| state.event(key, CacheChange::Removed))
                .collect::<Vec<_>>()
        };
        self.stats.record_purge();
        let removed = events.len();
        tracing::info!(removed, "purged cache");
        self.feed.emit_batch(events);
        removed
    }

    pub(crate) fn export(&self) -> Vec<(QueryKey, CacheEntry)> {
        self.state
            .read()
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Inserts entries whose keys are not already cached.
    pub(crate) fn import(&self, entries: Vec<(QueryKey, CacheEntry)>) -> usize {
        let events = {
            let mut state = self.state.write();
            let mut inserted = Vec::new();
            for (key, entry) in entries {
                if !state.entries.contains_key(&key) {
                    state.entries.insert(key.clone(), entry);
                    inserted.push(key);
                }
            }
            inserted
                .into_iter()
                .map(|key| state.event(key, CacheChange::Updated))
                .collect::<Vec<_>>()
        };
        let count = events.len();
        self.feed.emit_batch(events);
        count
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn edit_lists(
    entries: &mut HashMap<QueryKey, CacheEntry>,
    pattern: &KeyPattern,
    changes: &mut Vec<(QueryKey, CacheChange)>,
    edit: impl Fn(&mut serde_json::Value) -> bool,
) {
    for (key, entry) in entries.iter_mut() {
        if pattern.matches(key) && edit(&mut entry.data) {
            changes.push((key.clone(), CacheChange::Updated));
        }
    }
}

fn apply_rule(
    entries: &mut HashMap<QueryKey, CacheEntry>,
    rule: &CacheRule,
    changes: &mut Vec<(QueryKey, CacheChange)>,
) {
    match rule {
        CacheRule::InsertIntoList {
            pattern,
            record,
            position,
        } => edit_lists(entries, pattern, changes, |doc| {
            list::insert(doc, record, *position)
        }),
        CacheRule::ReplaceInList {
            pattern,
            id,
            record,
        } => edit_lists(entries, pattern, changes, |doc| list::replace(doc, id, record)),
        CacheRule::RemoveFromList { pattern, id } => {
            edit_lists(entries, pattern, changes, |doc| list::remove(doc, id));
        }
        CacheRule::SetSingleton { key, record } => {
            match entries.get_mut(key) {
                Some(entry) => entry.touch(record.clone()),
                None => {
                    entries.insert(key.clone(), CacheEntry::new(record.clone()));
                }
            }
            changes.push((key.clone(), CacheChange::Updated));
        }
        CacheRule::Invalidate { pattern } => {
            for (key, entry) in entries.iter_mut() {
                if pattern.matches(key) && !entry.invalidated {
                    entry.invalidated = true;
                    changes.push((key.clone(), CacheChange::Invalidated));
                }
            }
        }
        CacheRule::AdjustCounter { key, path, delta } => {
            if let Some(entry) = entries.get_mut(key) {
                if list::adjust_counter(&mut entry.data, path, *delta) {
                    changes.push((key.clone(), CacheChange::Updated));
                }
            }
        }
    }
}
