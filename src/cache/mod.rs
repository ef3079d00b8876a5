//! Time-expiring cache of prerequisite test results.
//!
//! Entries expire lazily: a read that finds `now > timestamp + expiry`
//! evicts the entry and reports a miss. [`PrerequisiteCache::resolve`] adds
//! single-flight semantics on top: while a miss for a test id is being
//! resolved, later callers for the same id wait for that execution instead of
//! starting their own.

mod clock;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::model::TestCaseId;
use crate::model::prerequisite::DEFAULT_CACHE_EXPIRY_MS;

pub use clock::{Clock, ManualClock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedResult {
    Pass,
    Fail,
}

impl fmt::Display for CachedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub test_case_id: TestCaseId,
    pub result: CachedResult,
    pub timestamp_ms: u64,
    pub expiry_ms: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.timestamp_ms.saturating_add(self.expiry_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Where a resolved result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A fresh passing entry was already cached.
    Cache,
    /// This caller ran the prerequisite.
    Executed,
    /// Another caller was already running it; this one waited.
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub result: CachedResult,
    pub source: ResolutionSource,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<TestCaseId, CacheEntry>,
    hits: u64,
    misses: u64,
}

struct Flight {
    outcome: Mutex<Option<CachedResult>>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> CachedResult {
        let mut outcome = lock(&self.outcome);
        loop {
            if let Some(result) = *outcome {
                return result;
            }
            outcome = self
                .done
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Concurrency-safe prerequisite result cache.
pub struct PrerequisiteCache {
    clock: Arc<dyn Clock>,
    enabled: bool,
    default_expiry_ms: u64,
    state: Mutex<CacheState>,
    in_flight: Mutex<HashMap<TestCaseId, Arc<Flight>>>,
}

impl PrerequisiteCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            enabled: true,
            default_expiry_ms: DEFAULT_CACHE_EXPIRY_MS,
            state: Mutex::new(CacheState::default()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that never stores anything; every resolution executes.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(Arc::new(SystemClock::new()))
        }
    }

    /// Expiry applied to cacheable dependencies that do not set their own.
    pub fn with_default_expiry(mut self, expiry_ms: u64) -> Self {
        self.default_expiry_ms = expiry_ms;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_expiry_ms(&self) -> u64 {
        self.default_expiry_ms
    }

    /// Look up an entry, evicting it if it has expired.
    pub fn get(&self, test_case_id: &str) -> Option<CacheEntry> {
        let now = self.clock.now_ms();
        let mut state = lock(&self.state);
        let expired = match state.entries.get(test_case_id) {
            Some(entry) if !entry.is_expired(now) => {
                let entry = entry.clone();
                state.hits += 1;
                return Some(entry);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(test_case_id);
            tracing::debug!(test_case = test_case_id, "cache entry expired");
        }
        state.misses += 1;
        None
    }

    /// Store a result, replacing any existing entry for the test.
    pub fn put(&self, test_case_id: &str, result: CachedResult, expiry_ms: u64) {
        if !self.enabled {
            return;
        }
        let entry = CacheEntry {
            test_case_id: test_case_id.to_owned(),
            result,
            timestamp_ms: self.clock.now_ms(),
            expiry_ms,
        };
        lock(&self.state)
            .entries
            .insert(test_case_id.to_owned(), entry);
    }

    /// Whether a fresh passing entry exists. Does not touch statistics.
    pub fn is_fresh(&self, test_case_id: &str) -> bool {
        let now = self.clock.now_ms();
        lock(&self.state)
            .entries
            .get(test_case_id)
            .is_some_and(|e| e.result == CachedResult::Pass && !e.is_expired(now))
    }

    /// Drop the entry for one test. Returns whether an entry existed.
    pub fn invalidate(&self, test_case_id: &str) -> bool {
        lock(&self.state).entries.remove(test_case_id).is_some()
    }

    /// Drop every entry. Hit and miss counters are kept.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        let dropped = state.entries.len();
        state.entries.clear();
        tracing::info!(dropped, "prerequisite cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        CacheStats {
            entry_count: state.entries.len(),
            hit_count: state.hits,
            miss_count: state.misses,
        }
    }

    /// Count a hit for a fresh passing entry; anything else is a miss, since
    /// the caller is about to execute.
    fn take_fresh_pass(&self, test_case_id: &str) -> bool {
        let now = self.clock.now_ms();
        let mut state = lock(&self.state);
        let found = state
            .entries
            .get(test_case_id)
            .map(|entry| (entry.is_expired(now), entry.result));
        match found {
            Some((false, CachedResult::Pass)) => {
                state.hits += 1;
                return true;
            }
            Some((true, _)) => {
                state.entries.remove(test_case_id);
                tracing::debug!(test_case = test_case_id, "cache entry expired");
            }
            _ => {}
        }
        state.misses += 1;
        false
    }

    /// Resolve a cacheable prerequisite, running `execute` only when needed.
    ///
    /// A fresh passing entry is returned without executing. Otherwise at most
    /// one caller per test id runs `execute`; concurrent callers block until
    /// it finishes and observe the same result. Only passes are stored. If
    /// `execute` fails or panics, waiters see [`CachedResult::Fail`] and the
    /// next call executes again.
    pub fn resolve<F>(&self, test_case_id: &str, expiry_ms: u64, execute: F) -> Resolution
    where
        F: FnOnce() -> CachedResult,
    {
        if !self.enabled {
            return Resolution {
                result: execute(),
                source: ResolutionSource::Executed,
            };
        }

        let flight = {
            let mut in_flight = lock(&self.in_flight);
            if self.take_fresh_pass(test_case_id) {
                tracing::debug!(test_case = test_case_id, "prerequisite served from cache");
                return Resolution {
                    result: CachedResult::Pass,
                    source: ResolutionSource::Cache,
                };
            }
            match in_flight.get(test_case_id) {
                Some(flight) => Err(Arc::clone(flight)),
                None => {
                    let flight = Arc::new(Flight::new());
                    in_flight.insert(test_case_id.to_owned(), Arc::clone(&flight));
                    Ok(flight)
                }
            }
        };

        match flight {
            Ok(flight) => {
                let mut guard = FlightGuard {
                    cache: self,
                    test_case_id,
                    expiry_ms,
                    flight,
                    finished: false,
                };
                let result = execute();
                guard.finish(result);
                tracing::debug!(test_case = test_case_id, %result, "prerequisite executed");
                Resolution {
                    result,
                    source: ResolutionSource::Executed,
                }
            }
            Err(flight) => {
                tracing::debug!(test_case = test_case_id, "waiting on in-flight prerequisite");
                Resolution {
                    result: flight.wait(),
                    source: ResolutionSource::Coalesced,
                }
            }
        }
    }
}

/// Completes a flight exactly once, even if the executing closure unwinds.
struct FlightGuard<'a> {
    cache: &'a PrerequisiteCache,
    test_case_id: &'a str,
    expiry_ms: u64,
    flight: Arc<Flight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(&mut self, result: CachedResult) {
        if self.finished {
            return;
        }
        self.finished = true;

        // store before unregistering so late arrivals find the entry
        if result == CachedResult::Pass {
            self.cache.put(self.test_case_id, result, self.expiry_ms);
        }
        {
            let mut in_flight = lock(&self.cache.in_flight);
            if in_flight
                .get(self.test_case_id)
                .is_some_and(|f| Arc::ptr_eq(f, &self.flight))
            {
                in_flight.remove(self.test_case_id);
            }
        }
        *lock(&self.flight.outcome) = Some(result);
        self.flight.done.notify_all();
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(test_case = self.test_case_id, "prerequisite execution aborted");
            self.finish(CachedResult::Fail);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
