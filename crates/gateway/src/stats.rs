//! In-memory outcome counters for outbound gateway calls.

use crate::Method;
use partnergate_types::ErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global call counters, updated once per [`crate::RequestGateway`] call.
#[derive(Default)]
pub struct GatewayStats {
    /// Total outbound calls.
    pub total_calls: AtomicU64,
    /// Calls that returned a 2xx response.
    pub success_calls: AtomicU64,
    /// Calls that ended in a `GatewayError`.
    pub failure_calls: AtomicU64,
    /// Failures per error kind.
    kinds: Mutex<BTreeMap<ErrorKind, u64>>,
    /// Per-method counters.
    methods: Mutex<BTreeMap<&'static str, MethodStats>>,
}

/// Per-method counters.
#[derive(Default, Clone, Serialize)]
pub struct MethodStats {
    pub calls: u64,
    pub success: u64,
    pub failure: u64,
}

/// JSON-serializable snapshot of current counters.
#[derive(Serialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub success_calls: u64,
    pub failure_calls: u64,
    pub failures_by_kind: BTreeMap<&'static str, u64>,
    pub methods: BTreeMap<&'static str, MethodStats>,
}

impl GatewayStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, method: Method) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_calls.fetch_add(1, Ordering::Relaxed);

        let mut methods = lock(&self.methods);
        let entry = methods.entry(method.as_str()).or_default();
        entry.calls += 1;
        entry.success += 1;
    }

    pub fn record_failure(&self, method: Method, kind: ErrorKind) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_calls.fetch_add(1, Ordering::Relaxed);

        *lock(&self.kinds).entry(kind).or_default() += 1;
        let mut methods = lock(&self.methods);
        let entry = methods.entry(method.as_str()).or_default();
        entry.calls += 1;
        entry.failure += 1;
    }

    /// Take a JSON-serializable snapshot of current counters.
    ///
    /// Every error kind is listed, with zero for kinds that never occurred.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let failures_by_kind = {
            let kinds = lock(&self.kinds);
            ErrorKind::ALL
                .into_iter()
                .map(|k| (k.as_str(), kinds.get(&k).copied().unwrap_or(0)))
                .collect()
        };
        let methods = lock(&self.methods).clone();
        StatsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            success_calls: self.success_calls.load(Ordering::Relaxed),
            failure_calls: self.failure_calls.load(Ordering::Relaxed),
            failures_by_kind,
            methods,
        }
    }
}

/// Counters stay usable after a panicking writer poisoned the lock.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
