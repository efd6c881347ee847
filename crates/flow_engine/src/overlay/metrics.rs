use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use super::placement::Rejection;
use super::scheduler::RetireReason;

static FLOW_METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_flow_metrics_lock_poison_once(operation: &'static str) {
    if FLOW_METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "flow metrics lock poisoned; recovered inner value");
    }
}

/// Rates are per second over the last interval, totals are since start.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowMetricsSnapshot {
    pub admissions_per_sec: f32,
    pub ticks_per_sec: f32,
    pub active_slots: usize,
    pub admitted_total: u64,
    pub rejected_total: u64,
    pub filtered_total: u64,
    pub retired_total: u64,
    pub stale_total: u64,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<FlowMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(FlowMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> FlowMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_flow_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub fn publish(&self, snapshot: FlowMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_flow_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    admissions: u32,
    ticks: u32,
    admitted_total: u64,
    rejected_total: u64,
    filtered_total: u64,
    retired_total: u64,
    stale_total: u64,
}

impl MetricsAccumulator {
    pub fn new(interval: Duration) -> Self {
        Self::new_at(interval, Instant::now())
    }

    pub fn new_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval_start: start,
            interval,
            admissions: 0,
            ticks: 0,
            admitted_total: 0,
            rejected_total: 0,
            filtered_total: 0,
            retired_total: 0,
            stale_total: 0,
        }
    }

    pub fn record_admission(&mut self) {
        self.admissions = self.admissions.saturating_add(1);
        self.admitted_total = self.admitted_total.saturating_add(1);
    }

    /// Filters (disabled, hidden rank, duplicates) are counted apart from
    /// placement failures.
    pub fn record_rejection(&mut self, rejection: Rejection) {
        if rejection.is_filter() {
            self.filtered_total = self.filtered_total.saturating_add(1);
        } else {
            self.rejected_total = self.rejected_total.saturating_add(1);
        }
    }

    pub fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn record_retired(&mut self, reason: RetireReason, count: usize) {
        let count = count as u64;
        self.retired_total = self.retired_total.saturating_add(count);
        if reason == RetireReason::Stale {
            self.stale_total = self.stale_total.saturating_add(count);
        }
    }

    pub fn maybe_snapshot(&mut self, now: Instant, active_slots: usize) -> Option<FlowMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let snapshot = FlowMetricsSnapshot {
            admissions_per_sec: self.admissions as f32 / elapsed_seconds,
            ticks_per_sec: self.ticks as f32 / elapsed_seconds,
            active_slots,
            admitted_total: self.admitted_total,
            rejected_total: self.rejected_total,
            filtered_total: self.filtered_total,
            retired_total: self.retired_total,
            stale_total: self.stale_total,
        };

        self.interval_start = now;
        self.admissions = 0;
        self.ticks = 0;

        Some(snapshot)
    }
}
