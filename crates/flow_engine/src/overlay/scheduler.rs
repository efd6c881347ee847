use std::time::Instant;

use tracing::{debug, info};

use crate::intake::StreamId;

use super::registry::StreamRegistry;
use super::stream::{ActiveSlot, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetireReason {
    /// Trailing edge passed the left side of the container.
    Exited,
    /// Outlived its display duration while frames were not delivered.
    Stale,
    StreamDestroyed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotPosition {
    pub stream_id: StreamId,
    pub slot_id: SlotId,
    pub x: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetiredSlot {
    pub stream_id: StreamId,
    pub slot_id: SlotId,
    pub message_id: String,
    pub reason: RetireReason,
}

impl RetiredSlot {
    pub(crate) fn from_active(stream_id: &StreamId, active: &ActiveSlot, reason: RetireReason) -> Self {
        Self {
            stream_id: stream_id.clone(),
            slot_id: active.slot.id,
            message_id: active.message.id.clone(),
            reason,
        }
    }
}

/// What the host must apply to its render surface after a tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub moved: Vec<SlotPosition>,
    pub retired: Vec<RetiredSlot>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.retired.is_empty()
    }

    pub fn retired_count(&self, reason: RetireReason) -> usize {
        self.retired
            .iter()
            .filter(|retired| retired.reason == reason)
            .count()
    }

    fn append(&mut self, mut other: TickReport) {
        self.moved.append(&mut other.moved);
        self.retired.append(&mut other.retired);
    }
}

/// Single shared clock driving every stream.
///
/// Idle while no stream has an in-flight message: ticks are no-ops and
/// `is_running` is false until the next admission wakes it.
#[derive(Debug, Default)]
pub struct MotionScheduler {
    running: bool,
    last_tick: Option<Instant>,
}

impl MotionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_tick(&self) -> Option<Instant> {
        self.last_tick
    }

    pub(crate) fn wake(&mut self) {
        if !self.running {
            debug!("motion_loop_started");
        }
        self.running = true;
    }

    pub fn tick(&mut self, registry: &mut StreamRegistry, now: Instant) -> TickReport {
        if !self.running {
            return TickReport::default();
        }
        self.last_tick = Some(now);

        let mut report = TickReport::default();
        for stream in registry.streams_mut() {
            let stream_id = stream.id().clone();
            let exited = stream.retire_where(|slot| slot.has_exited(now));
            report.retired.extend(
                exited
                    .iter()
                    .map(|active| RetiredSlot::from_active(&stream_id, active, RetireReason::Exited)),
            );
            report
                .moved
                .extend(stream.active_slots().iter().map(|active| SlotPosition {
                    stream_id: stream_id.clone(),
                    slot_id: active.slot.id,
                    x: active.slot.x_at(now),
                }));
        }

        if registry.total_active() == 0 {
            debug!("motion_loop_idle");
            self.running = false;
        }
        report
    }

    /// Recovery after the host view was hidden: frames stopped but time did
    /// not. Slots older than their display duration are retired outright,
    /// then survivors get a normal tick.
    pub fn resume(&mut self, registry: &mut StreamRegistry, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        for stream in registry.streams_mut() {
            let stream_id = stream.id().clone();
            let stale = stream.retire_where(|slot| slot.is_stale(now));
            report.retired.extend(
                stale
                    .iter()
                    .map(|active| RetiredSlot::from_active(&stream_id, active, RetireReason::Stale)),
            );
        }

        let purged = report.retired.len();
        let remaining = registry.total_active();
        if purged > 0 {
            info!(purged, remaining, "stale_slots_purged");
        }

        if remaining > 0 {
            self.wake();
            report.append(self.tick(registry, now));
        } else {
            self.running = false;
        }
        report
    }
}
