use std::time::{Duration, Instant};

use crate::intake::{ChatMessage, StreamId};
use crate::settings::MessageStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

#[derive(Debug, Default)]
pub(crate) struct SlotIdAllocator {
    next: u64,
}

impl SlotIdAllocator {
    pub(crate) fn allocate(&mut self) -> SlotId {
        let id = SlotId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f32,
    pub height: f32,
}

impl ContainerSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Vertical band and horizontal trajectory of one admitted message.
///
/// `top`, the measured extent, and the motion parameters are fixed at
/// admission; only the horizontal position varies with time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub id: SlotId,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Pixels per second, leftwards.
    pub speed: f32,
    pub start_x: f32,
    pub admitted_at: Instant,
    /// Display duration in force when the slot was admitted.
    pub display_duration: Duration,
}

impl Slot {
    pub fn x_at(&self, now: Instant) -> f32 {
        self.start_x - self.speed * elapsed_seconds(self.admitted_at, now)
    }

    pub fn right_edge_at(&self, now: Instant) -> f32 {
        self.x_at(now) + self.width
    }

    pub fn has_exited(&self, now: Instant) -> bool {
        self.right_edge_at(now) < 0.0
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.admitted_at)
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        self.age(now) > self.display_duration
    }

    /// True when the bands `[top, top + height + gap]` of the two extents meet.
    pub fn band_overlaps(&self, top: f32, height: f32, vertical_gap: f32) -> bool {
        let clear_above = self.top + self.height + vertical_gap <= top;
        let clear_below = top + height + vertical_gap <= self.top;
        !(clear_above || clear_below)
    }
}

pub(crate) fn elapsed_seconds(since: Instant, now: Instant) -> f32 {
    now.saturating_duration_since(since).as_secs_f32()
}

#[derive(Debug, Clone)]
pub struct ActiveSlot {
    pub slot: Slot,
    pub message: ChatMessage,
    pub style: MessageStyle,
}

/// One overlay: its container geometry, in-flight messages in admission
/// order, and its own on/off switch.
#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    container: ContainerSize,
    active: Vec<ActiveSlot>,
    enabled: bool,
}

impl Stream {
    pub(crate) fn new(id: StreamId, container: ContainerSize) -> Self {
        Self {
            id,
            container,
            active: Vec::new(),
            enabled: true,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn container(&self) -> ContainerSize {
        self.container
    }

    pub(crate) fn set_container(&mut self, container: ContainerSize) {
        self.container = container;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn active_slots(&self) -> &[ActiveSlot] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn find_slot(&self, id: SlotId) -> Option<&ActiveSlot> {
        self.active.iter().find(|active| active.slot.id == id)
    }

    pub(crate) fn admit(&mut self, active: ActiveSlot) {
        self.active.push(active);
    }

    /// Removes every slot matching `predicate`, keeping the order of the rest.
    pub(crate) fn retire_where(
        &mut self,
        mut predicate: impl FnMut(&Slot) -> bool,
    ) -> Vec<ActiveSlot> {
        let mut retired = Vec::new();
        let mut kept = Vec::with_capacity(self.active.len());
        for active in self.active.drain(..) {
            if predicate(&active.slot) {
                retired.push(active);
            } else {
                kept.push(active);
            }
        }
        self.active = kept;
        retired
    }

    pub(crate) fn drain_all(&mut self) -> Vec<ActiveSlot> {
        std::mem::take(&mut self.active)
    }
}
