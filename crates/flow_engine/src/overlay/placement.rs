use std::time::{Duration, Instant};

use crate::settings::FlowSettings;

use super::stream::{ActiveSlot, ContainerSize, Slot};

/// Why a message did not become an admission. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    GloballyDisabled,
    EmptyContent,
    Duplicate,
    StreamNotFound,
    StreamDisabled,
    RankHidden,
    InvalidContainer,
    AtCapacity,
    NoVerticalRoom,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::GloballyDisabled => "globally_disabled",
            Rejection::EmptyContent => "empty_content",
            Rejection::Duplicate => "duplicate",
            Rejection::StreamNotFound => "stream_not_found",
            Rejection::StreamDisabled => "stream_disabled",
            Rejection::RankHidden => "rank_hidden",
            Rejection::InvalidContainer => "invalid_container",
            Rejection::AtCapacity => "at_capacity",
            Rejection::NoVerticalRoom => "no_vertical_room",
        }
    }

    /// Filter drops happen before a placement attempt; the rest are
    /// admission-control outcomes of the attempt itself.
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            Rejection::GloballyDisabled
                | Rejection::EmptyContent
                | Rejection::Duplicate
                | Rejection::StreamNotFound
                | Rejection::StreamDisabled
                | Rejection::RankHidden
        )
    }
}

/// Inputs to one placement decision, captured from the settings and the
/// container at admission time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementParams {
    pub container: ContainerSize,
    pub display_duration: Duration,
    pub display_area: f32,
    pub min_vertical_gap: f32,
    pub horizontal_gap: f32,
    pub max_messages: usize,
}

impl PlacementParams {
    pub fn from_settings(container: ContainerSize, settings: &FlowSettings) -> Self {
        Self {
            container,
            display_duration: settings.display_duration(),
            display_area: settings.display_area,
            min_vertical_gap: settings.min_vertical_gap,
            horizontal_gap: settings.horizontal_gap_px(),
            max_messages: settings.max_messages,
        }
    }

    pub fn usable_height(&self) -> f32 {
        self.container.height * self.display_area
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementPlan {
    pub top: f32,
    pub speed: f32,
    pub start_x: f32,
}

/// Every message admitted under the same width and duration moves at this
/// speed, so two of them that do not overlap now never will.
pub fn uniform_speed(container_width: f32, display_duration: Duration) -> f32 {
    let seconds = display_duration.as_secs_f32();
    if seconds > 0.0 {
        container_width / seconds
    } else {
        container_width
    }
}

/// Bands scanned per placement attempt, whatever the content height.
pub const MAX_CANDIDATE_BANDS: u32 = 512;

/// Scans candidate tops from 0 in steps of `height + min_vertical_gap` and
/// returns the first one whose band is clear of every in-flight tail. At most
/// `MAX_CANDIDATE_BANDS` tops are tried.
pub fn plan_placement(
    active: &[ActiveSlot],
    width: f32,
    height: f32,
    params: &PlacementParams,
    now: Instant,
) -> Result<PlacementPlan, Rejection> {
    if !params.container.is_usable() {
        return Err(Rejection::InvalidContainer);
    }
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(Rejection::EmptyContent);
    }
    if active.len() >= params.max_messages {
        return Err(Rejection::AtCapacity);
    }

    let speed = uniform_speed(params.container.width, params.display_duration);
    let step = height + params.min_vertical_gap;
    let usable_height = params.usable_height();

    for index in 0..MAX_CANDIDATE_BANDS {
        let top = index as f32 * step;
        if top + step > usable_height {
            break;
        }
        let blocked = active
            .iter()
            .any(|existing| blocks_entry(&existing.slot, top, height, speed, params, now));
        if !blocked {
            return Ok(PlacementPlan {
                top,
                speed,
                start_x: params.container.width,
            });
        }
    }
    Err(Rejection::NoVerticalRoom)
}

/// Tail-clear test for a candidate entering at the right edge.
///
/// With equal speeds only the current tail position matters. A faster
/// candidate (after a resize or a display-time change) must additionally
/// still be clear when that tail leaves the left edge; the gap between the
/// two changes linearly, so checking both ends covers the whole traversal.
fn blocks_entry(
    existing: &Slot,
    top: f32,
    height: f32,
    speed: f32,
    params: &PlacementParams,
    now: Instant,
) -> bool {
    if !existing.band_overlaps(top, height, params.min_vertical_gap) {
        return false;
    }

    let entry_x = params.container.width;
    let tail = existing.right_edge_at(now);
    if tail + params.horizontal_gap > entry_x {
        return true;
    }

    if speed > existing.speed && tail > 0.0 {
        if existing.speed <= 0.0 {
            return true;
        }
        let tail_exit_seconds = tail / existing.speed;
        let candidate_left_at_exit = entry_x - speed * tail_exit_seconds;
        if candidate_left_at_exit < params.horizontal_gap {
            return true;
        }
    }
    false
}
