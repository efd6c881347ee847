use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::intake::Rank;

pub const DEFAULT_DISPLAY_TIME_SECONDS: f32 = 8.0;
/// Upper bound for `displayTime`; slower crossings are clamped to this.
pub const MAX_DISPLAY_TIME_SECONDS: f32 = 3600.0;
pub const DEFAULT_FONT_SIZE_PX: f32 = 28.0;
pub const DEFAULT_OPACITY: f32 = 1.0;
pub const DEFAULT_MAX_MESSAGES: usize = 100;
pub const DEFAULT_DISPLAY_AREA: f32 = 1.0;
pub const DEFAULT_MIN_VERTICAL_GAP_PX: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Tunables consumed by the engine. Key names match the stored preference
/// document; absent keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowSettings {
    pub enabled: bool,
    /// Seconds a message takes to cross the container width.
    pub display_time: f32,
    pub font_size: f32,
    pub opacity: f32,
    pub max_messages: usize,
    /// Fraction of the container height available for placement.
    pub display_area: f32,
    pub min_vertical_gap: f32,
    /// Horizontal clearance behind a tail before the entry point counts as
    /// free. Falls back to `font_size` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_gap: Option<f32>,
    pub show_owner: bool,
    pub show_moderator: bool,
    pub show_member: bool,
    pub show_normal: bool,
    pub avatar_owner: bool,
    pub avatar_moderator: bool,
    pub avatar_member: bool,
    pub avatar_normal: bool,
    pub color_owner: Rgb,
    pub color_moderator: Rgb,
    pub color_member: Rgb,
    pub color_normal: Rgb,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            display_time: DEFAULT_DISPLAY_TIME_SECONDS,
            font_size: DEFAULT_FONT_SIZE_PX,
            opacity: DEFAULT_OPACITY,
            max_messages: DEFAULT_MAX_MESSAGES,
            display_area: DEFAULT_DISPLAY_AREA,
            min_vertical_gap: DEFAULT_MIN_VERTICAL_GAP_PX,
            horizontal_gap: None,
            show_owner: true,
            show_moderator: true,
            show_member: true,
            show_normal: true,
            avatar_owner: true,
            avatar_moderator: false,
            avatar_member: false,
            avatar_normal: false,
            color_owner: Rgb::new(255, 215, 0),
            color_moderator: Rgb::new(94, 132, 241),
            color_member: Rgb::new(46, 204, 113),
            color_normal: Rgb::new(255, 255, 255),
        }
    }
}

/// Per-message presentation derived from settings at admission time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageStyle {
    pub color: Rgb,
    pub font_size: f32,
    pub opacity: f32,
    pub show_avatar: bool,
}

impl FlowSettings {
    /// Repairs values a hand-edited or older preference document may carry.
    pub fn normalized(mut self) -> Self {
        self.display_time = bounded_display_time(self.display_time);
        self.font_size = positive_or(self.font_size, DEFAULT_FONT_SIZE_PX);
        self.opacity = unit_or(self.opacity, DEFAULT_OPACITY);
        self.display_area = unit_or(self.display_area, DEFAULT_DISPLAY_AREA);
        self.min_vertical_gap = non_negative_or(self.min_vertical_gap, DEFAULT_MIN_VERTICAL_GAP_PX);
        self.horizontal_gap = self
            .horizontal_gap
            .filter(|gap| gap.is_finite())
            .map(|gap| gap.max(0.0));
        self
    }

    /// Safe on unnormalized values: out-of-range times are clamped, never
    /// converted as is.
    pub fn display_duration(&self) -> Duration {
        Duration::try_from_secs_f32(bounded_display_time(self.display_time))
            .unwrap_or(Duration::from_secs_f32(DEFAULT_DISPLAY_TIME_SECONDS))
    }

    pub fn horizontal_gap_px(&self) -> f32 {
        self.horizontal_gap.unwrap_or(self.font_size)
    }

    pub fn shows(&self, rank: Rank) -> bool {
        match rank {
            Rank::Owner => self.show_owner,
            Rank::Moderator => self.show_moderator,
            Rank::Member => self.show_member,
            Rank::Normal => self.show_normal,
        }
    }

    pub fn shows_avatar(&self, rank: Rank) -> bool {
        match rank {
            Rank::Owner => self.avatar_owner,
            Rank::Moderator => self.avatar_moderator,
            Rank::Member => self.avatar_member,
            Rank::Normal => self.avatar_normal,
        }
    }

    pub fn color(&self, rank: Rank) -> Rgb {
        match rank {
            Rank::Owner => self.color_owner,
            Rank::Moderator => self.color_moderator,
            Rank::Member => self.color_member,
            Rank::Normal => self.color_normal,
        }
    }

    pub fn style_for(&self, rank: Rank, has_avatar: bool) -> MessageStyle {
        MessageStyle {
            color: self.color(rank),
            font_size: self.font_size,
            opacity: self.opacity,
            show_avatar: has_avatar && self.shows_avatar(rank),
        }
    }
}

fn positive_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn bounded_display_time(value: f32) -> f32 {
    positive_or(value, DEFAULT_DISPLAY_TIME_SECONDS).min(MAX_DISPLAY_TIME_SECONDS)
}

fn non_negative_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

fn unit_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}
