use crate::intake::Fragment;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContentSize {
    pub width: f32,
    pub height: f32,
}

impl ContentSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Zero or non-finite extents mean there is nothing to draw.
    pub fn is_renderable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// What the host will actually draw for one message.
#[derive(Debug, Clone, Copy)]
pub struct RenderContent<'a> {
    pub fragments: &'a [Fragment],
    pub show_avatar: bool,
}

/// Measures rendered content before placement.
///
/// Supplied by the host rendering layer so placement stays independent of
/// how text and images are laid out.
pub trait ContentMeasurer {
    fn measure(&self, content: &RenderContent<'_>, font_size: f32) -> ContentSize;
}

impl<F> ContentMeasurer for F
where
    F: Fn(&RenderContent<'_>, f32) -> ContentSize,
{
    fn measure(&self, content: &RenderContent<'_>, font_size: f32) -> ContentSize {
        self(content, font_size)
    }
}

/// Font-metric estimate for hosts without a layout engine.
///
/// ASCII glyphs count as narrow, everything else as full width. Images are
/// drawn one line tall and square, the avatar is followed by a small gap.
#[derive(Debug, Clone, Copy)]
pub struct EstimatingMeasurer {
    pub narrow_glyph_ratio: f32,
    pub wide_glyph_ratio: f32,
    pub line_height_ratio: f32,
    pub avatar_spacing_px: f32,
}

impl Default for EstimatingMeasurer {
    fn default() -> Self {
        Self {
            narrow_glyph_ratio: 0.55,
            wide_glyph_ratio: 1.0,
            line_height_ratio: 1.25,
            avatar_spacing_px: 4.0,
        }
    }
}

impl EstimatingMeasurer {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|glyph| {
                if glyph.is_ascii() {
                    self.narrow_glyph_ratio
                } else {
                    self.wide_glyph_ratio
                }
            })
            .sum::<f32>()
            * font_size
    }
}

impl ContentMeasurer for EstimatingMeasurer {
    fn measure(&self, content: &RenderContent<'_>, font_size: f32) -> ContentSize {
        let body_width = content
            .fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Text(text) => self.text_width(text, font_size),
                Fragment::Image { .. } => font_size,
            })
            .sum::<f32>();
        if body_width <= 0.0 {
            return ContentSize::default();
        }

        let avatar_width = if content.show_avatar {
            font_size + self.avatar_spacing_px
        } else {
            0.0
        };
        ContentSize::new(
            (body_width + avatar_width).ceil(),
            (font_size * self.line_height_ratio).ceil(),
        )
    }
}
