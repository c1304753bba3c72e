//! Color palette and terminal rendering.
//!
//! Each discovered log gets its own color so interleaved output stays
//! readable. Tokens are handed out round-robin from a fixed palette of
//! eleven entries.

use crossterm::style::{Attribute, Color, ContentStyle};
use ptail_config::{ColorName, ColorToken};

/// Palette in hand-out order: five solo foregrounds, then grey on six backgrounds.
pub const PALETTE: [ColorToken; 11] = [
    ColorToken::solo(ColorName::Green),
    ColorToken::solo(ColorName::Yellow),
    ColorToken::solo(ColorName::Blue),
    ColorToken::solo(ColorName::Magenta),
    ColorToken::solo(ColorName::Cyan),
    ColorToken::on(ColorName::Grey, ColorName::Green),
    ColorToken::on(ColorName::Grey, ColorName::Yellow),
    ColorToken::on(ColorName::Grey, ColorName::Blue),
    ColorToken::on(ColorName::Grey, ColorName::Magenta),
    ColorToken::on(ColorName::Grey, ColorName::Cyan),
    ColorToken::on(ColorName::Grey, ColorName::White),
];

/// Round-robin color dispenser.
///
/// The cursor is per instance, so independent orchestrators never
/// share a color sequence.
#[derive(Debug, Clone, Default)]
pub struct ColorPalette {
    cursor: usize,
}

impl ColorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token at the cursor; advances and wraps.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> ColorToken {
        let token = PALETTE[self.cursor];
        self.cursor = (self.cursor + 1) % PALETTE.len();
        tracing::trace!(%token, "next color chosen");
        token
    }

    pub fn tokens() -> &'static [ColorToken] {
        &PALETTE
    }
}

fn ansi_color(name: ColorName) -> Color {
    match name {
        ColorName::Grey => Color::Black,
        ColorName::Red => Color::DarkRed,
        ColorName::Green => Color::DarkGreen,
        ColorName::Yellow => Color::DarkYellow,
        ColorName::Blue => Color::DarkBlue,
        ColorName::Magenta => Color::DarkMagenta,
        ColorName::Cyan => Color::DarkCyan,
        ColorName::White => Color::Grey,
    }
}

/// Terminal style for a token.
pub fn style_for(token: ColorToken) -> ContentStyle {
    let mut style = ContentStyle::new();
    style.foreground_color = Some(ansi_color(token.fg));
    style.background_color = token.bg.map(ansi_color);
    style
}

/// Style used for highlighted matches.
pub fn emphasis_style() -> ContentStyle {
    let mut style = ContentStyle::new();
    style.foreground_color = Some(Color::DarkRed);
    style.attributes.set(Attribute::Bold);
    style.attributes.set(Attribute::Reverse);
    style
}

/// `text` colored with `token`.
pub fn render(text: &str, token: ColorToken) -> String {
    style_for(token).apply(text).to_string()
}

/// `text` in the emphasis style.
pub fn emphasize(text: &str) -> String {
    emphasis_style().apply(text).to_string()
}
