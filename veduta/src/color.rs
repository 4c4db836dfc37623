#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Color representation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl Color {
    /// Transparent color: `#00000000`
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// Blue color: `#0000FFFF`
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);
    /// White color: `#FFFFFFFF`
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    /// Black color: `#000000FF`
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the same color with the alpha channel set to `alpha` (0.0..=1.0).
    pub fn with_alpha(&self, alpha: f64) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..*self
        }
    }

    /// Converts the color into the `rgba(...)` form used by style property
    /// values.
    pub fn to_style_value(self) -> serde_json::Value {
        serde_json::Value::String(format!(
            "rgba({}, {}, {}, {})",
            self.r,
            self.g,
            self.b,
            f64::from(self.a) / 255.0
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_value_formatting() {
        assert_eq!(
            Color::rgba(255, 0, 0, 255).to_style_value(),
            serde_json::Value::String("rgba(255, 0, 0, 1)".into())
        );
        assert_eq!(
            Color::BLACK.with_alpha(0.0).to_style_value(),
            serde_json::Value::String("rgba(0, 0, 0, 0)".into())
        );
    }
}
