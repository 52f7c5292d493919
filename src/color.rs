//! Color analysis: grid-sampled averages and hex conversions.
//!
//! The color convention here is deliberately asymmetric: `r`, `g`, `b` use
//! the usual 0-255 range while alpha lives on its own 0-100 scale. That
//! convention is load-bearing for every consumer of [`Color`] — do not
//! "fix" it by rescaling alpha to 0-255.

use serde::{Deserialize, Serialize};

use crate::handle::ImageHandle;

/// Grid edge used by [`average_color`] when no explicit grid is given.
pub const DEFAULT_GRID: u32 = 10;

/// An RGB color with an optional alpha channel.
///
/// `r`, `g`, `b` are 0-255. `a` is on a separate 0-100 scale where 0 is
/// fully transparent and 100 fully opaque; `None` means "unspecified" and
/// is treated as opaque by [`color_average`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub a: Option<u8>,
}

impl Color {
    /// A color with no alpha channel.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: None }
    }

    /// A color with an explicit alpha on the 0-100 scale.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a: Some(a) }
    }

    /// True only for an explicit alpha of zero.
    pub fn is_transparent(&self) -> bool {
        self.a == Some(0)
    }

    /// Parse `#rgb` or `#rrggbb` (leading `#` optional, case-insensitive).
    ///
    /// Three-digit forms expand to six digits first. Malformed input yields
    /// `None`. The result never carries an alpha channel.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let expanded: String = if hex.len() == 3 {
            hex.chars().flat_map(|c| [c, c]).collect()
        } else {
            hex.to_string()
        };
        if expanded.len() != 6 || !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&expanded[0..2], 16).ok()?;
        let g = u8::from_str_radix(&expanded[2..4], 16).ok()?;
        let b = u8::from_str_radix(&expanded[4..6], 16).ok()?;
        Some(Color::rgb(r, g, b))
    }

    /// Lowercase `#rrggbb`, each channel zero-padded to two digits.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Map a 0-100 alpha onto the codec's 0-255 pixel alpha.
pub(crate) fn alpha_to_255(a: u8) -> u8 {
    (f64::from(a.min(100)) * 255.0 / 100.0).round() as u8
}

/// Map a 0-255 pixel alpha back onto the 0-100 scale.
pub(crate) fn alpha_to_100(a: u8) -> u8 {
    (f64::from(a) * 100.0 / 255.0).round() as u8
}

/// A color given either structurally or as a hex string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpec {
    Rgb(Color),
    Hex(String),
}

impl ColorSpec {
    /// Expand to a [`Color`]; malformed hex contributes black.
    fn resolve(&self) -> Color {
        match self {
            ColorSpec::Rgb(color) => *color,
            ColorSpec::Hex(hex) => Color::from_hex(hex).unwrap_or(Color::rgb(0, 0, 0)),
        }
    }
}

impl From<Color> for ColorSpec {
    fn from(color: Color) -> Self {
        ColorSpec::Rgb(color)
    }
}

impl From<&str> for ColorSpec {
    fn from(hex: &str) -> Self {
        ColorSpec::Hex(hex.to_string())
    }
}

impl From<String> for ColorSpec {
    fn from(hex: String) -> Self {
        ColorSpec::Hex(hex)
    }
}

/// Arithmetic mean of a set of colors, rounded per channel.
///
/// Alpha follows the 0-100 convention: an explicit 0 contributes 0, an
/// explicit nonzero value contributes itself, and an absent alpha counts as
/// fully opaque (100). Hex entries expand to `{r,g,b}` with no alpha. An
/// empty input yields opaque black.
pub fn color_average(colors: &[ColorSpec]) -> Color {
    if colors.is_empty() {
        return Color::rgba(0, 0, 0, 100);
    }

    let mut r: u64 = 0;
    let mut g: u64 = 0;
    let mut b: u64 = 0;
    let mut a: u64 = 0;
    for spec in colors {
        let color = spec.resolve();
        r += u64::from(color.r);
        g += u64::from(color.g);
        b += u64::from(color.b);
        a += match color.a {
            Some(0) => 0,
            Some(value) => u64::from(value),
            None => 100,
        };
    }

    let count = colors.len() as u64;
    Color::rgba(
        round_div(r, count),
        round_div(g, count),
        round_div(b, count),
        round_div(a, count),
    )
}

fn round_div(sum: u64, count: u64) -> u8 {
    (sum as f64 / count as f64).round() as u8
}

/// Average color of an image, sampled on the default 10x10 grid.
pub fn average_color(handle: &ImageHandle) -> Color {
    average_color_with_grid(handle, DEFAULT_GRID)
}

/// Average color of an image, sampled on a `grid_n` x `grid_n` grid.
///
/// Sample coordinates are `floor(dimension * (i + 0.99) / grid_n)` along
/// each axis. The 0.99 offset (rather than 0.5) biases samples toward the
/// far edge of each cell; it always stays inside the image.
pub fn average_color_with_grid(handle: &ImageHandle, grid_n: u32) -> Color {
    let (width, height) = handle.dimensions();
    let mut samples = Vec::with_capacity((grid_n * grid_n) as usize);
    for i in 0..grid_n {
        let x = (f64::from(width) * (f64::from(i) + 0.99) / f64::from(grid_n)).floor() as u32;
        for j in 0..grid_n {
            let y = (f64::from(height) * (f64::from(j) + 0.99) / f64::from(grid_n)).floor() as u32;
            samples.push(ColorSpec::Rgb(handle.pixel_at(x, y)));
        }
    }
    color_average(&samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        for hex in ["#000000", "#ffffff", "#12ab9f", "#8080ff"] {
            let color = Color::from_hex(hex).unwrap();
            assert_eq!(color.to_hex(), hex);
        }
        // Case-insensitive on the way in, lowercase on the way out
        let color = Color::from_hex("#FFAA00").unwrap();
        assert_eq!(color.to_hex(), "#ffaa00");
    }

    #[test]
    fn test_hex_three_digit_expansion() {
        let color = Color::from_hex("#fff").unwrap();
        assert_eq!(color, Color::rgb(255, 255, 255));
        let color = Color::from_hex("#1a2").unwrap();
        assert_eq!(color, Color::rgb(0x11, 0xaa, 0x22));
    }

    #[test]
    fn test_hex_malformed() {
        assert!(Color::from_hex("").is_none());
        assert!(Color::from_hex("#12345").is_none());
        assert!(Color::from_hex("#gggggg").is_none());
        assert!(Color::from_hex("not a color").is_none());
    }

    #[test]
    fn test_color_average_alpha_scales() {
        // Explicit zero contributes 0, absent alpha counts as 100
        let average = color_average(&[
            ColorSpec::Rgb(Color::rgba(0, 0, 0, 0)),
            ColorSpec::Rgb(Color::rgb(255, 255, 255)),
        ]);
        assert_eq!(average.a, Some(50));
        assert_eq!(average.r, 128);
        assert_eq!(average.g, 128);
        assert_eq!(average.b, 128);
    }

    #[test]
    fn test_color_average_with_hex_entries() {
        let average = color_average(&[
            ColorSpec::from("#000000"),
            ColorSpec::Rgb(Color::rgb(200, 100, 50)),
        ]);
        assert_eq!(average.r, 100);
        assert_eq!(average.g, 50);
        assert_eq!(average.b, 25);
        // Hex entries have no alpha, so both contribute 100
        assert_eq!(average.a, Some(100));
    }

    #[test]
    fn test_color_average_empty() {
        let average = color_average(&[]);
        assert_eq!(average, Color::rgba(0, 0, 0, 100));
    }

    #[test]
    fn test_alpha_scale_conversions() {
        assert_eq!(alpha_to_255(100), 255);
        assert_eq!(alpha_to_255(0), 0);
        assert_eq!(alpha_to_100(255), 100);
        assert_eq!(alpha_to_100(0), 0);
        assert_eq!(alpha_to_100(alpha_to_255(50)), 50);
    }

    #[test]
    fn test_average_color_uniform_canvas() {
        let canvas = ImageHandle::create(64, 64, Color::rgba(10, 200, 30, 100)).unwrap();
        let average = average_color(&canvas);
        assert_eq!(average.r, 10);
        assert_eq!(average.g, 200);
        assert_eq!(average.b, 30);
        assert_eq!(average.a, Some(100));
    }

    #[test]
    fn test_average_color_samples_stay_in_bounds() {
        // 1x1 image: every sample must land on the only pixel
        let canvas = ImageHandle::create(1, 1, Color::rgba(5, 6, 7, 100)).unwrap();
        let average = average_color_with_grid(&canvas, 10);
        assert_eq!((average.r, average.g, average.b), (5, 6, 7));
    }
}
