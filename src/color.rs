use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn to_rgb(rgb: Srgb) -> RGBColor {
    let rgb: Srgb<u8> = rgb.into_format();
    RGBColor(rgb.red, rgb.green, rgb.blue)
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_rgb(rgb)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Diverging colour map for correlation coefficients
// ---------------------------------------------------------------------------

const COOL: (u8, u8, u8) = (59, 76, 192);
const NEUTRAL: (u8, u8, u8) = (221, 221, 221);
const WARM: (u8, u8, u8) = (180, 4, 38);

fn linear(c: (u8, u8, u8)) -> LinSrgb {
    Srgb::new(c.0, c.1, c.2).into_format::<f32>().into_linear()
}

/// Blue → grey → red for `t` in `[-1, 1]`; values outside are clamped.
/// Interpolation happens in linear RGB so the midpoint does not muddy.
pub fn coolwarm(t: f64) -> RGBColor {
    let t = t.clamp(-1.0, 1.0) as f32;
    let mixed = if t < 0.0 {
        linear(NEUTRAL).mix(linear(COOL), -t)
    } else {
        linear(NEUTRAL).mix(linear(WARM), t)
    };
    to_rgb(Srgb::from_linear(mixed))
}
