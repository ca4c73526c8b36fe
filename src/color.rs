use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Opaque sRGB color parsed from a `#RRGGBB` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse a `#RRGGBB` color. Anything else (shorthand, alpha, named colors)
/// is rejected so malformed input never reaches the renderer.
pub fn parse_hex(value: &str) -> Result<Rgb> {
    let digits = match value.strip_prefix('#') {
        Some(rest) => rest,
        None => bail!("color '{}' must start with '#'", value),
    };
    if digits.len() != 6 {
        bail!("color '{}' must be exactly 6 hex digits", value);
    }
    if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        bail!("color '{}' contains non-hex characters", value);
    }

    let r = u8::from_str_radix(&digits[0..2], 16)?;
    let g = u8::from_str_radix(&digits[2..4], 16)?;
    let b = u8::from_str_radix(&digits[4..6], 16)?;
    Ok(Rgb { r, g, b })
}

/// Brightness-shift a hex color by `percent`: each channel moves by
/// `round(2.55 * percent)` (half rounds toward +∞, so `-76.5` becomes `-76`)
/// and clamps to `[0, 255]`. Output keeps leading zeros.
pub fn adjust_color(value: &str, percent: f64) -> Result<String> {
    let color = parse_hex(value)?;
    let amount = (2.55 * percent + 0.5).floor() as i32;

    let shift = |channel: u8| -> u8 { (i32::from(channel) + amount).clamp(0, 255) as u8 };

    Ok(Rgb {
        r: shift(color.r),
        g: shift(color.g),
        b: shift(color.b),
    }
    .to_hex())
}

#[cfg(test)]
mod tests {
    use super::{adjust_color, parse_hex, Rgb};

    #[test]
    fn parse_roundtrips_with_leading_zeros() {
        let color = parse_hex("#0f0f23").expect("color should parse");
        assert_eq!(
            color,
            Rgb {
                r: 0x0f,
                g: 0x0f,
                b: 0x23
            }
        );
        assert_eq!(color.to_hex(), "#0f0f23");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(parse_hex("0f0f23").is_err());
        assert!(parse_hex("#fff").is_err());
        assert!(parse_hex("#0f0f2g").is_err());
        assert!(parse_hex("#0f0f2345").is_err());
        assert!(parse_hex("").is_err());
    }

    #[test]
    fn adjust_adds_rounded_amount_per_channel() {
        // round(2.55 * 30) = 77: 0x0f + 77 = 0x5c, 0x23 + 77 = 0x70.
        assert_eq!(
            adjust_color("#0f0f23", 30.0).expect("color should adjust"),
            "#5c5c70"
        );
    }

    #[test]
    fn adjust_rounds_half_toward_positive_infinity() {
        // 2.55 * -30 = -76.5 rounds to -76, not -77.
        assert_eq!(
            adjust_color("#605040", -30.0).expect("color should adjust"),
            "#140400"
        );
    }

    #[test]
    fn adjust_clamps_both_ends() {
        assert_eq!(
            adjust_color("#f0f0f0", 30.0).expect("color should adjust"),
            "#ffffff"
        );
        assert_eq!(
            adjust_color("#101010", -30.0).expect("color should adjust"),
            "#000000"
        );
    }

    #[test]
    fn adjust_preserves_leading_zeros() {
        assert_eq!(
            adjust_color("#000000", 1.0).expect("color should adjust"),
            "#030303"
        );
    }
}
