//! CSS-style colour values as they appear in serialized canvases.

use serde::Deserialize;

/// A straight-alpha RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)`, `rgba(..)` or a basic
    /// named colour. Returns `None` for anything else (gradients, patterns).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_rgb_args(args);
        }
        named(&lower)
    }
}

fn parse_hex(hex: &str) -> Option<Colour> {
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => Some(Colour::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        6 => Some(Colour::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Colour {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: byte(6)?,
        }),
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Colour> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| s.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
    let alpha = match parts.get(3) {
        Some(a) => (a.parse::<f32>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
        None => 255,
    };
    Some(Colour {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: alpha,
    })
}

fn named(name: &str) -> Option<Colour> {
    let c = match name {
        "black" => Colour::rgb(0, 0, 0),
        "white" => Colour::rgb(255, 255, 255),
        "red" => Colour::rgb(255, 0, 0),
        "green" => Colour::rgb(0, 128, 0),
        "lime" => Colour::rgb(0, 255, 0),
        "blue" => Colour::rgb(0, 0, 255),
        "yellow" => Colour::rgb(255, 255, 0),
        "orange" => Colour::rgb(255, 165, 0),
        "purple" => Colour::rgb(128, 0, 128),
        "pink" => Colour::rgb(255, 192, 203),
        "gray" | "grey" => Colour::rgb(128, 128, 128),
        "transparent" => Colour {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        },
        _ => return None,
    };
    Some(c)
}

/// Lenient colour field: strings are parsed, `null`, gradients and anything
/// unparseable become `None` instead of failing the whole template.
pub(crate) fn deserialize_colour<'de, D>(deserializer: D) -> Result<Option<Colour>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Colour::parse(&s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Colour::parse("#fff"), Some(Colour::rgb(255, 255, 255)));
        assert_eq!(Colour::parse("#1a2b3c"), Some(Colour::rgb(0x1a, 0x2b, 0x3c)));
        assert_eq!(Colour::parse("#00000080").map(|c| c.a), Some(0x80));
        assert_eq!(Colour::parse("#12345"), None);
    }

    #[test]
    fn test_parse_rgb_functions() {
        assert_eq!(Colour::parse("rgb(255,0,0)"), Some(Colour::rgb(255, 0, 0)));
        assert_eq!(
            Colour::parse("rgba(0, 0, 255, 0.5)"),
            Some(Colour {
                r: 0,
                g: 0,
                b: 255,
                a: 128
            })
        );
        assert_eq!(Colour::parse("rgb(1,2)"), None);
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(Colour::parse("Black"), Some(Colour::BLACK));
        assert_eq!(Colour::parse("transparent").map(|c| c.a), Some(0));
        assert_eq!(Colour::parse("chartreuse-ish"), None);
    }
}
