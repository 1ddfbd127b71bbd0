use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a unit-bearing literal.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum UnitError {
    #[error("empty dimension literal")]
    Empty,
    #[error("cannot parse numeric part of {literal:?}")]
    BadNumber { literal: String },
    #[error("unknown unit {unit:?} in {literal:?}")]
    UnknownUnit { literal: String, unit: String },
}

/// Parse a length literal into meters.
///
/// Accepts a bare number (already meters), or a number followed by a unit,
/// with the unit either bracketed (`"65[in]"`) or space/immediately
/// suffixed (`"65 in"`, `"30cm"`). Supported units: m, cm, mm, in, ft.
pub fn parse_length(literal: &str) -> Result<f64, UnitError> {
    let (value, unit) = split_literal(literal)?;
    let scale = match unit {
        "" | "m" => 1.0,
        "cm" => 0.01,
        "mm" => 0.001,
        "in" => 0.0254,
        "ft" => 0.3048,
        other => {
            return Err(UnitError::UnknownUnit {
                literal: literal.to_string(),
                unit: other.to_string(),
            })
        }
    };
    Ok(value * scale)
}

/// Parse an angle literal into radians. Supported units: rad, deg (default deg,
/// matching the sketch dialect the history graph consumes).
pub fn parse_angle(literal: &str) -> Result<f64, UnitError> {
    let (value, unit) = split_literal(literal)?;
    match unit {
        "rad" => Ok(value),
        "" | "deg" => Ok(value.to_radians()),
        other => Err(UnitError::UnknownUnit {
            literal: literal.to_string(),
            unit: other.to_string(),
        }),
    }
}

fn split_literal(literal: &str) -> Result<(f64, &str), UnitError> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return Err(UnitError::Empty);
    }

    // Bracketed form: "65[in]". The closing bracket must follow the opener.
    if let Some(open) = trimmed.find('[') {
        let unit = match trimmed[open + 1..].find(']') {
            Some(len) if trimmed[open + len + 2..].trim().is_empty() => {
                trimmed[open + 1..open + 1 + len].trim()
            }
            _ => {
                return Err(UnitError::BadNumber {
                    literal: literal.to_string(),
                })
            }
        };
        let value = trimmed[..open]
            .trim()
            .parse::<f64>()
            .map_err(|_| UnitError::BadNumber {
                literal: literal.to_string(),
            })?;
        return Ok((value, unit));
    }

    // Suffix form: find the longest numeric prefix.
    let split = trimmed
        .char_indices()
        .find(|(_, c)| !matches!(c, '0'..='9' | '.' | '-' | '+' | 'e' | 'E'))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    // 'e' may start a unit rather than an exponent; back off if the prefix
    // fails to parse as a number.
    let mut idx = split;
    loop {
        let num = trimmed[..idx].trim();
        if let Ok(value) = num.parse::<f64>() {
            return Ok((value, trimmed[idx..].trim()));
        }
        match trimmed[..idx].rfind(|c: char| c == 'e' || c == 'E') {
            Some(e) if e > 0 => idx = e,
            _ => {
                return Err(UnitError::BadNumber {
                    literal: literal.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bare_number_is_meters() {
        assert_relative_eq!(parse_length("2.7").unwrap(), 2.7);
    }

    #[test]
    fn bracketed_inches() {
        assert_relative_eq!(parse_length("65[in]").unwrap(), 1.651);
    }

    #[test]
    fn spaced_and_suffixed_units() {
        assert_relative_eq!(parse_length("30 cm").unwrap(), 0.30);
        assert_relative_eq!(parse_length("125mm").unwrap(), 0.125);
        assert_relative_eq!(parse_length("1 ft").unwrap(), 0.3048);
    }

    #[test]
    fn negative_values() {
        assert_relative_eq!(parse_length("-0.3[m]").unwrap(), -0.3);
    }

    #[test]
    fn angles_default_to_degrees() {
        assert_relative_eq!(parse_angle("90").unwrap(), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(parse_angle("3.14159 rad").unwrap(), 3.14159);
    }

    #[test]
    fn unknown_unit_is_an_error() {
        assert!(matches!(
            parse_length("5 furlongs"),
            Err(UnitError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_length("abc").is_err());
        assert!(parse_length("").is_err());
    }

    #[test]
    fn malformed_brackets_are_an_error() {
        assert!(matches!(
            parse_length("65]in["),
            Err(UnitError::BadNumber { .. })
        ));
        assert!(matches!(
            parse_length("65[in"),
            Err(UnitError::BadNumber { .. })
        ));
        assert!(matches!(
            parse_length("65[]in]"),
            Err(UnitError::BadNumber { .. })
        ));
    }
}
