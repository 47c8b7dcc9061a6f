//! Conversion of raw sensor readings into display strings.
//!
//! A reading is scaled according to its [`SensorConfig`]:
//!
//! - **Direct**: `min` or `max` unset, the raw value is shown as is.
//!   `format = "%s C"`, `precision = 1`, reading `1.5` shows `1.5 C`.
//! - **Percent**: `min`/`max` set, `format_min` or `format_max` unset.
//!   `min = 0`, `max = 3`, `format = "%s %%"`, reading `1.5` shows `50 %`.
//! - **Proportional**: all four bounds set.
//!   `min = 0`, `max = 3`, `format_min = 0`, `format_max = 120`, `format = "%s l"`,
//!   reading `1.5` shows `60 l`.
//! - **Breakpoints**: `min`/`max` unset and `bonds` holds at least two pairs, e.g. a
//!   conical tank with `bonds = "0=0;1=50;2=100;10=200"`.
//!
//! A reading outside `[min, max]`, or a range with `max <= min`, disables scaling
//! and the raw value is shown unchanged.

pub mod bonds;

use crate::models::sensor::MAX_PRECISION;
use crate::models::SensorConfig;
use log::{debug, trace};
use thiserror::Error;

pub use bonds::{parse_value_pairs, Bond, Bonds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    Direct,
    Percent,
    Proportional,
    Breakpoints,
    /// Bounds configured but not usable for this reading.
    Implausible,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaled {
    pub value: f32,
    pub mode: ScaleMode,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("format {0:?} has no %s placeholder")]
    MissingPlaceholder(String),

    #[error("format {0:?} has more than one %s placeholder")]
    TooManyPlaceholders(String),

    #[error("format {template:?} has unsupported conversion %{conversion}")]
    UnsupportedConversion { template: String, conversion: char },
}

// Negative bounds are the historic "not set" marker.
fn active(bound: Option<f32>) -> Option<f32> {
    bound.filter(|b| *b >= 0.0)
}

/// Scale a raw reading without rendering it.
pub fn scale(raw: f32, config: &SensorConfig) -> Scaled {
    let (Some(min), Some(max)) = (active(config.min), active(config.max)) else {
        let bonds = parse_value_pairs(&config.bonds);
        return match bonds.interpolate(raw) {
            Some(value) => Scaled {
                value,
                mode: ScaleMode::Breakpoints,
            },
            None => Scaled {
                value: raw,
                mode: ScaleMode::Direct,
            },
        };
    };

    if max <= min || raw < min || raw > max || raw.is_nan() {
        return Scaled {
            value: raw,
            mode: ScaleMode::Implausible,
        };
    }

    match (active(config.format_min), active(config.format_max)) {
        (Some(format_min), Some(format_max)) => Scaled {
            value: (format_max - format_min) * (raw - min) / (max - min) + format_min,
            mode: ScaleMode::Proportional,
        },
        _ => Scaled {
            value: (raw - min) / (max - min) * 100.0,
            mode: ScaleMode::Percent,
        },
    }
}

/// Render a raw reading the way it is shown on the panel and status page.
pub fn to_display(raw: f32, config: &SensorConfig) -> String {
    let scaled = scale(raw, config);
    debug!("Scaled {} to {} ({:?})", raw, scaled.value, scaled.mode);

    let number = render_number(scaled.value, config.precision);
    let display = apply_template(&config.format, &number);
    trace!("Display value for {}: {:?}", raw, display);
    display
}

/// Fixed point rendering with `precision` fractional digits, as printf's `%.Nf`
/// does it: exact ties go to the even digit (`2.5` renders `2`).
pub fn render_number(value: f32, precision: u8) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let precision = precision.min(MAX_PRECISION) as usize;
    let rendered = format!("{:.*}", precision, value as f64);
    match rendered.strip_prefix('-') {
        // "-0.00" reads as a negative value on the panel
        Some(magnitude) if magnitude.bytes().all(|b| b == b'0' || b == b'.') => {
            magnitude.to_string()
        }
        _ => rendered,
    }
}

/// Substitute `value` for the `%s` placeholder; `%%` becomes `%`.
///
/// Any further `%s` renders empty and other `%` sequences are copied verbatim.
pub fn apply_template(template: &str, value: &str) -> String {
    let mut out = String::with_capacity(template.len() + value.len());
    let mut substituted = false;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') => {
                chars.next();
                if !substituted {
                    out.push_str(value);
                    substituted = true;
                }
            }
            _ => out.push('%'),
        }
    }
    out
}

/// Check that a template holds exactly one `%s` and no other conversions.
pub fn validate_template(template: &str) -> Result<(), TemplateError> {
    let mut placeholders = 0;
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.next() {
            Some('%') => {}
            Some('s') => placeholders += 1,
            Some(other) => {
                return Err(TemplateError::UnsupportedConversion {
                    template: template.to_string(),
                    conversion: other,
                })
            }
            None => {
                return Err(TemplateError::UnsupportedConversion {
                    template: template.to_string(),
                    conversion: ' ',
                })
            }
        }
    }

    match placeholders {
        0 => Err(TemplateError::MissingPlaceholder(template.to_string())),
        1 => Ok(()),
        _ => Err(TemplateError::TooManyPlaceholders(template.to_string())),
    }
}
