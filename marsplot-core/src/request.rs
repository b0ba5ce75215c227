//! Requested selections along the five physical axes
//!
//! Every free dimension of a figure, and every entry of a per-reference override block,
//! is expressed as an [`AxisRequest`]. Script values are decoded by [`parse_scalar`]:
//!
//! | Script text    | Meaning                                 |
//! |----------------|-----------------------------------------|
//! | `None` / empty | [`AxisRequest::Unset`], per-axis default |
//! | `10`           | [`AxisRequest::Value`], nearest match    |
//! | `-10,10`       | [`AxisRequest::Range`], inclusive average|
//! | `all`          | [`AxisRequest::WholeAxisAverage`]        |
//! | `AXIS`         | varying axis of a 1D plot                |
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::request::{parse_scalar, AxisRequest};
//!
//! let request = parse_scalar(" -55,55 ").into_request("Latitude");
//! assert_eq!(request, AxisRequest::Range(-55.0, 55.0));
//! assert_eq!(request.to_string(), "-55,55");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// The physical axes a field can be sliced along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    /// Continuous solar longitude counter
    Time,
    TimeOfDay,
    Level,
    Latitude,
    Longitude,
}

impl Dimension {
    /// Decodes an override key. `ls` and `time` both name the time axis.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ls" | "time" => Some(Dimension::Time),
            "lev" => Some(Dimension::Level),
            "lon" => Some(Dimension::Longitude),
            "lat" => Some(Dimension::Latitude),
            "tod" => Some(Dimension::TimeOfDay),
            _ => None,
        }
    }

    /// Canonical override key
    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Time => "ls",
            Dimension::TimeOfDay => "tod",
            Dimension::Level => "lev",
            Dimension::Latitude => "lat",
            Dimension::Longitude => "lon",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Time => "time",
            Dimension::TimeOfDay => "time of day",
            Dimension::Level => "vertical level",
            Dimension::Latitude => "latitude",
            Dimension::Longitude => "longitude",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A requested selection along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum AxisRequest {
    /// Nothing requested, the resolver applies its default
    #[default]
    Unset,
    /// Nearest native coordinate to a physical value
    Value(f64),
    /// Inclusive range between two physical values, averaged
    Range(f64, f64),
    /// Every index along the axis, averaged
    WholeAxisAverage,
}

impl AxisRequest {
    pub fn is_unset(&self) -> bool {
        matches!(self, AxisRequest::Unset)
    }

    /// Replaces an unset request with `other`.
    pub fn or(self, other: AxisRequest) -> AxisRequest {
        if self.is_unset() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for AxisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisRequest::Unset => write!(f, "None"),
            AxisRequest::Value(x) => write!(f, "{x}"),
            AxisRequest::Range(a, b) => write!(f, "{a},{b}"),
            AxisRequest::WholeAxisAverage => write!(f, "all"),
        }
    }
}

/// A dimension field of a 1D figure: either the plotted axis or a selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LineDimension {
    Varying,
    Fixed(AxisRequest),
}

impl Default for LineDimension {
    fn default() -> Self {
        LineDimension::Fixed(AxisRequest::Unset)
    }
}

impl LineDimension {
    pub fn is_varying(&self) -> bool {
        matches!(self, LineDimension::Varying)
    }

    /// The selection to apply when this dimension is held fixed.
    pub fn request(&self) -> AxisRequest {
        match self {
            LineDimension::Varying => AxisRequest::Unset,
            LineDimension::Fixed(request) => *request,
        }
    }
}

impl fmt::Display for LineDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineDimension::Varying => write!(f, "AXIS"),
            LineDimension::Fixed(request) => write!(f, "{request}"),
        }
    }
}

/// A decoded script value, before it is given a field-specific meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    None,
    All,
    Axis,
    Numbers(Vec<f64>),
    Text(String),
}

/// Decodes the text to the right of a `=` sign.
pub fn parse_scalar(text: &str) -> ScalarValue {
    let text = text.trim();
    match text {
        "" | "None" => return ScalarValue::None,
        "all" => return ScalarValue::All,
        "AXIS" => return ScalarValue::Axis,
        _ => {}
    }

    let numbers: Result<Vec<f64>, _> = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect();
    match numbers {
        Ok(numbers) => ScalarValue::Numbers(numbers),
        Err(_) => ScalarValue::Text(text.to_string()),
    }
}

impl ScalarValue {
    /// Interprets the value as a free-dimension request.
    ///
    /// Values that cannot select along an axis are reported and treated as unset.
    pub fn into_request(self, field: &str) -> AxisRequest {
        match self {
            ScalarValue::None => AxisRequest::Unset,
            ScalarValue::All => AxisRequest::WholeAxisAverage,
            ScalarValue::Numbers(values) => match values.as_slice() {
                [x] => AxisRequest::Value(*x),
                [a, b] => AxisRequest::Range(*a, *b),
                _ => {
                    log::warn!(
                        "*** Warning *** {field} expects one value or a range of two, got {}; using default",
                        values.len()
                    );
                    AxisRequest::Unset
                }
            },
            ScalarValue::Axis => {
                log::warn!("*** Warning *** AXIS is only valid in 1D plots ({field}); using default");
                AxisRequest::Unset
            }
            ScalarValue::Text(text) => {
                log::warn!("*** Warning *** could not read '{text}' for {field}; using default");
                AxisRequest::Unset
            }
        }
    }

    /// Interprets the value as a dimension of a 1D figure.
    pub fn into_line_dimension(self, field: &str) -> LineDimension {
        match self {
            ScalarValue::Axis => LineDimension::Varying,
            other => LineDimension::Fixed(other.into_request(field)),
        }
    }

    /// Interprets the value as a list of floats.
    pub fn into_numbers(self, field: &str) -> Option<Vec<f64>> {
        match self {
            ScalarValue::Numbers(values) => Some(values),
            ScalarValue::None => None,
            other => {
                log::warn!("*** Warning *** {field} expects numbers, got {other:?}; ignoring");
                None
            }
        }
    }
}

/// Reads a free-text field. `None` and blank values are unset.
pub fn parse_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text == "None" {
        None
    } else {
        Some(text.to_string())
    }
}

pub fn parse_bool(text: &str) -> bool {
    text.trim() == "True"
}

/// Writes a float list the way script values are written.
pub fn format_numbers(values: Option<&[f64]>) -> String {
    match values {
        None => "None".to_string(),
        Some(values) => values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(","),
    }
}
