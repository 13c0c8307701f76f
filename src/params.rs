//! Transformation parameter types.
//!
//! These structs describe *what* transformation to request, not *how* to
//! perform it. They are the contract between the planner (which decides which
//! variants exist) and a [`TransformEngine`](crate::engine::TransformEngine)
//! (which renders them or builds URLs for them).
//!
//! ## Types
//!
//! - [`Format`]: output format of a source: `avif`, `webp` or the original.
//! - [`Scalar`]: loosely typed parameter value as it arrives from tags,
//!   query arguments or the CLI.
//! - [`TransformParams`]: canonical parameters for one variant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Output format of a [`Source`](crate::Source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Avif,
    Webp,
    Original,
}

impl Format {
    /// Source precedence inside a `<picture>`: most efficient first.
    pub const PRECEDENCE: [Format; 3] = [Format::Avif, Format::Webp, Format::Original];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Avif => "avif",
            Format::Webp => "webp",
            Format::Original => "original",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loosely typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Interpret a raw `key=value` literal: booleans, null, integers and
    /// floats are recognized, anything else stays a string.
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "" | "null" => return Scalar::Null,
            "true" => return Scalar::Bool(true),
            "false" => return Scalar::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Scalar::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>()
            && f.is_finite()
        {
            return Scalar::Float(f);
        }
        Scalar::Str(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            Scalar::Int(i) => Some(*i != 0),
            Scalar::Str(s) => match s.trim() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            Scalar::Float(_) | Scalar::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Str(s) => s.trim().parse().ok(),
            Scalar::Bool(_) | Scalar::Null => None,
        }
    }

    /// Non-negative integer view; floats are truncated.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0 && *v <= u32::MAX as f64)
            .map(|v| v as u32)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

/// Canonical transformation parameters for one variant.
///
/// Recognized keys are typed fields; everything else requested through
/// `glide:*` overrides travels in `passthrough` untouched. Built once per
/// (breakpoint, format, width) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformParams {
    pub passthrough: BTreeMap<String, Scalar>,
    /// `fm`: output format name.
    pub format: Option<String>,
    /// `q`: encoding quality.
    pub quality: Option<u32>,
    /// `fit`: crop mode, e.g. `crop-50-50`.
    pub fit: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl TransformParams {
    /// Query pairs in their fixed order: passthrough keys (sorted), `fm`,
    /// `q`, `fit`, `w`, `h`.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .passthrough
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect();
        if let Some(format) = &self.format {
            pairs.push(("fm".into(), format.clone()));
        }
        if let Some(q) = self.quality {
            pairs.push(("q".into(), q.to_string()));
        }
        if let Some(fit) = &self.fit {
            pairs.push(("fit".into(), fit.clone()));
        }
        if let Some(w) = self.width {
            pairs.push(("w".into(), w.to_string()));
        }
        if let Some(h) = self.height {
            pairs.push(("h".into(), h.to_string()));
        }
        pairs
    }

    /// `key=value&…`, form-urlencoded.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_pairs())
            .finish()
    }

    /// Canonical map with `width`/`height` spelled out.
    pub fn to_map(&self) -> BTreeMap<String, Scalar> {
        let mut map = self.passthrough.clone();
        if let Some(format) = &self.format {
            map.insert("fm".into(), format.as_str().into());
        }
        if let Some(q) = self.quality {
            map.insert("q".into(), q.into());
        }
        if let Some(fit) = &self.fit {
            map.insert("fit".into(), fit.as_str().into());
        }
        if let Some(w) = self.width {
            map.insert("width".into(), w.into());
        }
        if let Some(h) = self.height {
            map.insert("height".into(), h.into());
        }
        map
    }

    /// Passthrough value read as a number, e.g. `blur`.
    pub fn numeric(&self, key: &str) -> Option<f64> {
        self.passthrough.get(key).and_then(Scalar::as_f64)
    }
}

impl Serialize for TransformParams {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}
