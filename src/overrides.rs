//! Call-site parameters and the typed override layers parsed from them.
//!
//! Tags and query fields hand the planner a flat, ordered bag of namespaced
//! keys. The bag is parsed once into [`BreakpointOverrides`] per breakpoint;
//! nothing downstream matches on key strings.
//!
//! ## Key grammar
//!
//! | Key | Meaning |
//! |---|---|
//! | `glide:<param>` | raw transform parameter, passed through |
//! | `quality:<format>` | quality for one output format |
//! | `ratio` | aspect ratio (`1.5`, `"16/9"`, `"16:9"`, null = natural) |
//! | `width` | alias of `glide:width` (max-width cap) |
//! | `webp`, `avif` | format toggles |
//! | `placeholder` | placeholder toggle |
//! | `<label>:<key>` | any of the above, for breakpoint `<label>` only |
//!
//! Anything else is an HTML attribute for the rendering boundary.
//!
//! ## Layering
//!
//! Each breakpoint sees two layers: bag-wide keys, then its own
//! `<label>:` keys. [`BreakpointOverrides::layered`] merges them key by key,
//! the local layer winning wherever it sets a value.

use crate::params::{Format, Scalar};
use std::collections::BTreeMap;

/// Keys consumed by the planner and never rendered as attributes.
const RESERVED_KEYS: &[&str] = &["src", "placeholder", "webp", "avif", "ratio", "width"];

/// Namespaces consumed by the planner.
const RESERVED_NAMESPACES: &[&str] = &["glide:", "quality:", "default:"];

/// Ordered call-site parameter bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Vec<(String, Scalar)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a key, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `key=value` assignment; the value goes through
    /// [`Scalar::parse_literal`]. Returns `None` without `=` or with an empty key.
    pub fn parse_assignment(raw: &str) -> Option<(String, Scalar)> {
        let (key, value) = raw.split_once('=')?;
        let key = key.trim();
        (!key.is_empty()).then(|| (key.to_string(), Scalar::parse_literal(value)))
    }

    /// Flat query-field arguments, where `:` cannot appear in argument names.
    ///
    /// Underscores become namespace separators: `md_ratio` → `md:ratio`.
    pub fn from_query_args<K, V>(args: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Scalar>,
    {
        args.into_iter()
            .map(|(k, v)| (k.as_ref().replace('_', ":"), v.into()))
            .collect()
    }

    /// Overrides seen by breakpoint `label`.
    ///
    /// `labels` are all breakpoint labels; keys prefixed with any of them are
    /// scoped, everything else is bag-wide.
    pub fn breakpoint_overrides(&self, label: &str, labels: &[&str]) -> BreakpointOverrides {
        let mut shared = BreakpointOverrides::default();
        let mut local = BreakpointOverrides::default();

        for (key, value) in self.iter() {
            match split_label(key, labels) {
                Some((scope, option)) if scope == label => local.apply(option, value),
                Some(_) => {}
                None => shared.apply(key, value),
            }
        }

        BreakpointOverrides::layered(&shared, &local)
    }

    /// Parameters that are not planner options, in call-site order.
    pub fn attributes(&self, labels: &[&str]) -> Vec<(String, String)> {
        self.iter()
            .filter(|(key, _)| {
                !RESERVED_KEYS.contains(key)
                    && !RESERVED_NAMESPACES.iter().any(|ns| key.contains(ns))
                    && !labels.iter().any(|label| key.contains(&format!("{label}:")))
            })
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Scalar)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, Scalar)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Split `label:option` when `label` is a known breakpoint.
fn split_label<'a>(key: &'a str, labels: &[&str]) -> Option<(&'a str, &'a str)> {
    let (prefix, option) = key.split_once(':')?;
    labels.contains(&prefix).then_some((prefix, option))
}

/// Raw transform parameters (`glide:*`, namespace stripped).
///
/// Aliases are folded on insert: `w` → `width`, `h` → `height`,
/// `q` → `quality`. The long spelling wins when both are given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlideOverrides(BTreeMap<String, Scalar>);

impl GlideOverrides {
    pub fn insert(&mut self, key: &str, value: Scalar) {
        let canonical = match key {
            "w" => "width",
            "h" => "height",
            "q" => "quality",
            other => other,
        };
        if canonical != key && self.0.contains_key(canonical) {
            return;
        }
        self.0.insert(canonical.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Explicit quality; zero counts as unset.
    pub fn quality(&self) -> Option<u32> {
        self.get("quality").and_then(Scalar::as_u32).filter(|q| *q > 0)
    }

    pub fn width(&self) -> Option<u32> {
        self.get("width").and_then(Scalar::as_u32)
    }

    pub fn height(&self) -> Option<u32> {
        self.get("height").and_then(Scalar::as_u32)
    }

    pub fn fit(&self) -> Option<String> {
        self.get("fit").map(Scalar::to_string)
    }

    fn merged(base: &Self, local: &Self) -> Self {
        let mut merged = base.clone();
        merged.0.extend(local.0.clone());
        merged
    }
}

/// Per-format quality (`quality:<format>`), keyed by lowercase format name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityOverrides(BTreeMap<String, u32>);

impl QualityOverrides {
    pub fn insert(&mut self, format: &str, quality: u32) {
        self.0.insert(format.to_ascii_lowercase(), quality);
    }

    pub fn get(&self, format: &str) -> Option<u32> {
        self.0.get(&format.to_ascii_lowercase()).copied()
    }

    fn merged(base: &Self, local: &Self) -> Self {
        let mut merged = base.clone();
        merged.0.extend(local.0.clone());
        merged
    }
}

/// Aspect-ratio override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    /// Explicitly follow the asset's natural ratio.
    Natural,
    /// Width / height.
    Fixed(f64),
}

impl Ratio {
    /// Interpret a raw ratio value. Null, unparsable, zero and negative
    /// ratios all mean [`Ratio::Natural`].
    pub fn parse(value: &Scalar) -> Self {
        let fixed = match value {
            Scalar::Str(s) => parse_fraction(s).or_else(|| s.trim().parse().ok()),
            other => other.as_f64(),
        };
        match fixed {
            Some(r) if r.is_finite() && r > 0.0 => Ratio::Fixed(r),
            Some(r) => {
                log::warn!("ignoring non-positive ratio {r}; using the natural ratio");
                Ratio::Natural
            }
            None => Ratio::Natural,
        }
    }

    pub fn fixed(self) -> Option<f64> {
        match self {
            Ratio::Fixed(r) => Some(r),
            Ratio::Natural => None,
        }
    }
}

/// `"16/9"` or `"16:9"`.
fn parse_fraction(raw: &str) -> Option<f64> {
    let (w, h) = raw.split_once('/').or_else(|| raw.split_once(':'))?;
    let w: f64 = w.trim().parse().ok()?;
    let h: f64 = h.trim().parse().ok()?;
    (h != 0.0).then(|| w / h)
}

/// Optional `webp` / `avif` switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatToggles {
    pub webp: Option<bool>,
    pub avif: Option<bool>,
}

impl FormatToggles {
    /// Toggle for a format; the original is not switchable.
    pub fn get(&self, format: Format) -> Option<bool> {
        match format {
            Format::Webp => self.webp,
            Format::Avif => self.avif,
            Format::Original => None,
        }
    }
}

/// Everything one breakpoint can override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakpointOverrides {
    pub glide: GlideOverrides,
    pub quality: QualityOverrides,
    pub ratio: Option<Ratio>,
    pub formats: FormatToggles,
    pub placeholder: Option<bool>,
}

impl BreakpointOverrides {
    /// Merge two layers; every value set in `local` wins over `base`.
    ///
    /// Map-valued layers (`glide`, `quality`) merge per key.
    pub fn layered(base: &Self, local: &Self) -> Self {
        Self {
            glide: GlideOverrides::merged(&base.glide, &local.glide),
            quality: QualityOverrides::merged(&base.quality, &local.quality),
            ratio: local.ratio.or(base.ratio),
            formats: FormatToggles {
                webp: local.formats.webp.or(base.formats.webp),
                avif: local.formats.avif.or(base.formats.avif),
            },
            placeholder: local.placeholder.or(base.placeholder),
        }
    }

    /// Fixed ratio, if one was requested.
    pub fn fixed_ratio(&self) -> Option<f64> {
        self.ratio.and_then(Ratio::fixed)
    }

    /// Apply one un-prefixed option to this layer.
    fn apply(&mut self, key: &str, value: &Scalar) {
        if let Some(param) = key.strip_prefix("glide:") {
            self.glide.insert(param, value.clone());
            return;
        }
        if let Some(format) = key.strip_prefix("quality:") {
            match value.as_u32() {
                Some(q) => self.quality.insert(format, q),
                None if value.is_null() => {}
                None => log::warn!("ignoring non-numeric {key}={value}"),
            }
            return;
        }
        match key {
            "ratio" => self.ratio = Some(Ratio::parse(value)),
            "width" => self.glide.insert("width", value.clone()),
            "webp" => self.formats.webp = toggle(key, value),
            "avif" => self.formats.avif = toggle(key, value),
            "placeholder" => self.placeholder = toggle(key, value),
            _ => {}
        }
    }
}

fn toggle(key: &str, value: &Scalar) -> Option<bool> {
    let parsed = value.as_bool();
    if parsed.is_none() && !value.is_null() {
        log::warn!("ignoring non-boolean {key}={value}");
    }
    parsed
}
