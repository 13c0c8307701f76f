//! One named viewport breakpoint of a responsive image.
//!
//! A [`Breakpoint`] ties an asset to a label, a minimum viewport width and the
//! overrides that apply from that width up. It decides which formats get a
//! [`Source`], builds the transform parameters for every variant and owns the
//! blurred placeholder.

use crate::asset::Asset;
use crate::config::{Config, WidthUnit};
use crate::engine::TransformError;
use crate::memo;
use crate::overrides::BreakpointOverrides;
use crate::params::{Format, Scalar, TransformParams};
use crate::responsive::{ResponsiveError, Services};
use crate::source::{Source, SourceData};
use base64::Engine as _;
use serde::Serialize;
use std::collections::BTreeMap;

/// Width descriptor the placeholder is listed under in a srcset.
pub const PLACEHOLDER_DESCRIPTOR: &str = "32w";

#[derive(Clone)]
pub struct Breakpoint<'a> {
    asset: &'a Asset,
    services: &'a Services,
    label: String,
    min_width: u32,
    unit: WidthUnit,
    overrides: BreakpointOverrides,
}

/// Query-style view of a breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakpointData {
    pub asset: String,
    pub label: String,
    pub min_width: u32,
    pub width_unit: WidthUnit,
    pub media: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    pub sources: Vec<SourceData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl<'a> Breakpoint<'a> {
    pub fn new(
        asset: &'a Asset,
        services: &'a Services,
        label: impl Into<String>,
        min_width: u32,
        overrides: BreakpointOverrides,
    ) -> Self {
        Self {
            asset,
            services,
            label: label.into(),
            min_width,
            unit: services.config.breakpoint_unit,
            overrides,
        }
    }

    pub fn asset(&self) -> &'a Asset {
        self.asset
    }

    pub fn services(&self) -> &'a Services {
        self.services
    }

    pub fn config(&self) -> &'a Config {
        &self.services.config
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    pub fn unit(&self) -> WidthUnit {
        self.unit
    }

    pub fn overrides(&self) -> &BreakpointOverrides {
        &self.overrides
    }

    /// Width / height ratio: the override, else the asset's natural ratio.
    pub fn ratio(&self) -> Option<f64> {
        self.overrides
            .fixed_ratio()
            .or_else(|| self.asset.natural_ratio())
    }

    /// Whether this breakpoint offers `format`. The original always is;
    /// WebP and AVIF follow the override, then the config.
    pub fn format_enabled(&self, format: Format) -> bool {
        let config = self.config();
        match format {
            Format::Original => true,
            Format::Webp => self.overrides.formats.webp.unwrap_or(config.webp),
            Format::Avif => self.overrides.formats.avif.unwrap_or(config.avif),
        }
    }

    /// Sources in `<picture>` order: avif, webp, original.
    pub fn sources(&self) -> Vec<Source<'_>> {
        Format::PRECEDENCE
            .iter()
            .filter(|format| self.format_enabled(**format))
            .map(|format| Source::new(self, *format))
            .collect()
    }

    /// `(min-width: 768px)`, or empty for the base breakpoint.
    pub fn media_string(&self) -> String {
        if self.min_width == 0 {
            String::new()
        } else {
            format!("(min-width: {}{})", self.min_width, self.unit)
        }
    }

    pub fn include_placeholder(&self) -> bool {
        self.overrides
            .placeholder
            .unwrap_or(self.config().placeholder)
    }

    /// Transform parameters for one variant.
    ///
    /// Glide overrides seed the passthrough set. A concrete `format` sets
    /// `fm`, quality and crop focus are resolved from overrides and config,
    /// and explicit `width`/`height` win over the override dimensions.
    pub fn build_params(
        &self,
        width: Option<u32>,
        height: Option<u32>,
        format: Option<Format>,
    ) -> TransformParams {
        let glide = &self.overrides.glide;
        let mut passthrough: BTreeMap<String, Scalar> = glide
            .iter()
            .filter(|(key, value)| {
                !value.is_null() && !matches!(*key, "quality" | "width" | "height")
            })
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        let glide_format = passthrough.remove("fm").map(|fm| fm.to_string());
        let format_name = match format {
            Some(Format::Original) | None => glide_format,
            Some(format) => Some(format.as_str().to_string()),
        };

        let fit = self.crop_focus();
        if fit.is_some() {
            passthrough.remove("fit");
        }

        TransformParams {
            passthrough,
            format: format_name,
            quality: self.quality_for(format),
            fit,
            width: width.or_else(|| glide.width()),
            height: height.or_else(|| glide.height()),
        }
    }

    /// Quality lookup: glide quality, then `quality:<format>`, then config.
    /// The original format is looked up by the asset's extension.
    fn quality_for(&self, format: Option<Format>) -> Option<u32> {
        if let Some(quality) = self.overrides.glide.quality() {
            return Some(quality);
        }
        let name = match format {
            Some(Format::Original) | None => self.asset.extension.as_str(),
            Some(format) => format.as_str(),
        };
        self.overrides
            .quality
            .get(name)
            .or_else(|| self.config().quality_for(name))
            .filter(|q| *q > 0)
    }

    /// `crop-<focus>` unless auto-crop is off or another fit was requested.
    fn crop_focus(&self) -> Option<String> {
        if !self.config().auto_crop {
            return None;
        }
        match self.overrides.glide.fit() {
            Some(fit) if fit != "crop_focal" => None,
            _ => Some(format!("crop-{}", self.asset.focus)),
        }
    }

    /// Blurred, inlined placeholder as an SVG data URL.
    ///
    /// Rendering failures yield an empty string (logged), or an error in
    /// debug mode.
    pub fn placeholder(&self) -> Result<String, ResponsiveError> {
        match self.render_placeholder() {
            Ok(placeholder) => Ok(placeholder),
            Err(e) if self.config().debug => Err(e),
            Err(e) => {
                log::error!(
                    "placeholder for {} ({}) failed: {}",
                    self.asset.id,
                    self.label,
                    e
                );
                Ok(String::new())
            }
        }
    }

    fn render_placeholder(&self) -> Result<String, ResponsiveError> {
        let services = self.services;
        let dims = services.calculator.calculate_for_placeholder(self)?;
        let key = memo::placeholder_key(&self.asset.id, dims.width, dims.height);

        memo::once(services.memo.as_ref(), &key, || {
            let blur = self.config().placeholder_image.blur;
            let mut params = TransformParams {
                width: Some(dims.width),
                height: Some(dims.height),
                ..Default::default()
            };
            params.passthrough.insert("blur".into(), blur.into());

            let rendered = match services.engine.render(self.asset, &params) {
                Ok(rendered) => rendered,
                // Memoized as empty so the engine is asked once per size.
                Err(e @ TransformError::Unsupported { .. }) => {
                    log::warn!("{} is planned without a placeholder: {}", self.asset.id, e);
                    return Ok(String::new());
                }
                Err(e) => return Err(e.into()),
            };
            let svg = placeholder_svg(dims.width, dims.height, blur, &rendered.to_data_url());
            Ok(format!(
                "data:image/svg+xml;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(svg)
            ))
        })
    }

    /// `"<placeholder> 32w"`, or empty when no placeholder is available.
    pub fn placeholder_src(&self) -> Result<String, ResponsiveError> {
        let placeholder = self.placeholder()?;
        if placeholder.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{placeholder} {PLACEHOLDER_DESCRIPTOR}"))
    }

    /// Srcset of one format; empty when the format is disabled here.
    pub fn srcset(&self, include_placeholder: bool, format: Format) -> Result<String, ResponsiveError> {
        if !self.format_enabled(format) {
            return Ok(String::new());
        }
        Source::new(self, format).srcset(include_placeholder)
    }

    pub fn to_data(&self, include_placeholder: bool) -> Result<BreakpointData, ResponsiveError> {
        let sources = self
            .sources()
            .iter()
            .map(|source| source.to_data(include_placeholder))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholder = if include_placeholder {
            Some(self.placeholder()?)
        } else {
            None
        };

        Ok(BreakpointData {
            sources,
            placeholder,
            ..self.data_without_sources()
        })
    }

    /// Query-style data with no sources and no placeholder.
    pub fn data_without_sources(&self) -> BreakpointData {
        BreakpointData {
            asset: self.asset.id.clone(),
            label: self.label.clone(),
            min_width: self.min_width,
            width_unit: self.unit,
            media: self.media_string(),
            ratio: self.ratio(),
            sources: Vec::new(),
            placeholder: None,
        }
    }
}

impl std::fmt::Debug for Breakpoint<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Breakpoint")
            .field("asset", &self.asset.id)
            .field("label", &self.label)
            .field("min_width", &self.min_width)
            .field("overrides", &self.overrides)
            .finish()
    }
}

/// Minimal SVG that blurs an inlined raster over the full viewBox.
fn placeholder_svg(width: u32, height: u32, blur: u32, image: &str) -> String {
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<filter id="b" color-interpolation-filters="sRGB">"#,
            r#"<feGaussianBlur stdDeviation="{blur}"/>"#,
            r#"<feComponentTransfer><feFuncA type="discrete" tableValues="1 1"/></feComponentTransfer>"#,
            r#"</filter>"#,
            r#"<image filter="url(#b)" preserveAspectRatio="none" x="0" y="0" width="100%" height="100%" href="{image}"/>"#,
            r#"</svg>"#
        ),
        w = width,
        h = height,
        blur = blur,
        image = image,
    )
}

/// Decode a placeholder data URL back to its SVG markup.
#[cfg(test)]
pub(crate) fn decode_placeholder(placeholder: &str) -> String {
    let encoded = placeholder
        .strip_prefix("data:image/svg+xml;base64,")
        .unwrap();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    String::from_utf8(bytes).unwrap()
}
