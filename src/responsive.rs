//! Responsive image planning for one asset.
//!
//! [`Responsive`] is the entry point: it resolves the asset, splits the
//! call-site [`Parameters`] into per-breakpoint overrides and produces either
//! a [`RenderPlan`] (everything a `<picture>` needs) or query-style
//! [`BreakpointData`].
//!
//! ## Failure policy
//!
//! Only an unresolvable asset is fatal. Engine failures drop the affected
//! srcset entry or placeholder, a breakpoint whose dimensions cannot be
//! computed is planned without sources, and a failed `<img>` fallback serves
//! the original at its natural size. Each degradation is logged with
//! `log::error!`. With `debug = true` in the config they are raised instead.
//!
//! An engine that cannot render bytes at all (the URL engine) is not a
//! failure: the plan simply has no placeholder.

use crate::asset::{Asset, AssetError, AssetSource};
use crate::breakpoint::{Breakpoint, BreakpointData};
use crate::config::{Config, DEFAULT_BREAKPOINT};
use crate::dimensions::{DimensionCalculator, DimensionError, ResponsiveCalculator};
use crate::engine::{TransformEngine, TransformError};
use crate::memo::{Memo, MemoryMemo};
use crate::overrides::Parameters;
use crate::params::{Format, Scalar, TransformParams};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResponsiveError {
    #[error("Asset not found: {0}")]
    AssetNotFound(String),
    #[error("Asset error: {0}")]
    Asset(#[source] AssetError),
    #[error("Dimension error: {0}")]
    Dimension(#[from] DimensionError),
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
}

impl From<AssetError> for ResponsiveError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::NotFound(reference) => ResponsiveError::AssetNotFound(reference),
            other => ResponsiveError::Asset(other),
        }
    }
}

/// Collaborators the planner works with.
pub struct Services {
    pub config: Config,
    pub calculator: Arc<dyn DimensionCalculator>,
    pub engine: Arc<dyn TransformEngine>,
    pub memo: Arc<dyn Memo>,
}

impl Services {
    /// Services with the default calculator and a process-local memo.
    pub fn new(config: Config, engine: Arc<dyn TransformEngine>) -> Self {
        Self {
            config,
            calculator: Arc::new(ResponsiveCalculator),
            engine,
            memo: Arc::new(MemoryMemo::new()),
        }
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn DimensionCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_memo(mut self, memo: Arc<dyn Memo>) -> Self {
        self.memo = memo;
        self
    }
}

/// Fallback `<img>` attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImgTag {
    pub src: String,
    pub width: u32,
    pub height: u32,
}

/// One `<source>` of a planned breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSource {
    pub format: Format,
    pub mime_type: String,
    pub srcset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedBreakpoint {
    pub label: String,
    pub min_width: u32,
    pub media: String,
    pub sources: Vec<PlannedSource>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
}

/// Everything the rendering boundary needs to emit markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPlan {
    pub asset: String,
    /// SVG and GIF render as a plain `<img>` without sources.
    pub passthrough: bool,
    pub img: ImgTag,
    pub attributes: Vec<(String, String)>,
    pub include_placeholder: bool,
    /// Placeholder shown in the `<img>` while sources load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub breakpoints: Vec<PlannedBreakpoint>,
}

/// A responsive image: one asset plus the parameters it was requested with.
pub struct Responsive<'s> {
    asset: Asset,
    parameters: Parameters,
    services: &'s Services,
    table: Vec<(String, u32)>,
}

impl<'s> Responsive<'s> {
    pub fn new(asset: Asset, parameters: Parameters, services: &'s Services) -> Self {
        Self {
            asset,
            parameters,
            table: services.config.breakpoint_table(),
            services,
        }
    }

    /// Resolve `reference` through `assets` first.
    pub fn resolve(
        reference: &str,
        assets: &dyn AssetSource,
        parameters: Parameters,
        services: &'s Services,
    ) -> Result<Self, ResponsiveError> {
        let asset = assets.resolve(reference)?;
        Ok(Self::new(asset, parameters, services))
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn labels(&self) -> Vec<&str> {
        self.table.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Breakpoints ascending by minimum width; the default breakpoint at 0
    /// is always first.
    pub fn breakpoints(&self) -> Vec<Breakpoint<'_>> {
        let labels = self.labels();
        self.table
            .iter()
            .map(|(label, min_width)| {
                let overrides = self.parameters.breakpoint_overrides(label, &labels);
                Breakpoint::new(&self.asset, self.services, label.as_str(), *min_width, overrides)
            })
            .collect()
    }

    /// The breakpoint starting at viewport width 0.
    pub fn default_breakpoint(&self) -> Breakpoint<'_> {
        let labels = self.labels();
        let label = self
            .table
            .iter()
            .find(|(_, min_width)| *min_width == 0)
            .map(|(label, _)| label.as_str())
            .unwrap_or(DEFAULT_BREAKPOINT);
        let overrides = self.parameters.breakpoint_overrides(label, &labels);
        Breakpoint::new(&self.asset, self.services, label, 0, overrides)
    }

    /// `placeholder` parameter, else the config default.
    pub fn include_placeholder(&self) -> bool {
        self.parameters
            .get("placeholder")
            .and_then(Scalar::as_bool)
            .unwrap_or(self.services.config.placeholder)
    }

    pub fn is_passthrough(&self) -> bool {
        self.asset.is_passthrough()
    }

    /// HTML attributes: every parameter the planner does not consume.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.parameters.attributes(&self.labels())
    }

    /// Fallback `<img>`: the original file, or a resized variant when a
    /// smaller width was requested.
    pub fn img_tag(&self) -> Result<ImgTag, ResponsiveError> {
        let breakpoint = self.default_breakpoint();
        let dims = self
            .services
            .calculator
            .calculate_for_img_tag(&breakpoint)?;

        let src = if dims.width < self.asset.width {
            let params = TransformParams {
                width: Some(dims.width),
                height: Some(dims.height),
                ..Default::default()
            };
            self.services.engine.url(&self.asset, &params)?
        } else {
            self.asset.url.clone()
        };

        Ok(ImgTag {
            src,
            width: dims.width,
            height: dims.height,
        })
    }

    /// The untransformed original at its natural size.
    fn original_img_tag(&self) -> ImgTag {
        ImgTag {
            src: self.asset.url.clone(),
            width: self.asset.width,
            height: self.asset.height,
        }
    }

    /// Plan the complete `<picture>`.
    pub fn plan(&self) -> Result<RenderPlan, ResponsiveError> {
        let include_placeholder = self.include_placeholder();
        let img = match self.img_tag() {
            Ok(img) => img,
            Err(e) if !self.services.config.debug => {
                log::error!(
                    "img tag of {} falls back to the original: {}",
                    self.asset.id,
                    e
                );
                self.original_img_tag()
            }
            Err(e) => return Err(e),
        };

        let breakpoints = if self.is_passthrough() {
            Vec::new()
        } else {
            self.breakpoints()
                .iter()
                .map(|breakpoint| self.plan_breakpoint(breakpoint))
                .collect::<Result<Vec<_>, _>>()?
        };
        let placeholder = breakpoints
            .last()
            .filter(|_| include_placeholder)
            .map(|b| b.placeholder.clone())
            .filter(|p| !p.is_empty());

        log::debug!(
            "planned {} with {} breakpoints",
            self.asset.id,
            breakpoints.len()
        );

        Ok(RenderPlan {
            asset: self.asset.id.clone(),
            passthrough: self.is_passthrough(),
            img,
            attributes: self.attributes(),
            include_placeholder,
            placeholder,
            breakpoints,
        })
    }

    fn plan_breakpoint(&self, breakpoint: &Breakpoint<'_>) -> Result<PlannedBreakpoint, ResponsiveError> {
        let include_placeholder = breakpoint.include_placeholder();
        let sources = breakpoint
            .sources()
            .iter()
            .map(|source| {
                Ok(PlannedSource {
                    format: source.format(),
                    mime_type: source.mime_type().to_string(),
                    srcset: source.srcset(include_placeholder)?,
                })
            })
            .collect::<Result<Vec<_>, ResponsiveError>>();

        let sources = match sources {
            Ok(sources) => sources,
            Err(e) if !self.services.config.debug => {
                log::error!(
                    "breakpoint {} of {} has no sources: {}",
                    breakpoint.label(),
                    self.asset.id,
                    e
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let placeholder = if include_placeholder {
            breakpoint.placeholder()?
        } else {
            String::new()
        };

        Ok(PlannedBreakpoint {
            label: breakpoint.label().to_string(),
            min_width: breakpoint.min_width(),
            media: breakpoint.media_string(),
            sources,
            placeholder,
        })
    }

    /// Query-style data for every breakpoint.
    pub fn to_data(&self) -> Result<Vec<BreakpointData>, ResponsiveError> {
        let include_placeholder = self.include_placeholder();
        self.breakpoints()
            .iter()
            .map(|breakpoint| match breakpoint.to_data(include_placeholder) {
                Ok(data) => Ok(data),
                Err(e) if !self.services.config.debug => {
                    log::error!(
                        "breakpoint {} of {} has no sources: {}",
                        breakpoint.label(),
                        self.asset.id,
                        e
                    );
                    Ok(breakpoint.data_without_sources())
                }
                Err(e) => Err(e),
            })
            .collect()
    }
}
