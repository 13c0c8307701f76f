//! One format's variants for a breakpoint.

use crate::asset::mime_for_extension;
use crate::breakpoint::Breakpoint;
use crate::dimensions::{DimensionError, Dimensions};
use crate::engine::TransformError;
use crate::params::{Format, TransformParams};
use crate::responsive::ResponsiveError;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    breakpoint: &'a Breakpoint<'a>,
    format: Format,
}

/// Query-style view of a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceData {
    pub format: Format,
    pub mime_type: String,
    pub min_width: u32,
    pub media: String,
    pub srcset: String,
}

impl<'a> Source<'a> {
    pub fn new(breakpoint: &'a Breakpoint<'a>, format: Format) -> Self {
        Self { breakpoint, format }
    }

    pub fn breakpoint(&self) -> &'a Breakpoint<'a> {
        self.breakpoint
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// `image/avif`, `image/webp`, or the original's type.
    pub fn mime_type(&self) -> &'static str {
        match self.format {
            Format::Original => self.breakpoint.asset().mime_type(),
            format => mime_for_extension(format.as_str()),
        }
    }

    /// Candidate dimensions, largest first.
    pub fn widths(&self) -> Result<Vec<Dimensions>, DimensionError> {
        self.breakpoint
            .services()
            .calculator
            .calculate_for_breakpoint(self)
    }

    pub fn params(&self, dimensions: Dimensions) -> TransformParams {
        self.breakpoint.build_params(
            Some(dimensions.width),
            Some(dimensions.height),
            Some(self.format),
        )
    }

    /// `"<url> <width>w"`.
    ///
    /// An engine failure drops the entry (logged) instead of failing the
    /// srcset, except in debug mode.
    pub fn srcset_entry(&self, dimensions: Dimensions) -> Result<Option<String>, TransformError> {
        let breakpoint = self.breakpoint;
        let params = self.params(dimensions);
        match breakpoint
            .services()
            .engine
            .url(breakpoint.asset(), &params)
        {
            Ok(url) => Ok(Some(format!("{} {}w", url, dimensions.width))),
            Err(e) if breakpoint.config().debug => Err(e),
            Err(e) => {
                log::error!(
                    "{} {}w for {} skipped: {}",
                    self.format,
                    dimensions.width,
                    breakpoint.asset().id,
                    e
                );
                Ok(None)
            }
        }
    }

    /// All entries joined with `", "`, led by the placeholder when requested.
    pub fn srcset(&self, include_placeholder: bool) -> Result<String, ResponsiveError> {
        let mut entries = Vec::new();
        if include_placeholder {
            let placeholder = self.breakpoint.placeholder_src()?;
            if !placeholder.is_empty() {
                entries.push(placeholder);
            }
        }
        for dimensions in self.widths()? {
            if let Some(entry) = self.srcset_entry(dimensions)? {
                entries.push(entry);
            }
        }
        Ok(entries.join(", "))
    }

    pub fn to_data(&self, include_placeholder: bool) -> Result<SourceData, ResponsiveError> {
        Ok(SourceData {
            format: self.format,
            mime_type: self.mime_type().to_string(),
            min_width: self.breakpoint.min_width(),
            media: self.breakpoint.media_string(),
            srcset: self.srcset(include_placeholder)?,
        })
    }
}
