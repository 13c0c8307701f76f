//! Candidate output dimensions.
//!
//! A [`DimensionCalculator`] decides which widths a source offers, how large
//! the fallback `<img>` is and how large the placeholder is. The calculator is
//! chosen when [`Services`](crate::Services) are built; [`ResponsiveCalculator`]
//! is the default.
//!
//! ## File-size-optimized widths
//!
//! The default series assumes file size scales with pixel count. Starting at
//! the natural width, each step predicts a file `file_size_factor` (0.7) times
//! smaller and picks the width whose pixel count matches that prediction at
//! the asset's aspect ratio. Each width is therefore about `sqrt(0.7)` ≈ 0.837
//! of the previous one. The series stops once the predicted file drops below
//! `min_file_size` or the width drops below `min_width`.
//!
//! ```text
//! 300×200, 300 KiB  →  300 250 210 175 147 122 102 86 72 60
//! ```

use crate::breakpoint::Breakpoint;
use crate::config::CalculatorConfig;
use crate::source::Source;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DimensionError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
}

/// Output size of one variant. Both sides are > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions at `width` for a width / height `ratio`; height is rounded
    /// and at least 1.
    pub fn from_ratio(width: u32, ratio: f64) -> Self {
        let height = (width as f64 / ratio).round().max(1.0) as u32;
        Self { width, height }
    }
}

/// Decides variant sizes for sources, img tags and placeholders.
pub trait DimensionCalculator: Send + Sync {
    /// Widths offered by one source, largest first. Never empty.
    fn calculate_for_breakpoint(&self, source: &Source<'_>) -> Result<Vec<Dimensions>, DimensionError>;

    /// Size of the fallback `<img>`.
    fn calculate_for_img_tag(&self, breakpoint: &Breakpoint<'_>) -> Result<Dimensions, DimensionError>;

    /// Size of the blurred placeholder.
    fn calculate_for_placeholder(
        &self,
        breakpoint: &Breakpoint<'_>,
    ) -> Result<Dimensions, DimensionError>;
}

/// Default calculator: file-size-optimized widths, heights from the
/// breakpoint ratio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponsiveCalculator;

impl ResponsiveCalculator {
    /// Uncapped width series for an asset of `width`×`height` weighing `size`
    /// bytes, starting with `width`.
    pub fn width_series(width: u32, height: u32, size: u64, tuning: &CalculatorConfig) -> Vec<u32> {
        let mut widths = vec![width];
        if width == 0 || height == 0 {
            return widths;
        }

        let ratio_hw = height as f64 / width as f64;
        let area = width as f64 * height as f64;
        let mut predicted = size as f64;
        let pixel_price = predicted / area;

        loop {
            predicted *= tuning.file_size_factor;
            let next = ((predicted / pixel_price) / ratio_hw).sqrt().floor();
            if !next.is_finite() || next < tuning.min_width as f64 || (predicted as u64) < tuning.min_file_size {
                break;
            }
            widths.push(next as u32);
        }
        widths
    }

    /// Keep widths below `cap`; an over-restrictive cap yields `[cap]`.
    pub fn cap_widths(widths: Vec<u32>, cap: Option<u32>) -> Result<Vec<u32>, DimensionError> {
        let Some(cap) = cap else {
            return Ok(widths);
        };
        if cap == 0 {
            return Err(DimensionError::InvalidDimension(
                "max width must be greater than 0".into(),
            ));
        }
        let capped: Vec<u32> = widths.into_iter().filter(|w| *w < cap).collect();
        Ok(if capped.is_empty() { vec![cap] } else { capped })
    }

    /// Width / height ratio the breakpoint renders at.
    pub fn breakpoint_ratio(breakpoint: &Breakpoint<'_>) -> Result<f64, DimensionError> {
        breakpoint.ratio().ok_or_else(|| {
            let asset = breakpoint.asset();
            DimensionError::InvalidDimension(format!(
                "{} is {}x{}",
                asset.id, asset.width, asset.height
            ))
        })
    }

    /// `glide:width` (or `width`) beats the configured `max_width`.
    fn max_width_cap(breakpoint: &Breakpoint<'_>) -> Option<u32> {
        breakpoint
            .overrides()
            .glide
            .width()
            .or(breakpoint.config().max_width)
    }
}

impl DimensionCalculator for ResponsiveCalculator {
    fn calculate_for_breakpoint(&self, source: &Source<'_>) -> Result<Vec<Dimensions>, DimensionError> {
        let breakpoint = source.breakpoint();
        let asset = breakpoint.asset();
        let ratio = Self::breakpoint_ratio(breakpoint)?;

        let series = Self::width_series(
            asset.width,
            asset.height,
            asset.size,
            &breakpoint.config().calculator,
        );
        let widths = Self::cap_widths(series, Self::max_width_cap(breakpoint))?;

        Ok(widths
            .into_iter()
            .map(|w| Dimensions::from_ratio(w, ratio))
            .collect())
    }

    fn calculate_for_img_tag(&self, breakpoint: &Breakpoint<'_>) -> Result<Dimensions, DimensionError> {
        let ratio = Self::breakpoint_ratio(breakpoint)?;
        let natural = breakpoint.asset().width;
        let width = match Self::max_width_cap(breakpoint) {
            Some(0) => {
                return Err(DimensionError::InvalidDimension(
                    "max width must be greater than 0".into(),
                ));
            }
            Some(cap) => cap.min(natural),
            None => natural,
        };
        Ok(Dimensions::from_ratio(width, ratio))
    }

    fn calculate_for_placeholder(
        &self,
        breakpoint: &Breakpoint<'_>,
    ) -> Result<Dimensions, DimensionError> {
        let ratio = Self::breakpoint_ratio(breakpoint)?;
        Ok(Dimensions::from_ratio(
            breakpoint.config().placeholder_image.width,
            ratio,
        ))
    }
}
