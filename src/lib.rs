//! # respimg
//!
//! Plans responsive images: given one source asset and a handful of
//! parameters, work out every variant a `<picture>` element should offer,
//! per viewport breakpoint and per output format, and hand the transform
//! parameters for each variant to an engine that turns them into URLs.
//!
//! # Architecture
//!
//! ```text
//! Responsive ─► Breakpoint (per label, ascending min width)
//!                  └─► Source (avif, webp, original)
//!                         ├─► DimensionCalculator   widths + heights
//!                         ├─► Breakpoint::build_params   TransformParams
//!                         └─► TransformEngine::url  srcset entries
//! ```
//!
//! The planner never touches pixels. Everything with side effects sits behind
//! a trait bundled in [`Services`]: the [`TransformEngine`], the
//! [`DimensionCalculator`] and the placeholder [`Memo`](memo::Memo). Tests
//! swap any of them for a recording stand-in.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`responsive`] | Entry point: asset resolution, breakpoint table, render plan |
//! | [`breakpoint`] | One breakpoint: enabled formats, media query, parameter building, placeholder |
//! | [`source`] | One format of a breakpoint: srcset strings |
//! | [`dimensions`] | Width series, img-tag and placeholder sizes |
//! | [`params`] | Transform parameter value types and their query encoding |
//! | [`overrides`] | Call-site parameter bag and the typed per-breakpoint override layers |
//! | [`asset`] | Asset model, focus points, JSON catalog |
//! | [`engine`] | Transform engines: signed URLs or local rendering with the `image` crate |
//! | [`memo`] | Placeholder memoization |
//! | [`config`] | `respimg.toml` loading, layering and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Widths From File Size, Not Fixed Steps
//!
//! Offering the same fixed widths for every image wastes variants on small
//! files and under-serves large ones. The default calculator derives the
//! series from the asset's byte size: each step targets a file roughly 30%
//! smaller, so every variant is a meaningful download saving. See
//! [`dimensions`] for the exact rule.
//!
//! ## Degrade, Don't Fail
//!
//! A responsive image with one missing srcset entry still renders; a page
//! that errors because a cache file went missing does not. Engine and
//! dimension failures are logged and dropped unless `debug = true`, in which
//! case they surface as [`ResponsiveError`]s.
//!
//! ## Typed Overrides
//!
//! Call sites speak in namespaced string keys (`glide:fit`, `md:ratio`,
//! `quality:webp`). They are parsed once into
//! [`BreakpointOverrides`](overrides::BreakpointOverrides), so the rest of
//! the crate works with typed fields instead of key lookups.

pub mod asset;
pub mod breakpoint;
pub mod config;
pub mod dimensions;
pub mod engine;
pub mod memo;
pub mod output;
pub mod overrides;
pub mod params;
pub mod responsive;
pub mod source;

pub use asset::{Asset, AssetCatalog, AssetError, AssetSource, DiskAssets, FocusPoint};
pub use breakpoint::{Breakpoint, BreakpointData};
pub use config::Config;
pub use dimensions::{DimensionCalculator, DimensionError, Dimensions, ResponsiveCalculator};
pub use engine::{RenderEngine, RenderedImage, TransformEngine, TransformError, UrlEngine};
pub use overrides::Parameters;
pub use params::{Format, Scalar, TransformParams};
pub use responsive::{RenderPlan, Responsive, ResponsiveError, Services};
pub use source::{Source, SourceData};
