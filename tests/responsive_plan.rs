//! End-to-end planning through the public API.
//!
//! Uses a catalog of stub assets and a URL engine, so nothing here decodes
//! an image. Rendering with real pixels lives in `render_engine.rs`.

use respimg::{
    Asset, AssetCatalog, Breakpoint, Config, DimensionCalculator, DimensionError, Dimensions,
    FocusPoint, Format, Parameters, RenderedImage, Responsive, ResponsiveError, Scalar, Services,
    Source, TransformEngine, TransformError, TransformParams, UrlEngine,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

fn asset(id: &str, width: u32, height: u32, size: u64) -> Asset {
    Asset {
        id: id.to_string(),
        url: format!("/assets/{id}"),
        path: Some(id.to_string()),
        width,
        height,
        size,
        extension: id.rsplit('.').next().unwrap_or("jpg").to_string(),
        focus: FocusPoint::center(),
    }
}

fn catalog() -> AssetCatalog {
    let mut dawn = asset("dawn.jpg", 2400, 1800, 3000 * 1024);
    dawn.focus = "29-71".parse().unwrap();
    AssetCatalog::new(vec![
        dawn,
        asset("test.jpg", 340, 280, 22_000),
        asset("logo.svg", 120, 40, 2_000),
    ])
}

fn two_breakpoints() -> Config {
    Config {
        breakpoints: BTreeMap::from([("md".to_string(), 768)]),
        ..Config::default()
    }
}

/// URL engine that also counts render requests and can fail them.
#[derive(Default)]
struct CountingEngine {
    renders: Mutex<usize>,
    fail_render: bool,
}

impl TransformEngine for CountingEngine {
    fn url(&self, asset: &Asset, params: &TransformParams) -> Result<String, TransformError> {
        UrlEngine::new("/img").url(asset, params)
    }

    fn render(
        &self,
        _asset: &Asset,
        _params: &TransformParams,
    ) -> Result<RenderedImage, TransformError> {
        *self.renders.lock().unwrap() += 1;
        if self.fail_render {
            return Err(TransformError::Failed("cache disk unavailable".into()));
        }
        Ok(RenderedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".into(),
        })
    }
}

// =========================================================================
// Plans
// =========================================================================

#[test]
fn plan_for_catalog_asset() {
    let services = Services::new(two_breakpoints(), Arc::new(CountingEngine::default()));
    let params = Parameters::new()
        .with("alt", "Dawn over the lake")
        .with("placeholder", false);
    let responsive = Responsive::resolve("/assets/dawn.jpg", &catalog(), params, &services).unwrap();

    let plan = responsive.plan().unwrap();
    assert_eq!(plan.asset, "dawn.jpg");
    assert_eq!(plan.img.src, "/assets/dawn.jpg");
    assert_eq!(
        plan.attributes,
        vec![("alt".to_string(), "Dawn over the lake".to_string())]
    );
    assert_eq!(plan.breakpoints.len(), 2);

    let default = &plan.breakpoints[0];
    assert_eq!(default.media, "");
    let webp = &default.sources[0];
    assert_eq!(webp.format, Format::Webp);
    let entries: Vec<&str> = webp.srcset.split(", ").collect();
    assert_eq!(entries.len(), 16);
    assert_eq!(
        entries[0],
        "/img/dawn.jpg?fm=webp&q=90&fit=crop-29-71&w=2400&h=1800 2400w"
    );
    assert!(entries[15].ends_with(" 165w"));
}

#[test]
fn ratio_per_breakpoint_changes_heights() {
    let services = Services::new(two_breakpoints(), Arc::new(CountingEngine::default()));
    let params = Parameters::new()
        .with("placeholder", false)
        .with("ratio", "1/1")
        .with("md:ratio", "16/9");
    let responsive = Responsive::resolve("test.jpg", &catalog(), params, &services).unwrap();

    let plan = responsive.plan().unwrap();
    let default = &plan.breakpoints[0].sources[1].srcset;
    let md = &plan.breakpoints[1].sources[1].srcset;
    assert!(default.contains("w=340&h=340 340w"));
    assert!(md.contains("w=340&h=191 340w"));
}

#[test]
fn svg_is_passed_through() {
    let services = Services::new(Config::default(), Arc::new(CountingEngine::default()));
    let responsive = Responsive::resolve("logo.svg", &catalog(), Parameters::new(), &services).unwrap();

    let plan = responsive.plan().unwrap();
    assert!(plan.passthrough);
    assert!(plan.breakpoints.is_empty());
    assert_eq!((plan.img.width, plan.img.height), (120, 40));
}

#[test]
fn missing_asset_is_the_only_fatal_error() {
    let services = Services::new(Config::default(), Arc::new(CountingEngine::default()));
    let result = Responsive::resolve("missing.jpg", &catalog(), Parameters::new(), &services);
    assert!(matches!(result, Err(ResponsiveError::AssetNotFound(_))));
}

// =========================================================================
// Placeholders
// =========================================================================

#[test]
fn placeholder_rendered_once_per_size() {
    let engine = Arc::new(CountingEngine::default());
    let services = Services::new(Config::default(), engine.clone());
    let responsive = Responsive::resolve("test.jpg", &catalog(), Parameters::new(), &services).unwrap();

    let plan = responsive.plan().unwrap();
    assert!(plan.placeholder.is_some());
    assert_eq!(*engine.renders.lock().unwrap(), 1);

    // Every source leads with the placeholder
    for breakpoint in &plan.breakpoints {
        for source in &breakpoint.sources {
            assert!(source.srcset.starts_with("data:image/svg+xml;base64,"));
        }
    }
}

#[test]
fn broken_placeholder_does_not_break_the_plan() {
    let engine = Arc::new(CountingEngine {
        fail_render: true,
        ..CountingEngine::default()
    });
    let services = Services::new(two_breakpoints(), engine);
    let responsive = Responsive::resolve("test.jpg", &catalog(), Parameters::new(), &services).unwrap();

    let plan = responsive.plan().unwrap();
    assert_eq!(plan.placeholder, None);
    assert!(plan.breakpoints[0].sources[0].srcset.starts_with("/img/"));
}

// =========================================================================
// Query data
// =========================================================================

#[test]
fn query_args_map_to_breakpoints() {
    let services = Services::new(two_breakpoints(), Arc::new(CountingEngine::default()));
    let args = Parameters::from_query_args([
        ("md_ratio", Scalar::Float(2.0)),
        ("webp", Scalar::Bool(false)),
        ("placeholder", Scalar::Bool(false)),
    ]);
    let responsive = Responsive::resolve("test.jpg", &catalog(), args, &services).unwrap();

    let data = responsive.to_data().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[1].label, "md");
    assert_eq!(data[1].ratio, Some(2.0));
    assert_eq!(data[1].sources.len(), 1);
    assert_eq!(data[1].sources[0].mime_type, "image/jpeg");

    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json[1]["width_unit"], "px");
    assert!(json[0].get("placeholder").is_none());
}

// =========================================================================
// Custom calculator
// =========================================================================

struct SquareCalculator;

impl DimensionCalculator for SquareCalculator {
    fn calculate_for_breakpoint(&self, _source: &Source<'_>) -> Result<Vec<Dimensions>, DimensionError> {
        Ok(vec![Dimensions::new(100, 100)])
    }

    fn calculate_for_img_tag(&self, _breakpoint: &Breakpoint<'_>) -> Result<Dimensions, DimensionError> {
        Ok(Dimensions::new(100, 100))
    }

    fn calculate_for_placeholder(
        &self,
        _breakpoint: &Breakpoint<'_>,
    ) -> Result<Dimensions, DimensionError> {
        Ok(Dimensions::new(100, 100))
    }
}

#[test]
fn custom_calculator_replaces_width_series() {
    let services = Services::new(Config::default(), Arc::new(CountingEngine::default()))
        .with_calculator(Arc::new(SquareCalculator));
    let params = Parameters::new()
        .with("placeholder", false)
        .with("webp", false);
    let responsive = Responsive::resolve("test.jpg", &catalog(), params, &services).unwrap();

    let default = responsive.default_breakpoint();
    let sources = default.sources();
    let srcset = sources[0].srcset(false).unwrap();
    assert!(srcset.contains("w=100&h=100"));
    assert_eq!(srcset.split(", ").count(), 1);
}
