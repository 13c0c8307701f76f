//! Plans rendered with real pixels through the local render engine.

use respimg::asset::{AssetSource, DiskAssets};
use respimg::{Config, Parameters, RenderEngine, Responsive, Services};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Write a noisy PNG so the file is large enough for a multi-width series.
fn write_photo(dir: &Path, name: &str, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(7919) ^ y.wrapping_mul(104_729);
        image::Rgb([(v % 251) as u8, (v % 241) as u8, (v % 239) as u8])
    });
    img.save(dir.join(name)).unwrap();
}

fn config() -> Config {
    Config {
        breakpoints: BTreeMap::from([("md".to_string(), 768)]),
        ..Config::default()
    }
}

#[test]
fn plan_renders_every_variant_into_the_cache() {
    let tmp = TempDir::new().unwrap();
    write_photo(tmp.path(), "photo.png", 240, 160);

    let config = config();
    let engine = RenderEngine::from_config(&config, tmp.path());
    let cache_dir = engine.cache_dir().to_path_buf();
    let services = Services::new(config, Arc::new(engine));
    let assets = DiskAssets::new(tmp.path());

    let params = Parameters::new().with("placeholder", false);
    let responsive = Responsive::resolve("photo.png", &assets, params, &services).unwrap();
    let plan = responsive.plan().unwrap();

    let rendered = std::fs::read_dir(&cache_dir).unwrap().count();
    assert!(rendered > 0);

    for breakpoint in &plan.breakpoints {
        for source in &breakpoint.sources {
            for entry in source.srcset.split(", ") {
                let (url, _) = entry.rsplit_once(' ').unwrap();
                let file = url.strip_prefix("/img/cache/").unwrap();
                assert!(cache_dir.join(file).exists(), "missing {file}");
            }
        }
    }

    // Both breakpoints share variants, so the cache holds each one once.
    let first = &plan.breakpoints[0].sources;
    let second = &plan.breakpoints[1].sources;
    assert_eq!(first, second);
}

#[test]
fn placeholder_is_an_inlined_blurred_svg() {
    let tmp = TempDir::new().unwrap();
    write_photo(tmp.path(), "photo.png", 240, 160);

    let config = config();
    let services = Services::new(
        config.clone(),
        Arc::new(RenderEngine::from_config(&config, tmp.path())),
    );
    let assets = DiskAssets::new(tmp.path());
    let responsive = Responsive::resolve("photo.png", &assets, Parameters::new(), &services).unwrap();

    let placeholder = responsive.default_breakpoint().placeholder().unwrap();
    assert!(placeholder.starts_with("data:image/svg+xml;base64,"));
}

#[test]
fn variants_match_planned_dimensions() {
    let tmp = TempDir::new().unwrap();
    write_photo(tmp.path(), "photo.png", 240, 160);

    let config = config();
    let engine = RenderEngine::from_config(&config, tmp.path());
    let cache_dir = engine.cache_dir().to_path_buf();
    let services = Services::new(config, Arc::new(engine));
    let asset = DiskAssets::new(tmp.path()).resolve("photo.png").unwrap();

    let params = Parameters::new()
        .with("placeholder", false)
        .with("webp", false)
        .with("ratio", 1.0);
    let responsive = Responsive::new(asset, params, &services);
    let plan = responsive.plan().unwrap();

    let srcset = &plan.breakpoints[0].sources[0].srcset;
    let (url, descriptor) = srcset.split(", ").next().unwrap().rsplit_once(' ').unwrap();
    assert_eq!(descriptor, "240w");
    let file = url.strip_prefix("/img/cache/").unwrap();
    let (w, h) = image::image_dimensions(cache_dir.join(file)).unwrap();
    assert_eq!((w, h), (240, 240));
}
