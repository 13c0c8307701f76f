use clap::{Parser, Subcommand, ValueEnum};
use respimg::asset::{AssetCatalog, AssetSource, DiskAssets};
use respimg::config::{self, Config};
use respimg::{
    Asset, Breakpoint, Format, Parameters, RenderEngine, Responsive, Services, Source,
    TransformEngine, UrlEngine, output,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "respimg")]
#[command(about = "Plan responsive image variants, srcsets and placeholders")]
#[command(long_about = "\
Plan responsive image variants, srcsets and placeholders

For one source image, respimg works out the widths worth offering per
viewport breakpoint and per format (avif, webp, original), builds the
transform parameters for every variant and turns them into URLs.

Parameters use the same keys as the template tag:

  ratio=16/9             aspect ratio for every breakpoint
  md:ratio=1             aspect ratio from the md breakpoint up
  width=800              max width (alias of glide:width)
  glide:fit=fill         raw transform parameter
  quality:webp=70        per-format quality
  webp=false avif=true   format toggles
  placeholder=false      skip the blurred placeholder
  alt=\"Dawn\"             anything else becomes an <img> attribute

Run 'respimg gen-config' to generate a documented respimg.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// How variant URLs are produced
    #[arg(long, value_enum, default_value_t = EngineKind::Url, global = true)]
    engine: EngineKind,

    /// Directory originals are read from
    #[arg(long, default_value = ".", global = true)]
    source_root: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineKind {
    /// Signed query URLs for an on-the-fly image server
    Url,
    /// Render variants locally into the cache directory
    Render,
}

/// Where assets are looked up.
#[derive(clap::Args, Clone)]
struct AssetArgs {
    /// Asset reference: id, URL or path
    reference: String,

    /// JSON asset catalog; without it the reference is a file under --source-root
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the render plan of a responsive image
    Plan {
        #[command(flatten)]
        asset: AssetArgs,

        /// Parameter as key=value (repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,

        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
    /// Print the width series for an image size
    Widths {
        /// Natural width in pixels
        #[arg(long, required_unless_present = "file")]
        width: Option<u32>,

        /// Natural height in pixels
        #[arg(long, required_unless_present = "file")]
        height: Option<u32>,

        /// File size in bytes
        #[arg(long, required_unless_present = "file")]
        size: Option<u64>,

        /// Read width, height and size from an image file
        #[arg(long, conflicts_with_all = ["width", "height", "size"])]
        file: Option<PathBuf>,

        /// Max-width cap
        #[arg(long)]
        max_width: Option<u32>,

        /// Aspect ratio override, e.g. 16/9
        #[arg(long)]
        ratio: Option<String>,
    },
    /// Print query-style breakpoint data as JSON
    Query {
        #[command(flatten)]
        asset: AssetArgs,

        /// Query argument as key=value; `md_ratio` means `md:ratio` (repeatable)
        #[arg(long = "arg", short = 'a')]
        args: Vec<String>,
    },
    /// Validate the config file
    Check,
    /// Print a stock respimg.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match &cli.command {
        Command::Plan {
            asset,
            params,
            json,
        } => {
            let services = build_services(&cli)?;
            let assets = asset_source(&cli.source_root, asset.catalog.as_deref())?;
            let parameters = parse_parameters(params)?;
            let responsive =
                Responsive::resolve(&asset.reference, assets.as_ref(), parameters, &services)?;
            let plan = responsive.plan()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                output::print_plan(&plan);
            }
        }
        Command::Widths {
            width,
            height,
            size,
            file,
            max_width,
            ratio,
        } => {
            let mut services = build_services(&cli)?;
            if max_width.is_some() {
                services.config.max_width = *max_width;
            }
            let asset = match file {
                Some(file) => probe_file(file)?,
                None => sized_asset(
                    width.unwrap_or_default(),
                    height.unwrap_or_default(),
                    size.unwrap_or_default(),
                ),
            };
            let mut parameters = Parameters::new();
            if let Some(ratio) = ratio {
                parameters.insert("ratio", ratio.as_str());
            }
            let overrides = parameters.breakpoint_overrides(
                config::DEFAULT_BREAKPOINT,
                &[config::DEFAULT_BREAKPOINT],
            );
            let breakpoint = Breakpoint::new(
                &asset,
                &services,
                config::DEFAULT_BREAKPOINT,
                0,
                overrides,
            );
            let widths = Source::new(&breakpoint, Format::Original).widths()?;
            output::print_widths(&widths);
        }
        Command::Query { asset, args } => {
            let services = build_services(&cli)?;
            let assets = asset_source(&cli.source_root, asset.catalog.as_deref())?;
            let pairs = args
                .iter()
                .map(|raw| {
                    Parameters::parse_assignment(raw)
                        .ok_or_else(|| format!("invalid argument '{raw}', expected key=value"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let parameters = Parameters::from_query_args(pairs);
            let responsive =
                Responsive::resolve(&asset.reference, assets.as_ref(), parameters, &services)?;
            println!("{}", serde_json::to_string_pretty(&responsive.to_data()?)?);
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            let source = cli
                .config
                .exists()
                .then(|| cli.config.display().to_string());
            output::print_check(&config, source.as_deref());
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn build_services(cli: &Cli) -> Result<Services, Box<dyn std::error::Error>> {
    let config = config::load_config(&cli.config)?;
    let engine = build_engine(cli.engine, &config, &cli.source_root);
    Ok(Services::new(config, engine))
}

fn build_engine(kind: EngineKind, config: &Config, source_root: &Path) -> Arc<dyn TransformEngine> {
    match kind {
        EngineKind::Url => Arc::new(UrlEngine::from_config(config)),
        EngineKind::Render => Arc::new(RenderEngine::from_config(config, source_root)),
    }
}

fn asset_source(
    source_root: &Path,
    catalog: Option<&Path>,
) -> Result<Box<dyn AssetSource>, Box<dyn std::error::Error>> {
    Ok(match catalog {
        Some(path) => Box::new(AssetCatalog::load(path)?),
        None => Box::new(DiskAssets::new(source_root)),
    })
}

fn parse_parameters(raw: &[String]) -> Result<Parameters, String> {
    raw.iter()
        .map(|assignment| {
            Parameters::parse_assignment(assignment)
                .ok_or_else(|| format!("invalid parameter '{assignment}', expected key=value"))
        })
        .collect()
}

fn probe_file(file: &Path) -> Result<Asset, Box<dyn std::error::Error>> {
    let root = file.parent().unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("not a file: {}", file.display()))?;
    Ok(Asset::probe(root, name)?)
}

fn sized_asset(width: u32, height: u32, size: u64) -> Asset {
    Asset {
        id: format!("{width}x{height}"),
        url: String::new(),
        path: None,
        width,
        height,
        size,
        extension: "jpg".to_string(),
        focus: Default::default(),
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Writes `level: message` lines to stderr.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{}: {}",
                record.level().as_str().to_lowercase(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
