use clap::{Parser, Subcommand, ValueEnum};
use photoweb::config::{Config, DEFAULT_CONFIG_FILE};
use photoweb::imaging::{ExifReader, FullReader, Resampler, RustBackend};
use photoweb::metadata::MetadataReader;
use photoweb::pipeline::{self, Backends, BuildOptions};
use photoweb::output;
use photoweb::settings::{self, Settings, effective_threads};
use photoweb::workers::PoolConfig;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Imager {
    /// Lanczos3 resampling
    Lanczos,
    /// Integer area sampling, faster
    Fast,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetadataSource {
    /// EXIF, IPTC and XMP rating
    Full,
    /// EXIF only
    Exif,
}

#[derive(Parser)]
#[command(name = "photoweb")]
#[command(about = "Incremental photo gallery builder")]
#[command(long_about = "\
Incremental photo gallery builder

Reads a gallery config file (default .web), selects the photos it names
relative to the working directory, and publishes them under <base>/<dir>:

  <base>/<dir>/
  ├── gallery.xml        # Descriptor read by the browser-side viewer
  ├── index.html         # Copied from the assets directory
  ├── day1_dsc001.jpg    # Full-size image
  ├── t/                 # Thumbnails
  ├── p/                 # Previews
  └── d/                 # Originals for download (download: static|symlink)

Outputs carry their source's modification time, so a rerun only rebuilds
what changed. A gallery with 'up: ../index.html' is also linked into the
album.xml of the album above it.

Run 'photoweb gen-config' to print a documented settings file.")]
#[command(version = version_string())]
struct Cli {
    /// Gallery config file; sources are resolved relative to the working directory
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log every per-picture decision
    #[arg(short, long)]
    verbose: bool,

    /// Remove the gallery directory and rebuild everything
    #[arg(short, long)]
    force: bool,

    /// Base output directory
    #[arg(long, default_value = "/var/www/html/photos")]
    base: PathBuf,

    /// Directory holding index.html, descriptor templates and download-htaccess
    #[arg(long, default_value = "/usr/share/pweb")]
    assets: PathBuf,

    /// Image resizing backend
    #[arg(long, value_enum, default_value_t = Imager::Lanczos)]
    imager: Imager,

    /// Embedded metadata reader
    #[arg(long, value_enum, default_value_t = MetadataSource::Full)]
    metadata: MetadataSource,

    /// Seconds without progress before a phase is declared hung; 0 disables
    #[arg(long)]
    watchdog: Option<u64>,

    /// Build settings file (sizes, qualities, parallelism)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Also write the build summary as JSON to this file
    #[arg(long)]
    report_json: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a stock settings file with all options documented
    GenConfig,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Selection patterns resolve against the working directory, wherever the
/// config file lives.
fn source_root() -> std::io::Result<PathBuf> {
    std::env::current_dir()?.canonicalize()
}

fn pool_config(settings: &Settings, verbose: bool) -> PoolConfig {
    PoolConfig::new(
        effective_threads(&settings.processing),
        Duration::from_secs(settings.processing.watchdog_secs),
    )
    .with_progress(!verbose && std::io::stderr().is_terminal())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::GenConfig) = cli.command {
        print!("{}", settings::stock_settings_toml());
        return Ok(());
    }

    init_tracing(cli.verbose);

    let mut settings = settings::load_settings(cli.settings.as_deref())?;
    if let Some(secs) = cli.watchdog {
        settings.processing.watchdog_secs = secs;
        settings.validate()?;
    }

    let config = Config::load(&cli.config)?;
    let root = source_root()?;
    tracing::debug!(config = %cli.config.display(), root = %root.display(), "Loaded config");

    let metadata: Arc<dyn MetadataReader> = match cli.metadata {
        MetadataSource::Full => Arc::new(FullReader),
        MetadataSource::Exif => Arc::new(ExifReader),
    };
    let resampler = match cli.imager {
        Imager::Lanczos => Resampler::Lanczos3,
        Imager::Fast => Resampler::Fast,
    };
    let backends = Backends {
        image: Arc::new(RustBackend::new(resampler)),
        metadata,
    };

    let options = BuildOptions {
        base: cli.base,
        assets: cli.assets,
        force: cli.force,
        pool: pool_config(&settings, cli.verbose),
        settings,
    };

    let report = pipeline::build(&options, &config, &root, &backends)?;
    output::print_report(&report, config.dir()?);

    if let Some(path) = &cli.report_json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
    }

    Ok(())
}
