use clap::{Parser, Subcommand};
use imgconv::config::{self, PipelineConfig};
use imgconv::imaging::{Format, Runtime};
use imgconv::{output, process};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;

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

#[derive(Parser)]
#[command(name = "imgconv")]
#[command(about = "Convert, scale and rotate images")]
#[command(long_about = "\
Convert, scale and rotate images

Each image goes through one pipeline:

  load → output directives → max size → scale percent → rotate → encode

Settings come from stock defaults, then a config file, then command-line
flags, each overriding the last.

  imgconv convert photo.png photo.jpg --quality 85
  imgconv convert scan.tif scan.png --width 1200 --rotate 90
  imgconv batch originals/ web/ --format jpg --width 1920

Output format for `convert` is --format if given, else the output file's
extension, else the config. `batch` reads imgconv.toml from the input
directory unless --config is given.

Run 'imgconv gen-config' to generate a documented imgconv.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Increase log detail (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by commands that run the pipeline. Each one overrides the
/// matching config key.
#[derive(clap::Args, Clone, Debug, Default)]
struct PipelineArgs {
    /// Output format: jpg, png or tiff
    #[arg(long)]
    format: Option<String>,

    /// Compression quality 1-100 (0 = engine default)
    #[arg(long)]
    quality: Option<u32>,

    /// Compression scheme: none, jpeg or zip (default: implied by format)
    #[arg(long)]
    compression: Option<String>,

    /// Shrink to at most this width
    #[arg(long)]
    width: Option<u32>,

    /// Shrink to at most this height
    #[arg(long)]
    height: Option<u32>,

    /// Scale by a percentage of the current size
    #[arg(long)]
    scale_percent: Option<f64>,

    /// Rotate clockwise by this many degrees
    #[arg(long, allow_negative_numbers = true)]
    rotate: Option<f64>,

    /// Fill colour for canvas exposed by rotation (#rrggbb or #rrggbbaa)
    #[arg(long)]
    background: Option<String>,

    /// Config file (default for batch: <input-dir>/imgconv.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one image
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Convert every supported image under a directory
    Batch {
        input_dir: PathBuf,
        output_dir: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Maximum parallel workers (default: CPU cores)
        #[arg(long)]
        jobs: Option<u32>,
        /// Print the batch report as JSON instead of progress lines
        #[arg(long)]
        json: bool,
    },
    /// Print a stock imgconv.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Convert {
            input,
            output: output_path,
            pipeline,
        } => {
            let mut overlay = pipeline.overlay();
            if pipeline.format.is_none() {
                if let Some(format) = format_from_extension(&output_path) {
                    set_key(&mut overlay, "output", "format", format.extension().into());
                }
            }
            let config = resolve(&pipeline, None, overlay)?;
            let Some(runtime) = start_runtime() else {
                return Ok(ExitCode::from(2));
            };
            let report = process::convert_file(&runtime, &input, &output_path, &config)?;
            output::print_conversion(&report);
        }
        Command::Batch {
            input_dir,
            output_dir,
            pipeline,
            jobs,
            json,
        } => {
            let mut overlay = pipeline.overlay();
            if let Some(jobs) = jobs {
                set_key(&mut overlay, "processing", "max_processes", i64::from(jobs).into());
            }
            let config = resolve(&pipeline, Some(input_dir.as_path()), overlay)?;
            let Some(runtime) = start_runtime() else {
                return Ok(ExitCode::from(2));
            };
            init_thread_pool(&config.processing);

            let report = if json {
                process::convert_dir(&runtime, &input_dir, &output_dir, &config, None)?
            } else {
                let (tx, rx) = std::sync::mpsc::channel();
                let printer = std::thread::spawn(move || {
                    for event in rx {
                        for line in output::format_process_event(&event) {
                            println!("{}", line);
                        }
                    }
                });
                let report =
                    process::convert_dir(&runtime, &input_dir, &output_dir, &config, Some(tx))?;
                printer
                    .join()
                    .map_err(|_| "progress printer panicked")?;
                output::print_batch_summary(&report);
                report
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Install the fmt subscriber on stderr, so stdout stays clean for reports.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the engine runtime, reporting failure instead of panicking.
fn start_runtime() -> Option<Runtime> {
    match Runtime::initialize() {
        Ok(runtime) => Some(runtime),
        Err(e) => {
            eprintln!("imgconv: cannot start the image engine: {e}");
            None
        }
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. User can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Stock defaults, then the config file, then flags.
fn resolve(
    args: &PipelineArgs,
    input_dir: Option<&Path>,
    overlay: toml::Value,
) -> Result<PipelineConfig, config::ConfigError> {
    let file = match (&args.config, input_dir) {
        (Some(path), _) => Some(config::load_raw_config_file(path)?),
        (None, Some(dir)) => config::load_raw_config(dir)?,
        (None, None) => None,
    };
    config::resolve_config(file.into_iter().chain([overlay]))
}

fn format_from_extension(path: &Path) -> Option<Format> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(Format::from_name)
}

fn set_key(overlay: &mut toml::Value, table: &str, key: &str, value: toml::Value) {
    if let toml::Value::Table(root) = overlay {
        let section = root
            .entry(table)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(section) = section {
            section.insert(key.to_string(), value);
        }
    }
}

impl PipelineArgs {
    /// The flags as a sparse TOML overlay.
    fn overlay(&self) -> toml::Value {
        let mut overlay = toml::Value::Table(toml::Table::new());
        if let Some(format) = &self.format {
            set_key(&mut overlay, "output", "format", format.to_ascii_lowercase().into());
        }
        if let Some(quality) = self.quality {
            set_key(&mut overlay, "output", "quality", i64::from(quality).into());
        }
        if let Some(compression) = &self.compression {
            set_key(
                &mut overlay,
                "output",
                "compression",
                compression.to_ascii_lowercase().into(),
            );
        }
        if let Some(width) = self.width {
            set_key(&mut overlay, "transform", "max_width", i64::from(width).into());
        }
        if let Some(height) = self.height {
            set_key(&mut overlay, "transform", "max_height", i64::from(height).into());
        }
        if let Some(percent) = self.scale_percent {
            set_key(&mut overlay, "transform", "scale_percent", percent.into());
        }
        if let Some(degrees) = self.rotate {
            set_key(&mut overlay, "transform", "rotate", degrees.into());
        }
        if let Some(background) = &self.background {
            set_key(&mut overlay, "transform", "background", background.clone().into());
        }
        overlay
    }
}
