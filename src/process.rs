//! File and batch conversion.
//!
//! Glue between the filesystem and the [`Converter`]: read a source blob,
//! drive one converter through the configured steps, write the result.
//!
//! ## Lifecycle
//!
//! Every conversion creates exactly one engine handle and one converter, and
//! destroys both before returning, whether the pipeline succeeded or not. The
//! first error wins: a teardown failure is only reported when the pipeline
//! itself succeeded.
//!
//! ## Output Structure
//!
//! [`convert_dir`] mirrors the input tree, replacing each extension with the
//! target format's:
//!
//! ```text
//! input/                     output/
//! ├── imgconv.toml           ├── cover.jpg
//! ├── cover.png       ──▶    └── 2024/
//! └── 2024/                      ├── beach.jpg
//!     ├── beach.tif              └── dunes.jpg
//!     └── dunes.webp
//! ```
//!
//! ## Parallel Processing
//!
//! Images are converted in parallel using [rayon](https://docs.rs/rayon), one
//! converter per image. Converters are never shared between workers. Progress
//! is reported as [`ProcessEvent`]s over an optional channel, in completion
//! order; the final [`BatchReport`] is sorted by source path.

use crate::config::PipelineConfig;
use crate::converter::{ConvertError, Converter};
use crate::imaging::{Dimensions, ImageEngine, Runtime, RustEngine, supported_input_extensions};
use crate::sink::OutputSink;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Conversion failed: {0}")]
    Convert(#[from] ConvertError),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Refusing to overwrite the input file {}", .0.display())]
    SameFile(PathBuf),
}

/// Dimensions and size of one finished conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub original: Dimensions,
    pub result: Dimensions,
    pub bytes: usize,
}

/// One converted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub source: String,
    pub output: String,
    pub original: Dimensions,
    pub result: Dimensions,
    pub bytes: usize,
}

/// One file that could not be converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedConversion {
    pub source: String,
    pub error: String,
}

/// Result of [`convert_dir`]. Both lists are sorted by source path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub converted: Vec<ConversionReport>,
    pub failed: Vec<FailedConversion>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.converted.iter().map(|r| r.bytes).sum()
    }
}

/// Progress events emitted by [`convert_dir`].
///
/// `index` is the 1-based position of the image in discovery order, which is
/// stable even though events arrive in completion order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Started {
        image_count: usize,
    },
    Converted {
        index: usize,
        report: ConversionReport,
    },
    Failed {
        index: usize,
        failure: FailedConversion,
    },
}

/// Run the configured pipeline over `blob` with the given engine, writing to `sink`.
///
/// The converter is always destroyed (closing the sink and releasing the
/// engine) before this returns.
pub fn convert_with_engine<E: ImageEngine, S: OutputSink>(
    engine: E,
    sink: S,
    blob: &[u8],
    config: &PipelineConfig,
) -> Result<Outcome, ConvertError> {
    let mut converter = Converter::new(engine, sink, config.options());
    let outcome = run_pipeline(&mut converter, blob, config);
    let teardown = converter.destroy();
    let outcome = outcome?;
    teardown?;
    Ok(outcome)
}

fn run_pipeline<E: ImageEngine, S: OutputSink>(
    converter: &mut Converter<E, S>,
    blob: &[u8],
    config: &PipelineConfig,
) -> Result<Outcome, ConvertError> {
    converter.load(blob)?;
    let original = converter.dimensions()?;
    converter.run(&config.steps())?;
    let result = converter.dimensions()?;
    let bytes = converter.encode()?;
    Ok(Outcome {
        original,
        result,
        bytes,
    })
}

/// Whether both paths resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Convert one file with the production engine.
///
/// Parent directories of `output` are created as needed. On failure the
/// partially written output is removed. `output` must not be `input`.
pub fn convert_file(
    runtime: &Runtime,
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<ConversionReport, ProcessError> {
    if same_file(input, output) {
        return Err(ProcessError::SameFile(output.to_path_buf()));
    }
    let blob = fs::read(input)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let sink = BufWriter::new(File::create(output)?);

    match convert_with_engine(RustEngine::new(runtime), sink, &blob, config) {
        Ok(outcome) => {
            debug!(
                input = %input.display(),
                output = %output.display(),
                bytes = outcome.bytes,
                "file converted"
            );
            Ok(ConversionReport {
                source: input.display().to_string(),
                output: output.display().to_string(),
                original: outcome.original,
                result: outcome.result,
                bytes: outcome.bytes,
            })
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(output) {
                warn!(output = %output.display(), error = %rm, "could not remove partial output");
            }
            Err(e.into())
        }
    }
}

/// Find convertible images under `input_dir`, sorted by path.
///
/// `output_dir` is skipped when it lies inside the input tree, however either
/// path is spelled.
pub fn discover_images(input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, ProcessError> {
    let extensions = supported_input_extensions();
    let skip = fs::canonicalize(output_dir).ok();
    let mut images = Vec::new();
    let walker = WalkDir::new(input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_dir_at(entry, skip.as_deref()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

fn is_dir_at(entry: &walkdir::DirEntry, target: Option<&Path>) -> bool {
    let Some(target) = target else {
        return false;
    };
    entry.file_type().is_dir()
        && fs::canonicalize(entry.path()).is_ok_and(|path| path == target)
}

/// Output path for `source`: same relative location, target format's extension.
fn output_path_for(
    source: &Path,
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> PathBuf {
    let relative = source.strip_prefix(input_dir).unwrap_or(source);
    output_dir
        .join(relative)
        .with_extension(config.output.format.extension())
}

fn relative_display(source: &Path, input_dir: &Path) -> String {
    source
        .strip_prefix(input_dir)
        .unwrap_or(source)
        .display()
        .to_string()
}

/// Convert every supported image under `input_dir` into `output_dir`.
///
/// Per-image failures do not stop the batch; they are collected in the
/// report. Only failures to walk the input tree are returned as errors.
pub fn convert_dir(
    runtime: &Runtime,
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    let sources = discover_images(input_dir, output_dir)?;
    info!(count = sources.len(), input = %input_dir.display(), "converting directory");
    emit(&events, ProcessEvent::Started {
        image_count: sources.len(),
    });

    // Two sources mapping to one output (a.png + a.tif) would overwrite each other.
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();
    let jobs: Vec<(usize, &PathBuf, Result<PathBuf, String>)> = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let output = output_path_for(source, input_dir, output_dir, config);
            let source_name = relative_display(source, input_dir);
            let target = match claimed.get(&output) {
                Some(first) => Err(format!(
                    "output {} already produced from {first}",
                    output.display()
                )),
                None => {
                    claimed.insert(output.clone(), source_name);
                    Ok(output)
                }
            };
            (i + 1, source, target)
        })
        .collect();

    let results: Vec<Result<ConversionReport, FailedConversion>> = jobs
        .into_par_iter()
        .map(|(index, source, target)| {
            let source_name = relative_display(source, input_dir);
            let result = target.and_then(|output| {
                convert_file(runtime, source, &output, config)
                    .map(|report| ConversionReport {
                        source: source_name.clone(),
                        ..report
                    })
                    .map_err(|e| e.to_string())
            });
            match result {
                Ok(report) => {
                    emit(&events, ProcessEvent::Converted {
                        index,
                        report: report.clone(),
                    });
                    Ok(report)
                }
                Err(error) => {
                    warn!(source = %source_name, %error, "conversion failed");
                    let failure = FailedConversion {
                        source: source_name,
                        error,
                    };
                    emit(&events, ProcessEvent::Failed {
                        index,
                        failure: failure.clone(),
                    });
                    Err(failure)
                }
            }
        })
        .collect();

    let mut report = BatchReport::default();
    for result in results {
        match result {
            Ok(converted) => report.converted.push(converted),
            Err(failed) => report.failed.push(failed),
        }
    }
    report.converted.sort_by(|a, b| a.source.cmp(&b.source));
    report.failed.sort_by(|a, b| a.source.cmp(&b.source));
    info!(
        converted = report.converted.len(),
        failed = report.failed.len(),
        "directory converted"
    );
    Ok(report)
}

fn emit(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // The receiver may have hung up; progress is best-effort.
        tx.send(event).ok();
    }
}
