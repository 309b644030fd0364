//! The converter: one engine handle, one output sink, one set of options.
//!
//! # Protocol
//!
//! ```text
//! Converter::new ─▶ load ─▶ [convert | scale_to_size | scale_to_percent | rotate]* ─▶ encode ─▶ destroy
//!                   ▲  │                                                              │ ▲
//!                   └──┘ (reload replaces the image)                                  └─┘ (re-encode)
//! ```
//!
//! | State | Entered by | Valid next operations |
//! |---|---|---|
//! | `Created` | [`Converter::new`] | `load` |
//! | `Loaded` | successful `load` | everything |
//! | `Destroyed` | [`Converter::destroy`] | none: every call fails with [`ConvertError::AlreadyDestroyed`] |
//!
//! Operations other than `load` are not refused in `Created`; they are passed
//! to the engine, which reports that no image is loaded. `encode` in that state
//! finds an empty blob and fails with [`ConvertError::EmptyResult`].
//!
//! # Teardown
//!
//! [`Converter::destroy`] closes the sink and destroys the engine handle. It
//! must run on every exit path, including after a failed operation, and its
//! own result never replaces an earlier error:
//!
//! ```no_run
//! # use imgconv::converter::{Converter, ConvertError};
//! # use imgconv::imaging::{Options, Runtime, RustEngine};
//! # fn run(blob: &[u8]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
//! let runtime = Runtime::initialize()?;
//! let mut out = Vec::new();
//! let mut converter = Converter::new(RustEngine::new(&runtime), &mut out, Options::jpeg());
//! let outcome = converter.load(blob).and_then(|()| converter.convert()).and_then(|()| converter.encode());
//! let teardown = converter.destroy();
//! outcome?;
//! teardown?;
//! # drop(converter);
//! # Ok(out)
//! # }
//! ```
//!
//! If a converter is dropped without `destroy` (early return, panic), `Drop`
//! performs the same teardown and logs any failure.
//!
//! A converter is single-owner and not meant for concurrent use: run one
//! converter per image when converting in parallel.

use crate::imaging::calculations::{clamp_to_current, percent_dimensions};
use crate::imaging::{Dimensions, EngineError, ImageEngine, Options};
use crate::sink::OutputSink;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("invalid argument: {0}")]
    Validation(String),
    #[error("failed to load image: {0}")]
    Decode(#[source] EngineError),
    #[error("engine rejected operation: {0}")]
    Engine(#[from] EngineError),
    #[error("engine produced an empty image blob")]
    EmptyResult,
    #[error("converter already destroyed")]
    AlreadyDestroyed,
    #[error("output sink error: {0}")]
    Sink(#[from] std::io::Error),
}

/// Lifecycle state of a [`Converter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Loaded,
    Destroyed,
}

/// One transform in a pipeline run by [`Converter::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Convert,
    ScaleToSize { width: u32, height: u32 },
    ScaleToPercent(f64),
    Rotate(f64),
}

pub struct Converter<E: ImageEngine, S: OutputSink> {
    engine: E,
    sink: S,
    options: Options,
    state: State,
}

impl<E: ImageEngine, S: OutputSink> Converter<E, S> {
    /// Wrap an engine handle and a sink. Takes exclusive ownership of the engine.
    pub fn new(engine: E, sink: S, options: Options) -> Self {
        debug!(?options, "converter created");
        Self {
            engine,
            sink,
            options,
            state: State::Created,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Options are mutable in place between operations.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn ensure_live(&self) -> Result<(), ConvertError> {
        if self.state == State::Destroyed {
            return Err(ConvertError::AlreadyDestroyed);
        }
        Ok(())
    }

    /// Current image dimensions.
    pub fn dimensions(&self) -> Result<Dimensions, ConvertError> {
        self.ensure_live()?;
        Ok(self.engine.dimensions()?)
    }

    /// Ingest an encoded blob, replacing any image loaded before.
    #[tracing::instrument(level = "debug", skip_all, fields(bytes = blob.len()))]
    pub fn load(&mut self, blob: &[u8]) -> Result<(), ConvertError> {
        self.ensure_live()?;
        if blob.is_empty() {
            return Err(ConvertError::Decode(EngineError::Decode("empty blob".into())));
        }
        self.engine.decode(blob).map_err(ConvertError::Decode)?;
        self.state = State::Loaded;
        Ok(())
    }

    /// Apply the options as encoding directives, filling unset fields with
    /// defaults (JPEG, JPEG compression, quality 100).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn convert(&mut self) -> Result<(), ConvertError> {
        self.ensure_live()?;
        let directives = self.options.directives();
        debug!(
            format = %directives.format,
            compression = %directives.compression,
            quality = directives.quality.value(),
            "applying directives"
        );
        self.engine.set_format(directives.format)?;
        self.engine.set_compression(directives.compression)?;
        self.engine.set_quality(directives.quality)?;
        Ok(())
    }

    /// Resize to at most `width` x `height`. Each axis is clamped to its own
    /// current size, so this never upscales.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn scale_to_size(&mut self, width: u32, height: u32) -> Result<(), ConvertError> {
        self.ensure_live()?;
        let current = self.engine.dimensions()?;
        let (target_w, target_h) = clamp_to_current((width, height), current.as_tuple());
        self.engine.scale(target_w, target_h)?;
        Ok(())
    }

    /// Resize by a percentage of the *current* size, so repeated calls compound.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn scale_to_percent(&mut self, percent: f64) -> Result<(), ConvertError> {
        self.ensure_live()?;
        if !(percent.is_finite() && percent > 0.0) {
            return Err(ConvertError::Validation(format!(
                "scale percent must be positive, got {percent}"
            )));
        }
        let current = self.engine.dimensions()?;
        let Some((target_w, target_h)) = percent_dimensions(current.as_tuple(), percent) else {
            return Err(ConvertError::Validation(format!(
                "scaling {current} by {percent}% exceeds the largest representable size"
            )));
        };
        self.engine.scale(target_w, target_h)?;
        Ok(())
    }

    /// Rotate clockwise by `degrees`. Exposed canvas takes the options' background.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rotate(&mut self, degrees: f64) -> Result<(), ConvertError> {
        self.ensure_live()?;
        if !degrees.is_finite() {
            return Err(ConvertError::Validation(format!(
                "rotation must be a finite angle, got {degrees}"
            )));
        }
        self.engine.rotate(degrees, self.options.background())?;
        Ok(())
    }

    /// Export the current image and write it fully to the sink.
    ///
    /// Returns the number of bytes written. The sink is flushed, not closed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn encode(&mut self) -> Result<usize, ConvertError> {
        self.ensure_live()?;
        let blob = self.engine.blob()?;
        if blob.is_empty() {
            return Err(ConvertError::EmptyResult);
        }
        self.sink.write_all(&blob)?;
        self.sink.flush()?;
        debug!(bytes = blob.len(), "blob written");
        Ok(blob.len())
    }

    /// Apply steps in order, stopping at the first failure.
    pub fn run(&mut self, steps: &[Step]) -> Result<(), ConvertError> {
        for step in steps {
            match *step {
                Step::Convert => self.convert()?,
                Step::ScaleToSize { width, height } => self.scale_to_size(width, height)?,
                Step::ScaleToPercent(percent) => self.scale_to_percent(percent)?,
                Step::Rotate(degrees) => self.rotate(degrees)?,
            }
        }
        Ok(())
    }

    /// Close the sink and destroy the engine handle.
    ///
    /// Both are released even if closing the sink fails; the close error is
    /// returned afterwards. Only the first call does anything.
    pub fn destroy(&mut self) -> Result<(), ConvertError> {
        self.ensure_live()?;
        self.state = State::Destroyed;
        let closed = self.sink.close();
        self.engine.destroy();
        debug!("converter destroyed");
        closed.map_err(ConvertError::Sink)
    }
}

impl<E: ImageEngine, S: OutputSink> Drop for Converter<E, S> {
    fn drop(&mut self) {
        if self.state != State::Destroyed {
            warn!("converter dropped without destroy, releasing handle");
            if let Err(e) = self.destroy() {
                warn!(error = %e, "teardown on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockEngine, RecordedOp, mock_blob, recorded};
    use crate::imaging::{Compression, Format};
    use crate::sink::tests::RecordingSink;

    fn loaded(width: u32, height: u32) -> Converter<MockEngine, RecordingSink> {
        let mut converter = Converter::new(MockEngine::new(), RecordingSink::new(), Options::new());
        converter.load(&mock_blob(width, height)).unwrap();
        converter
    }

    fn dims<E: ImageEngine, S: OutputSink>(converter: &Converter<E, S>) -> (u32, u32) {
        converter.dimensions().unwrap().as_tuple()
    }

    // =========================================================================
    // Load
    // =========================================================================

    #[test]
    fn new_converter_starts_created() {
        let converter = Converter::new(MockEngine::new(), RecordingSink::new(), Options::new());
        assert_eq!(converter.state(), State::Created);
    }

    #[test]
    fn load_moves_to_loaded() {
        let converter = loaded(200, 100);
        assert_eq!(converter.state(), State::Loaded);
        assert_eq!(dims(&converter), (200, 100));
    }

    #[test]
    fn load_empty_blob_is_decode_error() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut converter = Converter::new(engine, RecordingSink::new(), Options::new());
        assert!(matches!(converter.load(&[]), Err(ConvertError::Decode(_))));
        assert!(recorded(&log).is_empty(), "engine must not see an empty blob");
        assert_eq!(converter.state(), State::Created);
    }

    #[test]
    fn load_garbage_is_decode_error() {
        let mut converter = Converter::new(MockEngine::new(), RecordingSink::new(), Options::new());
        assert!(matches!(
            converter.load(b"garbage"),
            Err(ConvertError::Decode(EngineError::Decode(_)))
        ));
    }

    #[test]
    fn reload_replaces_image() {
        let mut converter = loaded(200, 100);
        converter.load(&mock_blob(30, 40)).unwrap();
        assert_eq!(dims(&converter), (30, 40));
    }

    // =========================================================================
    // Convert
    // =========================================================================

    #[test]
    fn convert_fills_unset_options_with_defaults() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut converter = Converter::new(engine, RecordingSink::new(), Options::new());
        converter.load(&mock_blob(10, 10)).unwrap();
        converter.convert().unwrap();

        assert_eq!(
            recorded(&log)[1..],
            [
                RecordedOp::SetFormat(Format::Jpeg),
                RecordedOp::SetCompression(Compression::Jpeg),
                RecordedOp::SetQuality(100),
            ]
        );
    }

    #[test]
    fn convert_applies_exact_quality() {
        for quality in [1, 55, 100] {
            let engine = MockEngine::new();
            let log = engine.log();
            let mut options = Options::new();
            options.set_quality(quality);
            let mut converter = Converter::new(engine, RecordingSink::new(), options);
            converter.load(&mock_blob(10, 10)).unwrap();
            converter.convert().unwrap();
            assert_eq!(recorded(&log).last(), Some(&RecordedOp::SetQuality(quality)));
        }
    }

    #[test]
    fn convert_keeps_compression_override() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut options = Options::new();
        options
            .set_target_format(Some(Format::Png))
            .set_compression(Compression::None);
        let mut converter = Converter::new(engine, RecordingSink::new(), options);
        converter.load(&mock_blob(10, 10)).unwrap();
        converter.convert().unwrap();

        let ops = recorded(&log);
        assert!(ops.contains(&RecordedOp::SetFormat(Format::Png)));
        assert!(ops.contains(&RecordedOp::SetCompression(Compression::None)));
    }

    #[test]
    fn options_mutated_in_place_apply_on_next_convert() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut converter = Converter::new(engine, RecordingSink::new(), Options::jpeg());
        converter.load(&mock_blob(10, 10)).unwrap();
        converter.options_mut().set_target_format(Some(Format::Tiff));
        converter.convert().unwrap();
        let ops = recorded(&log);
        assert!(ops.contains(&RecordedOp::SetFormat(Format::Tiff)));
        assert!(ops.contains(&RecordedOp::SetCompression(Compression::Zip)));
    }

    #[test]
    fn convert_twice_encodes_identically() {
        let mut converter = loaded(64, 48);
        converter.convert().unwrap();
        converter.encode().unwrap();
        let first = converter.sink().bytes();

        converter.convert().unwrap();
        converter.encode().unwrap();
        let both = converter.sink().bytes();
        assert_eq!(&both[first.len()..], &first[..]);
    }

    #[test]
    fn engine_rejection_surfaces_as_engine_error() {
        let mut converter = Converter::new(
            MockEngine::failing_on("set_compression"),
            RecordingSink::new(),
            Options::new(),
        );
        converter.load(&mock_blob(10, 10)).unwrap();
        assert!(matches!(converter.convert(), Err(ConvertError::Engine(_))));
    }

    #[test]
    fn convert_before_load_is_engine_error() {
        let mut converter = Converter::new(MockEngine::new(), RecordingSink::new(), Options::new());
        assert!(matches!(
            converter.convert(),
            Err(ConvertError::Engine(EngineError::NoImage))
        ));
        assert_eq!(converter.state(), State::Created);
    }

    #[test]
    fn out_of_range_quality_is_rejected_by_engine() {
        let mut options = Options::new();
        options.set_quality(250);
        let mut converter = Converter::new(MockEngine::new(), RecordingSink::new(), options);
        converter.load(&mock_blob(10, 10)).unwrap();
        assert!(matches!(
            converter.convert(),
            Err(ConvertError::Engine(EngineError::InvalidQuality(250)))
        ));
    }

    // =========================================================================
    // Scale
    // =========================================================================

    #[test]
    fn scale_to_size_within_bounds_is_exact() {
        let mut converter = loaded(200, 100);
        converter.scale_to_size(120, 60).unwrap();
        assert_eq!(dims(&converter), (120, 60));
    }

    #[test]
    fn scale_to_size_clamps_width() {
        let mut converter = loaded(200, 100);
        converter.scale_to_size(500, 50).unwrap();
        assert_eq!(dims(&converter), (200, 50));
    }

    /// Deliberately corrected behaviour: an oversized height clamps to the
    /// current *height*. It must not overwrite the width.
    #[test]
    fn scale_to_size_clamps_height_to_its_own_axis() {
        let mut converter = loaded(200, 100);
        converter.scale_to_size(150, 400).unwrap();
        assert_eq!(dims(&converter), (150, 100));
    }

    #[test]
    fn scale_to_size_never_upscales() {
        let mut converter = loaded(200, 100);
        converter.scale_to_size(u32::MAX, u32::MAX).unwrap();
        assert_eq!(dims(&converter), (200, 100));
    }

    #[test]
    fn scale_to_size_without_image_is_engine_error() {
        let mut converter = Converter::new(MockEngine::new(), RecordingSink::new(), Options::new());
        assert!(matches!(
            converter.scale_to_size(10, 10),
            Err(ConvertError::Engine(EngineError::NoImage))
        ));
    }

    #[test]
    fn scale_to_percent_halves() {
        let mut converter = loaded(200, 100);
        converter.scale_to_percent(50.0).unwrap();
        assert_eq!(dims(&converter), (100, 50));
    }

    #[test]
    fn scale_to_percent_hundred_keeps_dimensions() {
        let mut converter = loaded(200, 100);
        converter.scale_to_percent(100.0).unwrap();
        assert_eq!(dims(&converter), (200, 100));
    }

    #[test]
    fn scale_to_percent_compounds() {
        let mut converter = loaded(200, 100);
        converter.scale_to_percent(50.0).unwrap();
        converter.scale_to_percent(50.0).unwrap();
        assert_eq!(dims(&converter), (50, 25));
    }

    #[test]
    fn scale_to_percent_can_upscale() {
        let mut converter = loaded(200, 100);
        converter.scale_to_percent(150.0).unwrap();
        assert_eq!(dims(&converter), (300, 150));
    }

    #[test]
    fn scale_to_percent_rejects_non_positive() {
        for percent in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let engine = MockEngine::new();
            let log = engine.log();
            let mut converter = Converter::new(engine, RecordingSink::new(), Options::new());
            converter.load(&mock_blob(200, 100)).unwrap();
            assert!(
                matches!(
                    converter.scale_to_percent(percent),
                    Err(ConvertError::Validation(_))
                ),
                "percent {percent}"
            );
            assert!(
                !recorded(&log)
                    .iter()
                    .any(|op| matches!(op, RecordedOp::Scale { .. }))
            );
        }
    }

    #[test]
    fn scale_to_percent_collapsing_to_zero_is_engine_error() {
        let mut converter = loaded(10, 10);
        assert!(matches!(
            converter.scale_to_percent(1.0),
            Err(ConvertError::Engine(EngineError::InvalidDimensions { .. }))
        ));
    }

    #[test]
    fn scale_to_percent_beyond_u32_is_validation_error() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut converter = Converter::new(engine, RecordingSink::new(), Options::new());
        converter.load(&mock_blob(10, 10)).unwrap();

        let result = converter.scale_to_percent(1e12);

        assert!(matches!(result, Err(ConvertError::Validation(_))), "{result:?}");
        assert!(!recorded(&log).iter().any(|op| matches!(op, RecordedOp::Scale { .. })));
        assert_eq!(dims(&converter), (10, 10));
    }

    // =========================================================================
    // Rotate
    // =========================================================================

    #[test]
    fn rotate_ninety_twice_matches_one_eighty() {
        let mut twice = loaded(200, 100);
        twice.rotate(90.0).unwrap();
        twice.rotate(90.0).unwrap();
        twice.encode().unwrap();

        let mut once = loaded(200, 100);
        once.rotate(180.0).unwrap();
        once.encode().unwrap();

        assert_eq!(twice.sink().bytes(), once.sink().bytes());
    }

    #[test]
    fn rotate_passes_background_from_options() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut converter = Converter::new(engine, RecordingSink::new(), Options::new());
        converter.load(&mock_blob(10, 20)).unwrap();
        converter.rotate(270.0).unwrap();
        assert_eq!(recorded(&log).last(), Some(&RecordedOp::Rotate(270.0)));
        assert_eq!(dims(&converter), (20, 10));
    }

    #[test]
    fn rotate_rejects_nan() {
        let mut converter = loaded(10, 10);
        assert!(matches!(
            converter.rotate(f64::NAN),
            Err(ConvertError::Validation(_))
        ));
    }

    // =========================================================================
    // Encode
    // =========================================================================

    #[test]
    fn encode_before_load_is_empty_result() {
        let mut converter = Converter::new(MockEngine::new(), RecordingSink::new(), Options::new());
        assert!(matches!(converter.encode(), Err(ConvertError::EmptyResult)));
        assert!(converter.sink().bytes().is_empty());
    }

    #[test]
    fn encode_writes_without_closing() {
        let mut converter = loaded(10, 10);
        let written = converter.encode().unwrap();
        assert_eq!(converter.sink().bytes().len(), written);
        assert_eq!(converter.sink().closes(), 0);
    }

    #[test]
    fn encode_propagates_sink_errors() {
        let mut converter = Converter::new(
            MockEngine::new(),
            RecordingSink::failing_writes(),
            Options::new(),
        );
        converter.load(&mock_blob(10, 10)).unwrap();
        assert!(matches!(converter.encode(), Err(ConvertError::Sink(_))));
    }

    #[test]
    fn run_applies_steps_in_order_and_stops_on_failure() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut converter = Converter::new(engine, RecordingSink::new(), Options::new());
        converter.load(&mock_blob(200, 100)).unwrap();

        let result = converter.run(&[
            Step::ScaleToPercent(50.0),
            Step::Rotate(90.0),
            Step::ScaleToPercent(0.0),
            Step::Convert,
        ]);

        assert!(matches!(result, Err(ConvertError::Validation(_))));
        assert_eq!(
            recorded(&log)[1..],
            [
                RecordedOp::Scale {
                    width: 100,
                    height: 50
                },
                RecordedOp::Rotate(90.0),
            ]
        );
    }

    // =========================================================================
    // Destroy
    // =========================================================================

    #[test]
    fn destroy_releases_engine_and_sink() {
        let engine = MockEngine::new();
        let log = engine.log();
        let sink = RecordingSink::new();
        let mut converter = Converter::new(engine, sink.clone(), Options::new());
        converter.load(&mock_blob(10, 10)).unwrap();

        converter.destroy().unwrap();

        assert_eq!(converter.state(), State::Destroyed);
        assert_eq!(sink.closes(), 1);
        assert_eq!(recorded(&log).last(), Some(&RecordedOp::Destroy));
    }

    #[test]
    fn destroy_twice_fails_without_releasing_again() {
        let sink = RecordingSink::new();
        let mut converter = Converter::new(MockEngine::new(), sink.clone(), Options::new());
        converter.destroy().unwrap();
        assert!(matches!(
            converter.destroy(),
            Err(ConvertError::AlreadyDestroyed)
        ));
        assert_eq!(sink.closes(), 1);
    }

    #[test]
    fn every_operation_after_destroy_fails() {
        let mut converter = loaded(10, 10);
        converter.destroy().unwrap();

        let blob = mock_blob(10, 10);
        let results = [
            converter.load(&blob).err(),
            converter.convert().err(),
            converter.scale_to_size(5, 5).err(),
            converter.scale_to_percent(50.0).err(),
            converter.rotate(90.0).err(),
            converter.encode().err(),
            converter.dimensions().err(),
        ];
        for result in results {
            assert!(matches!(result, Some(ConvertError::AlreadyDestroyed)));
        }
    }

    #[test]
    fn destroy_after_failure_still_releases() {
        let engine = MockEngine::failing_on("scale");
        let log = engine.log();
        let sink = RecordingSink::new();
        let mut converter = Converter::new(engine, sink.clone(), Options::new());
        converter.load(&mock_blob(10, 10)).unwrap();

        let outcome = converter.scale_to_size(5, 5);
        let teardown = converter.destroy();

        assert!(matches!(outcome, Err(ConvertError::Engine(_))));
        assert!(teardown.is_ok());
        assert_eq!(sink.closes(), 1);
        assert!(recorded(&log).contains(&RecordedOp::Destroy));
    }

    #[test]
    fn destroy_reports_close_failure_but_destroys_engine() {
        let engine = MockEngine::new();
        let log = engine.log();
        let mut converter = Converter::new(engine, RecordingSink::failing_close(), Options::new());

        assert!(matches!(converter.destroy(), Err(ConvertError::Sink(_))));
        assert_eq!(converter.state(), State::Destroyed);
        assert_eq!(recorded(&log), vec![RecordedOp::Destroy]);
    }

    #[test]
    fn drop_without_destroy_releases() {
        let engine = MockEngine::new();
        let log = engine.log();
        let sink = RecordingSink::new();
        {
            let mut converter = Converter::new(engine, sink.clone(), Options::new());
            converter.load(&mock_blob(10, 10)).unwrap();
        }
        assert_eq!(sink.closes(), 1);
        assert_eq!(recorded(&log).last(), Some(&RecordedOp::Destroy));
    }

    #[test]
    fn drop_after_destroy_does_not_release_twice() {
        let sink = RecordingSink::new();
        {
            let mut converter = Converter::new(MockEngine::new(), sink.clone(), Options::new());
            converter.destroy().unwrap();
        }
        assert_eq!(sink.closes(), 1);
    }

    #[test]
    fn panic_mid_pipeline_still_releases() {
        let sink = RecordingSink::new();
        let observer = sink.clone();
        let result = std::panic::catch_unwind(move || {
            let mut converter = Converter::new(MockEngine::new(), sink, Options::new());
            converter.load(&mock_blob(10, 10)).unwrap();
            panic!("caller bug");
        });
        assert!(result.is_err());
        assert_eq!(observer.closes(), 1);
    }
}
