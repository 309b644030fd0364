//! # imgconv
//!
//! An image conversion pipeline. A [`Converter`](converter::Converter) owns one
//! engine handle and one output sink, loads an encoded image, applies encoding
//! directives and geometric transforms, and writes the encoded result.
//!
//! # Architecture: One Handle, One Sink
//!
//! ```text
//! bytes ─▶ load ─▶ convert ─▶ scale / rotate ─▶ encode ─▶ sink
//!            │                                             │
//!            └────────────── destroy (always) ─────────────┘
//! ```
//!
//! The converter is a small state machine (`Created → Loaded → Destroyed`)
//! over a narrow [`ImageEngine`](imaging::ImageEngine) capability trait.
//! Everything codec-specific lives behind that trait:
//!
//! - **Testability**: the converter's lifecycle and defaulting rules are unit
//!   tested against a recording mock engine, without decoding real pixels.
//! - **Explicit resources**: destroying a converter closes its sink and frees
//!   its engine handle. `Drop` does the same if a caller forgets, so a panic
//!   mid-pipeline does not leak a handle.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`converter`] | The `Converter` state machine, its operations and `ConvertError` |
//! | [`imaging`] | Options, the engine trait, the `image`-crate engine, dimension math, runtime |
//! | [`sink`] | `OutputSink`: writable destinations with an explicit close |
//! | [`config`] | `imgconv.toml` loading, stock-default merging, validation |
//! | [`process`] | File and directory conversion, one converter per image, in parallel |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Runtime Initialization
//!
//! The engine needs process-wide setup before any handle exists. That setup is
//! never implicit: callers obtain an [`imaging::Runtime`] and pass it to
//! [`imaging::RustEngine::new`]. A missing codec surfaces as a recoverable
//! [`imaging::InitError`] at startup rather than a failure halfway through a
//! batch.
//!
//! ## Format Implies Compression
//!
//! Setting a target format re-derives the compression scheme (JPEG → jpeg,
//! PNG/TIFF → zip). An explicit compression set afterwards wins. Unset fields
//! are filled in only when directives are applied, so an `Options` value
//! always reflects exactly what the caller asked for.
//!
//! ## Scaling Never Upscales (Unless Asked in Percent)
//!
//! `scale_to_size` clamps each axis to its own current size, so it only ever
//! shrinks. `scale_to_percent` is relative to the current size and may
//! enlarge; repeated calls compound.
//!
//! ## Pure-Rust Imaging
//!
//! The production engine uses the `image` crate for decoding, Lanczos3
//! resampling and encoding. The binary has no system image libraries to
//! install.

pub mod config;
pub mod converter;
pub mod imaging;
pub mod output;
pub mod process;
pub mod sink;
