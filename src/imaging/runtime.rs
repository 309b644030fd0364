//! Process-wide engine runtime.
//!
//! The engine needs a one-time setup before any handle exists and a teardown
//! after the last one is gone. This is explicit: callers obtain a [`Runtime`]
//! from [`Runtime::initialize`] and must check the result before creating
//! engines. Constructing a converter never initializes anything behind the
//! caller's back.
//!
//! Initialization is reference counted across the process. The first live
//! `Runtime` performs setup, clones and further `initialize` calls share it,
//! and dropping the last one terminates it.
//!
//! Each runtime also counts the engine handles created from it, so a leaked
//! handle is observable through [`Runtime::live_handles`].

use image::ImageFormat;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Codecs the engine needs for both reading and writing.
const REQUIRED_CODECS: &[(&str, ImageFormat)] = &[
    ("JPEG", ImageFormat::Jpeg),
    ("PNG", ImageFormat::Png),
    ("TIFF", ImageFormat::Tiff),
];

/// Number of live `Runtime` values in the process.
static INSTANCES: Mutex<usize> = Mutex::new(0);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("{name} codec is not available (read: {read}, write: {write})")]
    CodecUnavailable {
        name: &'static str,
        read: bool,
        write: bool,
    },
}

/// Guard proving the engine runtime is initialized.
#[derive(Debug)]
pub struct Runtime {
    handles: Arc<AtomicUsize>,
}

impl Runtime {
    /// Initialize the engine runtime, or join the one already running.
    ///
    /// Fails with a recoverable [`InitError`] when a required codec was not
    /// compiled in.
    pub fn initialize() -> Result<Self, InitError> {
        for &(name, format) in REQUIRED_CODECS {
            let (read, write) = (format.reading_enabled(), format.writing_enabled());
            if !(read && write) {
                return Err(InitError::CodecUnavailable { name, read, write });
            }
        }
        acquire_instance();
        Ok(Self {
            handles: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Whether any runtime is alive in this process.
    pub fn is_initialized() -> bool {
        *INSTANCES.lock().unwrap_or_else(PoisonError::into_inner) > 0
    }

    /// Engine handles created from this runtime (or its clones) and not yet destroyed.
    pub fn live_handles(&self) -> usize {
        self.handles.load(Ordering::SeqCst)
    }

    /// Reserve a handle slot. The slot keeps the runtime alive until released.
    pub fn acquire_handle(&self) -> HandleSlot {
        let live = self.handles.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(live, "engine handle acquired");
        HandleSlot {
            runtime: self.clone(),
        }
    }
}

impl Clone for Runtime {
    fn clone(&self) -> Self {
        acquire_instance();
        Self {
            handles: Arc::clone(&self.handles),
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let mut instances = INSTANCES.lock().unwrap_or_else(PoisonError::into_inner);
        *instances = instances.saturating_sub(1);
        if *instances == 0 {
            info!("engine runtime terminated");
        }
    }
}

fn acquire_instance() {
    let mut instances = INSTANCES.lock().unwrap_or_else(PoisonError::into_inner);
    if *instances == 0 {
        info!("engine runtime initialized");
    }
    *instances += 1;
}

/// One engine handle's claim on the runtime. Released on drop.
#[derive(Debug)]
pub struct HandleSlot {
    runtime: Runtime,
}

impl Drop for HandleSlot {
    fn drop(&mut self) {
        let live = self.runtime.handles.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(live, "engine handle released");
    }
}
