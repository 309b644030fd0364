//! Output sinks: byte streams with an explicit close.
//!
//! A [`Converter`](crate::converter::Converter) writes encoded blobs to a sink
//! and closes it during teardown. The caller allocates the sink; passing
//! `&mut sink` keeps ownership with the caller while still letting the
//! converter close it.

use std::fs::File;
use std::io::{self, BufWriter, Write};

/// A byte-stream destination that can be closed explicitly.
pub trait OutputSink: Write {
    /// Flush and release the destination. Writes after close are the sink's
    /// own business; the converter never issues any.
    fn close(&mut self) -> io::Result<()>;
}

impl OutputSink for Vec<u8> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for File {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl<W: OutputSink> OutputSink for BufWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_mut().close()
    }
}

impl<T: OutputSink + ?Sized> OutputSink for &mut T {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}
