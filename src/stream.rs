//! The block-compressed stream seen through virtual offsets.
//!
//! The index only needs to know where a line starts and ends in the compressed
//! stream, and to jump back to such a position later. These traits are that
//! seam; BGZF readers and writers from `noodles` implement them.

use noodles::bgzf;
use std::io::{self, BufRead, Read, Seek, Write};

/// Readable, seekable line source addressed by virtual offsets.
pub trait VirtualLineReader {
    /// Virtual offset of the next byte to be read.
    fn virtual_offset(&self) -> u64;

    /// Position the stream at `offset`.
    fn seek_virtual(&mut self, offset: u64) -> io::Result<()>;

    /// Read the next line into `buf` without its line terminator.
    ///
    /// Returns the number of bytes consumed from the stream, 0 at end of input.
    fn next_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

/// Sink that reports the virtual offset of the next byte written.
pub trait VirtualWriter: Write {
    fn virtual_offset(&self) -> u64;
}

/// Drop a trailing `\n` or `\r\n`.
pub(crate) fn trim_line_end(buf: &mut String) {
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
}

impl<R: Read + Seek> VirtualLineReader for bgzf::io::Reader<R> {
    fn virtual_offset(&self) -> u64 {
        u64::from(self.virtual_position())
    }

    fn seek_virtual(&mut self, offset: u64) -> io::Result<()> {
        self.seek(bgzf::VirtualPosition::from(offset))?;
        Ok(())
    }

    fn next_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = BufRead::read_line(self, buf)?;
        trim_line_end(buf);
        Ok(n)
    }
}

impl<W: Write> VirtualWriter for bgzf::io::Writer<W> {
    fn virtual_offset(&self) -> u64 {
        u64::from(self.virtual_position())
    }
}
