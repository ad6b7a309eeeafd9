//! Chunked reading of the input stream
//!
//! Shared by the hardware and software paths. A chunk is filled completely
//! unless the stream ends first, so an input of `L` bytes read with a
//! buffer of `C` bytes always yields `ceil(L / C)` chunks.

use std::io::{ErrorKind, Read};

/// Fill `buf` from `reader`, stopping early only at end of stream.
///
/// Returns the number of bytes read; 0 means the stream was already at its end.
/// Interrupted reads are retried.
///
/// # Errors
///
/// Returns any other I/O error from the reader.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
