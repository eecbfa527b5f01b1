//! Reassembly of frames split across chunk boundaries.
//!
//! The [`ByteCursor`] owns the RemainderBuffer: the unconsumed tail of the
//! previous chunk. Each incoming chunk is presented to the scanner as one
//! contiguous [`Window`]. When nothing is carried over the window borrows the
//! chunk directly; otherwise the remainder and the chunk are stitched into a
//! single owned buffer. Whatever the scan loop does not consume is carried
//! into the next chunk when the window is finished.

use std::borrow::Cow;
use thiserror::Error;
use tracing::warn;

use crate::config::DEFAULT_REASSEMBLY_CAP;

/// The carried-over bytes outgrew the reassembly cap and were dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Stream desynchronized: dropped {dropped} unconsumed bytes (cap {cap})")]
pub struct StreamDesync {
    /// Number of bytes discarded.
    pub dropped: usize,
    /// Cap that was exceeded.
    pub cap: usize,
}

/// Owner of the RemainderBuffer.
#[derive(Debug)]
pub struct ByteCursor {
    remainder: Vec<u8>,
    cap: usize,
}

impl Default for ByteCursor {
    fn default() -> Self {
        Self::new(DEFAULT_REASSEMBLY_CAP)
    }
}

impl ByteCursor {
    /// Create a cursor carrying at most `cap` bytes between chunks.
    pub fn new(cap: usize) -> Self {
        Self {
            remainder: Vec::new(),
            cap,
        }
    }

    /// The reassembly cap.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Bytes currently carried over.
    pub fn remainder_len(&self) -> usize {
        self.remainder.len()
    }

    /// Present `chunk` behind the carried-over bytes.
    pub fn merge<'a>(&'a mut self, chunk: &'a [u8]) -> Window<'a> {
        let bytes = if self.remainder.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut stitched = std::mem::take(&mut self.remainder);
            stitched.extend_from_slice(chunk);
            Cow::Owned(stitched)
        };
        Window {
            bytes,
            consumed: 0,
            cursor: self,
        }
    }

    /// Drop everything carried over. Returns the number of bytes discarded.
    pub fn reset(&mut self) -> usize {
        let dropped = self.remainder.len();
        self.remainder.clear();
        dropped
    }
}

/// One contiguous view of remainder + chunk.
///
/// Must be closed with [`Window::finish`]; dropping it instead discards the
/// unconsumed bytes.
#[must_use = "unconsumed bytes are lost unless the window is finished"]
#[derive(Debug)]
pub struct Window<'a> {
    bytes: Cow<'a, [u8]>,
    consumed: usize,
    cursor: &'a mut ByteCursor,
}

impl<'a> Window<'a> {
    /// The unconsumed bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[self.consumed..]
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.bytes.len() - self.consumed
    }

    /// Check if every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance past `n` bytes, clamped to what is left.
    pub fn consume(&mut self, n: usize) {
        self.consumed = self.consumed.saturating_add(n).min(self.bytes.len());
    }

    /// Total bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Check if the window had to copy carried-over bytes.
    pub fn is_stitched(&self) -> bool {
        matches!(self.bytes, Cow::Owned(_))
    }

    /// Carry the unconsumed tail into the cursor.
    ///
    /// Returns the number of bytes carried. If the tail exceeds the cap it is
    /// discarded and the cursor starts empty.
    pub fn finish(self) -> Result<usize, StreamDesync> {
        let Window {
            bytes,
            consumed,
            cursor,
        } = self;
        let leftover = bytes.len() - consumed;

        if leftover > cursor.cap {
            warn!(dropped = leftover, cap = cursor.cap, "Reassembly overflow, resynchronizing");
            cursor.remainder.clear();
            return Err(StreamDesync {
                dropped: leftover,
                cap: cursor.cap,
            });
        }

        match bytes {
            Cow::Owned(mut buf) => {
                buf.drain(..consumed);
                cursor.remainder = buf;
            }
            Cow::Borrowed(slice) => {
                cursor.remainder.clear();
                cursor.remainder.extend_from_slice(&slice[consumed..]);
            }
        }
        Ok(leftover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrowed_when_no_remainder() {
        let mut cursor = ByteCursor::new(64);
        let chunk = [1u8, 2, 3, 4];
        let mut window = cursor.merge(&chunk);
        assert!(!window.is_stitched());
        assert_eq!(window.bytes(), &chunk);
        window.consume(4);
        assert!(window.is_empty());
        assert_eq!(window.finish(), Ok(0));
        assert_eq!(cursor.remainder_len(), 0);
    }

    #[test]
    fn test_carry_and_stitch() {
        let mut cursor = ByteCursor::new(64);

        let mut window = cursor.merge(&[1, 2, 3, 4, 5]);
        window.consume(3);
        assert_eq!(window.finish(), Ok(2));
        assert_eq!(cursor.remainder_len(), 2);

        let mut window = cursor.merge(&[6, 7]);
        assert!(window.is_stitched());
        assert_eq!(window.bytes(), &[4, 5, 6, 7]);
        window.consume(1);
        assert_eq!(window.bytes(), &[5, 6, 7]);
        assert_eq!(window.consumed(), 1);
        assert_eq!(window.finish(), Ok(3));

        let window = cursor.merge(&[]);
        assert_eq!(window.bytes(), &[5, 6, 7]);
        let _ = window.finish();
    }

    #[test]
    fn test_consume_is_clamped() {
        let mut cursor = ByteCursor::new(64);
        let mut window = cursor.merge(&[1, 2, 3]);
        window.consume(usize::MAX);
        assert_eq!(window.consumed(), 3);
        assert_eq!(window.len(), 0);
        assert_eq!(window.finish(), Ok(0));
    }

    #[test]
    fn test_overflow_drops_everything() {
        let mut cursor = ByteCursor::new(8);

        let window = cursor.merge(&[0u8; 6]);
        assert_eq!(window.finish(), Ok(6));

        let window = cursor.merge(&[0u8; 6]);
        assert_eq!(window.finish(), Err(StreamDesync { dropped: 12, cap: 8 }));
        assert_eq!(cursor.remainder_len(), 0);
    }

    #[test]
    fn test_remainder_never_exceeds_cap() {
        let mut cursor = ByteCursor::new(16);
        for len in [3usize, 9, 1, 20, 7, 15, 2] {
            let chunk = vec![0xAAu8; len];
            let window = cursor.merge(&chunk);
            let _ = window.finish();
            assert!(cursor.remainder_len() <= cursor.cap());
        }
    }

    #[test]
    fn test_reset() {
        let mut cursor = ByteCursor::default();
        assert_eq!(cursor.cap(), 24576);
        let window = cursor.merge(&[9u8; 10]);
        let _ = window.finish();
        assert_eq!(cursor.reset(), 10);
        assert_eq!(cursor.remainder_len(), 0);
    }
}
