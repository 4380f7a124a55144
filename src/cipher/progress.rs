//! Optional progress side channel
//!
//! Callers pass `Some(&mut sink)` to follow a long stream; it has no effect
//! on the bytes produced.

/// Receives byte counts while a file is streamed
pub trait ProgressSink {
    /// Called once before the first chunk with the number of payload bytes
    /// expected (0 when unknown)
    fn start(&mut self, _total: u64) {}

    /// Called after every chunk with the running byte count
    fn advance(&mut self, processed: u64, total: u64);

    /// Called once after the last chunk
    fn finish(&mut self) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64),
{
    fn advance(&mut self, processed: u64, total: u64) {
        self(processed, total)
    }
}
