use crate::core::{UpdateError, UpdateResult};
use bzip2::{Decompress, Status};
use std::io::Write;
use tracing::debug;

const OUTPUT_CHUNK: usize = 32 * 1024;

/// Incremental bzip2 decoder writing straight into a destination.
///
/// Input arrives in arbitrary pieces through [`feed`](Self::feed); nothing
/// beyond one output chunk is buffered. Concatenated streams, as written by
/// parallel compressors, decode back to back.
pub(crate) struct StreamDecoder {
    inner: Decompress,
    buf: Vec<u8>,
    /// Set between streams: the last one ended and no new one has begun.
    at_boundary: bool,
}

impl StreamDecoder {
    pub(crate) fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            buf: Vec::with_capacity(OUTPUT_CHUNK),
            at_boundary: false,
        }
    }

    /// Decode `input`, writing whatever it yields to `out`.
    ///
    /// Returns the number of decompressed bytes written.
    pub(crate) fn feed<W: Write + ?Sized>(
        &mut self,
        mut input: &[u8],
        out: &mut W,
    ) -> UpdateResult<u64> {
        let mut written = 0;

        loop {
            if self.at_boundary {
                if input.is_empty() {
                    break;
                }
                // Anything after a complete stream must be another stream
                debug!("Starting another compressed stream");
                self.inner = Decompress::new(false);
                self.at_boundary = false;
            }

            let before = self.inner.total_in();
            self.buf.clear();
            let status = self.inner.decompress_vec(input, &mut self.buf).map_err(|e| {
                UpdateError::Decompress {
                    message: e.to_string(),
                }
            })?;
            let consumed = (self.inner.total_in() - before) as usize;
            input = &input[consumed..];

            out.write_all(&self.buf)?;
            written += self.buf.len() as u64;

            if status == Status::StreamEnd {
                self.at_boundary = true;
            } else if consumed == 0 && self.buf.is_empty() {
                // Needs more input
                break;
            }
        }

        Ok(written)
    }

    /// Fail unless the input stopped right after an end-of-stream marker.
    pub(crate) fn finish(self) -> UpdateResult<()> {
        if self.at_boundary {
            Ok(())
        } else {
            Err(UpdateError::Decompress {
                message: "compressed stream ended unexpectedly".to_string(),
            })
        }
    }
}
