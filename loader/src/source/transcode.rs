//! Streaming transcoding of non-UTF-8 input to UTF-8.

use std::io::{self, Read};

use encoding_rs::{Decoder, Encoding};

const CHUNK_SIZE: usize = 8 * 1024;

/// Wraps a reader in `encoding` and yields UTF-8 bytes, one chunk at a time.
pub struct TranscodingReader<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    output: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl<R: Read> TranscodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder(),
            input: vec![0; CHUNK_SIZE],
            output: Vec::new(),
            pos: 0,
            finished: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let read = self.inner.read(&mut self.input)?;
        let last = read == 0;

        let capacity = self
            .decoder
            .max_utf8_buffer_length(read)
            .unwrap_or(read * 3 + 16);
        self.output.clear();
        self.output.resize(capacity, 0);

        let (_, consumed, written, _) =
            self.decoder
                .decode_to_utf8(&self.input[..read], &mut self.output, last);
        debug_assert_eq!(consumed, read);

        self.output.truncate(written);
        self.pos = 0;
        self.finished = last;
        Ok(())
    }
}

impl<R: Read> Read for TranscodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.output.len() {
            if self.finished {
                return Ok(0);
            }
            self.refill()?;
        }

        let n = (self.output.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.output[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_to_utf8() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let mut reader = TranscodingReader::new(bytes, encoding_rs::WINDOWS_1252);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "Société");
    }

    #[test]
    fn test_large_input_spans_chunks() {
        let bytes: Vec<u8> = std::iter::repeat(0xF1u8).take(CHUNK_SIZE * 3 + 5).collect();
        let mut reader = TranscodingReader::new(bytes.as_slice(), encoding_rs::WINDOWS_1252);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out.chars().count(), CHUNK_SIZE * 3 + 5);
        assert!(out.chars().all(|c| c == 'ñ'));
    }
}
