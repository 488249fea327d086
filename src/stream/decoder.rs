// src/stream/decoder.rs — Incremental UTF-8 decoding across chunk boundaries
//
// A multi-byte sequence split between two chunks is held back until the next
// chunk completes it. Output never contains a partial character.

use serde::{Deserialize, Serialize};

use crate::infra::errors::ChatError;

/// How malformed byte sequences are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Utf8Mode {
    /// Replace malformed sequences with U+FFFD.
    #[default]
    Lossy,
    /// Fail with `ChatError::Decode`.
    Strict,
}

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    mode: Utf8Mode,
    /// Trailing bytes of an incomplete sequence from the previous chunk.
    pending: Vec<u8>,
    /// Absolute stream offset of `pending[0]` (or of the next chunk when empty).
    position: usize,
}

impl Utf8StreamDecoder {
    pub fn new(mode: Utf8Mode) -> Self {
        Self {
            mode,
            pending: Vec::new(),
            position: 0,
        }
    }

    /// Decode `chunk`, returning every complete character it finishes.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String, ChatError> {
        let joined;
        let bytes: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(chunk);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(bytes.len());
        let mut start = 0;

        loop {
            let rest = &bytes[start..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = bytes.len();
                    break;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid_len]).unwrap_or_default());
                    match err.error_len() {
                        // Truncated at the end of the chunk: wait for more bytes.
                        None => {
                            self.pending = rest[valid_len..].to_vec();
                            start += valid_len;
                            break;
                        }
                        Some(bad_len) => {
                            if self.mode == Utf8Mode::Strict {
                                return Err(ChatError::Decode {
                                    offset: self.position + start + valid_len,
                                });
                            }
                            out.push(char::REPLACEMENT_CHARACTER);
                            start += valid_len + bad_len;
                        }
                    }
                }
            }
        }

        self.position += start;
        Ok(out)
    }

    /// Flush at end-of-stream. An unfinished sequence is malformed input.
    pub fn finish(&mut self) -> Result<String, ChatError> {
        if self.pending.is_empty() {
            return Ok(String::new());
        }
        let offset = self.position;
        self.position += self.pending.len();
        self.pending.clear();
        match self.mode {
            Utf8Mode::Strict => Err(ChatError::Decode { offset }),
            Utf8Mode::Lossy => Ok(char::REPLACEMENT_CHARACTER.to_string()),
        }
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
