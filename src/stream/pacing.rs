// src/stream/pacing.rs — Flush eligibility for streamed text
//
// A flush needs both: enough time since the previous one, and a natural
// break in the buffered text (sentence end, word end) or a buffer longer than
// the ceiling. Thresholds are tuning values; correctness never depends on them.

use std::time::Duration;

use crate::infra::config::StreamConfig;

const DEFAULT_MIN_INTERVAL_MS: u64 = 30;
const DEFAULT_MAX_BUFFER_CHARS: usize = 15;

/// Why a buffer is allowed to flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Sentence,
    Word,
    Ceiling,
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlushReason::Sentence => "sentence",
            FlushReason::Word => "word",
            FlushReason::Ceiling => "ceiling",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min_interval: Duration,
    pub max_buffer_chars: usize,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            max_buffer_chars: DEFAULT_MAX_BUFFER_CHARS,
        }
    }
}

impl PacingPolicy {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_flush_interval_ms),
            max_buffer_chars: config.max_buffer_chars,
        }
    }

    /// Flush every chunk as soon as it has a break; handy for tests and pipes.
    pub fn immediate(max_buffer_chars: usize) -> Self {
        Self {
            min_interval: Duration::ZERO,
            max_buffer_chars,
        }
    }

    pub fn should_flush(&self, buffer: &str, elapsed: Duration) -> bool {
        elapsed >= self.min_interval && self.break_in(buffer).is_some()
    }

    /// The break that would justify flushing `buffer`, ignoring time.
    pub fn break_in(&self, buffer: &str) -> Option<FlushReason> {
        if buffer.is_empty() {
            return None;
        }
        if ends_sentence(buffer) {
            Some(FlushReason::Sentence)
        } else if ends_word(buffer) {
            Some(FlushReason::Word)
        } else if buffer.chars().count() > self.max_buffer_chars {
            Some(FlushReason::Ceiling)
        } else {
            None
        }
    }
}

/// `.`, `!`, `?` or a newline, followed only by whitespace.
fn ends_sentence(buffer: &str) -> bool {
    let trimmed = buffer.trim_end();
    let tail = &buffer[trimmed.len()..];
    tail.contains('\n') || matches!(trimmed.chars().next_back(), Some('.' | '!' | '?'))
}

/// Whitespace right after a non-whitespace character.
fn ends_word(buffer: &str) -> bool {
    let mut rev = buffer.chars().rev();
    matches!(
        (rev.next(), rev.next()),
        (Some(last), Some(prev)) if last.is_whitespace() && !prev.is_whitespace()
    )
}
