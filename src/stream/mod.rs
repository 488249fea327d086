// src/stream/mod.rs — Incremental answer delivery: decode, pace, assemble

pub mod assembler;
pub mod decoder;
pub mod pacing;

pub use assembler::{EndKind, StreamAssembler, StreamEnd};
pub use decoder::{Utf8Mode, Utf8StreamDecoder};
pub use pacing::{FlushReason, PacingPolicy};
