// src/lib.rs — Library root for docchat

pub mod cancel;
pub mod chat;
pub mod cli;
pub mod infra;
pub mod session;
pub mod stream;
pub mod upstream;
