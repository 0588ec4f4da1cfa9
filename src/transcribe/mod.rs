pub mod client;

pub use client::{DispatchError, Transcriber, WhisperClient};
