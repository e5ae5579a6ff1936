//! Client for the locally hosted inference service

pub mod ollama;

pub use ollama::{Generation, OllamaClient};
