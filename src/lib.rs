//! Turns a short activity description and photos into a Word learning
//! record, with the reflective text written by Google Gemini.

pub mod config;
pub mod document;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod routes;

pub use config::{Config, GeminiConfig};
pub use gemini::{GeminiClient, GenerationError};
pub use routes::{router, AppState};
