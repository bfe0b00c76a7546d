//! Gemini client for structured age evaluation.
//!
//! One call per thumbnail: the image goes in by URI together with a system
//! instruction and a prompt, and the model is pinned to a JSON response
//! schema listing the people it sees with an estimated age each.

pub mod client;
pub mod error;

pub use client::{GeminiClient, GeminiConfig, PersonEvaluation};
pub use error::{GeminiError, GeminiResult};
