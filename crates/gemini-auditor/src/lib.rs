//! Gemini-Auditor: model adapter for Spec Mirror
//!
//! Sends an audit prompt to Gemini's `generateContent` endpoint with a JSON
//! response schema and returns the verdict text. Parsing the verdict is left
//! to `spec_mirror_core::parse_verdict`.

mod client;
pub mod wire;

pub use client::{GeminiAuditor, GeminiConfig, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
