//! Core library for tickerscribe: turns spoken market commentary into
//! structured index quotes.
//!
//! The pipeline transcribes audio with whisper.cpp, extracts quote
//! fields with either a rule table or a local LLM, and normalizes the
//! result into a canonical record. `pipeline::PipelineRunner` drives a
//! single input; `batch::BatchOrchestrator` drives many.

pub mod audio;
pub mod batch;
pub mod config;
pub mod dirs;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod quote;
pub mod registry;
pub mod repair;
pub mod transcribe;

pub use error::PipelineError;
pub use pipeline::{PipelineOutcome, PipelineRunner};
pub use quote::CanonicalQuote;
