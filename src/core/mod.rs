//! Core types shared by every stage of the pipeline
//!
//! The core module holds the error taxonomy ([`CompkitError`]), the pipeline stage an error
//! is attributed to ([`PipelineStage`]), and the user-facing wrapper ([`ErrorContext`]) the
//! CLI prints. Library code returns [`Result`]; the binary converts failures with
//! [`user_friendly_error`].

pub mod error;

pub use error::{CompkitError, ErrorContext, PipelineStage, Result, user_friendly_error};
