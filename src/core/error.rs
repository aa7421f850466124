//! Error handling for compkit
//!
//! Every failure the resolve → transform → install pipeline can produce is a variant of
//! [`CompkitError`]. Variants carry the structured detail (component, file, version, path)
//! needed to render an actionable message, and each one knows which [`PipelineStage`] it
//! belongs to and whether the registry retry loop may try again.
//!
//! The CLI converts any [`anyhow::Error`] into an [`ErrorContext`] with
//! [`user_friendly_error`], which adds a suggestion and extra details before printing.
//!
//! # Error Categories
//!
//! - **Registry**: [`CompkitError::NotFound`], [`CompkitError::Unreachable`],
//!   [`CompkitError::RateLimited`], [`CompkitError::InvalidManifest`],
//!   [`CompkitError::AlreadyPublished`]
//! - **Resolution**: [`CompkitError::CyclicDependency`], [`CompkitError::VersionConflict`],
//!   [`CompkitError::IncompatiblePackageVersions`]
//! - **Transform**: [`CompkitError::ParseError`], [`CompkitError::StyleReferenceError`]
//! - **Installation**: [`CompkitError::FileConflict`], [`CompkitError::DuplicateTarget`],
//!   [`CompkitError::PromotionFailure`], [`CompkitError::FileSystem`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use compkit_cli::core::{CompkitError, ErrorContext};
//!
//! let error = CompkitError::NotFound {
//!     name: "button".to_string(),
//!     version: None,
//! };
//! assert!(!error.is_retriable());
//!
//! ErrorContext::new(error)
//!     .with_suggestion("Check the component name with 'compkit list'")
//!     .display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used by the library layers.
pub type Result<T, E = CompkitError> = std::result::Result<T, E>;

/// The part of the pipeline an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Talking to the registry (fetching manifests, version lists).
    Registry,
    /// Building the dependency closure.
    Resolve,
    /// Rewriting fetched source files.
    Transform,
    /// Staging and promoting files into the target project.
    Install,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Registry => "registry",
            Self::Resolve => "resolve",
            Self::Transform => "transform",
            Self::Install => "install",
        };
        f.write_str(name)
    }
}

/// The main error type for compkit operations.
///
/// The enum derives [`Clone`] so that a single fetch failure can be shared between
/// concurrent waiters and recorded in reports. I/O failures are therefore captured as
/// [`CompkitError::FileSystem`] with the rendered reason rather than the raw
/// [`std::io::Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompkitError {
    /// The component, or the requested version of it, is not published.
    #[error("{}", not_found_message(.name, .version.as_deref()))]
    NotFound {
        /// Component name
        name: String,
        /// Requested version, `None` when "latest" was requested
        version: Option<String>,
    },

    /// Network or transport failure talking to the registry.
    #[error("Registry unreachable at {url}: {reason}")]
    Unreachable {
        /// URL that was being fetched
        url: String,
        /// Transport-level reason
        reason: String,
    },

    /// The registry asked us to slow down.
    #[error("Registry rate limit hit at {url}")]
    RateLimited {
        /// URL that was being fetched
        url: String,
        /// Server-provided `Retry-After` hint
        retry_after: Option<Duration>,
    },

    /// The fetched payload does not describe a valid component manifest.
    #[error("Invalid manifest for '{name}': {reason}")]
    InvalidManifest {
        /// Component name the manifest was fetched for
        name: String,
        /// Why validation failed
        reason: String,
    },

    /// A manifest with this name and version already exists in storage.
    #[error("Component '{name}@{version}' is already published")]
    AlreadyPublished {
        /// Component name
        name: String,
        /// Version that already exists
        version: String,
    },

    /// A component transitively depends on itself.
    #[error("Circular dependency detected: {}", .cycle.join(" → "))]
    CyclicDependency {
        /// The cycle, first element repeated at the end
        cycle: Vec<String>,
    },

    /// Two paths requested different versions of one component (strict policy only).
    #[error(
        "Version conflict for '{name}': '{requested_by}' requires {requested} but {chosen} was already chosen"
    )]
    VersionConflict {
        /// Component name
        name: String,
        /// Version chosen first
        chosen: String,
        /// Version requested later
        requested: String,
        /// Component that made the later request
        requested_by: String,
    },

    /// Two components declare provably disjoint ranges for one package.
    #[error(
        "Incompatible versions of package '{package}': '{first_component}' requires {first_range}, '{second_component}' requires {second_range}"
    )]
    IncompatiblePackageVersions {
        /// Third-party package name
        package: String,
        /// First requesting component
        first_component: String,
        /// Range requested by the first component
        first_range: String,
        /// Second requesting component
        second_component: String,
        /// Range requested by the second component
        second_range: String,
    },

    /// A source file could not be parsed.
    #[error("Failed to parse {} (line {line}): {reason}", .path.display())]
    ParseError {
        /// File being parsed
        path: PathBuf,
        /// 1-based line where parsing failed
        line: usize,
        /// Parser message
        reason: String,
    },

    /// A style reference in a source file cannot be resolved.
    #[error("Unresolvable style reference '{reference}' in {}: {reason}", .path.display())]
    StyleReferenceError {
        /// File containing the reference
        path: PathBuf,
        /// The reference as written
        reference: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// Target files already exist and `force` was not given.
    #[error("{} file(s) already exist in the target directory", .paths.len())]
    FileConflict {
        /// Every conflicting target path
        paths: Vec<PathBuf>,
    },

    /// Two components would write the same output file.
    #[error("Components '{first}' and '{second}' both install {}", .path.display())]
    DuplicateTarget {
        /// Output path written twice
        path: PathBuf,
        /// Component that claimed the path first
        first: String,
        /// Component that claimed it second
        second: String,
    },

    /// Renaming a staged file into place failed; the transaction was rolled back.
    #[error("Failed to promote {}: {reason}", .path.display())]
    PromotionFailure {
        /// Target path whose promotion failed
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// File system operation failed.
    #[error("File system error during {operation}: {}: {reason}", .path.display())]
    FileSystem {
        /// Operation being attempted (e.g. "stage", "read")
        operation: String,
        /// Path involved
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled during {stage}")]
    Cancelled {
        /// Stage that was running
        stage: PipelineStage,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

fn not_found_message(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("Component '{name}' version '{version}' not found in registry"),
        None => format!("Component '{name}' not found in registry"),
    }
}

impl CompkitError {
    /// Build a [`CompkitError::FileSystem`] from an I/O error.
    pub fn fs(operation: &str, path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::FileSystem {
            operation: operation.to_string(),
            path: path.into(),
            reason: error.to_string(),
        }
    }

    /// Whether the registry retry loop may try this operation again.
    ///
    /// Only transport failures and rate limits are retriable; `NotFound` and
    /// `InvalidManifest` never are.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::RateLimited { .. })
    }

    /// The pipeline stage this error belongs to.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        match self {
            Self::NotFound { .. }
            | Self::Unreachable { .. }
            | Self::RateLimited { .. }
            | Self::InvalidManifest { .. }
            | Self::AlreadyPublished { .. } => PipelineStage::Registry,
            Self::CyclicDependency { .. }
            | Self::VersionConflict { .. }
            | Self::IncompatiblePackageVersions { .. } => PipelineStage::Resolve,
            Self::ParseError { .. } | Self::StyleReferenceError { .. } => {
                PipelineStage::Transform
            }
            Self::FileConflict { .. }
            | Self::DuplicateTarget { .. }
            | Self::PromotionFailure { .. }
            | Self::FileSystem { .. }
            | Self::Other { .. } => PipelineStage::Install,
            Self::Cancelled { stage } => *stage,
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Displayed as the error in red, optional details in yellow and an optional suggestion in
/// green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: CompkitError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: CompkitError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!(
            "{}: {} {}",
            "error".red().bold(),
            self.error,
            format!("(during {})", self.error.stage()).dimmed()
        );

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with tailored suggestions.
///
/// Errors that wrap a [`CompkitError`] get a suggestion specific to their variant; anything
/// else is reported as [`CompkitError::Other`] with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(compkit_error) = error.downcast_ref::<CompkitError>() {
        return create_error_context(compkit_error.clone());
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(CompkitError::Other {
        message,
    })
}

fn create_error_context(error: CompkitError) -> ErrorContext {
    match &error {
        CompkitError::NotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'compkit list' to see the components this registry publishes"),
        CompkitError::Unreachable { .. } | CompkitError::RateLimited { .. } => {
            ErrorContext::new(error)
                .with_suggestion("Check your network connection and the --registry URL")
                .with_details("The request was retried with exponential backoff before giving up")
        }
        CompkitError::InvalidManifest { .. } => ErrorContext::new(error)
            .with_details("The registry returned a payload that is not a valid component manifest"),
        CompkitError::CyclicDependency { .. } => ErrorContext::new(error).with_suggestion(
            "Report the cycle to the component authors; cyclic components cannot be installed",
        ),
        CompkitError::VersionConflict { .. } => ErrorContext::new(error).with_suggestion(
            "Drop --strict-versions to let the first resolved version win with a warning",
        ),
        CompkitError::IncompatiblePackageVersions { .. } => ErrorContext::new(error)
            .with_details("The requested package ranges have no version in common"),
        CompkitError::ParseError { .. } | CompkitError::StyleReferenceError { .. } => {
            ErrorContext::new(error)
                .with_details("No files were written; the target project is unchanged")
        }
        CompkitError::FileConflict {
            paths,
        } => {
            let listing = paths
                .iter()
                .map(|p| format!("  {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n");
            ErrorContext::new(error.clone())
                .with_details(format!("Conflicting files:\n{listing}"))
                .with_suggestion("Re-run with --force to overwrite the existing files")
        }
        CompkitError::PromotionFailure { .. } => ErrorContext::new(error)
            .with_details("All files written by this operation were rolled back"),
        CompkitError::Cancelled { .. } => ErrorContext::new(error)
            .with_details("Any files staged before cancellation were removed"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_kinds() {
        assert!(
            CompkitError::Unreachable {
                url: "http://x".into(),
                reason: "refused".into(),
            }
            .is_retriable()
        );
        assert!(
            CompkitError::RateLimited {
                url: "http://x".into(),
                retry_after: None,
            }
            .is_retriable()
        );
        assert!(
            !CompkitError::NotFound {
                name: "a".into(),
                version: None,
            }
            .is_retriable()
        );
        assert!(
            !CompkitError::InvalidManifest {
                name: "a".into(),
                reason: "bad".into(),
            }
            .is_retriable()
        );
    }

    #[test]
    fn test_cycle_message_lists_full_path() {
        let error = CompkitError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        };
        assert_eq!(error.to_string(), "Circular dependency detected: a → b → c → a");
        assert_eq!(error.stage(), PipelineStage::Resolve);
    }

    #[test]
    fn test_user_friendly_error_keeps_variant() {
        let error = anyhow::Error::new(CompkitError::FileConflict {
            paths: vec![PathBuf::from("ui/button.tsx")],
        });
        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, CompkitError::FileConflict { .. }));
        assert!(ctx.details.unwrap().contains("ui/button.tsx"));
        assert!(ctx.suggestion.unwrap().contains("--force"));
    }

    #[test]
    fn test_user_friendly_error_includes_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let ctx = user_friendly_error(error);
        let CompkitError::Other {
            message,
        } = ctx.error
        else {
            panic!("expected Other");
        };
        assert!(message.contains("outer"));
        assert!(message.contains("root cause"));
    }
}
