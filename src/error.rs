// src/error.rs
//! Central error type for fmuforge
//!
//! Every fallible operation in the crate returns [`Result`]. Variants map
//! one-to-one onto the failure classes a generation run can hit: input
//! validation, template substitution, descriptor editing, external tool
//! invocation, and archive assembly.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An identifier (model or variable name) violates the C-identifier rules.
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// Two variables in the same model share a name.
    #[error("duplicate variable name '{0}'")]
    DuplicateVariable(String),

    /// A value reference is neither the automatic sentinel nor a positive integer.
    #[error("variable '{name}' has value reference {value}; expected -1 (automatic) or a positive integer")]
    InvalidValueReference { name: String, value: i32 },

    /// Two variables were given the same explicit value reference.
    #[error("value reference {0} is assigned to more than one variable")]
    DuplicateValueReference(i32),

    /// The allocator ran out of representable value references.
    #[error("value reference space exhausted during allocation")]
    ValueReferencesExhausted,

    /// The model interchange document could not be parsed or is semantically broken.
    #[error("malformed model input: {0}")]
    MalformedInput(String),

    /// A required input file or directory does not exist.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The target directory already contains files unrelated to this model.
    #[error("target directory {} is not empty", .0.display())]
    NonEmptyTarget(PathBuf),

    /// A variable carries a type outside the supported scalar set.
    #[error("unknown variable type '{0}' (expected Real, Integer, Boolean or String)")]
    UnknownType(String),

    /// Reading or writing a template file failed.
    #[error("failed to process template file {}: {source}", .path.display())]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template file references a placeholder outside the known vocabulary.
    #[error("template contains unknown placeholder token '$${0}$$'")]
    UnknownToken(String),

    /// A substitution pass was rendered without a value for one of its tokens.
    #[error("no value provided for placeholder token '$${0}$$'")]
    UnresolvedToken(String),

    /// Structural mutation of the generated descriptor failed.
    #[error("descriptor edit failed: {0}")]
    DescriptorEdit(String),

    /// An external tool exited with a failure status or could not be launched.
    #[error("{tool} failed: {reason}")]
    ExternalProcess { tool: String, reason: String },

    /// An external tool exceeded its wall-clock budget and was killed.
    #[error("{tool} timed out after {timeout_secs}s")]
    ProcessTimeout { tool: String, timeout_secs: u64 },

    /// Assembling or reading the FMU zip archive failed.
    #[error("archive assembly failed: {0}")]
    ArchiveAssembly(String),

    /// Underlying I/O failure outside the template tree.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
