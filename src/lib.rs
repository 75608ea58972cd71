// src/lib.rs

//! fmuforge FMU Generator
//!
//! Generates FMI 2.0 co-simulation FMUs from tabular variable models. The
//! packaged binaries exchange their variable values with a remote
//! simulator over TCP, so the generated C++ is glue: buffer packing,
//! value getters and setters, and the model description that makes the
//! package a valid FMU.
//!
//! # Architecture
//!
//! - Template-driven: generation copies a complete C++ template project,
//!   renames it after the model and substitutes typed `$$token$$`
//!   placeholders in descriptor and source
//! - Staged pipeline: a fixed stage sequence from input validation to
//!   archive assembly; failures abort and leave the partial tree in place
//! - Recovery inputs: the pre-allocation model is persisted next to the
//!   project tree so an interrupted run can be restarted as-is
//! - External toolchain: CMake build and fmuCheck validation behind
//!   traits, bounded by wall-clock timeouts
//! - Round-trip models: one in-memory model form, loadable from the JSON
//!   interchange format and readable back out of packaged FMUs

pub mod allocator;
pub mod complement;
pub mod descriptor;
mod error;
pub mod fmu;
pub mod forge;
pub mod model;
pub mod progress;
pub mod source;
pub mod template;

pub use error::{Error, Result};
pub use forge::{Forge, ForgeConfig, ForgeResult, Platform, Stage, TcpEndpoint};
pub use model::{
    AUTO_VALUE_REF, Causality, Initial, ModelSpec, ScalarVariable, VarType, Variability,
};
pub use progress::{ProgressEvent, ProgressLog, ProgressSink, SilentSink};
pub use template::{Template, Token, TokenValues, TreeSubstitution};
