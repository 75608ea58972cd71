// src/progress.rs

//! Progress reporting for generation runs
//!
//! A generation run walks through a fixed sequence of pipeline stages, each
//! of which emits human-readable events. The pipeline never owns the event
//! stream: the caller passes a [`ProgressSink`] in and keeps everything
//! accumulated so far even when the run fails partway through.
//!
//! # Design
//!
//! The `ProgressSink` trait defines the core interface. Implementations
//! include:
//! - `ProgressLog`: Collects events in order, optionally echoing to stdout
//! - `SilentSink`: No-op for library callers that do not care
//!
//! # Example
//!
//! ```ignore
//! use fmuforge::progress::{ProgressLog, ProgressSink};
//!
//! let mut log = ProgressLog::with_echo();
//! forge.generate(model, &target, &mut log)?;
//!
//! for event in log.events() {
//!     // post-run report, in emission order
//! }
//! ```

use std::fmt;

/// A single progress event, in the order the pipeline produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A pipeline stage began
    Stage(String),
    /// An informational line from within a stage
    Message(String),
    /// A non-fatal condition worth surfacing to the operator
    Warning(String),
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Stage(text) => write!(f, "==> {}", text),
            ProgressEvent::Message(text) => write!(f, "{}", text),
            ProgressEvent::Warning(text) => write!(f, "WARNING: {}", text),
        }
    }
}

/// Receiver for pipeline progress events
///
/// The helper methods only wrap plain text into the matching
/// [`ProgressEvent`] variant; `emit` is the single required method.
pub trait ProgressSink {
    /// Receive one event
    fn emit(&mut self, event: ProgressEvent);

    /// Announce a pipeline stage transition
    fn stage(&mut self, text: &str) {
        self.emit(ProgressEvent::Stage(text.to_string()));
    }

    /// Emit an informational line
    fn message(&mut self, text: &str) {
        self.emit(ProgressEvent::Message(text.to_string()));
    }

    /// Emit a non-fatal warning
    fn warning(&mut self, text: &str) {
        self.emit(ProgressEvent::Warning(text.to_string()));
    }
}

/// Ordered, caller-owned event log
///
/// With `echo` enabled every event is also printed to stdout as it arrives
/// (what the CLI uses); the collected log stays available either way for
/// post-run reporting.
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Vec<ProgressEvent>,
    echo: bool,
}

impl ProgressLog {
    /// Collect events without printing them
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect events and print each one to stdout as it arrives
    pub fn with_echo() -> Self {
        Self {
            events: Vec::new(),
            echo: true,
        }
    }

    /// All events in emission order
    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    /// Only the warnings, in emission order
    pub fn warnings(&self) -> impl Iterator<Item = &ProgressEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Warning(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl ProgressSink for ProgressLog {
    fn emit(&mut self, event: ProgressEvent) {
        if self.echo {
            println!("{}", event);
        }
        self.events.push(event);
    }
}

/// Sink that drops every event
#[derive(Debug, Default)]
pub struct SilentSink;

impl SilentSink {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressSink for SilentSink {
    fn emit(&mut self, _event: ProgressEvent) {}
}
