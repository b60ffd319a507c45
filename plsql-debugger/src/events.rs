// Structured events the session emits toward the front end

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why a previously loaded source announcement fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLoadReason {
    New,
    Changed,
}

/// Everything the front end can observe about a running session. Delivered
/// in order over the channel handed out at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DebugEvent {
    /// The stepped-to line was reached.
    StopOnEntry,
    StopOnBreakpoint,
    /// A breakpoint's verified flag changed.
    #[serde(rename_all = "camelCase")]
    BreakpointChanged {
        id: u32,
        line: u32,
        verified: bool,
    },
    #[serde(rename_all = "camelCase")]
    SourceLoaded {
        reason: SourceLoadReason,
        path: PathBuf,
    },
    /// Diagnostic output, optionally pinned to a source position.
    #[serde(rename_all = "camelCase")]
    Output {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        group: Option<String>,
    },
    Terminated,
}

impl DebugEvent {
    /// Plain-text output with no source position attached.
    pub fn output(text: impl Into<String>) -> Self {
        Self::Output {
            text: text.into(),
            path: None,
            line: None,
            column: None,
            group: None,
        }
    }
}
