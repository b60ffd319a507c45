//! Source-level PL/SQL debugger core.
//!
//! Turns raw JDWP traffic (via the `jdwp-client` crate) into source-level
//! debugging semantics for PL/SQL running inside the Oracle JVM: mapping
//! `.sql` files to `$Oracle/...` classes, verifying breakpoints against
//! lazily loaded (and reloadable) classes, stepping, and variable/scope
//! introspection. The debug-adapter layer on top consumes the
//! [`DebugEvent`] stream and drives the [`DebugSession`] call surface.

pub mod error;
pub mod events;
pub mod resolve;
pub mod session;
pub mod source;
pub mod variables;

pub use error::{SessionError, SessionResult};
pub use events::{DebugEvent, SourceLoadReason};
pub use resolve::{NoopResolver, SourceResolver};
pub use session::{
    Breakpoint, DebugSession, ScopeInfo, SessionState, StackFrame, StepKind, StopReason,
};
pub use variables::VariableInfo;
