//! Async JDWP client for debugging PL/SQL running inside the Oracle JVM.
//!
//! Layering, bottom up:
//! - [`protocol`] / [`codec`]: packet framing and big-endian payload coding
//! - command catalogs ([`vm`], [`reftype`], [`method`], [`object`],
//!   [`string`], [`thread`], [`stackframe`], [`eventrequest`]): pure
//!   encoders/decoders, one pair per wire operation
//! - [`connection`] / [`eventloop`]: one socket task owning the
//!   pending-reply table
//! - [`mirror`]: negotiated ID sizes, reference-type caches, suspend-depth
//!   bookkeeping
//! - [`requests`]: event request lifecycle and event dispatch

pub mod codec;
pub mod commands;
pub mod connection;
pub mod eventloop;
pub mod eventrequest;
pub mod events;
pub mod method;
pub mod mirror;
pub mod object;
pub mod protocol;
pub mod reftype;
pub mod requests;
pub mod stackframe;
pub mod string;
pub mod thread;
pub mod types;
pub mod values;
pub mod vm;

pub use connection::JdwpConnection;
pub use events::{Event, EventKind, EventSet};
pub use mirror::VmMirror;
pub use protocol::{JdwpError, JdwpResult};
pub use requests::{EventRequest, EventRequestManager};
pub use types::{
    Capabilities, ClassInfo, FieldInfo, FrameInfo, IdSizes, LineTable, LineTableEntry, Location,
    MethodInfo, Value, ValueData, Variable,
};
