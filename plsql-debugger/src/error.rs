use jdwp_client::JdwpError;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("JDWP error: {0}")]
    Jdwp(#[from] JdwpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No debuggee is connected")]
    NotConnected,

    #[error("The target is not suspended")]
    NotSuspended,

    #[error("Unknown variables reference {0}")]
    UnknownHandle(i64),

    #[error("No cached value for object signature {0}")]
    UnknownObject(String),

    #[error("The session has terminated")]
    Terminated,
}
