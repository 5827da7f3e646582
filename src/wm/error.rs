//! Protocol error classification
//!
//! Requests against windows the client already destroyed are routine in a
//! window manager and are recovered silently; anything else coming back from
//! the display connection means the connection is unusable.

use thiserror::Error;
use tracing::debug;
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::ErrorKind;
use x11rb::x11_utils::X11Error;

/// Major opcodes of requests whose BadAccess is expected (grab conflicts)
const GRAB_BUTTON: u8 = 28;
const GRAB_KEY: u8 = 33;

#[derive(Debug, Error)]
pub enum XError {
    /// The counterpart destroyed the window before the request reached it
    #[error("window 0x{window:x} no longer exists ({request})")]
    StaleHandle { window: u32, request: &'static str },

    #[error("display connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("protocol error in {request}: {kind:?}")]
    Protocol { request: &'static str, kind: ErrorKind },

    /// No resource identifiers left for a new frame or decoration
    #[error("resource identifiers exhausted")]
    Exhausted,
}

impl XError {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleHandle { .. })
    }

    pub fn from_reply(err: ReplyError, window: u32, request: &'static str) -> Self {
        match err {
            ReplyError::ConnectionError(e) => Self::Connection(e),
            ReplyError::X11Error(e) => Self::from_x11(&e, window, request),
        }
    }

    pub fn from_reply_or_id(err: ReplyOrIdError, window: u32, request: &'static str) -> Self {
        match err {
            ReplyOrIdError::IdsExhausted => Self::Exhausted,
            ReplyOrIdError::ConnectionError(e) => Self::Connection(e),
            ReplyOrIdError::X11Error(e) => Self::from_x11(&e, window, request),
        }
    }

    pub fn from_x11(err: &X11Error, window: u32, request: &'static str) -> Self {
        if is_stale_kind(err) {
            Self::StaleHandle { window, request }
        } else {
            Self::Protocol { request, kind: err.error_kind }
        }
    }
}

/// Errors delivered asynchronously in the event stream that are safe to drop.
pub fn is_stale_kind(err: &X11Error) -> bool {
    match err.error_kind {
        ErrorKind::Window | ErrorKind::Drawable | ErrorKind::Match => true,
        ErrorKind::Access => matches!(err.major_opcode, GRAB_BUTTON | GRAB_KEY),
        _ => false,
    }
}

/// Turns stale-handle failures into `Ok(None)`.
pub trait Tolerate<T> {
    fn tolerate(self, what: &str) -> Result<Option<T>, XError>;
}

impl<T> Tolerate<T> for Result<T, XError> {
    fn tolerate(self, what: &str) -> Result<Option<T>, XError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_stale() => {
                debug!("Ignoring stale handle in {}: {}", what, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
