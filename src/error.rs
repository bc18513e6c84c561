//! Failure classes surfaced by the windowing collaborator.
//!
//! None of these are fatal to a negotiation. The engine degrades every one of
//! them to "message dropped, no reply sent, session state unchanged", keeping
//! the protocol live for the next inbound message.

use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xproto::Atom;

/// A format identifier could not be resolved, or a property read failed.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The server does not know the identifier.
    #[error("format {0} is not a known atom")]
    UnknownFormat(Atom),

    /// The underlying X11 request could not be sent.
    #[error("X11 request could not be sent")]
    Connection(#[from] ConnectionError),

    /// The underlying X11 request failed.
    #[error("X11 request failed")]
    Protocol(#[from] ReplyError),
}

/// Root coordinates could not be translated into the target window's space.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    /// The translation target could not be resolved on the server.
    #[error("coordinate translation target could not be resolved")]
    Unresolvable,

    /// The underlying X11 request could not be sent.
    #[error("X11 request could not be sent")]
    Connection(#[from] ConnectionError),

    /// The underlying X11 request failed.
    #[error("X11 request failed")]
    Protocol(#[from] ReplyError),
}

/// An outbound message or conversion request could not be queued.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The underlying X11 request could not be sent.
    #[error("X11 request could not be sent")]
    Connection(#[from] ConnectionError),
}
