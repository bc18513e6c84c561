use x11rb::protocol::xproto::{Atom, Timestamp, Window};

/// Protocol progress of the in-flight gesture.
///
/// The absence of a session is the idle state; there is no variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Enter has been processed, no Position answered yet.
    Negotiating,
    /// At least one Position has been answered with a Status reply.
    Armed,
    /// Drop has been processed and a selection conversion requested; the
    /// payload has not arrived yet.
    AwaitingPayload,
}

/// State of a single in-flight drag gesture.
///
/// At most one session exists at a time; a new Enter replaces whatever is
/// open (last-writer-wins, no queueing of concurrent gestures). Source,
/// version and format are fixed at Enter and never change for the session's
/// lifetime.
#[derive(Debug)]
pub struct DragSession {
    source: Window,
    version: u32,
    format: Option<Atom>,
    drop_timestamp: Option<Timestamp>,
    pub(super) state: SessionState,
}

impl DragSession {
    /// Open a session for a gesture from `source`.
    ///
    /// `format` is the outcome of format negotiation at Enter; `None` means
    /// no advertised candidate was acceptable and the eventual drop will be
    /// rejected.
    pub fn new(source: Window, version: u32, format: Option<Atom>) -> Self {
        DragSession {
            source,
            version,
            format,
            drop_timestamp: None,
            state: SessionState::Negotiating,
        }
    }

    /// Peer window that initiated the drag.
    pub fn source(&self) -> Window {
        self.source
    }

    /// Protocol version negotiated at Enter.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Format chosen at Enter, if any candidate was acceptable.
    pub fn format(&self) -> Option<Atom> {
        self.format
    }

    /// Timestamp supplied by the Drop message, if the version carries one.
    pub fn drop_timestamp(&self) -> Option<Timestamp> {
        self.drop_timestamp
    }

    /// Protocol progress of the gesture.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(super) fn record_drop_timestamp(&mut self, timestamp: Timestamp) {
        self.drop_timestamp = Some(timestamp);
    }
}
