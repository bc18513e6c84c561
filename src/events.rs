//! Wire model of the protocol: decoded inbound messages and outbound replies.
//!
//! XDND client messages pack several fields into the five 32-bit words of a
//! [`ClientMessageData`]; the constructors here undo that packing so the
//! engine can match on plain values.

use smallvec::SmallVec;
use x11rb::protocol::xproto::{Atom, ClientMessageData, Timestamp, Window};

// XdndEnter data[1] layout: protocol version in the top byte, bit 0 set when
// the source advertises more than three formats via the XdndTypeList property.
const ENTER_TYPE_LIST: u32 = 1 << 0;
const ENTER_VERSION_SHIFT: u32 = 24;

/// One inbound protocol message, decoded from its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DndEvent {
    /// A drag gesture entered the target window.
    Enter {
        /// Peer window that initiated the drag.
        source: Window,
        /// Protocol version advertised by the source.
        version: u32,
        /// The source has more than three formats; read `XdndTypeList` from
        /// its window instead of using `candidates`.
        wants_type_list: bool,
        /// Formats advertised inline in the message, in peer order.
        candidates: SmallVec<[Atom; 3]>,
    },
    /// The pointer moved while the gesture is over the target window.
    Position {
        /// Peer window that initiated the drag.
        source: Window,
        /// Pointer x position, root-window coordinates.
        root_x: i16,
        /// Pointer y position, root-window coordinates.
        root_y: i16,
    },
    /// The source released the gesture over the target window.
    Drop {
        /// Peer window that initiated the drag.
        source: Window,
        /// Drop timestamp; only meaningful for protocol version 1 and up.
        timestamp: Timestamp,
    },
    /// The gesture left the target window or was cancelled.
    Leave {
        /// Peer window that initiated the drag.
        source: Window,
    },
    /// The converted selection payload arrived.
    Payload {
        /// Raw transferred bytes, opaque to the protocol.
        data: Vec<u8>,
    },
}

impl DndEvent {
    /// Decode an `XdndEnter` message.
    pub fn enter_from(msg: ClientMessageData) -> DndEvent {
        let data = msg.as_data32();
        DndEvent::Enter {
            source: data[0],
            version: data[1] >> ENTER_VERSION_SHIFT,
            wants_type_list: (data[1] & ENTER_TYPE_LIST) != 0,
            candidates: data[2..5]
                .iter()
                .copied()
                .filter(|&atom| atom != x11rb::NONE)
                .collect(),
        }
    }

    /// Decode an `XdndPosition` message.
    ///
    /// Root coordinates are packed as `(x << 16) | y` in the third word.
    pub fn position_from(msg: ClientMessageData) -> DndEvent {
        let data = msg.as_data32();
        DndEvent::Position {
            source: data[0],
            root_x: ((data[2] >> 16) & 0xffff) as i16,
            root_y: (data[2] & 0xffff) as i16,
        }
    }

    /// Decode an `XdndDrop` message.
    pub fn drop_from(msg: ClientMessageData) -> DndEvent {
        let data = msg.as_data32();
        DndEvent::Drop {
            source: data[0],
            timestamp: data[2],
        }
    }

    /// Decode an `XdndLeave` message.
    pub fn leave_from(msg: ClientMessageData) -> DndEvent {
        let data = msg.as_data32();
        DndEvent::Leave { source: data[0] }
    }
}

/// Drag-and-drop action negotiated with the source.
///
/// This target only ever offers [`DndAction::Copy`]; the remaining variants
/// exist so replies can name any action the wire protocol knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DndAction {
    /// No action; the drop is not (or no longer) accepted.
    #[default]
    None,
    /// The payload is copied to the target.
    Copy,
    /// The payload is moved to the target.
    Move,
    /// The payload is linked into the target.
    Link,
    /// The user should be asked which action to take.
    Ask,
}

/// Outbound reply message produced by the negotiation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `XdndStatus`: whether the target currently accepts the drop.
    Status {
        /// The target would accept a drop at the current position.
        accept: bool,
        /// Action the target would take; [`DndAction::None`] unless accepted
        /// and the negotiated version carries actions.
        action: DndAction,
    },
    /// `XdndFinished`: the drop sequence is complete.
    Finished {
        /// The drop was accepted and its payload consumed.
        accepted: bool,
        /// Action the target took.
        action: DndAction,
    },
}
