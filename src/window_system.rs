//! Seam between the negotiation engine and the host windowing system.

use x11rb::protocol::xproto::{Atom, Timestamp, Window};

use crate::error::{LookupError, SendError, TranslationError};
use crate::events::Reply;

/// Operations the negotiation engine needs from the host windowing system.
///
/// The real implementation is
/// [`X11WindowSystem`](crate::x11::X11WindowSystem); tests substitute a
/// recording mock. Implementations are expected to be thin calls into the
/// windowing server and carry no protocol logic of their own.
pub trait WindowSystem {
    /// Resolve a format identifier to its name.
    fn format_name(&self, format: Atom) -> Result<String, LookupError>;

    /// Read the full ordered format list advertised by `source` (the
    /// `XdndTypeList` window property).
    fn fetch_type_list(&self, source: Window) -> Result<Vec<Atom>, LookupError>;

    /// Translate root-window coordinates into the target window's space.
    fn translate_root_coords(&self, root_x: i16, root_y: i16)
        -> Result<(i32, i32), TranslationError>;

    /// Send a reply message to `target`.
    ///
    /// Fire-and-forget: there is no delivery guarantee, and the engine never
    /// waits for an answer.
    fn send_reply(&self, target: Window, reply: Reply) -> Result<(), SendError>;

    /// Ask the selection owner to convert the drop payload to `format`.
    ///
    /// Asynchronous: completion surfaces later as a payload-delivery event.
    /// The correlation key is the fixed `XdndSelection` slot, so only one
    /// conversion may be outstanding at a time.
    fn request_conversion(&self, format: Atom, timestamp: Timestamp) -> Result<(), SendError>;

    /// Read the delivered payload bytes from the selection property.
    fn fetch_payload(&self) -> Result<Vec<u8>, LookupError>;
}
