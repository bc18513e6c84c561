//! X11 backing for the drop-target engine.
//!
//! [`X11WindowSystem`] implements the [`WindowSystem`] seam over an x11rb
//! [`RustConnection`], and
//! [`DropTarget::dispatch_event`](DropTarget::dispatch_event) routes raw X11
//! events into the engine. [`X11Source`] integrates the connection with a
//! calloop event loop for applications that want one.

mod source;

pub use source::X11Source;

use std::sync::Arc;

use tracing::{debug, trace, warn};
use x11rb::{
    connection::Connection as _,
    errors::ReplyOrIdError,
    protocol::{
        xproto::{
            Atom, AtomEnum, ClientMessageEvent, ConnectionExt as _, EventMask, PropMode, Timestamp,
            Window,
        },
        Event,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
};

use crate::{
    error::{LookupError, SendError, TranslationError},
    events::{DndAction, DndEvent, Reply},
    target::{DropTarget, DropTargetHandler, XDND_VERSION},
    window_system::WindowSystem,
};

// Properties can in principle be larger, but anything beyond this is not a
// plausible type list or text payload.
const MAX_PROPERTY_LEN: u32 = 0x1fffffff;

#[allow(missing_docs)]
mod atoms {
    x11rb::atom_manager! {
        /// Atoms used by the XDND message family.
        pub Atoms:
        AtomsCookie {
            // target capability
            XdndAware,

            // source -> target properties and the payload slot
            XdndTypeList,
            XdndSelection,

            // client messages
            XdndEnter,
            XdndPosition,
            XdndStatus,
            XdndLeave,
            XdndDrop,
            XdndFinished,

            // actions
            XdndActionCopy,
            XdndActionMove,
            XdndActionLink,
            XdndActionAsk,
            XdndActionPrivate,
        }
    }
}
pub use self::atoms::Atoms;

impl DndAction {
    /// Atom naming this action.
    pub fn to_atom(self, atoms: &Atoms) -> Atom {
        match self {
            DndAction::Copy => atoms.XdndActionCopy,
            DndAction::Move => atoms.XdndActionMove,
            DndAction::Link => atoms.XdndActionLink,
            DndAction::Ask => atoms.XdndActionAsk,
            DndAction::None => AtomEnum::NONE.into(),
        }
    }
}

fn encode_reply(window: Window, atoms: &Atoms, reply: Reply) -> (Atom, [u32; 5]) {
    match reply {
        Reply::Status { accept, action } => (
            atoms.XdndStatus,
            [window, accept as u32, 0, 0, action.to_atom(atoms)],
        ),
        Reply::Finished { accepted, action } => (
            atoms.XdndFinished,
            [window, accepted as u32, action.to_atom(atoms), 0, 0],
        ),
    }
}

/// [`WindowSystem`] implementation over an x11rb connection.
///
/// Owns the interned protocol atoms and knows the window it acts for.
/// Construction announces drop-target capability by writing the `XdndAware`
/// property (version 5) on that window; sources will not start a negotiation
/// without it.
#[derive(Debug)]
pub struct X11WindowSystem {
    conn: Arc<RustConnection>,
    atoms: Atoms,
    root: Window,
    window: Window,
}

impl X11WindowSystem {
    /// Attach to `window` and announce it as XDND-aware.
    pub fn new(conn: Arc<RustConnection>, root: Window, window: Window) -> Result<Self, ReplyOrIdError> {
        let atoms = Atoms::new(&*conn)?.reply()?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.XdndAware,
            AtomEnum::ATOM,
            &[XDND_VERSION],
        )?;
        conn.flush()?;

        debug!(window, "Announced XdndAware");

        Ok(X11WindowSystem {
            conn,
            atoms,
            root,
            window,
        })
    }

    /// The interned XDND atoms.
    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    /// The window this target acts for.
    pub fn window(&self) -> Window {
        self.window
    }
}

impl WindowSystem for X11WindowSystem {
    fn format_name(&self, format: Atom) -> Result<String, LookupError> {
        let reply = self.conn.get_atom_name(format)?.reply()?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn fetch_type_list(&self, source: Window) -> Result<Vec<Atom>, LookupError> {
        let reply = self
            .conn
            .get_property(
                false,
                source,
                self.atoms.XdndTypeList,
                AtomEnum::ATOM,
                0,
                MAX_PROPERTY_LEN,
            )?
            .reply()?;
        Ok(reply
            .value32()
            .map(|atoms| atoms.collect())
            .unwrap_or_default())
    }

    fn translate_root_coords(
        &self,
        root_x: i16,
        root_y: i16,
    ) -> Result<(i32, i32), TranslationError> {
        let reply = self
            .conn
            .translate_coordinates(self.root, self.window, root_x, root_y)?
            .reply()?;
        if !reply.same_screen {
            return Err(TranslationError::Unresolvable);
        }
        Ok((i32::from(reply.dst_x), i32::from(reply.dst_y)))
    }

    fn send_reply(&self, target: Window, reply: Reply) -> Result<(), SendError> {
        let (type_, data) = encode_reply(self.window, &self.atoms, reply);
        self.conn.send_event(
            false,
            target,
            EventMask::NO_EVENT,
            ClientMessageEvent::new(32, target, type_, data),
        )?;
        self.conn.flush()?;
        Ok(())
    }

    fn request_conversion(&self, format: Atom, timestamp: Timestamp) -> Result<(), SendError> {
        self.conn.convert_selection(
            self.window,
            self.atoms.XdndSelection,
            format,
            self.atoms.XdndSelection,
            timestamp,
        )?;
        self.conn.flush()?;
        Ok(())
    }

    fn fetch_payload(&self) -> Result<Vec<u8>, LookupError> {
        let reply = self
            .conn
            .get_property(
                false,
                self.window,
                self.atoms.XdndSelection,
                AtomEnum::ANY,
                0,
                MAX_PROPERTY_LEN,
            )?
            .reply()?;
        Ok(reply.value)
    }
}

impl DropTarget<X11WindowSystem> {
    /// Route one raw X11 event into the negotiation engine.
    ///
    /// Everything that is not an XDND client message or the payload-carrying
    /// `SelectionNotify` is ignored, so a window's whole event stream can be
    /// fed through here.
    pub fn dispatch_event<H: DropTargetHandler>(&mut self, handler: &mut H, event: &Event) {
        match event {
            Event::ClientMessage(msg) => {
                let atoms = *self.window_system().atoms();
                let decoded = if msg.type_ == atoms.XdndEnter {
                    Some(DndEvent::enter_from(msg.data))
                } else if msg.type_ == atoms.XdndPosition {
                    Some(DndEvent::position_from(msg.data))
                } else if msg.type_ == atoms.XdndDrop {
                    Some(DndEvent::drop_from(msg.data))
                } else if msg.type_ == atoms.XdndLeave {
                    Some(DndEvent::leave_from(msg.data))
                } else {
                    None
                };

                if let Some(event) = decoded {
                    trace!(?event, "Decoded XDND client message");
                    self.process(handler, event);
                }
            }
            Event::SelectionNotify(notify) => {
                // The fixed selection slot is the correlation key; anything
                // else is some other transfer.
                if notify.property != self.window_system().atoms().XdndSelection {
                    return;
                }
                let fetched = self.window_system().fetch_payload();
                match fetched {
                    Ok(data) => self.process(handler, DndEvent::Payload { data }),
                    Err(err) => warn!(?err, "Failed to read the drop payload"),
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atoms() -> Atoms {
        Atoms {
            XdndAware: 1,
            XdndTypeList: 2,
            XdndSelection: 3,
            XdndEnter: 4,
            XdndPosition: 5,
            XdndStatus: 6,
            XdndLeave: 7,
            XdndDrop: 8,
            XdndFinished: 9,
            XdndActionCopy: 10,
            XdndActionMove: 11,
            XdndActionLink: 12,
            XdndActionAsk: 13,
            XdndActionPrivate: 14,
        }
    }

    #[test]
    fn status_reply_encoding() {
        let atoms = atoms();
        let (type_, data) = encode_reply(
            42,
            &atoms,
            Reply::Status {
                accept: true,
                action: DndAction::Copy,
            },
        );
        assert_eq!(type_, atoms.XdndStatus);
        assert_eq!(data, [42, 1, 0, 0, atoms.XdndActionCopy]);
    }

    #[test]
    fn rejecting_status_names_no_action() {
        let atoms = atoms();
        let (_, data) = encode_reply(
            42,
            &atoms,
            Reply::Status {
                accept: false,
                action: DndAction::None,
            },
        );
        assert_eq!(data, [42, 0, 0, 0, 0]);
    }

    #[test]
    fn finished_reply_encoding() {
        let atoms = atoms();
        let (type_, data) = encode_reply(
            42,
            &atoms,
            Reply::Finished {
                accepted: true,
                action: DndAction::Copy,
            },
        );
        assert_eq!(type_, atoms.XdndFinished);
        assert_eq!(data, [42, 1, atoms.XdndActionCopy, 0, 0]);
    }
}
