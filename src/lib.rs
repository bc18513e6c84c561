#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # xdnd-target: the receiving half of X drag-and-drop
//!
//! This crate implements the drop-target side of the XDND protocol: the
//! negotiation a window goes through when a drag gesture from another X11
//! client moves over it. The protocol has no direct interface between the two
//! processes; everything is carried over X11 primitives — atoms, client
//! messages, window properties and a selection transfer borrowed from
//! clipboard handling.
//!
//! ## Structure of the crate
//!
//! - [`target`] contains the negotiation engine: [`DropTarget`] drives the
//!   Enter → Position → Drop/Leave → Finished message flow over a single
//!   optional [`DragSession`], and [`DropTargetHandler`] is the seam through
//!   which positions and payloads reach your application.
//! - [`format`] decides which advertised payload formats the target takes
//!   ([`FormatRegistry`], by default `text/uri-list` and `text/plain`).
//! - [`window_system`] is the seam to the host windowing system; the engine
//!   only ever talks to a [`WindowSystem`].
//! - [`x11`] backs that seam with a real x11rb connection
//!   ([`X11WindowSystem`](x11::X11WindowSystem)) and integrates it with a
//!   [`calloop`] event loop ([`X11Source`](x11::X11Source)).
//!
//! ## Driving the engine
//!
//! Feed your window's event stream through
//! [`DropTarget::dispatch_event`](target::DropTarget::dispatch_event);
//! everything that is not an XDND message is ignored.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use x11rb::connection::Connection as _;
//! use xdnd_target::{x11::X11WindowSystem, DropTarget, DropTargetHandler};
//!
//! struct App;
//!
//! impl DropTargetHandler for App {
//!     fn payload_received(&mut self, data: Vec<u8>) {
//!         println!("dropped: {}", String::from_utf8_lossy(&data));
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (conn, screen_num) = x11rb::connect(None)?;
//!     let conn = Arc::new(conn);
//!     let screen = &conn.setup().roots[screen_num];
//!     // `window` is any InputOutput window you created and mapped.
//!     # let window = 0;
//!
//!     let ws = X11WindowSystem::new(conn.clone(), screen.root, window)?;
//!     let mut target = DropTarget::new(ws);
//!     let mut app = App;
//!
//!     loop {
//!         let event = conn.wait_for_event()?;
//!         target.dispatch_event(&mut app, &event);
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! This crate uses [`tracing`] for its internal logging: `trace!` for decoded
//! message dumps, `debug!` for messages that are ignored on purpose and
//! `warn!` for collaborator failures. No failure is fatal to the negotiation;
//! anything anomalous degrades to "no reply sent, state unchanged".

pub mod error;
pub mod events;
pub mod format;
pub mod target;
pub mod window_system;
pub mod x11;

pub use error::{LookupError, SendError, TranslationError};
pub use events::{DndAction, DndEvent, Reply};
pub use format::FormatRegistry;
pub use target::{DragSession, DropTarget, DropTargetHandler, SessionState, XDND_VERSION};
pub use window_system::WindowSystem;
