//! The drop-target negotiation engine.
//!
//! [`DropTarget`] drives the Enter → Position → Drop/Leave → Finished message
//! flow for one window. Inbound messages arrive one at a time as
//! [`DndEvent`]s and are processed synchronously to completion; the engine
//! mutates the single optional [`DragSession`] and hands zero or more replies
//! to the [`WindowSystem`] collaborator. There is no other shared state and
//! no concurrency: suspension only ever happens at the caller's event-wait
//! boundary.
//!
//! Anomalies never abort the engine. An unsupported peer version, a failed
//! name lookup or coordinate translation, and any message that does not fit
//! the current state all degrade to "message dropped, no reply, state
//! unchanged", which keeps the negotiation live for the next message.

mod session;

pub use session::{DragSession, SessionState};

use tracing::{debug, trace, warn};
use x11rb::protocol::xproto::{Atom, Timestamp, Window};
use x11rb::CURRENT_TIME;

use crate::events::{DndAction, DndEvent, Reply};
use crate::format::FormatRegistry;
use crate::window_system::WindowSystem;

/// Highest protocol version this target speaks.
///
/// A gesture advertising a higher version is ignored entirely: no session is
/// opened and no reply is ever produced for it.
pub const XDND_VERSION: u32 = 5;

/// Handler trait for drop-target interactions.
///
/// This is the application-facing side of the engine; everything the
/// negotiation surfaces goes through these callbacks.
pub trait DropTargetHandler {
    /// The gesture moved to `(x, y)` in target-window coordinates.
    fn drag_motion(&mut self, x: i32, y: i32) {
        let _ = (x, y);
    }

    /// The drop payload arrived.
    ///
    /// The bytes are opaque to the protocol. For the default format set they
    /// are a `text/uri-list` or `text/plain` payload exactly as the source
    /// produced it; interpreting them belongs to the application.
    fn payload_received(&mut self, data: Vec<u8>);
}

/// Drop-target side of one window's drag-and-drop negotiation.
#[derive(Debug)]
pub struct DropTarget<W: WindowSystem> {
    ws: W,
    registry: FormatRegistry,
    session: Option<DragSession>,
}

impl<W: WindowSystem> DropTarget<W> {
    /// Create a drop target accepting the default formats.
    pub fn new(ws: W) -> Self {
        Self::with_registry(ws, FormatRegistry::default())
    }

    /// Create a drop target with a custom format registry.
    pub fn with_registry(ws: W, registry: FormatRegistry) -> Self {
        DropTarget {
            ws,
            registry,
            session: None,
        }
    }

    /// The windowing collaborator this target drives.
    pub fn window_system(&self) -> &W {
        &self.ws
    }

    /// The in-flight gesture, if any.
    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Process one inbound protocol message to completion.
    pub fn process<H: DropTargetHandler>(&mut self, handler: &mut H, event: DndEvent) {
        match event {
            DndEvent::Enter {
                source,
                version,
                wants_type_list,
                candidates,
            } => self.handle_enter(source, version, wants_type_list, &candidates),
            DndEvent::Position {
                source,
                root_x,
                root_y,
            } => self.handle_position(handler, source, root_x, root_y),
            DndEvent::Drop { source, timestamp } => self.handle_drop(source, timestamp),
            DndEvent::Leave { source } => self.handle_leave(source),
            DndEvent::Payload { data } => self.handle_payload(handler, data),
        }
    }

    fn handle_enter(&mut self, source: Window, version: u32, wants_type_list: bool, inline: &[Atom]) {
        trace!(source, version, wants_type_list, "Got XdndEnter");

        if version > XDND_VERSION {
            warn!(version, "Unsupported XDND version, ignoring gesture");
            return;
        }

        let fetched;
        let candidates = if wants_type_list {
            fetched = match self.ws.fetch_type_list(source) {
                Ok(list) => list,
                Err(err) => {
                    warn!(?err, "Failed to read XdndTypeList, dropping XdndEnter");
                    return;
                }
            };
            &fetched[..]
        } else {
            inline
        };

        let format = match self
            .registry
            .select(candidates, |atom| self.ws.format_name(atom))
        {
            Ok(format) => format,
            Err(err) => {
                warn!(?err, "Failed to resolve format names, dropping XdndEnter");
                return;
            }
        };

        if let Some(old) = &self.session {
            debug!(
                old_source = old.source(),
                "New XdndEnter replaces the open gesture"
            );
        }

        trace!(?format, "Negotiated drop format");
        self.session = Some(DragSession::new(source, version, format));
    }

    fn handle_position<H: DropTargetHandler>(
        &mut self,
        handler: &mut H,
        source: Window,
        root_x: i16,
        root_y: i16,
    ) {
        let Some(session) = self.session.as_mut() else {
            debug!(source, "XdndPosition without an open gesture, ignoring");
            return;
        };

        // The version is fixed at Enter, which already enforces the ceiling;
        // the check is re-applied to each message anyway.
        if session.version() > XDND_VERSION {
            return;
        }

        match session.state {
            SessionState::Negotiating | SessionState::Armed => {}
            SessionState::AwaitingPayload => {
                debug!(source, "XdndPosition after the drop, ignoring");
                return;
            }
        }

        if session.source() != source {
            debug!(
                got = source,
                expected = session.source(),
                "XdndPosition from unknown source, ignoring"
            );
            return;
        }

        let (x, y) = match self.ws.translate_root_coords(root_x, root_y) {
            Ok(pos) => pos,
            Err(err) => {
                warn!(?err, "Failed to translate drop coordinates, dropping XdndPosition");
                return;
            }
        };
        handler.drag_motion(x, y);

        let accept = session.format().is_some();
        let action = if accept && session.version() >= 2 {
            DndAction::Copy
        } else {
            DndAction::None
        };
        if let Err(err) = self.ws.send_reply(source, Reply::Status { accept, action }) {
            warn!(?err, "Failed to send XdndStatus");
        }
        session.state = SessionState::Armed;
    }

    fn handle_drop(&mut self, source: Window, timestamp: Timestamp) {
        let Some(session) = self.session.as_mut() else {
            debug!(source, "XdndDrop without an open gesture, ignoring");
            return;
        };

        match session.state {
            SessionState::Armed => {}
            SessionState::Negotiating | SessionState::AwaitingPayload => {
                debug!(state = ?session.state, "XdndDrop outside an answered gesture, ignoring");
                return;
            }
        }

        if session.source() != source {
            debug!(
                got = source,
                expected = session.source(),
                "XdndDrop from unknown source, ignoring"
            );
            return;
        }

        trace!(source, timestamp, "Got XdndDrop");

        if let Some(format) = session.format() {
            // Version 0 messages carry no timestamp; the conversion request
            // falls back to the CURRENT_TIME sentinel.
            if session.version() >= 1 {
                session.record_drop_timestamp(timestamp);
            }
            let time = session.drop_timestamp().unwrap_or(CURRENT_TIME);
            if let Err(err) = self.ws.request_conversion(format, time) {
                warn!(?err, "Failed to request selection conversion");
            }
            session.state = SessionState::AwaitingPayload;
        } else {
            // Below version 2 the source has no Finished handshake to hear.
            if session.version() >= 2 {
                if let Err(err) = self.ws.send_reply(
                    source,
                    Reply::Finished {
                        accepted: false,
                        action: DndAction::None,
                    },
                ) {
                    warn!(?err, "Failed to send XdndFinished");
                }
            }
            self.session = None;
        }
    }

    fn handle_leave(&mut self, source: Window) {
        match self.session.take() {
            Some(session) if session.source() == source => {
                trace!(source, "Got XdndLeave, discarding gesture");
            }
            Some(session) => {
                debug!(
                    got = source,
                    expected = session.source(),
                    "XdndLeave from unknown source, ignoring"
                );
                self.session = Some(session);
            }
            None => {
                debug!(source, "XdndLeave without an open gesture, ignoring");
            }
        }
    }

    fn handle_payload<H: DropTargetHandler>(&mut self, handler: &mut H, data: Vec<u8>) {
        let Some(session) = self.session.take() else {
            debug!("Payload delivery without a pending drop, ignoring");
            return;
        };
        if session.state != SessionState::AwaitingPayload {
            debug!(state = ?session.state, "Payload delivery outside a pending drop, ignoring");
            self.session = Some(session);
            return;
        }

        trace!(len = data.len(), "Drop payload delivered");
        if data.is_empty() {
            debug!("Empty drop payload, nothing to surface");
        } else {
            handler.payload_received(data);
        }

        // The source is told the drop succeeded even when the payload was
        // empty; see the crate documentation on protocol quirks.
        if session.version() >= 2 {
            if let Err(err) = self.ws.send_reply(
                session.source(),
                Reply::Finished {
                    accepted: true,
                    action: DndAction::Copy,
                },
            ) {
                warn!(?err, "Failed to send XdndFinished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::error::{LookupError, SendError, TranslationError};

    const SOURCE: Window = 0x0070_0001;
    const OTHER_SOURCE: Window = 0x0070_0002;
    const URI_LIST: Atom = 100;
    const PLAIN: Atom = 101;
    const OCTET_STREAM: Atom = 102;

    #[derive(Default)]
    struct MockWindowSystem {
        names: HashMap<Atom, &'static str>,
        type_list: Vec<Atom>,
        translate_fails: bool,
        replies: RefCell<Vec<(Window, Reply)>>,
        conversions: RefCell<Vec<(Atom, Timestamp)>>,
    }

    impl MockWindowSystem {
        fn new() -> Self {
            let mut names = HashMap::new();
            names.insert(URI_LIST, "text/uri-list");
            names.insert(PLAIN, "text/plain");
            names.insert(OCTET_STREAM, "application/octet-stream");
            MockWindowSystem {
                names,
                ..Default::default()
            }
        }
    }

    impl WindowSystem for MockWindowSystem {
        fn format_name(&self, format: Atom) -> Result<String, LookupError> {
            self.names
                .get(&format)
                .map(|name| (*name).to_string())
                .ok_or(LookupError::UnknownFormat(format))
        }

        fn fetch_type_list(&self, _source: Window) -> Result<Vec<Atom>, LookupError> {
            Ok(self.type_list.clone())
        }

        fn translate_root_coords(
            &self,
            root_x: i16,
            root_y: i16,
        ) -> Result<(i32, i32), TranslationError> {
            if self.translate_fails {
                Err(TranslationError::Unresolvable)
            } else {
                Ok((i32::from(root_x) - 10, i32::from(root_y) - 10))
            }
        }

        fn send_reply(&self, target: Window, reply: Reply) -> Result<(), SendError> {
            self.replies.borrow_mut().push((target, reply));
            Ok(())
        }

        fn request_conversion(&self, format: Atom, timestamp: Timestamp) -> Result<(), SendError> {
            self.conversions.borrow_mut().push((format, timestamp));
            Ok(())
        }

        fn fetch_payload(&self) -> Result<Vec<u8>, LookupError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct Sink {
        motions: Vec<(i32, i32)>,
        payloads: Vec<Vec<u8>>,
    }

    impl DropTargetHandler for Sink {
        fn drag_motion(&mut self, x: i32, y: i32) {
            self.motions.push((x, y));
        }

        fn payload_received(&mut self, data: Vec<u8>) {
            self.payloads.push(data);
        }
    }

    fn target() -> DropTarget<MockWindowSystem> {
        DropTarget::new(MockWindowSystem::new())
    }

    fn enter(version: u32, candidates: &[Atom]) -> DndEvent {
        DndEvent::Enter {
            source: SOURCE,
            version,
            wants_type_list: false,
            candidates: candidates.iter().copied().collect(),
        }
    }

    fn position(root_x: i16, root_y: i16) -> DndEvent {
        DndEvent::Position {
            source: SOURCE,
            root_x,
            root_y,
        }
    }

    fn drop_at(timestamp: Timestamp) -> DndEvent {
        DndEvent::Drop {
            source: SOURCE,
            timestamp,
        }
    }

    fn replies(target: &DropTarget<MockWindowSystem>) -> Vec<(Window, Reply)> {
        target.window_system().replies.borrow().clone()
    }

    fn conversions(target: &DropTarget<MockWindowSystem>) -> Vec<(Atom, Timestamp)> {
        target.window_system().conversions.borrow().clone()
    }

    #[test]
    fn unsupported_version_stays_silent() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(6, &[URI_LIST]));
        assert!(target.session().is_none());

        target.process(&mut sink, position(50, 60));
        target.process(&mut sink, drop_at(1));
        target.process(&mut sink, DndEvent::Leave { source: SOURCE });

        assert!(replies(&target).is_empty());
        assert!(conversions(&target).is_empty());
    }

    #[test]
    fn format_is_fixed_at_enter() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        assert_eq!(target.session().unwrap().format(), Some(URI_LIST));

        target.process(&mut sink, position(50, 60));
        target.process(&mut sink, position(51, 61));
        assert_eq!(target.session().unwrap().format(), Some(URI_LIST));

        target.process(&mut sink, drop_at(99));
        assert_eq!(conversions(&target), vec![(URI_LIST, 99)]);
    }

    #[test]
    fn first_acceptable_candidate_wins() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[PLAIN, URI_LIST]));
        assert_eq!(target.session().unwrap().format(), Some(PLAIN));
    }

    #[test]
    fn type_list_is_fetched_when_flagged() {
        let mut ws = MockWindowSystem::new();
        ws.type_list = vec![OCTET_STREAM, URI_LIST];
        let mut target = DropTarget::new(ws);
        let mut sink = Sink::default();

        target.process(
            &mut sink,
            DndEvent::Enter {
                source: SOURCE,
                version: 2,
                wants_type_list: true,
                candidates: Default::default(),
            },
        );
        assert_eq!(target.session().unwrap().format(), Some(URI_LIST));
    }

    #[test]
    fn rejected_drop_finishes_unaccepted() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[OCTET_STREAM]));
        assert_eq!(target.session().unwrap().format(), None);

        target.process(&mut sink, position(50, 60));
        assert_eq!(
            replies(&target),
            vec![(
                SOURCE,
                Reply::Status {
                    accept: false,
                    action: DndAction::None,
                }
            )]
        );

        target.process(&mut sink, drop_at(1));
        assert_eq!(
            replies(&target)[1],
            (
                SOURCE,
                Reply::Finished {
                    accepted: false,
                    action: DndAction::None,
                }
            )
        );
        assert!(target.session().is_none());
        assert!(conversions(&target).is_empty());
    }

    #[test]
    fn rejected_drop_below_handshake_version_is_silent() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(1, &[OCTET_STREAM]));
        target.process(&mut sink, position(50, 60));
        let before = replies(&target).len();

        target.process(&mut sink, drop_at(1));
        assert_eq!(replies(&target).len(), before);
        assert!(target.session().is_none());
    }

    #[test]
    fn leave_resets_silently_from_any_state() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));
        target.process(&mut sink, drop_at(1));
        let before = replies(&target).len();

        target.process(&mut sink, DndEvent::Leave { source: SOURCE });
        assert!(target.session().is_none());
        assert_eq!(replies(&target).len(), before);
    }

    #[test]
    fn uri_list_round_trip() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));

        assert_eq!(sink.motions, vec![(40, 50)]);
        assert_eq!(
            replies(&target),
            vec![(
                SOURCE,
                Reply::Status {
                    accept: true,
                    action: DndAction::Copy,
                }
            )]
        );

        target.process(&mut sink, drop_at(1234));
        assert_eq!(conversions(&target), vec![(URI_LIST, 1234)]);
        assert_eq!(
            target.session().unwrap().state(),
            SessionState::AwaitingPayload
        );

        target.process(
            &mut sink,
            DndEvent::Payload {
                data: b"file:///tmp/a.txt".to_vec(),
            },
        );
        assert_eq!(sink.payloads, vec![b"file:///tmp/a.txt".to_vec()]);
        assert_eq!(
            replies(&target)[1],
            (
                SOURCE,
                Reply::Finished {
                    accepted: true,
                    action: DndAction::Copy,
                }
            )
        );
        assert!(target.session().is_none());
    }

    #[test]
    fn version_zero_drop_uses_the_current_time_sentinel() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(0, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));
        target.process(&mut sink, drop_at(555));

        assert_eq!(conversions(&target), vec![(URI_LIST, CURRENT_TIME)]);
        assert_eq!(target.session().unwrap().drop_timestamp(), None);
    }

    #[test]
    fn repeated_positions_repeat_the_status_reply() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));
        target.process(&mut sink, position(50, 60));

        assert_eq!(replies(&target).len(), 2);
        assert_eq!(replies(&target)[0], replies(&target)[1]);
    }

    #[test]
    fn translation_failure_drops_the_message() {
        let mut ws = MockWindowSystem::new();
        ws.translate_fails = true;
        let mut target = DropTarget::new(ws);
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));

        assert!(sink.motions.is_empty());
        assert!(replies(&target).is_empty());
        assert_eq!(target.session().unwrap().state(), SessionState::Negotiating);
    }

    #[test]
    fn empty_payload_is_not_surfaced_but_still_finishes() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));
        target.process(&mut sink, drop_at(1));
        target.process(&mut sink, DndEvent::Payload { data: Vec::new() });

        assert!(sink.payloads.is_empty());
        assert_eq!(
            replies(&target)[1],
            (
                SOURCE,
                Reply::Finished {
                    accepted: true,
                    action: DndAction::Copy,
                }
            )
        );
        assert!(target.session().is_none());
    }

    #[test]
    fn stray_payload_is_ignored() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(
            &mut sink,
            DndEvent::Payload {
                data: b"file:///tmp/a.txt".to_vec(),
            },
        );
        assert!(sink.payloads.is_empty());
        assert!(replies(&target).is_empty());
    }

    #[test]
    fn drop_before_any_position_is_ignored() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, drop_at(1));

        assert!(conversions(&target).is_empty());
        assert_eq!(target.session().unwrap().state(), SessionState::Negotiating);
    }

    #[test]
    fn new_enter_replaces_the_open_gesture() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));

        target.process(
            &mut sink,
            DndEvent::Enter {
                source: OTHER_SOURCE,
                version: 2,
                wants_type_list: false,
                candidates: [PLAIN].into_iter().collect(),
            },
        );

        let session = target.session().unwrap();
        assert_eq!(session.source(), OTHER_SOURCE);
        assert_eq!(session.format(), Some(PLAIN));
        assert_eq!(session.state(), SessionState::Negotiating);
    }

    #[test]
    fn failed_name_lookup_leaves_state_unchanged() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));

        // 999 is not in the mock's atom table.
        target.process(
            &mut sink,
            DndEvent::Enter {
                source: OTHER_SOURCE,
                version: 2,
                wants_type_list: false,
                candidates: [999].into_iter().collect(),
            },
        );

        let session = target.session().unwrap();
        assert_eq!(session.source(), SOURCE);
        assert_eq!(session.state(), SessionState::Armed);
    }

    #[test]
    fn messages_from_an_unknown_source_are_ignored() {
        let mut target = target();
        let mut sink = Sink::default();

        target.process(&mut sink, enter(2, &[URI_LIST]));
        target.process(&mut sink, position(50, 60));

        target.process(
            &mut sink,
            DndEvent::Leave {
                source: OTHER_SOURCE,
            },
        );
        assert!(target.session().is_some());

        target.process(
            &mut sink,
            DndEvent::Drop {
                source: OTHER_SOURCE,
                timestamp: 1,
            },
        );
        assert!(conversions(&target).is_empty());
    }
}
