//! x11rb event-source integration for calloop.

use std::{
    io::{Error as IOError, ErrorKind, Result as IOResult},
    sync::Arc,
    thread::{spawn, JoinHandle},
};

use calloop::{
    channel::{sync_channel, Channel, Event as ChannelEvent, SyncSender},
    EventSource, Poll, PostAction, Readiness, Token, TokenFactory,
};
use tracing::{error, warn};
use x11rb::{
    connection::Connection as _,
    protocol::{
        xproto::{Atom, ClientMessageEvent, ConnectionExt as _, EventMask, Window, CLIENT_MESSAGE_EVENT},
        Event,
    },
    rust_connection::RustConnection,
};

/// Calloop event source for an x11rb connection.
///
/// This is a thin wrapper around a calloop [`Channel`]: a dedicated thread
/// blocks in `wait_for_event` and forwards everything across the channel.
///
/// The extra thread is necessary because readability of the underlying socket
/// is not a reliable wakeup signal with x11rb: sending a request or waiting
/// for a reply can itself drain events into the connection's internal buffer,
/// and calloop only wakes on "an FD became readable". See [1] for details.
///
/// [1]: https://docs.rs/x11rb/latest/x11rb/event_loop_integration/index.html#threads-and-races
#[derive(Debug)]
pub struct X11Source {
    connection: Arc<RustConnection>,
    channel: Option<Channel<Event>>,
    event_thread: Option<JoinHandle<()>>,
    close_window: Window,
    close_type: Atom,
}

impl X11Source {
    /// Create a new X11 source.
    ///
    /// On drop, a `ClientMessageEvent` of type `close_type` is sent to
    /// `close_window` so the reader thread wakes up, notices the channel is
    /// gone and exits. The expectation is that `close_window` is a window
    /// created by the caller and `close_type` a private atom.
    pub fn new(connection: Arc<RustConnection>, close_window: Window, close_type: Atom) -> Self {
        let (sender, channel) = sync_channel(5);
        let conn = Arc::clone(&connection);
        let event_thread = Some(spawn(move || {
            run_event_thread(conn, sender);
        }));

        Self {
            connection,
            channel: Some(channel),
            event_thread,
            close_window,
            close_type,
        }
    }
}

impl Drop for X11Source {
    fn drop(&mut self) {
        // Signal the reader thread to exit by dropping the read end of the
        // channel, then wake it up so it actually notices.
        self.channel.take();

        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 8,
            sequence: 0,
            window: self.close_window,
            type_: self.close_type,
            data: [0; 20].into(),
        };

        let _ = self
            .connection
            .send_event(false, self.close_window, EventMask::NO_EVENT, event);
        let _ = self.connection.flush();

        self.event_thread.take().map(|handle| handle.join());
    }
}

impl EventSource for X11Source {
    type Event = Event;
    type Metadata = ();
    type Ret = ();
    type Error = std::io::Error;

    fn process_events<C>(
        &mut self,
        readiness: Readiness,
        token: Token,
        mut callback: C,
    ) -> IOResult<PostAction>
    where
        C: FnMut(Self::Event, &mut Self::Metadata) -> Self::Ret,
    {
        if let Some(channel) = &mut self.channel {
            channel
                .process_events(readiness, token, move |event, meta| match event {
                    ChannelEvent::Closed => warn!("X11 event thread exited"),
                    ChannelEvent::Msg(event) => callback(event, meta),
                })
                .map_err(|err| IOError::new(ErrorKind::Other, err))
        } else {
            Ok(PostAction::Remove)
        }
    }

    fn register(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        if let Some(channel) = &mut self.channel {
            channel.register(poll, factory)?;
        }

        Ok(())
    }

    fn reregister(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        if let Some(channel) = &mut self.channel {
            channel.reregister(poll, factory)?;
        }

        Ok(())
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        if let Some(channel) = &mut self.channel {
            channel.unregister(poll)?;
        }

        Ok(())
    }
}

/// Reads X11 events off the connection and sends them down the channel.
///
/// `wait_for_event` is the only integration point x11rb guarantees not to
/// miss wakeups on, so this blocks here instead of polling the socket.
fn run_event_thread(connection: Arc<RustConnection>, sender: SyncSender<Event>) {
    loop {
        let event = match connection.wait_for_event() {
            Ok(event) => event,
            Err(err) => {
                // Connection errors are most likely permanent; exit the thread.
                error!("X11 event thread exiting due to connection error: {err}");
                break;
            }
        };
        if sender.send(event).is_err() {
            // The receiving end was dropped; see X11Source::drop.
            break;
        }
    }
}
