//! Minimal XDND drop target: a bare window that accepts file drags and
//! prints the dropped URIs.
//!
//! Run with `cargo run --example drop_target`, then drag a file from any
//! file manager onto the window. Press a key inside the window to quit.

use std::sync::Arc;

use calloop::{EventLoop, LoopSignal};
use x11rb::{
    connection::Connection as _,
    protocol::{
        xproto::{ConnectionExt as _, CreateWindowAux, EventMask, WindowClass},
        Event,
    },
    COPY_DEPTH_FROM_PARENT,
};
use xdnd_target::{
    x11::{X11Source, X11WindowSystem},
    DropTarget, DropTargetHandler,
};

struct App;

impl DropTargetHandler for App {
    fn drag_motion(&mut self, x: i32, y: i32) {
        println!("drag at {x} {y}");
    }

    fn payload_received(&mut self, data: Vec<u8>) {
        println!("dropped: {}", String::from_utf8_lossy(&data));
    }
}

struct State {
    target: DropTarget<X11WindowSystem>,
    app: App,
    signal: LoopSignal,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (conn, screen_num) = x11rb::connect(None)?;
    let conn = Arc::new(conn);
    let screen = &conn.setup().roots[screen_num];

    let window = conn.generate_id()?;
    conn.create_window(
        COPY_DEPTH_FROM_PARENT,
        window,
        screen.root,
        10,
        10,
        200,
        200,
        1,
        WindowClass::INPUT_OUTPUT,
        screen.root_visual,
        &CreateWindowAux::new().event_mask(EventMask::EXPOSURE | EventMask::KEY_PRESS),
    )?;
    conn.map_window(window)?;
    conn.flush()?;

    let close_type = conn.intern_atom(false, b"_DROP_TARGET_CLOSE")?.reply()?.atom;
    let ws = X11WindowSystem::new(conn.clone(), screen.root, window)?;

    let mut event_loop: EventLoop<State> = EventLoop::try_new()?;
    event_loop.handle().insert_source(
        X11Source::new(conn, window, close_type),
        |event, _, state| {
            if let Event::KeyPress(_) = event {
                state.signal.stop();
                return;
            }
            state.target.dispatch_event(&mut state.app, &event);
        },
    )?;

    let mut state = State {
        target: DropTarget::new(ws),
        app: App,
        signal: event_loop.get_signal(),
    };
    event_loop.run(None, &mut state, |_| {})?;

    Ok(())
}
