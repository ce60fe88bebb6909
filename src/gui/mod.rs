//! A simple, high-level GUI for presenting frames.
//!
//! The windowing event loop has to own the main thread, so [`run`] starts it there and moves the
//! application code to a second thread. Frames travel to the event loop through an
//! [`EventLoopProxy`]; keyboard input travels back through a channel read by [`poll_input`].

mod renderer;

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Mutex, OnceLock,
    },
    time::Duration,
};

use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy},
    window::WindowId,
};

use crate::{
    app::FrameSink,
    image::{Image, Resolution},
};

use self::renderer::{Gpu, Renderer, Window};

/// Keyboard and window input forwarded from the event loop to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A character was typed.
    Char(char),
    /// The escape key was pressed.
    Escape,
    /// The user asked to close a window.
    CloseRequested,
}

impl Input {
    /// Returns whether this input asks the application to quit (`q`, `Q`, escape, or closing the
    /// window).
    pub fn is_exit(&self) -> bool {
        match self {
            Input::Char(c) => matches!(c, 'q' | 'Q' | '\u{1b}'),
            Input::Escape | Input::CloseRequested => true,
        }
    }
}

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    input: Sender<Input>,
}

impl Gui {
    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { key, res, data }) => {
                    if !self.windows.contains_key(&key) {
                        log::debug!("creating window '{key}' at {res}");
                        let renderer = Window::open(target, &key, res)
                            .and_then(|win| Renderer::new(win, self.gpu.clone()));
                        match renderer {
                            Ok(renderer) => {
                                self.win_id_to_key.insert(renderer.window().id(), key.clone());
                                self.windows.insert(key.clone(), renderer);
                            }
                            Err(e) => {
                                log::error!("failed to open window '{key}': {e:?}");
                                return;
                            }
                        }
                    }

                    if let Some(renderer) = self.windows.get_mut(&key) {
                        renderer.update_texture(res, &data);
                        renderer.window().request_redraw();
                    }
                }
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self
                        .win_id_to_key
                        .get(&window)
                        .and_then(|key| self.windows.get_mut(key))
                    {
                        renderer.redraw();
                    }
                }
                Event::WindowEvent { event, .. } => {
                    let input = match event {
                        WindowEvent::CloseRequested => Input::CloseRequested,
                        WindowEvent::ReceivedCharacter(c) => Input::Char(c),
                        WindowEvent::KeyboardInput {
                            input:
                                KeyboardInput {
                                    state: ElementState::Pressed,
                                    virtual_keycode: Some(VirtualKeyCode::Escape),
                                    ..
                                },
                            ..
                        } => Input::Escape,
                        _ => return,
                    };
                    log::trace!("input: {input:?}");
                    // The application thread may already be gone.
                    self.input.send(input).ok();
                }
                _ => {}
            }
        });
    }
}

#[derive(Debug)]
enum Msg {
    Image {
        key: String,
        res: Resolution,
        data: Vec<u8>,
    },
}

static PROXY: OnceLock<Mutex<EventLoopProxy<Msg>>> = OnceLock::new();
static INPUT: OnceLock<Mutex<Receiver<Input>>> = OnceLock::new();

fn send(msg: Msg) {
    let Some(proxy) = PROXY.get() else {
        log::warn!("GUI is not running, dropping frame");
        return;
    };
    let proxy = proxy.lock().unwrap_or_else(|e| e.into_inner());
    if proxy.send_event(msg).is_err() {
        log::debug!("event loop closed, dropping frame");
    }
}

/// Starts the GUI event loop on the current thread and runs `cb` on a new thread.
///
/// This must be called from the main thread, and never returns. The process exits when `cb`
/// finishes: with status 0 if it returned `Ok`, 1 if it returned an error (which is logged first),
/// and 101 if it panicked.
pub fn run<F>(cb: F) -> !
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let (input_tx, input_rx) = mpsc::channel();
    if PROXY.set(Mutex::new(event_loop.create_proxy())).is_err()
        || INPUT.set(Mutex::new(input_rx)).is_err()
    {
        log::error!("GUI already initialized");
        process::exit(1);
    }

    // Library is now initialized; spawn another thread to run the application code.
    std::thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(cb));
        match result {
            Ok(Ok(())) => process::exit(0),
            Ok(Err(e)) => {
                log::error!("{e:?}");
                process::exit(1);
            }
            Err(_payload) => {
                // Panic handler has printed the panic message and backtrace already, exit with 101
                // to mimic libstd behavior.
                process::exit(101);
            }
        }
    });

    let gpu = match pollster::block_on(Gpu::open()) {
        Ok(gpu) => gpu,
        Err(e) => {
            log::error!("failed to open GPU: {e:?}");
            process::exit(1);
        }
    };
    let gui = Gui {
        gpu: Rc::new(gpu),
        windows: HashMap::new(),
        win_id_to_key: HashMap::new(),
        input: input_tx,
    };
    gui.run(event_loop);
}

/// Displays an image in the window titled `key`, opening it on first use.
///
/// The window has the size of the first image shown in it.
pub fn show_image(key: impl Into<String>, image: &Image) {
    // Image data is RGBA8 internally so that no conversion before GPU upload is needed.
    send(Msg::Image {
        key: key.into(),
        res: image.resolution(),
        data: image.data().to_vec(),
    });
}

/// Waits up to `timeout` for the next input event from any window.
///
/// Returns `None` if no input arrived in time, or if the GUI is not running.
pub fn poll_input(timeout: Duration) -> Option<Input> {
    let rx = INPUT.get()?.lock().unwrap_or_else(|e| e.into_inner());
    match rx.recv_timeout(timeout) {
        Ok(input) => Some(input),
        Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
    }
}

/// A [`FrameSink`] presenting frames in a GUI window.
pub struct Screen {
    title: String,
}

impl Screen {
    /// Time to wait for a key press after each presented frame.
    const KEY_POLL: Duration = Duration::from_millis(1);

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl FrameSink for Screen {
    fn present(&mut self, frame: &Image) {
        show_image(self.title.as_str(), frame);
    }

    fn poll_exit(&mut self) -> bool {
        let mut exit = false;
        let mut timeout = Self::KEY_POLL;
        // Drain everything that queued up while the frame was being processed.
        while let Some(input) = poll_input(timeout) {
            exit |= input.is_exit();
            timeout = Duration::ZERO;
        }
        exit
    }
}
