//! GB WASM - host the emulator module in a browser
//!
//! The module is fetched, compiled and instantiated with the page's own
//! `WebAssembly` object. Its imports are closures over the shared
//! `gb-host` function table; frames go to registered canvases and guest
//! output to the browser console.

pub mod artifact;
pub mod canvas;
pub mod console;
pub mod engine;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gb_host::config::DEFAULT_ARTIFACT_URL;
use gb_host::{HostError, HostFunctionTable, InstanceManager, ModuleLoader, Session};
use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlCanvasElement;

pub use artifact::WebArtifact;
pub use canvas::CanvasRegistry;
pub use console::{WebClock, WebConsole};
pub use engine::{WebInstance, WebMemory, WebRuntime};

/// The shared instance handle for a browser-hosted module
pub type WebManager = InstanceManager<WebInstance>;

fn js_error(err: HostError) -> JsValue {
    JsError::new(&err.to_string()).into()
}

/// Instance manager fetching the module from `url`
pub fn instance_manager(url: &str, canvases: Rc<RefCell<CanvasRegistry>>) -> WebManager {
    let host = HostFunctionTable::with_parts(WebClock, WebConsole, canvases);
    let loader = ModuleLoader::new(WebArtifact::new(url), WebRuntime::new());
    InstanceManager::new(loader, host)
}

/// Game Boy host exposed to JavaScript
#[wasm_bindgen]
pub struct GbHost {
    manager: Rc<WebManager>,
    canvases: Rc<RefCell<CanvasRegistry>>,
    session: Rc<RefCell<Option<Session<WebInstance>>>>,
    frames: FrameLoop,
}

#[wasm_bindgen]
impl GbHost {
    /// Create a host for the module at `url` (the build's default when omitted)
    #[wasm_bindgen(constructor)]
    pub fn new(url: Option<String>) -> GbHost {
        let canvases = Rc::new(RefCell::new(CanvasRegistry::new()));
        let url = url.unwrap_or_else(|| DEFAULT_ARTIFACT_URL.to_string());
        Self {
            manager: Rc::new(instance_manager(&url, Rc::clone(&canvases))),
            canvases,
            session: Rc::new(RefCell::new(None)),
            frames: FrameLoop::new(),
        }
    }

    /// Present frames for `target` on `canvas`
    pub fn attach_canvas(&self, target: i32, canvas: HtmlCanvasElement) -> Result<(), JsError> {
        self.canvases
            .borrow_mut()
            .attach(target, &canvas)
            .map_err(|e| JsError::new(&format!("{e:?}")))
    }

    /// Load the module (once) and boot `rom` presenting to `target`
    ///
    /// Resolves once the emulator exists; rejects with the load or boot error.
    pub fn start(&self, rom: Vec<u8>, target: i32) -> Promise {
        let manager = Rc::clone(&self.manager);
        let slot = Rc::clone(&self.session);
        future_to_promise(async move {
            let instance = manager.instance().await.map_err(js_error)?;
            let session = Session::boot(instance, &rom, target).map_err(js_error)?;
            *slot.borrow_mut() = Some(session);
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Run one frame; `false` once the emulator stopped or none was started
    pub fn run_frame(&self) -> Result<bool, JsError> {
        match self.session.borrow_mut().as_mut() {
            Some(session) => session.run_frame().map_err(|e| JsError::new(&e.to_string())),
            None => Ok(false),
        }
    }

    /// Run frames on `requestAnimationFrame` until the emulator stops
    ///
    /// Does nothing while a loop is already running.
    pub fn run(&self) -> Result<(), JsError> {
        self.frames
            .start(Rc::clone(&self.session))
            .map(|_| ())
            .map_err(|_| JsError::new("requestAnimationFrame is unavailable"))
    }

    /// Whether a `requestAnimationFrame` loop is active
    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.frames.is_running()
    }

    /// Milliseconds timestamp of the last memory growth, 0 before the first
    #[wasm_bindgen(getter)]
    pub fn memory_grow_timestamp(&self) -> f64 {
        self.manager.memory_grow_timestamp() as f64
    }

    /// Frames run by the current emulator
    #[wasm_bindgen(getter)]
    pub fn frame_count(&self) -> f64 {
        self.session
            .borrow()
            .as_ref()
            .map_or(0.0, |session| session.frame_count() as f64)
    }
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn request_frame(callback: &FrameCallback) -> Result<i32, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    match callback.borrow().as_ref() {
        Some(closure) => window.request_animation_frame(closure.as_ref().unchecked_ref()),
        None => Ok(0),
    }
}

/// At most one `requestAnimationFrame` loop over a session
#[derive(Debug, Default, Clone)]
pub struct FrameLoop {
    active: Rc<Cell<bool>>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.get()
    }

    /// Start a loop unless one is running; returns whether one was started
    pub fn start(&self, session: Rc<RefCell<Option<Session<WebInstance>>>>) -> Result<bool, JsValue> {
        if self.active.get() {
            return Ok(false);
        }
        let callback: FrameCallback = Rc::new(RefCell::new(None));
        let next = Rc::clone(&callback);
        let active = Rc::clone(&self.active);

        *callback.borrow_mut() = Some(Closure::new(move || {
            let outcome = match session.borrow_mut().as_mut() {
                Some(session) => session.run_frame(),
                None => Ok(false),
            };
            let keep_going = match outcome {
                Ok(true) => match request_frame(&next) {
                    Ok(_) => true,
                    Err(e) => {
                        web_sys::console::error_2(&"gb.wasm: frame loop stopped".into(), &e);
                        false
                    }
                },
                Ok(false) => false,
                Err(e) => {
                    let kind = if e.is_protocol_violation() { "ABI violation" } else { "error" };
                    web_sys::console::error_1(&format!("gb.wasm: {kind}: {e}").into());
                    false
                }
            };
            if !keep_going {
                active.set(false);
                let _ = next.borrow_mut().take();
            }
        }));

        request_frame(&callback)?;
        self.active.set(true);
        Ok(true)
    }
}
