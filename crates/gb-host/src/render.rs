//! Frame rendering
//!
//! The module hands over a 160x144 run of luminance bytes once per frame.
//! Each byte becomes one opaque grey RGBA pixel; nothing is scaled, cropped
//! or color corrected.

use std::cell::RefCell;
use std::rc::Rc;

/// Screen width in pixels
pub const SCREEN_WIDTH: usize = 160;

/// Screen height in pixels
pub const SCREEN_HEIGHT: usize = 144;

/// Length of a luminance framebuffer in bytes
pub const FRAME_LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Length of a rendered RGBA frame in bytes
pub const RGBA_LEN: usize = FRAME_LEN * 4;

/// Identifier of a presentation surface, chosen by whoever boots the module
pub type TargetId = i32;

/// Expand luminance bytes into RGBA pixels (R = G = B = luminance, A = 255)
///
/// `rgba` must hold exactly four bytes per luminance byte.
pub fn luminance_to_rgba(luma: &[u8], rgba: &mut [u8]) {
    debug_assert_eq!(luma.len() * 4, rgba.len());
    for (pixel, &value) in rgba.chunks_exact_mut(4).zip(luma) {
        pixel[0] = value;
        pixel[1] = value;
        pixel[2] = value;
        pixel[3] = 0xFF;
    }
}

/// A surface frames can be presented to
pub trait RenderTarget {
    /// Present one RGBA frame of `SCREEN_WIDTH x SCREEN_HEIGHT` pixels
    fn present(&mut self, target: TargetId, rgba: &[u8]);
}

impl<T: RenderTarget> RenderTarget for Rc<RefCell<T>> {
    fn present(&mut self, target: TargetId, rgba: &[u8]) {
        self.borrow_mut().present(target, rgba);
    }
}

/// Reusable buffers for the luminance -> RGBA conversion
#[derive(Debug, Clone)]
pub struct FrameRenderer {
    luma: Vec<u8>,
    rgba: Vec<u8>,
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self {
            luma: vec![0; FRAME_LEN],
            rgba: vec![0; RGBA_LEN],
        }
    }

    /// Staging buffer the framebuffer is copied into before rendering
    pub fn luma_mut(&mut self) -> &mut [u8] {
        &mut self.luma
    }

    /// Render the staged framebuffer
    pub fn render(&mut self) -> &[u8] {
        luminance_to_rgba(&self.luma, &mut self.rgba);
        &self.rgba
    }

    /// Stage `luma` and render it
    pub fn render_from(&mut self, luma: &[u8]) -> &[u8] {
        self.luma.copy_from_slice(luma);
        self.render()
    }
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// A presented frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub target: TargetId,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Default)]
struct CaptureState {
    presented: u64,
    last: Option<CapturedFrame>,
}

/// Render target that keeps the most recent frame; clones share the state
#[derive(Debug, Default, Clone)]
pub struct FrameCapture {
    state: Rc<RefCell<CaptureState>>,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames presented so far
    pub fn frames_presented(&self) -> u64 {
        self.state.borrow().presented
    }

    /// The most recently presented frame
    pub fn last_frame(&self) -> Option<CapturedFrame> {
        self.state.borrow().last.clone()
    }
}

impl RenderTarget for FrameCapture {
    fn present(&mut self, target: TargetId, rgba: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.presented += 1;
        let frame = state.last.get_or_insert_with(|| CapturedFrame {
            target,
            rgba: Vec::with_capacity(rgba.len()),
        });
        frame.target = target;
        frame.rgba.clear();
        frame.rgba.extend_from_slice(rgba);
    }
}
