//! Canvas render targets

use std::collections::HashMap;

use gb_host::render::{TargetId, SCREEN_HEIGHT, SCREEN_WIDTH};
use gb_host::RenderTarget;
use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

/// Canvases frames are presented to, keyed by target id
///
/// Frames for a target without a canvas are dropped.
#[derive(Debug, Default)]
pub struct CanvasRegistry {
    contexts: HashMap<TargetId, CanvasRenderingContext2d>,
}

impl CanvasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `canvas` for `target`, replacing any previous one
    pub fn attach(&mut self, target: TargetId, canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
        canvas.set_width(SCREEN_WIDTH as u32);
        canvas.set_height(SCREEN_HEIGHT as u32);
        let context = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("canvas has no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        self.contexts.insert(target, context);
        Ok(())
    }

    pub fn detach(&mut self, target: TargetId) -> bool {
        self.contexts.remove(&target).is_some()
    }

    pub fn contains(&self, target: TargetId) -> bool {
        self.contexts.contains_key(&target)
    }
}

impl RenderTarget for CanvasRegistry {
    fn present(&mut self, target: TargetId, rgba: &[u8]) {
        let Some(context) = self.contexts.get(&target) else {
            tracing::debug!(target: "gb_wasm::canvas", target, "no canvas for render target");
            return;
        };
        let image = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(rgba),
            SCREEN_WIDTH as u32,
            SCREEN_HEIGHT as u32,
        );
        let drawn = image.and_then(|image| context.put_image_data(&image, 0.0, 0.0));
        if let Err(e) = drawn {
            web_sys::console::error_2(&"gb.wasm: could not draw frame".into(), &e);
        }
    }
}
