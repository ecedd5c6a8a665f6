//! Fetching the module binary over HTTP

use gb_host::{ArtifactSource, FetchResponse, HostError, Result};
use js_sys::Uint8Array;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

/// Text of a thrown JS value
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// A module binary behind a URL, retrieved with `window.fetch`
#[derive(Debug, Clone)]
pub struct WebArtifact {
    url: String,
}

impl WebArtifact {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn transport(&self, value: &JsValue) -> HostError {
        HostError::Fetch {
            location: self.url.clone(),
            message: js_message(value),
        }
    }
}

impl ArtifactSource for WebArtifact {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<FetchResponse> {
        let window = web_sys::window().ok_or_else(|| self.transport(&JsValue::from_str("no window")))?;
        let response: Response = JsFuture::from(window.fetch_with_str(&self.url))
            .await
            .and_then(|value| value.dyn_into())
            .map_err(|e| self.transport(&e))?;
        if !response.ok() {
            return Ok(FetchResponse::failed(response.status()));
        }

        let buffer = response.array_buffer().map_err(|e| self.transport(&e))?;
        let buffer = JsFuture::from(buffer).await.map_err(|e| self.transport(&e))?;
        Ok(FetchResponse::ok(Uint8Array::new(&buffer).to_vec()))
    }
}
