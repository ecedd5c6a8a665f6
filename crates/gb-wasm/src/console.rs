//! Browser console and clock

use gb_host::clock::WallClock;
use gb_host::console::{Console, ConsoleLevel};

/// Sends entries to `console.log` / `console.info` / `console.error`
#[derive(Debug, Default, Clone, Copy)]
pub struct WebConsole;

impl Console for WebConsole {
    fn emit(&self, level: ConsoleLevel, message: &str) {
        let message = message.into();
        match level {
            ConsoleLevel::Log => web_sys::console::log_1(&message),
            ConsoleLevel::Info => web_sys::console::info_1(&message),
            ConsoleLevel::Error => web_sys::console::error_1(&message),
        }
    }
}

/// `Date.now()`
#[derive(Debug, Default, Clone, Copy)]
pub struct WebClock;

impl WallClock for WebClock {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}
