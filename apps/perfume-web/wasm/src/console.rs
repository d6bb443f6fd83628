//! Browser console sink

use perfume_core::Console;
use wasm_bindgen::JsValue;
use web_sys::console;

#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserConsole;

impl Console for BrowserConsole {
    fn log(&self, text: &str, style: &str) {
        console::log_2(&JsValue::from_str(text), &JsValue::from_str(style));
    }

    fn warn(&self, prefix: &str, message: &str) {
        console::warn_2(&JsValue::from_str(prefix), &JsValue::from_str(message));
    }

    fn debug(&self, label: &str, value: &str) {
        console::log_2(&JsValue::from_str(label), &JsValue::from_str(value));
    }
}
