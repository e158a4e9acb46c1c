//! bgdelay WASM - background video delay for the browser
//!
//! Boots the bgdelay engine against the live document:
//! - Rules decoded from the page payload (a JS array or JSON text)
//! - Placeholder shown immediately, player mounted after the rule's delay
//! - Placeholder removed once the player starts
//!
//! ```javascript
//! import init, { BgDelay } from '@bgdelay/wasm';
//!
//! await init();
//! const engine = BgDelay.fromGlobal('bgdelayRules');
//! window.addEventListener('pagehide', () => engine.cancel());
//! ```

use bgdelay_core::{Boot, Engine, EngineConfig, EngineSession, PageId, RuleStore, Surface};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

mod dom;
mod timer;

pub use dom::{page_id_from_classes, DomSurface};
pub use timer::WindowTimer;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"[bgdelay] Initialized".into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Engine settings exposed to JavaScript
#[wasm_bindgen]
#[derive(Clone, Serialize, Deserialize)]
pub struct WasmEngineConfig {
    class_name: String,
    /// Start players muted
    pub mute: bool,
    /// Loop playback
    pub loop_video: bool,
    /// Show player controls
    pub controls: bool,
    /// Placeholder stacking order
    pub z_index: i32,
    /// Longest honored delay, in milliseconds
    pub max_delay_ms: f64,
}

#[wasm_bindgen]
impl WasmEngineConfig {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::from(&EngineConfig::default())
    }

    /// Unmuted players with controls
    #[wasm_bindgen]
    pub fn with_sound() -> Self {
        Self::from(&EngineConfig::with_sound())
    }

    /// Placeholder class name
    #[wasm_bindgen(getter)]
    pub fn class_name(&self) -> String {
        self.class_name.clone()
    }

    #[wasm_bindgen(setter)]
    pub fn set_class_name(&mut self, class_name: String) {
        self.class_name = class_name;
    }
}

impl Default for WasmEngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&EngineConfig> for WasmEngineConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            class_name: config.overlay.class_name.clone(),
            mute: config.embed.mute,
            loop_video: config.embed.loop_video,
            controls: config.embed.controls,
            z_index: config.overlay.z_index,
            max_delay_ms: config.max_delay_ms as f64,
        }
    }
}

impl WasmEngineConfig {
    fn to_engine_config(&self) -> bgdelay_core::Result<EngineConfig> {
        let mut config = EngineConfig::default();
        config.embed.mute = self.mute;
        config.embed.loop_video = self.loop_video;
        config.embed.controls = self.controls;
        config.overlay.class_name = self.class_name.clone();
        config.overlay.z_index = self.z_index;
        if self.max_delay_ms.is_finite() && self.max_delay_ms >= 0.0 {
            config.max_delay_ms = self.max_delay_ms as u64;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Engine running on the current page
#[wasm_bindgen]
pub struct BgDelay {
    session: Option<EngineSession<DomSurface, WindowTimer>>,
}

#[wasm_bindgen]
impl BgDelay {
    /// Boot from a rules array. A missing or negative `page_id` falls back
    /// to the id in the body classes.
    #[wasm_bindgen(constructor)]
    pub fn new(rules: JsValue, page_id: Option<f64>, config: Option<WasmEngineConfig>) -> Result<BgDelay, JsValue> {
        let payload: serde_json::Value = if rules.is_undefined() || rules.is_null() {
            serde_json::Value::Null
        } else {
            serde_wasm_bindgen::from_value(rules)?
        };
        let store = RuleStore::from_value(payload).map_err(to_js_error)?;
        boot(&store, page_id, config)
    }

    /// Boot from a JSON payload
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(payload: &str, page_id: Option<f64>, config: Option<WasmEngineConfig>) -> Result<BgDelay, JsValue> {
        let store = RuleStore::from_json(payload).map_err(to_js_error)?;
        boot(&store, page_id, config)
    }

    /// Boot from a payload stored on `window[name]`
    #[wasm_bindgen(js_name = fromGlobal)]
    pub fn from_global(name: &str) -> Result<BgDelay, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let rules = js_sys::Reflect::get(&window, &JsValue::from_str(name))?;
        Self::new(rules, None, None)
    }

    /// Current engine state: "idle", "scheduled", "activating" or "playing"
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.session
            .as_ref()
            .map(|session| session.state().to_string())
            .unwrap_or_else(|| "idle".to_string())
    }

    /// Whether a rule applied to this page
    #[wasm_bindgen(getter)]
    pub fn matched(&self) -> bool {
        self.session.is_some()
    }

    /// Position of the matched rule, -1 if none
    #[wasm_bindgen(getter)]
    pub fn rule_index(&self) -> i32 {
        self.session
            .as_ref()
            .map(|session| session.rule_index() as i32)
            .unwrap_or(-1)
    }

    #[wasm_bindgen(getter)]
    pub fn placeholder_visible(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.placeholder_visible())
    }

    /// Activation failure as JSON, if any
    #[wasm_bindgen]
    pub fn failure_json(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|session| session.failure())
            .and_then(|failure| serde_json::to_string(&failure).ok())
    }

    /// Cancel a pending activation. Returns false if nothing was pending.
    #[wasm_bindgen]
    pub fn cancel(&mut self) -> bool {
        self.session.as_mut().is_some_and(|session| session.cancel())
    }
}

fn boot(store: &RuleStore, page_id: Option<f64>, config: Option<WasmEngineConfig>) -> Result<BgDelay, JsValue> {
    let surface = DomSurface::new().map_err(to_js_error)?;
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let config = config
        .unwrap_or_default()
        .to_engine_config()
        .map_err(to_js_error)?;

    let page = match page_id {
        Some(id) if id.is_finite() && id >= 0.0 => PageId(id as u64),
        _ => surface.current_page_id(),
    };

    let session = match Engine::boot(store, page, surface, WindowTimer::new(window), &config) {
        Boot::Armed(session) => Some(session),
        Boot::Idle => None,
    };
    Ok(BgDelay { session })
}

fn to_js_error(error: bgdelay_core::Error) -> JsValue {
    JsValue::from_str(&format!("[{}] {}", error.error_code(), error))
}

/// Selector query against the live document, for debugging rules
#[wasm_bindgen]
pub fn count_matches(selector: &str) -> Result<u32, JsValue> {
    let surface = DomSurface::new().map_err(to_js_error)?;
    Ok(surface.query(selector).len() as u32)
}
