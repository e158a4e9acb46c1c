//! Placeholder controller
//!
//! Covers the video's container with a color tint, optionally over a still
//! image, until the player reports start. Once hidden it never comes back
//! for the same rule.

use crate::{
    config::OverlayConfig,
    surface::Surface,
    types::{HexColor, Opacity, Rule},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Visual description of a placeholder layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLayer {
    pub class_name: String,
    pub z_index: i32,
    pub color: HexColor,
    pub opacity: Opacity,
    /// Still image rendered beneath the tint
    pub image_url: Option<String>,
}

impl OverlayLayer {
    pub fn new(color: HexColor, opacity: Opacity, image_url: Option<String>, config: &OverlayConfig) -> Self {
        Self {
            class_name: config.class_name.clone(),
            z_index: config.z_index,
            color,
            opacity,
            image_url,
        }
    }

    pub fn from_rule(rule: &Rule, config: &OverlayConfig) -> Self {
        Self::new(
            rule.overlay_color.clone(),
            rule.overlay_opacity,
            rule.fallback_image.as_ref().map(|image| image.url.clone()),
            config,
        )
    }

    /// Tint as a CSS color
    pub fn tint(&self) -> String {
        self.color.rgba(self.opacity)
    }

    /// Inline style for the outer layer (holds the image, if any)
    pub fn container_style(&self) -> String {
        let mut style = format!(
            "position:absolute;top:0;left:0;width:100%;height:100%;pointer-events:none;z-index:{};",
            self.z_index
        );
        if let Some(url) = &self.image_url {
            style.push_str(&format!(
                "background-image:url(\"{}\");background-size:cover;background-position:center;",
                css_escape(url)
            ));
        }
        style
    }

    /// Inline style for the tint child, stacked above the image
    pub fn tint_style(&self) -> String {
        format!(
            "position:absolute;top:0;left:0;width:100%;height:100%;background-color:{};",
            self.tint()
        )
    }
}

fn css_escape(url: &str) -> String {
    url.replace('\\', "\\\\").replace('"', "\\\"").replace(['\n', '\r'], "")
}

/// Placeholder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderState {
    /// Not shown yet
    Pending,
    Shown,
    /// Removed after the video started; terminal
    Hidden,
}

/// Shows and removes the placeholder for one matched rule
pub struct PlaceholderController<S: Surface> {
    surface: S,
    overlays: Vec<S::Overlay>,
    state: PlaceholderState,
}

impl<S: Surface> PlaceholderController<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            overlays: Vec::new(),
            state: PlaceholderState::Pending,
        }
    }

    pub fn state(&self) -> PlaceholderState {
        self.state
    }

    /// True once the video started and the layer was removed
    pub fn video_started(&self) -> bool {
        self.state == PlaceholderState::Hidden
    }

    /// Number of layers currently mounted
    pub fn layer_count(&self) -> usize {
        self.overlays.len()
    }

    /// Cover each target with `layer`. Returns how many layers were mounted.
    ///
    /// A hidden placeholder cannot be shown again.
    pub fn show(&mut self, layer: &OverlayLayer, targets: &[S::Node]) -> Result<usize> {
        if self.state == PlaceholderState::Hidden {
            return Err(Error::PlaceholderHidden);
        }

        let mut shown = 0;
        for target in targets {
            match self.surface.show_overlay(target, layer) {
                Ok(overlay) => {
                    self.overlays.push(overlay);
                    shown += 1;
                }
                Err(e) => warn!(error = %e, "Placeholder layer not mounted"),
            }
        }

        self.state = PlaceholderState::Shown;
        debug!(layers = shown, tint = %layer.tint(), "Placeholder shown");
        Ok(shown)
    }

    /// Remove every layer. Returns `false` if already hidden.
    pub fn hide(&mut self) -> bool {
        if self.state == PlaceholderState::Hidden {
            return false;
        }
        for overlay in self.overlays.drain(..) {
            self.surface.remove_overlay(overlay);
        }
        self.state = PlaceholderState::Hidden;
        debug!("Placeholder hidden");
        true
    }
}
