//! Engine configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest delay a browser `setTimeout` honors (2^31 - 1 ms)
pub const MAX_TIMER_DELAY_MS: u64 = 2_147_483_647;

/// Platform embed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Standard embed origin
    pub standard_origin: String,
    /// Privacy-enhanced embed origin
    pub privacy_origin: String,
    /// Start muted (required by browsers for autoplay)
    pub mute: bool,
    /// Loop the video
    pub loop_video: bool,
    /// Show player controls
    pub controls: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            standard_origin: "https://www.youtube.com".to_string(),
            privacy_origin: "https://www.youtube-nocookie.com".to_string(),
            mute: true,
            loop_video: true,
            controls: false,
        }
    }
}

/// Placeholder layer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Class applied to the placeholder layer
    pub class_name: String,
    /// Stacking order of the placeholder. At 0 it covers the player, which
    /// precedes it in the container, and stays under positioned content.
    pub z_index: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            class_name: "bgdelay-placeholder".to_string(),
            z_index: 0,
        }
    }
}

/// Configuration for one engine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub embed: EmbedConfig,
    pub overlay: OverlayConfig,
    /// Upper bound for a scheduled delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embed: EmbedConfig::default(),
            overlay: OverlayConfig::default(),
            max_delay_ms: MAX_TIMER_DELAY_MS,
        }
    }
}

impl EngineConfig {
    /// Unmuted players with controls, for checking a rule by eye
    pub fn with_sound() -> Self {
        Self {
            embed: EmbedConfig {
                mute: false,
                controls: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load from a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for origin in [&self.embed.standard_origin, &self.embed.privacy_origin] {
            let url = url::Url::parse(origin)
                .map_err(|e| Error::InvalidConfig(format!("embed origin {:?}: {}", origin, e)))?;
            if url.scheme() != "https" {
                return Err(Error::InvalidConfig(format!(
                    "embed origin must be https: {}",
                    origin
                )));
            }
        }
        if self.overlay.class_name.trim().is_empty() {
            return Err(Error::InvalidConfig("overlay class name is empty".to_string()));
        }
        Ok(())
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.min(MAX_TIMER_DELAY_MS))
    }
}
