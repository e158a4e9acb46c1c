//! Video activation
//!
//! Builds the player for a rule's source and mounts it into every element
//! the rule's selector matches. The player kind is fixed when the activator
//! is constructed.

use crate::{
    config::EmbedConfig,
    signal::{start_signal, StartListener},
    source::VideoSource,
    surface::Surface,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Styling that stretches a player over its container like a background
pub const COVER_STYLE: &str = "position:absolute;top:0;left:0;width:100%;height:100%;border:0;object-fit:cover;pointer-events:none;";

/// A player ready to be mounted by a [`Surface`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerMount {
    /// `<iframe>` pointing at the platform embed
    Embed {
        src: String,
        allow: String,
    },
    /// Native `<video>` element
    Native {
        src: String,
        muted: bool,
        loop_video: bool,
    },
}

impl PlayerMount {
    pub fn src(&self) -> &str {
        match self {
            PlayerMount::Embed { src, .. } | PlayerMount::Native { src, .. } => src,
        }
    }

    /// Inline style for the mounted element
    pub fn style(&self) -> &'static str {
        COVER_STYLE
    }
}

/// Platform embed player
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEmbed {
    id: String,
    privacy_mode: bool,
    config: EmbedConfig,
}

impl PlatformEmbed {
    pub fn new(id: impl Into<String>, privacy_mode: bool, config: EmbedConfig) -> Self {
        Self {
            id: id.into(),
            privacy_mode,
            config,
        }
    }

    /// Embed URL with autoplay requested
    pub fn embed_url(&self) -> String {
        let origin = if self.privacy_mode {
            &self.config.privacy_origin
        } else {
            &self.config.standard_origin
        };
        let flag = |on: bool| if on { "1" } else { "0" };

        let mut url = format!(
            "{}/embed/{}?autoplay=1&mute={}&controls={}&playsinline=1&rel=0&modestbranding=1",
            origin.trim_end_matches('/'),
            self.id,
            flag(self.config.mute),
            flag(self.config.controls),
        );
        if self.config.loop_video {
            // Looping a single video needs it listed as its own playlist
            url.push_str(&format!("&loop=1&playlist={}", self.id));
        }
        url
    }

    fn player(&self) -> PlayerMount {
        PlayerMount::Embed {
            src: self.embed_url(),
            allow: "autoplay; encrypted-media; picture-in-picture".to_string(),
        }
    }
}

/// Native media file player
#[derive(Debug, Clone, PartialEq)]
pub struct DirectFile {
    url: String,
    muted: bool,
    loop_video: bool,
}

impl DirectFile {
    pub fn new(url: impl Into<String>, config: &EmbedConfig) -> Self {
        Self {
            url: url.into(),
            muted: config.mute,
            loop_video: config.loop_video,
        }
    }

    fn player(&self) -> PlayerMount {
        PlayerMount::Native {
            src: self.url.clone(),
            muted: self.muted,
            loop_video: self.loop_video,
        }
    }
}

/// Player selected for a rule's source
#[derive(Debug, Clone, PartialEq)]
pub enum VideoActivator {
    Platform(PlatformEmbed),
    DirectFile(DirectFile),
}

/// Result of a successful mount
pub struct PlaybackHandle {
    /// Fires once the first mounted player starts
    pub started: StartListener,
    /// Number of elements a player was mounted into
    pub mounted: usize,
}

impl VideoActivator {
    /// Resolve `video_source` and pick the player kind
    pub fn new(video_source: &str, privacy_mode: bool, config: &EmbedConfig) -> Result<Self> {
        Ok(match VideoSource::resolve(video_source)? {
            VideoSource::Platform { id } => {
                VideoActivator::Platform(PlatformEmbed::new(id, privacy_mode, config.clone()))
            }
            VideoSource::DirectFile { url } => VideoActivator::DirectFile(DirectFile::new(url, config)),
        })
    }

    pub fn player(&self) -> PlayerMount {
        match self {
            VideoActivator::Platform(embed) => embed.player(),
            VideoActivator::DirectFile(file) => file.player(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VideoActivator::Platform(_) => "platform",
            VideoActivator::DirectFile(_) => "direct_file",
        }
    }

    /// Mount the player into every element matching `selector`.
    ///
    /// Fails with [`Error::TargetNotFound`] when nothing matches and with
    /// [`Error::Mount`] when every mount failed.
    pub fn activate<S: Surface>(&self, surface: &S, selector: &str) -> Result<PlaybackHandle> {
        let nodes = surface.query(selector);
        if nodes.is_empty() {
            return Err(Error::TargetNotFound {
                selector: selector.to_string(),
            });
        }

        let player = self.player();
        let (notifier, started) = start_signal();
        let mut mounted = 0;
        let mut last_error = None;

        for node in &nodes {
            match surface.mount_player(node, &player, notifier.clone()) {
                Ok(()) => mounted += 1,
                Err(e) => {
                    warn!(selector, error = %e, "Player mount failed");
                    last_error = Some(e);
                }
            }
        }

        if mounted == 0 {
            return Err(last_error.unwrap_or_else(|| Error::Mount("no element accepted the player".to_string())));
        }

        info!(selector, kind = self.kind(), src = player.src(), mounted, "Player mounted");
        Ok(PlaybackHandle { started, mounted })
    }
}

/// Resolve and mount in one step
pub fn activate<S: Surface>(
    surface: &S,
    selector: &str,
    video_source: &str,
    privacy_mode: bool,
    config: &EmbedConfig,
) -> Result<PlaybackHandle> {
    VideoActivator::new(video_source, privacy_mode, config)?.activate(surface, selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn test_embed_url_standard() {
        let embed = PlatformEmbed::new("abc12345678", false, EmbedConfig::default());
        assert_eq!(
            embed.embed_url(),
            "https://www.youtube.com/embed/abc12345678?autoplay=1&mute=1&controls=0&playsinline=1&rel=0&modestbranding=1&loop=1&playlist=abc12345678"
        );
    }

    #[test]
    fn test_embed_url_privacy() {
        let embed = PlatformEmbed::new("abc12345678", true, EmbedConfig::default());
        let url = embed.embed_url();
        assert!(url.starts_with("https://www.youtube-nocookie.com/embed/abc12345678?"));
        assert!(url.contains("autoplay=1"));
    }

    #[test]
    fn test_activator_kind_selected_once() {
        let config = EmbedConfig::default();
        assert_eq!(VideoActivator::new("abc12345678", false, &config).unwrap().kind(), "platform");
        assert_eq!(
            VideoActivator::new("https://cdn.example.com/bg.mp4", true, &config).unwrap().kind(),
            "direct_file"
        );
        assert!(VideoActivator::new("???", false, &config).is_err());
    }

    #[test]
    fn test_activate_mounts_every_match() {
        let surface = MemorySurface::with_elements(&[".bg", ".bg"]);
        let handle = activate(&surface, ".bg", "https://cdn.example.com/bg.mp4", false, &EmbedConfig::default()).unwrap();
        assert_eq!(handle.mounted, 2);
        assert!(handle.started.has_fired());

        let players = surface.players();
        assert_eq!(players.len(), 2);
        assert_eq!(
            players[0].1,
            PlayerMount::Native {
                src: "https://cdn.example.com/bg.mp4".to_string(),
                muted: true,
                loop_video: true,
            }
        );
    }

    #[test]
    fn test_activate_target_not_found() {
        let surface = MemorySurface::new();
        let err = activate(&surface, ".bg", "abc12345678", false, &EmbedConfig::default()).err().unwrap();
        assert_eq!(err.error_code(), "TARGET_NOT_FOUND");
        assert!(surface.players().is_empty());
    }

    #[test]
    fn test_activate_unresolvable_source() {
        let surface = MemorySurface::with_elements(&[".bg"]);
        let err = activate(&surface, ".bg", "not a video", false, &EmbedConfig::default()).err().unwrap();
        assert_eq!(err.error_code(), "UNRESOLVABLE_SOURCE");
        assert!(surface.players().is_empty());
    }

    #[test]
    fn test_activate_all_mounts_fail() {
        let surface = MemorySurface::with_elements(&[".bg"]);
        surface.fail_mounts("detached");
        let err = activate(&surface, ".bg", "abc12345678", false, &EmbedConfig::default()).err().unwrap();
        assert_eq!(err.error_code(), "MOUNT");
    }
}
