//! bgdelay Core - deferred playback engine for background videos
//!
//! Delays the start of background videos (platform embeds or direct media
//! files) to improve perceived page load:
//! - Rule store payload decoding and normalization
//! - First-match rule resolution per page
//! - One-shot, cancellable activation timer
//! - Player activation for platform embeds and native video
//! - Tint/image placeholder until the player starts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         bgdelay Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Rule Store  │─▶│    Rule      │─▶│   Playback   │           │
//! │  │   Payload    │  │   Matcher    │  │  Scheduler   │           │
//! │  └──────────────┘  └──────┬───────┘  └──────┬───────┘           │
//! │                           │                 │                   │
//! │                    ┌──────┴───────┐  ┌──────┴───────┐           │
//! │                    │ Placeholder  │◀─│    Video     │           │
//! │                    │  Controller  │  │  Activator   │           │
//! │                    └──────┬───────┘  └──────┬───────┘           │
//! │                           └────────┬────────┘                   │
//! │                             ┌──────┴──────┐                     │
//! │                             │   Surface   │                     │
//! │                             └─────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod store;
pub mod matcher;
pub mod scheduler;
pub mod source;
pub mod signal;
pub mod surface;
pub mod activator;
pub mod placeholder;
pub mod engine;

pub use error::{Error, Result};
pub use types::*;
pub use config::{EmbedConfig, EngineConfig, OverlayConfig};
pub use store::{RawRule, RuleStore};
pub use matcher::{match_rule, Matched};
pub use scheduler::{clamp_delay, PlaybackScheduler, ScheduleHandle, ScheduleStatus, TimerBackend};
#[cfg(feature = "tokio-timer")]
pub use scheduler::TokioTimer;
pub use source::{extract_platform_id, VideoSource};
pub use signal::{start_signal, StartListener, StartNotifier};
pub use surface::{DomEvent, MemorySurface, NodeId, Surface};
pub use activator::{PlaybackHandle, PlayerMount, VideoActivator};
pub use placeholder::{OverlayLayer, PlaceholderController, PlaceholderState};
pub use engine::{Boot, Engine, EngineSession, Failure, Transition};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library banner
pub fn init() {
    tracing::info!(version = VERSION, "bgdelay core initialized");
}
