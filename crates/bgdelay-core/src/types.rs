//! Core types for bgdelay

use serde::{Deserialize, Serialize};

/// Identifier of the page being rendered. `0` means "no identifier".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl PageId {
    pub const UNSET: PageId = PageId(0);

    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for PageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a rule applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only on the page named by the rule's `page_id`
    #[default]
    Page,
    /// On every page of the site
    Site,
}

impl Scope {
    /// Parse the stored scope name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "page" => Some(Scope::Page),
            "site" => Some(Scope::Site),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Page => write!(f, "page"),
            Scope::Site => write!(f, "site"),
        }
    }
}

/// A `#rrggbb` color. Always six lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    /// Parse `#rgb` or `#rrggbb`. The short form is expanded.
    pub fn parse(input: &str) -> Option<Self> {
        let digits = input.trim().strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_string(),
            _ => return None,
        };
        Some(Self(format!("#{}", expanded.to_ascii_lowercase())))
    }

    /// Parse, falling back to black
    pub fn parse_or_default(input: &str) -> Self {
        Self::parse(input).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Color as an RGB tuple
    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&self.0[range], 16).unwrap_or(0)
        };
        (channel(1..3), channel(3..5), channel(5..7))
    }

    /// Color as a CSS `rgba()` value with the given opacity
    pub fn rgba(&self, opacity: Opacity) -> String {
        let (r, g, b) = self.rgb();
        format!("rgba({}, {}, {}, {})", r, g, b, opacity.value())
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self("#000000".to_string())
    }
}

impl From<String> for HexColor {
    fn from(value: String) -> Self {
        Self::parse_or_default(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl std::fmt::Display for HexColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Overlay opacity, always within `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Opacity(f64);

impl Opacity {
    pub const DEFAULT: Opacity = Opacity(0.4);

    /// Clamp into `[0, 1]`. NaN falls back to the default.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::DEFAULT;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<f64> for Opacity {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Opacity> for f64 {
    fn from(opacity: Opacity) -> Self {
        opacity.0
    }
}

/// Still image shown under the overlay tint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackImage {
    /// Media library attachment id (0 when unknown)
    pub id: u64,
    pub url: String,
}

/// One configured deferred-playback behavior.
///
/// Rules are rebuilt from the store on every page load and never mutated
/// once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// CSS selector of the element(s) hosting the background video
    pub selector: String,
    /// Platform video id or direct media URL
    pub video_source: String,
    /// Seconds to wait before activation. Validated again by the scheduler.
    pub delay_seconds: f64,
    pub scope: Scope,
    /// Only meaningful for [`Scope::Page`]
    #[serde(default)]
    pub page_id: PageId,
    /// Use the privacy-enhanced embed domain
    #[serde(default)]
    pub privacy_mode: bool,
    #[serde(default)]
    pub overlay_color: HexColor,
    #[serde(default)]
    pub overlay_opacity: Opacity,
    #[serde(default)]
    pub fallback_image: Option<FallbackImage>,
}

impl Rule {
    /// Create a site-wide rule with default presentation
    pub fn site(selector: impl Into<String>, video_source: impl Into<String>, delay_seconds: f64) -> Self {
        Self {
            selector: selector.into(),
            video_source: video_source.into(),
            delay_seconds,
            scope: Scope::Site,
            page_id: PageId::UNSET,
            privacy_mode: false,
            overlay_color: HexColor::default(),
            overlay_opacity: Opacity::default(),
            fallback_image: None,
        }
    }

    /// Create a rule bound to one page
    pub fn page(
        page_id: impl Into<PageId>,
        selector: impl Into<String>,
        video_source: impl Into<String>,
        delay_seconds: f64,
    ) -> Self {
        Self {
            scope: Scope::Page,
            page_id: page_id.into(),
            ..Self::site(selector, video_source, delay_seconds)
        }
    }

    /// Whether this rule is a candidate on the given page
    pub fn applies_to(&self, page: PageId) -> bool {
        match self.scope {
            Scope::Site => true,
            Scope::Page => self.page_id == page,
        }
    }
}

/// Engine lifecycle for one matched rule on one page load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Nothing matched yet
    Idle,
    /// Rule matched, timer armed
    Scheduled,
    /// Timer fired, player being mounted
    Activating,
    /// Player reported start
    Playing,
}

impl EngineState {
    /// Transitions only move forward, one step at a time
    pub fn can_transition_to(&self, target: EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, target),
            (Idle, Scheduled) | (Scheduled, Activating) | (Activating, Playing)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Playing)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Scheduled => write!(f, "scheduled"),
            EngineState::Activating => write!(f, "activating"),
            EngineState::Playing => write!(f, "playing"),
        }
    }
}
