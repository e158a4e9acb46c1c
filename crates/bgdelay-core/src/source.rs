//! Video source classification
//!
//! A rule's `video_source` is either an 11-character platform video id or a
//! URL pointing at a media file. Authoring normally reduces platform URLs to
//! the bare id; [`VideoSource::resolve`] accepts both so a stale record still
//! plays.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Length of a platform video id
pub const PLATFORM_ID_LEN: usize = 11;

const PLATFORM_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
    "youtu.be",
    "www.youtu.be",
];

/// What kind of player a source needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoSource {
    /// Embedded platform player
    Platform { id: String },
    /// Native `<video>` element
    DirectFile { url: String },
}

impl VideoSource {
    /// Classify a stored source string
    pub fn resolve(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::unresolvable(raw));
        }

        if let Some(id) = extract_platform_id(raw) {
            return Ok(VideoSource::Platform { id });
        }

        if is_direct_file_ref(raw) {
            return Ok(VideoSource::DirectFile {
                url: raw.to_string(),
            });
        }

        Err(Error::unresolvable(raw))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VideoSource::Platform { .. } => "platform",
            VideoSource::DirectFile { .. } => "direct_file",
        }
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::Platform { id } => write!(f, "platform:{}", id),
            VideoSource::DirectFile { url } => write!(f, "file:{}", url),
        }
    }
}

/// Check the `[A-Za-z0-9_-]{11}` shape of a platform id
pub fn is_platform_id(candidate: &str) -> bool {
    candidate.len() == PLATFORM_ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Extract a platform video id from a bare id or a platform URL.
///
/// Recognized: `watch?v=<id>`, `/embed/<id>`, `/v/<id>`, `/shorts/<id>`,
/// `youtu.be/<id>` and any URL whose `v` query parameter is a valid id.
pub fn extract_platform_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_platform_id(input) {
        return Some(input.to_string());
    }

    let url = parse_loose(input)?;

    if let Some(host) = url.host_str() {
        let host = host.to_ascii_lowercase();
        if PLATFORM_HOSTS.contains(&host.as_str()) {
            let mut segments = url.path_segments().into_iter().flatten();
            let id = if host.ends_with("youtu.be") {
                segments.next()
            } else {
                match segments.next() {
                    Some("embed") | Some("v") | Some("shorts") | Some("live") => segments.next(),
                    _ => None,
                }
            };
            if let Some(id) = id.and_then(|s| s.get(..PLATFORM_ID_LEN)) {
                if is_platform_id(id) {
                    return Some(id.to_string());
                }
            }
        }
    }

    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|value| is_platform_id(value))
}

/// Parse an absolute URL, tolerating a missing scheme on platform links
/// such as `youtu.be/abc12345678`.
fn parse_loose(input: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(input) {
        return Some(url);
    }
    if let Some(rest) = input.strip_prefix("//") {
        return Url::parse(&format!("https://{}", rest)).ok();
    }
    let lower = input.to_ascii_lowercase();
    if PLATFORM_HOSTS.iter().any(|host| lower.starts_with(&format!("{}/", host))) {
        return Url::parse(&format!("https://{}", input)).ok();
    }
    None
}

fn is_platform_host(url: &Url) -> bool {
    url.host_str()
        .map(|h| PLATFORM_HOSTS.contains(&h.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Media reference a page can load
enum WebRef {
    /// Absolute `http`/`https` or protocol-relative (`//host/...`)
    Hosted(Url),
    /// Root-relative path on the current site (`/...`)
    RootRelative,
}

fn parse_web_ref(raw: &str) -> Option<WebRef> {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Url::parse(&format!("https://{}", rest))
            .ok()
            .filter(|url| url.host_str().is_some())
            .map(WebRef::Hosted);
    }
    if raw.starts_with('/') {
        return Some(WebRef::RootRelative);
    }
    Url::parse(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .map(WebRef::Hosted)
}

/// Absolute `http`/`https`, protocol-relative or root-relative reference
pub(crate) fn is_web_ref(raw: &str) -> bool {
    parse_web_ref(raw).is_some()
}

fn is_direct_file_ref(raw: &str) -> bool {
    match parse_web_ref(raw) {
        Some(WebRef::Hosted(url)) => !is_platform_host(&url),
        Some(WebRef::RootRelative) => true,
        None => false,
    }
}
