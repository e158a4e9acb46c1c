//! Rule store payload
//!
//! The site hands each page an ordered JSON array of rule records. Records
//! are loosely typed (numbers may arrive as strings, flags as `0`/`1`), so
//! every field is read leniently and normalized into a [`Rule`]. Order is
//! preserved: it decides which rule wins.

use crate::{
    source::{extract_platform_id, is_web_ref},
    types::{FallbackImage, HexColor, Opacity, PageId, Rule, Scope},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One stored rule record, before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRule {
    pub selector: Option<Value>,
    pub video_id: Option<Value>,
    pub delay: Option<Value>,
    pub scope: Option<Value>,
    pub page_id: Option<Value>,
    pub privacy: Option<Value>,
    pub overlay_color: Option<Value>,
    pub overlay_opacity: Option<Value>,
    pub fallback_image_id: Option<Value>,
    pub fallback_image_url: Option<Value>,
}

impl RawRule {
    /// Normalize into an engine rule
    pub fn sanitize(&self) -> Rule {
        let selector = self.selector.as_ref().map(text_field).unwrap_or_default();

        let video_source = self
            .video_id
            .as_ref()
            .map(text_field)
            .map(|raw| extract_platform_id(&raw).unwrap_or(raw))
            .unwrap_or_default();

        let delay_seconds = self.delay.as_ref().map(float_value).unwrap_or(0.0);

        let scope = self
            .scope
            .as_ref()
            .and_then(Value::as_str)
            .and_then(Scope::parse)
            .unwrap_or(Scope::Page);

        let page_id = PageId(self.page_id.as_ref().map(absint).unwrap_or(0));

        let privacy_mode = self.privacy.as_ref().map(is_truthy).unwrap_or(false);

        let overlay_color = self
            .overlay_color
            .as_ref()
            .and_then(Value::as_str)
            .map(HexColor::parse_or_default)
            .unwrap_or_default();

        let overlay_opacity = self
            .overlay_opacity
            .as_ref()
            .map(|v| Opacity::new(float_value(v)))
            .unwrap_or_default();

        let fallback_image = self
            .fallback_image_url
            .as_ref()
            .map(text_field)
            .and_then(|raw| image_url(&raw))
            .map(|url| FallbackImage {
                id: self.fallback_image_id.as_ref().map(absint).unwrap_or(0),
                url,
            });

        Rule {
            selector,
            video_source,
            delay_seconds,
            scope,
            page_id,
            privacy_mode,
            overlay_color,
            overlay_opacity,
            fallback_image,
        }
    }
}

/// Ordered, immutable rule list for one page load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleStore {
    rules: Vec<Rule>,
}

impl RuleStore {
    /// Decode and normalize the page-load payload
    pub fn from_json(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(value)
    }

    /// Normalize an already-parsed payload
    pub fn from_value(value: Value) -> Result<Self> {
        let records = match value {
            Value::Array(records) => records,
            Value::Null => Vec::new(),
            other => {
                return Err(Error::Payload(format!(
                    "expected an array of rules, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut rules = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            if !record.is_object() {
                warn!(index, kind = json_kind(&record), "Skipping rule record that is not an object");
                continue;
            }
            let raw: RawRule = serde_json::from_value(record)?;
            rules.push(raw.sanitize());
        }

        debug!(count = rules.len(), "Rule store decoded");
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Rule>> for RuleStore {
    fn from(rules: Vec<Rule>) -> Self {
        Self::from_rules(rules)
    }
}

impl<'a> IntoIterator for &'a RuleStore {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Single-line text: control characters dropped, whitespace collapsed
fn text_field(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return String::new(),
    };
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Number or numeric-prefix string; anything else is 0
fn float_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => leading_float(s),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    }
}

fn leading_float(input: &str) -> f64 {
    let trimmed = input.trim_start();
    let candidate: &str = {
        let end = trimmed
            .char_indices()
            .find(|(_, c)| !matches!(c, '0'..='9' | '.' | '+' | '-' | 'e' | 'E'))
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());
        &trimmed[..end]
    };
    (1..=candidate.len())
        .rev()
        .find_map(|len| candidate[..len].parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Absolute integer value
fn absint(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i64::unsigned_abs)
            .or_else(|| n.as_u64())
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc().abs() as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let value = leading_float(s);
            if value.is_finite() {
                value.trunc().abs() as u64
            } else {
                0
            }
        }
        Value::Bool(true) => 1,
        _ => 0,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// Loadable image URL. Scheme-less host paths get `http://` prepended;
/// anything else that is not a web reference is dropped.
fn image_url(raw: &str) -> Option<String> {
    if is_web_ref(raw) {
        return Some(raw.to_string());
    }
    if raw.contains(':') || raw.starts_with('/') {
        return None;
    }
    let prefixed = format!("http://{}", raw);
    let has_domain = url::Url::parse(&prefixed)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.contains('.')))
        .unwrap_or(false);
    (has_domain && is_web_ref(&prefixed)).then_some(prefixed)
}
