//! CLI command implementations

use crate::output::{print_json, print_table, seconds, OutputFormat};
use anyhow::Context;
use bgdelay_core::{
    clamp_delay, match_rule, EngineConfig, Engine, EngineState, Failure, MemorySurface, PageId,
    PlayerMount, Rule, RuleStore, TokioTimer, Transition, VideoActivator, VideoSource,
};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tabled::Tabled;
use tokio::task::LocalSet;
use tokio::time::Instant;
use tracing::debug;

/// How long the simulator keeps watching after activation
const START_GRACE: Duration = Duration::from_secs(1);

fn load_store(path: &Path) -> anyhow::Result<RuleStore> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("reading payload {}", path.display()))?;
    let store = RuleStore::from_json(&payload)
        .with_context(|| format!("decoding payload {}", path.display()))?;
    debug!(path = %path.display(), rules = store.len(), "Payload loaded");
    Ok(store)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json(&json).with_context(|| format!("invalid config {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn describe_source(raw: &str) -> String {
    match VideoSource::resolve(raw) {
        Ok(source) => source.to_string(),
        Err(_) if raw.is_empty() => "(none)".to_string(),
        Err(_) => format!("unresolvable: {}", raw),
    }
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    index: usize,
    scope: String,
    page: String,
    selector: String,
    source: String,
    delay: String,
    privacy: bool,
    tint: String,
    image: String,
}

impl RuleRow {
    fn new(index: usize, rule: &Rule) -> Self {
        Self {
            index,
            scope: rule.scope.to_string(),
            page: if rule.page_id.is_unset() { "-".to_string() } else { rule.page_id.to_string() },
            selector: rule.selector.clone(),
            source: describe_source(&rule.video_source),
            delay: format!("{}s", rule.delay_seconds),
            privacy: rule.privacy_mode,
            tint: rule.overlay_color.rgba(rule.overlay_opacity),
            image: rule
                .fallback_image
                .as_ref()
                .map(|image| image.url.clone())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Decode and print the normalized rules
pub fn check(path: &Path, format: &str) -> anyhow::Result<()> {
    let store = load_store(path)?;
    let unresolvable = store
        .iter()
        .filter(|rule| VideoSource::resolve(&rule.video_source).is_err())
        .count();

    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&store)?,
        OutputFormat::Table => {
            print_table(store.iter().enumerate().map(|(i, rule)| RuleRow::new(i, rule)));
            println!("{} rules, {} with unresolvable sources", store.len(), unresolvable);
        }
        OutputFormat::Text => {
            for (i, rule) in store.iter().enumerate() {
                let row = RuleRow::new(i, rule);
                println!(
                    "#{} {} page={} selector={:?} source={} delay={} privacy={} tint={} image={}",
                    row.index, row.scope, row.page, row.selector, row.source, row.delay, row.privacy, row.tint, row.image
                );
            }
            println!("{} rules, {} with unresolvable sources", store.len(), unresolvable);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct Resolution {
    page: PageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched: Option<MatchedRule>,
}

#[derive(Serialize)]
struct MatchedRule {
    index: usize,
    rule: Rule,
    delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    player: Option<PlayerMount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print which rule wins for a page and what it would mount
pub fn resolve(path: &Path, page: u64, config: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let store = load_store(path)?;
    let config = load_config(config)?;
    let page = PageId(page);

    let matched = match_rule(&store, page).map(|matched| {
        let activator = VideoActivator::new(&matched.rule.video_source, matched.rule.privacy_mode, &config.embed);
        let (player, error) = match activator {
            Ok(activator) => (Some(activator.player()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        MatchedRule {
            index: matched.index,
            rule: matched.rule.clone(),
            delay_ms: clamp_delay(matched.rule.delay_seconds, config.max_delay()).as_millis() as u64,
            player,
            error,
        }
    });
    let resolution = Resolution { page, matched };

    if OutputFormat::from(format) == OutputFormat::Json {
        return print_json(&resolution);
    }

    let Some(matched) = &resolution.matched else {
        println!("Page {}: no match", page);
        return Ok(());
    };

    println!("Page {}: rule #{} ({} scope)", page, matched.index, matched.rule.scope);
    println!("  Selector: {}", matched.rule.selector);
    println!("  Delay:    {}", seconds(Duration::from_millis(matched.delay_ms)));
    println!("  Tint:     {}", matched.rule.overlay_color.rgba(matched.rule.overlay_opacity));
    if let Some(image) = &matched.rule.fallback_image {
        println!("  Image:    {}", image.url);
    }
    match (&matched.player, &matched.error) {
        (Some(PlayerMount::Embed { src, .. }), _) => println!("  Player:   embed {}", src),
        (Some(PlayerMount::Native { src, .. }), _) => println!("  Player:   video {}", src),
        (None, Some(error)) => println!("  Player:   none ({})", error),
        (None, None) => {}
    }

    Ok(())
}

/// Simulator switches
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulateOptions {
    /// Remove the target element before the timer fires
    pub missing_target: bool,
    /// Mounted players never report start
    pub no_start: bool,
}

#[derive(Serialize, Tabled)]
struct TimelineRow {
    #[tabled(display_with = "display_ms")]
    at_ms: u64,
    from: EngineState,
    to: EngineState,
}

fn display_ms(ms: &u64) -> String {
    seconds(Duration::from_millis(*ms))
}

#[derive(Serialize)]
struct SimulationReport {
    page: PageId,
    rule_index: Option<usize>,
    timeline: Vec<TimelineRow>,
    final_state: EngineState,
    placeholder_visible: bool,
    players_mounted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

impl SimulationReport {
    fn idle(page: PageId) -> Self {
        Self {
            page,
            rule_index: None,
            timeline: Vec::new(),
            final_state: EngineState::Idle,
            placeholder_visible: false,
            players_mounted: 0,
            failure: None,
        }
    }
}

/// Split a selector list into the parts a simulated element answers to
fn selector_parts(selector: &str) -> Vec<&str> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Run the engine against an in-memory page on a paused clock
pub async fn simulate(
    path: &Path,
    page: u64,
    config: Option<&Path>,
    options: SimulateOptions,
    format: &str,
) -> anyhow::Result<()> {
    let store = load_store(path)?;
    let config = load_config(config)?;
    let page = PageId(page);

    // Virtual time: long delays finish instantly
    tokio::time::pause();

    let report = LocalSet::new()
        .run_until(async move { run_simulation(&store, page, &config, options).await })
        .await;

    if OutputFormat::from(format) == OutputFormat::Json {
        return print_json(&report);
    }

    let Some(index) = report.rule_index else {
        println!("Page {}: no match, nothing scheduled", page);
        return Ok(());
    };

    println!("Page {}: rule #{}", page, index);
    print_table(report.timeline);
    println!("Final state: {}", report.final_state);
    println!("Players mounted: {}", report.players_mounted);
    println!(
        "Placeholder: {}",
        if report.placeholder_visible { "visible" } else { "removed" }
    );
    if let Some(failure) = report.failure {
        println!("Failure: [{}] {}", failure.code, failure.message);
    }

    Ok(())
}

async fn run_simulation(
    store: &RuleStore,
    page: PageId,
    config: &EngineConfig,
    options: SimulateOptions,
) -> SimulationReport {
    let surface = MemorySurface::new();
    surface.set_manual_start(options.no_start);

    let Some(matched) = match_rule(store, page) else {
        return SimulationReport::idle(page);
    };
    let selector = matched.rule.selector.clone();
    let delay = clamp_delay(matched.rule.delay_seconds, config.max_delay());

    let parts = selector_parts(&selector);
    if !parts.is_empty() {
        surface.add_element(&parts);
    }

    let start = Instant::now();
    let boot = Engine::boot(store, page, surface.clone(), TokioTimer, config);
    let Some(session) = boot.into_session() else {
        return SimulationReport::idle(page);
    };

    let mut timeline = Vec::new();
    let mut seen = 0;
    let mut record = |transitions: Vec<Transition>| {
        let at_ms = start.elapsed().as_millis() as u64;
        for transition in transitions.into_iter().skip(seen) {
            timeline.push(TimelineRow { at_ms, from: transition.from, to: transition.to });
            seen += 1;
        }
    };
    record(session.transitions());

    if options.missing_target {
        for part in &parts {
            surface.remove_elements(part);
        }
    }

    tokio::time::sleep(delay).await;
    // Let the timer task run at the same instant
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    record(session.transitions());

    tokio::time::sleep(START_GRACE).await;
    record(session.transitions());

    SimulationReport {
        page,
        rule_index: Some(session.rule_index()),
        timeline,
        final_state: session.state(),
        placeholder_visible: session.placeholder_visible(),
        players_mounted: surface.players().len(),
        failure: session.failure(),
    }
}
