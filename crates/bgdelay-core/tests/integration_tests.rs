//! Integration tests for bgdelay Core

use bgdelay_core::{
    match_rule, DomEvent, Engine, EngineConfig, EngineState, MemorySurface, Opacity, PageId,
    PlaybackScheduler, PlayerMount, Rule, RuleStore, ScheduleStatus, TokioTimer,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tokio::time::Instant;

fn store(rules: Vec<Rule>) -> RuleStore {
    RuleStore::from_rules(rules)
}

fn boot(rules: Vec<Rule>, page: u64, surface: &MemorySurface) -> bgdelay_core::Boot<MemorySurface, TokioTimer> {
    Engine::boot(
        &store(rules),
        PageId(page),
        surface.clone(),
        TokioTimer,
        &EngineConfig::default(),
    )
}

// =============================================================================
// Matcher Properties
// =============================================================================

#[test]
fn test_match_returns_first_candidate() {
    let rules = vec![
        Rule::page(1, ".a", "abc12345678", 0.0),
        Rule::page(2, ".b", "abc12345678", 0.0),
        Rule::site(".c", "abc12345678", 0.0),
        Rule::site(".d", "abc12345678", 0.0),
    ];
    assert_eq!(match_rule(&rules, PageId(2)).unwrap().index, 1);
    assert_eq!(match_rule(&rules, PageId(7)).unwrap().index, 2);
}

#[test]
fn test_reordering_non_matching_rules_keeps_result() {
    let a = Rule::page(1, ".a", "abc12345678", 0.0);
    let b = Rule::page(2, ".b", "abc12345678", 0.0);
    let winner = Rule::site(".w", "abc12345678", 0.0);

    let first = vec![a.clone(), b.clone(), winner.clone()];
    let swapped = vec![b, a, winner.clone()];
    assert_eq!(match_rule(&first, PageId(5)).unwrap().rule, &winner);
    assert_eq!(match_rule(&swapped, PageId(5)).unwrap().rule, &winner);
}

#[test]
fn test_reordering_matching_rules_changes_winner() {
    let page_rule = Rule::page(9, ".page", "abc12345678", 3.0);
    let site_rule = Rule::site(".site", "abc12345678", 0.0);

    let forward = vec![page_rule.clone(), site_rule.clone()];
    let backward = vec![site_rule.clone(), page_rule.clone()];
    assert_eq!(match_rule(&forward, PageId(9)).unwrap().rule, &page_rule);
    assert_eq!(match_rule(&backward, PageId(9)).unwrap().rule, &site_rule);
}

#[test]
fn test_site_scope_matches_any_page() {
    let rules = vec![Rule::site(".a", "abc12345678", 0.0)];
    for page in [0, 1, 5, u64::MAX] {
        assert!(match_rule(&rules, PageId(page)).is_some(), "page {}", page);
    }
}

#[test]
fn test_page_scope_with_unset_id() {
    let rules = vec![Rule::page(0, ".a", "abc12345678", 0.0)];
    assert!(match_rule(&rules, PageId(0)).is_some());
    assert!(match_rule(&rules, PageId(3)).is_none());
}

#[test]
fn test_opacity_clamp_from_payload() {
    let payload = r#"[
        {"scope":"site","overlay_opacity":-1},
        {"scope":"site","overlay_opacity":0},
        {"scope":"site","overlay_opacity":0.4},
        {"scope":"site","overlay_opacity":1},
        {"scope":"site","overlay_opacity":2}
    ]"#;
    let store = RuleStore::from_json(payload).unwrap();
    let values: Vec<f64> = store.iter().map(|r| r.overlay_opacity.value()).collect();
    assert_eq!(values, vec![0.0, 0.0, 0.4, 1.0, 1.0]);
    assert!(store.iter().all(|r| r.overlay_opacity >= Opacity::new(0.0)));
}

// =============================================================================
// Scheduler on tokio
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduler_zero_delay_is_immediate() {
    LocalSet::new()
        .run_until(async {
            let scheduler = PlaybackScheduler::new(TokioTimer, Duration::from_secs(3600));
            let fired = Rc::new(Cell::new(false));
            let f = Rc::clone(&fired);
            let handle = scheduler.schedule_after(0.0, move || f.set(true));
            assert!(fired.get());
            assert_eq!(handle.status(), ScheduleStatus::Fired);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_two_second_delay_fires_once() {
    LocalSet::new()
        .run_until(async {
            let scheduler = PlaybackScheduler::new(TokioTimer, Duration::from_secs(3600));
            let start = Instant::now();
            let fired_at = Rc::new(RefCell::new(Vec::new()));
            let f = Rc::clone(&fired_at);
            let handle = scheduler.schedule_after(2.0, move || f.borrow_mut().push(Instant::now()));

            tokio::time::sleep(Duration::from_millis(1999)).await;
            assert!(fired_at.borrow().is_empty());

            tokio::time::sleep(Duration::from_secs(8)).await;
            let fired = fired_at.borrow();
            assert_eq!(fired.len(), 1);
            assert!(fired[0] - start >= Duration::from_secs(2));
            assert_eq!(handle.status(), ScheduleStatus::Fired);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_cancel_before_and_after_expiry() {
    LocalSet::new()
        .run_until(async {
            let scheduler = PlaybackScheduler::new(TokioTimer, Duration::from_secs(3600));
            let count = Rc::new(Cell::new(0));

            let c = Rc::clone(&count);
            let mut early = scheduler.schedule_after(2.0, move || c.set(c.get() + 1));
            assert!(early.cancel());

            let c = Rc::clone(&count);
            let mut late = scheduler.schedule_after(1.0, move || c.set(c.get() + 10));

            tokio::time::sleep(Duration::from_secs(10)).await;
            assert_eq!(count.get(), 10);
            assert!(!late.cancel());
            assert_eq!(late.status(), ScheduleStatus::Fired);
            assert_eq!(early.status(), ScheduleStatus::Cancelled);
            assert_eq!(count.get(), 10);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_malformed_delay_treated_as_zero() {
    LocalSet::new()
        .run_until(async {
            let scheduler = PlaybackScheduler::new(TokioTimer, Duration::from_secs(3600));
            for delay in [f64::NAN, f64::NEG_INFINITY, f64::INFINITY, -5.0] {
                let fired = Rc::new(Cell::new(false));
                let f = Rc::clone(&fired);
                scheduler.schedule_after(delay, move || f.set(true));
                assert!(fired.get(), "delay {}", delay);
            }
        })
        .await;
}

// =============================================================================
// End-to-end Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_a_site_rule_zero_delay() {
    LocalSet::new()
        .run_until(async {
            let surface = MemorySurface::with_elements(&[".hero"]);
            surface.set_manual_start(true);
            let session = boot(vec![Rule::site(".hero", "abc12345678", 0.0)], 5, &surface)
                .into_session()
                .unwrap();

            // Activated in the same tick
            assert_eq!(session.state(), EngineState::Activating);
            let players = surface.players();
            assert_eq!(players.len(), 1);
            match &players[0].1 {
                PlayerMount::Embed { src, .. } => {
                    assert!(src.starts_with("https://www.youtube.com/embed/abc12345678?"));
                    assert!(src.contains("autoplay=1"));
                }
                other => panic!("expected embed, got {:?}", other),
            }
            assert_eq!(surface.overlays().len(), 1);

            assert_eq!(surface.start_players(), 1);
            assert_eq!(session.state(), EngineState::Playing);
            assert!(surface.overlays().is_empty());
            assert!(!session.placeholder_visible());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_scenario_b_page_rule_wins_over_later_site_rule() {
    LocalSet::new()
        .run_until(async {
            let surface = MemorySurface::with_elements(&[".page-bg", ".site-bg"]);
            let rules = vec![
                Rule::page(9, ".page-bg", "abc12345678", 3.0),
                Rule::site(".site-bg", "zyx98765432", 0.0),
            ];
            let session = boot(rules, 9, &surface).into_session().unwrap();

            assert_eq!(session.rule_index(), 0);
            assert_eq!(session.rule().delay_seconds, 3.0);
            assert_eq!(session.state(), EngineState::Scheduled);

            tokio::time::sleep(Duration::from_millis(2900)).await;
            assert_eq!(session.state(), EngineState::Scheduled);
            assert!(surface.players().is_empty());

            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(session.state(), EngineState::Playing);
            let players = surface.players();
            assert_eq!(players.len(), 1);
            assert!(players[0].1.src().contains("abc12345678"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_no_rules() {
    LocalSet::new()
        .run_until(async {
            let surface = MemorySurface::with_elements(&[".hero"]);
            for page in [0, 1, 42] {
                assert!(boot(Vec::new(), page, &surface).is_idle());
            }
            tokio::time::sleep(Duration::from_secs(10)).await;
            assert!(surface.events().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_target_missing_at_activation() {
    LocalSet::new()
        .run_until(async {
            let surface = MemorySurface::with_elements(&[".hero"]);
            let session = boot(vec![Rule::site(".hero", "abc12345678", 1.0)], 2, &surface)
                .into_session()
                .unwrap();
            assert_eq!(surface.overlays().len(), 1);

            surface.remove_elements(".hero");
            tokio::time::sleep(Duration::from_secs(10)).await;

            assert_eq!(session.state(), EngineState::Activating);
            assert_eq!(session.failure().unwrap().code, "TARGET_NOT_FOUND");
            assert_eq!(surface.overlays().len(), 1);
            assert!(session.placeholder_visible());
            assert!(!surface.events().contains(&DomEvent::PlayerStarted));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_source_keeps_placeholder() {
    LocalSet::new()
        .run_until(async {
            let surface = MemorySurface::with_elements(&[".hero"]);
            for source in ["not a video", "ftp://host/bg.mp4", "https://www.youtube.com/watch?v=short"] {
                let session = boot(vec![Rule::site(".hero", source, 1.0)], 3, &surface)
                    .into_session()
                    .unwrap();

                tokio::time::sleep(Duration::from_secs(5)).await;

                assert_eq!(session.state(), EngineState::Activating, "{}", source);
                assert_eq!(session.failure().unwrap().code, "UNRESOLVABLE_SOURCE");
                assert!(session.placeholder_visible());
                assert!(!session.state().is_terminal());
            }
            assert!(surface.players().is_empty());
            assert_eq!(surface.overlays().len(), 3);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_session_never_activates() {
    LocalSet::new()
        .run_until(async {
            let surface = MemorySurface::with_elements(&[".hero"]);
            let mut session = boot(vec![Rule::site(".hero", "abc12345678", 2.0)], 2, &surface)
                .into_session()
                .unwrap();

            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(session.cancel());
            tokio::time::sleep(Duration::from_secs(10)).await;

            assert_eq!(session.state(), EngineState::Scheduled);
            assert!(surface.players().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_payload_to_playback() {
    LocalSet::new()
        .run_until(async {
            let payload = r##"[
                {"selector":".hero","video_id":"https://youtu.be/abc12345678","delay":"1.5","scope":"page","page_id":"12","privacy":"1","overlay_color":"#f00","overlay_opacity":"0.6","fallback_image_id":"4","fallback_image_url":"https://example.com/still.jpg"}
            ]"##;
            let store = RuleStore::from_json(payload).unwrap();
            let surface = MemorySurface::with_elements(&[".hero"]);
            let session = Engine::boot(&store, PageId(12), surface.clone(), TokioTimer, &EngineConfig::default())
                .into_session()
                .unwrap();

            let overlays = surface.overlays();
            assert_eq!(overlays.len(), 1);
            assert_eq!(overlays[0].1.tint(), "rgba(255, 0, 0, 0.6)");
            assert_eq!(overlays[0].1.image_url.as_deref(), Some("https://example.com/still.jpg"));

            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(session.state(), EngineState::Playing);
            let players = surface.players();
            assert!(players[0]
                .1
                .src()
                .starts_with("https://www.youtube-nocookie.com/embed/abc12345678?"));
        })
        .await;
}
