//! Engine - wires matcher, scheduler, activator and placeholder together
//!
//! One engine instance serves one page load:
//!
//! ```text
//! Idle ──match──▶ Scheduled ──timer──▶ Activating ──start──▶ Playing
//! ```
//!
//! Failures after the match are contained: they are logged, the state stays
//! `Activating` and the placeholder stays on screen.

use crate::{
    activator::VideoActivator,
    config::EngineConfig,
    matcher::match_rule,
    placeholder::{OverlayLayer, PlaceholderController},
    scheduler::{PlaybackScheduler, ScheduleHandle, ScheduleStatus, TimerBackend},
    store::RuleStore,
    surface::Surface,
    types::{EngineState, PageId, Rule},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, instrument, warn};

/// Recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: EngineState,
    pub to: EngineState,
}

/// Contained activation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub code: &'static str,
    pub message: String,
}

impl From<&Error> for Failure {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code(),
            message: error.to_string(),
        }
    }
}

struct Shared<S: Surface> {
    state: EngineState,
    transitions: Vec<Transition>,
    placeholder: PlaceholderController<S>,
    failure: Option<Failure>,
}

impl<S: Surface> Shared<S> {
    fn transition(&mut self, to: EngineState) -> Result<()> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.transitions.push(Transition { from, to });
        info!(%from, %to, "State transition");
        Ok(())
    }
}

/// Outcome of booting the engine on a page
pub enum Boot<S: Surface, T: TimerBackend> {
    /// No rule applies; nothing was shown or scheduled
    Idle,
    /// A rule matched and its activation is scheduled
    Armed(EngineSession<S, T>),
}

impl<S: Surface, T: TimerBackend> Boot<S, T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Boot::Idle)
    }

    pub fn session(&self) -> Option<&EngineSession<S, T>> {
        match self {
            Boot::Armed(session) => Some(session),
            Boot::Idle => None,
        }
    }

    pub fn into_session(self) -> Option<EngineSession<S, T>> {
        match self {
            Boot::Armed(session) => Some(session),
            Boot::Idle => None,
        }
    }
}

/// Entry point for a page load
pub struct Engine;

impl Engine {
    /// Match a rule for `page` and, if one applies, show its placeholder and
    /// schedule its activation.
    #[instrument(skip_all, fields(page = %page, rules = store.len()))]
    pub fn boot<S, T>(store: &RuleStore, page: PageId, surface: S, timer: T, config: &EngineConfig) -> Boot<S, T>
    where
        S: Surface,
        T: TimerBackend,
    {
        let Some(matched) = match_rule(store, page) else {
            info!("No rule applies to this page");
            return Boot::Idle;
        };

        let rule = matched.rule.clone();
        info!(
            index = matched.index,
            scope = %rule.scope,
            selector = %rule.selector,
            delay_seconds = rule.delay_seconds,
            "Rule matched"
        );

        let shared = Rc::new(RefCell::new(Shared {
            state: EngineState::Idle,
            transitions: Vec::new(),
            placeholder: PlaceholderController::new(surface.clone()),
            failure: None,
        }));

        {
            let layer = OverlayLayer::from_rule(&rule, &config.overlay);
            let targets = surface.query(&rule.selector);
            let mut guard = shared.borrow_mut();
            if let Err(e) = guard.placeholder.show(&layer, &targets) {
                warn!(error = %e, "Placeholder not shown");
            }
            if let Err(e) = guard.transition(EngineState::Scheduled) {
                warn!(error = %e, "Unexpected state");
            }
        }

        let activator = VideoActivator::new(&rule.video_source, rule.privacy_mode, &config.embed);
        if let Err(e) = &activator {
            warn!(error = %e, "Video source will not activate");
        }

        let on_activate = {
            let shared = Rc::clone(&shared);
            let surface = surface.clone();
            let selector = rule.selector.clone();
            move || activate(shared, surface, selector, activator)
        };

        let scheduler = PlaybackScheduler::new(timer, config.max_delay());
        let schedule = scheduler.schedule(&rule, on_activate);

        Boot::Armed(EngineSession {
            rule,
            index: matched.index,
            shared,
            schedule,
        })
    }
}

fn activate<S: Surface>(
    shared: Rc<RefCell<Shared<S>>>,
    surface: S,
    selector: String,
    activator: Result<VideoActivator>,
) {
    if let Err(e) = shared.borrow_mut().transition(EngineState::Activating) {
        warn!(error = %e, "Activation skipped");
        return;
    }

    // No borrow may be held here: a surface can report start synchronously
    let result = activator.and_then(|activator| activator.activate(&surface, &selector));

    match result {
        Ok(handle) => {
            let on_start = Rc::clone(&shared);
            handle.started.on_start(move || {
                let mut guard = on_start.borrow_mut();
                guard.placeholder.hide();
                if let Err(e) = guard.transition(EngineState::Playing) {
                    warn!(error = %e, "Start signal ignored");
                }
            });
        }
        Err(e) => {
            warn!(
                code = e.error_code(),
                recoverable = e.is_recoverable(),
                error = %e,
                "Activation failed, placeholder stays"
            );
            shared.borrow_mut().failure = Some(Failure::from(&e));
        }
    }
}

/// Engine state for one matched rule on one page load
pub struct EngineSession<S: Surface, T: TimerBackend> {
    rule: Rule,
    index: usize,
    shared: Rc<RefCell<Shared<S>>>,
    schedule: ScheduleHandle<T>,
}

impl<S: Surface, T: TimerBackend> EngineSession<S, T> {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Position of the matched rule in the store
    pub fn rule_index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> EngineState {
        self.shared.borrow().state
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.shared.borrow().transitions.clone()
    }

    /// Failure that stopped activation, if any
    pub fn failure(&self) -> Option<Failure> {
        self.shared.borrow().failure.clone()
    }

    pub fn placeholder_visible(&self) -> bool {
        !self.shared.borrow().placeholder.video_started()
    }

    /// Placeholder layers still mounted
    pub fn placeholder_layers(&self) -> usize {
        self.shared.borrow().placeholder.layer_count()
    }

    /// True until the activation timer fires or is cancelled
    pub fn is_pending(&self) -> bool {
        self.schedule.is_pending()
    }

    pub fn schedule_status(&self) -> ScheduleStatus {
        self.schedule.status()
    }

    /// Cancel the pending activation, e.g. when the page is torn down.
    /// No-op once the timer fired.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.schedule.cancel();
        if cancelled {
            info!(index = self.index, "Engine session cancelled");
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use std::cell::Cell;
    use std::time::Duration;

    /// Timer that never fires on its own
    #[derive(Clone, Default)]
    struct HeldTimer {
        callbacks: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
        armed: Rc<Cell<usize>>,
    }

    impl HeldTimer {
        fn fire(&self) {
            let callbacks = std::mem::take(&mut *self.callbacks.borrow_mut());
            for cb in callbacks {
                cb();
            }
        }
    }

    impl TimerBackend for HeldTimer {
        type Handle = ();

        fn set_timeout(&self, _delay: Duration, callback: Box<dyn FnOnce()>) -> Self::Handle {
            self.armed.set(self.armed.get() + 1);
            self.callbacks.borrow_mut().push(callback);
        }

        fn clear_timeout(&self, _handle: ()) {
            self.callbacks.borrow_mut().clear();
        }
    }

    fn store(rules: Vec<Rule>) -> RuleStore {
        RuleStore::from_rules(rules)
    }

    #[test]
    fn test_boot_idle_when_nothing_matches() {
        let surface = MemorySurface::with_elements(&[".bg"]);
        let timer = HeldTimer::default();
        let boot = Engine::boot(
            &store(vec![Rule::page(3, ".bg", "abc12345678", 1.0)]),
            PageId(4),
            surface.clone(),
            timer.clone(),
            &EngineConfig::default(),
        );
        assert!(boot.is_idle());
        assert!(surface.events().is_empty());
        assert_eq!(timer.armed.get(), 0);
    }

    #[test]
    fn test_full_lifecycle_with_manual_start() {
        let surface = MemorySurface::with_elements(&[".bg"]);
        surface.set_manual_start(true);
        let timer = HeldTimer::default();

        let session = Engine::boot(
            &store(vec![Rule::site(".bg", "abc12345678", 2.0)]),
            PageId(1),
            surface.clone(),
            timer.clone(),
            &EngineConfig::default(),
        )
        .into_session()
        .unwrap();

        assert_eq!(session.state(), EngineState::Scheduled);
        assert!(session.is_pending());
        assert_eq!(session.placeholder_layers(), 1);
        assert!(surface.players().is_empty());

        timer.fire();
        assert!(!session.is_pending());
        assert_eq!(session.state(), EngineState::Activating);
        assert_eq!(surface.players().len(), 1);
        assert!(session.placeholder_visible());

        surface.start_players();
        assert_eq!(session.state(), EngineState::Playing);
        assert!(surface.overlays().is_empty());
        assert!(!session.placeholder_visible());
        assert_eq!(session.placeholder_layers(), 0);
        assert!(session.state().is_terminal());
        assert_eq!(
            session.transitions(),
            vec![
                Transition { from: EngineState::Idle, to: EngineState::Scheduled },
                Transition { from: EngineState::Scheduled, to: EngineState::Activating },
                Transition { from: EngineState::Activating, to: EngineState::Playing },
            ]
        );
    }

    #[test]
    fn test_unresolvable_source_keeps_placeholder() {
        let surface = MemorySurface::with_elements(&[".bg"]);
        let timer = HeldTimer::default();
        let session = Engine::boot(
            &store(vec![Rule::site(".bg", "not a video", 1.0)]),
            PageId(1),
            surface.clone(),
            timer.clone(),
            &EngineConfig::default(),
        )
        .into_session()
        .unwrap();

        timer.fire();
        assert_eq!(session.state(), EngineState::Activating);
        assert_eq!(session.failure().unwrap().code, "UNRESOLVABLE_SOURCE");
        assert_eq!(surface.overlays().len(), 1);
        assert!(session.placeholder_visible());
        assert_eq!(session.placeholder_layers(), 1);
        assert!(surface.players().is_empty());
    }

    #[test]
    fn test_cancel_before_expiry() {
        let surface = MemorySurface::with_elements(&[".bg"]);
        let timer = HeldTimer::default();
        let mut session = Engine::boot(
            &store(vec![Rule::site(".bg", "abc12345678", 5.0)]),
            PageId(1),
            surface.clone(),
            timer.clone(),
            &EngineConfig::default(),
        )
        .into_session()
        .unwrap();

        assert!(session.cancel());
        timer.fire();
        assert_eq!(session.state(), EngineState::Scheduled);
        assert_eq!(session.schedule_status(), ScheduleStatus::Cancelled);
        assert!(surface.players().is_empty());
        assert!(!session.cancel());
    }
}
