//! Page surface
//!
//! The engine never touches markup directly. A [`Surface`] locates elements
//! by selector and mounts players and placeholder layers into them. The
//! browser implementation lives in `bgdelay-wasm`; [`MemorySurface`] records
//! every effect for tests and the CLI simulator.

use crate::{
    activator::PlayerMount,
    placeholder::OverlayLayer,
    signal::StartNotifier,
    Error, Result,
};
use std::cell::RefCell;
use std::rc::Rc;

/// DOM capability required by the engine
pub trait Surface: Clone + 'static {
    /// Element handle
    type Node: Clone;
    /// Handle to a mounted placeholder layer
    type Overlay;

    /// All elements matching `selector`, in document order
    fn query(&self, selector: &str) -> Vec<Self::Node>;

    /// Mount a player into `node`. The surface calls `started.notify()`
    /// once the player begins playing or loading.
    fn mount_player(&self, node: &Self::Node, player: &PlayerMount, started: StartNotifier) -> Result<()>;

    /// Cover `node` with a placeholder layer
    fn show_overlay(&self, node: &Self::Node, layer: &OverlayLayer) -> Result<Self::Overlay>;

    /// Remove a placeholder layer
    fn remove_overlay(&self, overlay: Self::Overlay);
}

/// Element id inside a [`MemorySurface`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Overlay id inside a [`MemorySurface`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(pub u64);

/// Effect recorded by a [`MemorySurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum DomEvent {
    OverlayShown { node: NodeId, overlay: OverlayId },
    OverlayRemoved { node: NodeId, overlay: OverlayId },
    PlayerMounted { node: NodeId, player: PlayerMount },
    PlayerStarted,
}

#[derive(Default)]
struct MemoryDom {
    elements: Vec<(NodeId, Vec<String>)>,
    next_node: usize,
    next_overlay: u64,
    overlays: Vec<(OverlayId, NodeId, OverlayLayer)>,
    players: Vec<(NodeId, PlayerMount)>,
    pending_starts: Vec<StartNotifier>,
    manual_start: bool,
    mount_failure: Option<String>,
    events: Vec<DomEvent>,
}

/// In-memory page used by tests and the simulator.
///
/// Selectors match by exact string; a selector list (`a, b`) matches any of
/// its parts. Mounted players report start immediately unless
/// [`MemorySurface::set_manual_start`] is enabled.
#[derive(Clone, Default)]
pub struct MemorySurface {
    dom: Rc<RefCell<MemoryDom>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page with one element per selector
    pub fn with_elements(selectors: &[&str]) -> Self {
        let surface = Self::new();
        for selector in selectors {
            surface.add_element(&[selector]);
        }
        surface
    }

    /// Add an element matched by each of `selectors`
    pub fn add_element(&self, selectors: &[&str]) -> NodeId {
        let mut dom = self.dom.borrow_mut();
        let id = NodeId(dom.next_node);
        dom.next_node += 1;
        dom.elements
            .push((id, selectors.iter().map(|s| s.trim().to_string()).collect()));
        id
    }

    /// Remove every element matched by `selector`. Layers already mounted
    /// stay in the record.
    pub fn remove_elements(&self, selector: &str) -> usize {
        let mut dom = self.dom.borrow_mut();
        let before = dom.elements.len();
        dom.elements
            .retain(|(_, selectors)| !selector_matches(selector, selectors));
        before - dom.elements.len()
    }

    /// Hold start notifications until [`MemorySurface::start_players`]
    pub fn set_manual_start(&self, manual: bool) {
        self.dom.borrow_mut().manual_start = manual;
    }

    /// Make every subsequent mount fail with `message`
    pub fn fail_mounts(&self, message: impl Into<String>) {
        self.dom.borrow_mut().mount_failure = Some(message.into());
    }

    /// Deliver held start notifications. Returns how many were delivered.
    pub fn start_players(&self) -> usize {
        let pending = std::mem::take(&mut self.dom.borrow_mut().pending_starts);
        let count = pending.len();
        for notifier in pending {
            self.dom.borrow_mut().events.push(DomEvent::PlayerStarted);
            notifier.notify();
        }
        count
    }

    /// Overlays currently on the page
    pub fn overlays(&self) -> Vec<(NodeId, OverlayLayer)> {
        self.dom
            .borrow()
            .overlays
            .iter()
            .map(|(_, node, layer)| (*node, layer.clone()))
            .collect()
    }

    /// Players mounted so far
    pub fn players(&self) -> Vec<(NodeId, PlayerMount)> {
        self.dom.borrow().players.clone()
    }

    /// Every recorded effect, in order
    pub fn events(&self) -> Vec<DomEvent> {
        self.dom.borrow().events.clone()
    }
}

fn selector_matches(query: &str, selectors: &[String]) -> bool {
    query
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .any(|part| selectors.iter().any(|s| s == part))
}

impl Surface for MemorySurface {
    type Node = NodeId;
    type Overlay = OverlayId;

    fn query(&self, selector: &str) -> Vec<NodeId> {
        self.dom
            .borrow()
            .elements
            .iter()
            .filter(|(_, selectors)| selector_matches(selector, selectors))
            .map(|(id, _)| *id)
            .collect()
    }

    fn mount_player(&self, node: &NodeId, player: &PlayerMount, started: StartNotifier) -> Result<()> {
        let manual = {
            let mut dom = self.dom.borrow_mut();
            if let Some(message) = dom.mount_failure.clone() {
                return Err(Error::Mount(message));
            }
            dom.players.push((*node, player.clone()));
            dom.events.push(DomEvent::PlayerMounted {
                node: *node,
                player: player.clone(),
            });
            if dom.manual_start {
                dom.pending_starts.push(started.clone());
            }
            dom.manual_start
        };

        if !manual {
            self.dom.borrow_mut().events.push(DomEvent::PlayerStarted);
            started.notify();
        }
        Ok(())
    }

    fn show_overlay(&self, node: &NodeId, layer: &OverlayLayer) -> Result<OverlayId> {
        let mut dom = self.dom.borrow_mut();
        let id = OverlayId(dom.next_overlay);
        dom.next_overlay += 1;
        dom.overlays.push((id, *node, layer.clone()));
        dom.events.push(DomEvent::OverlayShown { node: *node, overlay: id });
        Ok(id)
    }

    fn remove_overlay(&self, overlay: OverlayId) {
        let mut dom = self.dom.borrow_mut();
        if let Some(pos) = dom.overlays.iter().position(|(id, _, _)| *id == overlay) {
            let (id, node, _) = dom.overlays.remove(pos);
            dom.events.push(DomEvent::OverlayRemoved { node, overlay: id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_by_selector_list() {
        let surface = MemorySurface::new();
        let a = surface.add_element(&[".hero", "#top"]);
        let b = surface.add_element(&[".footer"]);

        assert_eq!(surface.query(".hero"), vec![a]);
        assert_eq!(surface.query("#top, .footer"), vec![a, b]);
        assert!(surface.query(".missing").is_empty());
        assert!(surface.query("").is_empty());
    }

    #[test]
    fn test_remove_elements() {
        let surface = MemorySurface::with_elements(&[".hero", ".hero", ".other"]);
        assert_eq!(surface.remove_elements(".hero"), 2);
        assert!(surface.query(".hero").is_empty());
        assert_eq!(surface.query(".other").len(), 1);
    }
}
