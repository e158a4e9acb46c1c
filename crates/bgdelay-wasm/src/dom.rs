//! Browser DOM surface
//!
//! Implements [`Surface`] over `document.querySelectorAll`. Placeholder
//! layers and players are both inserted as the first child of their
//! container, so the final order is player, placeholder, then the
//! container's own content.

use bgdelay_core::{Error, OverlayLayer, PageId, PlayerMount, Result, StartNotifier, Surface};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AddEventListenerOptions, Document, Element, Event, HtmlElement, HtmlVideoElement, Window};

/// Event that counts as "started" for an embed iframe
const EMBED_START_EVENT: &str = "load";
/// Event that counts as "started" for a native video
const NATIVE_START_EVENT: &str = "playing";

/// [`Surface`] backed by the live document
#[derive(Clone)]
pub struct DomSurface {
    window: Window,
    document: Document,
}

impl DomSurface {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| Error::Mount("no window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| Error::Mount("no document".to_string()))?;
        Ok(Self { window, document })
    }

    /// Page id from the body classes (`page-id-N` or `postid-N`)
    pub fn current_page_id(&self) -> PageId {
        self.document
            .body()
            .map(|body| page_id_from_classes(&body.class_name()))
            .unwrap_or(PageId::UNSET)
    }

    fn create(&self, tag: &str) -> Result<Element> {
        self.document.create_element(tag).map_err(mount_error)
    }

    /// Give a statically positioned container a positioning context so
    /// absolutely placed children cover it.
    fn ensure_positioned(&self, node: &Element) {
        let is_static = matches!(
            self.window.get_computed_style(node),
            Ok(Some(style)) if style.get_property_value("position").as_deref() == Ok("static")
        );
        if is_static {
            if let Some(html) = node.dyn_ref::<HtmlElement>() {
                let _ = html.style().set_property("position", "relative");
            }
        }
    }

    fn build_player(&self, player: &PlayerMount) -> Result<Element> {
        match player {
            PlayerMount::Embed { src, allow } => {
                let iframe = self.create("iframe")?;
                iframe.set_attribute("src", src).map_err(mount_error)?;
                iframe.set_attribute("allow", allow).map_err(mount_error)?;
                iframe.set_attribute("frameborder", "0").map_err(mount_error)?;
                iframe.set_attribute("tabindex", "-1").map_err(mount_error)?;
                iframe.set_attribute("aria-hidden", "true").map_err(mount_error)?;
                Ok(iframe)
            }
            PlayerMount::Native { src, muted, loop_video } => {
                let video: HtmlVideoElement = self.create("video")?.unchecked_into();
                video.set_src(src);
                video.set_autoplay(true);
                video.set_muted(*muted);
                video.set_default_muted(*muted);
                video.set_loop(*loop_video);
                video.set_attribute("playsinline", "").map_err(mount_error)?;
                if *muted {
                    video.set_attribute("muted", "").map_err(mount_error)?;
                }
                Ok(video.unchecked_into())
            }
        }
    }
}

impl Surface for DomSurface {
    type Node = Element;
    type Overlay = Element;

    fn query(&self, selector: &str) -> Vec<Element> {
        if selector.trim().is_empty() {
            return Vec::new();
        }
        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(_) => {
                web_sys::console::warn_1(&format!("[bgdelay] Invalid selector: {}", selector).into());
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn mount_player(&self, node: &Element, player: &PlayerMount, started: StartNotifier) -> Result<()> {
        let element = self.build_player(player)?;
        element.set_attribute("style", player.style()).map_err(mount_error)?;

        let event = match player {
            PlayerMount::Embed { .. } => EMBED_START_EVENT,
            PlayerMount::Native { .. } => NATIVE_START_EVENT,
        };
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        let on_start = Closure::once_into_js(move |_event: Event| started.notify());
        element
            .add_event_listener_with_callback_and_add_event_listener_options(
                event,
                on_start.unchecked_ref(),
                &options,
            )
            .map_err(mount_error)?;

        self.ensure_positioned(node);
        node.insert_before(&element, node.first_child().as_ref())
            .map_err(mount_error)?;

        if let Some(video) = element.dyn_ref::<HtmlVideoElement>() {
            // Autoplay may be refused; the placeholder then stays up
            let _ = video.play();
        }
        Ok(())
    }

    fn show_overlay(&self, node: &Element, layer: &OverlayLayer) -> Result<Element> {
        let overlay = self.create("div")?;
        overlay.set_class_name(&layer.class_name);
        overlay.set_attribute("style", &layer.container_style()).map_err(mount_error)?;
        overlay.set_attribute("aria-hidden", "true").map_err(mount_error)?;

        let tint = self.create("div")?;
        tint.set_attribute("style", &layer.tint_style()).map_err(mount_error)?;
        overlay.append_child(&tint).map_err(mount_error)?;

        // Ahead of the section content; players mounted later go in front of it
        self.ensure_positioned(node);
        node.insert_before(&overlay, node.first_child().as_ref())
            .map_err(mount_error)?;
        Ok(overlay)
    }

    fn remove_overlay(&self, overlay: Element) {
        overlay.remove();
    }
}

fn mount_error(value: JsValue) -> Error {
    Error::Mount(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

/// Parse the page id out of a body class list
pub fn page_id_from_classes(classes: &str) -> PageId {
    classes
        .split_whitespace()
        .find_map(|class| {
            class
                .strip_prefix("page-id-")
                .or_else(|| class.strip_prefix("postid-"))
                .and_then(|id| id.parse::<u64>().ok())
        })
        .map(PageId)
        .unwrap_or(PageId::UNSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_from_classes() {
        assert_eq!(page_id_from_classes("home page-template page-id-42 logged-in"), PageId(42));
        assert_eq!(page_id_from_classes("single postid-7"), PageId(7));
        assert_eq!(page_id_from_classes("page-id-abc blog"), PageId::UNSET);
        assert_eq!(page_id_from_classes(""), PageId::UNSET);
    }
}
