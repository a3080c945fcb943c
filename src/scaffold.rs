//! The DOM scaffold (root/viewport/content/items) and the bounded element
//! pool that recycles detached item elements (§4.4).
//!
//! Built directly against `web-sys`, in the hand-rolled style of the
//! teacher crate's `resize_observer` module rather than through a UI
//! framework (framework adapters are out of scope, per §1).

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use crate::builder::Orientation;

/// Default maximum number of detached elements kept alive by the pool.
pub const DEFAULT_POOL_BOUND: usize = 100;

/// The four nested containers that make up a virtualized list's DOM.
#[derive(Debug, Clone)]
pub struct DomScaffold {
    /// Outermost element: `role=listbox`, tabbable, optional label.
    pub root: Element,
    /// Owns `overflow`; the primary scroll source.
    pub viewport: Element,
    /// Main-axis size is set to `total_size` so the native scrollbar
    /// stays proportional.
    pub content: Element,
    /// Positioned-relative container; children are absolutely positioned.
    pub items: Element,
}

impl DomScaffold {
    /// Build the four nested containers under `host` and return a handle
    /// to each. `class_prefix` namespaces the generated class names
    /// (default `"vlist"`, per the `classPrefix` build option).
    pub fn build(document: &Document, host: &Element, class_prefix: &str, orientation: Orientation, aria_label: Option<&str>) -> Self {
        let root = document.create_element("div").expect("create root");
        root.set_attribute("role", "listbox").ok();
        root.set_attribute("tabindex", "0").ok();
        if let Some(label) = aria_label {
            root.set_attribute("aria-label", label).ok();
        }
        if orientation == Orientation::Horizontal {
            root.set_attribute("aria-orientation", "horizontal").ok();
        }
        root.set_class_name(&format!("{class_prefix}"));

        let viewport = document.create_element("div").expect("create viewport");
        viewport.set_class_name(&format!("{class_prefix}__viewport"));
        if let Some(html) = as_html(&viewport) {
            match orientation {
                Orientation::Vertical => html.style().set_property("overflow-y", "auto").ok(),
                Orientation::Horizontal => html.style().set_property("overflow-x", "auto").ok(),
            };
            html.style().set_property("position", "relative").ok();
        }

        let content = document.create_element("div").expect("create content");
        content.set_class_name(&format!("{class_prefix}__content"));
        if let Some(html) = as_html(&content) {
            html.style().set_property("position", "relative").ok();
        }

        let items = document.create_element("div").expect("create items");
        items.set_class_name(&format!("{class_prefix}__items"));
        if let Some(html) = as_html(&items) {
            html.style().set_property("position", "relative").ok();
        }

        content.append_child(&items).expect("attach items");
        viewport.append_child(&content).expect("attach content");
        root.append_child(&viewport).expect("attach viewport");
        host.append_child(&root).expect("attach root to host");

        Self { root, viewport, content, items }
    }

    /// Set the content element's main-axis size, keeping the native
    /// scrollbar proportional to `total_size` pixels.
    pub fn set_content_size(&self, total_size: f64, orientation: Orientation) {
        if let Some(html) = as_html(&self.content) {
            match orientation {
                Orientation::Vertical => html.style().set_property("height", &format!("{total_size}px")).ok(),
                Orientation::Horizontal => html.style().set_property("width", &format!("{total_size}px")).ok(),
            };
        }
    }

    /// Toggle the `{prefix}--scrolling` class on the root element.
    pub fn set_scrolling_class(&self, class_prefix: &str, scrolling: bool) {
        let class = format!("{class_prefix}--scrolling");
        let list = self.root.class_list();
        if scrolling {
            list.add_1(&class).ok();
        } else {
            list.remove_1(&class).ok();
        }
    }

    /// Detach the scaffold from its host, releasing every DOM reference.
    pub fn destroy(&self) {
        if let Some(parent) = self.root.parent_node() {
            parent.remove_child(&self.root).ok();
        }
    }
}

fn as_html(el: &Element) -> Option<HtmlElement> { el.clone().dyn_into::<HtmlElement>().ok() }

/// A bounded recycling stack of detached item elements (§4.4).
///
/// `acquire` pops if non-empty, else allocates via `document.createElement`.
/// `release` strips the element back to a blank slate before pushing;
/// pushing past `bound` simply discards the element instead.
pub struct ElementPool {
    document: Document,
    tag: String,
    class_prefix: String,
    bound: usize,
    free: Vec<Element>,
}

impl ElementPool {
    /// Construct a pool that allocates `tag` elements tagged with the
    /// item semantic role and `{class_prefix}-item` class, bounded at
    /// `bound` (default [`DEFAULT_POOL_BOUND`]).
    pub fn new(document: Document, tag: impl Into<String>, class_prefix: impl Into<String>, bound: usize) -> Self {
        Self {
            document,
            tag: tag.into(),
            class_prefix: class_prefix.into(),
            bound,
            free: Vec::new(),
        }
    }

    /// Number of elements currently sitting in the free stack.
    pub fn free_count(&self) -> usize { self.free.len() }

    /// Acquire a ready-to-use element carrying the item semantic role.
    pub fn acquire(&mut self) -> Element {
        if let Some(el) = self.free.pop() {
            return el;
        }
        let el = self.document.create_element(&self.tag).expect("create item element");
        el.set_attribute("role", "option").ok();
        el.set_class_name(&format!("{}-item", self.class_prefix));
        if let Some(html) = as_html(&el) {
            html.style().set_property("position", "absolute").ok();
        }
        el
    }

    /// Detach `el`, strip its className/inline-styles/dataset/children,
    /// and push it onto the free stack (or discard it if the pool is
    /// already at its bound).
    pub fn release(&mut self, el: Element) {
        if let Some(parent) = el.parent_node() {
            parent.remove_child(&el).ok();
        }
        while let Some(child) = el.first_child() {
            el.remove_child(&child).ok();
        }
        el.set_class_name(&format!("{}-item", self.class_prefix));
        if let Some(html) = as_html(&el) {
            html.set_attribute("style", "").ok();
            html.style().set_property("position", "absolute").ok();
        }
        for attr in ["data-index", "data-id", "aria-selected", "aria-setsize", "aria-posinset"] {
            el.remove_attribute(attr).ok();
        }
        if self.free.len() < self.bound {
            self.free.push(el);
        }
    }
}

impl std::fmt::Debug for ElementPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementPool").field("tag", &self.tag).field("free_count", &self.free.len()).field("bound", &self.bound).finish()
    }
}
