//! Config validation, DOM construction, feature wiring and the public API
//! of the built instance (§4.9, §6).
//!
//! Mirrors the teacher crate's `VirtualListProps`/`Component::create` split
//! (validate → construct → initial render) but as a plain builder rather
//! than a framework component, since framework adapters sit outside the
//! core (§1).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::prelude::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element};

use crate::compression::{self, CompressionConfig, Momentum, TouchDrag};
use crate::data_manager::{DataManager, InMemoryDataManager, Item};
use crate::error::{BuildError, ConfigError, ContainerNotFoundError};
use crate::event_bus::{Direction, EventBus, EventKind, VListEvent};
use crate::range::{self, Range};
use crate::resize_observer::ResizeObserver;
use crate::scaffold::{DomScaffold, ElementPool, DEFAULT_POOL_BOUND};
use crate::scroll_controller::{Align, ScrollBehavior, ScrollController};
use crate::size_cache::SizeCache;
use crate::velocity::VelocityTracker;

/// Main-axis orientation of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Items stack top-to-bottom; scrolling is vertical.
    Vertical,
    /// Items stack left-to-right; scrolling is horizontal.
    Horizontal,
}

/// Render state handed to the template function for each item, per §4.5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderState {
    /// Whether the selection feature currently marks this item selected.
    pub selected: bool,
    /// Whether this item holds keyboard focus.
    pub focused: bool,
}

/// What a template function produces for one item.
#[derive(Debug)]
pub enum TemplateOutput {
    /// Written via `innerHTML`.
    Html(String),
    /// Swapped in as the element's sole child.
    Element(Element),
}

/// `(item, index, state) -> string | element`.
pub type TemplateFn<T> = Rc<dyn Fn(&Item<T>, usize, RenderState) -> TemplateOutput>;

/// `item.height` / `item.width`: a positive number, or `(index) -> number`.
#[derive(Clone)]
pub enum ItemSizeOption {
    /// A fixed size shared by every item.
    Fixed(f64),
    /// A per-index size function.
    Fn(Rc<dyn Fn(usize) -> f64>),
}

impl std::fmt::Debug for ItemSizeOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(size) => f.debug_tuple("Fixed").field(size).finish(),
            Self::Fn(_) => f.debug_tuple("Fn").field(&"<function ptr>").finish(),
        }
    }
}

/// How `container` resolves to a host element.
#[derive(Debug)]
pub enum ContainerOption {
    /// A CSS selector, resolved via `document.querySelector`.
    Selector(String),
    /// An already-resolved element.
    Element(Element),
}

/// Validated (and partially defaulted) builder configuration.
pub struct BuildConfig<T> {
    /// See [`ContainerOption`].
    pub container: ContainerOption,
    /// See [`ItemSizeOption`].
    pub item_size: ItemSizeOption,
    /// See [`TemplateFn`].
    pub template: TemplateFn<T>,
    /// Initial data (optional if an adapter is configured by a feature).
    pub items: Option<Vec<Item<T>>>,
    /// Declared item count, used before `items`/adapter loads in for a
    /// variable cache; for `items: Some(_)` this is inferred.
    pub item_count: usize,
    /// Extra items rendered beyond the visible range on each side.
    pub overscan: usize,
    /// See [`Orientation`].
    pub orientation: Orientation,
    /// Jump to the last item on build and stick to the bottom if already there.
    pub reverse: bool,
    /// Accessible name on the root element.
    pub aria_label: Option<String>,
    /// Class name prefix; default `"vlist"`.
    pub class_prefix: String,
    /// Enable wheel interception while compressed.
    pub scroll_wheel: bool,
    /// Wrap indices modulo total in `scrollToIndex`.
    pub scroll_wrap: bool,
    /// Milliseconds before the scrolling class is dropped.
    pub idle_timeout_ms: f64,
    /// Compression / momentum tuning.
    pub compression: CompressionConfig,
    /// Element pool upper bound.
    pub pool_bound: usize,
}

impl<T> std::fmt::Debug for BuildConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildConfig")
            .field("item_size", &self.item_size)
            .field("item_count", &self.item_count)
            .field("overscan", &self.overscan)
            .field("orientation", &self.orientation)
            .field("reverse", &self.reverse)
            .field("class_prefix", &self.class_prefix)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl<T> BuildConfig<T> {
    /// A config with every option at its documented default except the
    /// three that must be supplied by the caller.
    pub fn new(container: ContainerOption, item_size: ItemSizeOption, template: TemplateFn<T>) -> Self {
        Self {
            container,
            item_size,
            template,
            items: None,
            item_count: 0,
            overscan: 3,
            orientation: Orientation::Vertical,
            reverse: false,
            aria_label: None,
            class_prefix: "vlist".to_string(),
            scroll_wheel: true,
            scroll_wrap: false,
            idle_timeout_ms: 150.0,
            compression: CompressionConfig::default(),
            pool_bound: DEFAULT_POOL_BOUND,
        }
    }

    /// Validate option combinations required up front (§4.9), independent
    /// of feature-specific conflicts (checked by [`Builder::build`]).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orientation == Orientation::Horizontal && self.reverse {
            return Err(ConfigError::HorizontalReverseConflict);
        }
        Ok(())
    }

    fn resolve_item_count(&self) -> usize {
        self.items.as_ref().map(Vec::len).unwrap_or(self.item_count)
    }
}

/// One-way lifecycle state machine (§4.10): constructing → initialized → destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Between `build()` starting and the initial render completing.
    Constructing,
    /// Normal operating state; every public method is live.
    Initialized,
    /// After `destroy()`; every entry point is a no-op.
    Destroyed,
}

/// A named, prioritized extension point (§4.9, §4.11).
///
/// Registered before `build`; `setup` is called once, in ascending
/// priority order, with mutable access to the engine's extension slots.
/// `destroy` hooks run in reverse order.
pub trait Feature<T> {
    /// Stable name, used for method-collision diagnostics.
    fn name(&self) -> &'static str;
    /// Lower runs first. Default 50.
    fn priority(&self) -> u32 { 50 }
    /// Wire this feature's behavior into the engine.
    fn setup(&mut self, ctx: &mut FeatureCtx<T>) -> Result<(), ConfigError>;
    /// Tear down anything this feature registered. Default no-op.
    fn destroy(&mut self, _ctx: &mut FeatureCtx<T>) {}
}

type AfterScrollHook<T> = Box<dyn Fn(&mut Core<T>)>;
type ResizeHook<T> = Box<dyn Fn(&mut Core<T>, f64, f64)>;
type ItemsOverride<T> = Rc<dyn Fn(&Core<T>) -> Vec<Item<T>>>;
type TotalOverride<T> = Rc<dyn Fn(&Core<T>) -> usize>;
type RawEventHook<T> = Box<dyn Fn(&mut Core<T>, &web_sys::Event)>;

/// Extension points handed to each [`Feature::setup`] / [`Feature::destroy`].
///
/// Owns the registration arrays named in §4.9: `afterScroll`,
/// `resizeHandlers`, and the `items`/`total` override slots (the two base
/// methods the spec calls out as plugin-replaceable). Passed as an
/// explicit parameter rather than held by the features themselves, per
/// the "cyclic references" guidance in §9.
pub struct FeatureCtx<T> {
    /// The DOM scaffold, for features that need direct DOM access
    /// (sticky headers, a custom scrollbar thumb).
    pub scaffold: DomScaffold,
    /// Shared event bus.
    pub bus: EventBus,
    /// Class name prefix in effect.
    pub class_prefix: String,
    /// Main-axis orientation, resolved from the build config.
    pub orientation: Orientation,
    /// Whether the list was built in reverse mode.
    pub reverse: bool,
    pub(crate) after_scroll: Vec<AfterScrollHook<T>>,
    pub(crate) resize_handlers: Vec<ResizeHook<T>>,
    pub(crate) items_override: Option<(&'static str, ItemsOverride<T>)>,
    pub(crate) total_override: Option<(&'static str, TotalOverride<T>)>,
    pub(crate) data_override: Option<(&'static str, Box<dyn DataManager<T>>)>,
    pub(crate) raw_listeners: Vec<(Element, &'static str, RawEventHook<T>)>,
}

impl<T> std::fmt::Debug for FeatureCtx<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureCtx")
            .field("class_prefix", &self.class_prefix)
            .field("after_scroll_count", &self.after_scroll.len())
            .field("resize_handlers_count", &self.resize_handlers.len())
            .field("raw_listener_count", &self.raw_listeners.len())
            .finish_non_exhaustive()
    }
}

impl<T> FeatureCtx<T> {
    /// Register a hook run after every scroll tick's range recomputation.
    pub fn on_after_scroll(&mut self, hook: impl Fn(&mut Core<T>) + 'static) { self.after_scroll.push(Box::new(hook)); }

    /// Register a hook run whenever the host container resizes.
    pub fn on_resize(&mut self, hook: impl Fn(&mut Core<T>, f64, f64) + 'static) { self.resize_handlers.push(Box::new(hook)); }

    /// Replace the base `items` accessor. Errors if another feature
    /// already claimed this slot (§4.9 method-collision rejection).
    pub fn override_items(&mut self, feature: &'static str, f: impl Fn(&Core<T>) -> Vec<Item<T>> + 'static) -> Result<(), ConfigError> {
        if let Some((first, _)) = self.items_override {
            return Err(ConfigError::MethodCollision { first, second: feature, method: "items" });
        }
        self.items_override = Some((feature, Rc::new(f)));
        Ok(())
    }

    /// Replace the base `total` accessor. Errors on collision, as above.
    pub fn override_total(&mut self, feature: &'static str, f: impl Fn(&Core<T>) -> usize + 'static) -> Result<(), ConfigError> {
        if let Some((first, _)) = self.total_override {
            return Err(ConfigError::MethodCollision { first, second: feature, method: "total" });
        }
        self.total_override = Some((feature, Rc::new(f)));
        Ok(())
    }

    /// Replace the backing data manager wholesale (the async-data
    /// feature's entry point). Errors on collision, as above — at most
    /// one feature may own the data manager.
    pub fn override_data(&mut self, feature: &'static str, data: Box<dyn DataManager<T>>) -> Result<(), ConfigError> {
        if let Some((first, _)) = self.data_override {
            return Err(ConfigError::MethodCollision { first, second: feature, method: "data" });
        }
        self.data_override = Some((feature, data));
        Ok(())
    }

    /// Subscribe a feature-owned handler directly to a raw DOM event on
    /// `target`, with mutable access to the engine core. Collected here
    /// and wired by [`Builder::build`] once the core exists, mirroring
    /// how `after_scroll`/`resize_handlers` are collected then adopted
    /// (features never hold the core themselves, to avoid cyclic `Rc`s).
    pub fn on_raw_event(&mut self, target: &Element, kind: &'static str, hook: impl Fn(&mut Core<T>, &web_sys::Event) + 'static) {
        self.raw_listeners.push((target.clone(), kind, Box::new(hook)));
    }
}

/// Rendered-index-map entry: the materialized element plus the id it was
/// last rendered with (§3 identity invariant).
struct Rendered {
    element: Element,
    id: String,
}

/// The engine's mutable core. Lives behind `Rc<RefCell<_>>` so DOM event
/// closures can reach back into it.
pub struct Core<T> {
    document: Document,
    pub(crate) scaffold: DomScaffold,
    pool: ElementPool,
    pub(crate) size_cache: SizeCache,
    pub(crate) data: Box<dyn DataManager<T>>,
    pub(crate) scroll: ScrollController,
    velocity: VelocityTracker,
    touch: Option<TouchDrag>,
    momentum: Option<Momentum>,
    pub(crate) bus: EventBus,
    template: TemplateFn<T>,
    config_overscan: usize,
    pub(crate) orientation: Orientation,
    pub(crate) class_prefix: String,
    compression: CompressionConfig,
    rendered: HashMap<usize, Rendered>,
    pub(crate) last_render_range: Range,
    last_total_for_aria: usize,
    pub(crate) actual_size: f64,
    pub(crate) selected: std::collections::HashSet<String>,
    pub(crate) focused: Option<usize>,
    pub(crate) state: LifecycleState,
    items_override: Option<ItemsOverride<T>>,
    total_override: Option<TotalOverride<T>>,
    after_scroll: Vec<AfterScrollHook<T>>,
    resize_handlers: Vec<ResizeHook<T>>,
    last_container_size: f64,
    idle_timeout_ms: f64,
    last_touch_velocity: f64,
}

impl<T> std::fmt::Debug for Core<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("orientation", &self.orientation)
            .field("class_prefix", &self.class_prefix)
            .field("state", &self.state)
            .field("rendered_count", &self.rendered.len())
            .field("actual_size", &self.actual_size)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> Core<T> {
    pub(crate) fn total(&self) -> usize {
        if let Some(f) = &self.total_override {
            f(self)
        } else {
            self.data.total()
        }
    }

    pub(crate) fn item_at(&self, index: usize) -> Option<Item<T>> {
        if let Some(f) = &self.items_override {
            f(self).get(index).cloned()
        } else {
            self.data.get(index)
        }
    }

    /// Iterate over the elements currently materialized for a render
    /// pass, for features that post-process layout (grid cell
    /// placement, scrollbar geometry) without owning the pool.
    pub(crate) fn for_each_rendered(&self, mut f: impl FnMut(usize, &Element)) {
        for (index, entry) in self.rendered.iter() {
            f(*index, &entry.element);
        }
    }

    fn is_compressed(&self) -> bool { compression::is_compressed(self.actual_size, &self.compression) }

    /// Recompute the size cache's logical total size after a data mutation.
    pub(crate) fn recompute_actual_size(&mut self) {
        self.actual_size = self.size_cache.total_size();
        let total = self.size_cache.total_size();
        self.scaffold.set_content_size(compression::physical_total_size(total, &self.compression), self.orientation);
    }

    pub(crate) fn container_size(&self) -> f64 {
        self.scaffold
            .viewport
            .clone()
            .dyn_into::<web_sys::HtmlElement>()
            .map(|el| match self.orientation {
                Orientation::Vertical => el.client_height() as f64,
                Orientation::Horizontal => el.client_width() as f64,
            })
            .unwrap_or(0.0)
    }

    /// The core render pass: §4.5 steps 1–5.
    pub(crate) fn render(&mut self, force: bool) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        let total = self.total();
        let container_size = self.container_size();
        let position = self.scroll.position();
        let visible = range::visible_range(&self.size_cache, position, container_size);
        let render_range = range::render_range(visible, total, self.config_overscan);
        let range_changed = render_range != self.last_render_range;

        if !force {
            if !range_changed && !self.is_compressed() {
                return;
            }
            if !range_changed && self.is_compressed() {
                self.reposition_all(position);
                return;
            }
        }

        let (to_release, _to_acquire) = range::symmetric_diff(self.last_render_range, render_range, total);
        for idx in to_release {
            if let Some(entry) = self.rendered.remove(&idx) {
                self.pool.release(entry.element);
            }
        }

        let total_changed = total != self.last_total_for_aria;
        let fragment = self.document.create_document_fragment();
        if total > 0 {
            for idx in render_range.start..=render_range.end {
                let Some(item) = self.item_at(idx) else { continue };
                let existing = self.rendered.get(&idx).map(|r| (r.element.clone(), r.id.clone()));
                let newly_materialized = existing.is_none();
                match existing {
                    Some((element, id)) if id == item.id => {
                        self.position_item(&element, idx, position);
                        self.apply_selection_classes(&element, &item.id, idx);
                    }
                    Some((element, _old_id)) => {
                        self.apply_template(&element, &item, idx);
                        self.position_item(&element, idx, position);
                        self.rendered.insert(idx, Rendered { element, id: item.id.clone() });
                    }
                    None => {
                        let element = self.pool.acquire();
                        self.apply_template(&element, &item, idx);
                        self.position_item(&element, idx, position);
                        fragment.append_child(&element).ok();
                        self.rendered.insert(idx, Rendered { element, id: item.id.clone() });
                    }
                }
                self.write_aria(idx, total, total_changed || newly_materialized);
            }
        }
        self.scaffold.items.append_child(&fragment).ok();

        self.last_render_range = render_range;
        self.last_total_for_aria = total;
        if range_changed || force {
            self.bus.emit(VListEvent::RangeChange { range: render_range });
        }
    }

    fn reposition_all(&mut self, logical_position: f64) {
        let entries: Vec<(usize, Element)> = self.rendered.iter().map(|(i, r)| (*i, r.element.clone())).collect();
        for (idx, el) in entries {
            self.position_item(&el, idx, logical_position);
        }
    }

    fn position_item(&self, el: &Element, index: usize, logical_position: f64) {
        let offset = self.size_cache.offset(index);
        let translate = if self.is_compressed() {
            compression::reposition_for_compression(&self.size_cache, index, logical_position)
        } else {
            offset - logical_position
        };
        if let Ok(html) = el.clone().dyn_into::<web_sys::HtmlElement>() {
            let transform = match self.orientation {
                Orientation::Vertical => format!("translateY({translate}px)"),
                Orientation::Horizontal => format!("translateX({translate}px)"),
            };
            html.style().set_property("transform", &transform).ok();
            let size = self.size_cache.size(index);
            match self.orientation {
                Orientation::Vertical => html.style().set_property("height", &format!("{size}px")).ok(),
                Orientation::Horizontal => html.style().set_property("width", &format!("{size}px")).ok(),
            };
        }
        el.set_attribute("data-index", &index.to_string()).ok();
    }

    fn apply_template(&self, el: &Element, item: &Item<T>, index: usize) {
        let state = RenderState {
            selected: self.selected.contains(&item.id),
            focused: self.focused == Some(index),
        };
        match (self.template)(item, index, state) {
            TemplateOutput::Html(html) => el.set_inner_html(&html),
            TemplateOutput::Element(child) => {
                while let Some(c) = el.first_child() {
                    el.remove_child(&c).ok();
                }
                el.append_child(&child).ok();
            }
        }
        el.set_attribute("data-id", &item.id).ok();
        self.apply_selection_classes(el, &item.id, index);
        let class = format!("{}-item--placeholder", self.class_prefix);
        if item.id.starts_with(crate::data_manager::PLACEHOLDER_ID_PREFIX) {
            el.class_list().add_1(&class).ok();
        } else {
            el.class_list().remove_1(&class).ok();
        }
    }

    fn apply_selection_classes(&self, el: &Element, id: &str, index: usize) {
        let selected = self.selected.contains(id);
        el.set_attribute("aria-selected", if selected { "true" } else { "false" }).ok();
        let class = format!("{}-item--selected", self.class_prefix);
        if selected {
            el.class_list().add_1(&class).ok();
        } else {
            el.class_list().remove_1(&class).ok();
        }
        let _ = index;
    }

    /// `aria-posinset` is rewritten unconditionally (an index can be
    /// reassigned to a recycled element every render); `aria-setsize` is
    /// only rewritten when the total actually changed, or the element is
    /// newly materialized and has never carried one (spec.md §4.5).
    fn write_aria(&self, index: usize, total: usize, write_setsize: bool) {
        if let Some(entry) = self.rendered.get(&index) {
            entry.element.set_attribute("aria-posinset", &(index + 1).to_string()).ok();
            if write_setsize {
                entry.element.set_attribute("aria-setsize", &total.to_string()).ok();
            }
        }
    }
}

/// The builder: accumulates config and features, then constructs the
/// engine and performs the initial render.
pub struct Builder<T> {
    config: BuildConfig<T>,
    features: Vec<Box<dyn Feature<T>>>,
}

impl<T> std::fmt::Debug for Builder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder").field("config", &self.config).field("feature_count", &self.features.len()).finish()
    }
}

impl<T: Clone + 'static> Builder<T> {
    /// Start a builder from a validated config.
    pub fn new(config: BuildConfig<T>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, features: Vec::new() })
    }

    /// Register a feature. Order of registration does not matter; features
    /// run in ascending `priority()` order at build time.
    pub fn with_feature(mut self, feature: Box<dyn Feature<T>>) -> Self {
        self.features.push(feature);
        self
    }

    /// Validate, construct the DOM, instantiate components, run feature
    /// setup, and perform the initial render.
    pub fn build(mut self, document: Document) -> Result<VirtualList<T>, BuildError> {
        let host = match &self.config.container {
            ContainerOption::Element(el) => el.clone(),
            ContainerOption::Selector(sel) => document
                .query_selector(sel)
                .ok()
                .flatten()
                .ok_or_else(|| ContainerNotFoundError(sel.clone()))?,
        };

        let scaffold = DomScaffold::build(&document, &host, &self.config.class_prefix, self.config.orientation, self.config.aria_label.as_deref());

        let item_count = self.config.resolve_item_count();
        let size_cache = match &self.config.item_size {
            ItemSizeOption::Fixed(h) => SizeCache::uniform(*h, item_count),
            ItemSizeOption::Fn(f) => SizeCache::variable(f.clone(), item_count)?,
        };

        let bus = EventBus::new();
        let pool = ElementPool::new(document.clone(), "div", self.config.class_prefix.clone(), self.config.pool_bound);

        self.features.sort_by_key(|f| f.priority());

        let mut ctx = FeatureCtx {
            scaffold: scaffold.clone(),
            bus: bus.clone(),
            class_prefix: self.config.class_prefix.clone(),
            orientation: self.config.orientation,
            reverse: self.config.reverse,
            after_scroll: Vec::new(),
            resize_handlers: Vec::new(),
            items_override: None,
            total_override: None,
            data_override: None,
            raw_listeners: Vec::new(),
        };
        for feature in self.features.iter_mut() {
            feature.setup(&mut ctx)?;
        }
        let raw_listeners = std::mem::take(&mut ctx.raw_listeners);
        let data: Box<dyn DataManager<T>> = match ctx.data_override.take() {
            Some((_, data)) => data,
            None => Box::new(InMemoryDataManager::new(self.config.items.clone().unwrap_or_default())),
        };

        let actual_size = size_cache.total_size();
        scaffold.set_content_size(compression::physical_total_size(actual_size, &self.config.compression), self.config.orientation);

        let core = Core {
            document,
            scaffold,
            pool,
            size_cache,
            data,
            scroll: ScrollController::new(0.0, self.config.scroll_wrap),
            velocity: VelocityTracker::new(),
            touch: None,
            momentum: None,
            bus,
            template: self.config.template.clone(),
            config_overscan: self.config.overscan,
            orientation: self.config.orientation,
            class_prefix: self.config.class_prefix.clone(),
            compression: self.config.compression,
            rendered: HashMap::new(),
            last_render_range: Range { start: 1, end: 0 }, // sentinel: never equal to a real range
            last_total_for_aria: usize::MAX,
            actual_size,
            selected: std::collections::HashSet::new(),
            focused: None,
            state: LifecycleState::Constructing,
            items_override: ctx.items_override.map(|(_, f)| f),
            total_override: ctx.total_override.map(|(_, f)| f),
            after_scroll: ctx.after_scroll,
            resize_handlers: ctx.resize_handlers,
            last_container_size: 0.0,
            idle_timeout_ms: self.config.idle_timeout_ms,
            last_touch_velocity: 0.0,
        };

        let list = VirtualList {
            inner: Rc::new(RefCell::new(core)),
            features: Rc::new(RefCell::new(self.features)),
            listeners: Rc::new(RefCell::new(Listeners::default())),
        };

        list.wire_events();
        list.wire_resize_observer();
        for (target, kind, hook) in raw_listeners {
            let inner = list.inner.clone();
            let closure = Closure::wrap(Box::new(move |ev: web_sys::Event| {
                let mut core = inner.borrow_mut();
                if core.state == LifecycleState::Destroyed {
                    return;
                }
                hook(&mut core, &ev);
            }) as Box<dyn FnMut(web_sys::Event)>);
            target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref()).ok();
            list.listeners.borrow_mut().closures.push(Box::new(closure));
        }
        {
            let mut core = list.inner.borrow_mut();
            let size = core.container_size();
            core.last_container_size = size;
            core.scroll.set_container_size(size);
            core.render(true);
            core.state = LifecycleState::Initialized;
        }
        if self.config.reverse {
            let total = list.inner.borrow().total();
            if total > 0 {
                list.scroll_to_index(total - 1, Align::End, ScrollBehavior::Auto);
            }
        }

        Ok(list)
    }
}

#[derive(Default)]
struct Listeners {
    closures: Vec<Box<dyn std::any::Any>>,
    idle_timeout: Option<gloo_timers::callback::Timeout>,
}

/// The public API of a built instance (§6).
#[derive(Clone)]
pub struct VirtualList<T> {
    inner: Rc<RefCell<Core<T>>>,
    features: Rc<RefCell<Vec<Box<dyn Feature<T>>>>>,
    listeners: Rc<RefCell<Listeners>>,
}

impl<T> std::fmt::Debug for VirtualList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualList").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> VirtualList<T> {
    /// The root DOM node.
    pub fn element(&self) -> Element { self.inner.borrow().scaffold.root.clone() }

    /// Current logical item total.
    pub fn total(&self) -> usize { self.inner.borrow().total() }

    /// Replace the data set wholesale; rebuilds the size cache, updates
    /// the content size, and force-renders (§4.8).
    pub fn set_items(&self, items: Vec<Item<T>>, size_fn: Option<Rc<dyn Fn(usize) -> f64>>) {
        let mut core = self.inner.borrow_mut();
        if core.state == LifecycleState::Destroyed {
            return;
        }
        let n = items.len();
        core.data = Box::new(InMemoryDataManager::new(items));
        if let Some(f) = size_fn {
            core.size_cache = SizeCache::Variable { f, offsets: vec![0.0] };
        }
        let _ = core.size_cache.rebuild(n);
        core.recompute_actual_size();
        core.render(true);
    }

    /// Patch item `index` in place (index-keyed variant of `updateItem`).
    pub fn update_item(&self, index: usize, patch: impl FnOnce(&mut T)) {
        let mut core = self.inner.borrow_mut();
        if core.state == LifecycleState::Destroyed {
            return;
        }
        if let Some(manager) = core.data.as_any_mut().downcast_mut::<InMemoryDataManager<T>>() {
            manager.update_item(index, patch);
        }
        core.render(true);
    }

    /// Remove the item at `index` (index-keyed variant of `removeItem`).
    pub fn remove_item(&self, index: usize) {
        let mut core = self.inner.borrow_mut();
        if core.state == LifecycleState::Destroyed {
            return;
        }
        let n = if let Some(manager) = core.data.as_any_mut().downcast_mut::<InMemoryDataManager<T>>() {
            manager.remove_item(index);
            manager.total()
        } else {
            core.size_cache.total()
        };
        let _ = core.size_cache.rebuild(n);
        core.recompute_actual_size();
        core.render(true);
    }

    /// Scroll so that `index` is aligned per `align`, optionally animated.
    pub fn scroll_to_index(&self, index: usize, align: Align, behavior: ScrollBehavior) {
        let mut core = self.inner.borrow_mut();
        if core.state == LifecycleState::Destroyed {
            return;
        }
        let cache = core.size_cache.clone();
        core.scroll.scroll_to_index(&cache, index, align, behavior, 0.0);
        if matches!(behavior, ScrollBehavior::Auto) {
            core.render(true);
        } else {
            drop(core);
            self.drive_animation();
        }
    }

    fn drive_animation(&self) {
        let inner = self.inner.clone();
        let tick = Rc::new(RefCell::new(None::<Closure<dyn FnMut(f64)>>));
        let tick2 = tick.clone();
        *tick.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
            let mut core = inner.borrow_mut();
            if core.state == LifecycleState::Destroyed {
                return;
            }
            let total_size = core.size_cache.total_size();
            let still_running = core.scroll.tick(now, total_size);
            core.render(true);
            if still_running {
                if let Some(window) = web_sys::window() {
                    if let Some(cb) = tick2.borrow().as_ref() {
                        window.request_animation_frame(cb.as_ref().unchecked_ref()).ok();
                    }
                }
            }
        }) as Box<dyn FnMut(f64)>));
        if let Some(window) = web_sys::window() {
            if let Some(cb) = tick.borrow().as_ref() {
                window.request_animation_frame(cb.as_ref().unchecked_ref()).ok();
            }
        }
        self.listeners.borrow_mut().closures.push(Box::new(tick));
    }

    /// Drive an in-flight touch-flick [`Momentum`] via `requestAnimationFrame`
    /// until it decays below threshold or the position clamps at an edge.
    fn drive_momentum(&self) {
        let inner = self.inner.clone();
        let listeners = self.listeners.clone();
        let tick = Rc::new(RefCell::new(None::<Closure<dyn FnMut(f64)>>));
        let tick2 = tick.clone();
        let last_time = Rc::new(RefCell::new(None::<f64>));
        *tick.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
            let mut core = inner.borrow_mut();
            if core.state == LifecycleState::Destroyed || core.momentum.is_none() {
                return;
            }
            let dt = {
                let mut last = last_time.borrow_mut();
                let dt = last.map(|t| now - t).unwrap_or(16.0).max(1.0);
                *last = Some(now);
                dt
            };
            let container_size = core.container_size();
            let actual_size = core.actual_size;
            let position = core.scroll.position();
            let compression = core.compression;
            let Some(mut momentum) = core.momentum else { return };
            let (next, still_running) = momentum.step(position, dt, container_size, actual_size, &compression);
            core.momentum = if still_running { Some(momentum) } else { None };
            core.handle_scroll_to(next);
            if still_running {
                if let Some(window) = web_sys::window() {
                    if let Some(cb) = tick2.borrow().as_ref() {
                        window.request_animation_frame(cb.as_ref().unchecked_ref()).ok();
                    }
                }
            } else {
                drop(core);
                Self::schedule_idle_timeout(&inner, &listeners);
            }
        }) as Box<dyn FnMut(f64)>));
        if let Some(window) = web_sys::window() {
            if let Some(cb) = tick.borrow().as_ref() {
                window.request_animation_frame(cb.as_ref().unchecked_ref()).ok();
            }
        }
        self.listeners.borrow_mut().closures.push(Box::new(tick));
    }

    /// Cancel any in-flight smooth-scroll animation.
    pub fn cancel_scroll(&self) { self.inner.borrow_mut().scroll.cancel_scroll(); }

    /// Current authoritative (logical) scroll position.
    pub fn get_scroll_position(&self) -> f64 { self.inner.borrow().scroll.position() }

    /// Subscribe to an event.
    pub fn on(&self, kind: EventKind, handler: impl Fn(&VListEvent) + 'static) -> crate::event_bus::Subscription {
        self.inner.borrow().bus.on(kind, handler)
    }

    /// Unsubscribe a handler returned by [`VirtualList::on`].
    pub fn off(&self, sub: crate::event_bus::Subscription) { self.inner.borrow().bus.off(sub) }

    /// Tear down the instance: run feature `destroy` hooks in reverse
    /// order, detach the root, clear the event bus, and transition to
    /// `Destroyed`. Idempotent; never panics.
    pub fn destroy(&self) {
        let mut core = self.inner.borrow_mut();
        if core.state == LifecycleState::Destroyed {
            return;
        }
        core.state = LifecycleState::Destroyed;
        core.bus.clear();
        core.scaffold.destroy();
        drop(core);
        self.listeners.borrow_mut().closures.clear();

        let mut features = self.features.borrow_mut();
        let mut ctx = FeatureCtx::<T> {
            scaffold: self.inner.borrow().scaffold.clone(),
            bus: self.inner.borrow().bus.clone(),
            class_prefix: self.inner.borrow().class_prefix.clone(),
            orientation: self.inner.borrow().orientation,
            reverse: false,
            after_scroll: Vec::new(),
            resize_handlers: Vec::new(),
            items_override: None,
            total_override: None,
            data_override: None,
            raw_listeners: Vec::new(),
        };
        for feature in features.iter_mut().rev() {
            feature.destroy(&mut ctx);
        }
    }

    /// Observe the viewport's own box size (not item elements — per
    /// SPEC_FULL.md §3, item heights are never DOM-measured) and drive
    /// `resizeHandlers` plus a re-render whenever the container itself
    /// is resized.
    fn wire_resize_observer(&self) {
        let viewport = self.inner.borrow().scaffold.viewport.clone();
        let inner = self.inner.clone();
        let observer = ResizeObserver::new(move |entries| {
            let Some(entry) = entries.last() else { return };
            let rect = entry.content_rect();
            let mut core = inner.borrow_mut();
            if core.state == LifecycleState::Destroyed {
                return;
            }
            core.handle_resize(rect.width(), rect.height());
        });
        let observed = observer.observe(viewport);
        let mut listeners = self.listeners.borrow_mut();
        listeners.closures.push(Box::new(observer));
        listeners.closures.push(Box::new(observed));
    }

    /// Restart the debounced timer that clears the `--scrolling` class once
    /// `idle_timeout_ms` pass without a further scroll, mirroring the
    /// teacher crate's `debounced()` helper.
    fn schedule_idle_timeout(inner: &Rc<RefCell<Core<T>>>, listeners: &Rc<RefCell<Listeners>>) {
        let idle_timeout_ms = inner.borrow().idle_timeout_ms;
        let inner = inner.clone();
        let listeners_for_timeout = listeners.clone();
        let timeout = gloo_timers::callback::Timeout::new(idle_timeout_ms as u32, move || {
            let mut core = inner.borrow_mut();
            if core.state == LifecycleState::Destroyed {
                return;
            }
            core.scaffold.set_scrolling_class(&core.class_prefix, false);
            listeners_for_timeout.borrow_mut().idle_timeout = None;
        });
        listeners.borrow_mut().idle_timeout = Some(timeout);
    }

    fn wire_events(&self) {
        let viewport = self.inner.borrow().scaffold.viewport.clone();

        // scroll
        {
            let inner = self.inner.clone();
            let listeners = self.listeners.clone();
            let closure = Closure::wrap(Box::new(move |ev: web_sys::Event| {
                let mut core = inner.borrow_mut();
                if core.state != LifecycleState::Initialized {
                    return;
                }
                if core.is_compressed() {
                    return; // native overflow is disabled while compressed
                }
                if let Some(target) = ev.target().and_then(|t| t.dyn_into::<Element>().ok()) {
                    let pos = match core.orientation {
                        Orientation::Vertical => target.scroll_top() as f64,
                        Orientation::Horizontal => target.scroll_left() as f64,
                    };
                    core.handle_scroll_to(pos);
                }
                drop(core);
                Self::schedule_idle_timeout(&inner, &listeners);
            }) as Box<dyn FnMut(web_sys::Event)>);
            viewport.add_event_listener_with_callback("scroll", closure.as_ref().unchecked_ref()).ok();
            self.listeners.borrow_mut().closures.push(Box::new(closure));
        }

        // wheel (compressed mode only at dispatch time)
        {
            let inner = self.inner.clone();
            let listeners = self.listeners.clone();
            let closure = Closure::wrap(Box::new(move |ev: web_sys::WheelEvent| {
                let mut core = inner.borrow_mut();
                if core.state != LifecycleState::Initialized || !core.is_compressed() {
                    return;
                }
                ev.prevent_default();
                let container_size = core.container_size();
                let new_pos = compression::apply_wheel_delta(core.scroll.position(), ev.delta_y(), container_size, core.actual_size);
                core.handle_scroll_to(new_pos);
                drop(core);
                Self::schedule_idle_timeout(&inner, &listeners);
            }) as Box<dyn FnMut(web_sys::WheelEvent)>);
            let opts = web_sys::AddEventListenerOptions::new();
            opts.set_passive(false);
            viewport
                .add_event_listener_with_callback_and_add_event_listener_options("wheel", closure.as_ref().unchecked_ref(), &opts)
                .ok();
            self.listeners.borrow_mut().closures.push(Box::new(closure));
        }

        // touchstart
        {
            let inner = self.inner.clone();
            let closure = Closure::wrap(Box::new(move |ev: web_sys::TouchEvent| {
                let mut core = inner.borrow_mut();
                if core.state != LifecycleState::Initialized || !core.is_compressed() {
                    return;
                }
                core.momentum = None;
                if let Some(touch) = ev.touches().get(0) {
                    let client = touch.client_y() as f64;
                    core.touch = Some(TouchDrag::start(client, core.scroll.position(), now_ms()));
                }
            }) as Box<dyn FnMut(web_sys::TouchEvent)>);
            viewport.add_event_listener_with_callback("touchstart", closure.as_ref().unchecked_ref()).ok();
            self.listeners.borrow_mut().closures.push(Box::new(closure));
        }

        // touchmove
        {
            let inner = self.inner.clone();
            let listeners = self.listeners.clone();
            let closure = Closure::wrap(Box::new(move |ev: web_sys::TouchEvent| {
                let mut core = inner.borrow_mut();
                if core.state != LifecycleState::Initialized || !core.is_compressed() {
                    return;
                }
                let Some(touch) = ev.touches().get(0) else { return };
                ev.prevent_default();
                let client = touch.client_y() as f64;
                let container_size = core.container_size();
                let actual_size = core.actual_size;
                if let Some(drag) = core.touch.as_mut() {
                    let (pos, velocity) = compression::touch_move(drag, client, now_ms(), container_size, actual_size);
                    core.last_touch_velocity = velocity;
                    core.handle_scroll_to(pos);
                }
                drop(core);
                Self::schedule_idle_timeout(&inner, &listeners);
            }) as Box<dyn FnMut(web_sys::TouchEvent)>);
            let opts = web_sys::AddEventListenerOptions::new();
            opts.set_passive(false);
            viewport
                .add_event_listener_with_callback_and_add_event_listener_options("touchmove", closure.as_ref().unchecked_ref(), &opts)
                .ok();
            self.listeners.borrow_mut().closures.push(Box::new(closure));
        }

        // touchend / touchcancel: launch momentum if the flick was fast enough.
        for event_name in ["touchend", "touchcancel"] {
            let this = self.clone();
            let closure = Closure::wrap(Box::new(move |_ev: web_sys::TouchEvent| {
                let mut core = this.inner.borrow_mut();
                core.touch = None;
                if !core.is_compressed() {
                    return;
                }
                let momentum = Momentum::launch(core.last_touch_velocity, &core.compression);
                core.momentum = momentum;
                let should_drive = momentum.is_some();
                drop(core);
                if should_drive {
                    this.drive_momentum();
                }
            }) as Box<dyn FnMut(web_sys::TouchEvent)>);
            viewport.add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref()).ok();
            self.listeners.borrow_mut().closures.push(Box::new(closure));
        }

        // click / dblclick: resolve the item index from the nearest `[data-index]`.
        {
            let inner = self.inner.clone();
            let closure = Closure::wrap(Box::new(move |ev: web_sys::MouseEvent| {
                let core = inner.borrow();
                if core.state != LifecycleState::Initialized {
                    return;
                }
                if let Some(index) = closest_data_index(&ev) {
                    core.bus.emit(VListEvent::ItemClick { index });
                }
            }) as Box<dyn FnMut(web_sys::MouseEvent)>);
            viewport.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref()).ok();
            self.listeners.borrow_mut().closures.push(Box::new(closure));
        }
    }
}

fn closest_data_index(ev: &web_sys::MouseEvent) -> Option<usize> {
    let target = ev.target()?.dyn_into::<Element>().ok()?;
    let closest = target.closest("[data-index]").ok().flatten()?;
    closest.get_attribute("data-index")?.parse().ok()
}

/// Monotonic milliseconds, for feeding [`VelocityTracker`]/[`TouchDrag`]
/// timestamps outside a `requestAnimationFrame` callback (which already
/// hands one in).
fn now_ms() -> f64 {
    web_sys::window().and_then(|w| w.performance()).map(|p| p.now()).unwrap_or(0.0)
}

impl<T: Clone> Core<T> {
    /// Common entry point for every source of scroll position change
    /// (native scroll, wheel, touch): write the position, recompute
    /// ranges, emit `scroll`, run `afterScroll` hooks, and manage the
    /// idle/scrolling class — in that order (§5 ordering guarantees).
    pub(crate) fn handle_scroll_to(&mut self, position: f64) {
        let total_size = self.size_cache.total_size();
        self.scroll.set_position(position, total_size);
        let direction = self.scroll.direction();
        self.scaffold.set_scrolling_class(&self.class_prefix, true);
        self.bus.emit(VListEvent::Scroll { scroll_position: self.scroll.position(), direction });
        self.render(false);
        let estimate = self.velocity.update(position, now_ms());
        self.bus.emit(VListEvent::VelocityChange { velocity: estimate.velocity, reliable: estimate.reliable });
        self.run_after_scroll_hooks();
    }

    fn run_after_scroll_hooks(&mut self) {
        let hooks = std::mem::take(&mut self.after_scroll);
        for hook in &hooks {
            hook(self);
        }
        self.after_scroll = hooks;
    }

    /// Called on every `ResizeObserver` tick for the viewport: refresh the
    /// scroll controller's known container size, run registered
    /// `resizeHandlers`, and re-render if the size actually changed.
    fn handle_resize(&mut self, width: f64, height: f64) {
        let size = match self.orientation {
            Orientation::Vertical => height,
            Orientation::Horizontal => width,
        };
        if size == self.last_container_size {
            return;
        }
        self.last_container_size = size;
        self.scroll.set_container_size(size);
        let hooks = std::mem::take(&mut self.resize_handlers);
        for hook in &hooks {
            hook(self, width, height);
        }
        self.resize_handlers = hooks;
        self.bus.emit(VListEvent::Resize { width, height });
        self.render(true);
    }
}

