//! Grouping with sticky headers (§4.11 second feature): a single header
//! element pinned at the main-axis origin, showing the group the
//! topmost visible item belongs to, pushed out by the next group's
//! header as it approaches (distance-based transform).

use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement};

use crate::builder::{Core, Feature, FeatureCtx, Orientation};
use crate::data_manager::Item;
use crate::error::ConfigError;

/// `(item) -> group key`; consecutive items sharing a key form one group.
pub type GroupKeyFn<T> = std::rc::Rc<dyn Fn(&Item<T>) -> String>;
/// `(group key) -> header label`; identity is used if not supplied.
pub type HeaderLabelFn = std::rc::Rc<dyn Fn(&str) -> String>;

/// Configuration for [`GroupingFeature`].
pub struct GroupingFeatureConfig<T> {
    /// Assigns each item to a group key.
    pub group_of: GroupKeyFn<T>,
    /// Formats a group key into the header's displayed label.
    pub header_label: Option<HeaderLabelFn>,
}

impl<T> std::fmt::Debug for GroupingFeatureConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupingFeatureConfig").field("header_label", &self.header_label.is_some()).finish_non_exhaustive()
    }
}

/// Sticky-group-header feature. Scans outward from the topmost visible
/// item to find the current group's key and the next group's boundary;
/// bounded by typical group sizes, so this stays cheap per scroll tick.
pub struct GroupingFeature<T> {
    config: GroupingFeatureConfig<T>,
}

impl<T> std::fmt::Debug for GroupingFeature<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupingFeature").field("config", &self.config).finish()
    }
}

impl<T> GroupingFeature<T> {
    /// Construct the feature from its config.
    pub fn new(config: GroupingFeatureConfig<T>) -> Self { Self { config } }
}

impl<T: Clone + 'static> Feature<T> for GroupingFeature<T> {
    fn name(&self) -> &'static str { "grouping" }
    fn priority(&self) -> u32 { 40 }

    fn setup(&mut self, ctx: &mut FeatureCtx<T>) -> Result<(), ConfigError> {
        let Some(document) = ctx.scaffold.viewport.owner_document() else { return Ok(()) };
        let Ok(header) = document.create_element("div") else { return Ok(()) };
        header.set_class_name(&format!("{}__sticky-header", ctx.class_prefix));
        if let Ok(html) = header.clone().dyn_into::<HtmlElement>() {
            html.style().set_property("position", "absolute").ok();
            html.style().set_property("top", "0").ok();
            html.style().set_property("left", "0").ok();
            html.style().set_property("z-index", "1").ok();
            html.style().set_property("display", "none").ok();
        }
        ctx.scaffold.viewport.append_child(&header).ok();

        let group_of = self.config.group_of.clone();
        let header_label = self.config.header_label.clone();
        let orientation = ctx.orientation;
        let header_for_hook = header;

        ctx.on_after_scroll(move |core: &mut Core<T>| {
            update_sticky_header(core, &header_for_hook, &group_of, header_label.as_ref(), orientation);
        });
        Ok(())
    }
}

fn update_sticky_header<T: Clone>(
    core: &mut Core<T>,
    header: &Element,
    group_of: &GroupKeyFn<T>,
    header_label: Option<&HeaderLabelFn>,
    orientation: Orientation,
) {
    let total = core.total();
    let Ok(html) = header.clone().dyn_into::<HtmlElement>() else { return };
    if total == 0 {
        html.style().set_property("display", "none").ok();
        return;
    }
    let position = core.scroll.position();
    let top_index = core.size_cache.index_at(position);
    let Some(top_item) = core.item_at(top_index) else { return };
    let current_key = group_of(&top_item);

    let mut next_boundary = None;
    let mut i = top_index;
    while i + 1 < total {
        let Some(next) = core.item_at(i + 1) else { break };
        if group_of(&next) != current_key {
            next_boundary = Some(i + 1);
            break;
        }
        i += 1;
    }

    let label = header_label.map(|f| f(&current_key)).unwrap_or_else(|| current_key.clone());
    header.set_inner_html(&label);
    html.style().set_property("display", "block").ok();
    let header_size = match orientation {
        Orientation::Vertical => html.client_height() as f64,
        Orientation::Horizontal => html.client_width() as f64,
    };

    let push = next_boundary
        .map(|idx| core.size_cache.offset(idx) - position)
        .filter(|distance| *distance < header_size)
        .map(|distance| distance - header_size)
        .unwrap_or(0.0);

    let transform = match orientation {
        Orientation::Vertical => format!("translateY({push}px)"),
        Orientation::Horizontal => format!("translateX({push}px)"),
    };
    html.style().set_property("transform", &transform).ok();
}
