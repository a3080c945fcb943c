//! Custom scrollbar (§4.11 fourth feature): thumb length proportional to
//! `containerSize / actualSize`, position linear in logical scroll
//! position, draggable, with an optional auto-hide tied to the
//! `--scrolling` class the core already toggles on idle timeout.

use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement};

use crate::builder::{Core, Feature, FeatureCtx, Orientation};
use crate::error::ConfigError;

/// Configuration for [`ScrollbarFeature`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollbarFeatureConfig {
    /// Hide the track/thumb except while the `--scrolling` class is set.
    pub auto_hide: bool,
}

/// Custom scrollbar feature: builds a track + thumb overlay, keeps the
/// thumb synced to scroll position on every tick and container resize,
/// and supports dragging the thumb to scroll.
#[derive(Debug, Clone, Copy)]
pub struct ScrollbarFeature {
    config: ScrollbarFeatureConfig,
}

impl ScrollbarFeature {
    /// Construct the feature from its config.
    pub fn new(config: ScrollbarFeatureConfig) -> Self { Self { config } }
}

impl<T: Clone + 'static> Feature<T> for ScrollbarFeature {
    fn name(&self) -> &'static str { "scrollbar" }
    fn priority(&self) -> u32 { 70 }

    fn setup(&mut self, ctx: &mut FeatureCtx<T>) -> Result<(), ConfigError> {
        let Some(document) = ctx.scaffold.viewport.owner_document() else { return Ok(()) };
        let Ok(track) = document.create_element("div") else { return Ok(()) };
        track.set_class_name(&format!("{}__scrollbar", ctx.class_prefix));
        let Ok(thumb) = document.create_element("div") else { return Ok(()) };
        thumb.set_class_name(&format!("{}__scrollbar-thumb", ctx.class_prefix));
        track.append_child(&thumb).ok();
        ctx.scaffold.root.append_child(&track).ok();
        if let Ok(html) = track.clone().dyn_into::<HtmlElement>() {
            html.style().set_property("position", "absolute").ok();
        }
        if let Ok(html) = thumb.clone().dyn_into::<HtmlElement>() {
            html.style().set_property("position", "absolute").ok();
        }
        if self.config.auto_hide {
            track.class_list().add_1(&format!("{}__scrollbar--auto-hide", ctx.class_prefix)).ok();
        }

        let orientation = ctx.orientation;
        let viewport = ctx.scaffold.viewport.clone();

        let track_for_scroll = track.clone();
        let thumb_for_scroll = thumb.clone();
        ctx.on_after_scroll(move |core: &mut Core<T>| {
            update_thumb(core, &track_for_scroll, &thumb_for_scroll, orientation);
        });
        let track_for_resize = track.clone();
        let thumb_for_resize = thumb.clone();
        ctx.on_resize(move |core: &mut Core<T>, _w, _h| {
            update_thumb(core, &track_for_resize, &thumb_for_resize, orientation);
        });

        // Drag: mousedown on the thumb arms it via a DOM attribute (the
        // feature has no Core-resident state slot of its own, per the
        // no-cyclic-references rule — the thumb's own dataset round-trips
        // the armed flag, the same trick the base renderer already uses
        // for `data-index`).
        let thumb_for_down = thumb.clone();
        ctx.on_raw_event(&thumb, "mousedown", move |_core: &mut Core<T>, ev| {
            if let Some(mouse) = ev.dyn_ref::<web_sys::MouseEvent>() {
                mouse.prevent_default();
            }
            thumb_for_down.set_attribute("data-dragging", "1").ok();
        });

        let thumb_for_move = thumb.clone();
        let track_for_move = track.clone();
        ctx.on_raw_event(&viewport, "mousemove", move |core: &mut Core<T>, ev| {
            if thumb_for_move.get_attribute("data-dragging").is_none() {
                return;
            }
            let Some(mouse) = ev.dyn_ref::<web_sys::MouseEvent>() else { return };
            drag_to(core, &track_for_move, mouse, orientation);
        });

        for kind in ["mouseup", "mouseleave"] {
            let thumb_for_up = thumb.clone();
            ctx.on_raw_event(&viewport, kind, move |_core: &mut Core<T>, _ev| {
                thumb_for_up.remove_attribute("data-dragging").ok();
            });
        }
        Ok(())
    }
}

fn update_thumb<T: Clone>(core: &mut Core<T>, track: &Element, thumb: &Element, orientation: Orientation) {
    let Ok(track_html) = track.clone().dyn_into::<HtmlElement>() else { return };
    let track_len = match orientation {
        Orientation::Vertical => track_html.client_height() as f64,
        Orientation::Horizontal => track_html.client_width() as f64,
    };
    let actual = core.actual_size.max(1.0);
    let container_size = core.container_size();
    let ratio = (container_size / actual).clamp(0.0, 1.0);
    let thumb_len = (track_len * ratio).max(16.0);
    let max_scroll = (actual - container_size).max(0.0);
    let position = core.scroll.position();
    let travel = (track_len - thumb_len).max(0.0);
    let thumb_pos = if max_scroll > 0.0 { (position / max_scroll) * travel } else { 0.0 };

    let Ok(html) = thumb.clone().dyn_into::<HtmlElement>() else { return };
    match orientation {
        Orientation::Vertical => {
            html.style().set_property("height", &format!("{thumb_len}px")).ok();
            html.style().set_property("transform", &format!("translateY({thumb_pos}px)")).ok();
        }
        Orientation::Horizontal => {
            html.style().set_property("width", &format!("{thumb_len}px")).ok();
            html.style().set_property("transform", &format!("translateX({thumb_pos}px)")).ok();
        }
    }
}

fn drag_to<T: Clone>(core: &mut Core<T>, track: &Element, ev: &web_sys::MouseEvent, orientation: Orientation) {
    let rect = track.get_bounding_client_rect();
    let (client, track_start, track_len) = match orientation {
        Orientation::Vertical => (ev.client_y() as f64, rect.top(), rect.height()),
        Orientation::Horizontal => (ev.client_x() as f64, rect.left(), rect.width()),
    };
    if track_len <= 0.0 {
        return;
    }
    let actual = core.actual_size;
    let container_size = core.container_size();
    let max_scroll = (actual - container_size).max(0.0);
    let fraction = ((client - track_start) / track_len).clamp(0.0, 1.0);
    core.handle_scroll_to(fraction * max_scroll);
}
