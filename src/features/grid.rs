//! Grid layout (§4.11 third feature): places `columns` items per logical
//! row. Implemented as a post-render layout pass that re-buckets the
//! already-rendered per-index elements into row/col cells, rather than a
//! from-scratch virtualization engine — the base range math still treats
//! indices as a single column, so it over-renders rows near the edges of
//! the viewport instead of under-rendering them (see DESIGN.md).

use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

use crate::builder::{Core, Feature, FeatureCtx, Orientation};
use crate::error::ConfigError;

/// Configuration for [`GridFeature`].
#[derive(Debug, Clone, Copy)]
pub struct GridFeatureConfig {
    /// Items placed per logical row.
    pub columns: usize,
    /// Pixel gap between both rows and columns.
    pub gap: f64,
}

/// Row-wise grid layout feature; rejects horizontal orientation and
/// reverse mode at setup time (`ConfigError::GridLayoutConflict`).
#[derive(Debug, Clone, Copy)]
pub struct GridFeature {
    config: GridFeatureConfig,
}

impl GridFeature {
    /// Construct the feature from its config.
    pub fn new(config: GridFeatureConfig) -> Self { Self { config } }
}

impl<T: Clone + 'static> Feature<T> for GridFeature {
    fn name(&self) -> &'static str { "grid" }
    fn priority(&self) -> u32 { 60 }

    fn setup(&mut self, ctx: &mut FeatureCtx<T>) -> Result<(), ConfigError> {
        if ctx.orientation == Orientation::Horizontal || ctx.reverse {
            return Err(ConfigError::GridLayoutConflict);
        }
        let columns = self.config.columns.max(1);
        let gap = self.config.gap;

        ctx.on_after_scroll(move |core: &mut Core<T>| layout_grid(core, columns, gap));
        ctx.on_resize(move |core: &mut Core<T>, _w, _h| layout_grid(core, columns, gap));
        Ok(())
    }
}

fn viewport_width<T>(core: &Core<T>) -> f64 {
    core.scaffold.viewport.clone().dyn_into::<HtmlElement>().map(|el| el.client_width() as f64).unwrap_or(0.0)
}

fn layout_grid<T: Clone>(core: &mut Core<T>, columns: usize, gap: f64) {
    let container_width = viewport_width(core);
    let col_width = ((container_width - gap * (columns.saturating_sub(1)) as f64) / columns as f64).max(0.0);
    let position = core.scroll.position();
    let size_cache = core.size_cache.clone();

    core.for_each_rendered(|index, el| {
        let row = index / columns;
        let col = index % columns;
        let row_height = size_cache.size(index);
        let x = col as f64 * (col_width + gap);
        let y = row as f64 * (row_height + gap) - position;
        if let Ok(html) = el.clone().dyn_into::<HtmlElement>() {
            html.style().set_property("transform", &format!("translate({x}px, {y}px)")).ok();
            html.style().set_property("width", &format!("{col_width}px")).ok();
        }
    });

    let total = core.total();
    if total > 0 {
        let rows = (total + columns - 1) / columns;
        let avg_row_height = size_cache.total_size() / total as f64;
        let total_height = rows as f64 * (avg_row_height + gap);
        core.scaffold.set_content_size(total_height, Orientation::Vertical);
    }
}
