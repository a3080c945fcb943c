//! Async-data placeholders (§4.11 fifth feature): installs an
//! [`AsyncDataManager`] in place of the default in-memory store, drives
//! `ensureRange`/`evictDistant` off the render range on every scroll
//! tick, and forwards adapter failures onto the event bus.

use crate::builder::{Core, Feature, FeatureCtx};
use crate::data_manager::{Adapter, AsyncDataManager};
use crate::error::ConfigError;
use crate::event_bus::VListEvent;

/// Configuration for [`AsyncDataFeature`].
pub struct AsyncDataFeatureConfig<T> {
    /// `(offset, limit) -> page` read function.
    pub adapter: Adapter<T>,
    /// Items requested per adapter call.
    pub chunk_size: usize,
    /// Extra items kept loaded on each side of the render range before
    /// being evicted.
    pub keep_around: usize,
}

impl<T> std::fmt::Debug for AsyncDataFeatureConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDataFeatureConfig")
            .field("chunk_size", &self.chunk_size)
            .field("keep_around", &self.keep_around)
            .finish_non_exhaustive()
    }
}

/// Swaps in an adapter-backed [`AsyncDataManager`] and keeps it fed as
/// the visible range moves.
pub struct AsyncDataFeature<T> {
    config: AsyncDataFeatureConfig<T>,
}

impl<T> std::fmt::Debug for AsyncDataFeature<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDataFeature").field("config", &self.config).finish()
    }
}

impl<T> AsyncDataFeature<T> {
    /// Construct the feature from its config.
    pub fn new(config: AsyncDataFeatureConfig<T>) -> Self { Self { config } }
}

impl<T: Clone + Default + 'static> Feature<T> for AsyncDataFeature<T> {
    fn name(&self) -> &'static str { "async-data" }
    fn priority(&self) -> u32 { 10 }

    fn setup(&mut self, ctx: &mut FeatureCtx<T>) -> Result<(), ConfigError> {
        let manager = AsyncDataManager::new(self.config.adapter.clone(), self.config.chunk_size, self.config.keep_around);
        ctx.override_data("async-data", Box::new(manager))?;

        // No Core-resident state slot of its own (same constraint the
        // scrollbar feature works around with a DOM attribute); a
        // captured cell tracks the last-reported failure so a
        // persistent error doesn't re-emit on every scroll tick.
        let last_reported = std::rc::Rc::new(std::cell::RefCell::new(None::<String>));
        ctx.on_after_scroll(move |core: &mut Core<T>| {
            let range = core.last_render_range;
            let mut new_total = None;
            if let Some(manager) = core.data.as_any_mut().downcast_mut::<AsyncDataManager<T>>() {
                manager.ensure_range(range.start, range.end);
                manager.evict_distant(range.start, range.end);
                match manager.state().error.clone() {
                    Some(error) => {
                        let marker = format!("{}:{}:{}", error.offset, error.limit, error.message);
                        if last_reported.borrow().as_deref() != Some(marker.as_str()) {
                            *last_reported.borrow_mut() = Some(marker);
                            core.bus.emit(VListEvent::AdapterError { offset: error.offset, limit: error.limit, message: error.message });
                        }
                    }
                    None => *last_reported.borrow_mut() = None,
                }
                new_total = Some(manager.total());
            }
            // The adapter's reported total only becomes known once the
            // first page lands; once it differs from the size cache
            // built at construction time, rebuild so visible_range stops
            // seeing a stale (often zero) item count.
            if let Some(total) = new_total {
                if total != core.size_cache.total() {
                    let _ = core.size_cache.rebuild(total);
                    core.recompute_actual_size();
                }
            }
        });
        Ok(())
    }
}
