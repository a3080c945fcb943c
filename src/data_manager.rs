//! The backing store for items (§4.8): in-memory or adapter-backed/async.
//!
//! Both variants are hot-swappable behind the [`DataManager`] trait, per
//! the "hot-swappable components" pattern in §9 — the builder stores one
//! as `Box<dyn DataManager>` and the render hot path reads through it
//! once per pass.

use std::collections::{HashMap, HashSet};

use crate::error::AdapterError;

/// An item handed to the renderer: an opaque id plus an arbitrary,
/// caller-defined payload.
#[derive(Debug, Clone)]
pub struct Item<T> {
    /// Stable identity, used to detect whether a materialized element
    /// still represents the same logical item.
    pub id: String,
    /// The caller's data payload.
    pub payload: T,
}

/// Reserved id prefix for synthetic placeholders returned by an
/// adapter-backed manager for not-yet-loaded indices.
pub const PLACEHOLDER_ID_PREFIX: &str = "__vlist_placeholder__";

/// Hot-swappable backing store read by the range engine on every render
/// pass.
pub trait DataManager<T> {
    /// Total logical item count (may be unknown/0 before first load for
    /// an adapter-backed manager).
    fn total(&self) -> usize;

    /// Fetch item `index`, or a placeholder if unloaded.
    fn get(&self, index: usize) -> Option<Item<T>>;

    /// Whether `index` currently holds a placeholder rather than real data.
    fn is_placeholder(&self, index: usize) -> bool {
        self.get(index).map(|item| item.id.starts_with(PLACEHOLDER_ID_PREFIX)).unwrap_or(true)
    }

    /// Narrow back to the concrete manager type, so the public API can
    /// reach index-mutation methods (`updateItem`/`removeItem`) that are
    /// only meaningful for the in-memory variant, without widening this
    /// trait itself (the adapter-backed manager has no such API by
    /// design — see §4.8).
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// In-memory variant, backed by a dense `Vec`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataManager<T> {
    items: Vec<Item<T>>,
}

impl<T: Clone> InMemoryDataManager<T> {
    /// Construct a manager over `items`.
    pub fn new(items: Vec<Item<T>>) -> Self { Self { items } }

    /// Replace the backing store wholesale, with an optional positional
    /// offset into a larger conceptual array (matches `setItems(items,
    /// offset, total?)` in §4.8; `offset` is currently only meaningful
    /// for the adapter-backed manager and is accepted here for parity).
    pub fn set_items(&mut self, items: Vec<Item<T>>) { self.items = items; }

    /// Append items to the end of the store.
    pub fn append(&mut self, items: Vec<Item<T>>) { self.items.extend(items); }

    /// Prepend items to the start of the store.
    pub fn prepend(&mut self, items: Vec<Item<T>>) {
        let mut next = items;
        next.append(&mut self.items);
        self.items = next;
    }

    /// Patch item at `index` in place. No-op if out of range.
    pub fn update_item(&mut self, index: usize, patch: impl FnOnce(&mut T)) {
        if let Some(item) = self.items.get_mut(index) {
            patch(&mut item.payload);
        }
    }

    /// Patch the item with the given id, wherever it currently sits.
    /// Resolves the Open Question in §9 by also offering a by-id path.
    pub fn update_item_by_id(&mut self, id: &str, patch: impl FnOnce(&mut T)) {
        if let Some(item) = self.items.iter_mut().find(|it| it.id == id) {
            patch(&mut item.payload);
        }
    }

    /// Remove the item at `index`. No-op if out of range.
    pub fn remove_item(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
        }
    }

    /// Remove the item with the given id, if present.
    pub fn remove_item_by_id(&mut self, id: &str) { self.items.retain(|it| it.id != id); }

    /// Drop every item, keeping the manager itself alive.
    pub fn clear(&mut self) { self.items.clear(); }

    /// Alias for `clear`, matching §4.8's `reset()` entry point.
    pub fn reset(&mut self) { self.clear(); }
}

impl<T: Clone + 'static> DataManager<T> for InMemoryDataManager<T> {
    fn total(&self) -> usize { self.items.len() }

    fn get(&self, index: usize) -> Option<Item<T>> { self.items.get(index).cloned() }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

/// A page request issued to an adapter: `{offset, limit}` → `{items, total}`.
#[derive(Debug, Clone)]
pub struct AdapterPage<T> {
    /// Items returned for the requested range (may be shorter than
    /// `limit` at the end of the data set).
    pub items: Vec<Item<T>>,
    /// Total item count, as reported by this call.
    pub total: usize,
}

/// A read function for an async, adapter-backed data manager.
pub type Adapter<T> = std::rc::Rc<dyn Fn(usize, usize) -> Result<AdapterPage<T>, String>>;

/// Error/loading state surfaced alongside an [`AsyncDataManager`].
#[derive(Debug, Clone, Default)]
pub struct AsyncState {
    /// The most recent adapter failure, if any. Cleared by the next
    /// successful call.
    pub error: Option<AdapterError>,
}

/// Adapter-backed variant: a sparse store of loaded chunks plus a
/// pending-range set, filling gaps with placeholders (§4.8).
pub struct AsyncDataManager<T> {
    adapter: Adapter<T>,
    chunk_size: usize,
    keep_around: usize,
    total: usize,
    total_known: bool,
    loaded: HashMap<usize, Item<T>>,
    pending: HashSet<usize>,
    state: AsyncState,
}

impl<T> std::fmt::Debug for AsyncDataManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDataManager")
            .field("adapter", &"<function ptr>")
            .field("chunk_size", &self.chunk_size)
            .field("keep_around", &self.keep_around)
            .field("total", &self.total)
            .field("total_known", &self.total_known)
            .field("loaded_count", &self.loaded.len())
            .field("pending_count", &self.pending.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Clone> AsyncDataManager<T> {
    /// Construct a manager with an initially-unknown total, reading
    /// `chunk_size` items per adapter call and keeping `keep_around`
    /// extra items loaded on each side of the visible range before
    /// eviction.
    pub fn new(adapter: Adapter<T>, chunk_size: usize, keep_around: usize) -> Self {
        Self {
            adapter,
            chunk_size: chunk_size.max(1),
            keep_around,
            total: 0,
            total_known: false,
            loaded: HashMap::new(),
            pending: HashSet::new(),
            state: AsyncState::default(),
        }
    }

    /// Current error/loading state.
    pub fn state(&self) -> &AsyncState { &self.state }

    /// Ensure every index in `start..=end` is either loaded or has a
    /// dispatched (pending) adapter call, coalescing overlapping chunk
    /// requests.
    pub fn ensure_range(&mut self, start: usize, end: usize) {
        let mut chunk_start = (start / self.chunk_size) * self.chunk_size;
        let chunk_end = if self.total_known { end.min(self.total.saturating_sub(1)) } else { end };
        while chunk_start <= chunk_end {
            let limit = self.chunk_size;
            if !self.pending.contains(&chunk_start) && !self.is_chunk_fully_loaded(chunk_start, limit) {
                self.dispatch(chunk_start, limit);
            }
            chunk_start += self.chunk_size;
        }
    }

    /// Grow the loaded region by one chunk in `direction` (`true` =
    /// forward/append, `false` = backward/prepend).
    pub fn load_more(&mut self, direction: bool) {
        if direction {
            let start = self.loaded.keys().copied().max().map(|m| m + 1).unwrap_or(0);
            self.dispatch(start, self.chunk_size);
        } else {
            let start = self.loaded.keys().copied().min().unwrap_or(0);
            let start = start.saturating_sub(self.chunk_size);
            self.dispatch(start, self.chunk_size);
        }
    }

    /// Discard all loaded data and pending requests, then re-fetch
    /// starting at `start`.
    pub fn reload(&mut self, start: usize, limit: usize) {
        self.loaded.clear();
        self.pending.clear();
        self.state.error = None;
        self.dispatch(start, limit);
    }

    /// Release chunks entirely outside `[visible_start - keep_around,
    /// visible_end + keep_around]`.
    pub fn evict_distant(&mut self, visible_start: usize, visible_end: usize) {
        let low = visible_start.saturating_sub(self.keep_around);
        let high = visible_end.saturating_add(self.keep_around);
        self.loaded.retain(|&idx, _| idx >= low && idx <= high);
    }

    fn is_chunk_fully_loaded(&self, start: usize, limit: usize) -> bool {
        (start..start + limit).all(|i| self.loaded.contains_key(&i) || (self.total_known && i >= self.total))
    }

    fn dispatch(&mut self, offset: usize, limit: usize) {
        if limit == 0 {
            return;
        }
        for i in offset..offset + limit {
            self.pending.insert(i);
        }
        match (self.adapter)(offset, limit) {
            Ok(page) => {
                self.total = page.total;
                self.total_known = true;
                self.state.error = None;
                for (i, item) in page.items.into_iter().enumerate() {
                    self.loaded.insert(offset + i, item);
                }
            }
            Err(message) => {
                self.state.error = Some(AdapterError { offset, limit, message });
            }
        }
        for i in offset..offset + limit {
            self.pending.remove(&i);
        }
    }
}

impl<T: Clone + Default + 'static> DataManager<T> for AsyncDataManager<T> {
    fn total(&self) -> usize { self.total }

    fn get(&self, index: usize) -> Option<Item<T>> {
        if let Some(item) = self.loaded.get(&index) {
            Some(item.clone())
        } else if index < self.total || !self.total_known {
            // `get` must stay side-effect free; placeholder ids are
            // deterministic per-index so identity comparisons stay stable
            // across repeated renders of the same gap.
            Some(Item {
                id: format!("{PLACEHOLDER_ID_PREFIX}{index}"),
                payload: T::default(),
            })
        } else {
            None
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn in_memory_mutations_are_index_based() {
        let mut mgr = InMemoryDataManager::new(vec![
            Item { id: "a".into(), payload: 1 },
            Item { id: "b".into(), payload: 2 },
        ]);
        mgr.update_item(1, |p| *p += 10);
        assert_eq!(mgr.get(1).unwrap().payload, 12);
        mgr.remove_item(0);
        assert_eq!(mgr.total(), 1);
        assert_eq!(mgr.get(0).unwrap().id, "b");
    }

    #[test]
    fn in_memory_update_by_id_resolves_the_open_question() {
        let mut mgr = InMemoryDataManager::new(vec![Item { id: "x".into(), payload: 1 }]);
        mgr.update_item_by_id("x", |p| *p = 99);
        assert_eq!(mgr.get(0).unwrap().payload, 99);
    }

    #[test]
    fn setitems_twice_is_idempotent() {
        let mut mgr = InMemoryDataManager::new(vec![]);
        let make = || vec![Item { id: "a".into(), payload: 1 }, Item { id: "b".into(), payload: 2 }];
        mgr.set_items(make());
        let after_once: Vec<String> = (0..mgr.total()).map(|i| mgr.get(i).unwrap().id).collect();
        mgr.set_items(make());
        let after_twice: Vec<String> = (0..mgr.total()).map(|i| mgr.get(i).unwrap().id).collect();
        assert_eq!(after_once, after_twice);
    }

    fn fake_adapter(calls: Rc<Cell<u32>>) -> Adapter<u32> {
        std::rc::Rc::new(move |offset, limit| {
            calls.set(calls.get() + 1);
            let items = (offset..offset + limit).filter(|&i| i < 25).map(|i| Item { id: i.to_string(), payload: i as u32 }).collect();
            Ok(AdapterPage { items, total: 25 })
        })
    }

    #[test]
    fn ensure_range_coalesces_and_fills_placeholders() {
        let calls = Rc::new(Cell::new(0));
        let mut mgr: AsyncDataManager<u32> = AsyncDataManager::new(fake_adapter(calls.clone()), 10, 5);
        assert!(mgr.is_placeholder(0));
        mgr.ensure_range(0, 9);
        assert_eq!(calls.get(), 1);
        assert!(!mgr.is_placeholder(3));
        assert_eq!(mgr.get(3).unwrap().payload, 3);
        // Re-requesting the same range dispatches nothing new.
        mgr.ensure_range(0, 9);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn adapter_error_is_captured_and_cleared_on_next_call() {
        let mut mgr: AsyncDataManager<u32> = AsyncDataManager::new(
            std::rc::Rc::new(|_offset, _limit| Err("boom".to_string())),
            10,
            5,
        );
        mgr.ensure_range(0, 9);
        assert!(mgr.state().error.is_some());
        assert!(mgr.is_placeholder(2));
    }

    #[test]
    fn evict_distant_releases_chunks_outside_keep_around() {
        let calls = Rc::new(Cell::new(0));
        let mut mgr: AsyncDataManager<u32> = AsyncDataManager::new(fake_adapter(calls), 10, 0);
        mgr.ensure_range(0, 9);
        mgr.evict_distant(0, 2);
        assert!(mgr.loaded.contains_key(&0));
        assert!(!mgr.loaded.contains_key(&9));
    }
}
