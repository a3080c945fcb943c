//! A headless, framework-agnostic virtualized scroll list engine.
//!
//! Renders only the items currently intersecting the viewport (plus a
//! configurable overscan), recycling DOM elements across scroll passes and
//! compressing pixel space once the logical content height exceeds what a
//! browser can render in a single scroll container. The crate is built
//! directly against `web-sys`/`wasm-bindgen`; there is no framework adapter
//! here (Yew, Leptos, etc. are external collaborators — see [`builder`]).
//!
//! ```no_run
//! use std::rc::Rc;
//! use virtual_list_core::builder::{BuildConfig, Builder, ContainerOption, ItemSizeOption, TemplateOutput};
//! use virtual_list_core::data_manager::Item;
//!
//! let document = web_sys::window().unwrap().document().unwrap();
//! let template = Rc::new(|item: &Item<String>, _index: usize, _state| {
//!     TemplateOutput::Html(item.payload.clone())
//! });
//! let config = BuildConfig::new(
//!     ContainerOption::Selector("#list".to_string()),
//!     ItemSizeOption::Fixed(40.0),
//!     template,
//! );
//! let list = Builder::new(config).unwrap().build(document).unwrap();
//! let _ = list.total();
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    bare_trait_objects,
    anonymous_parameters,
    elided_lifetimes_in_paths
)]

pub mod builder;
pub mod compression;
pub mod data_manager;
pub mod error;
pub mod event_bus;
pub mod features;
pub mod range;
mod resize_observer;
pub mod scaffold;
pub mod scroll_controller;
pub mod size_cache;
pub mod velocity;

pub use builder::{Builder, BuildConfig, VirtualList};
pub use error::{BuildError, ConfigError, ContainerNotFoundError};
