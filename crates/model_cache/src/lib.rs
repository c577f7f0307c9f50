//! # model_cache
//!
//! Content-model cache & reconciliation over a live DOM.
//!
//! The cache keeps a semantic [`ContentModelDocument`](content_model)
//! mirroring the editable DOM and patches it incrementally as the DOM
//! changes under uncontrolled input. Every incremental operation is allowed
//! to fail; failure invalidates the cache, and the next consumer performs a
//! full re-parse. An incorrect success would silently corrupt the document,
//! so every branch that cannot prove correctness gives up instead.
//!
//! Pieces, leaf-first:
//! - [`mutation`]: drains raw records from the observed tree and classifies
//!   each batch into one coarse-grained [`Mutation`] (or `Unknown`)
//! - [`index`]: the DOM↔Model side table ([`DomIndexer`]) associating live
//!   DOM nodes with the model nodes they currently represent
//! - [`reconcile`]: the incremental patch operations (selection, child
//!   list, text, element id), each returning a success flag
//! - [`plugin`]: the cache controller ([`CachePlugin`]) orchestrating the
//!   above across the editor's event stream

pub mod index;
pub mod mutation;
pub mod plugin;
pub mod reconcile;

pub use index::{DomIndexer, IndexItem, SegmentItem, TableItem};
pub use mutation::{
    find_closest_block_entity_container, find_closest_entity_wrapper, Mutation,
    MutationObserverAdapter, BLOCK_ENTITY_CONTAINER_ATTR, ENTITY_WRAPPER_ATTR,
};
pub use plugin::{
    create_cache_plugin, CacheOptions, CachePlugin, CacheState, EditorHost, PluginEvent,
};
