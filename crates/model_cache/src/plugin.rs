//! Cache controller.
//!
//! Orchestrates observation, classification, and reconciliation across the
//! editor's event stream. Holds the cached model, the cached native
//! selection, and the DOM↔Model index, and decides per event whether to
//! patch, keep, or drop them.
//!
//! Contract:
//! - The cached model is mutated only through reconciliation or replaced
//!   wholesale by an adopted snapshot.
//! - Every invalidation request is suppressed while the host reports shadow
//!   edit; the cache is frozen until shadow edit ends.
//! - Mutation batches are flushed and applied in arrival order; two
//!   reconciliation attempts never interleave.

use crate::index::DomIndexer;
use crate::mutation::{Mutation, MutationObserverAdapter};
use crate::reconcile;
use content_model::ContentModelDocument;
use live_dom::{DomSelection, DomTree, NodeKey};

/// Construction options for the cache plugin.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheOptions {
    /// Disable incremental tracking for the session. The index stays
    /// inactive and conservative events (`keyDown`, `input`) invalidate.
    pub disable_cache: bool,
}

/// What the plugin needs from its hosting editor.
pub trait EditorHost {
    fn has_focus(&self) -> bool;
    /// `true` while the editor performs a shadow edit (a scratch editing
    /// state that must not pollute the persisted cache).
    fn is_in_shadow_edit(&self) -> bool;
}

/// Editor-level events the controller reacts to.
pub enum PluginEvent {
    KeyDown,
    Input,
    SelectionChanged,
    /// The editor produced a fresh model (and optionally the selection it
    /// was written with). `None` means "content changed, no snapshot".
    ContentChanged {
        model: Option<ContentModelDocument>,
        selection: Option<DomSelection>,
    },
    /// The editable root was swapped out.
    LogicalRootChanged { root: NodeKey },
}

/// Cache contents, readable by collaborating subsystems.
#[derive(Default)]
pub struct CacheState {
    pub cached_model: Option<ContentModelDocument>,
    pub cached_selection: Option<DomSelection>,
    /// `None` when incremental tracking is disabled for the session.
    pub indexer: Option<DomIndexer>,
}

pub struct CachePlugin {
    options: CacheOptions,
    adapter: MutationObserverAdapter,
    state: CacheState,
}

/// Build a cache plugin observing `root`.
pub fn create_cache_plugin(options: CacheOptions, root: NodeKey) -> CachePlugin {
    CachePlugin::new(options, root)
}

impl CachePlugin {
    pub fn new(options: CacheOptions, root: NodeKey) -> Self {
        let indexer = if options.disable_cache {
            None
        } else {
            Some(DomIndexer::new())
        };
        Self {
            options,
            adapter: MutationObserverAdapter::new(root),
            state: CacheState {
                cached_model: None,
                cached_selection: None,
                indexer,
            },
        }
    }

    pub fn initialize(&mut self, tree: &mut DomTree) {
        if !self.options.disable_cache {
            self.adapter.start_observing(tree);
        }
    }

    pub fn dispose(&mut self, tree: &mut DomTree) {
        self.adapter.stop_observing(tree);
        self.state.cached_model = None;
        self.state.cached_selection = None;
        if let Some(indexer) = &mut self.state.indexer {
            indexer.clear();
        }
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// Mutable cache access for the full converter, which populates the
    /// index as a side effect of producing a model.
    pub fn state_mut(&mut self) -> &mut CacheState {
        &mut self.state
    }

    pub fn cached_model(&self) -> Option<&ContentModelDocument> {
        self.state.cached_model.as_ref()
    }

    /// Drop the cached model, selection, and index entries. Suppressed
    /// while the host is in shadow edit.
    pub fn invalidate(&mut self, host: &impl EditorHost) {
        if host.is_in_shadow_edit() {
            log::trace!(target: "model_cache.plugin", "invalidation suppressed (shadow edit)");
            return;
        }
        log::trace!(target: "model_cache.plugin", "cache invalidated");
        self.state.cached_model = None;
        self.state.cached_selection = None;
        if let Some(indexer) = &mut self.state.indexer {
            indexer.clear();
        }
    }

    pub fn on_event(&mut self, tree: &mut DomTree, host: &impl EditorHost, event: PluginEvent) {
        match event {
            PluginEvent::KeyDown | PluginEvent::Input => {
                // Without the observer active no other signal proves the
                // DOM is still consistent with the cache.
                if self.options.disable_cache {
                    self.invalidate(host);
                }
            }
            PluginEvent::SelectionChanged => {
                self.flush_mutations(tree, host);
                self.update_cached_selection(tree, host, false);
            }
            PluginEvent::ContentChanged { model, selection } => {
                // The snapshot supersedes whatever the observer recorded.
                self.adapter.flush(tree, true);
                match model {
                    Some(model) if self.state.indexer.is_some() => {
                        self.state.cached_model = Some(model);
                        self.state.cached_selection = selection;
                    }
                    _ => self.invalidate(host),
                }
            }
            PluginEvent::LogicalRootChanged { root } => {
                self.adapter.stop_observing(tree);
                self.adapter.set_root(tree, root);
                if !self.options.disable_cache {
                    self.adapter.start_observing(tree);
                }
                self.invalidate(host);
            }
        }
    }

    /// Force-drain pending mutation records and apply them in arrival
    /// order. Called before any synchronous read of the cache.
    pub fn flush_mutations(&mut self, tree: &mut DomTree, host: &impl EditorHost) {
        let mutations = self.adapter.flush(tree, false);
        for mutation in mutations {
            self.apply_mutation(tree, host, mutation);
        }
    }

    fn apply_mutation(&mut self, tree: &DomTree, host: &impl EditorHost, mutation: Mutation) {
        match mutation {
            Mutation::ChildList { added, removed } => {
                if !self.reconcile_with(|model, indexer| {
                    reconcile::reconcile_child_list(model, indexer, tree, &added, &removed)
                }) {
                    self.invalidate(host);
                }
            }
            Mutation::Text { node } => {
                if !self
                    .reconcile_with(|model, indexer| {
                        reconcile::reconcile_text(model, indexer, tree, node)
                    })
                {
                    self.invalidate(host);
                    return;
                }
                // Text reconciliation does not touch selection; re-derive it
                // even when the native selection compares equal.
                self.update_cached_selection(tree, host, true);
            }
            Mutation::ElementId { element } => {
                if !self.reconcile_with(|model, indexer| {
                    reconcile::reconcile_element_id(model, indexer, tree, element)
                }) {
                    self.invalidate(host);
                }
            }
            Mutation::Unknown => self.invalidate(host),
        }
    }

    fn reconcile_with(
        &mut self,
        f: impl FnOnce(&mut ContentModelDocument, &mut DomIndexer) -> bool,
    ) -> bool {
        let CacheState {
            cached_model: Some(model),
            indexer: Some(indexer),
            ..
        } = &mut self.state
        else {
            return false;
        };
        f(model, indexer)
    }

    fn update_cached_selection(&mut self, tree: &DomTree, host: &impl EditorHost, force: bool) {
        if !host.has_focus() {
            return;
        }
        let Some(new_selection) = tree.native_selection() else {
            // no native selection and none cached is "unchanged"
            if self.state.cached_selection.is_some() {
                self.invalidate(host);
            }
            return;
        };
        if !force && self.state.cached_selection.as_ref() == Some(&new_selection) {
            return;
        }
        let reconciled = {
            let CacheState {
                cached_model: Some(model),
                indexer: Some(indexer),
                cached_selection,
            } = &mut self.state
            else {
                self.invalidate(host);
                return;
            };
            reconcile::reconcile_selection(
                model,
                indexer,
                tree,
                &new_selection,
                cached_selection.as_ref(),
            )
        };
        if reconciled {
            self.state.cached_selection = Some(new_selection);
        } else {
            self.invalidate(host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_model::{Block, Paragraph, Segment, SegmentFormat};

    struct TestHost {
        focus: bool,
        shadow_edit: bool,
    }

    impl TestHost {
        fn focused() -> Self {
            Self {
                focus: true,
                shadow_edit: false,
            }
        }
    }

    impl EditorHost for TestHost {
        fn has_focus(&self) -> bool {
            self.focus
        }
        fn is_in_shadow_edit(&self) -> bool {
            self.shadow_edit
        }
    }

    /// Observed editor with one paragraph holding one indexed text node,
    /// and a plugin that already adopted the matching model.
    fn editor() -> (DomTree, CachePlugin, NodeKey, NodeKey) {
        let mut tree = DomTree::new();
        let root = tree.create_element("div");
        let para_el = tree.create_element("p");
        let text = tree.create_text("test");
        tree.append_child(root, para_el).unwrap();
        tree.append_child(para_el, text).unwrap();

        let mut plugin = create_cache_plugin(CacheOptions::default(), root);
        plugin.initialize(&mut tree);

        let segment = Segment::text("test", SegmentFormat::default());
        let skey = segment.key;
        let paragraph = Paragraph::new(vec![segment]);
        let pkey = paragraph.key;
        let model = ContentModelDocument::new(vec![Block::Paragraph(paragraph)]);
        let host = TestHost::focused();
        plugin.on_event(
            &mut tree,
            &host,
            PluginEvent::ContentChanged {
                model: Some(model),
                selection: None,
            },
        );
        plugin
            .state_mut()
            .indexer
            .as_mut()
            .unwrap()
            .on_segment(text, pkey, vec![skey]);

        (tree, plugin, root, text)
    }

    #[test]
    fn content_changed_adopts_snapshot() {
        let (_tree, plugin, _root, _text) = editor();
        assert!(plugin.cached_model().is_some());
    }

    #[test]
    fn content_changed_without_snapshot_invalidates() {
        let (mut tree, mut plugin, _root, _text) = editor();
        let host = TestHost::focused();
        plugin.on_event(
            &mut tree,
            &host,
            PluginEvent::ContentChanged {
                model: None,
                selection: None,
            },
        );
        assert!(plugin.cached_model().is_none());
        assert!(plugin.state().indexer.as_ref().unwrap().is_empty());
    }

    #[test]
    fn unknown_mutation_invalidates() {
        let (mut tree, mut plugin, _root, text) = editor();
        let host = TestHost::focused();
        let para = tree.parent(text).unwrap();
        tree.set_attribute(para, "style", Some("color: red")).unwrap();
        plugin.flush_mutations(&mut tree, &host);
        assert!(plugin.cached_model().is_none());
    }

    #[test]
    fn shadow_edit_suppresses_invalidation() {
        let (mut tree, mut plugin, _root, text) = editor();
        let host = TestHost {
            focus: true,
            shadow_edit: true,
        };
        let para = tree.parent(text).unwrap();
        tree.set_attribute(para, "style", Some("color: red")).unwrap();
        plugin.flush_mutations(&mut tree, &host);
        assert!(plugin.cached_model().is_some());
    }

    #[test]
    fn selection_changed_reconciles_and_caches() {
        let (mut tree, mut plugin, _root, text) = editor();
        let host = TestHost::focused();
        let selection = DomSelection::collapsed(text, 2);
        tree.set_native_selection(Some(selection.clone()));
        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        assert_eq!(plugin.state().cached_selection, Some(selection));
        let model = plugin.cached_model().unwrap();
        let Block::Paragraph(p) = &model.blocks[0] else {
            panic!("expected paragraph")
        };
        assert_eq!(p.segments.len(), 3);
        assert!(p.segments[1].is_marker());
    }

    #[test]
    fn unchanged_selection_short_circuits() {
        let (mut tree, mut plugin, _root, text) = editor();
        let host = TestHost::focused();
        let selection = DomSelection::collapsed(text, 2);
        tree.set_native_selection(Some(selection));
        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        let snapshot = plugin.cached_model().unwrap().clone();

        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        assert_eq!(plugin.cached_model().unwrap(), &snapshot);
    }

    #[test]
    fn selection_changed_with_nothing_cached_and_no_native_selection_keeps_cache() {
        let (mut tree, mut plugin, _root, _text) = editor();
        let host = TestHost::focused();
        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        assert!(plugin.cached_model().is_some());
    }

    #[test]
    fn losing_the_native_selection_invalidates_a_cached_one() {
        let (mut tree, mut plugin, _root, text) = editor();
        let host = TestHost::focused();
        tree.set_native_selection(Some(DomSelection::collapsed(text, 2)));
        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        assert!(plugin.state().cached_selection.is_some());

        tree.set_native_selection(None);
        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        assert!(plugin.cached_model().is_none());
    }

    #[test]
    fn selection_changed_without_focus_is_ignored() {
        let (mut tree, mut plugin, _root, text) = editor();
        let host = TestHost {
            focus: false,
            shadow_edit: false,
        };
        tree.set_native_selection(Some(DomSelection::collapsed(text, 2)));
        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        assert_eq!(plugin.state().cached_selection, None);
        assert!(plugin.cached_model().is_some());
    }

    #[test]
    fn failed_selection_reconciliation_invalidates() {
        let (mut tree, mut plugin, _root, _text) = editor();
        let host = TestHost::focused();
        let stray = tree.create_text("stray");
        tree.set_native_selection(Some(DomSelection::collapsed(stray, 0)));
        plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);
        assert!(plugin.cached_model().is_none());
        assert_eq!(plugin.state().cached_selection, None);
    }

    #[test]
    fn text_mutation_reconciles_and_rederives_selection() {
        let (mut tree, mut plugin, _root, text) = editor();
        let host = TestHost::focused();
        tree.set_text(text, "tested").unwrap();
        tree.set_native_selection(Some(DomSelection::collapsed(text, 6)));
        plugin.flush_mutations(&mut tree, &host);

        let model = plugin.cached_model().unwrap();
        let Block::Paragraph(p) = &model.blocks[0] else {
            panic!("expected paragraph")
        };
        let combined: String = p.segments.iter().filter_map(|s| s.text_content()).collect();
        assert_eq!(combined, "tested");
        assert!(p.segments.iter().any(|s| s.is_marker()));
    }

    #[test]
    fn logical_root_changed_invalidates_and_reobserves() {
        let (mut tree, mut plugin, _root, _text) = editor();
        let host = TestHost::focused();
        let new_root = tree.create_element("div");
        plugin.on_event(
            &mut tree,
            &host,
            PluginEvent::LogicalRootChanged { root: new_root },
        );
        assert!(plugin.cached_model().is_none());
        assert_eq!(tree.observed_root(), Some(new_root));
    }

    #[test]
    fn disabled_cache_never_adopts_and_invalidates_on_key_down() {
        let mut tree = DomTree::new();
        let root = tree.create_element("div");
        let mut plugin = create_cache_plugin(
            CacheOptions {
                disable_cache: true,
            },
            root,
        );
        plugin.initialize(&mut tree);
        assert!(!tree.is_observing());

        let host = TestHost::focused();
        let model = ContentModelDocument::new(Vec::new());
        plugin.on_event(
            &mut tree,
            &host,
            PluginEvent::ContentChanged {
                model: Some(model),
                selection: None,
            },
        );
        assert!(plugin.cached_model().is_none());

        plugin.on_event(&mut tree, &host, PluginEvent::KeyDown);
        assert!(plugin.cached_model().is_none());
    }
}
