//! End-to-end flows through the cache plugin: native events in, cache
//! state out.

use content_model::{Block, ContentModelDocument, Paragraph, Segment, SegmentFormat, SegmentKind};
use live_dom::{DomPosition, DomSelection, DomTree, NodeKey};
use model_cache::{create_cache_plugin, CacheOptions, CachePlugin, EditorHost, PluginEvent};

struct Host {
    focus: bool,
    shadow_edit: bool,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            focus: true,
            shadow_edit: false,
        }
    }
}

impl EditorHost for Host {
    fn has_focus(&self) -> bool {
        self.focus
    }
    fn is_in_shadow_edit(&self) -> bool {
        self.shadow_edit
    }
}

struct Editor {
    tree: DomTree,
    plugin: CachePlugin,
    paragraph_element: NodeKey,
    text_nodes: Vec<NodeKey>,
}

/// One observed paragraph with one DOM text node (and one indexed model
/// segment) per entry in `texts`, adopted into the plugin's cache.
fn editor_with_texts(texts: &[&str]) -> Editor {
    let mut tree = DomTree::new();
    let root = tree.create_element("div");
    let paragraph_element = tree.create_element("p");
    tree.append_child(root, paragraph_element).unwrap();

    let mut text_nodes = Vec::new();
    let mut segments = Vec::new();
    let mut keys = Vec::new();
    for text in texts {
        let node = tree.create_text(text);
        tree.append_child(paragraph_element, node).unwrap();
        let segment = Segment::text(*text, SegmentFormat::default());
        keys.push(segment.key);
        segments.push(segment);
        text_nodes.push(node);
    }
    let paragraph = Paragraph::new(segments);
    let pkey = paragraph.key;
    let model = ContentModelDocument::new(vec![Block::Paragraph(paragraph)]);

    let mut plugin = create_cache_plugin(CacheOptions::default(), root);
    plugin.initialize(&mut tree);
    plugin.on_event(
        &mut tree,
        &Host::default(),
        PluginEvent::ContentChanged {
            model: Some(model),
            selection: None,
        },
    );
    let indexer = plugin.state_mut().indexer.as_mut().unwrap();
    for (node, key) in text_nodes.iter().zip(keys) {
        indexer.on_segment(*node, pkey, vec![key]);
    }

    Editor {
        tree,
        plugin,
        paragraph_element,
        text_nodes,
    }
}

fn paragraph_segments(model: &ContentModelDocument) -> &[Segment] {
    let Block::Paragraph(p) = &model.blocks[0] else {
        panic!("expected a paragraph block")
    };
    &p.segments
}

#[test]
fn collapsed_caret_splits_cached_text_run() {
    let mut e = editor_with_texts(&["test"]);
    let host = Host::default();
    e.tree
        .set_native_selection(Some(DomSelection::collapsed(e.text_nodes[0], 2)));
    e.plugin
        .on_event(&mut e.tree, &host, PluginEvent::SelectionChanged);

    let model = e.plugin.cached_model().expect("cache survives");
    let segments = paragraph_segments(model);
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].text_content(), Some("te"));
    assert!(segments[1].is_marker());
    assert_eq!(segments[2].text_content(), Some("st"));
}

#[test]
fn expanded_selection_across_two_text_nodes_marks_the_span() {
    let mut e = editor_with_texts(&["test1", "test2"]);
    let host = Host::default();
    e.tree.set_native_selection(Some(DomSelection::Range {
        start: DomPosition::new(e.text_nodes[0], 2),
        end: DomPosition::new(e.text_nodes[1], 3),
        reverted: false,
    }));
    e.plugin
        .on_event(&mut e.tree, &host, PluginEvent::SelectionChanged);

    let model = e.plugin.cached_model().expect("cache survives");
    let segments = paragraph_segments(model);
    let texts: Vec<&str> = segments.iter().filter_map(|s| s.text_content()).collect();
    assert_eq!(texts, vec!["te", "st1", "tes", "t2"]);
    let marker_positions: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_marker())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(marker_positions, vec![1, 4]);
    assert!(segments[2].is_selected);
    assert!(segments[3].is_selected);
}

#[test]
fn child_list_batch_with_two_added_nodes_invalidates() {
    let mut e = editor_with_texts(&["test"]);
    let host = Host::default();
    let a = e.tree.create_text("a");
    let b = e.tree.create_text("b");
    e.tree.append_child(e.paragraph_element, a).unwrap();
    e.tree.append_child(e.paragraph_element, b).unwrap();
    e.plugin.flush_mutations(&mut e.tree, &host);

    assert!(e.plugin.cached_model().is_none());
    assert!(e.plugin.state().indexer.as_ref().unwrap().is_empty());
}

#[test]
fn non_id_attribute_change_clears_model_and_selection() {
    let mut e = editor_with_texts(&["test"]);
    let host = Host::default();
    e.tree
        .set_native_selection(Some(DomSelection::collapsed(e.text_nodes[0], 1)));
    e.plugin
        .on_event(&mut e.tree, &host, PluginEvent::SelectionChanged);
    assert!(e.plugin.state().cached_selection.is_some());

    e.tree
        .set_attribute(e.paragraph_element, "style", Some("font-weight: bold"))
        .unwrap();
    e.plugin.flush_mutations(&mut e.tree, &host);
    assert!(e.plugin.cached_model().is_none());
    assert!(e.plugin.state().cached_selection.is_none());
}

#[test]
fn image_selection_marks_the_indexed_image_segment() {
    let mut tree = DomTree::new();
    let root = tree.create_element("div");
    let paragraph_element = tree.create_element("p");
    let img = tree.create_element("img");
    tree.append_child(root, paragraph_element).unwrap();
    tree.append_child(paragraph_element, img).unwrap();

    let segment = Segment::image("test", SegmentFormat::default());
    let skey = segment.key;
    let paragraph = Paragraph::new(vec![segment]);
    let pkey = paragraph.key;
    let model = ContentModelDocument::new(vec![Block::Paragraph(paragraph)]);

    let mut plugin = create_cache_plugin(CacheOptions::default(), root);
    plugin.initialize(&mut tree);
    let host = Host::default();
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
        .on_segment(img, pkey, vec![skey]);

    tree.set_native_selection(Some(DomSelection::Image { image: img }));
    plugin.on_event(&mut tree, &host, PluginEvent::SelectionChanged);

    let model = plugin.cached_model().expect("cache survives");
    let segments = paragraph_segments(model);
    assert!(segments[0].is_selected);
    assert!(matches!(
        segments[0].kind,
        SegmentKind::Image {
            is_selected_as_image_selection: true,
            ..
        }
    ));
}

#[test]
fn shadow_edit_freezes_the_cache_until_it_ends() {
    let mut e = editor_with_texts(&["test"]);
    let shadow = Host {
        focus: true,
        shadow_edit: true,
    };
    e.tree
        .set_attribute(e.paragraph_element, "style", Some("color: red"))
        .unwrap();
    e.plugin.flush_mutations(&mut e.tree, &shadow);
    assert!(e.plugin.cached_model().is_some());

    // shadow edit ends; the next invalidating mutation lands normally
    let host = Host::default();
    e.tree
        .set_attribute(e.paragraph_element, "class", Some("changed"))
        .unwrap();
    e.plugin.flush_mutations(&mut e.tree, &host);
    assert!(e.plugin.cached_model().is_none());
}

#[test]
fn typing_flow_keeps_the_cache_coherent() {
    // A realistic keystroke: characterData on the indexed text node, then
    // the selection moves. The cache must track both without invalidating.
    let mut e = editor_with_texts(&["test"]);
    let host = Host::default();

    e.tree.set_text(e.text_nodes[0], "teXst").unwrap();
    e.tree
        .set_native_selection(Some(DomSelection::collapsed(e.text_nodes[0], 3)));
    e.plugin
        .on_event(&mut e.tree, &host, PluginEvent::SelectionChanged);

    let model = e.plugin.cached_model().expect("cache survives");
    let segments = paragraph_segments(model);
    let combined: String = segments.iter().filter_map(|s| s.text_content()).collect();
    assert_eq!(combined, "teXst");
    assert_eq!(segments.iter().filter(|s| s.is_marker()).count(), 1);
    assert_eq!(segments[0].text_content(), Some("teX"));
}

#[test]
fn mutations_inside_entity_subtrees_leave_the_cache_alone() {
    let mut e = editor_with_texts(&["test"]);
    let host = Host::default();
    let wrapper = e.tree.create_element("span");
    e.tree
        .set_attribute(wrapper, model_cache::ENTITY_WRAPPER_ATTR, Some("widget"))
        .unwrap();
    let inner = e.tree.create_text("opaque");
    e.tree.append_child(wrapper, inner).unwrap();
    // the wrapper insertion itself is an element add, which is not
    // reconcilable; the cache drops once
    e.tree.append_child(e.paragraph_element, wrapper).unwrap();
    e.plugin.flush_mutations(&mut e.tree, &host);
    assert!(e.plugin.cached_model().is_none());

    // refresh the cache, then mutate only inside the opaque subtree
    let segment = Segment::text("test", SegmentFormat::default());
    let skey = segment.key;
    let paragraph = Paragraph::new(vec![segment]);
    let pkey = paragraph.key;
    e.plugin.on_event(
        &mut e.tree,
        &host,
        PluginEvent::ContentChanged {
            model: Some(ContentModelDocument::new(vec![Block::Paragraph(paragraph)])),
            selection: None,
        },
    );
    e.plugin
        .state_mut()
        .indexer
        .as_mut()
        .unwrap()
        .on_segment(e.text_nodes[0], pkey, vec![skey]);

    e.tree.set_text(inner, "changed").unwrap();
    e.plugin.flush_mutations(&mut e.tree, &host);
    assert!(e.plugin.cached_model().is_some());
}

#[test]
fn moving_a_text_node_within_its_paragraph_reorders_segments() {
    let mut e = editor_with_texts(&["a", "b"]);
    let host = Host::default();

    // move "a" to the end: the browser reports it removed and re-added
    let moved = e.text_nodes[0];
    e.tree.remove_child(moved).unwrap();
    e.tree.append_child(e.paragraph_element, moved).unwrap();
    e.plugin.flush_mutations(&mut e.tree, &host);

    let model = e.plugin.cached_model().expect("move reconciles");
    let texts: Vec<&str> = paragraph_segments(model)
        .iter()
        .filter_map(|s| s.text_content())
        .collect();
    assert_eq!(texts, vec!["b", "a"]);
}

#[test]
fn removing_then_reselecting_survives_a_node_replacement() {
    let mut e = editor_with_texts(&["old"]);
    let host = Host::default();

    let removed = e.text_nodes[0];
    let added = e.tree.create_text("fresh");
    e.tree.remove_child(removed).unwrap();
    e.tree.append_child(e.paragraph_element, added).unwrap();
    e.plugin.flush_mutations(&mut e.tree, &host);

    let model = e.plugin.cached_model().expect("replacement reconciles");
    let texts: Vec<&str> = paragraph_segments(model)
        .iter()
        .filter_map(|s| s.text_content())
        .collect();
    assert_eq!(texts, vec!["fresh"]);

    e.tree
        .set_native_selection(Some(DomSelection::collapsed(added, 5)));
    e.plugin
        .on_event(&mut e.tree, &host, PluginEvent::SelectionChanged);
    let model = e.plugin.cached_model().expect("new node is indexed");
    let segments = paragraph_segments(model);
    assert_eq!(segments[0].text_content(), Some("fresh"));
    assert!(segments[1].is_marker());
}
