/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for barracuda-template using test fixtures.
 */

use barracuda_dom::{Document, DomError, parse};
use barracuda_template::eval_context::{
    CHILD_NOT_ADDED, DEFAULT_VIEW_FAILED, ITERATION_MISMATCH, MISSING_MODEL, NO_PROGRESS,
    NOT_ITERATIVE,
};
use barracuda_template::{
    Component, Directive, DiagnosticKind, Item, IterativeModel, ListModel, MapModel,
    ModelValue, OutputFormat, RenderScope, Template, TemplateConfig, TemplateError,
    TemplateModel, TemplateOptions, ViewContext,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> std::path::PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

/// Helper to load a template document from fixtures
fn load_fixture(name: &str) -> Document {
    let source = std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to read fixture: {}", name));
    parse(&source).unwrap_or_else(|_| panic!("Failed to parse fixture: {}", name))
}

/// A permanent template over the whole document.
fn document_template(doc: &mut Document) -> Template {
    let root = doc.root();
    Template::new(doc, root)
}

fn items(values: &[&str]) -> ListModel {
    ListModel::new("Items", values.iter().map(|v| ModelValue::from(*v)).collect())
}

fn codes(report: &barracuda_template::RenderReport) -> Vec<&str> {
    report
        .diagnostics
        .iter()
        .filter_map(|d| d.code.as_deref())
        .collect()
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_single_node_loop() {
    let mut doc =
        parse(r#"<ul><li class="Dir::Iterate_Start:Items Dir::Get_Data:Items.name"/></ul>"#)
            .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(items(&["a", "b", "c"]));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    assert!(report.is_clean());
}

#[test]
fn test_single_node_loop_followed_by_static_siblings() {
    let mut doc = parse(
        r#"<ul><li class="Dir::Iterate_Start:Items Dir::Get_Data:Items.name"/><li>static</li></ul>"#,
    )
    .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(items(&["a", "b"]));

    template.render_once(&mut doc).unwrap();
    assert_eq!(
        doc.to_xml(),
        "<ul><li>a</li><li>b</li><li>static</li></ul>"
    );
}

#[test]
fn test_empty_loop_emits_nothing() {
    let mut doc = parse(
        r#"<ul><li class="Dir::Iterate_Start:Items Dir::Get_Data:Items.name"/><li>static</li></ul>"#,
    )
    .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(items(&[]));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<ul><li>static</li></ul>");
    assert!(report.is_clean());
}

#[test]
fn test_multi_node_loop_with_explicit_end() {
    let mut doc = load_fixture("people-table.xhtml");
    let mut template = document_template(&mut doc);
    template.add_model(ListModel::from_json(
        "People",
        json!([{"name": "Ann", "age": 31}, {"name": "Bob", "age": 42}]),
    ));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(
        doc.to_xml(),
        "<table>\n  <tr><td>Ann</td><td>31</td></tr>\n  <tr><td>Bob</td><td>42</td></tr>\n  <tr><td>total</td></tr>\n</table>"
    );
    assert!(report.is_clean());
}

#[test]
fn test_loop_sets_attributes_per_record() {
    let mut doc = load_fixture("nav.xhtml");
    let mut template = document_template(&mut doc);
    template.add_model(ListModel::from_json(
        "Links",
        json!([{"url": "/a", "label": "A"}, {"url": "/b", "label": "B"}]),
    ));

    template.render_once(&mut doc).unwrap();
    assert_eq!(
        doc.to_xml(),
        "<nav>\n  <a href=\"/a\">A</a><a href=\"/b\">B</a>\n</nav>"
    );
}

/// Iterative model that counts protocol calls.
struct Counting {
    records: Vec<&'static str>,
    current: Option<usize>,
    pre: Rc<Cell<usize>>,
    post: Rc<Cell<usize>>,
}

impl TemplateModel for Counting {
    fn name(&self) -> &str {
        "Rows"
    }

    fn item(&mut self, _directive: &Directive, _view: &mut ViewContext<'_>) -> Item {
        match self.current {
            Some(i) => Item::text(self.records[i]),
            None => Item::Empty,
        }
    }

    fn as_iterative(&mut self) -> Option<&mut dyn IterativeModel> {
        Some(self)
    }
}

impl IterativeModel for Counting {
    fn pre_iterate(&mut self) {
        self.pre.set(self.pre.get() + 1);
        self.current = None;
    }

    fn has_next(&mut self) -> bool {
        self.current.map_or(0, |i| i + 1) < self.records.len()
    }

    fn load_next(&mut self) {
        self.current = Some(self.current.map_or(0, |i| i + 1));
    }

    fn post_iterate(&mut self) {
        self.post.set(self.post.get() + 1);
    }
}

#[test]
fn test_pre_and_post_iterate_run_once_per_loop() {
    let mut doc = parse(concat!(
        "<div>",
        r#"<h2 class="Dir::Iterate_Start:Rows Dir::Get_Data:Rows.x"/>"#,
        r#"<p class="Dir::Get_Data:Rows.x"/>"#,
        r#"<hr class="Dir::Iterate_End:Rows"/>"#,
        "</div>"
    ))
    .unwrap();
    let pre = Rc::new(Cell::new(0));
    let post = Rc::new(Cell::new(0));
    let mut template = document_template(&mut doc);
    template.add_model(Counting {
        records: vec!["one", "two", "three"],
        current: None,
        pre: pre.clone(),
        post: post.clone(),
    });

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(
        doc.to_xml(),
        "<div><h2>one</h2><p>one</p><h2>two</h2><p>two</p><h2>three</h2><p>three</p><hr/></div>"
    );
    assert_eq!(pre.get(), 1);
    assert_eq!(post.get(), 1);
    assert!(report.is_clean());
}

#[test]
fn test_loop_without_next_is_closed_after_one_pass() {
    let mut doc = parse(concat!(
        "<div>",
        r#"<section class="Dir::Iterate_Start:Items"><b>x</b></section>"#,
        r#"<hr class="Dir::Iterate_End:Items"/>"#,
        "</div>"
    ))
    .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(items(&["a", "b"]));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<div><section><b>x</b></section></div>");
    assert_eq!(codes(&report), vec![NO_PROGRESS]);
}

#[test]
fn test_rendering_twice_regenerates_from_master() {
    let mut doc =
        parse(r#"<ul><li class="Dir::Iterate_Start:Items Dir::Get_Data:Items.name"/></ul>"#)
            .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(items(&["a", "b"]));

    template.render_once(&mut doc).unwrap();
    let first = doc.to_xml();
    template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), first);
    assert_eq!(first, "<ul><li>a</li><li>b</li></ul>");
}

#[test]
fn test_repeated_renders_reuse_arena_slots() {
    let mut doc = parse(concat!(
        "<section>",
        r#"<p class="Dir::Iterate_Start:Items Dir::Get_Data:Items.name"/>"#,
        r#"<i class="Dir::Get_Data:Card.view"/>"#,
        r#"<b class="Dir::Discard"/>"#,
        "</section>"
    ))
    .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(items(&["a", "b", "c"]));
    template.add_model(Card);
    template.add_model(MapModel::new("Person").with_value("name", "Ann"));

    let mut sizes = Vec::new();
    for _ in 0..20 {
        template.render_once(&mut doc).unwrap();
        sizes.push((doc.node_count(), doc.capacity()));
    }
    assert_eq!(
        doc.to_xml(),
        "<section><p>a</p><p>b</p><p>c</p><div><b>Ann</b></div></section>"
    );
    // Live nodes: the output plus the pinned master
    assert!(sizes.iter().all(|&(live, _)| live == sizes[0].0));
    assert!(sizes[2..].iter().all(|&(_, capacity)| capacity == sizes[2].1));
}

// ============================================================================
// Directive sources
// ============================================================================

#[test]
fn test_id_map_from_config() {
    let config =
        TemplateConfig::from_toml_str(&std::fs::read_to_string(fixture_path("rows.toml")).unwrap())
            .unwrap();
    let mut doc = load_fixture("rows.xhtml");
    let mut template = document_template(&mut doc)
        .with_options(config.options.clone())
        .with_id_map(config.id_map().unwrap());
    template.add_model(items(&["a", "b"]));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(
        doc.to_xml(),
        r#"<ul><li>a</li><li>b</li><li id="static">more</li></ul>"#
    );
    assert!(report.is_clean());
}

#[test]
fn test_processing_instructions_in_xml() {
    let mut doc = load_fixture("catalog.xml");
    let mut template = document_template(&mut doc)
        .with_options(TemplateOptions::new().with_output_format(OutputFormat::Xml));
    template.add_model(ListModel::from_json(
        "Books",
        json!([{"title": "Dune"}, {"title": "Emma & Co"}]),
    ));

    let report = template.render_once(&mut doc).unwrap();
    insta::assert_snapshot!(doc.to_xml(), @"<catalog><book><title>Dune</title></book><book><title>Emma &amp; Co</title></book></catalog>");
    assert!(report.is_clean());
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_discard_and_missing_model() {
    let mut doc = parse(concat!(
        "<div>",
        r#"<p class="Dir::Discard">gone</p>"#,
        r#"<p class="note Dir::Get_Data:Nope.x">kept</p>"#,
        "</div>"
    ))
    .unwrap();
    let template = document_template(&mut doc);

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), r#"<div><p class="note">kept</p></div>"#);
    assert_eq!(codes(&report), vec![MISSING_MODEL]);
    assert_eq!(report.warnings().count(), 1);
    assert!(!report.has_errors());
}

#[test]
fn test_discard_wins_over_get_data() {
    for directives in [
        "Dir::Get_Data:M.x Dir::Discard",
        "Dir::Discard Dir::Get_Data:M.x",
    ] {
        let mut doc = parse(&format!(
            r#"<div><i class="{}">template</i><p>kept</p></div>"#,
            directives
        ))
        .unwrap();
        let mut template = document_template(&mut doc);
        template.add_model(MapModel::new("M").with_value("x", "fetched"));

        let report = template.render_once(&mut doc).unwrap();
        let output = doc.to_xml();
        assert_eq!(output, "<div><p>kept</p></div>", "{}", directives);
        assert!(!output.contains("fetched"));
        assert!(report.is_clean());
    }
}

#[test]
fn test_strict_mode_reports_errors() {
    let mut doc = parse(r#"<p class="Dir::Get_Data:Nope.x">kept</p>"#).unwrap();
    let template = document_template(&mut doc)
        .with_options(TemplateOptions::new().with_strict_mode(true));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<p>kept</p>");
    assert!(report.has_errors());
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Error);
}

#[test]
fn test_misplaced_iteration_directives() {
    let mut doc = parse(concat!(
        "<div>",
        r#"<p class="Dir::Iterate_End:Items">x</p>"#,
        r#"<p class="Dir::Iterate_Start:Config">y</p>"#,
        "</div>"
    ))
    .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(items(&["a"]));
    template.add_model(MapModel::new("Config").with_value("k", "v"));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<div><p>x</p><p>y</p></div>");
    assert_eq!(codes(&report), vec![ITERATION_MISMATCH, NOT_ITERATIVE]);
}

// ============================================================================
// Bindings and block iteration
// ============================================================================

#[test]
fn test_step_child_replaces_node() {
    let mut doc = parse(r#"<div><p class="Dir::Get_Data:M.k">old</p></div>"#).unwrap();
    let root = doc.document_element().unwrap();
    let p = doc.children(root)[0];
    let mut template = Template::step_child(p);
    template.add_model(MapModel::new("M").with_value("k", "new"));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<div><p>new</p></div>");
    assert_ne!(report.node, p);
    assert_eq!(doc.parent(report.node), Some(root));
}

#[test]
fn test_block_iterate_region_copied_verbatim() {
    let source = concat!(
        "<div>",
        r#"<p class="Dir::Block_Iterate_Start:Rows">x <b class="Dir::Get_Data:M.k"/></p>"#,
        r#"<i class="Dir::Get_Data:M.k"/>"#,
        r#"<p class="Dir::Block_Iterate_End:Rows"/>"#,
        r#"<em class="Dir::Get_Data:M.k"/>"#,
        "</div>"
    );
    let mut doc = parse(source).unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(MapModel::new("M").with_value("k", "v"));

    let mut scope = RenderScope::new();
    let report = template.render(&mut doc, &mut scope).unwrap();
    assert!(report.has_block_iterator);
    assert!(scope.has_block_iterator());
    assert_eq!(
        doc.to_xml(),
        concat!(
            "<div>",
            r#"<p class="Dir::Block_Iterate_Start:Rows">x <b class="Dir::Get_Data:M.k"/></p>"#,
            r#"<i class="Dir::Get_Data:M.k"/>"#,
            r#"<p class="Dir::Block_Iterate_End:Rows"/>"#,
            "<em>v</em>",
            "</div>"
        )
    );
}

// ============================================================================
// Models returning nodes and components
// ============================================================================

/// Answers with a fragment that itself carries directives.
struct Card;

impl TemplateModel for Card {
    fn name(&self) -> &str {
        "Card"
    }

    fn item(&mut self, _directive: &Directive, view: &mut ViewContext<'_>) -> Item {
        let div = view.doc.create_element("div");
        let b = view.doc.create_element("b");
        view.doc
            .set_attribute(b, "class", "Dir::Get_Data:Person.name")
            .unwrap();
        view.doc.append_child(div, b).unwrap();
        Item::Node(div)
    }
}

#[test]
fn test_node_item_gets_nested_pass() {
    let mut doc = parse(r#"<section><p class="Dir::Get_Data:Card.view"/></section>"#).unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(Card);
    template.add_model(MapModel::new("Person").with_value("name", "Ann"));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<section><div><b>Ann</b></div></section>");
    assert!(report.is_clean());
}

/// Answers with a fragment that refers back to itself.
struct Recursive;

impl TemplateModel for Recursive {
    fn name(&self) -> &str {
        "Loop"
    }

    fn item(&mut self, _directive: &Directive, view: &mut ViewContext<'_>) -> Item {
        let div = view.doc.create_element("div");
        let p = view.doc.create_element("p");
        view.doc
            .set_attribute(p, "class", "Dir::Get_Data:Loop.x")
            .unwrap();
        view.doc.append_child(div, p).unwrap();
        Item::Node(div)
    }
}

#[test]
fn test_runaway_nesting_aborts() {
    let mut doc = parse(r#"<section><p class="Dir::Get_Data:Loop.x"/></section>"#).unwrap();
    let mut template = document_template(&mut doc)
        .with_options(TemplateOptions::new().with_max_nesting_depth(3));
    template.add_model(Recursive);

    let err = template.render_once(&mut doc).unwrap_err();
    assert!(matches!(err, TemplateError::NestingTooDeep { max_depth: 3 }));
}

/// Answers every key with a fixed component.
struct Widgets(Component);

impl TemplateModel for Widgets {
    fn name(&self) -> &str {
        "W"
    }

    fn item(&mut self, _directive: &Directive, _view: &mut ViewContext<'_>) -> Item {
        Item::Component(self.0.clone())
    }
}

#[test]
fn test_link_component_builds_default_view() {
    let mut doc = parse(r#"<nav><p class="item Dir::Get_Data:W.home"/></nav>"#).unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(Widgets(Component::link("/home", Some("Home"))));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(
        doc.to_xml(),
        r#"<nav><p class="item"><a href="/home">Home</a></p></nav>"#
    );
    assert!(report.is_clean());
}

#[test]
fn test_component_without_renderer_for_format_is_skipped() {
    let mut doc = parse(r#"<doc><ref class="Dir::Get_Data:W.home">keep</ref></doc>"#).unwrap();
    let mut template = document_template(&mut doc)
        .with_options(TemplateOptions::new().with_output_format(OutputFormat::Xml));
    template.add_model(Widgets(Component::anchor("/home", Some("Home"))));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<doc><ref>keep</ref></doc>");
    assert_eq!(codes(&report), vec![DEFAULT_VIEW_FAILED]);
}

/// Hands back a component bound to a node of its own.
struct BoundAnchor;

impl TemplateModel for BoundAnchor {
    fn name(&self) -> &str {
        "W"
    }

    fn item(&mut self, _directive: &Directive, view: &mut ViewContext<'_>) -> Item {
        let span = view.doc.create_element("span");
        Item::Component(Component::anchor("/x", None).with_view(span))
    }
}

#[test]
fn test_html_wraps_model_output_but_not_template_markup() {
    let mut doc = parse(concat!(
        "<ul>",
        "<p>x</p><!-- c -->",
        r#"<p class="Dir::Get_Data:Card.view"/>"#,
        "</ul>"
    ))
    .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(Card);
    template.add_model(MapModel::new("Person").with_value("name", "Ann"));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(
        doc.to_xml(),
        "<ul><p>x</p><!-- c --><li><div><b>Ann</b></div></li></ul>"
    );
    assert!(report.is_clean());
}

#[test]
fn test_model_output_rejected_by_colgroup() {
    let mut doc = parse(concat!(
        "<table><colgroup>",
        "<col/>",
        r#"<col class="Dir::Get_Data:Card.view"/>"#,
        "</colgroup></table>"
    ))
    .unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(Card);
    template.add_model(MapModel::new("Person").with_value("name", "Ann"));

    let report = template.render_once(&mut doc).unwrap();
    assert_eq!(doc.to_xml(), "<table><colgroup><col/></colgroup></table>");
    assert_eq!(codes(&report), vec![CHILD_NOT_ADDED]);
}

/// Hands out nodes of a document of its own.
struct Elsewhere {
    other: Document,
    node: barracuda_dom::NodeId,
    as_view: bool,
}

impl Elsewhere {
    fn new(as_view: bool) -> Self {
        let mut other = Document::new();
        let node = other.create_element("a");
        Self {
            other,
            node,
            as_view,
        }
    }
}

impl TemplateModel for Elsewhere {
    fn name(&self) -> &str {
        "Elsewhere"
    }

    fn item(&mut self, _directive: &Directive, _view: &mut ViewContext<'_>) -> Item {
        assert!(self.other.contains(self.node));
        if self.as_view {
            Item::Component(Component::anchor("/x", None).with_view(self.node))
        } else {
            Item::Node(self.node)
        }
    }
}

#[test]
fn test_nodes_of_another_document_are_rejected() {
    for as_view in [false, true] {
        let mut doc = parse(r#"<div><p class="Dir::Get_Data:Elsewhere.x"/><a/></div>"#).unwrap();
        let mut template = document_template(&mut doc);
        template.add_model(Elsewhere::new(as_view));

        let err = template.render_once(&mut doc).unwrap_err();
        assert!(
            matches!(err, TemplateError::Dom(DomError::HierarchyRequest { .. })),
            "{:?}",
            err
        );
    }
}

#[test]
fn test_component_bound_to_unsuitable_node_aborts() {
    let mut doc = parse(r#"<div><p class="Dir::Get_Data:W.link"/></div>"#).unwrap();
    let mut template = document_template(&mut doc);
    template.add_model(BoundAnchor);

    let err = template.render_once(&mut doc).unwrap_err();
    assert!(matches!(err, TemplateError::NoSuitableRenderer { .. }));
}
