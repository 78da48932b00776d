/*
 * component.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Components and their renderers.
//!
//! A model may answer a `Get_Data` directive with a [`Component`]: a small
//! description of UI state (a text, a link, a select with its options) that
//! renders itself into a node once the template pass is done. Rendering is
//! dispatched through a closed strategy table keyed by output format and
//! component kind ([`renderer_for`]); within a renderer, behavior depends on
//! the [`ElementKind`] of the bound node.

use crate::directive::DIRECTIVE_PREFIX;
use crate::error::{TemplateError, TemplateResult};
use crate::options::{OutputFormat, TemplateOptions};
use barracuda_dom::{Document, DomError, DomResult, NodeId, NodeKind};

/// Combination mode of an inline script with the handler already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptMode {
    #[default]
    Replace,
    Append,
    Prepend,
}

/// An option of a select component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    Text {
        text: String,
        /// Insert the text as raw markup instead of escaped text.
        allow_markup: bool,
    },
    Label {
        text: String,
        /// Id of the labelled control.
        for_id: Option<String>,
    },
    Anchor {
        href: String,
        target: Option<String>,
        text: Option<String>,
    },
    /// Something that triggers a request: a link target, a form action or a
    /// submit button.
    Action {
        action: String,
    },
    Input {
        input_type: Option<String>,
        value: Option<String>,
    },
    Select {
        options: Vec<SelectOption>,
        selected: Vec<String>,
    },
    /// Inline script bound to an event attribute (`onclick`, ...).
    Script {
        attribute: String,
        script: String,
        mode: ScriptMode,
    },
    Link {
        href: String,
        text: Option<String>,
        target: Option<String>,
    },
}

impl ComponentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Text { .. } => "text",
            ComponentKind::Label { .. } => "label",
            ComponentKind::Anchor { .. } => "anchor",
            ComponentKind::Action { .. } => "action",
            ComponentKind::Input { .. } => "input",
            ComponentKind::Select { .. } => "select",
            ComponentKind::Script { .. } => "script",
            ComponentKind::Link { .. } => "link",
        }
    }
}

/// A renderable UI component returned by a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub kind: ComponentKind,
    /// Value of the `name` attribute on form elements.
    pub name: Option<String>,
    pub enabled: bool,
    /// Extra attributes; `None` removes the attribute, `class` is appended.
    pub attributes: Vec<(String, Option<String>)>,
    /// Node of the output document the component is already bound to.
    /// Without one, the renderer builds a default view.
    pub view: Option<NodeId>,
}

impl Component {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: None,
            enabled: true,
            attributes: Vec::new(),
            view: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ComponentKind::Text {
            text: text.into(),
            allow_markup: false,
        })
    }

    pub fn markup(text: impl Into<String>) -> Self {
        Self::new(ComponentKind::Text {
            text: text.into(),
            allow_markup: true,
        })
    }

    pub fn label(text: impl Into<String>, for_id: Option<&str>) -> Self {
        Self::new(ComponentKind::Label {
            text: text.into(),
            for_id: for_id.map(str::to_string),
        })
    }

    pub fn anchor(href: impl Into<String>, text: Option<&str>) -> Self {
        Self::new(ComponentKind::Anchor {
            href: href.into(),
            target: None,
            text: text.map(str::to_string),
        })
    }

    pub fn action(action: impl Into<String>) -> Self {
        Self::new(ComponentKind::Action {
            action: action.into(),
        })
    }

    pub fn input(input_type: Option<&str>, value: Option<&str>) -> Self {
        Self::new(ComponentKind::Input {
            input_type: input_type.map(str::to_string),
            value: value.map(str::to_string),
        })
    }

    pub fn select(options: Vec<SelectOption>, selected: Vec<String>) -> Self {
        Self::new(ComponentKind::Select { options, selected })
    }

    pub fn script(attribute: impl Into<String>, script: impl Into<String>, mode: ScriptMode) -> Self {
        Self::new(ComponentKind::Script {
            attribute: attribute.into(),
            script: script.into(),
            mode,
        })
    }

    pub fn link(href: impl Into<String>, text: Option<&str>) -> Self {
        Self::new(ComponentKind::Link {
            href: href.into(),
            text: text.map(str::to_string),
            target: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes.push((name.into(), value.map(str::to_string)));
        self
    }

    pub fn with_view(mut self, node: NodeId) -> Self {
        self.view = Some(node);
        self
    }

    /// Set the link or anchor target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        match &mut self.kind {
            ComponentKind::Anchor { target: t, .. } | ComponentKind::Link { target: t, .. } => {
                *t = Some(target.into());
            }
            _ => {}
        }
        self
    }
}

// ============================================================================
// Element classification
// ============================================================================

/// HTML element families the renderers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Anchor,
    Button,
    Form,
    Input,
    Select,
    Option,
    OptGroup,
    Table,
    TableRow,
    /// `thead`, `tbody`, `tfoot`
    TableSection,
    /// `td`, `th`
    TableCell,
    TableCaption,
    /// `col`, `colgroup`
    TableColumn,
    /// `ul`, `ol`
    List,
    ListItem,
    DefinitionList,
    /// `dd`, `dt`
    DefinitionItem,
    Image,
    Area,
    Title,
    TextArea,
    Script,
    Link,
    Style,
    Label,
    Other,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> ElementKind {
        match tag.to_ascii_lowercase().as_str() {
            "a" => ElementKind::Anchor,
            "button" => ElementKind::Button,
            "form" => ElementKind::Form,
            "input" => ElementKind::Input,
            "select" => ElementKind::Select,
            "option" => ElementKind::Option,
            "optgroup" => ElementKind::OptGroup,
            "table" => ElementKind::Table,
            "tr" => ElementKind::TableRow,
            "thead" | "tbody" | "tfoot" => ElementKind::TableSection,
            "td" | "th" => ElementKind::TableCell,
            "caption" => ElementKind::TableCaption,
            "col" | "colgroup" => ElementKind::TableColumn,
            "ul" | "ol" => ElementKind::List,
            "li" => ElementKind::ListItem,
            "dl" => ElementKind::DefinitionList,
            "dd" | "dt" => ElementKind::DefinitionItem,
            "img" => ElementKind::Image,
            "area" => ElementKind::Area,
            "title" => ElementKind::Title,
            "textarea" => ElementKind::TextArea,
            "script" => ElementKind::Script,
            "link" => ElementKind::Link,
            "style" => ElementKind::Style,
            "label" => ElementKind::Label,
            _ => ElementKind::Other,
        }
    }

    /// Kind of `node`, or `None` when it is not an element.
    pub fn of(doc: &Document, node: NodeId) -> Option<ElementKind> {
        doc.element_name(node).map(ElementKind::from_tag)
    }

    fn takes_name(self) -> bool {
        matches!(
            self,
            ElementKind::Anchor
                | ElementKind::Button
                | ElementKind::Form
                | ElementKind::Input
                | ElementKind::Select
                | ElementKind::TextArea
        )
    }

    fn takes_disabled(self) -> bool {
        matches!(
            self,
            ElementKind::Button
                | ElementKind::Input
                | ElementKind::OptGroup
                | ElementKind::Option
                | ElementKind::Select
                | ElementKind::Style
                | ElementKind::TextArea
        )
    }
}

fn is_tag(doc: &Document, node: NodeId, tag: &str) -> bool {
    doc.element_name(node)
        .is_some_and(|name| name.eq_ignore_ascii_case(tag))
}

/// Append `child` to `parent`, adding the wrapper element HTML requires
/// between them (`td` inside `tr`, `li` inside lists, ...). Returns the node
/// that was appended to `parent`.
///
/// Only elements and non-blank text are wrapped; other nodes are appended
/// as they are. `col` and `colgroup` accept `col` children only.
///
/// The engine calls this for nodes produced by `Get_Data` only. Markup
/// copied from the template is appended unchanged.
pub fn add_child_to_parent(doc: &mut Document, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
    let Some(parent_kind) = ElementKind::of(doc, parent) else {
        return doc.append_child(parent, child);
    };
    let child_kind = ElementKind::of(doc, child);
    let wrappable = match doc.kind(child) {
        NodeKind::Element { .. } => true,
        NodeKind::Text(text) | NodeKind::CData(text) => !text.trim().is_empty(),
        _ => false,
    };

    if parent_kind == ElementKind::TableColumn && wrappable && !is_tag(doc, child, "col") {
        return Err(DomError::HierarchyRequest {
            message: format!(
                "only col elements may be added to {} element {}",
                doc.element_name(parent).unwrap_or("col"),
                parent
            ),
        });
    }
    if !wrappable {
        return doc.append_child(parent, child);
    }

    use ElementKind as K;
    let wrapper = match (parent_kind, child_kind) {
        (K::TableRow, Some(K::TableCell)) => None,
        (K::TableRow, _) => Some("td"),
        (K::TableSection, Some(K::TableRow)) => None,
        (K::TableSection, _) => Some("tr"),
        (
            K::Table,
            Some(K::TableCaption | K::TableCell | K::TableColumn | K::TableRow | K::TableSection),
        ) => None,
        (K::Table, _) => Some("tr"),
        (K::List, Some(K::ListItem)) => None,
        (K::List, _) => Some("li"),
        (K::OptGroup, Some(K::Option)) => None,
        (K::OptGroup, _) => Some("option"),
        (K::Select, Some(K::OptGroup | K::Option)) => None,
        (K::Select, _) => Some("option"),
        (K::DefinitionList, Some(K::DefinitionItem)) => None,
        (K::DefinitionList, _) => Some("dd"),
        _ => None,
    };

    match wrapper {
        Some(tag) => {
            let wrapper = doc.create_element(tag);
            doc.append_child(wrapper, child)?;
            doc.append_child(parent, wrapper)
        }
        None => doc.append_child(parent, child),
    }
}

// ============================================================================
// Renderer strategy table
// ============================================================================

/// Node built for a component without a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultView {
    /// Node that goes into the output tree.
    pub node: NodeId,
    /// Node the component renders into (`node` itself or a descendant).
    pub view: NodeId,
}

impl DefaultView {
    pub fn same(node: NodeId) -> Self {
        Self { node, view: node }
    }
}

/// Renders one component kind for one output format.
pub trait ComponentRenderer {
    /// Build a node for a component that has no view. `None` means "use a
    /// deep clone of the template node".
    fn create_default_node(
        &self,
        _doc: &mut Document,
        _component: &Component,
        _template_node: NodeId,
        _options: &TemplateOptions,
    ) -> TemplateResult<Option<DefaultView>> {
        Ok(None)
    }

    /// Apply the component to `node`.
    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()>;
}

/// The renderer for `kind` under `format`.
pub fn renderer_for(
    format: OutputFormat,
    kind: &ComponentKind,
) -> TemplateResult<&'static dyn ComponentRenderer> {
    let renderer: &'static dyn ComponentRenderer = match (format, kind) {
        (OutputFormat::Html, ComponentKind::Text { .. }) => &HtmlTextRenderer,
        (OutputFormat::Html, ComponentKind::Label { .. }) => &HtmlLabelRenderer,
        (OutputFormat::Html, ComponentKind::Anchor { .. }) => &HtmlAnchorRenderer,
        (OutputFormat::Html, ComponentKind::Action { .. }) => &HtmlActionRenderer,
        (OutputFormat::Html, ComponentKind::Input { .. }) => &HtmlInputRenderer,
        (OutputFormat::Html, ComponentKind::Select { .. }) => &HtmlSelectRenderer,
        (OutputFormat::Html, ComponentKind::Script { .. }) => &HtmlScriptRenderer,
        (OutputFormat::Html, ComponentKind::Link { .. }) => &HtmlLinkRenderer,
        (OutputFormat::Xml, ComponentKind::Text { .. }) => &XmlTextRenderer,
        (OutputFormat::Xml, ComponentKind::Label { .. }) => &XmlTextRenderer,
        (OutputFormat::Xml, other) => {
            return Err(TemplateError::UnsupportedFormat {
                format: format.to_string(),
                component: other.label(),
            });
        }
    };
    Ok(renderer)
}

fn no_suitable(message: impl Into<String>) -> TemplateError {
    TemplateError::NoSuitableRenderer {
        message: message.into(),
    }
}

fn wrong_component(renderer: &str, component: &Component) -> TemplateError {
    no_suitable(format!(
        "the {} renderer cannot render {} components",
        renderer,
        component.kind.label()
    ))
}

fn unsupported_node(doc: &Document, component: &Component, node: NodeId) -> TemplateError {
    let what = doc.element_name(node).unwrap_or("non-element node");
    no_suitable(format!(
        "{} components cannot be rendered into <{}> ({})",
        component.kind.label(),
        what,
        node
    ))
}

/// Deep clone of the template node when it is one of `kinds`.
fn clone_if(
    doc: &mut Document,
    template_node: NodeId,
    kinds: &[ElementKind],
) -> Option<DefaultView> {
    let kind = ElementKind::of(doc, template_node)?;
    kinds
        .contains(&kind)
        .then(|| DefaultView::same(doc.clone_node(template_node, true)))
}

/// Component attributes: `None` removes, `class` is appended.
fn apply_attributes(doc: &mut Document, component: &Component, node: NodeId) -> DomResult<()> {
    for (name, value) in &component.attributes {
        match value {
            None => {
                doc.remove_attribute(node, name)?;
            }
            Some(value) if name == "class" => {
                let merged = match doc.get_attribute(node, name) {
                    Some(existing) => format!("{} {}", existing, value).trim().to_string(),
                    None => value.trim().to_string(),
                };
                doc.set_attribute(node, name, merged)?;
            }
            Some(value) => doc.set_attribute(node, name, value.as_str())?,
        }
    }
    Ok(())
}

/// Attributes, `name` and the enabled flag, shared by all HTML renderers.
fn render_html_common(doc: &mut Document, component: &Component, node: NodeId) -> DomResult<()> {
    let Some(kind) = ElementKind::of(doc, node) else {
        return Ok(());
    };
    apply_attributes(doc, component, node)?;

    if let Some(name) = &component.name {
        if kind.takes_name() || doc.has_attribute(node, "name") {
            doc.set_attribute(node, "name", name.as_str())?;
        }
    }

    if kind == ElementKind::Anchor {
        if !component.enabled {
            doc.remove_attribute(node, "href")?;
            doc.remove_attribute(node, "target")?;
        }
    } else if kind.takes_disabled() {
        if component.enabled {
            doc.remove_attribute(node, "disabled")?;
        } else {
            doc.set_attribute(node, "disabled", "disabled")?;
        }
    }
    Ok(())
}

/// Text for HTML elements: `value` on inputs, `alt` on images and areas,
/// the content otherwise.
fn render_html_text(
    doc: &mut Document,
    component: &Component,
    node: NodeId,
    text: &str,
    allow_markup: bool,
) -> TemplateResult<()> {
    match ElementKind::of(doc, node) {
        None => return Err(unsupported_node(doc, component, node)),
        Some(ElementKind::Input) => doc.set_attribute(node, "value", text)?,
        Some(ElementKind::Image | ElementKind::Area) => doc.set_attribute(node, "alt", text)?,
        Some(ElementKind::Title | ElementKind::TextArea) => {
            doc.set_text_in_node(node, text, false, false)?;
        }
        Some(_) => {
            doc.set_text_in_node(node, text, allow_markup, false)?;
        }
    }
    Ok(())
}

struct HtmlTextRenderer;

impl ComponentRenderer for HtmlTextRenderer {
    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Text { text, allow_markup } = &component.kind else {
            return Err(wrong_component("text", component));
        };
        render_html_common(doc, component, node)?;
        render_html_text(doc, component, node, text, *allow_markup)
    }
}

struct HtmlLabelRenderer;

impl ComponentRenderer for HtmlLabelRenderer {
    fn create_default_node(
        &self,
        doc: &mut Document,
        _component: &Component,
        template_node: NodeId,
        _options: &TemplateOptions,
    ) -> TemplateResult<Option<DefaultView>> {
        if let Some(view) = clone_if(doc, template_node, &[ElementKind::Label]) {
            return Ok(Some(view));
        }
        Ok(Some(DefaultView::same(doc.create_element("label"))))
    }

    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Label { text, for_id } = &component.kind else {
            return Err(wrong_component("label", component));
        };
        render_html_common(doc, component, node)?;
        if let (Some(for_id), Some(ElementKind::Label)) = (for_id, ElementKind::of(doc, node)) {
            doc.set_attribute(node, "for", for_id.as_str())?;
        }
        render_html_text(doc, component, node, text, false)
    }
}

struct HtmlAnchorRenderer;

impl ComponentRenderer for HtmlAnchorRenderer {
    fn create_default_node(
        &self,
        doc: &mut Document,
        _component: &Component,
        template_node: NodeId,
        _options: &TemplateOptions,
    ) -> TemplateResult<Option<DefaultView>> {
        if let Some(view) = clone_if(doc, template_node, &[ElementKind::Anchor]) {
            return Ok(Some(view));
        }
        Ok(Some(DefaultView::same(doc.create_element("a"))))
    }

    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Anchor { href, target, text } = &component.kind else {
            return Err(wrong_component("anchor", component));
        };
        if ElementKind::of(doc, node) != Some(ElementKind::Anchor) {
            return Err(unsupported_node(doc, component, node));
        }
        doc.set_attribute(node, "href", href.as_str())?;
        if let Some(target) = target {
            doc.set_attribute(node, "target", target.as_str())?;
        }
        if let Some(text) = text {
            doc.set_text_in_node(node, text, false, false)?;
        }
        // After href: a disabled anchor loses it again
        render_html_common(doc, component, node)?;
        Ok(())
    }
}

/// Point an anchor, form or submit button at `action`.
fn render_action(
    doc: &mut Document,
    component: &Component,
    node: NodeId,
    action: &str,
) -> TemplateResult<()> {
    match ElementKind::of(doc, node) {
        Some(ElementKind::Anchor) => doc.set_attribute(node, "href", action)?,
        Some(ElementKind::Form) => doc.set_attribute(node, "action", action)?,
        Some(kind @ (ElementKind::Input | ElementKind::Button)) => {
            let current = doc
                .get_attribute(node, "type")
                .map(str::to_ascii_lowercase)
                .or_else(|| (kind == ElementKind::Button).then(|| "submit".to_string()));
            match current.as_deref() {
                Some("submit") => {}
                Some("button") => doc.set_attribute(node, "type", "submit")?,
                _ => return Err(unsupported_node(doc, component, node)),
            }
            doc.set_attribute(node, "formaction", action)?;
        }
        _ => return Err(unsupported_node(doc, component, node)),
    }
    Ok(())
}

struct HtmlActionRenderer;

impl ComponentRenderer for HtmlActionRenderer {
    fn create_default_node(
        &self,
        doc: &mut Document,
        _component: &Component,
        template_node: NodeId,
        _options: &TemplateOptions,
    ) -> TemplateResult<Option<DefaultView>> {
        let fits = [
            ElementKind::Anchor,
            ElementKind::Form,
            ElementKind::Input,
            ElementKind::Button,
        ];
        if let Some(view) = clone_if(doc, template_node, &fits) {
            return Ok(Some(view));
        }
        Ok(Some(DefaultView::same(doc.create_element("a"))))
    }

    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Action { action } = &component.kind else {
            return Err(wrong_component("action", component));
        };
        render_action(doc, component, node, action)?;
        render_html_common(doc, component, node)?;
        Ok(())
    }
}

struct HtmlInputRenderer;

impl ComponentRenderer for HtmlInputRenderer {
    fn create_default_node(
        &self,
        doc: &mut Document,
        _component: &Component,
        template_node: NodeId,
        _options: &TemplateOptions,
    ) -> TemplateResult<Option<DefaultView>> {
        let fits = [ElementKind::Input, ElementKind::TextArea];
        if let Some(view) = clone_if(doc, template_node, &fits) {
            return Ok(Some(view));
        }
        Ok(Some(DefaultView::same(doc.create_element("input"))))
    }

    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Input { input_type, value } = &component.kind else {
            return Err(wrong_component("input", component));
        };
        render_html_common(doc, component, node)?;
        match ElementKind::of(doc, node) {
            Some(ElementKind::Input) => {
                if let Some(input_type) = input_type {
                    doc.set_attribute(node, "type", input_type.as_str())?;
                }
                if let Some(value) = value {
                    doc.set_attribute(node, "value", value.as_str())?;
                }
            }
            Some(ElementKind::TextArea) => {
                doc.set_text_in_node(node, value.as_deref().unwrap_or_default(), false, false)?;
            }
            _ => return Err(unsupported_node(doc, component, node)),
        }
        Ok(())
    }
}

struct HtmlSelectRenderer;

impl ComponentRenderer for HtmlSelectRenderer {
    fn create_default_node(
        &self,
        doc: &mut Document,
        _component: &Component,
        template_node: NodeId,
        _options: &TemplateOptions,
    ) -> TemplateResult<Option<DefaultView>> {
        if let Some(view) = clone_if(doc, template_node, &[ElementKind::Select]) {
            return Ok(Some(view));
        }
        Ok(Some(DefaultView::same(doc.create_element("select"))))
    }

    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Select { options, selected } = &component.kind else {
            return Err(wrong_component("select", component));
        };
        if ElementKind::of(doc, node) != Some(ElementKind::Select) {
            return Err(unsupported_node(doc, component, node));
        }
        render_html_common(doc, component, node)?;

        if !options.is_empty() {
            doc.remove_all_children(node);
            for option in options {
                let el = doc.create_element("option");
                doc.set_attribute(el, "value", option.value.as_str())?;
                let text = doc.create_text(option.label.as_str());
                doc.append_child(el, text)?;
                doc.append_child(node, el)?;
            }
        }

        let option_nodes: Vec<NodeId> = doc
            .descendants(node)
            .into_iter()
            .filter(|&n| ElementKind::of(doc, n) == Some(ElementKind::Option))
            .collect();
        for option in option_nodes {
            let value = match doc.get_attribute(option, "value") {
                Some(value) => value.to_string(),
                None => doc.text_content(option).trim().to_string(),
            };
            if selected.contains(&value) {
                doc.set_attribute(option, "selected", "selected")?;
            } else {
                doc.remove_attribute(option, "selected")?;
            }
        }
        Ok(())
    }
}

struct HtmlScriptRenderer;

impl ComponentRenderer for HtmlScriptRenderer {
    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Script {
            attribute,
            script,
            mode,
        } = &component.kind
        else {
            return Err(wrong_component("script", component));
        };
        if !doc.is_element(node) {
            return Err(unsupported_node(doc, component, node));
        }
        render_html_common(doc, component, node)?;

        let mut command = script.trim_end().to_string();
        if !command.ends_with(';') {
            command.push_str("; ");
        }
        let merged = match (doc.get_attribute(node, attribute), mode) {
            // No handler yet: nothing to combine with
            (None, _) | (Some(_), ScriptMode::Replace) => command,
            (Some(current), ScriptMode::Append) => {
                let mut current = current.to_string();
                if !current.trim_end().ends_with(';') {
                    current.push_str("; ");
                }
                current + &command
            }
            (Some(current), ScriptMode::Prepend) => command + current,
        };
        doc.set_attribute(node, attribute, merged)?;
        Ok(())
    }
}

struct HtmlLinkRenderer;

impl ComponentRenderer for HtmlLinkRenderer {
    fn create_default_node(
        &self,
        doc: &mut Document,
        _component: &Component,
        template_node: NodeId,
        options: &TemplateOptions,
    ) -> TemplateResult<Option<DefaultView>> {
        let fits = [ElementKind::Anchor, ElementKind::Button, ElementKind::Input];
        if let Some(view) = clone_if(doc, template_node, &fits) {
            return Ok(Some(view));
        }

        let container = match ElementKind::of(doc, template_node) {
            Some(ElementKind::List) => doc.create_element("li"),
            Some(ElementKind::DefinitionList) => doc.create_element("dd"),
            Some(ElementKind::TableRow) => doc.create_element("td"),
            _ => {
                let copy = doc.clone_node(template_node, false);
                if doc.is_element(copy) {
                    strip_directive_tokens(doc, copy, &options.directive_attribute)?;
                    doc.remove_attribute(copy, &options.id_attribute)?;
                }
                copy
            }
        };
        let link = doc.create_element("a");
        add_child_to_parent(doc, container, link)?;
        Ok(Some(DefaultView {
            node: container,
            view: link,
        }))
    }

    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let ComponentKind::Link { href, text, target } = &component.kind else {
            return Err(wrong_component("link", component));
        };
        match ElementKind::of(doc, node) {
            Some(ElementKind::Anchor) => {
                doc.set_attribute(node, "href", href.as_str())?;
                if let Some(target) = target {
                    doc.set_attribute(node, "target", target.as_str())?;
                }
                if let Some(text) = text {
                    doc.set_text_in_node(node, text, false, false)?;
                }
            }
            Some(ElementKind::Button) => {
                render_action(doc, component, node, href)?;
                if let Some(text) = text {
                    doc.set_text_in_node(node, text, false, false)?;
                }
            }
            Some(ElementKind::Input) => {
                render_action(doc, component, node, href)?;
                if let Some(text) = text {
                    doc.set_attribute(node, "value", text.as_str())?;
                }
            }
            _ => return Err(unsupported_node(doc, component, node)),
        }
        render_html_common(doc, component, node)?;
        Ok(())
    }
}

/// Drop `Dir::` tokens from a copied node's directive attribute.
fn strip_directive_tokens(doc: &mut Document, node: NodeId, attribute: &str) -> DomResult<()> {
    let Some(value) = doc.get_attribute(node, attribute) else {
        return Ok(());
    };
    let kept: Vec<&str> = value
        .split_whitespace()
        .filter(|token| !token.starts_with(DIRECTIVE_PREFIX))
        .collect();
    if kept.is_empty() {
        doc.remove_attribute(node, attribute)?;
    } else {
        let kept = kept.join(" ");
        doc.set_attribute(node, attribute, kept)?;
    }
    Ok(())
}

/// Text for generic XML: element content or the text node itself.
struct XmlTextRenderer;

impl ComponentRenderer for XmlTextRenderer {
    fn render(&self, doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        let (text, raw) = match &component.kind {
            ComponentKind::Text { text, allow_markup } => (text, *allow_markup),
            ComponentKind::Label { text, .. } => (text, false),
            _ => return Err(wrong_component("xml text", component)),
        };
        if doc.is_element(node) {
            apply_attributes(doc, component, node)?;
            doc.set_text_in_node(node, text, raw, false)?;
        } else if doc.is_text(node) {
            doc.set_text(node, text.as_str())?;
        } else {
            return Err(unsupported_node(doc, component, node));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barracuda_dom::parse;
    use pretty_assertions::assert_eq;

    fn element(doc: &mut Document, tag: &str) -> NodeId {
        doc.create_element(tag)
    }

    fn render(doc: &mut Document, component: &Component, node: NodeId) -> TemplateResult<()> {
        renderer_for(OutputFormat::Html, &component.kind)?.render(doc, component, node)
    }

    #[test]
    fn test_element_kind() {
        assert_eq!(ElementKind::from_tag("TR"), ElementKind::TableRow);
        assert_eq!(ElementKind::from_tag("tbody"), ElementKind::TableSection);
        assert_eq!(ElementKind::from_tag("ol"), ElementKind::List);
        assert_eq!(ElementKind::from_tag("blink"), ElementKind::Other);
    }

    #[test]
    fn test_wrap_in_row_and_list() {
        let mut doc = Document::new();
        let tr = element(&mut doc, "tr");
        let span = element(&mut doc, "span");
        let added = add_child_to_parent(&mut doc, tr, span).unwrap();
        assert_eq!(doc.element_name(added), Some("td"));
        assert_eq!(doc.node_to_xml(tr), "<tr><td><span/></td></tr>");

        let ul = element(&mut doc, "UL");
        let li = element(&mut doc, "li");
        assert_eq!(add_child_to_parent(&mut doc, ul, li).unwrap(), li);
        let text = doc.create_text("loose");
        add_child_to_parent(&mut doc, ul, text).unwrap();
        assert_eq!(doc.node_to_xml(ul), "<UL><li/><li>loose</li></UL>");
    }

    #[test]
    fn test_whitespace_and_comments_not_wrapped() {
        let mut doc = Document::new();
        let table = element(&mut doc, "table");
        let ws = doc.create_text("\n  ");
        let comment = doc.create_comment(" rows ");
        add_child_to_parent(&mut doc, table, ws).unwrap();
        add_child_to_parent(&mut doc, table, comment).unwrap();
        assert_eq!(doc.node_to_xml(table), "<table>\n  <!-- rows --></table>");
    }

    #[test]
    fn test_select_and_definition_wrapping() {
        let mut doc = Document::new();
        let select = element(&mut doc, "select");
        let group = element(&mut doc, "optgroup");
        let text = doc.create_text("x");
        add_child_to_parent(&mut doc, select, group).unwrap();
        add_child_to_parent(&mut doc, select, text).unwrap();
        assert_eq!(
            doc.node_to_xml(select),
            "<select><optgroup/><option>x</option></select>"
        );

        let dl = element(&mut doc, "dl");
        let dt = element(&mut doc, "dt");
        let p = element(&mut doc, "p");
        add_child_to_parent(&mut doc, dl, dt).unwrap();
        add_child_to_parent(&mut doc, dl, p).unwrap();
        assert_eq!(doc.node_to_xml(dl), "<dl><dt/><dd><p/></dd></dl>");
    }

    #[test]
    fn test_col_rejects_children() {
        let mut doc = Document::new();
        let col = element(&mut doc, "col");
        let span = element(&mut doc, "span");
        assert!(add_child_to_parent(&mut doc, col, span).is_err());
    }

    #[test]
    fn test_colgroup_accepts_only_cols() {
        let mut doc = Document::new();
        let colgroup = element(&mut doc, "colgroup");
        let span = element(&mut doc, "span");
        let err = add_child_to_parent(&mut doc, colgroup, span).unwrap_err();
        assert!(err.to_string().contains("colgroup"), "{}", err);
        assert!(doc.parent(span).is_none());

        let col = element(&mut doc, "col");
        assert_eq!(add_child_to_parent(&mut doc, colgroup, col).unwrap(), col);
        assert_eq!(doc.node_to_xml(colgroup), "<colgroup><col/></colgroup>");
    }

    #[test]
    fn test_text_renderer_targets() {
        let mut doc = parse(r#"<p><input type="text"/><img src="x.png"/><b>old</b></p>"#).unwrap();
        let p = doc.document_element().unwrap();
        let [input, img, b] = [doc.children(p)[0], doc.children(p)[1], doc.children(p)[2]];

        let text = Component::text("Hi & bye");
        render(&mut doc, &text, input).unwrap();
        render(&mut doc, &text, img).unwrap();
        render(&mut doc, &text, b).unwrap();
        assert_eq!(
            doc.node_to_xml(p),
            r#"<p><input type="text" value="Hi &amp; bye"/><img src="x.png" alt="Hi &amp; bye"/><b>Hi &amp; bye</b></p>"#
        );
    }

    #[test]
    fn test_text_renderer_rejects_text_nodes() {
        let mut doc = Document::new();
        let text_node = doc.create_text("x");
        let err = render(&mut doc, &Component::text("y"), text_node).unwrap_err();
        assert!(matches!(err, TemplateError::NoSuitableRenderer { .. }));
    }

    #[test]
    fn test_common_attributes_and_disabled() {
        let mut doc = parse(r#"<input class="field" type="text"/>"#).unwrap();
        let input = doc.document_element().unwrap();
        let component = Component::input(None, Some("42"))
            .with_name("age")
            .with_enabled(false)
            .with_attribute("class", Some("wide"))
            .with_attribute("type", None);
        render(&mut doc, &component, input).unwrap();
        assert_eq!(
            doc.node_to_xml(input),
            r#"<input class="field wide" name="age" disabled="disabled" value="42"/>"#
        );
    }

    #[test]
    fn test_disabled_anchor_loses_href() {
        let mut doc = Document::new();
        let a = element(&mut doc, "a");
        let component = Component::anchor("/home", Some("Home"))
            .with_target("_top")
            .with_enabled(false);
        render(&mut doc, &component, a).unwrap();
        assert_eq!(doc.node_to_xml(a), "<a>Home</a>");
    }

    #[test]
    fn test_anchor_requires_anchor_node() {
        let mut doc = Document::new();
        let div = element(&mut doc, "div");
        let err = render(&mut doc, &Component::anchor("/x", None), div).unwrap_err();
        assert!(matches!(err, TemplateError::NoSuitableRenderer { .. }));
    }

    #[test]
    fn test_action_renderer() {
        let mut doc =
            parse(r#"<form><input type="button"/><input type="text"/><button/></form>"#).unwrap();
        let form = doc.document_element().unwrap();
        let [button_input, text_input, button] =
            [doc.children(form)[0], doc.children(form)[1], doc.children(form)[2]];
        let action = Component::action("/save");

        render(&mut doc, &action, form).unwrap();
        render(&mut doc, &action, button_input).unwrap();
        render(&mut doc, &action, button).unwrap();
        assert!(render(&mut doc, &action, text_input).is_err());

        assert_eq!(doc.get_attribute(form, "action"), Some("/save"));
        assert_eq!(doc.get_attribute(button_input, "type"), Some("submit"));
        assert_eq!(doc.get_attribute(button, "formaction"), Some("/save"));
    }

    #[test]
    fn test_select_renderer() {
        let mut doc = Document::new();
        let select = element(&mut doc, "select");
        let component = Component::select(
            vec![SelectOption::new("r", "Red"), SelectOption::new("g", "Green")],
            vec!["g".to_string()],
        );
        render(&mut doc, &component, select).unwrap();
        assert_eq!(
            doc.node_to_xml(select),
            r#"<select><option value="r">Red</option><option value="g" selected="selected">Green</option></select>"#
        );
    }

    #[test]
    fn test_script_modes() {
        let mut doc = parse(r#"<button onclick="track()"/>"#).unwrap();
        let button = doc.document_element().unwrap();

        let append = Component::script("onclick", "save()", ScriptMode::Append);
        render(&mut doc, &append, button).unwrap();
        assert_eq!(doc.get_attribute(button, "onclick"), Some("track(); save(); "));

        let prepend = Component::script("onclick", "check();", ScriptMode::Prepend);
        render(&mut doc, &prepend, button).unwrap();
        assert_eq!(
            doc.get_attribute(button, "onclick"),
            Some("check();track(); save(); ")
        );

        let fresh = Component::script("onload", "init()", ScriptMode::Append);
        render(&mut doc, &fresh, button).unwrap();
        assert_eq!(doc.get_attribute(button, "onload"), Some("init(); "));
    }

    #[test]
    fn test_link_default_node_in_list() {
        let mut doc = parse(r#"<ul class="menu Dir::Get_Data.Nav.home" id="nav"/>"#).unwrap();
        let ul = doc.document_element().unwrap();
        let link = Component::link("/", Some("Home"));
        let renderer = renderer_for(OutputFormat::Html, &link.kind).unwrap();
        let view = renderer
            .create_default_node(&mut doc, &link, ul, &TemplateOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(doc.element_name(view.node), Some("li"));
        renderer.render(&mut doc, &link, view.view).unwrap();
        assert_eq!(doc.node_to_xml(view.node), r#"<li><a href="/">Home</a></li>"#);
    }

    #[test]
    fn test_link_default_node_strips_directives() {
        let mut doc = parse(r#"<div class="nav Dir::Get_Data.Nav.home" id="nav"><b/></div>"#).unwrap();
        let div = doc.document_element().unwrap();
        let link = Component::link("/", None);
        let view = renderer_for(OutputFormat::Html, &link.kind)
            .unwrap()
            .create_default_node(&mut doc, &link, div, &TemplateOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(doc.node_to_xml(view.node), r#"<div class="nav"><a/></div>"#);
    }

    #[test]
    fn test_xml_renderers() {
        let mut doc = parse("<entry><title>old</title></entry>").unwrap();
        let entry = doc.document_element().unwrap();
        let title = doc.children(entry)[0];
        let text = Component::text("new");
        renderer_for(OutputFormat::Xml, &text.kind)
            .unwrap()
            .render(&mut doc, &text, title)
            .unwrap();
        assert_eq!(doc.node_to_xml(entry), "<entry><title>new</title></entry>");

        let err = renderer_for(OutputFormat::Xml, &Component::anchor("/", None).kind).err();
        assert!(matches!(err, Some(TemplateError::UnsupportedFormat { .. })));
    }
}
