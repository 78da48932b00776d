/*
 * model.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template models.
//!
//! A model is the data source a directive names. Plain models answer
//! [`TemplateModel::item`]; iterative models additionally walk a sequence of
//! records through [`IterativeModel`].
//!
//! Models are registered by name in a [`ModelRegistry`] and shared by
//! reference (`Rc<RefCell<..>>`): the iteration scope keys its bookkeeping on
//! the identity of the shared instance, so two registrations of equal data
//! are still two distinct models.

use crate::component::Component;
use crate::directive::Directive;
use crate::options::OutputFormat;
use barracuda_dom::{Document, NodeId};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// What a model hands back for a directive.
#[derive(Debug, Clone)]
pub enum Item {
    /// Plain value, rendered as escaped text.
    Text(String),
    /// A node of the output document (usually built through [`ViewContext`]).
    /// A node kept detached between renders must be pinned with
    /// [`Document::pin`] or it is reclaimed when a render ends.
    Node(NodeId),
    /// A node of another document, imported on use.
    Foreign { document: Rc<Document>, node: NodeId },
    /// A component that renders itself into a node.
    Component(Component),
    /// No value. `Get_Data` drops the node; attribute directives remove the
    /// attribute.
    Empty,
}

impl Item {
    pub fn text(value: impl Into<String>) -> Self {
        Item::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Item::Empty)
    }

    /// String form used by attribute directives. Nodes and components have
    /// none.
    pub fn as_attribute_value(&self) -> Option<&str> {
        match self {
            Item::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<String> for Item {
    fn from(value: String) -> Self {
        Item::Text(value)
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::Text(value.to_string())
    }
}

impl From<Component> for Item {
    fn from(value: Component) -> Self {
        Item::Component(value)
    }
}

/// What a model can see while producing an item.
pub struct ViewContext<'a> {
    /// The output document. Nodes returned as [`Item::Node`] must belong here.
    pub doc: &'a mut Document,
    /// The template node carrying the directive.
    pub template_node: NodeId,
    pub format: OutputFormat,
}

/// A named data source for directives.
pub trait TemplateModel {
    /// Name directives use to address the model.
    fn name(&self) -> &str;

    /// Veto hook. Returning `false` drops the node carrying the directive.
    fn process_directive(&mut self, _directive: &Directive) -> bool {
        true
    }

    /// The item for a `Get_Data`, `Set_Attr` or `Put_Attr` directive.
    fn item(&mut self, directive: &Directive, view: &mut ViewContext<'_>) -> Item;

    /// The iteration capability, if the model has one.
    fn as_iterative(&mut self) -> Option<&mut dyn IterativeModel> {
        None
    }
}

/// Sequence protocol of iterative models.
///
/// `pre_iterate` and `post_iterate` are called exactly once per loop over the
/// model, however many nodes of the loop body refer to it.
pub trait IterativeModel {
    fn pre_iterate(&mut self) {}

    fn has_next(&mut self) -> bool;

    /// Make the next record current.
    fn load_next(&mut self);

    fn post_iterate(&mut self) {}
}

/// A model shared between the registry and the iteration scope.
pub type SharedModel = Rc<RefCell<dyn TemplateModel>>;

/// Name -> model table of one template.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, SharedModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own name, replacing any previous model of
    /// that name. Returns the shared handle.
    pub fn register<M: TemplateModel + 'static>(&mut self, model: M) -> SharedModel {
        let shared: SharedModel = Rc::new(RefCell::new(model));
        self.register_shared(shared.clone());
        shared
    }

    pub fn register_shared(&mut self, model: SharedModel) {
        let name = model.borrow().name().to_string();
        self.models.insert(name, model);
    }

    pub fn get(&self, name: &str) -> Option<SharedModel> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<SharedModel> {
        self.models.remove(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

// ============================================================================
// Built-in models
// ============================================================================

/// Data held by the built-in models.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelValue {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<ModelValue>),
    Map(BTreeMap<String, ModelValue>),
}

impl ModelValue {
    /// Text form of a value. `Null` has none; lists join their elements
    /// with `", "`; maps have none.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ModelValue::Null | ModelValue::Map(_) => None,
            ModelValue::Bool(b) => Some(b.to_string()),
            ModelValue::Number(n) => Some(n.to_string()),
            ModelValue::String(s) => Some(s.clone()),
            ModelValue::List(items) => Some(
                items
                    .iter()
                    .filter_map(ModelValue::to_text)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }

    fn to_item(&self) -> Item {
        match self.to_text() {
            Some(text) => Item::Text(text),
            None => Item::Empty,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        match self {
            ModelValue::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<Value> for ModelValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ModelValue::Null,
            Value::Bool(b) => ModelValue::Bool(b),
            Value::Number(n) => ModelValue::Number(n),
            Value::String(s) => ModelValue::String(s),
            Value::Array(items) => ModelValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ModelValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for ModelValue {
    fn from(value: &str) -> Self {
        ModelValue::String(value.to_string())
    }
}

impl From<String> for ModelValue {
    fn from(value: String) -> Self {
        ModelValue::String(value)
    }
}

fn undefined(model: &str, key: Option<&str>) -> Item {
    Item::Text(format!("{}.{} Undefined", model, key.unwrap_or_default()))
}

/// Plain lookup of a directive's key in a map of values.
#[derive(Debug, Clone)]
pub struct MapModel {
    name: String,
    values: BTreeMap<String, ModelValue>,
}

impl MapModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<ModelValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ModelValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Build from a JSON object. Any other JSON value yields an empty model.
    pub fn from_json(name: impl Into<String>, value: Value) -> Self {
        let mut model = MapModel::new(name);
        if let ModelValue::Map(values) = ModelValue::from(value) {
            model.values = values;
        }
        model
    }
}

impl TemplateModel for MapModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn item(&mut self, directive: &Directive, _view: &mut ViewContext<'_>) -> Item {
        let key = directive.key_name();
        match key.and_then(|k| self.values.get(k)) {
            Some(value) => value.to_item(),
            None => undefined(&self.name, key),
        }
    }
}

/// Iterative model over a list of records.
///
/// Scalar records answer every key with themselves; map records look the
/// key up. The pseudo-keys `$index` (zero based) and `$count` expose the loop
/// position.
#[derive(Debug, Clone)]
pub struct ListModel {
    name: String,
    records: Vec<ModelValue>,
    current: Option<usize>,
}

impl ListModel {
    pub fn new(name: impl Into<String>, records: Vec<ModelValue>) -> Self {
        Self {
            name: name.into(),
            records,
            current: None,
        }
    }

    /// Build from a JSON array. Any other JSON value becomes a single record.
    pub fn from_json(name: impl Into<String>, value: Value) -> Self {
        let records = match ModelValue::from(value) {
            ModelValue::List(records) => records,
            ModelValue::Null => Vec::new(),
            other => vec![other],
        };
        ListModel::new(name, records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index of the current record.
    pub fn position(&self) -> Option<usize> {
        self.current
    }

    fn next_index(&self) -> usize {
        self.current.map_or(0, |i| i + 1)
    }
}

impl TemplateModel for ListModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn item(&mut self, directive: &Directive, _view: &mut ViewContext<'_>) -> Item {
        let key = directive.key_name();
        match key {
            Some("$count") => return Item::Text(self.records.len().to_string()),
            Some("$index") => {
                return match self.current {
                    Some(i) => Item::Text(i.to_string()),
                    None => undefined(&self.name, key),
                };
            }
            _ => {}
        }

        let Some(record) = self.current.and_then(|i| self.records.get(i)) else {
            return undefined(&self.name, key);
        };
        match record {
            ModelValue::Map(_) => match key.and_then(|k| record.get(k)) {
                Some(value) => value.to_item(),
                None => undefined(&self.name, key),
            },
            scalar => scalar.to_item(),
        }
    }

    fn as_iterative(&mut self) -> Option<&mut dyn IterativeModel> {
        Some(self)
    }
}

impl IterativeModel for ListModel {
    fn pre_iterate(&mut self) {
        self.current = None;
    }

    fn has_next(&mut self) -> bool {
        self.next_index() < self.records.len()
    }

    fn load_next(&mut self) {
        self.current = Some(self.next_index());
    }

    fn post_iterate(&mut self) {
        self.current = None;
    }
}
