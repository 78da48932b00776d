/*
 * directive.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template directives.
//!
//! A directive is a token of the form
//!
//! ```text
//! Dir::<command>.<model>.<key>.<data>
//! ```
//!
//! where every part after the command is optional and the data part runs to
//! the end of the token (it may contain dots). The separator between the
//! command and the model may also be a colon, so `Dir::Get_Data:Items.name`
//! and `Dir::Get_Data.Items.name` are the same directive.
//!
//! Examples:
//!
//! - `Dir::Get_Data.UserData.FirstName`
//! - `Dir::Set_Attr.UserData.HomePage.href`
//! - `Dir::Iterate_Start.UserData`
//! - `Dir::Discard`
//! - `Dir::Custom_Directive.UserData..do=something`

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Prefix every directive token starts with.
pub const DIRECTIVE_PREFIX: &str = "Dir::";

/// What a directive asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Replace the node with data from the model.
    GetData,
    /// Append a model value to an attribute.
    SetAttr,
    /// Overwrite an attribute with a model value.
    PutAttr,
    /// Drop the node.
    Discard,
    IterateStart,
    IterateNext,
    IterateEnd,
    BlockIterate,
    BlockIterateStart,
    BlockIterateEnd,
    /// Application command, only seen by the model.
    Custom(String),
}

impl Command {
    pub fn from_name(name: &str) -> Command {
        match name {
            "Get_Data" => Command::GetData,
            "Set_Attr" => Command::SetAttr,
            "Put_Attr" => Command::PutAttr,
            "Discard" => Command::Discard,
            "Iterate_Start" => Command::IterateStart,
            "Iterate_Next" => Command::IterateNext,
            "Iterate_End" => Command::IterateEnd,
            "Block_Iterate" => Command::BlockIterate,
            "Block_Iterate_Start" => Command::BlockIterateStart,
            "Block_Iterate_End" => Command::BlockIterateEnd,
            other => Command::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::GetData => "Get_Data",
            Command::SetAttr => "Set_Attr",
            Command::PutAttr => "Put_Attr",
            Command::Discard => "Discard",
            Command::IterateStart => "Iterate_Start",
            Command::IterateNext => "Iterate_Next",
            Command::IterateEnd => "Iterate_End",
            Command::BlockIterate => "Block_Iterate",
            Command::BlockIterateStart => "Block_Iterate_Start",
            Command::BlockIterateEnd => "Block_Iterate_End",
            Command::Custom(name) => name,
        }
    }

    pub fn is_block_iterate(&self) -> bool {
        matches!(
            self,
            Command::BlockIterate | Command::BlockIterateStart | Command::BlockIterateEnd
        )
    }

    /// Commands that ask the model for a value.
    pub fn reads_data(&self) -> bool {
        matches!(self, Command::GetData | Command::SetAttr | Command::PutAttr)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed directive: command, model name, key name and key data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Directive {
    command: Command,
    model_name: Option<String>,
    key_name: Option<String>,
    key_data: Option<String>,
}

impl Directive {
    pub fn new(
        command: Command,
        model_name: Option<&str>,
        key_name: Option<&str>,
        key_data: Option<&str>,
    ) -> Self {
        Self {
            command,
            model_name: model_name.map(str::to_string),
            key_name: key_name.map(str::to_string),
            key_data: key_data.map(str::to_string),
        }
    }

    /// Parse one directive token. Returns `None` when the token is not a
    /// directive (missing `Dir::` prefix or empty command).
    pub fn parse(token: &str) -> Option<Directive> {
        let body = token.strip_prefix(DIRECTIVE_PREFIX)?;

        // The command ends at the first '.' or ':'
        let (command, rest) = match body.find(['.', ':']) {
            Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
            None => (body, None),
        };
        if command.is_empty() {
            return None;
        }

        let mut model_name = None;
        let mut key_name = None;
        let mut key_data = None;
        if let Some(rest) = rest {
            let mut parts = rest.splitn(3, '.');
            model_name = parts.next().filter(|s| !s.is_empty());
            key_name = parts.next().filter(|s| !s.is_empty());
            key_data = parts.next().filter(|s| !s.is_empty());
        }

        Some(Directive::new(
            Command::from_name(command),
            model_name,
            key_name,
            key_data,
        ))
    }

    /// Parse a whitespace-separated list of tokens, dropping the ones that
    /// are not directives.
    pub fn parse_all(source: &str) -> Vec<Directive> {
        source.split_whitespace().filter_map(Directive::parse).collect()
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    pub fn key_data(&self) -> Option<&str> {
        self.key_data.as_deref()
    }

    /// Loose comparison: parts that are absent on either side match anything.
    pub fn matches(&self, other: &Directive) -> bool {
        fn part(a: Option<&str>, b: Option<&str>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
        self.command == other.command
            && part(self.model_name(), other.model_name())
            && part(self.key_name(), other.key_name())
            && part(self.key_data(), other.key_data())
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", DIRECTIVE_PREFIX, self.command)?;
        if let Some(model) = &self.model_name {
            write!(f, ".{}", model)?;
            if let Some(key) = &self.key_name {
                write!(f, ".{}", key)?;
                if let Some(data) = &self.key_data {
                    write!(f, ".{}", data)?;
                }
            }
        }
        Ok(())
    }
}

/// Cache of token -> directive lookups for one view.
///
/// Tokens that are not directives are cached too, so ordinary class names
/// are only inspected once.
#[derive(Debug, Default)]
pub struct DirectiveCatalog {
    cache: HashMap<String, Option<Directive>>,
}

impl DirectiveCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, token: &str) -> Option<Directive> {
        if let Some(cached) = self.cache.get(token) {
            return cached.clone();
        }
        let parsed = Directive::parse(token);
        self.cache.insert(token.to_string(), parsed.clone());
        parsed
    }

    /// Number of distinct tokens seen so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[derive(Debug, Clone)]
enum IdEntry {
    Source(String),
    Parsed(Vec<Directive>),
}

/// Cross reference from element ids to directive lists.
///
/// Lets directives live outside the markup: an element whose id is in the
/// map gets the mapped directives. Entries given as strings are parsed on
/// first lookup.
#[derive(Debug, Clone, Default)]
pub struct DirectiveIdMap {
    entries: RefCell<HashMap<String, IdEntry>>,
}

impl DirectiveIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `id` to a whitespace-separated directive string.
    pub fn insert_str(&mut self, id: impl Into<String>, directives: impl Into<String>) -> &mut Self {
        self.entries
            .get_mut()
            .insert(id.into(), IdEntry::Source(directives.into()));
        self
    }

    /// Map `id` to ready directives.
    pub fn insert(&mut self, id: impl Into<String>, directives: Vec<Directive>) -> &mut Self {
        self.entries
            .get_mut()
            .insert(id.into(), IdEntry::Parsed(directives));
        self
    }

    /// Directives for `id`; empty when the id is not mapped.
    pub fn lookup(&self, id: &str) -> Vec<Directive> {
        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.get_mut(id) else {
            return Vec::new();
        };
        let parsed = match entry {
            IdEntry::Parsed(directives) => return directives.clone(),
            IdEntry::Source(source) => Directive::parse_all(source),
        };
        *entry = IdEntry::Parsed(parsed.clone());
        parsed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
