//! Collection commands and replies exchanged with the master

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CollectionError, CollectionResult};
use crate::payload::Payload;

/// Kind of backing collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Queue,
    Stack,
    Dictionary,
    List,
    Set,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Queue => "queue",
            CollectionKind::Stack => "stack",
            CollectionKind::Dictionary => "dictionary",
            CollectionKind::List => "list",
            CollectionKind::Set => "set",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// FIFO queue operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueueCommand {
    Enqueue { item: Payload },
    EnqueueRange { items: Vec<Payload> },
    TryDequeue,
    TryPeek,
    Contains { item: Payload },
    Clear,
    Count,
    ToArray,
}

/// LIFO stack operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StackCommand {
    Push { item: Payload },
    PushRange { items: Vec<Payload> },
    TryPop,
    TryPeek,
    Contains { item: Payload },
    Clear,
    Count,
    ToArray,
}

/// Key/value dictionary operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DictionaryCommand {
    Add { key: Payload, value: Payload },
    TryAdd { key: Payload, value: Payload },
    Set { key: Payload, value: Payload },
    TryUpdate { key: Payload, value: Payload },
    TryGetValue { key: Payload },
    TryRemove { key: Payload },
    GetOrAdd { key: Payload, value: Payload },
    ContainsKey { key: Payload },
    ContainsValue { value: Payload },
    Clear,
    Count,
    ToArray,
}

/// Indexed list operations. Positions are zero-based; a range is
/// `count` elements starting at `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ListCommand {
    Add { item: Payload },
    AddRange { items: Vec<Payload> },
    Insert { index: usize, item: Payload },
    InsertRange { index: usize, items: Vec<Payload> },
    GetValue { index: usize },
    SetValue { index: usize, item: Payload },
    GetRange { index: usize, count: usize },
    /// First match in `[start, start + count)`; `count` defaults to the rest
    IndexOf {
        item: Payload,
        start: usize,
        count: Option<usize>,
    },
    /// Last match searching backwards from `start` over `count` elements;
    /// both default to the whole list
    LastIndexOf {
        item: Payload,
        start: Option<usize>,
        count: Option<usize>,
    },
    Remove { item: Payload },
    RemoveAt { index: usize },
    RemoveRange { index: usize, count: usize },
    Reverse,
    ReverseRange { index: usize, count: usize },
    Sort,
    Contains { item: Payload },
    Clear,
    Count,
    ToArray,
}

/// Unordered set operations; elements are compared by type tag and value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SetCommand {
    Add { item: Payload },
    AddRange { items: Vec<Payload> },
    Remove { item: Payload },
    TryGetValue { item: Payload },
    UnionWith { other: Vec<Payload> },
    IntersectWith { other: Vec<Payload> },
    ExceptWith { other: Vec<Payload> },
    SymmetricExceptWith { other: Vec<Payload> },
    IsSubsetOf { other: Vec<Payload> },
    IsSupersetOf { other: Vec<Payload> },
    IsProperSubsetOf { other: Vec<Payload> },
    IsProperSupersetOf { other: Vec<Payload> },
    Overlaps { other: Vec<Payload> },
    SetEquals { other: Vec<Payload> },
    Contains { item: Payload },
    Clear,
    Count,
    ToArray,
}

/// A command addressed to one collection kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "command", rename_all = "snake_case")]
pub enum CollectionCommand {
    Queue(QueueCommand),
    Stack(StackCommand),
    Dictionary(DictionaryCommand),
    List(ListCommand),
    Set(SetCommand),
}

impl CollectionCommand {
    pub fn kind(&self) -> CollectionKind {
        match self {
            CollectionCommand::Queue(_) => CollectionKind::Queue,
            CollectionCommand::Stack(_) => CollectionKind::Stack,
            CollectionCommand::Dictionary(_) => CollectionKind::Dictionary,
            CollectionCommand::List(_) => CollectionKind::List,
            CollectionCommand::Set(_) => CollectionKind::Set,
        }
    }
}

/// Result of a collection command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "value", rename_all = "snake_case")]
pub enum CollectionReply {
    Done,
    Count(usize),
    Flag(bool),
    /// Position of a list search; `None` when not found
    Index(Option<usize>),
    Conditional(Option<Payload>),
    Value(Payload),
    Items(Vec<Payload>),
    Entries(Vec<(Payload, Payload)>),
}

impl CollectionReply {
    fn name(&self) -> &'static str {
        match self {
            CollectionReply::Done => "done",
            CollectionReply::Count(_) => "count",
            CollectionReply::Flag(_) => "flag",
            CollectionReply::Index(_) => "index",
            CollectionReply::Conditional(_) => "conditional",
            CollectionReply::Value(_) => "value",
            CollectionReply::Items(_) => "items",
            CollectionReply::Entries(_) => "entries",
        }
    }

    fn unexpected(&self, expected: &'static str) -> CollectionError {
        CollectionError::UnexpectedReply {
            expected: expected.to_string(),
            actual: self.name().to_string(),
        }
    }

    pub fn into_done(self) -> CollectionResult<()> {
        match self {
            CollectionReply::Done => Ok(()),
            other => Err(other.unexpected("done")),
        }
    }

    pub fn into_count(self) -> CollectionResult<usize> {
        match self {
            CollectionReply::Count(n) => Ok(n),
            other => Err(other.unexpected("count")),
        }
    }

    pub fn into_flag(self) -> CollectionResult<bool> {
        match self {
            CollectionReply::Flag(flag) => Ok(flag),
            other => Err(other.unexpected("flag")),
        }
    }

    pub fn into_index(self) -> CollectionResult<Option<usize>> {
        match self {
            CollectionReply::Index(index) => Ok(index),
            other => Err(other.unexpected("index")),
        }
    }

    pub fn into_conditional(self) -> CollectionResult<Option<Payload>> {
        match self {
            CollectionReply::Conditional(value) => Ok(value),
            other => Err(other.unexpected("conditional")),
        }
    }

    pub fn into_value(self) -> CollectionResult<Payload> {
        match self {
            CollectionReply::Value(value) => Ok(value),
            other => Err(other.unexpected("value")),
        }
    }

    pub fn into_items(self) -> CollectionResult<Vec<Payload>> {
        match self {
            CollectionReply::Items(items) => Ok(items),
            other => Err(other.unexpected("items")),
        }
    }

    pub fn into_entries(self) -> CollectionResult<Vec<(Payload, Payload)>> {
        match self {
            CollectionReply::Entries(entries) => Ok(entries),
            other => Err(other.unexpected("entries")),
        }
    }
}
