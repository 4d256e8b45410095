//! Distributed collections for Stampede
//!
//! The master hosts one [`CollectionService`] holding a keyed store per
//! `(kind, key)` pair. Workers reach it through a [`CollectionTransport`] and
//! use the typed handles [`DistributedQueue`], [`DistributedStack`],
//! [`DistributedDictionary`], [`DistributedList`] and [`DistributedSet`]. Every operation runs under the lock of its own
//! key only; operations on different keys never contend.

pub mod client;
pub mod command;
pub mod error;
pub mod payload;
pub mod service;

pub use client::{
    CollectionTransport, DistributedDictionary, DistributedList, DistributedQueue, DistributedSet,
    DistributedStack,
};
pub use command::{
    CollectionCommand, CollectionKind, CollectionReply, DictionaryCommand, ListCommand,
    QueueCommand, SetCommand, StackCommand,
};
pub use error::{CollectionError, CollectionResult};
pub use payload::{ConditionalValue, Payload};
pub use service::CollectionService;
