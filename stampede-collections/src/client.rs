//! Typed client handles over a collection transport

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::command::{
    CollectionCommand, CollectionReply, DictionaryCommand, ListCommand, QueueCommand, SetCommand,
    StackCommand,
};
use crate::error::CollectionResult;
use crate::payload::{ConditionalValue, Payload};

/// Carries one collection command to the service and returns its reply.
///
/// The key travels alongside the command as request metadata.
#[async_trait]
pub trait CollectionTransport: Send + Sync {
    async fn call(&self, key: &str, command: CollectionCommand) -> CollectionResult<CollectionReply>;
}

fn decode_all<T: DeserializeOwned>(items: Vec<Payload>) -> CollectionResult<Vec<T>> {
    items.iter().map(Payload::decode).collect()
}

fn encode_all<T: Serialize>(items: &[T]) -> CollectionResult<Vec<Payload>> {
    items.iter().map(Payload::encode).collect()
}

fn decode_conditional<T: DeserializeOwned>(
    value: Option<Payload>,
) -> CollectionResult<ConditionalValue<T>> {
    match value {
        Some(payload) => Ok(ConditionalValue::some(payload.decode()?)),
        None => Ok(ConditionalValue::none()),
    }
}

/// Shared FIFO queue
pub struct DistributedQueue<T> {
    key: String,
    transport: Arc<dyn CollectionTransport>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DistributedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            transport: Arc::clone(&self.transport),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> DistributedQueue<T> {
    pub fn new(key: impl Into<String>, transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            key: key.into(),
            transport,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn call(&self, command: QueueCommand) -> CollectionResult<CollectionReply> {
        self.transport
            .call(&self.key, CollectionCommand::Queue(command))
            .await
    }

    pub async fn enqueue(&self, item: &T) -> CollectionResult<()> {
        let item = Payload::encode(item)?;
        self.call(QueueCommand::Enqueue { item }).await?.into_done()
    }

    pub async fn enqueue_range(&self, items: &[T]) -> CollectionResult<()> {
        let items = encode_all(items)?;
        self.call(QueueCommand::EnqueueRange { items }).await?.into_done()
    }

    pub async fn try_dequeue(&self) -> CollectionResult<ConditionalValue<T>> {
        decode_conditional(self.call(QueueCommand::TryDequeue).await?.into_conditional()?)
    }

    pub async fn try_peek(&self) -> CollectionResult<ConditionalValue<T>> {
        decode_conditional(self.call(QueueCommand::TryPeek).await?.into_conditional()?)
    }

    pub async fn contains(&self, item: &T) -> CollectionResult<bool> {
        let item = Payload::encode(item)?;
        self.call(QueueCommand::Contains { item }).await?.into_flag()
    }

    pub async fn clear(&self) -> CollectionResult<()> {
        self.call(QueueCommand::Clear).await?.into_done()
    }

    pub async fn count(&self) -> CollectionResult<usize> {
        self.call(QueueCommand::Count).await?.into_count()
    }

    /// Snapshot in dequeue order
    pub async fn to_array(&self) -> CollectionResult<Vec<T>> {
        decode_all(self.call(QueueCommand::ToArray).await?.into_items()?)
    }
}

/// Shared LIFO stack
pub struct DistributedStack<T> {
    key: String,
    transport: Arc<dyn CollectionTransport>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DistributedStack<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            transport: Arc::clone(&self.transport),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> DistributedStack<T> {
    pub fn new(key: impl Into<String>, transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            key: key.into(),
            transport,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn call(&self, command: StackCommand) -> CollectionResult<CollectionReply> {
        self.transport
            .call(&self.key, CollectionCommand::Stack(command))
            .await
    }

    pub async fn push(&self, item: &T) -> CollectionResult<()> {
        let item = Payload::encode(item)?;
        self.call(StackCommand::Push { item }).await?.into_done()
    }

    /// Push in order; the last item ends on top
    pub async fn push_range(&self, items: &[T]) -> CollectionResult<()> {
        let items = encode_all(items)?;
        self.call(StackCommand::PushRange { items }).await?.into_done()
    }

    pub async fn try_pop(&self) -> CollectionResult<ConditionalValue<T>> {
        decode_conditional(self.call(StackCommand::TryPop).await?.into_conditional()?)
    }

    pub async fn try_peek(&self) -> CollectionResult<ConditionalValue<T>> {
        decode_conditional(self.call(StackCommand::TryPeek).await?.into_conditional()?)
    }

    pub async fn contains(&self, item: &T) -> CollectionResult<bool> {
        let item = Payload::encode(item)?;
        self.call(StackCommand::Contains { item }).await?.into_flag()
    }

    pub async fn clear(&self) -> CollectionResult<()> {
        self.call(StackCommand::Clear).await?.into_done()
    }

    pub async fn count(&self) -> CollectionResult<usize> {
        self.call(StackCommand::Count).await?.into_count()
    }

    /// Snapshot in pop order
    pub async fn to_array(&self) -> CollectionResult<Vec<T>> {
        decode_all(self.call(StackCommand::ToArray).await?.into_items()?)
    }
}

/// Shared key/value dictionary
pub struct DistributedDictionary<K, V> {
    key: String,
    transport: Arc<dyn CollectionTransport>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for DistributedDictionary<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            transport: Arc::clone(&self.transport),
            _marker: PhantomData,
        }
    }
}

impl<K, V> DistributedDictionary<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub fn new(key: impl Into<String>, transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            key: key.into(),
            transport,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn call(&self, command: DictionaryCommand) -> CollectionResult<CollectionReply> {
        self.transport
            .call(&self.key, CollectionCommand::Dictionary(command))
            .await
    }

    /// Insert a new entry; fails with `DuplicateKey` when the key exists
    pub async fn add(&self, key: &K, value: &V) -> CollectionResult<()> {
        let command = DictionaryCommand::Add {
            key: Payload::encode(key)?,
            value: Payload::encode(value)?,
        };
        self.call(command).await?.into_done()
    }

    pub async fn try_add(&self, key: &K, value: &V) -> CollectionResult<bool> {
        let command = DictionaryCommand::TryAdd {
            key: Payload::encode(key)?,
            value: Payload::encode(value)?,
        };
        self.call(command).await?.into_flag()
    }

    /// Insert or overwrite
    pub async fn set(&self, key: &K, value: &V) -> CollectionResult<()> {
        let command = DictionaryCommand::Set {
            key: Payload::encode(key)?,
            value: Payload::encode(value)?,
        };
        self.call(command).await?.into_done()
    }

    pub async fn try_update(&self, key: &K, value: &V) -> CollectionResult<bool> {
        let command = DictionaryCommand::TryUpdate {
            key: Payload::encode(key)?,
            value: Payload::encode(value)?,
        };
        self.call(command).await?.into_flag()
    }

    pub async fn try_get_value(&self, key: &K) -> CollectionResult<ConditionalValue<V>> {
        let command = DictionaryCommand::TryGetValue {
            key: Payload::encode(key)?,
        };
        decode_conditional(self.call(command).await?.into_conditional()?)
    }

    pub async fn try_remove(&self, key: &K) -> CollectionResult<ConditionalValue<V>> {
        let command = DictionaryCommand::TryRemove {
            key: Payload::encode(key)?,
        };
        decode_conditional(self.call(command).await?.into_conditional()?)
    }

    /// Return the existing value, or insert `value` and return it
    pub async fn get_or_add(&self, key: &K, value: &V) -> CollectionResult<V> {
        let command = DictionaryCommand::GetOrAdd {
            key: Payload::encode(key)?,
            value: Payload::encode(value)?,
        };
        self.call(command).await?.into_value()?.decode()
    }

    pub async fn contains_key(&self, key: &K) -> CollectionResult<bool> {
        let command = DictionaryCommand::ContainsKey {
            key: Payload::encode(key)?,
        };
        self.call(command).await?.into_flag()
    }

    pub async fn contains_value(&self, value: &V) -> CollectionResult<bool> {
        let command = DictionaryCommand::ContainsValue {
            value: Payload::encode(value)?,
        };
        self.call(command).await?.into_flag()
    }

    pub async fn clear(&self) -> CollectionResult<()> {
        self.call(DictionaryCommand::Clear).await?.into_done()
    }

    pub async fn count(&self) -> CollectionResult<usize> {
        self.call(DictionaryCommand::Count).await?.into_count()
    }

    pub async fn to_array(&self) -> CollectionResult<Vec<(K, V)>> {
        self.call(DictionaryCommand::ToArray)
            .await?
            .into_entries()?
            .iter()
            .map(|(k, v)| Ok((k.decode()?, v.decode()?)))
            .collect()
    }
}

/// Shared indexed list
pub struct DistributedList<T> {
    key: String,
    transport: Arc<dyn CollectionTransport>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DistributedList<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            transport: Arc::clone(&self.transport),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> DistributedList<T> {
    pub fn new(key: impl Into<String>, transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            key: key.into(),
            transport,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn call(&self, command: ListCommand) -> CollectionResult<CollectionReply> {
        self.transport
            .call(&self.key, CollectionCommand::List(command))
            .await
    }

    pub async fn add(&self, item: &T) -> CollectionResult<()> {
        let item = Payload::encode(item)?;
        self.call(ListCommand::Add { item }).await?.into_done()
    }

    pub async fn add_range(&self, items: &[T]) -> CollectionResult<()> {
        let items = encode_all(items)?;
        self.call(ListCommand::AddRange { items }).await?.into_done()
    }

    pub async fn insert(&self, index: usize, item: &T) -> CollectionResult<()> {
        let item = Payload::encode(item)?;
        self.call(ListCommand::Insert { index, item }).await?.into_done()
    }

    pub async fn insert_range(&self, index: usize, items: &[T]) -> CollectionResult<()> {
        let items = encode_all(items)?;
        self.call(ListCommand::InsertRange { index, items })
            .await?
            .into_done()
    }

    /// Fails with `IndexOutOfRange` past the end
    pub async fn get(&self, index: usize) -> CollectionResult<T> {
        self.call(ListCommand::GetValue { index })
            .await?
            .into_value()?
            .decode()
    }

    pub async fn set(&self, index: usize, item: &T) -> CollectionResult<()> {
        let item = Payload::encode(item)?;
        self.call(ListCommand::SetValue { index, item })
            .await?
            .into_done()
    }

    pub async fn get_range(&self, index: usize, count: usize) -> CollectionResult<Vec<T>> {
        decode_all(
            self.call(ListCommand::GetRange { index, count })
                .await?
                .into_items()?,
        )
    }

    pub async fn index_of(&self, item: &T) -> CollectionResult<Option<usize>> {
        self.index_of_in(item, 0, None).await
    }

    /// First match among `count` elements from `start`, or to the end
    pub async fn index_of_in(
        &self,
        item: &T,
        start: usize,
        count: Option<usize>,
    ) -> CollectionResult<Option<usize>> {
        let item = Payload::encode(item)?;
        self.call(ListCommand::IndexOf { item, start, count })
            .await?
            .into_index()
    }

    pub async fn last_index_of(&self, item: &T) -> CollectionResult<Option<usize>> {
        self.last_index_of_in(item, None, None).await
    }

    /// Last match searching backwards from `start` over `count` elements
    pub async fn last_index_of_in(
        &self,
        item: &T,
        start: Option<usize>,
        count: Option<usize>,
    ) -> CollectionResult<Option<usize>> {
        let item = Payload::encode(item)?;
        self.call(ListCommand::LastIndexOf { item, start, count })
            .await?
            .into_index()
    }

    /// Remove the first occurrence; `false` when absent
    pub async fn remove(&self, item: &T) -> CollectionResult<bool> {
        let item = Payload::encode(item)?;
        self.call(ListCommand::Remove { item }).await?.into_flag()
    }

    pub async fn remove_at(&self, index: usize) -> CollectionResult<()> {
        self.call(ListCommand::RemoveAt { index }).await?.into_done()
    }

    pub async fn remove_range(&self, index: usize, count: usize) -> CollectionResult<()> {
        self.call(ListCommand::RemoveRange { index, count })
            .await?
            .into_done()
    }

    pub async fn reverse(&self) -> CollectionResult<()> {
        self.call(ListCommand::Reverse).await?.into_done()
    }

    pub async fn reverse_range(&self, index: usize, count: usize) -> CollectionResult<()> {
        self.call(ListCommand::ReverseRange { index, count })
            .await?
            .into_done()
    }

    pub async fn sort(&self) -> CollectionResult<()> {
        self.call(ListCommand::Sort).await?.into_done()
    }

    pub async fn contains(&self, item: &T) -> CollectionResult<bool> {
        let item = Payload::encode(item)?;
        self.call(ListCommand::Contains { item }).await?.into_flag()
    }

    pub async fn clear(&self) -> CollectionResult<()> {
        self.call(ListCommand::Clear).await?.into_done()
    }

    pub async fn count(&self) -> CollectionResult<usize> {
        self.call(ListCommand::Count).await?.into_count()
    }

    pub async fn to_array(&self) -> CollectionResult<Vec<T>> {
        decode_all(self.call(ListCommand::ToArray).await?.into_items()?)
    }
}

/// Shared unordered set
pub struct DistributedSet<T> {
    key: String,
    transport: Arc<dyn CollectionTransport>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DistributedSet<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            transport: Arc::clone(&self.transport),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> DistributedSet<T> {
    pub fn new(key: impl Into<String>, transport: Arc<dyn CollectionTransport>) -> Self {
        Self {
            key: key.into(),
            transport,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn call(&self, command: SetCommand) -> CollectionResult<CollectionReply> {
        self.transport
            .call(&self.key, CollectionCommand::Set(command))
            .await
    }

    async fn flag_with(
        &self,
        other: &[T],
        command: fn(Vec<Payload>) -> SetCommand,
    ) -> CollectionResult<bool> {
        self.call(command(encode_all(other)?)).await?.into_flag()
    }

    async fn done_with(
        &self,
        other: &[T],
        command: fn(Vec<Payload>) -> SetCommand,
    ) -> CollectionResult<()> {
        self.call(command(encode_all(other)?)).await?.into_done()
    }

    /// `false` when the item was already present
    pub async fn add(&self, item: &T) -> CollectionResult<bool> {
        let item = Payload::encode(item)?;
        self.call(SetCommand::Add { item }).await?.into_flag()
    }

    pub async fn add_range(&self, items: &[T]) -> CollectionResult<()> {
        self.done_with(items, |items| SetCommand::AddRange { items })
            .await
    }

    pub async fn remove(&self, item: &T) -> CollectionResult<bool> {
        let item = Payload::encode(item)?;
        self.call(SetCommand::Remove { item }).await?.into_flag()
    }

    /// The stored element equal to `item`
    pub async fn try_get_value(&self, item: &T) -> CollectionResult<ConditionalValue<T>> {
        let item = Payload::encode(item)?;
        decode_conditional(
            self.call(SetCommand::TryGetValue { item })
                .await?
                .into_conditional()?,
        )
    }

    pub async fn union_with(&self, other: &[T]) -> CollectionResult<()> {
        self.done_with(other, |other| SetCommand::UnionWith { other })
            .await
    }

    pub async fn intersect_with(&self, other: &[T]) -> CollectionResult<()> {
        self.done_with(other, |other| SetCommand::IntersectWith { other })
            .await
    }

    pub async fn except_with(&self, other: &[T]) -> CollectionResult<()> {
        self.done_with(other, |other| SetCommand::ExceptWith { other })
            .await
    }

    pub async fn symmetric_except_with(&self, other: &[T]) -> CollectionResult<()> {
        self.done_with(other, |other| SetCommand::SymmetricExceptWith { other })
            .await
    }

    pub async fn is_subset_of(&self, other: &[T]) -> CollectionResult<bool> {
        self.flag_with(other, |other| SetCommand::IsSubsetOf { other })
            .await
    }

    pub async fn is_superset_of(&self, other: &[T]) -> CollectionResult<bool> {
        self.flag_with(other, |other| SetCommand::IsSupersetOf { other })
            .await
    }

    pub async fn is_proper_subset_of(&self, other: &[T]) -> CollectionResult<bool> {
        self.flag_with(other, |other| SetCommand::IsProperSubsetOf { other })
            .await
    }

    pub async fn is_proper_superset_of(&self, other: &[T]) -> CollectionResult<bool> {
        self.flag_with(other, |other| SetCommand::IsProperSupersetOf { other })
            .await
    }

    pub async fn overlaps(&self, other: &[T]) -> CollectionResult<bool> {
        self.flag_with(other, |other| SetCommand::Overlaps { other })
            .await
    }

    pub async fn set_equals(&self, other: &[T]) -> CollectionResult<bool> {
        self.flag_with(other, |other| SetCommand::SetEquals { other })
            .await
    }

    pub async fn contains(&self, item: &T) -> CollectionResult<bool> {
        let item = Payload::encode(item)?;
        self.call(SetCommand::Contains { item }).await?.into_flag()
    }

    pub async fn clear(&self) -> CollectionResult<()> {
        self.call(SetCommand::Clear).await?.into_done()
    }

    pub async fn count(&self) -> CollectionResult<usize> {
        self.call(SetCommand::Count).await?.into_count()
    }

    pub async fn to_array(&self) -> CollectionResult<Vec<T>> {
        decode_all(self.call(SetCommand::ToArray).await?.into_items()?)
    }
}
