//! Master-side keyed collection store

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::client::CollectionTransport;
use crate::command::{
    CollectionCommand, CollectionKind, CollectionReply, DictionaryCommand, ListCommand,
    QueueCommand, SetCommand, StackCommand,
};
use crate::error::{CollectionError, CollectionResult};
use crate::payload::Payload;

/// Backing store of one collection
#[derive(Debug)]
enum Store {
    Queue(VecDeque<Payload>),
    Stack(Vec<Payload>),
    /// Indexed by the canonical form of the key payload
    Dictionary(BTreeMap<String, (Payload, Payload)>),
    List(Vec<Payload>),
    /// Indexed by the canonical form of the element
    Set(BTreeMap<String, Payload>),
}

impl Store {
    fn new(kind: CollectionKind) -> Self {
        match kind {
            CollectionKind::Queue => Store::Queue(VecDeque::new()),
            CollectionKind::Stack => Store::Stack(Vec::new()),
            CollectionKind::Dictionary => Store::Dictionary(BTreeMap::new()),
            CollectionKind::List => Store::List(Vec::new()),
            CollectionKind::Set => Store::Set(BTreeMap::new()),
        }
    }
}

type SharedStore = Arc<Mutex<Store>>;

/// Keyed concurrent collections hosted by the master.
///
/// The registry lock is held only to look up or create a store; each
/// command then runs under that store's own lock.
#[derive(Debug, Default)]
pub struct CollectionService {
    stores: RwLock<HashMap<(CollectionKind, String), SharedStore>>,
}

impl CollectionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a command to the collection identified by `(command.kind(), key)`
    pub fn handle(&self, key: &str, command: CollectionCommand) -> CollectionResult<CollectionReply> {
        if key.is_empty() {
            return Err(CollectionError::InvalidKey(key.to_string()));
        }

        let kind = command.kind();
        let store = self.store_for(kind, key);
        let mut guard = store.lock();

        match (&mut *guard, command) {
            (Store::Queue(queue), CollectionCommand::Queue(cmd)) => Ok(apply_queue(queue, cmd)),
            (Store::Stack(stack), CollectionCommand::Stack(cmd)) => Ok(apply_stack(stack, cmd)),
            (Store::Dictionary(dict), CollectionCommand::Dictionary(cmd)) => apply_dictionary(dict, cmd),
            (Store::List(list), CollectionCommand::List(cmd)) => apply_list(list, cmd),
            (Store::Set(set), CollectionCommand::Set(cmd)) => Ok(apply_set(set, cmd)),
            // Stores are keyed by kind, so the variants always line up.
            (_, command) => Err(CollectionError::Remote(format!(
                "store for {} {:?} does not accept {} commands",
                kind,
                key,
                command.kind()
            ))),
        }
    }

    /// Number of live stores
    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }

    /// Drop a store entirely; returns whether it existed
    pub fn remove(&self, kind: CollectionKind, key: &str) -> bool {
        self.stores.write().remove(&(kind, key.to_string())).is_some()
    }

    fn store_for(&self, kind: CollectionKind, key: &str) -> SharedStore {
        let id = (kind, key.to_string());
        if let Some(store) = self.stores.read().get(&id) {
            return Arc::clone(store);
        }

        let mut stores = self.stores.write();
        Arc::clone(stores.entry(id).or_insert_with(|| {
            debug!(kind = %kind, key, "Creating distributed collection store");
            Arc::new(Mutex::new(Store::new(kind)))
        }))
    }
}

#[async_trait]
impl CollectionTransport for CollectionService {
    async fn call(&self, key: &str, command: CollectionCommand) -> CollectionResult<CollectionReply> {
        self.handle(key, command)
    }
}

fn apply_queue(queue: &mut VecDeque<Payload>, command: QueueCommand) -> CollectionReply {
    match command {
        QueueCommand::Enqueue { item } => {
            queue.push_back(item);
            CollectionReply::Done
        }
        QueueCommand::EnqueueRange { items } => {
            queue.extend(items);
            CollectionReply::Done
        }
        QueueCommand::TryDequeue => CollectionReply::Conditional(queue.pop_front()),
        QueueCommand::TryPeek => CollectionReply::Conditional(queue.front().cloned()),
        QueueCommand::Contains { item } => CollectionReply::Flag(queue.contains(&item)),
        QueueCommand::Clear => {
            queue.clear();
            CollectionReply::Done
        }
        QueueCommand::Count => CollectionReply::Count(queue.len()),
        QueueCommand::ToArray => CollectionReply::Items(queue.iter().cloned().collect()),
    }
}

fn apply_stack(stack: &mut Vec<Payload>, command: StackCommand) -> CollectionReply {
    match command {
        StackCommand::Push { item } => {
            stack.push(item);
            CollectionReply::Done
        }
        StackCommand::PushRange { items } => {
            stack.extend(items);
            CollectionReply::Done
        }
        StackCommand::TryPop => CollectionReply::Conditional(stack.pop()),
        StackCommand::TryPeek => CollectionReply::Conditional(stack.last().cloned()),
        StackCommand::Contains { item } => CollectionReply::Flag(stack.contains(&item)),
        StackCommand::Clear => {
            stack.clear();
            CollectionReply::Done
        }
        StackCommand::Count => CollectionReply::Count(stack.len()),
        // Top of the stack first
        StackCommand::ToArray => CollectionReply::Items(stack.iter().rev().cloned().collect()),
    }
}

fn apply_dictionary(
    dict: &mut BTreeMap<String, (Payload, Payload)>,
    command: DictionaryCommand,
) -> CollectionResult<CollectionReply> {
    let reply = match command {
        DictionaryCommand::Add { key, value } => {
            let index = key.canonical();
            if dict.contains_key(&index) {
                return Err(CollectionError::DuplicateKey(key.value.to_string()));
            }
            dict.insert(index, (key, value));
            CollectionReply::Done
        }
        DictionaryCommand::TryAdd { key, value } => {
            let index = key.canonical();
            if dict.contains_key(&index) {
                CollectionReply::Flag(false)
            } else {
                dict.insert(index, (key, value));
                CollectionReply::Flag(true)
            }
        }
        DictionaryCommand::Set { key, value } => {
            dict.insert(key.canonical(), (key, value));
            CollectionReply::Done
        }
        DictionaryCommand::TryUpdate { key, value } => match dict.get_mut(&key.canonical()) {
            Some(entry) => {
                entry.1 = value;
                CollectionReply::Flag(true)
            }
            None => CollectionReply::Flag(false),
        },
        DictionaryCommand::TryGetValue { key } => {
            CollectionReply::Conditional(dict.get(&key.canonical()).map(|(_, v)| v.clone()))
        }
        DictionaryCommand::TryRemove { key } => {
            CollectionReply::Conditional(dict.remove(&key.canonical()).map(|(_, v)| v))
        }
        DictionaryCommand::GetOrAdd { key, value } => {
            let entry = dict
                .entry(key.canonical())
                .or_insert_with(|| (key, value));
            CollectionReply::Value(entry.1.clone())
        }
        DictionaryCommand::ContainsKey { key } => {
            CollectionReply::Flag(dict.contains_key(&key.canonical()))
        }
        DictionaryCommand::ContainsValue { value } => {
            CollectionReply::Flag(dict.values().any(|(_, v)| *v == value))
        }
        DictionaryCommand::Clear => {
            dict.clear();
            CollectionReply::Done
        }
        DictionaryCommand::Count => CollectionReply::Count(dict.len()),
        DictionaryCommand::ToArray => CollectionReply::Entries(dict.values().cloned().collect()),
    };
    Ok(reply)
}

fn check_index(len: usize, index: usize) -> CollectionResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(CollectionError::IndexOutOfRange { index, len })
    }
}

fn check_range(len: usize, index: usize, count: usize) -> CollectionResult<()> {
    match index.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(CollectionError::IndexOutOfRange { index, len }),
    }
}

/// Numbers, strings and booleans sort by value; anything else, including
/// mixed kinds, by canonical form
fn compare_payloads(a: &Payload, b: &Payload) -> Ordering {
    match (&a.value, &b.value) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&y.as_f64().unwrap_or_default()),
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        _ => a.canonical().cmp(&b.canonical()),
    }
}

fn apply_list(list: &mut Vec<Payload>, command: ListCommand) -> CollectionResult<CollectionReply> {
    let len = list.len();
    let reply = match command {
        ListCommand::Add { item } => {
            list.push(item);
            CollectionReply::Done
        }
        ListCommand::AddRange { items } => {
            list.extend(items);
            CollectionReply::Done
        }
        ListCommand::Insert { index, item } => {
            if index > len {
                return Err(CollectionError::IndexOutOfRange { index, len });
            }
            list.insert(index, item);
            CollectionReply::Done
        }
        ListCommand::InsertRange { index, items } => {
            if index > len {
                return Err(CollectionError::IndexOutOfRange { index, len });
            }
            list.splice(index..index, items);
            CollectionReply::Done
        }
        ListCommand::GetValue { index } => {
            check_index(len, index)?;
            CollectionReply::Value(list[index].clone())
        }
        ListCommand::SetValue { index, item } => {
            check_index(len, index)?;
            list[index] = item;
            CollectionReply::Done
        }
        ListCommand::GetRange { index, count } => {
            check_range(len, index, count)?;
            CollectionReply::Items(list[index..index + count].to_vec())
        }
        ListCommand::IndexOf { item, start, count } => {
            let count = count.unwrap_or(len.saturating_sub(start));
            check_range(len, start, count)?;
            let found = list[start..start + count].iter().position(|x| *x == item);
            CollectionReply::Index(found.map(|pos| pos + start))
        }
        ListCommand::LastIndexOf { item, start, count } => {
            if len == 0 {
                return Ok(CollectionReply::Index(None));
            }
            let start = start.unwrap_or(len - 1);
            check_index(len, start)?;
            let count = count.unwrap_or(start + 1);
            if count > start + 1 {
                return Err(CollectionError::IndexOutOfRange { index: start, len });
            }
            let low = start + 1 - count;
            let found = list[low..=start].iter().rposition(|x| *x == item);
            CollectionReply::Index(found.map(|pos| pos + low))
        }
        ListCommand::Remove { item } => match list.iter().position(|x| *x == item) {
            Some(pos) => {
                list.remove(pos);
                CollectionReply::Flag(true)
            }
            None => CollectionReply::Flag(false),
        },
        ListCommand::RemoveAt { index } => {
            check_index(len, index)?;
            list.remove(index);
            CollectionReply::Done
        }
        ListCommand::RemoveRange { index, count } => {
            check_range(len, index, count)?;
            list.drain(index..index + count);
            CollectionReply::Done
        }
        ListCommand::Reverse => {
            list.reverse();
            CollectionReply::Done
        }
        ListCommand::ReverseRange { index, count } => {
            check_range(len, index, count)?;
            list[index..index + count].reverse();
            CollectionReply::Done
        }
        ListCommand::Sort => {
            list.sort_by(compare_payloads);
            CollectionReply::Done
        }
        ListCommand::Contains { item } => CollectionReply::Flag(list.contains(&item)),
        ListCommand::Clear => {
            list.clear();
            CollectionReply::Done
        }
        ListCommand::Count => CollectionReply::Count(len),
        ListCommand::ToArray => CollectionReply::Items(list.clone()),
    };
    Ok(reply)
}

fn canonical_keys(items: &[Payload]) -> BTreeSet<String> {
    items.iter().map(Payload::canonical).collect()
}

fn apply_set(set: &mut BTreeMap<String, Payload>, command: SetCommand) -> CollectionReply {
    match command {
        SetCommand::Add { item } => {
            let index = item.canonical();
            if set.contains_key(&index) {
                CollectionReply::Flag(false)
            } else {
                set.insert(index, item);
                CollectionReply::Flag(true)
            }
        }
        SetCommand::AddRange { items } | SetCommand::UnionWith { other: items } => {
            for item in items {
                set.entry(item.canonical()).or_insert(item);
            }
            CollectionReply::Done
        }
        SetCommand::Remove { item } => CollectionReply::Flag(set.remove(&item.canonical()).is_some()),
        SetCommand::TryGetValue { item } => {
            CollectionReply::Conditional(set.get(&item.canonical()).cloned())
        }
        SetCommand::IntersectWith { other } => {
            let keep = canonical_keys(&other);
            set.retain(|index, _| keep.contains(index));
            CollectionReply::Done
        }
        SetCommand::ExceptWith { other } => {
            for item in &other {
                set.remove(&item.canonical());
            }
            CollectionReply::Done
        }
        SetCommand::SymmetricExceptWith { other } => {
            let other: BTreeMap<String, Payload> = other
                .into_iter()
                .map(|item| (item.canonical(), item))
                .collect();
            for (index, item) in other {
                if set.remove(&index).is_none() {
                    set.insert(index, item);
                }
            }
            CollectionReply::Done
        }
        SetCommand::IsSubsetOf { other } => {
            let other = canonical_keys(&other);
            CollectionReply::Flag(set.keys().all(|index| other.contains(index)))
        }
        SetCommand::IsSupersetOf { other } => {
            let other = canonical_keys(&other);
            CollectionReply::Flag(other.iter().all(|index| set.contains_key(index)))
        }
        SetCommand::IsProperSubsetOf { other } => {
            let other = canonical_keys(&other);
            CollectionReply::Flag(
                other.len() > set.len() && set.keys().all(|index| other.contains(index)),
            )
        }
        SetCommand::IsProperSupersetOf { other } => {
            let other = canonical_keys(&other);
            CollectionReply::Flag(
                set.len() > other.len() && other.iter().all(|index| set.contains_key(index)),
            )
        }
        SetCommand::Overlaps { other } => {
            CollectionReply::Flag(other.iter().any(|item| set.contains_key(&item.canonical())))
        }
        SetCommand::SetEquals { other } => {
            let other = canonical_keys(&other);
            CollectionReply::Flag(
                other.len() == set.len() && other.iter().all(|index| set.contains_key(index)),
            )
        }
        SetCommand::Contains { item } => CollectionReply::Flag(set.contains_key(&item.canonical())),
        SetCommand::Clear => {
            set.clear();
            CollectionReply::Done
        }
        SetCommand::Count => CollectionReply::Count(set.len()),
        SetCommand::ToArray => CollectionReply::Items(set.values().cloned().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: i32) -> Payload {
        Payload::encode(&n).unwrap()
    }

    #[test]
    fn test_queue_fifo_order() {
        let service = CollectionService::new();
        for n in [2, 3, 4] {
            service
                .handle("k", CollectionCommand::Queue(QueueCommand::Enqueue { item: item(n) }))
                .unwrap();
        }

        let count = service
            .handle("k", CollectionCommand::Queue(QueueCommand::Count))
            .unwrap()
            .into_count()
            .unwrap();
        assert_eq!(count, 3);

        let items = service
            .handle("k", CollectionCommand::Queue(QueueCommand::ToArray))
            .unwrap()
            .into_items()
            .unwrap();
        assert_eq!(items, vec![item(2), item(3), item(4)]);
    }

    #[test]
    fn test_empty_try_ops_are_not_errors() {
        let service = CollectionService::new();
        let reply = service
            .handle("empty", CollectionCommand::Queue(QueueCommand::TryDequeue))
            .unwrap();
        assert_eq!(reply, CollectionReply::Conditional(None));

        let reply = service
            .handle("empty", CollectionCommand::Stack(StackCommand::TryPop))
            .unwrap();
        assert_eq!(reply, CollectionReply::Conditional(None));
    }

    #[test]
    fn test_kinds_do_not_alias() {
        let service = CollectionService::new();
        service
            .handle("shared", CollectionCommand::Queue(QueueCommand::Enqueue { item: item(1) }))
            .unwrap();

        let count = service
            .handle("shared", CollectionCommand::Stack(StackCommand::Count))
            .unwrap()
            .into_count()
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(service.len(), 2);
    }

    #[test]
    fn test_stack_push_range_and_order() {
        let service = CollectionService::new();
        service
            .handle(
                "s",
                CollectionCommand::Stack(StackCommand::PushRange {
                    items: vec![item(1), item(2), item(3)],
                }),
            )
            .unwrap();

        let top = service
            .handle("s", CollectionCommand::Stack(StackCommand::TryPeek))
            .unwrap()
            .into_conditional()
            .unwrap();
        assert_eq!(top, Some(item(3)));

        let items = service
            .handle("s", CollectionCommand::Stack(StackCommand::ToArray))
            .unwrap()
            .into_items()
            .unwrap();
        assert_eq!(items, vec![item(3), item(2), item(1)]);

        let contains = service
            .handle("s", CollectionCommand::Stack(StackCommand::Contains { item: item(2) }))
            .unwrap()
            .into_flag()
            .unwrap();
        assert!(contains);
    }

    #[test]
    fn test_dictionary_duplicate_add_rejected() {
        let service = CollectionService::new();
        let key = Payload::encode(&"foo".to_string()).unwrap();
        let add = || {
            CollectionCommand::Dictionary(DictionaryCommand::Add {
                key: key.clone(),
                value: item(100),
            })
        };

        service.handle("d", add()).unwrap();
        let err = service.handle("d", add()).unwrap_err();
        assert!(matches!(err, CollectionError::DuplicateKey(_)));

        let value = service
            .handle(
                "d",
                CollectionCommand::Dictionary(DictionaryCommand::TryGetValue { key: key.clone() }),
            )
            .unwrap()
            .into_conditional()
            .unwrap();
        assert_eq!(value, Some(item(100)));
    }

    #[test]
    fn test_empty_key_rejected() {
        let service = CollectionService::new();
        let err = service
            .handle("", CollectionCommand::Queue(QueueCommand::Count))
            .unwrap_err();
        assert_eq!(err, CollectionError::InvalidKey(String::new()));
        assert!(service.is_empty());
    }

    #[test]
    fn test_remove_store() {
        let service = CollectionService::new();
        service
            .handle("k", CollectionCommand::Queue(QueueCommand::Count))
            .unwrap();
        assert!(service.remove(CollectionKind::Queue, "k"));
        assert!(!service.remove(CollectionKind::Queue, "k"));
    }

    #[test]
    fn test_concurrent_pushes_are_linearized() {
        let service = Arc::new(CollectionService::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    for n in 0..250 {
                        service
                            .handle(
                                "hot",
                                CollectionCommand::Stack(StackCommand::Push {
                                    item: item(t * 1000 + n),
                                }),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let count = service
            .handle("hot", CollectionCommand::Stack(StackCommand::Count))
            .unwrap()
            .into_count()
            .unwrap();
        assert_eq!(count, 1000);
    }

    fn list(service: &CollectionService, command: ListCommand) -> CollectionResult<CollectionReply> {
        service.handle("l", CollectionCommand::List(command))
    }

    fn set(service: &CollectionService, command: SetCommand) -> CollectionReply {
        service.handle("s", CollectionCommand::Set(command)).unwrap()
    }

    fn items(values: &[i32]) -> Vec<Payload> {
        values.iter().map(|&n| item(n)).collect()
    }

    #[test]
    fn test_list_indexed_operations() {
        let service = CollectionService::new();
        list(&service, ListCommand::AddRange { items: items(&[5, 1, 4, 1]) }).unwrap();
        list(&service, ListCommand::Insert { index: 1, item: item(9) }).unwrap();
        // [5, 9, 1, 4, 1]

        let value = list(&service, ListCommand::GetValue { index: 1 }).unwrap().into_value().unwrap();
        assert_eq!(value, item(9));

        let first = list(
            &service,
            ListCommand::IndexOf { item: item(1), start: 0, count: None },
        )
        .unwrap()
        .into_index()
        .unwrap();
        let last = list(
            &service,
            ListCommand::LastIndexOf { item: item(1), start: None, count: None },
        )
        .unwrap()
        .into_index()
        .unwrap();
        assert_eq!((first, last), (Some(2), Some(4)));

        let before = list(
            &service,
            ListCommand::LastIndexOf { item: item(1), start: Some(3), count: Some(1) },
        )
        .unwrap()
        .into_index()
        .unwrap();
        assert_eq!(before, None);

        list(&service, ListCommand::RemoveRange { index: 0, count: 2 }).unwrap();
        list(&service, ListCommand::SetValue { index: 0, item: item(7) }).unwrap();
        let range = list(&service, ListCommand::GetRange { index: 0, count: 3 })
            .unwrap()
            .into_items()
            .unwrap();
        assert_eq!(range, items(&[7, 4, 1]));

        let removed = list(&service, ListCommand::Remove { item: item(4) }).unwrap().into_flag().unwrap();
        assert!(removed);
        assert_eq!(
            list(&service, ListCommand::Count).unwrap().into_count().unwrap(),
            2
        );
    }

    #[test]
    fn test_list_out_of_range_is_an_error() {
        let service = CollectionService::new();
        list(&service, ListCommand::AddRange { items: items(&[1, 2]) }).unwrap();

        let err = list(&service, ListCommand::GetValue { index: 2 }).unwrap_err();
        assert_eq!(err, CollectionError::IndexOutOfRange { index: 2, len: 2 });
        assert!(list(&service, ListCommand::RemoveRange { index: 1, count: 2 }).is_err());
        assert!(list(&service, ListCommand::Insert { index: 3, item: item(0) }).is_err());

        // Appending at the end is allowed
        list(&service, ListCommand::Insert { index: 2, item: item(3) }).unwrap();
    }

    #[test]
    fn test_list_reverse_and_sort() {
        let service = CollectionService::new();
        list(&service, ListCommand::AddRange { items: items(&[3, 10, 2, 1]) }).unwrap();

        list(&service, ListCommand::ReverseRange { index: 1, count: 2 }).unwrap();
        let reversed = list(&service, ListCommand::ToArray).unwrap().into_items().unwrap();
        assert_eq!(reversed, items(&[3, 2, 10, 1]));

        // Numeric order, not text order
        list(&service, ListCommand::Sort).unwrap();
        let sorted = list(&service, ListCommand::ToArray).unwrap().into_items().unwrap();
        assert_eq!(sorted, items(&[1, 2, 3, 10]));
    }

    #[test]
    fn test_set_membership_and_algebra() {
        let service = CollectionService::new();
        assert_eq!(set(&service, SetCommand::Add { item: item(1) }), CollectionReply::Flag(true));
        assert_eq!(set(&service, SetCommand::Add { item: item(1) }), CollectionReply::Flag(false));
        set(&service, SetCommand::UnionWith { other: items(&[2, 3]) });
        // {1, 2, 3}

        let flag = |command| set(&service, command).into_flag().unwrap();
        assert!(flag(SetCommand::IsSubsetOf { other: items(&[1, 2, 3, 4]) }));
        assert!(flag(SetCommand::IsProperSubsetOf { other: items(&[1, 2, 3, 4]) }));
        assert!(!flag(SetCommand::IsProperSubsetOf { other: items(&[3, 2, 1]) }));
        assert!(flag(SetCommand::SetEquals { other: items(&[3, 2, 1, 1]) }));
        assert!(flag(SetCommand::IsProperSupersetOf { other: items(&[1]) }));
        assert!(flag(SetCommand::Overlaps { other: items(&[9, 3]) }));

        set(&service, SetCommand::SymmetricExceptWith { other: items(&[3, 4]) });
        // {1, 2, 4}
        set(&service, SetCommand::IntersectWith { other: items(&[1, 4, 8]) });
        // {1, 4}
        set(&service, SetCommand::ExceptWith { other: items(&[1]) });

        let remaining = set(&service, SetCommand::ToArray).into_items().unwrap();
        assert_eq!(remaining, items(&[4]));
        assert_eq!(
            set(&service, SetCommand::TryGetValue { item: item(4) }),
            CollectionReply::Conditional(Some(item(4)))
        );
        assert_eq!(set(&service, SetCommand::Remove { item: item(4) }), CollectionReply::Flag(true));
        assert_eq!(set(&service, SetCommand::Count), CollectionReply::Count(0));
    }

    #[test]
    fn test_set_elements_keep_their_type() {
        let service = CollectionService::new();
        set(&service, SetCommand::Add { item: item(1) });
        let text = Payload::encode(&"1".to_string()).unwrap();
        assert_eq!(set(&service, SetCommand::Add { item: text }), CollectionReply::Flag(true));
        assert_eq!(set(&service, SetCommand::Count), CollectionReply::Count(2));
    }
}
