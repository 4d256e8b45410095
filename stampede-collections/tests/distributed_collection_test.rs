use std::sync::Arc;

use stampede_collections::{
    CollectionError, CollectionService, CollectionTransport, DistributedDictionary,
    DistributedList, DistributedQueue, DistributedSet, DistributedStack,
};

fn transport() -> Arc<dyn CollectionTransport> {
    Arc::new(CollectionService::new())
}

#[tokio::test]
async fn test_queue_round_trip() {
    let queue = DistributedQueue::<i32>::new("k", transport());

    queue.enqueue(&2).await.unwrap();
    queue.enqueue(&3).await.unwrap();
    queue.enqueue(&4).await.unwrap();

    assert_eq!(queue.to_array().await.unwrap(), vec![2, 3, 4]);
    assert_eq!(queue.count().await.unwrap(), 3);

    let head = queue.try_peek().await.unwrap();
    assert_eq!(head.value(), Some(&2));

    let first = queue.try_dequeue().await.unwrap();
    assert_eq!(first.into_option(), Some(2));
    assert_eq!(queue.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_try_dequeue_on_empty_queue() {
    let queue = DistributedQueue::<i32>::new("empty", transport());

    let (found, value) = queue.try_dequeue().await.unwrap().into_parts();
    assert!(!found);
    assert_eq!(value, 0);
}

#[tokio::test]
async fn test_queue_range_and_clear() {
    let queue = DistributedQueue::<String>::new("names", transport());
    queue
        .enqueue_range(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();

    assert!(queue.contains(&"b".to_string()).await.unwrap());
    queue.clear().await.unwrap();
    assert_eq!(queue.count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stack_pushes_lose_nothing() {
    let transport = transport();
    let mut tasks = Vec::new();

    for worker in 0..8 {
        let stack = DistributedStack::<u32>::new("contended", Arc::clone(&transport));
        tasks.push(tokio::spawn(async move {
            for n in 0..50 {
                stack.push(&(worker * 100 + n)).await.unwrap();
            }
        }));
    }
    futures::future::join_all(tasks).await;

    let stack = DistributedStack::<u32>::new("contended", transport);
    assert_eq!(stack.count().await.unwrap(), 400);
}

#[tokio::test]
async fn test_stack_semantics() {
    let stack = DistributedStack::<i32>::new("s", transport());
    stack.push_range(&[1, 2, 3]).await.unwrap();

    assert_eq!(stack.to_array().await.unwrap(), vec![3, 2, 1]);
    assert!(stack.contains(&2).await.unwrap());
    assert_eq!(stack.try_pop().await.unwrap().into_option(), Some(3));
    assert_eq!(stack.try_peek().await.unwrap().into_option(), Some(2));

    stack.clear().await.unwrap();
    assert!(!stack.try_pop().await.unwrap().has_value());
}

#[tokio::test]
async fn test_dictionary_add_and_get() {
    let dict = DistributedDictionary::<String, i32>::new("d", transport());
    dict.add(&"foo".to_string(), &100).await.unwrap();

    let value = dict.try_get_value(&"foo".to_string()).await.unwrap();
    assert!(value.has_value());
    assert_eq!(value.value(), Some(&100));

    let missing = dict.try_get_value(&"bar".to_string()).await.unwrap();
    assert!(!missing.has_value());

    let err = dict.add(&"foo".to_string(), &1).await.unwrap_err();
    assert!(matches!(err, CollectionError::DuplicateKey(_)));
}

#[tokio::test]
async fn test_dictionary_extended_operations() {
    let dict = DistributedDictionary::<String, i32>::new("scores", transport());
    let alice = "alice".to_string();

    assert!(dict.try_add(&alice, &1).await.unwrap());
    assert!(!dict.try_add(&alice, &2).await.unwrap());
    assert_eq!(dict.get_or_add(&alice, &9).await.unwrap(), 1);
    assert!(dict.try_update(&alice, &5).await.unwrap());
    assert!(dict.contains_value(&5).await.unwrap());
    assert!(dict.contains_key(&alice).await.unwrap());

    dict.set(&"bob".to_string(), &7).await.unwrap();
    let mut entries = dict.to_array().await.unwrap();
    entries.sort();
    assert_eq!(entries, vec![(alice.clone(), 5), ("bob".to_string(), 7)]);

    assert_eq!(dict.try_remove(&alice).await.unwrap().into_option(), Some(5));
    assert_eq!(dict.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_mismatched_element_type_is_a_caller_error() {
    let transport = transport();
    let producer = DistributedQueue::<i32>::new("typed", Arc::clone(&transport));
    let consumer = DistributedQueue::<String>::new("typed", transport);

    producer.enqueue(&7).await.unwrap();
    let err = consumer.try_dequeue().await.unwrap_err();
    assert!(matches!(err, CollectionError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_list_operations() {
    let list = DistributedList::<String>::new("hosts", transport());
    let names = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();

    list.add_range(&names(&["b", "c"])).await.unwrap();
    list.insert(0, &"a".to_string()).await.unwrap();
    list.insert_range(3, &names(&["d", "a"])).await.unwrap();
    assert_eq!(list.to_array().await.unwrap(), names(&["a", "b", "c", "d", "a"]));

    let a = "a".to_string();
    assert_eq!(list.index_of(&a).await.unwrap(), Some(0));
    assert_eq!(list.last_index_of(&a).await.unwrap(), Some(4));
    assert_eq!(list.index_of_in(&a, 1, Some(3)).await.unwrap(), None);
    assert_eq!(list.get(2).await.unwrap(), "c");

    list.set(2, &"z".to_string()).await.unwrap();
    list.remove_at(4).await.unwrap();
    list.sort().await.unwrap();
    assert_eq!(list.get_range(1, 2).await.unwrap(), names(&["b", "d"]));

    list.reverse().await.unwrap();
    assert_eq!(list.to_array().await.unwrap(), names(&["z", "d", "b", "a"]));
    assert!(list.remove(&"d".to_string()).await.unwrap());
    assert!(!list.contains(&"d".to_string()).await.unwrap());
    assert_eq!(list.count().await.unwrap(), 3);

    let err = list.get(3).await.unwrap_err();
    assert_eq!(err, CollectionError::IndexOutOfRange { index: 3, len: 3 });
}

#[tokio::test]
async fn test_set_operations() {
    let set = DistributedSet::<u32>::new("seen", transport());

    assert!(set.add(&1).await.unwrap());
    assert!(!set.add(&1).await.unwrap());
    set.add_range(&[2, 3, 4]).await.unwrap();

    assert!(set.is_superset_of(&[1, 2]).await.unwrap());
    assert!(set.is_proper_superset_of(&[1, 2]).await.unwrap());
    assert!(!set.is_subset_of(&[1, 2]).await.unwrap());
    assert!(set.overlaps(&[4, 5]).await.unwrap());
    assert!(!set.set_equals(&[1, 2, 3]).await.unwrap());

    set.except_with(&[4]).await.unwrap();
    set.intersect_with(&[1, 2, 3, 9]).await.unwrap();
    assert!(set.set_equals(&[3, 2, 1]).await.unwrap());

    set.symmetric_except_with(&[3, 5]).await.unwrap();
    let mut items = set.to_array().await.unwrap();
    items.sort();
    assert_eq!(items, vec![1, 2, 5]);

    assert_eq!(set.try_get_value(&5).await.unwrap().into_option(), Some(5));
    assert!(!set.try_get_value(&3).await.unwrap().has_value());
    assert!(set.remove(&5).await.unwrap());
    set.union_with(&[7]).await.unwrap();
    assert!(set.is_proper_subset_of(&[1, 2, 7, 8]).await.unwrap());
    assert_eq!(set.count().await.unwrap(), 3);

    set.clear().await.unwrap();
    assert_eq!(set.count().await.unwrap(), 0);
}
