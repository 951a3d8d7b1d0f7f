//! CRUD, search and bulk behaviour of the item store.

use std::time::Duration;

use itemlab::{ItemPatch, ItemStore, NewItem, SearchFilter, StoreError};

fn sample_items() -> Vec<NewItem> {
    vec![
        NewItem::new("Red pen", 1.5).with_tags(["office", "red"]),
        NewItem::new("Desk lamp", 24.0)
            .with_description("Warm light for late nights")
            .with_tags(["home"]),
        NewItem::new("Notebook", 4.0).with_tags(["office"]).out_of_stock(),
        NewItem::new("Standing desk", 320.0).with_tags(["office", "furniture"]),
    ]
}

async fn seeded_store() -> ItemStore {
    let store = ItemStore::in_memory();
    for item in sample_items() {
        store.create(item).await.expect("seed item should be valid");
    }
    store
}

#[tokio::test]
async fn create_then_get_returns_the_input_plus_assigned_fields() {
    let store = ItemStore::in_memory();
    let input = NewItem::new("Mug", 7.25)
        .with_description("Holds coffee")
        .with_tags(["kitchen", "ceramic"]);

    let created = store.create(input.clone()).await.unwrap();
    let fetched = store.get(&created.id).await.unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.name, input.name);
    assert_eq!(fetched.description, input.description);
    assert_eq!(fetched.price, input.price);
    assert_eq!(fetched.in_stock, input.in_stock);
    assert_eq!(fetched.tags, input.tags);
}

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let store = ItemStore::in_memory();
    assert_eq!(
        store.get("missing").await,
        Err(StoreError::NotFound("missing".into()))
    );
}

#[tokio::test]
async fn delete_twice_fails_the_second_time() {
    let store = seeded_store().await;
    let id = store.list(0, Some(1)).await[0].id.clone();

    let removed = store.delete(&id).await.unwrap();
    assert_eq!(removed.id, id);
    assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound(_))));
    assert!(matches!(store.delete("nope").await, Err(StoreError::NotFound(_))));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn update_preserves_untouched_fields_and_advances_updated_at() {
    let store = ItemStore::in_memory();
    let created = store
        .create(NewItem::new("Chair", 45.0).with_tags(["furniture"]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let patch = ItemPatch {
        price: Some(39.99),
        in_stock: Some(false),
        ..ItemPatch::default()
    };
    let updated = store.update(&created.id, patch).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, created.name);
    assert_eq!(updated.tags, created.tags);
    assert_eq!(updated.price, 39.99);
    assert!(!updated.in_stock);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(store.get(&created.id).await.unwrap(), updated);
}

#[tokio::test]
async fn update_rejects_invalid_patch_without_changes() {
    let store = seeded_store().await;
    let before = store.list(0, Some(1)).await.remove(0);

    let patch = ItemPatch {
        price: Some(-3.0),
        name: Some("Renamed".into()),
        ..ItemPatch::default()
    };
    assert!(matches!(
        store.update(&before.id, patch).await,
        Err(StoreError::Validation(_))
    ));
    assert_eq!(store.get(&before.id).await.unwrap(), before);

    assert!(matches!(
        store.update("ghost", ItemPatch::default()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn search_without_filters_returns_everything_in_insertion_order() {
    let store = seeded_store().await;
    let all = store.search(&SearchFilter::default()).await.unwrap();
    let names: Vec<_> = all.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Red pen", "Desk lamp", "Notebook", "Standing desk"]);
}

#[tokio::test]
async fn search_by_price_range_returns_exactly_the_inclusive_subset() {
    let store = seeded_store().await;
    let filter = SearchFilter {
        min_price: Some(4.0),
        max_price: Some(24.0),
        ..SearchFilter::default()
    };
    let hits = store.search(&filter).await.unwrap();
    let names: Vec<_> = hits.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Desk lamp", "Notebook"]);
    assert!(hits.iter().all(|i| (4.0..=24.0).contains(&i.price)));
}

#[tokio::test]
async fn search_combines_predicates() {
    let store = seeded_store().await;

    let office_in_stock = SearchFilter {
        tags: vec!["office".into()],
        in_stock: Some(true),
        ..SearchFilter::default()
    };
    let names: Vec<_> = store
        .search(&office_in_stock)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, ["Red pen", "Standing desk"]);

    let by_description = SearchFilter {
        query: Some("LIGHT".into()),
        ..SearchFilter::default()
    };
    assert_eq!(store.search(&by_description).await.unwrap().len(), 1);

    let nothing = SearchFilter {
        query: Some("submarine".into()),
        ..SearchFilter::default()
    };
    assert!(store.search(&nothing).await.unwrap().is_empty());
}

#[tokio::test]
async fn bulk_create_is_all_or_nothing() {
    let store = ItemStore::in_memory();
    let mut batch = sample_items();
    batch.insert(2, NewItem::new("", 1.0));

    let err = store.bulk_create(batch).await.unwrap_err();
    match err {
        StoreError::Validation(msg) => assert!(msg.contains("entry 2"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.is_empty());

    let created = store.bulk_create(sample_items()).await.unwrap();
    assert_eq!(created.len(), 4);
    assert_eq!(store.list(0, None).await, created);
}

#[tokio::test]
async fn bulk_update_reports_missing_ids_separately() {
    let store = seeded_store().await;
    let ids: Vec<String> = store.list(0, None).await.into_iter().map(|i| i.id).collect();

    let outcome = store
        .bulk_update(vec![
            (ids[0].clone(), ItemPatch { price: Some(2.0), ..ItemPatch::default() }),
            ("missing-1".into(), ItemPatch { price: Some(9.0), ..ItemPatch::default() }),
            (ids[3].clone(), ItemPatch { in_stock: Some(false), ..ItemPatch::default() }),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.succeeded.len(), 2);
    assert_eq!(outcome.failed_ids().collect::<Vec<_>>(), ["missing-1"]);
    assert_eq!(store.get(&ids[0]).await.unwrap().price, 2.0);
    assert!(!store.get(&ids[3]).await.unwrap().in_stock);
}

#[tokio::test]
async fn bulk_update_uniform_applies_one_patch() {
    let store = seeded_store().await;
    let ids: Vec<String> = store.list(0, Some(2)).await.into_iter().map(|i| i.id).collect();

    let patch = ItemPatch {
        tags: Some(vec!["clearance".into()]),
        ..ItemPatch::default()
    };
    let outcome = store
        .bulk_update_uniform(vec![ids[0].clone(), "ghost".into(), ids[1].clone()], patch)
        .await
        .unwrap();
    assert!(!outcome.is_complete());
    assert!(outcome.succeeded.iter().all(|i| i.tags == ["clearance"]));

    let clearance = SearchFilter {
        tags: vec!["clearance".into()],
        ..SearchFilter::default()
    };
    assert_eq!(store.search(&clearance).await.unwrap().len(), 2);
}

#[tokio::test]
async fn bulk_update_with_invalid_patch_applies_nothing() {
    let store = seeded_store().await;
    let ids: Vec<String> = store.list(0, None).await.into_iter().map(|i| i.id).collect();
    let before = store.list(0, None).await;

    let result = store
        .bulk_update(vec![
            (ids[0].clone(), ItemPatch { price: Some(1.0), ..ItemPatch::default() }),
            (ids[1].clone(), ItemPatch { name: Some(" ".into()), ..ItemPatch::default() }),
        ])
        .await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
    assert_eq!(store.list(0, None).await, before);
}

#[tokio::test]
async fn bulk_delete_is_best_effort() {
    let store = seeded_store().await;
    let ids: Vec<String> = store.list(0, None).await.into_iter().map(|i| i.id).collect();

    let outcome = store
        .bulk_delete(vec![ids[1].clone(), "missing".into(), ids[2].clone()])
        .await
        .unwrap();
    let deleted: Vec<_> = outcome.succeeded.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(deleted, [ids[1].as_str(), ids[2].as_str()]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, "missing");

    let remaining: Vec<_> = store.list(0, None).await.into_iter().map(|i| i.id).collect();
    assert_eq!(remaining, [ids[0].clone(), ids[3].clone()]);
}
