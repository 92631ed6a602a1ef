use anyhow::Result;
use async_trait::async_trait;
use folio::{
    fields, ApiError, Certificate, CollectionKind, Experience, Fields, GatewayOp, MemoryCollection,
    OrderedCollectionStore, RemoteCollection, ReorderPhase, RowId, Skill, StoreConfig, StoreEvent,
    StorePhase, Value,
};
use std::sync::Arc;
use std::time::Duration;

type GatewayResult<T> = std::result::Result<T, ApiError>;

/// Gateway whose listing is taken when the request arrives and delivered
/// `latency` later, like a slow response from a real row store.
struct SlowList {
    inner: Arc<MemoryCollection<Skill>>,
    latency: Duration,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl RemoteCollection<Skill> for SlowList {
    async fn list(&self) -> GatewayResult<Vec<Skill>> {
        let rows = self.inner.rows().await;
        tokio::time::sleep(self.latency).await;
        Ok(rows)
    }

    async fn max_position(&self) -> GatewayResult<Option<i64>> {
        self.inner.max_position().await
    }

    async fn insert_row(&self, fields: Fields) -> GatewayResult<Skill> {
        self.inner.insert_row(fields).await
    }

    async fn update(&self, id: RowId, fields: Fields) -> GatewayResult<()> {
        self.inner.update(id, fields).await
    }

    async fn delete(&self, id: RowId) -> GatewayResult<()> {
        self.inner.delete(id).await
    }
}

fn skill(id: RowId, name: &str, position: i64) -> Skill {
    Skill {
        id,
        name: name.to_string(),
        position,
    }
}

fn names(items: &[Skill]) -> Vec<String> {
    items.iter().map(|s| s.name.clone()).collect()
}

/// Gateway seeded with `names` at positions `0..n-1`, and a store that has loaded it.
async fn loaded(
    names: &[&str],
    config: StoreConfig,
) -> Result<(Arc<MemoryCollection<Skill>>, OrderedCollectionStore<Skill>)> {
    let rows = names
        .iter()
        .enumerate()
        .map(|(i, name)| skill(i as RowId + 1, name, i as i64))
        .collect();
    let gateway = Arc::new(MemoryCollection::with_rows(rows));
    let store = OrderedCollectionStore::new(gateway.clone(), config);
    store.load().await?;
    gateway.clear_calls().await;
    Ok((gateway, store))
}

async fn updates(gateway: &MemoryCollection<Skill>) -> Vec<(RowId, Value)> {
    let mut writes: Vec<_> = gateway
        .calls()
        .await
        .into_iter()
        .filter(|c| c.op == GatewayOp::Update)
        .map(|c| {
            let position = c.fields.unwrap_or_default()["sort_order"].clone();
            (c.id.unwrap_or_default(), position)
        })
        .collect();
    writes.sort_by_key(|(id, _)| *id);
    writes
}

#[tokio::test]
async fn test_drag_to_front_renders_immediately_and_reverts_on_failed_write() -> Result<()> {
    let (gateway, store) = loaded(&["Go", "Rust", "Zig"], StoreConfig::minimal()).await?;
    gateway.fail_writes_for(1).await;
    gateway.hold();

    let (result, ()) = tokio::join!(store.reorder_by_id(3, 1), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.reorder_pending()).await.unwrap();

        let optimistic = store.items();
        assert_eq!(names(&optimistic), vec!["Zig", "Go", "Rust"]);
        let positions: Vec<_> = optimistic.iter().map(|s| (s.id, s.position)).collect();
        assert_eq!(positions, vec![(3, 0), (1, 1), (2, 2)]);
        assert_eq!(store.phase(), StorePhase::ReorderPending);

        gateway.release();
    });

    let err = result.unwrap_err();
    assert!(matches!(err, ApiError::Backend { .. }));
    assert!(err.to_string().contains("update skills/1"));
    assert_eq!(names(&store.items()), vec!["Go", "Rust", "Zig"]);
    assert!(store.last_error().is_some());
    assert_eq!(store.phase(), StorePhase::Idle);

    assert_eq!(
        updates(&gateway).await,
        vec![
            (1, Value::Integer(1)),
            (2, Value::Integer(2)),
            (3, Value::Integer(0)),
        ]
    );

    // Writes that landed are not compensated; the next load shows the remote truth
    gateway.clear_faults().await;
    store.load().await?;
    let reloaded: Vec<_> = store.items().iter().map(|s| (s.id, s.position)).collect();
    assert_eq!(reloaded, vec![(1, 0), (3, 0), (2, 2)]);
    assert!(store.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_reorder_commits_and_emits_events() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B", "C", "D"], StoreConfig::minimal()).await?;
    let mut events = store.events();

    store.reorder(0, 2).await?;

    assert_eq!(names(&store.items()), vec!["B", "C", "A", "D"]);
    assert_eq!(names(&gateway.rows().await), vec!["B", "C", "A", "D"]);
    // D keeps position 3 and is never written
    assert_eq!(
        updates(&gateway).await,
        vec![
            (1, Value::Integer(2)),
            (2, Value::Integer(0)),
            (3, Value::Integer(1)),
        ]
    );

    assert_eq!(
        events.try_recv()?,
        StoreEvent::ReorderApplied {
            collection: CollectionKind::Skills,
            writes: 3
        }
    );
    assert_eq!(
        events.try_recv()?,
        StoreEvent::ReorderCommitted {
            collection: CollectionKind::Skills
        }
    );
    assert_eq!(store.snapshot().reorder, ReorderPhase::Idle);
    Ok(())
}

#[tokio::test]
async fn test_reorder_rolls_back_when_every_write_fails() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B", "C"], StoreConfig::minimal()).await?;
    gateway.fail_op(GatewayOp::Update).await;
    let mut events = store.events();

    let err = store.reorder(0, 2).await.unwrap_err();

    assert!(err.to_string().contains("3 of 3 position writes failed"));
    assert_eq!(names(&store.items()), vec!["A", "B", "C"]);
    assert_eq!(store.last_error(), Some(err.to_string()));

    let _applied = events.try_recv()?;
    match events.try_recv()? {
        StoreEvent::RolledBack { operation, .. } => assert_eq!(operation, "reorder"),
        other => panic!("expected rollback, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_reorder_to_same_index_issues_no_writes() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B"], StoreConfig::minimal()).await?;

    store.reorder(1, 1).await?;
    store.reorder_by_id(2, 2).await?;

    assert!(gateway.calls().await.is_empty());
    assert_eq!(names(&store.items()), vec!["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn test_reorder_out_of_range_is_rejected() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B"], StoreConfig::minimal()).await?;

    let err = store.reorder(0, 5).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation { .. }));

    let err = store.reorder_by_id(9, 1).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound { id: 9, .. }));
    assert!(store.last_error().is_some());
    assert!(gateway.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_second_reorder_and_mutations_are_rejected_while_pending() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B", "C"], StoreConfig::minimal()).await?;
    gateway.hold();

    let (first, ()) = tokio::join!(store.reorder(0, 2), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.reorder_pending()).await.unwrap();

        let err = store.reorder(2, 0).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::ConcurrentReorderRejected {
                collection: CollectionKind::Skills,
                ..
            }
        ));
        assert!(store
            .edit(1, fields([("name", Value::from("X"))]))
            .await
            .is_err());
        assert!(store.remove(2).await.is_err());
        assert!(store.create(fields([("name", Value::from("D"))])).await.is_err());

        // The in-flight batch still shows its own sequence
        assert_eq!(names(&store.items()), vec!["B", "C", "A"]);
        gateway.release();
    });

    first?;
    assert_eq!(names(&store.items()), vec!["B", "C", "A"]);
    assert_eq!(updates(&gateway).await.len(), 3);
    assert_eq!(gateway.calls().await.len(), 3);
    assert_eq!(store.last_error(), None);
    Ok(())
}

#[tokio::test]
async fn test_reorder_is_rejected_while_an_edit_is_in_flight() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B", "C"], StoreConfig::minimal()).await?;
    gateway.hold();

    let (edited, ()) = tokio::join!(store.edit(2, fields([("name", Value::from("X"))])), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.mutations_in_flight() > 0).await.unwrap();

        let err = store.reorder(0, 1).await.unwrap_err();
        assert!(matches!(err, ApiError::ConcurrentReorderRejected { .. }));
        gateway.release();
    });

    edited?;
    assert_eq!(names(&store.items()), vec!["A", "X", "C"]);
    assert!(store.snapshot().accepts_reorder());
    Ok(())
}

#[tokio::test]
async fn test_failed_edit_restores_previous_fields() -> Result<()> {
    let (gateway, store) = loaded(&["Go", "Rust", "Zig"], StoreConfig::minimal()).await?;
    gateway.fail_writes_for(2).await;
    gateway.hold();

    let (result, ()) = tokio::join!(store.edit(2, fields([("name", Value::from("X"))])), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.mutations_in_flight() > 0).await.unwrap();
        assert_eq!(names(&store.items()), vec!["Go", "X", "Zig"]);
        gateway.release();
    });

    assert!(result.is_err());
    assert_eq!(store.items()[1], skill(2, "Rust", 1));
    assert!(store.last_error().unwrap().contains("update skills/2"));
    Ok(())
}

#[tokio::test]
async fn test_failed_remove_reinserts_at_original_index() -> Result<()> {
    let (gateway, store) = loaded(&["Go", "Rust", "Zig"], StoreConfig::minimal()).await?;
    gateway.fail_writes_for(2).await;
    gateway.hold();

    let (result, ()) = tokio::join!(store.remove(2), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.mutations_in_flight() > 0).await.unwrap();
        assert_eq!(names(&store.items()), vec!["Go", "Zig"]);
        gateway.release();
    });

    assert!(result.is_err());
    assert_eq!(names(&store.items()), vec!["Go", "Rust", "Zig"]);
    assert_eq!(gateway.rows().await.len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_failed_removes_restore_original_order() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B", "C"], StoreConfig::minimal()).await?;
    gateway.fail_writes_for(1).await;
    gateway.fail_writes_for(3).await;
    gateway.set_delay(Some(Duration::from_secs(1))).await;

    let (first, second) = tokio::join!(store.remove(1), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.mutations_in_flight() > 0).await.unwrap();
        gateway.set_delay(Some(Duration::from_secs(2))).await;
        store.remove(3).await
    });

    assert!(first.is_err());
    assert!(second.is_err());
    assert_eq!(names(&store.items()), vec!["A", "B", "C"]);
    assert_eq!(store.items(), gateway.rows().await);
    Ok(())
}

#[tokio::test]
async fn test_edit_and_remove_of_unknown_id_are_not_found() -> Result<()> {
    let (gateway, store) = loaded(&["Go"], StoreConfig::minimal()).await?;

    let err = store
        .edit(42, fields([("name", Value::from("X"))]))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::NotFound {
            collection: CollectionKind::Skills,
            id: 42
        }
    );
    assert!(store.remove(42).await.is_err());

    assert!(gateway.calls().await.is_empty());
    assert_eq!(store.last_error(), Some("skills row 42 not found".to_string()));
    assert!(store.snapshot().accepts_reorder());
    Ok(())
}

#[tokio::test]
async fn test_edit_may_not_touch_id_or_position() -> Result<()> {
    let (gateway, store) = loaded(&["Go"], StoreConfig::minimal()).await?;

    let err = store
        .edit(1, fields([("sort_order", Value::Integer(9))]))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation { .. }));
    assert_eq!(store.items(), vec![skill(1, "Go", 0)]);
    assert!(gateway.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_appends_after_max_position_and_refreshes() -> Result<()> {
    let (gateway, store) = loaded(&["Go", "Rust", "Zig"], StoreConfig::default()).await?;
    store.remove(2).await?;
    gateway.clear_calls().await;

    let created = store.create(fields([("name", Value::from("C"))])).await?;

    assert_eq!((created.id, created.position), (4, 3));
    assert_eq!(names(&store.items()), vec!["Go", "Zig", "C"]);
    let ops: Vec<_> = gateway.calls().await.into_iter().map(|c| c.op).collect();
    assert_eq!(
        ops,
        vec![GatewayOp::MaxPosition, GatewayOp::Insert, GatewayOp::List]
    );
    Ok(())
}

#[tokio::test]
async fn test_create_failure_leaves_sequence_untouched() -> Result<()> {
    let (gateway, store) = loaded(&["Go"], StoreConfig::minimal()).await?;
    gateway.fail_op(GatewayOp::Insert).await;
    let mut events = store.events();

    assert!(store.create(fields([("name", Value::from("Rust"))])).await.is_err());

    assert_eq!(names(&store.items()), vec!["Go"]);
    assert!(matches!(events.try_recv()?, StoreEvent::Failed { .. }));
    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_does_not_fail_the_mutation() -> Result<()> {
    let (gateway, store) = loaded(&["Go", "Rust"], StoreConfig::default()).await?;
    gateway.fail_op(GatewayOp::List).await;

    store.edit(1, fields([("name", Value::from("C"))])).await?;

    assert_eq!(names(&store.items()), vec!["C", "Rust"]);
    assert_eq!(store.phase(), StorePhase::LoadError);
    assert!(store.last_error().unwrap().contains("list skills"));
    Ok(())
}

#[tokio::test]
async fn test_failed_load_keeps_previous_sequence() -> Result<()> {
    let (gateway, store) = loaded(&["Go", "Rust"], StoreConfig::minimal()).await?;
    gateway.fail_next(1).await;

    assert!(store.load().await.is_err());
    assert_eq!(names(&store.items()), vec!["Go", "Rust"]);
    assert_eq!(store.phase(), StorePhase::LoadError);

    store.load().await?;
    assert_eq!(store.phase(), StorePhase::Idle);
    assert!(store.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_load_twice_yields_same_sequence() -> Result<()> {
    let (_gateway, store) = loaded(&["Go", "Rust", "Zig"], StoreConfig::minimal()).await?;

    store.load().await?;
    let first = store.items();
    store.load().await?;

    assert_eq!(first, store.items());
    Ok(())
}

#[tokio::test]
async fn test_load_sorts_by_position() -> Result<()> {
    let gateway = Arc::new(MemoryCollection::with_rows(vec![
        skill(1, "Go", 7),
        skill(2, "Rust", 2),
        skill(3, "Zig", 4),
    ]));
    let store = OrderedCollectionStore::new(gateway.clone(), StoreConfig::minimal());

    store.load().await?;
    assert_eq!(names(&store.items()), vec!["Rust", "Zig", "Go"]);

    // Reordering a gapped collection rewrites every stale position
    store.reorder(0, 1).await?;
    let positions: Vec<_> = gateway.rows().await.iter().map(|s| (s.id, s.position)).collect();
    assert_eq!(positions, vec![(3, 0), (2, 1), (1, 2)]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_hung_gateway_call_times_out() -> Result<()> {
    let config = StoreConfig {
        request_timeout_secs: Some(5),
        refresh_after_mutation: false,
    };
    let (gateway, store) = loaded(&["A", "B", "C"], config).await?;
    gateway.set_delay(Some(Duration::from_secs(60))).await;

    let err = store.load().await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Timeout {
            operation: "list skills".to_string()
        }
    );

    let err = store.reorder(2, 0).await.unwrap_err();
    assert!(err.to_string().contains("timed out"));
    assert_eq!(names(&store.items()), vec!["A", "B", "C"]);
    assert!(store.snapshot().accepts_reorder());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_load_during_pending_reorder_is_authoritative() -> Result<()> {
    let (gateway, store) = loaded(&["A", "B", "C"], StoreConfig::minimal()).await?;
    gateway.set_delay(Some(Duration::from_secs(10))).await;

    let (result, ()) = tokio::join!(store.reorder(0, 2), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.reorder_pending()).await.unwrap();

        gateway.set_delay(None).await;
        gateway
            .insert(fields([("name", Value::from("D"))]))
            .await
            .unwrap();
        gateway.fail_op(GatewayOp::Update).await;

        store.load().await.unwrap();
        assert_eq!(names(&store.items()), vec!["A", "B", "C", "D"]);
        assert!(!store.snapshot().reorder_pending());
    });

    // The stale batch fails but does not roll back over the fresher listing
    assert!(result.is_err());
    assert_eq!(names(&store.items()), vec!["A", "B", "C", "D"]);
    assert_eq!(store.snapshot().reorder, ReorderPhase::Idle);
    assert!(store.last_error().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_mutations_are_rejected_while_a_load_is_in_flight() -> Result<()> {
    let (gateway, _) = loaded(&["A", "B", "C"], StoreConfig::minimal()).await?;
    let slow = Arc::new(SlowList {
        inner: gateway.clone(),
        latency: Duration::from_secs(10),
    });
    let store = OrderedCollectionStore::new(slow, StoreConfig::minimal());
    store.load().await?;

    let (reloaded, ()) = tokio::join!(store.load(), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.is_loading()).await.unwrap();

        let err = store.reorder(0, 2).await.unwrap_err();
        assert!(matches!(err, ApiError::ConcurrentReorderRejected { .. }));
        assert!(store.create(fields([("name", Value::from("D"))])).await.is_err());
        assert!(store.edit(1, fields([("name", Value::from("X"))])).await.is_err());
        assert!(store.remove(2).await.is_err());
    });

    reloaded?;
    // The late listing and the remote rows agree, since nothing slipped in between
    assert_eq!(names(&store.items()), vec!["A", "B", "C"]);
    assert_eq!(store.items(), gateway.rows().await);
    assert!(store.last_error().is_none());

    store.reorder(0, 2).await?;
    assert_eq!(names(&store.items()), vec!["B", "C", "A"]);
    assert_eq!(store.items(), gateway.rows().await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_edit_confirmed_after_a_load_landed_relists() -> Result<()> {
    let (gateway, store) = loaded(&["Go", "Rust"], StoreConfig::minimal()).await?;
    gateway.set_delay(Some(Duration::from_secs(10))).await;

    let (edited, ()) = tokio::join!(store.edit(2, fields([("name", Value::from("Zig"))])), async {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.mutations_in_flight() > 0).await.unwrap();

        gateway.set_delay(None).await;
        store.load().await.unwrap();
        // Listed before the update landed
        assert_eq!(names(&store.items()), vec!["Go", "Rust"]);
    });

    edited?;
    assert_eq!(names(&store.items()), vec!["Go", "Zig"]);
    assert_eq!(store.items(), gateway.rows().await);
    Ok(())
}

#[tokio::test]
async fn test_edit_stamps_updated_at_for_experiences() -> Result<()> {
    let gateway = Arc::new(MemoryCollection::with_rows(vec![Experience {
        id: 1,
        title: "Acme".to_string(),
        summary: "Engineer".to_string(),
        published_at: "2021-01-01".to_string(),
        logo_url: None,
        link: None,
        description: None,
        position: 0,
    }]));
    let store = OrderedCollectionStore::new(gateway.clone(), StoreConfig::minimal());
    store.load().await?;

    store
        .edit(1, fields([("summary", Value::from("Staff Engineer"))]))
        .await?;

    assert_eq!(store.items()[0].summary, "Staff Engineer");
    let call = gateway
        .calls()
        .await
        .into_iter()
        .find(|c| c.op == GatewayOp::Update)
        .unwrap();
    let sent = call.fields.unwrap();
    assert!(sent.contains_key("updated_at"));
    assert_eq!(sent["summary"], Value::from("Staff Engineer"));
    Ok(())
}

#[tokio::test]
async fn test_edit_stamps_updated_at_for_certificates() -> Result<()> {
    let gateway = Arc::new(MemoryCollection::with_rows(vec![Certificate {
        id: 1,
        title: "Rust Fundamentals".to_string(),
        company: "Coursera".to_string(),
        issued_date: "2023-05-01".to_string(),
        certificate_url: None,
        image_url: None,
        pdf_url: None,
        description: None,
        position: 0,
    }]));
    let store = OrderedCollectionStore::new(gateway.clone(), StoreConfig::minimal());
    store.load().await?;

    store
        .edit(1, fields([("company", Value::from("edX"))]))
        .await?;

    let call = gateway
        .calls()
        .await
        .into_iter()
        .find(|c| c.op == GatewayOp::Update)
        .unwrap();
    assert!(call.fields.unwrap().contains_key("updated_at"));
    assert_eq!(gateway.rows().await[0].company, "edX");
    Ok(())
}
