//! Integration tests for coordinated session properties.

mod common;

use common::{Fail, clear_journal, count, journal_entries, session_abc};
use db_router::error::ApplyOutcome;
use db_router::models::{PropertyKind, PropertyValue, TypeMap, ValueKind};
use db_router::RouterError;
use std::time::Duration;

#[tokio::test]
async fn test_property_applied_to_every_backend() {
    let (mut session, mocks, journal) = session_abc().await;

    session.set_read_only(true).await.unwrap();

    assert!(session.read_only().unwrap());
    assert!(mocks.iter().all(|m| m.read_only_value()));
    // Snapshot then write, backend by backend, in registry order.
    assert_eq!(
        journal_entries(&journal),
        vec![
            "a:read_only",
            "a:set_read_only",
            "b:read_only",
            "b:set_read_only",
            "c:read_only",
            "c:set_read_only",
        ]
    );
}

#[tokio::test]
async fn test_failed_write_restores_earlier_backends() {
    let (mut session, mocks, journal) = session_abc().await;
    session.set_read_only(false).await.unwrap();
    clear_journal(&journal);

    mocks[1].fail("set_read_only", Fail::Nth(2));
    let err = session.set_read_only(true).await.unwrap_err();

    match err {
        RouterError::PartialApply {
            property,
            backend,
            outcome: ApplyOutcome::Recovered,
            ..
        } => {
            assert_eq!(property, PropertyKind::ReadOnly);
            assert_eq!(backend, "b");
        }
        other => panic!("expected recovered PartialApply, got {:?}", other),
    }

    // a was changed then put back, c was never touched.
    assert_eq!(count(&journal, "a", "set_read_only"), 2);
    assert_eq!(count(&journal, "c", "set_read_only"), 0);
    assert!(mocks.iter().all(|m| !m.read_only_value()));
    assert!(!session.read_only().unwrap());
}

#[tokio::test]
async fn test_failed_restore_leaves_property_unconfirmed() {
    let (mut session, mocks, _) = session_abc().await;
    session.set_read_only(false).await.unwrap();

    // First call confirmed false, second writes true, third is the restore.
    mocks[0].fail("set_read_only", Fail::Nth(3));
    mocks[1].fail("set_read_only", Fail::Nth(2));
    let err = session.set_read_only(true).await.unwrap_err();

    assert!(err.is_inconsistent());
    match err {
        RouterError::PartialApply {
            backend,
            outcome: ApplyOutcome::Inconsistent { restore_failures },
            ..
        } => {
            assert_eq!(backend, "b");
            let failed: Vec<_> = restore_failures.iter().map(|f| f.backend.as_str()).collect();
            assert_eq!(failed, vec!["a"]);
        }
        other => panic!("expected inconsistent PartialApply, got {:?}", other),
    }

    assert!(matches!(
        session.read_only(),
        Err(RouterError::PropertyNotSet {
            property: PropertyKind::ReadOnly
        })
    ));
}

#[tokio::test]
async fn test_failed_snapshot_counts_as_failed_write() {
    let (mut session, mocks, journal) = session_abc().await;
    mocks[1].fail("schema", Fail::Always);

    let err = session.set_schema("sales").await.unwrap_err();

    assert!(matches!(err, RouterError::PartialApply { ref backend, .. } if backend == "b"));
    assert_eq!(count(&journal, "b", "set_schema"), 0);
    // a: forward write then restore to its snapshot.
    assert_eq!(count(&journal, "a", "set_schema"), 2);
    assert_eq!(mocks[0].state.lock().unwrap().schema, "public");
}

#[tokio::test]
async fn test_apply_is_idempotent() {
    let (mut session, mocks, _) = session_abc().await;

    session.set_schema("sales").await.unwrap();
    let once: Vec<String> = mocks
        .iter()
        .map(|m| m.state.lock().unwrap().schema.clone())
        .collect();

    session.set_schema("sales").await.unwrap();
    let twice: Vec<String> = mocks
        .iter()
        .map(|m| m.state.lock().unwrap().schema.clone())
        .collect();

    assert_eq!(once, twice);
    assert_eq!(session.schema().unwrap(), "sales");
}

#[tokio::test]
async fn test_getters_never_touch_backends() {
    let (mut session, _, journal) = session_abc().await;
    session.set_catalog("warehouse").await.unwrap();
    clear_journal(&journal);

    assert_eq!(session.catalog().unwrap(), "warehouse");
    assert!(matches!(
        session.auto_commit(),
        Err(RouterError::PropertyNotSet { .. })
    ));
    assert!(journal_entries(&journal).is_empty());
}

#[tokio::test]
async fn test_type_map_defaults_to_empty() {
    let (mut session, mocks, _) = session_abc().await;
    assert!(session.type_map().unwrap().is_empty());

    let mut map = TypeMap::new();
    map.insert("jsonb".to_string(), ValueKind::Json);
    session.set_type_map(map.clone()).await.unwrap();

    assert_eq!(session.type_map().unwrap(), map);
    assert!(mocks.iter().all(|m| m.state.lock().unwrap().type_map == map));
}

#[tokio::test]
async fn test_network_timeout_and_validity() {
    let (mut session, mocks, _) = session_abc().await;

    session
        .set_network_timeout(Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(session.network_timeout().unwrap(), Some(Duration::from_secs(5)));
    assert_eq!(
        mocks[2].state.lock().unwrap().network_timeout,
        Some(Duration::from_secs(5))
    );
    assert!(session.is_valid(Duration::from_secs(3)).unwrap());
    assert!(!session.is_valid(Duration::from_secs(10)).unwrap());

    session.set_network_timeout(None).await.unwrap();
    assert_eq!(
        session.property(PropertyKind::NetworkTimeout).unwrap(),
        PropertyValue::NetworkTimeout(0)
    );
    assert!(session.is_valid(Duration::from_secs(3600)).unwrap());
}
