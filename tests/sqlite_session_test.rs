//! End-to-end tests over real SQLite backends.
//!
//! Two database files behind one routed session: `orders` statements go to
//! one file, `audit` statements to the other.

use db_router::config::ProxyConfig;
use db_router::models::{BackendConfig, PropertyKind};
use db_router::router::{RoutedSession, SqlxConnector, open_session};
use db_router::RouterError;
use std::time::Duration;
use tempfile::TempDir;

async fn setup() -> (RoutedSession, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = |file: &str| format!("sqlite:{}", dir.path().join(file).display());

    let config = ProxyConfig {
        backends: vec![
            BackendConfig::new("orders", url("orders.db"), "orders", Some("sqlite")).unwrap(),
            BackendConfig::new("audit", url("audit.db"), "audit", None).unwrap(),
        ],
        default: None,
    };
    let connector = SqlxConnector {
        connect_timeout: Duration::from_secs(5),
    };
    let mut session = open_session(&config, &connector).await.unwrap();

    session
        .execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, item TEXT NOT NULL)")
        .await
        .unwrap();
    session
        .execute("CREATE TABLE audit (id INTEGER PRIMARY KEY, note TEXT)")
        .await
        .unwrap();
    (session, dir)
}

async fn row_count(session: &mut RoutedSession, sql: &str) -> usize {
    session.execute(sql).await.unwrap().outcome.row_count()
}

#[tokio::test]
async fn test_statements_routed_to_separate_files() {
    let (mut session, _dir) = setup().await;

    let outcome = session
        .execute("INSERT INTO orders (item) VALUES ('widget')")
        .await
        .unwrap();
    assert_eq!(outcome.backend, "orders");
    assert_eq!(outcome.outcome.rows_affected, 1);

    let outcome = session.execute("SELECT id, item FROM orders").await.unwrap();
    assert_eq!(outcome.backend, "orders");
    assert_eq!(outcome.outcome.rows.len(), 1);
    assert_eq!(outcome.outcome.rows[0]["item"], "widget");

    // The audit file has its own table and never sees the order.
    assert_eq!(row_count(&mut session, "SELECT id FROM audit").await, 0);
    let err = session
        .execute_on("audit", "SELECT id FROM orders", &Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::Backend { ref backend, .. } if backend == "audit"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_rollback_to_checkpoint_spans_backends() {
    let (mut session, _dir) = setup().await;
    session.set_auto_commit(false).await.unwrap();

    session
        .execute("INSERT INTO orders (item) VALUES ('kept')")
        .await
        .unwrap();
    session.set_savepoint(Some("before_batch")).await.unwrap();
    session
        .execute("INSERT INTO orders (item) VALUES ('discarded')")
        .await
        .unwrap();
    session
        .execute("INSERT INTO audit (note) VALUES ('discarded')")
        .await
        .unwrap();

    session.rollback().await.unwrap();
    session.commit().await.unwrap();

    assert_eq!(row_count(&mut session, "SELECT id FROM orders").await, 1);
    assert_eq!(row_count(&mut session, "SELECT id FROM audit").await, 0);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_savepoint_requires_manual_commit() {
    let (mut session, _dir) = setup().await;

    let err = session.set_savepoint(None).await.unwrap_err();
    assert!(matches!(err, RouterError::PartialSavepoint { ref backend, .. } if backend == "orders"));
    assert_eq!(session.current_checkpoint(), None);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_read_only_applies_to_every_file() {
    let (mut session, _dir) = setup().await;
    session.set_read_only(true).await.unwrap();

    for sql in [
        "INSERT INTO orders (item) VALUES ('x')",
        "INSERT INTO audit (note) VALUES ('x')",
    ] {
        assert!(matches!(
            session.execute(sql).await,
            Err(RouterError::Backend { .. })
        ));
    }

    session.set_read_only(false).await.unwrap();
    session
        .execute("INSERT INTO audit (note) VALUES ('ok')")
        .await
        .unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_unsupported_schema_is_restored() {
    let (mut session, _dir) = setup().await;
    session.set_schema("main").await.unwrap();

    let err = session.set_schema("sales").await.unwrap_err();
    assert!(matches!(err, RouterError::PartialApply { ref backend, .. } if backend == "orders"));
    assert!(!err.is_inconsistent());
    assert_eq!(session.schema().unwrap(), "main");
    assert!(matches!(
        session.property(PropertyKind::AutoCommit),
        Err(RouterError::PropertyNotSet { .. })
    ));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_close_then_closed() {
    let (mut session, _dir) = setup().await;

    session.close().await.unwrap();
    assert!(session.is_closed().unwrap());
    assert!(session.backends().iter().all(|b| b.closed));
    assert!(matches!(
        session.execute("SELECT id FROM orders").await,
        Err(RouterError::SessionClosed)
    ));
}
