//! Session properties kept consistent across every backend.
//!
//! [`PropertyCoordinator::apply`] snapshots and writes a property backend by
//! backend in registry order. When a write fails it puts the earlier
//! backends back to their snapshots; if that also fails the property is
//! marked unset, since its cross-backend value is no longer known.

use crate::db::NativeConnection;
use crate::error::{ApplyOutcome, BackendFailure, DbResult, RouterError, RouterResult};
use crate::models::{PropertyKind, PropertyValue, timeout_from_millis};
use crate::router::backend::Backend;
use std::collections::HashMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct PropertyRecord {
    pub value: PropertyValue,
    pub is_set: bool,
}

/// Last confirmed value of each property.
///
/// Records are created on the first confirmed write and never removed; an
/// inconsistent write clears `is_set` but keeps the record.
#[derive(Debug, Default)]
pub struct PropertyStore {
    records: HashMap<PropertyKind, PropertyRecord>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: PropertyKind) -> RouterResult<&PropertyValue> {
        match self.records.get(&kind) {
            Some(record) if record.is_set => Ok(&record.value),
            _ => Err(RouterError::PropertyNotSet { property: kind }),
        }
    }

    pub fn set(&mut self, value: PropertyValue) {
        self.records.insert(
            value.kind(),
            PropertyRecord {
                value,
                is_set: true,
            },
        );
    }

    pub fn unset(&mut self, kind: PropertyKind) {
        if let Some(record) = self.records.get_mut(&kind) {
            record.is_set = false;
        }
    }

    pub fn is_set(&self, kind: PropertyKind) -> bool {
        self.records.get(&kind).is_some_and(|r| r.is_set)
    }

    /// True once the property has been confirmed at least once.
    pub fn was_initiated(&self, kind: PropertyKind) -> bool {
        self.records.contains_key(&kind)
    }
}

/// Read one property from a native connection.
pub async fn read_native(
    conn: &mut dyn NativeConnection,
    kind: PropertyKind,
) -> DbResult<PropertyValue> {
    Ok(match kind {
        PropertyKind::AutoCommit => PropertyValue::AutoCommit(conn.auto_commit().await?),
        PropertyKind::ReadOnly => PropertyValue::ReadOnly(conn.read_only().await?),
        PropertyKind::Schema => PropertyValue::Schema(conn.schema().await?),
        PropertyKind::Catalog => PropertyValue::Catalog(conn.catalog().await?),
        PropertyKind::NetworkTimeout => {
            PropertyValue::network_timeout(conn.network_timeout().await?)
        }
        PropertyKind::TypeMap => PropertyValue::TypeMap(conn.type_map().await?),
    })
}

/// Write one property to a native connection.
pub async fn write_native(conn: &mut dyn NativeConnection, value: &PropertyValue) -> DbResult<()> {
    match value {
        PropertyValue::AutoCommit(on) => conn.set_auto_commit(*on).await,
        PropertyValue::ReadOnly(on) => conn.set_read_only(*on).await,
        PropertyValue::Schema(schema) => conn.set_schema(schema).await,
        PropertyValue::Catalog(catalog) => conn.set_catalog(catalog).await,
        PropertyValue::NetworkTimeout(millis) => {
            conn.set_network_timeout(timeout_from_millis(*millis)).await
        }
        PropertyValue::TypeMap(map) => conn.set_type_map(map.clone()).await,
    }
}

pub struct PropertyCoordinator;

impl PropertyCoordinator {
    /// Apply `value` on every backend, or on none of them.
    pub async fn apply(
        store: &mut PropertyStore,
        backends: &mut [Backend],
        value: PropertyValue,
    ) -> RouterResult<()> {
        let kind = value.kind();
        let mut snapshots: Vec<(usize, PropertyValue)> = Vec::with_capacity(backends.len());
        let mut failure = None;

        for (i, backend) in backends.iter_mut().enumerate() {
            let conn = backend.connection();
            // A failed snapshot means nothing changed on this backend either.
            let step = match read_native(conn, kind).await {
                Ok(prior) => write_native(conn, &value).await.map(|()| prior),
                Err(e) => Err(e),
            };
            match step {
                Ok(prior) => snapshots.push((i, prior)),
                Err(e) => {
                    failure = Some((i, e));
                    break;
                }
            }
        }

        let Some((failed_at, source)) = failure else {
            store.set(value);
            info!(property = %kind, backends = backends.len(), "Property applied");
            return Ok(());
        };

        let backend = backends[failed_at].name().to_string();
        warn!(
            property = %kind,
            backend = %backend,
            error = %source,
            restoring = snapshots.len(),
            "Property write failed, restoring earlier backends"
        );

        let mut restore_failures = Vec::new();
        for (i, prior) in &snapshots {
            let target = &mut backends[*i];
            if let Err(e) = write_native(target.connection(), prior).await {
                restore_failures.push(BackendFailure::new(target.name(), e));
            }
        }

        let outcome = if restore_failures.is_empty() {
            ApplyOutcome::Recovered
        } else {
            store.unset(kind);
            error!(
                property = %kind,
                failed = ?restore_failures.iter().map(|f| f.backend.as_str()).collect::<Vec<_>>(),
                "Property restore failed, value is inconsistent across backends"
            );
            ApplyOutcome::Inconsistent { restore_failures }
        };

        Err(RouterError::PartialApply {
            property: kind,
            backend,
            source,
            outcome,
        })
    }
}
