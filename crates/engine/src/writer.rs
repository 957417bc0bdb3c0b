//! Entity writer
//!
//! Converts one archived entity into a typed [`Entity`] and inserts it.
//! Failures come back as a [`Fault`] for the session to record; they never
//! abort the pipeline.

use crate::error::Fault;
use tablekeep_core::{ArchivedEntity, Entity, EntityKey, TableStore, PARTITION_KEY, ROW_KEY};
use tracing::debug;

/// Convert and insert one archived entity
pub async fn write_entity<S>(
    store: &S,
    table: &str,
    archived: &ArchivedEntity,
) -> Result<EntityKey, Fault>
where
    S: TableStore + ?Sized,
{
    let entity = Entity::from_archived(archived).map_err(|source| Fault::Convert {
        table: table.to_string(),
        key: archived_key(archived),
        source,
    })?;
    let key = entity.key().clone();

    debug!(
        target: "tablekeep::restore",
        table,
        partition_key = %key.partition_key,
        row_key = %key.row_key,
        "Inserting entity"
    );
    store
        .insert_entity(table, entity)
        .await
        .map_err(|source| Fault::Insert {
            table: table.to_string(),
            key: key.clone(),
            source,
        })?;
    Ok(key)
}

fn archived_key(archived: &ArchivedEntity) -> Option<EntityKey> {
    let pk = archived.get(PARTITION_KEY)?.as_str()?;
    let rk = archived.get(ROW_KEY)?.as_str()?;
    Some(EntityKey::new(pk, rk))
}
