//! Archive records
//!
//! A backup archive is one top-level JSON array of records:
//!
//! ```json
//! [
//!   { "table": "Orders", "entity": { "PartitionKey": { "type": "Edm.String", "value": "A" }, ... } },
//!   { "table": "Empty" }
//! ]
//! ```
//!
//! A record without `entity` marks a table that had no entities, so that it
//! still registers (and is cleared) on restore.

use crate::entity::{PARTITION_KEY, ROW_KEY};
use crate::value::TypedValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An archived entity: property name to typed value, keys included
pub type ArchivedEntity = BTreeMap<String, TypedValue>;

/// One archive element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Table the record belongs to
    pub table: String,
    /// The entity, absent for an empty-table marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<ArchivedEntity>,
}

impl Record {
    /// Create a record carrying an entity
    pub fn with_entity(table: impl Into<String>, entity: ArchivedEntity) -> Self {
        Self {
            table: table.into(),
            entity: Some(entity),
        }
    }

    /// Create an empty-table marker
    pub fn empty_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            entity: None,
        }
    }

    /// Whether this record is an empty-table marker
    pub fn is_marker(&self) -> bool {
        self.entity.is_none()
    }

    /// Name of the first key property the entity lacks, if any
    ///
    /// Markers never lack keys.
    pub fn missing_key(&self) -> Option<&'static str> {
        let entity = self.entity.as_ref()?;
        [PARTITION_KEY, ROW_KEY]
            .into_iter()
            .find(|name| !entity.contains_key(*name))
    }

    /// Raw (partition key, row key) strings, when present
    pub fn key_strings(&self) -> Option<(&str, &str)> {
        let entity = self.entity.as_ref()?;
        let pk = entity.get(PARTITION_KEY)?.as_str()?;
        let rk = entity.get(ROW_KEY)?.as_str()?;
        Some((pk, rk))
    }
}
