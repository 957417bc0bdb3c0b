//! Native entity model
//!
//! An [`Entity`] is identified by its [`EntityKey`] (partition key, row key)
//! and carries any number of typed properties. The two key properties are
//! held in the key, never in the property map.

use crate::error::{ConversionError, ConversionResult};
use crate::record::ArchivedEntity;
use crate::value::{EdmType, PropertyValue, TypedValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the partition key property
pub const PARTITION_KEY: &str = "PartitionKey";

/// Name of the row key property
pub const ROW_KEY: &str = "RowKey";

/// Composite key uniquely identifying an entity within a table
///
/// Ordering is partition key first, then row key, which is the order a
/// table store returns entities in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// Partition key
    pub partition_key: String,
    /// Row key
    pub row_key: String,
}

impl EntityKey {
    /// Create a key
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.row_key)
    }
}

/// A typed table entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    key: EntityKey,
    properties: BTreeMap<String, PropertyValue>,
}

impl Entity {
    /// Create an entity with no properties besides its key
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a property; key property names are ignored
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        if name == PARTITION_KEY || name == ROW_KEY {
            return;
        }
        self.properties.insert(name, value.into());
    }

    /// Get a property by name
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// The entity key
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// The partition key
    pub fn partition_key(&self) -> &str {
        &self.key.partition_key
    }

    /// The row key
    pub fn row_key(&self) -> &str {
        &self.key.row_key
    }

    /// All non-key properties, ordered by name
    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Consume the entity, keeping only its key
    pub fn into_key(self) -> EntityKey {
        self.key
    }

    /// Convert an archived entity into a native one
    ///
    /// Each property's tag selects the native constructor; the key
    /// properties must be present and hold strings.
    pub fn from_archived(archived: &ArchivedEntity) -> ConversionResult<Self> {
        let partition_key = key_property(archived, PARTITION_KEY)?;
        let row_key = key_property(archived, ROW_KEY)?;
        let mut entity = Entity::new(EntityKey::new(partition_key, row_key));
        for (name, typed) in archived {
            if name == PARTITION_KEY || name == ROW_KEY {
                continue;
            }
            let value = typed
                .to_property()
                .map_err(|e| e.for_property(name.as_str()))?;
            entity.properties.insert(name.clone(), value);
        }
        Ok(entity)
    }

    /// Encode in archive form, key properties included
    pub fn to_archived(&self) -> ArchivedEntity {
        let mut archived: ArchivedEntity = self
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), value.to_typed()))
            .collect();
        archived.insert(
            PARTITION_KEY.to_string(),
            TypedValue::string(self.key.partition_key.clone()),
        );
        archived.insert(ROW_KEY.to_string(), TypedValue::string(self.key.row_key.clone()));
        archived
    }
}

fn key_property(archived: &ArchivedEntity, name: &'static str) -> ConversionResult<String> {
    let typed = archived.get(name).ok_or(ConversionError::MissingKey(name))?;
    if typed.edm_type() != EdmType::String {
        return Err(ConversionError::KeyNotString(name));
    }
    typed
        .as_str()
        .map(str::to_string)
        .ok_or(ConversionError::KeyNotString(name))
}
