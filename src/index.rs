//! Index descriptor for the collections the bootstrap manages.
//!
//! A descriptor names one single-field index: the collection it lives on,
//! the indexed field, the key direction and whether values must be unique.
use mongodb::{
    bson::{doc, Bson, Document},
    options::IndexOptions,
    IndexModel,
};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InvalidNameError {
    #[error("database name must not be empty")]
    EmptyDatabase,
    #[error("database name {0:?} contains a forbidden character")]
    ForbiddenDatabaseChar(String),
    #[error("collection name must not be empty")]
    EmptyCollection,
    #[error("collection name {0:?} contains '$' or a null byte")]
    ForbiddenCollectionChar(String),
    #[error("collection name {0:?} uses the reserved 'system.' prefix")]
    ReservedCollection(String),
    #[error("field name must not be empty")]
    EmptyField,
    #[error("field name {0:?} must not start with '$' or contain a null byte")]
    ForbiddenFieldChar(String),
    #[error("field name {0:?} has an empty path segment")]
    EmptyFieldSegment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDirection {
    Ascending,
    Descending,
}

impl IndexDirection {
    pub fn as_i32(self) -> i32 {
        match self {
            IndexDirection::Ascending => 1,
            IndexDirection::Descending => -1,
        }
    }
}

impl TryFrom<i64> for IndexDirection {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(IndexDirection::Ascending),
            -1 => Ok(IndexDirection::Descending),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub collection: String,
    pub field: String,
    pub direction: IndexDirection,
    pub unique: bool,
}

impl Default for IndexDescriptor {
    /// `not_retweeted_tweets.author_id`, ascending, non-unique.
    fn default() -> Self {
        IndexDescriptor {
            collection: crate::conf::DEFAULT_COLLECTION.to_string(),
            field: crate::conf::DEFAULT_FIELD.to_string(),
            direction: IndexDirection::Ascending,
            unique: false,
        }
    }
}

impl IndexDescriptor {
    pub fn keys(&self) -> Document {
        let field = self.field.as_str();
        doc! { field: self.direction.as_i32() }
    }

    pub fn to_index_model(&self) -> IndexModel {
        IndexModel::builder()
            .keys(self.keys())
            .options(IndexOptions::builder().unique(self.unique).build())
            .build()
    }

    pub fn validate(&self) -> Result<(), InvalidNameError> {
        validate_collection_name(&self.collection)?;
        validate_field_name(&self.field)
    }

    /// Whether an index reported by the server is the one this descriptor
    /// describes. Key directions are compared by numeric value since the
    /// server echoes back whatever numeric type created the index.
    pub fn matches(&self, index: &IndexModel) -> bool {
        if index.keys.len() != 1 {
            return false;
        }
        let direction = match index.keys.get(&self.field).and_then(numeric_direction) {
            Some(direction) => direction,
            None => return false,
        };
        let unique = index
            .options
            .as_ref()
            .and_then(|options| options.unique)
            .unwrap_or(false);
        direction == i64::from(self.direction.as_i32()) && unique == self.unique
    }
}

fn numeric_direction(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        _ => None,
    }
}

const FORBIDDEN_DATABASE_CHARS: [char; 13] = [
    '/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?', '\0',
];

pub fn validate_database_name(name: &str) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::EmptyDatabase);
    }
    if name.chars().any(|c| FORBIDDEN_DATABASE_CHARS.contains(&c)) {
        return Err(InvalidNameError::ForbiddenDatabaseChar(name.to_string()));
    }
    Ok(())
}

pub fn validate_collection_name(name: &str) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::EmptyCollection);
    }
    if name.contains('$') || name.contains('\0') {
        return Err(InvalidNameError::ForbiddenCollectionChar(name.to_string()));
    }
    if name.starts_with("system.") {
        return Err(InvalidNameError::ReservedCollection(name.to_string()));
    }
    Ok(())
}

pub fn validate_field_name(name: &str) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::EmptyField);
    }
    if name.starts_with('$') || name.contains('\0') {
        return Err(InvalidNameError::ForbiddenFieldChar(name.to_string()));
    }
    if name.split('.').any(str::is_empty) {
        return Err(InvalidNameError::EmptyFieldSegment(name.to_string()));
    }
    Ok(())
}
