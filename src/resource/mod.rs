//! The generic resource entity and its Postgres-backed store.
//!
//! A resource has a few indexed columns (`id`, `label`, timestamps) and a
//! `fields` payload kept as a single JSON column. Decoding that payload only
//! keeps the keys [`FieldSet`] models; anything else in the stored document
//! is dropped.

mod error;
mod queries;
mod store;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use error::{PartialList, ResourceError};
pub use queries::Queries;
pub use store::{ResourceStore, StoreOptions, UpdateMissing};

/// A persisted resource. `id` is empty until the store has created it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn new(label: impl Into<String>, fields: Option<FieldSet>) -> Self {
        Self {
            label: label.into(),
            fields,
            ..Default::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }
}

/// The open-ended payload of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creator: Vec<Creator>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(
        rename = "datePublished",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub date_published: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Creator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
