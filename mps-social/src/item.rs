//! Feed items: an opaque id plus an insertion-ordered bag of string fields.
//!
//! Items are immutable. A newer version of the same logical status arrives as a
//! whole new `Item` carrying the same [`ItemId`].
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known field names produced by social services.
pub mod fields {
    pub const AUTHOR: &str = "author";
    pub const AUTHOR_ID: &str = "authorid";
    pub const AUTHOR_ICON: &str = "authoricon";
    pub const CONTENT: &str = "content";
    pub const DATE: &str = "date";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    fields: IndexMap<String, String>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field insertion; a repeated name keeps its first position.
    ///
    /// ```
    /// use mps_social::item::{fields, Item};
    ///
    /// let item = Item::new("42")
    ///     .with_field(fields::AUTHOR_ID, "alice")
    ///     .with_field(fields::CONTENT, "hi");
    /// assert_eq!(item.get(fields::AUTHOR_ID), Some("alice"));
    /// assert_eq!(item.get(fields::AUTHOR_ICON), None);
    /// ```
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// Look up a field. Absence is normal; callers pick their own default.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Same as [`Item::get`] with the empty string as default.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
