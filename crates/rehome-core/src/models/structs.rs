use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessLevel, SourceUserStatus};
use crate::constants::{MEMBER_SOURCE_NAMESPACE, MEMBER_SOURCE_PROJECT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUser {
    pub id: i64,
    pub namespace_id: i64,
    pub placeholder_user_id: i64,
    pub reassign_to_user_id: Option<i64>,
    pub reassigned_by_user_id: Option<i64>,
    pub source_hostname: String,
    pub status: SourceUserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceUser {
    #[must_use]
    pub fn is_reassignment_in_progress(&self) -> bool {
        self.status == SourceUserStatus::ReassignmentInProgress
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSourceUser {
    pub namespace_id: i64,
    pub placeholder_user_id: i64,
    pub source_hostname: String,
}

/// A single value of a composite row key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Column to value pairs identifying a row without a usable primary key.
/// Columns iterate in name order, so generated predicates are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(BTreeMap<String, KeyValue>);

impl CompositeKey {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<KeyValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyValue)> {
        self.0.iter().map(|(column, value)| (column.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&KeyValue> {
        self.0.get(column)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, KeyError> {
        let object = value.as_object().ok_or(KeyError::NotAnObject)?;
        let mut key = Self::new();
        for (column, value) in object {
            let value = match value {
                serde_json::Value::Number(number) => number
                    .as_i64()
                    .map(KeyValue::Int)
                    .ok_or_else(|| KeyError::UnsupportedValue(column.clone()))?,
                serde_json::Value::String(text) => KeyValue::Text(text.clone()),
                _ => return Err(KeyError::UnsupportedValue(column.clone())),
            };
            key.insert(column.clone(), value);
        }
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(key)
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl FromIterator<(String, KeyValue)> for CompositeKey {
    fn from_iter<I: IntoIterator<Item = (String, KeyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (column, value) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{column}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("placeholder reference has neither a numeric nor a composite key")]
    Missing,
    #[error("composite key is not a JSON object")]
    NotAnObject,
    #[error("composite key is empty")]
    Empty,
    #[error("composite key column {0} holds an unsupported value")]
    UnsupportedValue(String),
}

/// Identity of one row of a registered model's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    Id(i64),
    Composite(CompositeKey),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Composite(key) => write!(f, "{{{key}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderReference {
    pub id: i64,
    pub source_user_id: i64,
    pub namespace_id: i64,
    pub model: String,
    pub user_reference_column: String,
    pub numeric_key: Option<i64>,
    pub composite_key: Option<serde_json::Value>,
    pub alias_version: i32,
    pub created_at: DateTime<Utc>,
}

impl PlaceholderReference {
    /// The numeric key wins when both are present.
    pub fn row_key(&self) -> Result<RowKey, KeyError> {
        if let Some(id) = self.numeric_key {
            return Ok(RowKey::Id(id));
        }
        match self.composite_key.as_ref() {
            Some(value) => CompositeKey::from_json(value).map(RowKey::Composite),
            None => Err(KeyError::Missing),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlaceholderReference {
    pub source_user_id: i64,
    pub namespace_id: i64,
    pub model: String,
    pub user_reference_column: String,
    pub numeric_key: Option<i64>,
    pub composite_key: Option<CompositeKey>,
    pub alias_version: i32,
}

impl NewPlaceholderReference {
    #[must_use]
    pub fn numeric(source_user: &SourceUser, model: &str, column: &str, id: i64) -> Self {
        Self {
            source_user_id: source_user.id,
            namespace_id: source_user.namespace_id,
            model: model.to_string(),
            user_reference_column: column.to_string(),
            numeric_key: Some(id),
            composite_key: None,
            alias_version: crate::constants::DEFAULT_ALIAS_VERSION,
        }
    }

    #[must_use]
    pub fn composite(source_user: &SourceUser, model: &str, column: &str, key: CompositeKey) -> Self {
        Self {
            numeric_key: None,
            composite_key: Some(key),
            ..Self::numeric(source_user, model, column, 0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipTarget {
    Group(i64),
    Project(i64),
}

impl MembershipTarget {
    #[must_use]
    pub const fn source_type(&self) -> &'static str {
        match self {
            Self::Group(_) => MEMBER_SOURCE_NAMESPACE,
            Self::Project(_) => MEMBER_SOURCE_PROJECT,
        }
    }

    #[must_use]
    pub const fn source_id(&self) -> i64 {
        match self {
            Self::Group(id) | Self::Project(id) => *id,
        }
    }

    #[must_use]
    pub const fn is_project(&self) -> bool {
        matches!(self, Self::Project(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMembership {
    pub id: i64,
    pub source_user_id: i64,
    pub namespace_id: i64,
    pub group_id: Option<i64>,
    pub project_id: Option<i64>,
    pub access_level: AccessLevel,
    pub expires_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl PlaceholderMembership {
    #[must_use]
    pub fn target(&self) -> Option<MembershipTarget> {
        match (self.group_id, self.project_id) {
            (Some(group_id), None) => Some(MembershipTarget::Group(group_id)),
            (None, Some(project_id)) => Some(MembershipTarget::Project(project_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaceholderMembership {
    pub source_user_id: i64,
    pub namespace_id: i64,
    pub target: MembershipTarget,
    pub access_level: AccessLevel,
    pub expires_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingMembership {
    pub id: i64,
    pub user_id: i64,
    pub source_type: String,
    pub source_id: i64,
    pub access_level: AccessLevel,
}

impl ExistingMembership {
    #[must_use]
    pub fn is_direct_for(&self, target: MembershipTarget) -> bool {
        self.source_type == target.source_type() && self.source_id == target.source_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub user_id: i64,
    pub target: MembershipTarget,
    pub access_level: AccessLevel,
    pub created_by_id: Option<i64>,
    pub expires_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub admin: bool,
}

impl UserSummary {
    #[must_use]
    pub fn email_host(&self) -> Option<String> {
        self.email
            .rsplit_once('@')
            .map(|(_, host)| host.trim().to_ascii_lowercase())
            .filter(|host| !host.is_empty())
    }
}
