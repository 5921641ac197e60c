//! Model Reference Registry.
//!
//! Maps a domain model name to the table holding its rows and to the ordered
//! list of columns on that table which store a user reference. The registry is
//! built once, validated structurally on construction, and then verified against
//! the live schema so that every registered column leads some index.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::models::RowKey;
use crate::services::IndexCatalog;

const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub composite_key_columns: Vec<String>,
    /// Single-table-inheritance subtypes stored in the same table.
    #[serde(default)]
    pub subtypes: Vec<String>,
    /// Set when the model is itself a subtype; such entries are rejected.
    #[serde(default)]
    pub inherits_from: Option<String>,
}

impl ModelEntry {
    #[must_use]
    pub fn new(model: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            model: model.to_string(),
            table: table.to_string(),
            primary_key: default_primary_key(),
            columns: columns.iter().map(|column| (*column).to_string()).collect(),
            composite_key_columns: Vec::new(),
            subtypes: Vec::new(),
            inherits_from: None,
        }
    }

    #[must_use]
    pub fn without_primary_key(mut self, key_columns: &[&str]) -> Self {
        self.primary_key = None;
        self.composite_key_columns = key_columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_subtypes(mut self, subtypes: &[&str]) -> Self {
        self.subtypes = subtypes.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|candidate| candidate == column)
    }

    /// Checks that a row key can address this model's table. Composite keys may
    /// only name columns the entry knows about.
    pub fn check_key(&self, key: &RowKey) -> Result<(), String> {
        match key {
            RowKey::Id(_) if self.primary_key.is_some() => Ok(()),
            RowKey::Id(_) => Err(format!(
                "{} has no primary key, a composite key is required",
                self.model
            )),
            RowKey::Composite(key) => {
                for column in key.columns() {
                    let known = self.primary_key.as_deref() == Some(column)
                        || self.composite_key_columns.iter().any(|c| c == column)
                        || self.has_column(column);
                    if !known || !is_safe_identifier(column) {
                        return Err(format!(
                            "{column} is not a key column of {}",
                            self.model
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

fn default_primary_key() -> Option<String> {
    Some("id".to_string())
}

/// A renamed model (and optionally renamed columns) for references recorded
/// under an older alias version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAlias {
    pub model: String,
    pub version: i32,
    pub target: String,
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub aliases: Vec<ModelAlias>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid identifier {value:?} in model {model}")]
    InvalidIdentifier { model: String, value: String },
    #[error("model {0} registers no user reference columns")]
    NoColumns(String),
    #[error("model {model} registers column {column} more than once")]
    DuplicateColumn { model: String, column: String },
    #[error("model name {0} is registered more than once")]
    DuplicateModel(String),
    #[error("model {model} is a subtype of {base}; register the base model only")]
    SubtypeRegistered { model: String, base: String },
    #[error("models {first} and {second} share table {table}; register the base model only")]
    SharedTable {
        table: String,
        first: String,
        second: String,
    },
    #[error("model {0} has neither a primary key nor composite key columns")]
    NoRowIdentity(String),
    #[error("alias {model} (version {version}) points at unknown model {target}")]
    UnknownAliasTarget {
        model: String,
        version: i32,
        target: String,
    },
    #[error("alias {model} (version {version}) maps to unregistered column {column}")]
    UnknownAliasColumn {
        model: String,
        version: i32,
        column: String,
    },
    #[error("unindexed user reference columns: {}", .0.join(", "))]
    Unindexed(Vec<String>),
    #[error("index catalog failed for table {table}: {message}")]
    Catalog { table: String, message: String },
    #[error("registry file invalid: {0}")]
    File(String),
}

/// Why a stored model/column pair could not be mapped onto the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    UnknownModel { model: String, version: i32 },
    UnknownColumn { model: String, column: String },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownModel { model, version } => write!(
                f,
                "ALIASES must be extended to include {model} for version {version}"
            ),
            Self::UnknownColumn { model, column } => {
                write!(f, "{column} is not a registered user reference column of {model}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedColumn<'a> {
    pub entry: &'a ModelEntry,
    pub column: &'a str,
}

#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    Found(ResolvedColumn<'a>),
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    by_name: HashMap<String, usize>,
    aliases: HashMap<(String, i32), ModelAlias>,
}

impl ModelRegistry {
    pub fn new(entries: Vec<ModelEntry>, aliases: Vec<ModelAlias>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::new();
        let mut by_table: HashMap<&str, &str> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            validate_entry(entry)?;
            if let Some(first) = by_table.insert(&entry.table, &entry.model) {
                return Err(RegistryError::SharedTable {
                    table: entry.table.clone(),
                    first: first.to_string(),
                    second: entry.model.clone(),
                });
            }
            for name in std::iter::once(&entry.model).chain(entry.subtypes.iter()) {
                if by_name.insert(name.clone(), index).is_some() {
                    return Err(RegistryError::DuplicateModel(name.clone()));
                }
            }
        }

        let mut alias_map = HashMap::new();
        for alias in aliases {
            let Some(&index) = by_name.get(&alias.target) else {
                return Err(RegistryError::UnknownAliasTarget {
                    model: alias.model,
                    version: alias.version,
                    target: alias.target,
                });
            };
            if let Some(column) = alias
                .columns
                .values()
                .find(|column| !entries[index].has_column(column))
            {
                return Err(RegistryError::UnknownAliasColumn {
                    model: alias.model.clone(),
                    version: alias.version,
                    column: column.clone(),
                });
            }
            alias_map.insert((alias.model.clone(), alias.version), alias);
        }

        Ok(Self {
            entries,
            by_name,
            aliases: alias_map,
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            serde_yaml::from_str(contents).map_err(|err| RegistryError::File(err.to_string()))?;
        Self::new(file.models, file.aliases)
    }

    /// The models and columns known to hold user references in the default schema.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(
            vec![
                ModelEntry::new(
                    "MergeRequest",
                    "merge_requests",
                    &["author_id", "updated_by_id", "merge_user_id", "last_edited_by_id"],
                ),
                ModelEntry::new("Approval", "approvals", &["user_id"]),
                ModelEntry::new(
                    "Issue",
                    "issues",
                    &["author_id", "updated_by_id", "closed_by_id", "last_edited_by_id"],
                )
                .with_subtypes(&["WorkItem"]),
                ModelEntry::new("IssueAssignee", "issue_assignees", &["user_id"])
                    .without_primary_key(&["issue_id", "user_id"]),
                ModelEntry::new(
                    "Note",
                    "notes",
                    &["author_id", "updated_by_id", "resolved_by_id"],
                )
                .with_subtypes(&["DiffNote", "DiscussionNote", "LegacyDiffNote"]),
                ModelEntry::new("CommitStatus", "ci_builds", &["user_id"]).with_subtypes(&[
                    "Ci::Build",
                    "Ci::Bridge",
                    "GenericCommitStatus",
                ]),
                ModelEntry::new("Event", "events", &["author_id"]),
            ],
            Vec::new(),
        )
    }

    pub fn entries(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entries.iter()
    }

    /// Every registered (model, column) pair, in registration order.
    pub fn pairs(&self) -> impl Iterator<Item = ResolvedColumn<'_>> {
        self.entries.iter().flat_map(|entry| {
            entry
                .columns
                .iter()
                .map(move |column| ResolvedColumn { entry, column })
        })
    }

    #[must_use]
    pub fn entry(&self, model: &str) -> Option<&ModelEntry> {
        self.by_name.get(model).map(|&index| &self.entries[index])
    }

    #[must_use]
    pub fn columns_for(&self, model: &str) -> Option<&[String]> {
        self.entry(model).map(|entry| entry.columns.as_slice())
    }

    #[must_use]
    pub fn resolve(&self, model: &str, column: &str, alias_version: i32) -> Resolution<'_> {
        let (entry, column) = match self.aliases.get(&(model.to_string(), alias_version)) {
            Some(alias) => {
                let column = alias
                    .columns
                    .get(column)
                    .map_or(column, String::as_str);
                (self.entry(&alias.target), column)
            }
            None => (self.entry(model), column),
        };
        let Some(entry) = entry else {
            return Resolution::Unresolved(UnresolvedReason::UnknownModel {
                model: model.to_string(),
                version: alias_version,
            });
        };
        match entry.columns.iter().find(|candidate| *candidate == column) {
            Some(column) => Resolution::Found(ResolvedColumn { entry, column }),
            None => Resolution::Unresolved(UnresolvedReason::UnknownColumn {
                model: entry.model.clone(),
                column: column.to_string(),
            }),
        }
    }

    /// Checks every registered column against the schema's indexes.
    pub async fn verify(self, catalog: &dyn IndexCatalog) -> Result<VerifiedRegistry, RegistryError> {
        let mut unindexed = Vec::new();
        for entry in &self.entries {
            let leading: HashSet<String> = catalog
                .leading_index_columns(&entry.table)
                .await
                .map_err(|err| RegistryError::Catalog {
                    table: entry.table.clone(),
                    message: err.to_string(),
                })?
                .into_iter()
                .collect();
            for column in &entry.columns {
                if !leading.contains(column) {
                    unindexed.push(format!("{}.{} ({})", entry.model, column, entry.table));
                }
            }
        }
        if !unindexed.is_empty() {
            return Err(RegistryError::Unindexed(unindexed));
        }
        tracing::debug!(
            event = "registry_verified",
            models = self.entries.len(),
            "Model reference registry verified"
        );
        Ok(VerifiedRegistry(self))
    }
}

/// A registry whose columns were confirmed to be index-backed.
#[derive(Debug, Clone)]
pub struct VerifiedRegistry(ModelRegistry);

impl Deref for VerifiedRegistry {
    type Target = ModelRegistry;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn validate_entry(entry: &ModelEntry) -> Result<(), RegistryError> {
    if let Some(base) = entry.inherits_from.as_ref() {
        return Err(RegistryError::SubtypeRegistered {
            model: entry.model.clone(),
            base: base.clone(),
        });
    }
    if entry.columns.is_empty() {
        return Err(RegistryError::NoColumns(entry.model.clone()));
    }
    if entry.primary_key.is_none() && entry.composite_key_columns.is_empty() {
        return Err(RegistryError::NoRowIdentity(entry.model.clone()));
    }
    let identifiers = std::iter::once(&entry.table)
        .chain(entry.primary_key.iter())
        .chain(entry.columns.iter())
        .chain(entry.composite_key_columns.iter());
    for value in identifiers {
        if !is_safe_identifier(value) {
            return Err(RegistryError::InvalidIdentifier {
                model: entry.model.clone(),
                value: value.clone(),
            });
        }
    }
    let mut seen = HashSet::new();
    for column in &entry.columns {
        if !seen.insert(column.as_str()) {
            return Err(RegistryError::DuplicateColumn {
                model: entry.model.clone(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// Lowercase SQL identifiers only; these get interpolated into statements.
#[must_use]
pub fn is_safe_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompositeKey;
    use crate::services::StoreError;
    use async_trait::async_trait;
    use proptest::prelude::*;

    struct FakeCatalog(HashMap<&'static str, Vec<&'static str>>);

    #[async_trait]
    impl IndexCatalog for FakeCatalog {
        async fn leading_index_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
            Ok(self
                .0
                .get(table)
                .map(|columns| columns.iter().map(|c| (*c).to_string()).collect())
                .unwrap_or_default())
        }
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::builtin().expect("builtin registry")
    }

    #[test]
    fn builtin_registry_lists_columns_in_order() {
        let registry = registry();
        assert_eq!(
            registry.columns_for("Issue").expect("issue"),
            ["author_id", "updated_by_id", "closed_by_id", "last_edited_by_id"]
        );
        let pairs: Vec<(String, String)> = registry
            .pairs()
            .filter(|pair| pair.entry.model == "Note")
            .map(|pair| (pair.entry.table.clone(), pair.column.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("notes".to_string(), "author_id".to_string()),
                ("notes".to_string(), "updated_by_id".to_string()),
                ("notes".to_string(), "resolved_by_id".to_string()),
            ]
        );
    }

    #[test]
    fn subtypes_resolve_to_their_base_model() {
        let registry = registry();
        let Resolution::Found(found) = registry.resolve("Ci::Build", "user_id", 1) else {
            panic!("expected Ci::Build to resolve");
        };
        assert_eq!(found.entry.model, "CommitStatus");
        assert_eq!(found.entry.table, "ci_builds");
    }

    #[test]
    fn unknown_model_and_column_are_values_not_errors() {
        let registry = registry();
        let Resolution::Unresolved(reason) = registry.resolve("NoSuchModel", "user_id", 1) else {
            panic!("expected unresolved model");
        };
        assert_eq!(
            reason.to_string(),
            "ALIASES must be extended to include NoSuchModel for version 1"
        );
        let Resolution::Unresolved(reason) = registry.resolve("Issue", "assignee_id", 1) else {
            panic!("expected unresolved column");
        };
        assert!(matches!(reason, UnresolvedReason::UnknownColumn { .. }));
    }

    #[test]
    fn aliases_map_old_names_and_columns() {
        let alias = ModelAlias {
            model: "OldModel".to_string(),
            version: 1,
            target: "MergeRequest".to_string(),
            columns: BTreeMap::from([("olduser_id".to_string(), "author_id".to_string())]),
        };
        let base = registry();
        let registry = ModelRegistry::new(base.entries().cloned().collect(), vec![alias])
            .expect("registry with alias");
        let Resolution::Found(found) = registry.resolve("OldModel", "olduser_id", 1) else {
            panic!("expected alias to resolve");
        };
        assert_eq!(found.entry.model, "MergeRequest");
        assert_eq!(found.column, "author_id");
        assert!(matches!(
            registry.resolve("OldModel", "olduser_id", 2),
            Resolution::Unresolved(UnresolvedReason::UnknownModel { .. })
        ));
    }

    #[test]
    fn subtype_entries_are_rejected() {
        let mut entry = ModelEntry::new("Ci::Build", "ci_builds", &["user_id"]);
        entry.inherits_from = Some("CommitStatus".to_string());
        let err = ModelRegistry::new(vec![entry], Vec::new()).expect_err("subtype rejected");
        assert!(matches!(err, RegistryError::SubtypeRegistered { .. }));
    }

    #[test]
    fn structural_violations_are_rejected() {
        let err = ModelRegistry::new(
            vec![ModelEntry::new("Issue", "issues", &["author_id", "author_id"])],
            Vec::new(),
        )
        .expect_err("duplicate column");
        assert!(matches!(err, RegistryError::DuplicateColumn { .. }));

        let err = ModelRegistry::new(
            vec![ModelEntry::new("Issue", "issues; drop table users", &["author_id"])],
            Vec::new(),
        )
        .expect_err("bad identifier");
        assert!(matches!(err, RegistryError::InvalidIdentifier { .. }));

        let err = ModelRegistry::new(
            vec![
                ModelEntry::new("Issue", "issues", &["author_id"]).with_subtypes(&["Note"]),
                ModelEntry::new("Note", "notes", &["author_id"]),
            ],
            Vec::new(),
        )
        .expect_err("duplicate model name");
        assert!(matches!(err, RegistryError::DuplicateModel(name) if name == "Note"));
    }

    #[test]
    fn models_sharing_a_table_are_rejected() {
        let err = ModelRegistry::from_yaml(
            r#"
models:
  - model: Note
    table: notes
    columns: [author_id]
  - model: DiffNote
    table: notes
    columns: [author_id]
"#,
        )
        .expect_err("shared table");
        match err {
            RegistryError::SharedTable {
                table,
                first,
                second,
            } => {
                assert_eq!(table, "notes");
                assert_eq!(first, "Note");
                assert_eq!(second, "DiffNote");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn registry_loads_from_yaml() {
        let registry = ModelRegistry::from_yaml(
            r#"
models:
  - model: Approval
    table: approvals
    columns: [user_id]
  - model: IssueAssignee
    table: issue_assignees
    primary_key: ~
    composite_key_columns: [issue_id, user_id]
    columns: [user_id]
aliases:
  - model: MergeRequestApproval
    version: 1
    target: Approval
"#,
        )
        .expect("yaml registry");
        assert!(registry.entry("IssueAssignee").expect("entry").primary_key.is_none());
        assert!(matches!(
            registry.resolve("MergeRequestApproval", "user_id", 1),
            Resolution::Found(_)
        ));
    }

    #[test]
    fn composite_keys_must_name_known_columns() {
        let registry = registry();
        let entry = registry.entry("IssueAssignee").expect("entry");
        let good = CompositeKey::new().with("issue_id", 1).with("user_id", 2);
        assert!(entry.check_key(&RowKey::Composite(good)).is_ok());
        let bad = CompositeKey::new().with("project_id", 1);
        assert!(entry.check_key(&RowKey::Composite(bad)).is_err());
        assert!(entry.check_key(&RowKey::Id(1)).is_err());
    }

    #[tokio::test]
    async fn verify_reports_every_unindexed_column() {
        let registry = ModelRegistry::new(
            vec![
                ModelEntry::new("Issue", "issues", &["author_id", "closed_by_id"]),
                ModelEntry::new("Approval", "approvals", &["user_id"]),
            ],
            Vec::new(),
        )
        .expect("registry");
        let catalog = FakeCatalog(HashMap::from([
            ("issues", vec!["author_id"]),
            ("approvals", vec!["merge_request_id"]),
        ]));
        let err = registry.verify(&catalog).await.expect_err("unindexed");
        let RegistryError::Unindexed(columns) = err else {
            panic!("expected unindexed error");
        };
        assert_eq!(
            columns,
            vec![
                "Issue.closed_by_id (issues)".to_string(),
                "Approval.user_id (approvals)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn verify_accepts_fully_indexed_registry() {
        let registry =
            ModelRegistry::new(vec![ModelEntry::new("Event", "events", &["author_id"])], Vec::new())
                .expect("registry");
        let catalog = FakeCatalog(HashMap::from([("events", vec!["author_id", "project_id"])]));
        let verified = registry.verify(&catalog).await.expect("verified");
        assert!(verified.entry("Event").is_some());
    }

    proptest! {
        #[test]
        fn safe_identifiers_never_contain_sql_punctuation(value in "\\PC{0,80}") {
            if is_safe_identifier(&value) {
                prop_assert!(value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
                prop_assert!(value.len() <= MAX_IDENTIFIER_LEN);
            }
        }
    }
}
