//! Static catalogs: action taxonomy and condition types/keys.
//!
//! The catalogs are JSON data files bundled with the crate (see `data/`). They
//! are loaded once at process start into a [`Catalogs`] value, which is then
//! shared read-only (typically behind an `Arc`) by every validator and
//! authorizer. A load failure must abort startup.
//!
//! Operators can point [`PolicyConfig::catalog_dir`] at a directory holding
//! replacement files with the same names.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use base64::Engine;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::PolicyConfig;
use crate::error::CatalogError;
use crate::pattern;

const S3_ACTIONS: &str = include_str!("../data/s3_actions.json");
const IAM_ACTIONS: &str = include_str!("../data/iam_actions.json");
const CONDITION_TYPES: &str = include_str!("../data/condition_types.json");
const CONDITION_KEYS: &str = include_str!("../data/condition_keys.json");

const CONDITION_TYPES_FILE: &str = "condition_types.json";
const CONDITION_KEYS_FILE: &str = "condition_keys.json";

/// Prefix under which any custom condition key is accepted.
pub const CUSTOM_KEY_PREFIX: &str = "aws:";

/// Service whose actions a taxonomy describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// The storage service (`s3:` actions).
    S3,
    /// The identity service (`iam:` actions).
    Iam,
}

impl ServiceId {
    /// Action name prefix, without the colon.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Iam => "iam",
        }
    }

    /// File name of the action catalog.
    #[must_use]
    pub fn catalog_file(self) -> &'static str {
        match self {
            Self::S3 => "s3_actions.json",
            Self::Iam => "iam_actions.json",
        }
    }

    fn bundled_catalog(self) -> &'static str {
        match self {
            Self::S3 => S3_ACTIONS,
            Self::Iam => IAM_ACTIONS,
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Which resources an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum ActionScope {
    /// Applies to a bucket ARN without an object part.
    Bucket,
    /// Applies to an object ARN (`bucket/key`).
    Object,
    /// Not tied to a storage resource, or not a known action.
    #[default]
    Unknown,
}

/// One canonical action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    /// Canonical name, e.g. `s3:GetObject`.
    pub name: String,
    /// Resource applicability.
    pub scope: ActionScope,
    /// API operation names that are authorized as this action.
    pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActionCatalogFile {
    service: String,
    actions: BTreeMap<String, ActionEntryFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActionEntryFile {
    #[serde(default)]
    scope: ActionScope,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Canonical actions of one service.
///
/// Action names are matched case-insensitively, as IAM does.
#[derive(Debug, Clone)]
pub struct ActionTaxonomy {
    service: ServiceId,
    entries: Vec<ActionEntry>,
    by_name: HashMap<String, usize>,
    by_operation: HashMap<String, usize>,
}

impl ActionTaxonomy {
    /// Load a taxonomy from catalog JSON.
    ///
    /// # Errors
    ///
    /// Fails when the JSON is malformed, names another service, defines no
    /// actions, or contains an action without this service's prefix.
    pub fn load_from_catalog(service: ServiceId, source: &str) -> Result<Self, CatalogError> {
        let file: ActionCatalogFile =
            serde_json::from_str(source).map_err(|source| CatalogError::Parse {
                name: service.catalog_file().to_owned(),
                source,
            })?;

        if !file.service.eq_ignore_ascii_case(service.prefix()) {
            return Err(CatalogError::ForeignAction {
                action: format!("<catalog for {}>", file.service),
                service: service.prefix().to_owned(),
            });
        }
        if file.actions.is_empty() {
            return Err(CatalogError::Empty(service.catalog_file().to_owned()));
        }

        let prefix = format!("{}:", service.prefix());
        let mut entries = Vec::with_capacity(file.actions.len());
        let mut by_name = HashMap::new();
        let mut by_operation = HashMap::new();

        for (idx, (name, entry)) in file.actions.into_iter().enumerate() {
            let lower = name.to_lowercase();
            let Some(operation) = lower.strip_prefix(&prefix) else {
                return Err(CatalogError::ForeignAction {
                    action: name,
                    service: service.prefix().to_owned(),
                });
            };
            by_operation.insert(operation.to_owned(), idx);
            for alias in &entry.aliases {
                by_operation.insert(alias.to_lowercase(), idx);
            }
            by_name.insert(lower.clone(), idx);
            entries.push(ActionEntry {
                name,
                scope: entry.scope,
                aliases: entry.aliases,
            });
        }

        debug!(service = %service, actions = entries.len(), "loaded action taxonomy");
        Ok(Self {
            service,
            entries,
            by_name,
            by_operation,
        })
    }

    /// Service this taxonomy describes.
    #[must_use]
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Number of canonical actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the taxonomy has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter()
    }

    /// Every canonical action whose name matches `pattern`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ruststack_iam_policy_core::catalog::Catalogs;
    ///
    /// let catalogs = Catalogs::bundled().unwrap();
    /// let actions = catalogs.s3().all_matching_actions("s3:GetObjectAc?");
    /// assert_eq!(actions, vec!["s3:GetObjectAcl"]);
    /// ```
    #[must_use]
    pub fn all_matching_actions(&self, pattern: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| pattern::matches_ignore_case(&e.name, pattern))
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Canonical spelling of an exact action name.
    #[must_use]
    pub fn canonical_name(&self, action: &str) -> Option<&str> {
        self.by_name
            .get(&action.to_lowercase())
            .map(|&idx| self.entries[idx].name.as_str())
    }

    /// Resolve an API operation name (`HeadObject`, `GetObject`,
    /// `s3:GetObject`) to the canonical action it is authorized as.
    #[must_use]
    pub fn resolve_operation(&self, operation: &str) -> Option<&str> {
        if let Some(name) = self.canonical_name(operation) {
            return Some(name);
        }
        self.by_operation
            .get(&operation.to_lowercase())
            .map(|&idx| self.entries[idx].name.as_str())
    }

    /// Resource applicability of an exact action name.
    #[must_use]
    pub fn scope_of(&self, action: &str) -> ActionScope {
        self.by_name
            .get(&action.to_lowercase())
            .map_or(ActionScope::Unknown, |&idx| self.entries[idx].scope)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConditionTypesFile {
    condition_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConditionKeysFile {
    #[serde(rename = "GlobalKeys")]
    global_keys: Vec<String>,
    #[serde(rename = "S3Keys")]
    s3_keys: Vec<String>,
}

/// Recognized condition comparison types and condition keys.
#[derive(Debug, Clone)]
pub struct ConditionCatalog {
    types: HashSet<String>,
    key_patterns: Vec<String>,
}

impl ConditionCatalog {
    /// Load from the condition-type and condition-key catalog JSON.
    ///
    /// # Errors
    ///
    /// Fails when either document is malformed or the type list is empty.
    pub fn load_from_catalog(types_source: &str, keys_source: &str) -> Result<Self, CatalogError> {
        let types: ConditionTypesFile =
            serde_json::from_str(types_source).map_err(|source| CatalogError::Parse {
                name: CONDITION_TYPES_FILE.to_owned(),
                source,
            })?;
        let keys: ConditionKeysFile =
            serde_json::from_str(keys_source).map_err(|source| CatalogError::Parse {
                name: CONDITION_KEYS_FILE.to_owned(),
                source,
            })?;

        if types.condition_types.is_empty() {
            return Err(CatalogError::Empty(CONDITION_TYPES_FILE.to_owned()));
        }

        let key_patterns = keys
            .global_keys
            .iter()
            .chain(&keys.s3_keys)
            .map(|k| k.to_lowercase())
            .collect();

        Ok(Self {
            types: types.condition_types.into_iter().collect(),
            key_patterns,
        })
    }

    /// Whether `condition_type` is a recognized comparison type.
    #[must_use]
    pub fn is_type_valid(&self, condition_type: &str) -> bool {
        self.types.contains(condition_type)
    }

    /// Whether `key` is a known global or S3 key, or a custom `aws:` key.
    ///
    /// Keys are case-insensitive. Catalog entries may end in `/*` to cover
    /// tag-style keys such as `s3:ExistingObjectTag/<tag>`.
    #[must_use]
    pub fn is_key_valid(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        key.starts_with(CUSTOM_KEY_PREFIX)
            || self
                .key_patterns
                .iter()
                .any(|pattern| pattern::matches(&key, pattern))
    }

    /// Check condition values. Only `BinaryEquals*` values are constrained:
    /// there must be at least one and each must be base64.
    #[must_use]
    pub fn is_value_valid(&self, condition_type: &str, values: &[String]) -> bool {
        if condition_type == "BinaryEquals" || condition_type == "BinaryEqualsIfExists" {
            return !values.is_empty()
                && values
                    .iter()
                    .all(|v| base64::engine::general_purpose::STANDARD.decode(v).is_ok());
        }
        true
    }
}

/// All static tables the engine reads.
#[derive(Debug, Clone)]
pub struct Catalogs {
    s3: ActionTaxonomy,
    iam: ActionTaxonomy,
    conditions: ConditionCatalog,
}

impl Catalogs {
    /// Catalogs compiled into the crate.
    ///
    /// # Errors
    ///
    /// Fails only if the bundled data files are broken.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_sources(
            ServiceId::S3.bundled_catalog(),
            ServiceId::Iam.bundled_catalog(),
            CONDITION_TYPES,
            CONDITION_KEYS,
        )
    }

    /// Load the catalogs selected by `config`: the configured directory, or
    /// the bundled data when none is set.
    ///
    /// # Errors
    ///
    /// Fails when a file cannot be read or parsed.
    pub fn load(config: &PolicyConfig) -> Result<Self, CatalogError> {
        let dir = config.catalog_dir.as_deref().map(Path::new);
        let catalogs = Self::from_sources(
            &read_source(dir, ServiceId::S3)?,
            &read_source(dir, ServiceId::Iam)?,
            &read_file(dir, CONDITION_TYPES_FILE, CONDITION_TYPES)?,
            &read_file(dir, CONDITION_KEYS_FILE, CONDITION_KEYS)?,
        )?;
        info!(
            source = dir.map_or_else(|| "bundled".to_owned(), |d| d.display().to_string()),
            s3_actions = catalogs.s3.len(),
            iam_actions = catalogs.iam.len(),
            "loaded policy catalogs"
        );
        Ok(catalogs)
    }

    fn from_sources(
        s3: &str,
        iam: &str,
        condition_types: &str,
        condition_keys: &str,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            s3: ActionTaxonomy::load_from_catalog(ServiceId::S3, s3)?,
            iam: ActionTaxonomy::load_from_catalog(ServiceId::Iam, iam)?,
            conditions: ConditionCatalog::load_from_catalog(condition_types, condition_keys)?,
        })
    }

    /// Storage-service actions.
    #[must_use]
    pub fn s3(&self) -> &ActionTaxonomy {
        &self.s3
    }

    /// Identity-service actions.
    #[must_use]
    pub fn iam(&self) -> &ActionTaxonomy {
        &self.iam
    }

    /// Taxonomy for a service.
    #[must_use]
    pub fn taxonomy(&self, service: ServiceId) -> &ActionTaxonomy {
        match service {
            ServiceId::S3 => &self.s3,
            ServiceId::Iam => &self.iam,
        }
    }

    /// Condition types and keys.
    #[must_use]
    pub fn conditions(&self) -> &ConditionCatalog {
        &self.conditions
    }

    /// Canonical actions of any service matching `pattern`.
    #[must_use]
    pub fn all_matching_actions(&self, pattern: &str) -> Vec<&str> {
        let mut actions = self.s3.all_matching_actions(pattern);
        actions.extend(self.iam.all_matching_actions(pattern));
        actions
    }
}

fn read_source(
    dir: Option<&Path>,
    service: ServiceId,
) -> Result<Cow<'static, str>, CatalogError> {
    read_file(dir, service.catalog_file(), service.bundled_catalog())
}

fn read_file(
    dir: Option<&Path>,
    file: &str,
    bundled: &'static str,
) -> Result<Cow<'static, str>, CatalogError> {
    let Some(dir) = dir else {
        return Ok(Cow::Borrowed(bundled));
    };
    let path = dir.join(file);
    std::fs::read_to_string(&path)
        .map(Cow::Owned)
        .map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })
}
