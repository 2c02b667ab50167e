use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use super::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tenant directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tenant directory {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
}

/// One entry of the tenant directory file, keyed by domain
///
/// ```json
/// {
///   "school-a.example.com": {
///     "schoolCode": "2001",
///     "connectionString": "postgres://user:pass@db:5432/school_a",
///     "description": "School A"
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantEntry {
    #[serde(default)]
    pub school_code: Option<String>,
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Everything needed to open a tenant's database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantTarget {
    pub domain: String,
    pub database: String,
    /// `None` when no server URL is configured (memory backend)
    #[serde(skip_serializing)]
    pub connection_string: Option<String>,
    pub school_code: Option<String>,
    /// true when the domain is listed in the directory file
    pub configured: bool,
}

/// Domain -> tenant database mapping
#[derive(Debug, Clone, Default)]
pub struct TenantDirectory {
    entries: HashMap<String, TenantEntry>,
    base_url: Option<String>,
}

impl TenantDirectory {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            entries: HashMap::new(),
            base_url,
        }
    }

    pub fn with_entries(entries: HashMap<String, TenantEntry>, base_url: Option<String>) -> Self {
        let entries = entries
            .into_iter()
            .filter_map(|(domain, entry)| Self::normalize_domain(&domain).map(|d| (d, entry)))
            .collect();
        Self { entries, base_url }
    }

    /// Load the directory JSON file
    pub fn load(path: impl AsRef<Path>, base_url: Option<String>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let entries: HashMap<String, TenantEntry> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        Ok(Self::with_entries(entries, base_url))
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ConfigError> {
        match &config.tenants_file {
            Some(path) => Self::load(path, config.url.clone()),
            None => Ok(Self::new(config.url.clone())),
        }
    }

    pub fn entry(&self, domain: &str) -> Option<&TenantEntry> {
        Self::normalize_domain(domain).and_then(|d| self.entries.get(&d))
    }

    /// Configured domains, sorted
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        domains.sort_unstable();
        domains
    }

    /// Trim and lowercase a domain; `None` if empty or containing characters
    /// outside `[a-z0-9.:_-]`
    pub fn normalize_domain(raw: &str) -> Option<String> {
        let domain = raw.trim().to_ascii_lowercase();
        if domain.is_empty() || domain.len() > 253 {
            return None;
        }
        let valid = domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_'));
        valid.then_some(domain)
    }

    /// Resolve the database target for an already-normalized domain
    pub fn target_for(&self, domain: &str) -> Result<TenantTarget, ConfigError> {
        match self.entries.get(domain) {
            Some(entry) => {
                let connection_string = match &entry.connection_string {
                    Some(cs) => Some(cs.clone()),
                    None => match (&self.base_url, &entry.database) {
                        (Some(base), Some(db)) => Some(Self::swap_database(base, db)?),
                        (Some(base), None) => {
                            Some(Self::swap_database(base, &Self::derive_database_name(domain))?)
                        }
                        (None, _) => None,
                    },
                };
                let database = entry
                    .database
                    .clone()
                    .or_else(|| connection_string.as_deref().and_then(Self::database_from_url))
                    .unwrap_or_else(|| Self::derive_database_name(domain));

                Ok(TenantTarget {
                    domain: domain.to_string(),
                    database,
                    connection_string,
                    school_code: entry.school_code.clone(),
                    configured: true,
                })
            }
            None => {
                let database = Self::derive_database_name(domain);
                let connection_string = match &self.base_url {
                    Some(base) => Some(Self::swap_database(base, &database)?),
                    None => None,
                };
                Ok(TenantTarget {
                    domain: domain.to_string(),
                    database,
                    connection_string,
                    school_code: None,
                    configured: false,
                })
            }
        }
    }

    /// Hash a domain to a stable database name
    pub fn derive_database_name(domain: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        // First 16 hex characters keep the name well under identifier limits
        format!("tenant_{}", &hash[..16])
    }

    fn swap_database(base: &str, database: &str) -> Result<String, ConfigError> {
        let mut url =
            url::Url::parse(base).map_err(|_| ConfigError::InvalidDatabaseUrl(base.to_string()))?;
        url.set_path(&format!("/{}", database));
        Ok(url.into())
    }

    fn database_from_url(connection_string: &str) -> Option<String> {
        let url = url::Url::parse(connection_string).ok()?;
        let name = url.path().trim_start_matches('/');
        (!name.is_empty()).then(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> TenantDirectory {
        let mut entries = HashMap::new();
        entries.insert(
            "School-A.Example.com".to_string(),
            TenantEntry {
                school_code: Some("2001".to_string()),
                connection_string: Some("postgres://u:p@db:5432/school_a?sslmode=disable".to_string()),
                ..Default::default()
            },
        );
        entries.insert(
            "school-b.example.com".to_string(),
            TenantEntry {
                school_code: Some("2002".to_string()),
                database: Some("school_b".to_string()),
                ..Default::default()
            },
        );
        TenantDirectory::with_entries(entries, Some("postgres://u:p@localhost:5432/postgres".to_string()))
    }

    #[test]
    fn normalizes_domains() {
        assert_eq!(
            TenantDirectory::normalize_domain("  LocalHost:3000 "),
            Some("localhost:3000".to_string())
        );
        assert_eq!(TenantDirectory::normalize_domain(""), None);
        assert_eq!(TenantDirectory::normalize_domain("bad domain"), None);
        assert_eq!(TenantDirectory::normalize_domain("x/../y"), None);
    }

    #[test]
    fn configured_entry_uses_its_connection_string() {
        let dir = directory();
        let target = dir.target_for("school-a.example.com").unwrap();
        assert!(target.configured);
        assert_eq!(target.database, "school_a");
        assert_eq!(target.school_code.as_deref(), Some("2001"));
        assert_eq!(
            target.connection_string.as_deref(),
            Some("postgres://u:p@db:5432/school_a?sslmode=disable")
        );
    }

    #[test]
    fn configured_entry_with_database_swaps_base_path() {
        let target = directory().target_for("school-b.example.com").unwrap();
        assert_eq!(target.database, "school_b");
        assert_eq!(
            target.connection_string.as_deref(),
            Some("postgres://u:p@localhost:5432/school_b")
        );
    }

    #[test]
    fn unknown_domain_gets_derived_database() {
        let target = directory().target_for("unknown.example.com").unwrap();
        assert!(!target.configured);
        assert!(target.database.starts_with("tenant_"));
        assert_eq!(target.database.len(), "tenant_".len() + 16);
        assert_eq!(
            target.database,
            TenantDirectory::derive_database_name("unknown.example.com")
        );
        assert!(target
            .connection_string
            .unwrap()
            .ends_with(&format!("/{}", target.database)));
    }

    #[test]
    fn memory_directory_has_no_connection_string() {
        let target = TenantDirectory::new(None).target_for("localhost:3000").unwrap();
        assert_eq!(target.connection_string, None);
    }

    #[test]
    fn rejects_bad_base_url() {
        let dir = TenantDirectory::new(Some("not a url".to_string()));
        assert!(matches!(
            dir.target_for("localhost"),
            Err(ConfigError::InvalidDatabaseUrl(_))
        ));
    }
}
