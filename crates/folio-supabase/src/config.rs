//! Connection settings for the hosted row store

use folio_api::{ApiError, CollectionKind};
use folio_core::Result;
use serde::{Deserialize, Serialize};

pub const ENV_URL: &str = "SUPABASE_URL";
pub const ENV_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";

/// Names the hosted frontend build exposes; read when the plain ones are unset
const ENV_PUBLIC_URL: &str = "NEXT_PUBLIC_SUPABASE_URL";
const ENV_PUBLIC_ANON_KEY: &str = "NEXT_PUBLIC_SUPABASE_ANON_KEY";

/// Remote table per collection kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub skills: String,
    pub experiences: String,
    pub education: String,
    pub certificates: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            skills: CollectionKind::Skills.table_name().to_string(),
            experiences: CollectionKind::Experiences.table_name().to_string(),
            education: CollectionKind::Education.table_name().to_string(),
            certificates: CollectionKind::Certificates.table_name().to_string(),
        }
    }
}

impl TableNames {
    pub fn get(&self, kind: CollectionKind) -> &str {
        match kind {
            CollectionKind::Skills => &self.skills,
            CollectionKind::Experiences => &self.experiences,
            CollectionKind::Education => &self.education,
            CollectionKind::Certificates => &self.certificates,
        }
    }
}

/// Configuration for the PostgREST endpoint of a Supabase project
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Sent both as `apikey` and as the bearer token
    pub api_key: String,
    pub schema: String,
    pub tables: TableNames,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            schema: "public".to_string(),
            tables: TableNames::default(),
        }
    }
}

// Keep the key out of logs
impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("schema", &self.schema)
            .field("tables", &self.tables)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read the URL and key from the process environment.
    ///
    /// The service-role key wins over the anon key.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_with(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override `url` and `api_key` with any environment variables that are set.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(url) = first(&[ENV_URL, ENV_PUBLIC_URL]) {
            self.url = url;
        }
        if let Some(key) = first(&[ENV_SERVICE_ROLE_KEY, ENV_ANON_KEY, ENV_PUBLIC_ANON_KEY]) {
            self.api_key = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ApiError::invalid(format!(
                "Supabase URL is not configured (set {})",
                ENV_URL
            )));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ApiError::invalid(format!(
                "Supabase URL must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(ApiError::invalid(format!(
                "Supabase API key is not configured (set {} or {})",
                ENV_SERVICE_ROLE_KEY, ENV_ANON_KEY
            )));
        }
        Ok(())
    }

    /// Base of the REST API, without a trailing slash
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url.trim_end_matches('/'))
    }
}
