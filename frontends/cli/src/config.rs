use anyhow::Result;
use folio::StoreConfig;
use folio_supabase::SupabaseConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings file for `folio-admin`
///
/// ```yaml
/// supabase:
///   url: https://xyz.supabase.co
///   schema: public
///   tables:
///     skills: skills
/// store:
///   request_timeout_secs: 15
///   refresh_after_mutation: true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub supabase: SupabaseConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML {}: {}", path.display(), e))?;

        Ok(config)
    }

    /// File settings (if any), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.supabase.apply_env();
        Ok(config)
    }
}
