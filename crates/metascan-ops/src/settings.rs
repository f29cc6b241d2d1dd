//! Persistent user settings for scans.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use metascan_core::FilterBuilder;
use serde::{Deserialize, Serialize};

use crate::config::ConfigurationBuilder;
use crate::error::{OpsError, OpsResult};
use crate::scanner::{scanner_by_name, Scanner};
use crate::serializer::SerializerKind;

/// Environment variable overriding [`ScanSettings::threads`].
pub const ENV_THREADS: &str = "METASCAN_THREADS";
/// Environment variable overriding [`ScanSettings::format`].
pub const ENV_FORMAT: &str = "METASCAN_FORMAT";
/// Environment variable overriding [`ScanSettings::include`] (comma separated).
pub const ENV_INCLUDE: &str = "METASCAN_INCLUDE";
/// Environment variable overriding [`ScanSettings::exclude`] (comma separated).
pub const ENV_EXCLUDE: &str = "METASCAN_EXCLUDE";

/// Keys accepted by [`ScanSettings::get`] and [`ScanSettings::set`].
pub const KEYS: &[&str] = &["threads", "format", "scanners", "include", "exclude"];

/// Settings stored in `settings.json` under the user config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Worker threads; 1 means sequential, 0 means one per available core.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Serialization format for saved stores.
    #[serde(default = "default_format")]
    pub format: String,

    /// Active scanner names.
    #[serde(default = "default_scanner_names")]
    pub scanners: Vec<String>,

    /// Package prefixes to include.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Package prefixes to exclude.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

fn default_threads() -> usize {
    1
}

fn default_format() -> String {
    SerializerKind::default().to_string()
}

fn default_scanner_names() -> Vec<String> {
    vec![
        metascan_core::SUB_TYPES.to_string(),
        metascan_core::TYPE_ANNOTATIONS.to_string(),
    ]
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            format: default_format(),
            scanners: default_scanner_names(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl ScanSettings {
    /// Load settings from the user config file with environment overrides.
    pub fn load() -> OpsResult<Self> {
        let settings = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.with_overrides(|name| std::env::var(name).ok())
    }

    /// Load settings from an explicit file, without environment overrides.
    pub fn load_from(path: &Path) -> OpsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|err| {
            OpsError::Settings(format!("Invalid settings file {}: {}", path.display(), err))
        })
    }

    /// Apply overrides looked up by variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> OpsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in [
            (ENV_THREADS, "threads"),
            (ENV_FORMAT, "format"),
            (ENV_INCLUDE, "include"),
            (ENV_EXCLUDE, "exclude"),
        ] {
            if let Some(value) = lookup(var) {
                self.set(key, &value)?;
            }
        }
        Ok(self)
    }

    /// Save settings to the user config file.
    pub fn save(&self) -> OpsResult<()> {
        match Self::config_file_path() {
            Some(path) => self.save_to(&path),
            None => Err(OpsError::Settings(
                "No config directory available on this platform".to_string(),
            )),
        }
    }

    pub fn save_to(&self, path: &Path) -> OpsResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the settings file.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "metascan", "metascan")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Get a setting by key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "threads" => Some(self.threads.to_string()),
            "format" => Some(self.format.clone()),
            "scanners" => Some(self.scanners.join(",")),
            "include" => Some(self.include.join(",")),
            "exclude" => Some(self.exclude.join(",")),
            _ => None,
        }
    }

    /// Set a setting by key. List values are comma separated.
    pub fn set(&mut self, key: &str, value: &str) -> OpsResult<()> {
        match key {
            "threads" => {
                self.threads = value
                    .trim()
                    .parse()
                    .map_err(|_| OpsError::Settings(format!("Invalid number: {}", value)))?;
            }
            "format" => {
                let kind: SerializerKind = value
                    .trim()
                    .parse()
                    .map_err(|err: OpsError| OpsError::Settings(err.to_string()))?;
                self.format = kind.to_string();
            }
            "scanners" => {
                let names = split_list(value);
                if let Some(unknown) = names.iter().find(|n| scanner_by_name(n).is_none()) {
                    return Err(OpsError::Settings(format!("Unknown scanner: {}", unknown)));
                }
                self.scanners = names;
            }
            "include" => self.include = split_list(value),
            "exclude" => self.exclude = split_list(value),
            _ => {
                return Err(OpsError::Settings(format!("Unknown settings key: {}", key)));
            }
        }
        Ok(())
    }

    /// Restore one key, or every key when `None`, to its default.
    pub fn reset(&mut self, key: Option<&str>) -> OpsResult<()> {
        let defaults = Self::default();
        match key {
            None => *self = defaults,
            Some(key) => {
                let value = defaults
                    .get(key)
                    .ok_or_else(|| OpsError::Settings(format!("Unknown settings key: {}", key)))?;
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    pub fn serializer_kind(&self) -> OpsResult<SerializerKind> {
        self.format.parse()
    }

    /// Translate the settings into a builder for a scan configuration.
    pub fn to_builder(&self) -> OpsResult<ConfigurationBuilder> {
        let scanners = self
            .scanners
            .iter()
            .map(|name| {
                scanner_by_name(name)
                    .ok_or_else(|| OpsError::configuration(format!("Unknown scanner: {}", name)))
            })
            .collect::<OpsResult<Vec<std::sync::Arc<dyn Scanner>>>>()?;

        let mut filter = FilterBuilder::new();
        for prefix in &self.include {
            filter = filter.include_package(prefix);
        }
        for prefix in &self.exclude {
            filter = filter.exclude_package(prefix);
        }

        let builder = ConfigurationBuilder::new()
            .set_scanners(scanners)
            .filter_inputs_by(filter.build())
            .set_serializer(self.serializer_kind()?.serializer());

        Ok(match self.threads {
            0 => builder.use_parallel_executor_auto(),
            1 => builder,
            n => builder.use_parallel_executor(n),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionStrategy;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings: ScanSettings = serde_json::from_str(r#"{"threads": 4}"#).unwrap();
        assert_eq!(settings.threads, 4);
        assert_eq!(settings.format, "xml");
        assert_eq!(settings.scanners, vec!["SubTypes", "TypeAnnotations"]);
    }

    #[test]
    fn test_get_set_reset() {
        let mut settings = ScanSettings::default();
        settings.set("include", "com.acme, org.example").unwrap();
        assert_eq!(settings.get("include").unwrap(), "com.acme,org.example");

        settings.set("format", "JSON").unwrap();
        assert_eq!(settings.get("format").unwrap(), "json");

        assert!(settings.set("threads", "many").is_err());
        assert!(settings.set("format", "yaml").is_err());
        assert!(settings.set("scanners", "SubTypes,Methods").is_err());
        assert!(settings.set("colour", "blue").is_err());
        assert!(settings.get("colour").is_none());

        settings.reset(Some("format")).unwrap();
        assert_eq!(settings.format, "xml");
        assert_eq!(settings.include.len(), 2);
        settings.reset(None).unwrap();
        assert_eq!(settings, ScanSettings::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_THREADS, "3"), (ENV_EXCLUDE, "com.acme.internal")]
            .into_iter()
            .collect();
        let settings = ScanSettings::default()
            .with_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.threads, 3);
        assert_eq!(settings.exclude, vec!["com.acme.internal"]);
        assert_eq!(settings.format, "xml");

        let err = ScanSettings::default()
            .with_overrides(|name| (name == ENV_FORMAT).then(|| "toml".to_string()))
            .unwrap_err();
        assert!(matches!(err, OpsError::Settings(_)));
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/settings.json");
        let mut settings = ScanSettings::default();
        settings.set("threads", "8").unwrap();
        settings.save_to(&path).unwrap();

        assert_eq!(ScanSettings::load_from(&path).unwrap(), settings);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ScanSettings::load_from(&path),
            Err(OpsError::Settings(_))
        ));
    }

    #[test]
    fn test_to_builder() {
        let mut settings = ScanSettings::default();
        settings.set("threads", "4").unwrap();
        settings.set("scanners", "typeannotations").unwrap();
        settings.set("exclude", "com.acme.internal").unwrap();

        let config = settings.to_builder().unwrap().build().unwrap();
        assert_eq!(config.strategy(), ExecutionStrategy::Parallel { workers: 4 });
        assert_eq!(config.scanner_names().collect::<Vec<_>>(), vec!["TypeAnnotations"]);
        assert!(config.filter().accepts("com.acme.Api"));
        assert!(!config.filter().accepts("com.acme.internal.Impl"));
    }
}
