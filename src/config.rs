use crate::generator::GeneratorOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sidebar configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SidebarConfig {
    /// Show chains of single-folder directories as one row (`a/b/c`)
    #[serde(default = "default_true")]
    pub compress_singleton_folder: bool,

    /// Modifier that turns a folder click into a recursive expand/collapse
    #[serde(default)]
    pub recursive_toggle_folder: RecursiveToggleModifier,

    /// Token passed to the data source with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Click modifier for recursive folder toggling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecursiveToggleModifier {
    #[default]
    Shift,
    Alt,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            compress_singleton_folder: true,
            recursive_toggle_folder: RecursiveToggleModifier::default(),
            access_token: None,
        }
    }
}

impl From<&SidebarConfig> for GeneratorOptions {
    fn from(config: &SidebarConfig) -> Self {
        Self {
            compress_singleton_folder: config.compress_singleton_folder,
        }
    }
}

impl SidebarConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: SidebarConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file, only saving fields that differ from defaults
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let current =
            serde_json::to_value(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let defaults = serde_json::to_value(Self::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        let diff = json_diff(&defaults, &current);

        let contents = serde_json::to_string_pretty(&diff)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path.as_ref(), contents)?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(token) = &self.access_token {
            if token.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "access_token cannot be blank".to_string(),
                ));
            }
            if token.chars().any(char::is_whitespace) {
                return Err(ConfigError::Validation(
                    "access_token cannot contain whitespace".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Returns only the parts of `current` that differ from `defaults`
fn json_diff(defaults: &serde_json::Value, current: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match (defaults, current) {
        (Value::Object(def_map), Value::Object(cur_map)) => {
            let mut result = serde_json::Map::new();
            for (key, cur_val) in cur_map {
                match def_map.get(key) {
                    Some(def_val) => {
                        let diff = json_diff(def_val, cur_val);
                        if !is_empty_diff(&diff) {
                            result.insert(key.clone(), diff);
                        }
                    }
                    None => {
                        result.insert(key.clone(), cur_val.clone());
                    }
                }
            }
            Value::Object(result)
        }
        _ if defaults == current => Value::Object(serde_json::Map::new()),
        _ => current.clone(),
    }
}

fn is_empty_diff(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::Object(map) if map.is_empty())
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SidebarConfig::default();
        assert!(config.compress_singleton_folder);
        assert_eq!(config.recursive_toggle_folder, RecursiveToggleModifier::Shift);
        assert!(config.access_token.is_none());
        assert!(GeneratorOptions::from(&config).compress_singleton_folder);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config: SidebarConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SidebarConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SidebarConfig::default();
        assert!(config.validate().is_ok());

        config.access_token = Some("   ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.access_token = Some("ghp_abc def".to_string());
        assert!(config.validate().is_err());

        config.access_token = Some("ghp_abcdef".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("sidebar.json");

        let config = SidebarConfig {
            compress_singleton_folder: false,
            recursive_toggle_folder: RecursiveToggleModifier::Alt,
            access_token: Some("token".to_string()),
        };
        config.save_to_file(&config_path).unwrap();

        let loaded = SidebarConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_only_writes_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("sidebar.json");

        let config = SidebarConfig {
            recursive_toggle_folder: RecursiveToggleModifier::Alt,
            ..Default::default()
        };
        config.save_to_file(&config_path).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(saved, serde_json::json!({ "recursive_toggle_folder": "alt" }));
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            SidebarConfig::load_from_file(&missing),
            Err(ConfigError::Io(_))
        ));

        let broken = temp_dir.path().join("broken.json");
        std::fs::write(&broken, r#"{ "recursive_toggle_folder": "ctrl" }"#).unwrap();
        assert!(matches!(
            SidebarConfig::load_from_file(&broken),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(SidebarConfig)).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("compress_singleton_folder"));
        assert!(properties.contains_key("recursive_toggle_folder"));
    }
}
