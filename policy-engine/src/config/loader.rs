//! Configuration and policy file loading

use super::bundle::PolicyBundle;
use super::panos::ExportBundle;
use super::schema::InspectorConfig;
use super::spreadsheet::CsvSources;
use crate::error::{EngineError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Find the settings file by checking environment and standard locations
    pub fn find_config() -> Option<PathBuf> {
        // 1. $POLICY_INSPECTOR_CONFIG
        if let Ok(path) = env::var("POLICY_INSPECTOR_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        // 2. $XDG_CONFIG_HOME/policy-inspector/config.toml
        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            let p = PathBuf::from(xdg).join("policy-inspector/config.toml");
            if p.exists() {
                return Some(p);
            }
        }

        // 3. ~/.config/policy-inspector/config.toml
        if let Ok(home) = env::var("HOME") {
            let p = PathBuf::from(home).join(".config/policy-inspector/config.toml");
            if p.exists() {
                return Some(p);
            }
        }

        None
    }

    /// Load config from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<InspectorConfig> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| EngineError::ConfigLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let config: InspectorConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load config from optional path, then standard locations, then defaults
    /// Priority: Explicit path > User config > Built-in defaults
    pub fn load_or_default(path: Option<PathBuf>) -> Result<InspectorConfig> {
        if let Some(p) = path {
            return Self::load_from_file(p);
        }

        match Self::find_config() {
            Some(p) => {
                tracing::debug!("Loading config from {:?}", p);
                Self::load_from_file(p)
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(InspectorConfig::default())
            }
        }
    }
}

pub struct PolicyLoader;

impl PolicyLoader {
    /// Load a policy bundle, picking the format from the file extension
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<PolicyBundle> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let bundle = match extension.as_deref() {
            Some("toml") => Self::parse_toml(&Self::read(path)?)?,
            Some("json") => Self::parse_json(&Self::read(path)?)?,
            Some("csv") => CsvSources::new(path).load()?,
            _ => {
                return Err(EngineError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        tracing::info!(
            "Loaded {} device groups with {} rules from {}",
            bundle.device_groups.len(),
            bundle.rule_count(),
            path.display()
        );
        Ok(bundle)
    }

    fn read(path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|source| EngineError::ConfigLoad {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Native TOML layout
    pub fn parse_toml(contents: &str) -> Result<PolicyBundle> {
        Ok(toml::from_str(contents)?)
    }

    /// Controller JSON export layout
    pub fn parse_json(contents: &str) -> Result<PolicyBundle> {
        let export: ExportBundle = serde_json::from_str(contents)?;
        Ok(export.into_bundle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::AddressMode;
    use std::io::Write;

    const BUNDLE_TOML: &str = r#"
[[shared.address_objects]]
name = "web"
kind = "ip-netmask"
value = "10.0.0.0/24"

[device_groups.branch]

[[device_groups.branch.address_groups]]
name = "web-tier"
static = ["web"]

[[device_groups.branch.rules]]
name = "allow-web"
index = 1
source_zones = ["trust"]
destination_addresses = ["web-tier"]
applications = ["web-browsing"]

[[device_groups.branch.rules]]
name = "deny-rest"
index = 2
action = "deny"
"#;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_bundle() {
        let file = write_temp(".toml", BUNDLE_TOML);
        let bundle = PolicyLoader::load_from_file(file.path()).unwrap();

        assert_eq!(bundle.shared.address_objects.len(), 1);
        let branch = bundle.scope("branch").unwrap();
        assert_eq!(branch.rules.len(), 2);
        assert_eq!(branch.rules[1].name, "deny-rest");
        assert!(branch.rules[1].source_zones.is_any());
    }

    #[test]
    fn test_load_json_bundle() {
        let json = r#"{"device_groups": {"dg1": {"security_rules": [{"@name": "r1"}]}}}"#;
        let file = write_temp(".json", json);
        let bundle = PolicyLoader::load_from_file(file.path()).unwrap();

        assert_eq!(bundle.scope("dg1").unwrap().rules[0].index, 1);
    }

    #[test]
    fn test_load_csv_rules() {
        let file = write_temp(".csv", "Name,Application\nweb,web-browsing\nssl,ssl\n");
        let bundle = PolicyLoader::load_from_file(file.path()).unwrap();

        let (name, scope) = bundle.device_groups.first().unwrap();
        assert_eq!(Some(name.as_str()), file.path().file_stem().and_then(|s| s.to_str()));
        assert_eq!(scope.rules[1].index, 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".xml", "<config/>\n");
        let result = PolicyLoader::load_from_file(file.path());
        assert!(matches!(result, Err(EngineError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = PolicyLoader::load_from_file("/nonexistent/policy.toml");
        assert!(matches!(result, Err(EngineError::ConfigLoad { .. })));
    }

    #[test]
    fn test_load_config_file() {
        let file = write_temp(".toml", "[engine]\nresolve_addresses = true\n");
        let config = ConfigLoader::load_or_default(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.engine.options().address_mode, AddressMode::Advanced);
    }
}
