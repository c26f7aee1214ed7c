//! Configuration schema types

use crate::check::{AddressMode, ApplicationDefault, EngineOptions};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Complete inspector configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InspectorConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Device groups to analyse; empty means all of them
    #[serde(default)]
    pub device_groups: Vec<String>,
}

/// Settings consumed by the shadowing engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Compare addresses by resolved value instead of by name
    #[serde(default)]
    pub resolve_addresses: bool,
    #[serde(default)]
    pub application_default: ApplicationDefault,
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            address_mode: if self.resolve_addresses {
                AddressMode::Advanced
            } else {
                AddressMode::Basic
            },
            application_default: self.application_default,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
    /// Also list rules that are not shadowed
    #[serde(default)]
    pub show_clear: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Toml,
    /// One row per (shadowed rule, shadowing rule) pair
    Csv,
}

impl std::str::FromStr for ReportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "toml" => Ok(ReportFormat::Toml),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(ValidationError::InvalidOption {
                option: "format",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InspectorConfig::default();
        assert_eq!(config.engine.options(), EngineOptions::basic());
        assert_eq!(config.report.format, ReportFormat::Text);
        assert!(config.device_groups.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
device_groups = ["branch"]

[engine]
resolve_addresses = true
application_default = "broad"

[report]
format = "json"
show_clear = true
"#;

        let config: InspectorConfig = toml::from_str(toml_str).unwrap();
        let options = config.engine.options();
        assert_eq!(options.address_mode, AddressMode::Advanced);
        assert_eq!(options.application_default, ApplicationDefault::Broad);
        assert_eq!(config.report.format, ReportFormat::Json);
        assert_eq!(config.device_groups, vec!["branch"]);
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("csv".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert!("html".parse::<ReportFormat>().is_err());
    }
}
