//! Per-dimension coverage checks and the registry that assembles them

pub mod dimensions;

use crate::address::resolver::ResolvedAddressSet;
use crate::error::ValidationError;
use crate::rule::{RuleField, SecurityRule};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How address references are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMode {
    /// Compare reference names only
    #[default]
    Basic,
    /// Resolve references to ranges and compare by containment
    Advanced,
}

/// Treatment of `application-default` in a preceding rule's services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationDefault {
    /// An ordinary service name; only matches itself
    #[default]
    Opaque,
    /// Covers any later service set, like `any`
    Broad,
}

impl std::str::FromStr for ApplicationDefault {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opaque" => Ok(ApplicationDefault::Opaque),
            "broad" => Ok(ApplicationDefault::Broad),
            _ => Err(ValidationError::InvalidOption {
                option: "application-default",
                value: s.to_string(),
            }),
        }
    }
}

/// Everything the engine reads from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineOptions {
    #[serde(default)]
    pub address_mode: AddressMode,
    #[serde(default)]
    pub application_default: ApplicationDefault,
}

impl EngineOptions {
    pub fn basic() -> Self {
        Self::default()
    }

    pub fn advanced() -> Self {
        Self {
            address_mode: AddressMode::Advanced,
            ..Self::default()
        }
    }

    pub fn with_application_default(mut self, policy: ApplicationDefault) -> Self {
        self.application_default = policy;
        self
    }
}

/// One matching dimension of a security rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Action,
    SourceZone,
    DestinationZone,
    SourceAddress,
    DestinationAddress,
    Application,
    Service,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Action,
        Dimension::SourceZone,
        Dimension::DestinationZone,
        Dimension::SourceAddress,
        Dimension::DestinationAddress,
        Dimension::Application,
        Dimension::Service,
    ];

    /// Stable identifier used in reports
    pub fn id(&self) -> &'static str {
        match self {
            Dimension::Action => "action",
            Dimension::SourceZone => "source-zone",
            Dimension::DestinationZone => "destination-zone",
            Dimension::SourceAddress => "source-address",
            Dimension::DestinationAddress => "destination-address",
            Dimension::Application => "application",
            Dimension::Service => "service",
        }
    }

    /// Rule attribute this dimension inspects
    pub fn field(&self) -> RuleField {
        match self {
            Dimension::Action => RuleField::Action,
            Dimension::SourceZone => RuleField::SourceZones,
            Dimension::DestinationZone => RuleField::DestinationZones,
            Dimension::SourceAddress => RuleField::SourceAddresses,
            Dimension::DestinationAddress => RuleField::DestinationAddresses,
            Dimension::Application => RuleField::Applications,
            Dimension::Service => RuleField::Services,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Result of one dimension check, kept for explainability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub dimension: Dimension,
    pub covers: bool,
    pub reason: String,
}

impl CheckOutcome {
    pub fn pass(dimension: Dimension, reason: impl Into<String>) -> Self {
        Self {
            dimension,
            covers: true,
            reason: reason.into(),
        }
    }

    pub fn fail(dimension: Dimension, reason: impl Into<String>) -> Self {
        Self {
            dimension,
            covers: false,
            reason: reason.into(),
        }
    }
}

/// A rule together with its resolved addresses (advanced mode only)
#[derive(Debug, Clone)]
pub struct PreparedRule<'r> {
    pub rule: &'r SecurityRule,
    pub source: Option<ResolvedAddressSet>,
    pub destination: Option<ResolvedAddressSet>,
}

impl<'r> PreparedRule<'r> {
    pub fn basic(rule: &'r SecurityRule) -> Self {
        Self {
            rule,
            source: None,
            destination: None,
        }
    }
}

/// Signature shared by every dimension check: (preceding, later, options)
pub type CheckFn = fn(&PreparedRule<'_>, &PreparedRule<'_>, &EngineOptions) -> CheckOutcome;

/// Fixed, ordered set of checks selected by the engine options
#[derive(Clone)]
pub struct CheckRegistry {
    checks: Vec<(Dimension, CheckFn)>,
    options: EngineOptions,
}

impl CheckRegistry {
    pub fn for_options(options: &EngineOptions) -> Self {
        let (source_address, destination_address): (CheckFn, CheckFn) = match options.address_mode {
            AddressMode::Basic => (
                dimensions::check_source_address_by_name as CheckFn,
                dimensions::check_destination_address_by_name as CheckFn,
            ),
            AddressMode::Advanced => (
                dimensions::check_source_address_by_value as CheckFn,
                dimensions::check_destination_address_by_value as CheckFn,
            ),
        };

        let checks: Vec<(Dimension, CheckFn)> = vec![
            (Dimension::Action, dimensions::check_action as CheckFn),
            (Dimension::SourceZone, dimensions::check_source_zone as CheckFn),
            (Dimension::DestinationZone, dimensions::check_destination_zone as CheckFn),
            (Dimension::SourceAddress, source_address),
            (Dimension::DestinationAddress, destination_address),
            (Dimension::Application, dimensions::check_application as CheckFn),
            (Dimension::Service, dimensions::check_service as CheckFn),
        ];

        Self {
            checks,
            options: *options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.checks.iter().map(|(dimension, _)| *dimension)
    }

    /// Run every check for the pair, in registry order
    pub fn run(&self, preceding: &PreparedRule<'_>, later: &PreparedRule<'_>) -> Vec<CheckOutcome> {
        self.checks
            .iter()
            .map(|(_, check)| check(preceding, later, &self.options))
            .collect()
    }
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.dimensions().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}
