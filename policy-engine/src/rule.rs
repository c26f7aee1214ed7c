//! Security rule model

use crate::address::resolver::ANY;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Token that tells the firewall to use each application's standard ports
pub const APPLICATION_DEFAULT: &str = "application-default";

/// A set of names, or the `any` wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Members {
    Any,
    Named(BTreeSet<String>),
}

impl Members {
    pub fn any() -> Self {
        Members::Any
    }

    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from(names.into_iter().map(Into::into).collect::<Vec<String>>())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Members::Any)
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Members::Any => name.eq_ignore_ascii_case(ANY),
            Members::Named(names) => names.contains(name),
        }
    }

    /// Names in sorted order; `any` for the wildcard
    pub fn names(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Members::Any => Box::new(std::iter::once(ANY)),
            Members::Named(names) => Box::new(names.iter().map(String::as_str)),
        }
    }

    /// Whether every member of `self` is matched by `other`
    pub fn is_covered_by(&self, other: &Members) -> bool {
        match (self, other) {
            (_, Members::Any) => true,
            (Members::Any, Members::Named(_)) => false,
            (Members::Named(mine), Members::Named(theirs)) => mine.is_subset(theirs),
        }
    }

    /// Names of `self` that `other` does not match
    pub fn missing_from(&self, other: &Members) -> Vec<String> {
        match (self, other) {
            (_, Members::Any) => Vec::new(),
            (Members::Any, Members::Named(_)) => vec![ANY.to_string()],
            (Members::Named(mine), Members::Named(theirs)) => {
                mine.difference(theirs).cloned().collect()
            }
        }
    }
}

impl Default for Members {
    fn default() -> Self {
        Members::Any
    }
}

/// An empty list reads as `any`, the same as an absent one
impl From<Vec<String>> for Members {
    fn from(names: Vec<String>) -> Self {
        if names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(ANY)) {
            Members::Any
        } else {
            Members::Named(names.into_iter().collect())
        }
    }
}

impl From<Members> for Vec<String> {
    fn from(members: Members) -> Self {
        match members {
            Members::Any => vec![ANY.to_string()],
            Members::Named(names) => names.into_iter().collect(),
        }
    }
}

impl fmt::Display for Members {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        write!(f, "{}", names.join(", "))
    }
}

/// What the firewall does with matching traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    #[default]
    Allow,
    Deny,
    Drop,
    ResetClient,
    ResetServer,
    ResetBoth,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Drop => "drop",
            Action::ResetClient => "reset-client",
            Action::ResetServer => "reset-server",
            Action::ResetBoth => "reset-both",
        }
    }
}

/// Accepts the names used by controller exports, in any case
impl std::str::FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            "drop" => Ok(Action::Drop),
            "reset-client" => Ok(Action::ResetClient),
            "reset-server" => Ok(Action::ResetServer),
            "reset-both" => Ok(Action::ResetBoth),
            _ => Err(ValidationError::InvalidOption {
                option: "action",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// One ordered security rule of a device group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "RuleRecord")]
pub struct SecurityRule {
    pub name: String,
    /// Evaluation position; strictly increasing within a device group
    pub index: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub source_zones: Members,
    #[serde(default)]
    pub destination_zones: Members,
    #[serde(default)]
    pub source_addresses: Members,
    #[serde(default)]
    pub destination_addresses: Members,
    #[serde(default)]
    pub applications: Members,
    #[serde(default)]
    pub services: Members,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Member fields that were given as an empty list
    #[serde(skip)]
    pub empty_lists: Vec<RuleField>,
}

/// On-disk shape of a rule, before empty lists are folded into `any`
#[derive(Deserialize)]
struct RuleRecord {
    name: String,
    index: u32,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    action: Action,
    source_zones: Option<Vec<String>>,
    destination_zones: Option<Vec<String>>,
    source_addresses: Option<Vec<String>>,
    destination_addresses: Option<Vec<String>>,
    applications: Option<Vec<String>>,
    services: Option<Vec<String>>,
    #[serde(default)]
    description: String,
}

impl From<RuleRecord> for SecurityRule {
    fn from(record: RuleRecord) -> Self {
        let mut rule = SecurityRule::new(record.name, record.index);
        rule.enabled = record.enabled;
        rule.action = record.action;
        rule.description = record.description;
        rule.set_members(RuleField::SourceZones, record.source_zones);
        rule.set_members(RuleField::DestinationZones, record.destination_zones);
        rule.set_members(RuleField::SourceAddresses, record.source_addresses);
        rule.set_members(RuleField::DestinationAddresses, record.destination_addresses);
        rule.set_members(RuleField::Applications, record.applications);
        rule.set_members(RuleField::Services, record.services);
        rule
    }
}

impl SecurityRule {
    /// Enabled allow rule matching everything
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            enabled: true,
            action: Action::Allow,
            source_zones: Members::Any,
            destination_zones: Members::Any,
            source_addresses: Members::Any,
            destination_addresses: Members::Any,
            applications: Members::Any,
            services: Members::Any,
            description: String::new(),
            empty_lists: Vec::new(),
        }
    }

    /// Set a member field from a loaded list; `None` keeps `any`.
    /// An empty list also reads as `any` and is remembered in `empty_lists`.
    pub fn set_members(&mut self, field: RuleField, names: Option<Vec<String>>) {
        let Some(names) = names else {
            return;
        };
        if names.is_empty() {
            self.empty_lists.push(field);
        }

        let members = Members::from(names);
        match field {
            RuleField::SourceZones => self.source_zones = members,
            RuleField::DestinationZones => self.destination_zones = members,
            RuleField::SourceAddresses => self.source_addresses = members,
            RuleField::DestinationAddresses => self.destination_addresses = members,
            RuleField::Applications => self.applications = members,
            RuleField::Services => self.services = members,
            RuleField::Name | RuleField::Index | RuleField::Enabled | RuleField::Action => {}
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_zones(mut self, source: Members, destination: Members) -> Self {
        self.source_zones = source;
        self.destination_zones = destination;
        self
    }

    pub fn with_addresses(mut self, source: Members, destination: Members) -> Self {
        self.source_addresses = source;
        self.destination_addresses = destination;
        self
    }

    pub fn with_applications(mut self, applications: Members) -> Self {
        self.applications = applications;
        self
    }

    pub fn with_services(mut self, services: Members) -> Self {
        self.services = services;
        self
    }

    /// Render one attribute for reports
    pub fn field(&self, field: RuleField) -> String {
        match field {
            RuleField::Name => self.name.clone(),
            RuleField::Index => self.index.to_string(),
            RuleField::Enabled => self.enabled.to_string(),
            RuleField::Action => self.action.to_string(),
            RuleField::SourceZones => self.source_zones.to_string(),
            RuleField::DestinationZones => self.destination_zones.to_string(),
            RuleField::SourceAddresses => self.source_addresses.to_string(),
            RuleField::DestinationAddresses => self.destination_addresses.to_string(),
            RuleField::Applications => self.applications.to_string(),
            RuleField::Services => self.services.to_string(),
        }
    }
}

/// Attributes of a security rule, in report column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Name,
    Index,
    Enabled,
    Action,
    SourceZones,
    DestinationZones,
    SourceAddresses,
    DestinationAddresses,
    Applications,
    Services,
}

impl RuleField {
    pub const ALL: [RuleField; 10] = [
        RuleField::Name,
        RuleField::Index,
        RuleField::Enabled,
        RuleField::Action,
        RuleField::SourceZones,
        RuleField::DestinationZones,
        RuleField::SourceAddresses,
        RuleField::DestinationAddresses,
        RuleField::Applications,
        RuleField::Services,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RuleField::Name => "Name",
            RuleField::Index => "Index",
            RuleField::Enabled => "Enabled",
            RuleField::Action => "Action",
            RuleField::SourceZones => "Source Zones",
            RuleField::DestinationZones => "Destination Zones",
            RuleField::SourceAddresses => "Source Addresses",
            RuleField::DestinationAddresses => "Destination Addresses",
            RuleField::Applications => "Applications",
            RuleField::Services => "Services",
        }
    }
}
