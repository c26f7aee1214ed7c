//! Spreadsheet (CSV) exports.
//!
//! One file each for rules, address objects and address groups, all loaded
//! into a single device group. List cells hold `;`-separated names. Rules
//! carry no index column; a rule's index is its 1-based row number.

use super::bundle::{PolicyBundle, Scope};
use crate::address::catalog::{AddressGroup, AddressKind, AddressObject, GroupMembers};
use crate::error::{EngineError, Result};
use crate::rule::{RuleField, SecurityRule};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const LIST_SEPARATOR: char = ';';

/// Rule columns holding member lists
const MEMBER_COLUMNS: [(&str, RuleField); 6] = [
    ("Source Zone", RuleField::SourceZones),
    ("Destination Zone", RuleField::DestinationZones),
    ("Source Address", RuleField::SourceAddresses),
    ("Destination Address", RuleField::DestinationAddresses),
    ("Application", RuleField::Applications),
    ("Service", RuleField::Services),
];

#[derive(Debug, Deserialize)]
struct RuleRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Source Zone", default)]
    source_zones: String,
    #[serde(rename = "Destination Zone", default)]
    destination_zones: String,
    #[serde(rename = "Source Address", default)]
    source_addresses: String,
    #[serde(rename = "Destination Address", default)]
    destination_addresses: String,
    #[serde(rename = "Application", default)]
    applications: String,
    #[serde(rename = "Service", default)]
    services: String,
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(rename = "Disabled", default)]
    disabled: String,
    #[serde(rename = "Description", default)]
    description: String,
}

impl RuleRow {
    /// A column missing from the header leaves the field at `any`; a blank
    /// cell in a present column is an empty list
    fn into_rule(self, index: u32, columns: &HashSet<String>) -> Result<SecurityRule> {
        let mut rule = SecurityRule::new(self.name, index);
        rule.description = self.description;
        rule.enabled = !matches!(self.disabled.to_ascii_lowercase().as_str(), "yes" | "true");
        if !self.action.is_empty() {
            rule.action = self.action.parse()?;
        }

        let cells = [
            self.source_zones,
            self.destination_zones,
            self.source_addresses,
            self.destination_addresses,
            self.applications,
            self.services,
        ];
        for ((column, field), cell) in MEMBER_COLUMNS.iter().zip(cells) {
            let names = columns.contains(*column).then(|| split_list(&cell));
            rule.set_members(*field, names);
        }
        Ok(rule)
    }
}

#[derive(Debug, Deserialize)]
struct ObjectRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Description", default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct GroupRow {
    #[serde(rename = "Name")]
    name: String,
    /// `Static` (the default) or `Dynamic`
    #[serde(rename = "Type", default)]
    kind: String,
    /// Members of a static group, or the filter of a dynamic one
    #[serde(rename = "Addresses", default)]
    addresses: String,
    #[serde(rename = "Description", default)]
    description: String,
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn object_kind(label: &str) -> Option<AddressKind> {
    match label.to_ascii_lowercase().as_str() {
        "ip address" | "ip netmask" | "ip-netmask" => Some(AddressKind::IpNetmask),
        "ip range" | "ip-range" => Some(AddressKind::IpRange),
        "fqdn" => Some(AddressKind::Fqdn),
        "ip wildcard mask" | "ip-wildcard" => Some(AddressKind::Wildcard),
        _ => None,
    }
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| EngineError::ConfigLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a rules sheet
pub fn parse_rules<R: Read>(input: R) -> Result<Vec<SecurityRule>> {
    let mut reader = reader(input);
    let columns: HashSet<String> = reader.headers()?.iter().map(str::to_string).collect();

    reader
        .deserialize::<RuleRow>()
        .enumerate()
        .map(|(row, record)| record?.into_rule(row as u32 + 1, &columns))
        .collect()
}

/// Parse an address object sheet; rows of an unknown type are skipped
pub fn parse_address_objects<R: Read>(input: R) -> Result<Vec<AddressObject>> {
    let mut objects = Vec::new();
    for record in reader(input).deserialize::<ObjectRow>() {
        let row = record?;
        let Some(kind) = object_kind(&row.kind) else {
            tracing::warn!("Address object {} has unsupported type '{}', skipped", row.name, row.kind);
            continue;
        };

        let mut object = AddressObject::new(row.name, kind, row.address);
        object.description = row.description;
        objects.push(object);
    }
    Ok(objects)
}

/// Parse an address group sheet
pub fn parse_address_groups<R: Read>(input: R) -> Result<Vec<AddressGroup>> {
    reader(input)
        .deserialize::<GroupRow>()
        .map(|record| {
            let row = record?;
            let members = if row.kind.eq_ignore_ascii_case("dynamic") {
                GroupMembers::Dynamic(row.addresses)
            } else {
                GroupMembers::Static(split_list(&row.addresses))
            };
            Ok(AddressGroup {
                name: row.name,
                members,
                description: row.description,
            })
        })
        .collect()
}

/// Set of CSV files describing one device group
#[derive(Debug, Clone)]
pub struct CsvSources {
    pub device_group: String,
    pub rules: PathBuf,
    pub address_objects: Option<PathBuf>,
    pub address_groups: Option<PathBuf>,
}

impl CsvSources {
    /// Rules only; the device group is named after the file stem
    pub fn new(rules: impl Into<PathBuf>) -> Self {
        let rules = rules.into();
        let device_group = rules
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("default")
            .to_string();

        Self {
            device_group,
            rules,
            address_objects: None,
            address_groups: None,
        }
    }

    pub fn with_device_group(mut self, name: impl Into<String>) -> Self {
        self.device_group = name.into();
        self
    }

    pub fn with_address_objects(mut self, path: impl Into<PathBuf>) -> Self {
        self.address_objects = Some(path.into());
        self
    }

    pub fn with_address_groups(mut self, path: impl Into<PathBuf>) -> Self {
        self.address_groups = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<PolicyBundle> {
        let rules = parse_rules(open(&self.rules)?)?;
        let address_objects = match &self.address_objects {
            Some(path) => parse_address_objects(open(path)?)?,
            None => Vec::new(),
        };
        let address_groups = match &self.address_groups {
            Some(path) => parse_address_groups(open(path)?)?,
            None => Vec::new(),
        };

        let mut bundle = PolicyBundle::default();
        bundle.device_groups.insert(
            self.device_group.clone(),
            Scope {
                address_objects,
                address_groups,
                rules,
            },
        );
        Ok(bundle)
    }
}
