//! Controller JSON export format.
//!
//! Entries are keyed by `@name` and list values are wrapped as
//! `{"member": [...]}`. Rules carry no explicit position; their index is the
//! 1-based position in the exported rulebase.

use super::bundle::{PolicyBundle, Scope};
use crate::address::catalog::{AddressGroup, AddressKind, AddressObject, GroupMembers};
use crate::rule::{Action, RuleField, SecurityRule};
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct MemberList {
    #[serde(default)]
    member: Vec<String>,
}

impl MemberList {
    fn names(list: Option<MemberList>) -> Option<Vec<String>> {
        list.map(|list| list.member)
    }
}

#[derive(Debug, Deserialize)]
struct ExportRule {
    #[serde(rename = "@name")]
    name: String,
    #[serde(default)]
    from: Option<MemberList>,
    #[serde(default)]
    to: Option<MemberList>,
    #[serde(default)]
    source: Option<MemberList>,
    #[serde(default)]
    destination: Option<MemberList>,
    #[serde(default)]
    application: Option<MemberList>,
    #[serde(default)]
    service: Option<MemberList>,
    #[serde(default)]
    action: Action,
    #[serde(default)]
    disabled: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ExportAddress {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "ip-netmask")]
    ip_netmask: Option<String>,
    #[serde(rename = "ip-range")]
    ip_range: Option<String>,
    fqdn: Option<String>,
    #[serde(rename = "ip-wildcard")]
    ip_wildcard: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct DynamicFilter {
    filter: String,
}

#[derive(Debug, Deserialize)]
struct ExportGroup {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "static")]
    static_members: Option<MemberList>,
    dynamic: Option<DynamicFilter>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExportScope {
    #[serde(default)]
    address_objects: Vec<ExportAddress>,
    #[serde(default)]
    address_groups: Vec<ExportGroup>,
    #[serde(default)]
    security_rules: Vec<ExportRule>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportBundle {
    #[serde(default)]
    shared: ExportScope,
    #[serde(default)]
    device_groups: IndexMap<String, ExportScope>,
}

impl ExportBundle {
    pub fn into_bundle(self) -> PolicyBundle {
        PolicyBundle {
            shared: convert_scope("shared", self.shared),
            device_groups: self
                .device_groups
                .into_iter()
                .map(|(name, scope)| {
                    let scope = convert_scope(&name, scope);
                    (name, scope)
                })
                .collect(),
        }
    }
}

fn convert_scope(location: &str, scope: ExportScope) -> Scope {
    let address_objects = scope
        .address_objects
        .into_iter()
        .filter_map(|entry| {
            let name = entry.name.clone();
            let object = convert_address(entry);
            if object.is_none() {
                tracing::warn!("{}: address object {} has no supported type, skipped", location, name);
            }
            object
        })
        .collect();

    let address_groups = scope.address_groups.into_iter().map(convert_group).collect();

    let rules = scope
        .security_rules
        .into_iter()
        .enumerate()
        .map(|(position, entry)| convert_rule(position as u32 + 1, entry))
        .collect();

    Scope {
        address_objects,
        address_groups,
        rules,
    }
}

fn convert_address(entry: ExportAddress) -> Option<AddressObject> {
    let (kind, value) = if let Some(value) = entry.ip_netmask {
        (AddressKind::IpNetmask, value)
    } else if let Some(value) = entry.ip_range {
        (AddressKind::IpRange, value)
    } else if let Some(value) = entry.fqdn {
        (AddressKind::Fqdn, value)
    } else if let Some(value) = entry.ip_wildcard {
        (AddressKind::Wildcard, value)
    } else {
        return None;
    };

    Some(AddressObject {
        name: entry.name,
        kind,
        value,
        description: entry.description,
    })
}

fn convert_group(entry: ExportGroup) -> AddressGroup {
    // A group exported with neither form is treated as an empty static group
    let members = match (entry.static_members, entry.dynamic) {
        (Some(list), _) => GroupMembers::Static(list.member),
        (None, Some(dynamic)) => GroupMembers::Dynamic(dynamic.filter),
        (None, None) => GroupMembers::Static(Vec::new()),
    };

    AddressGroup {
        name: entry.name,
        members,
        description: entry.description,
    }
}

fn convert_rule(index: u32, entry: ExportRule) -> SecurityRule {
    let enabled = !matches!(entry.disabled.as_deref(), Some("yes") | Some("true"));

    let mut rule = SecurityRule::new(entry.name, index).with_action(entry.action);
    rule.enabled = enabled;
    rule.description = entry.description;
    rule.set_members(RuleField::SourceZones, MemberList::names(entry.from));
    rule.set_members(RuleField::DestinationZones, MemberList::names(entry.to));
    rule.set_members(RuleField::SourceAddresses, MemberList::names(entry.source));
    rule.set_members(RuleField::DestinationAddresses, MemberList::names(entry.destination));
    rule.set_members(RuleField::Applications, MemberList::names(entry.application));
    rule.set_members(RuleField::Services, MemberList::names(entry.service));
    rule
}
