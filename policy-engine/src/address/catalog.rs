//! Address objects, address groups and the catalog that holds them

use super::range::AddrRange;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a leaf address definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressKind {
    IpNetmask,
    IpRange,
    Fqdn,
    #[serde(alias = "ip-wildcard")]
    Wildcard,
}

impl AddressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::IpNetmask => "ip-netmask",
            AddressKind::IpRange => "ip-range",
            AddressKind::Fqdn => "fqdn",
            AddressKind::Wildcard => "wildcard",
        }
    }
}

/// A named leaf address definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressObject {
    pub name: String,
    pub kind: AddressKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl AddressObject {
    pub fn new(name: impl Into<String>, kind: AddressKind, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            description: String::new(),
        }
    }

    /// Concrete range for this object, if it has one.
    ///
    /// FQDN and wildcard-mask objects never convert; neither does a
    /// netmask or range value that fails to parse.
    pub fn to_range(&self) -> Option<AddrRange> {
        match self.kind {
            AddressKind::IpNetmask => AddrRange::parse_network(&self.value),
            AddressKind::IpRange => AddrRange::parse_range(&self.value),
            AddressKind::Fqdn | AddressKind::Wildcard => None,
        }
    }
}

/// Membership of an address group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMembers {
    /// Ordered references to objects or other groups
    Static(Vec<String>),
    /// Tag filter evaluated by the firewall at runtime
    Dynamic(String),
}

/// A named set of address references
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressGroup {
    pub name: String,
    #[serde(flatten)]
    pub members: GroupMembers,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl AddressGroup {
    pub fn with_static<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: GroupMembers::Static(members.into_iter().map(Into::into).collect()),
            description: String::new(),
        }
    }

    pub fn with_filter(name: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: GroupMembers::Dynamic(filter.into()),
            description: String::new(),
        }
    }

    /// Static member names; empty for dynamic groups
    pub fn static_members(&self) -> &[String] {
        match &self.members {
            GroupMembers::Static(members) => members,
            GroupMembers::Dynamic(_) => &[],
        }
    }
}

/// Read-only, name-indexed view over the objects and groups of one scope
#[derive(Debug, Clone, Default)]
pub struct AddressCatalog {
    objects: HashMap<String, AddressObject>,
    groups: HashMap<String, AddressGroup>,
}

/// What a reference name points at
#[derive(Debug, Clone, Copy)]
pub enum CatalogEntry<'a> {
    Object(&'a AddressObject),
    Group(&'a AddressGroup),
}

impl AddressCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog; later definitions replace earlier ones of the same name
    pub fn from_parts(
        objects: impl IntoIterator<Item = AddressObject>,
        groups: impl IntoIterator<Item = AddressGroup>,
    ) -> Self {
        let mut catalog = Self::new();
        catalog.extend(objects, groups);
        catalog
    }

    pub fn extend(
        &mut self,
        objects: impl IntoIterator<Item = AddressObject>,
        groups: impl IntoIterator<Item = AddressGroup>,
    ) {
        for object in objects {
            self.insert_object(object);
        }
        for group in groups {
            self.insert_group(group);
        }
    }

    /// Replaces any object or group already using the name
    pub fn insert_object(&mut self, object: AddressObject) {
        self.groups.remove(&object.name);
        self.objects.insert(object.name.clone(), object);
    }

    /// Replaces any object or group already using the name
    pub fn insert_group(&mut self, group: AddressGroup) {
        self.objects.remove(&group.name);
        self.groups.insert(group.name.clone(), group);
    }

    /// Each name maps to at most one entry
    pub fn lookup(&self, name: &str) -> Option<CatalogEntry<'_>> {
        if let Some(group) = self.groups.get(name) {
            return Some(CatalogEntry::Group(group));
        }
        self.objects.get(name).map(CatalogEntry::Object)
    }

    pub fn object(&self, name: &str) -> Option<&AddressObject> {
        self.objects.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&AddressGroup> {
        self.groups.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name) || self.groups.contains_key(name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &AddressObject> {
        self.objects.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &AddressGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len() + self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.groups.is_empty()
    }
}
