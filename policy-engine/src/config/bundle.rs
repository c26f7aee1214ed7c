//! Policy bundles: rules and address catalogs grouped by device group

use crate::address::catalog::{AddressCatalog, AddressGroup, AddressObject};
use crate::error::{EngineError, Result};
use crate::evaluator::{ShadowEvaluator, ShadowReport};
use crate::rule::SecurityRule;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Objects, groups and rules defined at one location
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Scope {
    #[serde(default)]
    pub address_objects: Vec<AddressObject>,
    #[serde(default)]
    pub address_groups: Vec<AddressGroup>,
    #[serde(default)]
    pub rules: Vec<SecurityRule>,
}

/// Everything loaded from one policy export
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PolicyBundle {
    /// Objects and groups visible from every device group
    #[serde(default)]
    pub shared: Scope,
    #[serde(default)]
    pub device_groups: IndexMap<String, Scope>,
}

impl PolicyBundle {
    pub fn device_group_names(&self) -> impl Iterator<Item = &str> {
        self.device_groups.keys().map(String::as_str)
    }

    pub fn scope(&self, device_group: &str) -> Result<&Scope> {
        self.device_groups
            .get(device_group)
            .ok_or_else(|| EngineError::UnknownDeviceGroup {
                device_group: device_group.to_string(),
            })
    }

    /// Catalog seen from a device group: shared definitions, overridden by
    /// the device group's own definitions of the same name
    pub fn catalog_for(&self, device_group: &str) -> Result<AddressCatalog> {
        let scope = self.scope(device_group)?;
        let mut catalog = AddressCatalog::from_parts(
            self.shared.address_objects.iter().cloned(),
            self.shared.address_groups.iter().cloned(),
        );
        catalog.extend(
            scope.address_objects.iter().cloned(),
            scope.address_groups.iter().cloned(),
        );
        Ok(catalog)
    }

    /// Device groups to analyse, in bundle order; an empty filter selects all
    pub fn select(&self, filter: &[String]) -> Result<Vec<&str>> {
        if filter.is_empty() {
            return Ok(self.device_group_names().collect());
        }

        for name in filter {
            self.scope(name)?;
        }
        Ok(self
            .device_group_names()
            .filter(|name| filter.iter().any(|f| f == name))
            .collect())
    }

    /// Run the evaluator over the selected device groups
    pub fn evaluate(&self, evaluator: &ShadowEvaluator, filter: &[String]) -> Result<ShadowReport> {
        let names = self.select(filter)?;
        let catalogs = names
            .iter()
            .map(|name| self.catalog_for(name))
            .collect::<Result<Vec<_>>>()?;

        let mut groups = Vec::with_capacity(names.len());
        for (name, catalog) in names.iter().zip(&catalogs) {
            groups.push((*name, self.scope(name)?.rules.as_slice(), catalog));
        }

        evaluator.evaluate(groups)
    }

    /// Total number of rules across device groups
    pub fn rule_count(&self) -> usize {
        self.device_groups.values().map(|scope| scope.rules.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::catalog::AddressKind;
    use crate::check::EngineOptions;
    use crate::rule::Members;

    fn create_test_bundle() -> PolicyBundle {
        let mut bundle = PolicyBundle::default();
        bundle.shared.address_objects = vec![
            AddressObject::new("dns", AddressKind::IpNetmask, "10.0.0.53"),
            AddressObject::new("lan", AddressKind::IpNetmask, "10.0.0.0/8"),
        ];

        bundle.device_groups.insert(
            "branch".to_string(),
            Scope {
                address_objects: vec![AddressObject::new("lan", AddressKind::IpNetmask, "192.168.0.0/16")],
                address_groups: vec![],
                rules: vec![
                    SecurityRule::new("lan-out", 1).with_addresses(Members::of(["lan"]), Members::any()),
                    SecurityRule::new("dns-out", 2).with_addresses(Members::of(["dns"]), Members::any()),
                ],
            },
        );
        bundle.device_groups.insert(
            "datacenter".to_string(),
            Scope {
                rules: vec![
                    SecurityRule::new("lan-out", 1).with_addresses(Members::of(["lan"]), Members::any()),
                    SecurityRule::new("dns-out", 2).with_addresses(Members::of(["dns"]), Members::any()),
                ],
                ..Scope::default()
            },
        );
        bundle
    }

    #[test]
    fn test_device_group_overrides_shared() {
        let bundle = create_test_bundle();

        let branch = bundle.catalog_for("branch").unwrap();
        assert_eq!(branch.object("lan").unwrap().value, "192.168.0.0/16");
        assert!(branch.object("dns").is_some());

        let datacenter = bundle.catalog_for("datacenter").unwrap();
        assert_eq!(datacenter.object("lan").unwrap().value, "10.0.0.0/8");
    }

    #[test]
    fn test_select() {
        let bundle = create_test_bundle();

        assert_eq!(bundle.select(&[]).unwrap(), vec!["branch", "datacenter"]);
        assert_eq!(
            bundle.select(&["datacenter".to_string()]).unwrap(),
            vec!["datacenter"]
        );
        assert!(matches!(
            bundle.select(&["nowhere".to_string()]),
            Err(EngineError::UnknownDeviceGroup { .. })
        ));
    }

    #[test]
    fn test_groups_are_evaluated_with_their_own_catalog() {
        let bundle = create_test_bundle();
        let evaluator = ShadowEvaluator::new(EngineOptions::advanced());
        let report = bundle.evaluate(&evaluator, &[]).unwrap();

        // 10.0.0.53 is outside the branch's 192.168.0.0/16 "lan"
        assert!(!report.groups["branch"].verdict("dns-out").unwrap().is_shadowed());
        assert!(report.groups["datacenter"].verdict("dns-out").unwrap().is_shadowed());
        assert_eq!(bundle.rule_count(), 4);
    }

    #[test]
    fn test_device_group_object_overrides_shared_group() {
        use crate::address::resolver::AddressResolver;

        let mut bundle = PolicyBundle::default();
        bundle.shared.address_groups = vec![AddressGroup::with_static("web", ["10.0.0.0/8"])];
        bundle.shared.address_objects = vec![AddressObject::new("db", AddressKind::IpNetmask, "10.9.0.0/16")];
        bundle.device_groups.insert(
            "dg".to_string(),
            Scope {
                address_objects: vec![AddressObject::new("web", AddressKind::IpNetmask, "10.0.0.0/24")],
                address_groups: vec![AddressGroup::with_static("db", ["10.9.9.0/24"])],
                rules: vec![
                    SecurityRule::new("web-out", 1).with_addresses(Members::of(["web"]), Members::any()),
                    SecurityRule::new("lab-out", 2).with_addresses(Members::of(["10.1.0.0/24"]), Members::any()),
                ],
            },
        );

        let catalog = bundle.catalog_for("dg").unwrap();
        assert!(catalog.group("web").is_none());
        assert!(catalog.object("db").is_none());

        let mut resolver = AddressResolver::new(&catalog);
        let web = resolver.resolve("web");
        assert_eq!(web.ranges.len(), 1);
        assert_eq!(web.ranges[0].to_string(), "10.0.0.0/24");
        assert!(!web.has_unresolved);
        assert_eq!(resolver.resolve("db").ranges[0].to_string(), "10.9.9.0/24");

        let report = bundle
            .evaluate(&ShadowEvaluator::new(EngineOptions::advanced()), &[])
            .unwrap();
        assert!(!report.groups["dg"].verdict("lab-out").unwrap().is_shadowed());
    }
}
