//! Bundle validation including cycle detection.
//!
//! Nothing found here stops an evaluation; the resolver and the checks
//! already degrade to "not covered". The findings tell the operator which
//! parts of the export weakened the analysis.

use super::bundle::PolicyBundle;
use crate::address::catalog::{AddressCatalog, GroupMembers};
use crate::address::range::AddrRange;
use crate::address::resolver::ANY;
use crate::error::ValidationError;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A finding tied to the device group it was seen from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub scope: String,
    pub issue: ValidationError,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.issue)
    }
}

pub struct BundleValidator;

impl BundleValidator {
    /// Validate every device group of a bundle
    pub fn validate(bundle: &PolicyBundle) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for name in bundle.device_group_names() {
            let Ok(catalog) = bundle.catalog_for(name) else {
                continue;
            };
            let mut issues = Self::validate_catalog(&catalog);

            if let Ok(scope) = bundle.scope(name) {
                issues.extend(Self::check_rule_references(&catalog, scope.rules.iter().flat_map(|rule| {
                    rule.source_addresses.names().chain(rule.destination_addresses.names())
                })));
                issues.extend(Self::check_empty_lists(&scope.rules));
                issues.extend(Self::check_indexes(name, &scope.rules));
            }

            warnings.extend(issues.into_iter().map(|issue| ValidationWarning {
                scope: name.to_string(),
                issue,
            }));
        }

        warnings
    }

    /// Validate one catalog on its own
    pub fn validate_catalog(catalog: &AddressCatalog) -> Vec<ValidationError> {
        let mut issues = Self::check_cycles(catalog);
        issues.extend(Self::check_members(catalog));
        issues.extend(Self::check_values(catalog));
        issues
    }

    /// Report each cycle in group references once, using DFS colouring
    fn check_cycles(catalog: &AddressCatalog) -> Vec<ValidationError> {
        let mut names: Vec<&str> = catalog.groups().map(|g| g.name.as_str()).collect();
        names.sort_unstable();

        let mut done = HashSet::new();
        let mut issues = Vec::new();
        for name in names {
            let mut path = Vec::new();
            Self::dfs_cycle_check(name, catalog, &mut done, &mut path, &mut issues);
        }
        issues
    }

    fn dfs_cycle_check<'c>(
        group_name: &'c str,
        catalog: &'c AddressCatalog,
        done: &mut HashSet<&'c str>,
        path: &mut Vec<&'c str>,
        issues: &mut Vec<ValidationError>,
    ) {
        // If this group is in the current path, we found a cycle
        if let Some(start) = path.iter().position(|name| *name == group_name) {
            let mut cycle: Vec<&str> = path[start..].to_vec();
            cycle.push(group_name);
            issues.push(ValidationError::CycleDetected {
                path: cycle.join(" -> "),
            });
            return;
        }

        if done.contains(group_name) {
            return;
        }

        let Some(group) = catalog.group(group_name) else {
            return;
        };

        path.push(group_name);
        for child in group.static_members() {
            if catalog.group(child).is_some() {
                Self::dfs_cycle_check(child, catalog, done, path, issues);
            }
        }
        path.pop();
        done.insert(group_name);
    }

    /// Flag static members that name nothing and dynamic groups
    fn check_members(catalog: &AddressCatalog) -> Vec<ValidationError> {
        let mut groups: Vec<_> = catalog.groups().collect();
        groups.sort_unstable_by(|a, b| a.name.cmp(&b.name));

        let mut issues = Vec::new();
        for group in groups {
            match &group.members {
                GroupMembers::Dynamic(_) => issues.push(ValidationError::DynamicGroup {
                    group: group.name.clone(),
                }),
                GroupMembers::Static(members) => {
                    for member in members {
                        if !Self::is_known(catalog, member) {
                            issues.push(ValidationError::UnknownMember {
                                reference: format!("{} -> {}", group.name, member),
                            });
                        }
                    }
                }
            }
        }
        issues
    }

    /// Flag netmask and range objects whose values do not parse
    fn check_values(catalog: &AddressCatalog) -> Vec<ValidationError> {
        use crate::address::catalog::AddressKind;

        let mut objects: Vec<_> = catalog
            .objects()
            .filter(|o| matches!(o.kind, AddressKind::IpNetmask | AddressKind::IpRange))
            .filter(|o| o.to_range().is_none())
            .collect();
        objects.sort_unstable_by(|a, b| a.name.cmp(&b.name));

        objects
            .into_iter()
            .map(|o| ValidationError::InvalidAddress {
                name: o.name.clone(),
                value: o.value.clone(),
            })
            .collect()
    }

    fn check_rule_references<'r>(
        catalog: &AddressCatalog,
        references: impl Iterator<Item = &'r str>,
    ) -> Vec<ValidationError> {
        let mut seen = HashSet::new();
        references
            .filter(|reference| seen.insert(*reference))
            .filter(|reference| !Self::is_known(catalog, reference))
            .map(|reference| ValidationError::UnknownMember {
                reference: reference.to_string(),
            })
            .collect()
    }

    fn check_empty_lists(rules: &[crate::rule::SecurityRule]) -> Vec<ValidationError> {
        rules
            .iter()
            .flat_map(|rule| {
                rule.empty_lists.iter().map(move |field| ValidationError::EmptyMembers {
                    rule: rule.name.clone(),
                    field: field.label(),
                })
            })
            .collect()
    }

    fn check_indexes(device_group: &str, rules: &[crate::rule::SecurityRule]) -> Vec<ValidationError> {
        let mut seen: HashMap<u32, &str> = HashMap::new();
        let mut issues = Vec::new();
        for rule in rules {
            if seen.insert(rule.index, &rule.name).is_some() {
                issues.push(ValidationError::DuplicateIndex {
                    device_group: device_group.to_string(),
                    rule: rule.name.clone(),
                    index: rule.index,
                });
            }
        }
        issues
    }

    fn is_known(catalog: &AddressCatalog, reference: &str) -> bool {
        reference.eq_ignore_ascii_case(ANY)
            || catalog.contains(reference)
            || AddrRange::parse_literal(reference).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::catalog::{AddressGroup, AddressKind, AddressObject};
    use crate::config::bundle::Scope;
    use crate::rule::{Members, RuleField, SecurityRule};

    #[test]
    fn test_no_cycle() {
        let catalog = AddressCatalog::from_parts(
            vec![AddressObject::new("leaf", AddressKind::IpNetmask, "10.0.0.1")],
            vec![
                AddressGroup::with_static("a", ["b"]),
                AddressGroup::with_static("b", ["leaf"]),
            ],
        );

        assert!(BundleValidator::check_cycles(&catalog).is_empty());
        assert!(BundleValidator::validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn test_detect_cycle_once() {
        let catalog = AddressCatalog::from_parts(
            vec![],
            vec![
                AddressGroup::with_static("a", ["b"]),
                AddressGroup::with_static("b", ["a"]), // Cycle!
            ],
        );

        let issues = BundleValidator::check_cycles(&catalog);
        assert_eq!(
            issues,
            vec![ValidationError::CycleDetected {
                path: "a -> b -> a".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_members_and_bad_values() {
        let catalog = AddressCatalog::from_parts(
            vec![AddressObject::new("broken", AddressKind::IpRange, "10.0.0.9-10.0.0.1")],
            vec![
                AddressGroup::with_static("g", ["broken", "ghost", "192.168.1.0/24"]),
                AddressGroup::with_filter("tagged", "'prod'"),
            ],
        );

        let issues = BundleValidator::validate_catalog(&catalog);
        assert!(issues.contains(&ValidationError::UnknownMember {
            reference: "g -> ghost".to_string()
        }));
        assert!(issues.contains(&ValidationError::DynamicGroup {
            group: "tagged".to_string()
        }));
        assert!(issues.contains(&ValidationError::InvalidAddress {
            name: "broken".to_string(),
            value: "10.0.0.9-10.0.0.1".to_string()
        }));
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_validate_bundle() {
        let mut bundle = PolicyBundle::default();
        bundle.device_groups.insert(
            "dg".to_string(),
            Scope {
                rules: vec![
                    SecurityRule::new("a", 1).with_addresses(Members::of(["nowhere"]), Members::any()),
                    SecurityRule::new("b", 1),
                ],
                ..Scope::default()
            },
        );

        let warnings = BundleValidator::validate(&bundle);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.scope == "dg"));
        assert!(warnings[1].to_string().contains("reuses index 1"));
    }

    #[test]
    fn test_empty_member_list_is_reported() {
        let mut rule = SecurityRule::new("blank", 1);
        rule.set_members(RuleField::Applications, Some(Vec::new()));

        let mut bundle = PolicyBundle::default();
        bundle.device_groups.insert(
            "dg".to_string(),
            Scope {
                rules: vec![rule],
                ..Scope::default()
            },
        );

        let warnings = BundleValidator::validate(&bundle);
        assert_eq!(
            warnings,
            vec![ValidationWarning {
                scope: "dg".to_string(),
                issue: ValidationError::EmptyMembers {
                    rule: "blank".to_string(),
                    field: "Applications",
                },
            }]
        );
    }
}
