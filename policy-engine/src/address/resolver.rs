//! Expansion of address references into concrete ranges

use super::catalog::{AddressCatalog, CatalogEntry, GroupMembers};
use super::range::AddrRange;
use std::collections::{HashMap, HashSet};

/// Literal wildcard accepted wherever an address reference is expected
pub const ANY: &str = "any";

/// Flat result of resolving one or more address references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddressSet {
    pub ranges: Vec<AddrRange>,
    pub is_any: bool,
    pub has_unresolved: bool,
    /// Human-readable notes for everything that set `has_unresolved`
    pub unresolved: Vec<String>,
}

impl ResolvedAddressSet {
    pub fn any() -> Self {
        Self {
            is_any: true,
            ..Self::default()
        }
    }

    pub fn from_range(range: AddrRange) -> Self {
        Self {
            ranges: vec![range],
            ..Self::default()
        }
    }

    pub fn unresolved(note: impl Into<String>) -> Self {
        Self {
            has_unresolved: true,
            unresolved: vec![note.into()],
            ..Self::default()
        }
    }

    /// Fold another set into this one
    pub fn merge(&mut self, other: &ResolvedAddressSet) {
        self.is_any |= other.is_any;
        self.has_unresolved |= other.has_unresolved;
        self.ranges.extend(other.ranges.iter().copied());
        self.unresolved.extend(other.unresolved.iter().cloned());
        self.normalize();
    }

    fn normalize(&mut self) {
        self.ranges.sort_unstable();
        self.ranges.dedup();
        self.unresolved.sort();
        self.unresolved.dedup();
    }
}

/// Depth-first resolver with a per-run memo cache.
///
/// The catalog is borrowed read-only for the resolver's lifetime. Results are
/// memoized by reference name; expansions that were cut short by a cycle are
/// only cached at the root, where the outcome no longer depends on the path.
pub struct AddressResolver<'a> {
    catalog: &'a AddressCatalog,
    cache: HashMap<String, ResolvedAddressSet>,
}

impl<'a> AddressResolver<'a> {
    pub fn new(catalog: &'a AddressCatalog) -> Self {
        Self {
            catalog,
            cache: HashMap::new(),
        }
    }

    /// Resolve a single object or group name, or an inline address literal
    pub fn resolve(&mut self, reference: &str) -> ResolvedAddressSet {
        if let Some(hit) = self.cache.get(reference) {
            return hit.clone();
        }

        let mut visiting = HashSet::new();
        let (resolved, _) = self.expand(reference, &mut visiting);
        self.cache.insert(reference.to_string(), resolved.clone());
        resolved
    }

    /// Resolve a list of references into one set
    pub fn resolve_all<'r, I>(&mut self, references: I) -> ResolvedAddressSet
    where
        I: IntoIterator<Item = &'r str>,
    {
        let mut merged = ResolvedAddressSet::default();
        for reference in references {
            let resolved = self.resolve(reference);
            merged.merge(&resolved);
        }
        merged
    }

    /// Number of memoized references
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Returns the expansion and whether a cycle was hit underneath it
    fn expand(&mut self, name: &str, visiting: &mut HashSet<String>) -> (ResolvedAddressSet, bool) {
        if name.eq_ignore_ascii_case(ANY) {
            return (ResolvedAddressSet::any(), false);
        }

        if let Some(hit) = self.cache.get(name) {
            return (hit.clone(), false);
        }

        let catalog = self.catalog;
        match catalog.lookup(name) {
            Some(CatalogEntry::Group(group)) => {
                if visiting.contains(name) {
                    tracing::debug!("Cycle detected at address group {}", name);
                    return (
                        ResolvedAddressSet::unresolved(format!("cyclic reference to group {}", name)),
                        true,
                    );
                }

                let members = match &group.members {
                    GroupMembers::Static(members) => members,
                    GroupMembers::Dynamic(filter) => {
                        tracing::debug!("Dynamic address group {} ({}) left unresolved", name, filter);
                        let resolved = ResolvedAddressSet::unresolved(format!("dynamic group {}", name));
                        self.cache.insert(name.to_string(), resolved.clone());
                        return (resolved, false);
                    }
                };

                tracing::debug!("Resolving address group {} ({} members)", name, members.len());
                visiting.insert(name.to_string());
                let mut resolved = ResolvedAddressSet::default();
                let mut cycle = false;
                for member in members {
                    let (child, child_cycle) = self.expand(member, visiting);
                    resolved.merge(&child);
                    cycle |= child_cycle;
                }
                visiting.remove(name);

                if !cycle {
                    self.cache.insert(name.to_string(), resolved.clone());
                }
                (resolved, cycle)
            }
            Some(CatalogEntry::Object(object)) => {
                let resolved = match object.to_range() {
                    Some(range) => ResolvedAddressSet::from_range(range),
                    None => {
                        tracing::debug!(
                            "Address object {} ({} {}) has no concrete range",
                            name,
                            object.kind.as_str(),
                            object.value
                        );
                        ResolvedAddressSet::unresolved(format!(
                            "{} object {} ({})",
                            object.kind.as_str(),
                            name,
                            object.value
                        ))
                    }
                };
                self.cache.insert(name.to_string(), resolved.clone());
                (resolved, false)
            }
            None => {
                let resolved = match AddrRange::parse_literal(name) {
                    Some(range) => ResolvedAddressSet::from_range(range),
                    None => {
                        tracing::debug!("Unknown address reference {}", name);
                        ResolvedAddressSet::unresolved(format!("unknown reference {}", name))
                    }
                };
                self.cache.insert(name.to_string(), resolved.clone());
                (resolved, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::catalog::{AddressGroup, AddressKind, AddressObject};

    fn create_test_catalog() -> AddressCatalog {
        AddressCatalog::from_parts(
            vec![
                AddressObject::new("web1", AddressKind::IpNetmask, "192.168.1.1/32"),
                AddressObject::new("web2", AddressKind::IpNetmask, "192.168.1.2/32"),
                AddressObject::new("web5", AddressKind::IpRange, "10.10.1.10-10.10.1.15"),
                AddressObject::new("db1", AddressKind::IpNetmask, "10.0.0.5/32"),
                AddressObject::new("portal", AddressKind::Fqdn, "portal.example.com"),
            ],
            vec![
                AddressGroup::with_static("web-servers", ["web1", "web2"]),
                AddressGroup::with_static("nested", ["web-servers", "web5"]),
                AddressGroup::with_static("with-fqdn", ["db1", "portal"]),
                AddressGroup::with_filter("tagged", "'prod'"),
            ],
        )
    }

    fn ranges(set: &ResolvedAddressSet) -> Vec<String> {
        set.ranges.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_resolve_object() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);

        let set = resolver.resolve("web1");
        assert_eq!(ranges(&set), vec!["192.168.1.1/32"]);
        assert!(!set.is_any);
        assert!(!set.has_unresolved);
    }

    #[test]
    fn test_resolve_nested_group() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);

        let set = resolver.resolve("nested");
        assert_eq!(
            ranges(&set),
            vec!["10.10.1.10-10.10.1.15", "192.168.1.1/32", "192.168.1.2/32"]
        );
        assert!(!set.has_unresolved);
    }

    #[test]
    fn test_any_skips_catalog() {
        let catalog = AddressCatalog::new();
        let mut resolver = AddressResolver::new(&catalog);

        assert!(resolver.resolve("any").is_any);
    }

    #[test]
    fn test_fqdn_and_dynamic_are_unresolved() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);

        let set = resolver.resolve("with-fqdn");
        assert!(set.has_unresolved);
        assert_eq!(ranges(&set), vec!["10.0.0.5/32"]);

        let tagged = resolver.resolve("tagged");
        assert!(tagged.has_unresolved);
        assert!(!tagged.is_any);
        assert!(tagged.ranges.is_empty());
    }

    #[test]
    fn test_unknown_reference_and_literal() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);

        assert!(resolver.resolve("no-such-object").has_unresolved);

        let literal = resolver.resolve("172.16.0.0/12");
        assert!(!literal.has_unresolved);
        assert_eq!(ranges(&literal), vec!["172.16.0.0/12"]);
    }

    #[test]
    fn test_two_group_cycle_terminates() {
        let catalog = AddressCatalog::from_parts(
            vec![],
            vec![
                AddressGroup::with_static("a", ["b"]),
                AddressGroup::with_static("b", ["a"]),
            ],
        );
        let mut resolver = AddressResolver::new(&catalog);

        let set = resolver.resolve("a");
        assert!(set.ranges.is_empty());
        assert!(!set.is_any);
        assert!(set.has_unresolved);

        let set = resolver.resolve("b");
        assert!(set.ranges.is_empty());
    }

    #[test]
    fn test_cycle_keeps_leaves_resolved_before_it() {
        let catalog = AddressCatalog::from_parts(
            vec![AddressObject::new("leaf", AddressKind::IpNetmask, "10.0.0.0/24")],
            vec![
                AddressGroup::with_static("a", ["leaf", "b"]),
                AddressGroup::with_static("b", ["a"]),
                AddressGroup::with_static("self", ["self"]),
            ],
        );
        let mut resolver = AddressResolver::new(&catalog);

        let set = resolver.resolve("a");
        assert_eq!(ranges(&set), vec!["10.0.0.0/24"]);

        // Entered from the other side of the cycle
        let set = resolver.resolve("b");
        assert_eq!(ranges(&set), vec!["10.0.0.0/24"]);

        assert!(resolver.resolve("self").ranges.is_empty());
    }

    #[test]
    fn test_memoization() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);

        let first = resolver.resolve("nested");
        let cached = resolver.cached();
        let second = resolver.resolve("nested");

        assert_eq!(first, second);
        assert_eq!(resolver.cached(), cached);
        // nested, web-servers, web1, web2, web5
        assert_eq!(cached, 5);
    }

    #[test]
    fn test_resolve_all_merges() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);

        let set = resolver.resolve_all(["web1", "db1", "web1"]);
        assert_eq!(ranges(&set), vec!["10.0.0.5/32", "192.168.1.1/32"]);

        let set = resolver.resolve_all(["web1", "any"]);
        assert!(set.is_any);
    }
}
