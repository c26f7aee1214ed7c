//! Dimension checks.
//!
//! Every check answers one question: does the preceding rule match at least
//! everything the later rule matches along this dimension? Missing or
//! incomplete data always answers "no".

use super::{ApplicationDefault, CheckOutcome, Dimension, EngineOptions, PreparedRule};
use crate::address::range::{AddrRange, RangeUnion};
use crate::address::resolver::ResolvedAddressSet;
use crate::rule::{Members, APPLICATION_DEFAULT};

pub fn check_action(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    let (p, l) = (preceding.rule.action, later.rule.action);
    if p == l {
        CheckOutcome::pass(Dimension::Action, format!("Actions match ({})", p))
    } else {
        CheckOutcome::fail(Dimension::Action, format!("Actions differ ({} vs {})", p, l))
    }
}

pub fn check_source_zone(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    check_members(
        Dimension::SourceZone,
        "source zones",
        &preceding.rule.source_zones,
        &later.rule.source_zones,
    )
}

pub fn check_destination_zone(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    check_members(
        Dimension::DestinationZone,
        "destination zones",
        &preceding.rule.destination_zones,
        &later.rule.destination_zones,
    )
}

pub fn check_application(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    check_members(
        Dimension::Application,
        "applications",
        &preceding.rule.applications,
        &later.rule.applications,
    )
}

pub fn check_service(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    options: &EngineOptions,
) -> CheckOutcome {
    let p = &preceding.rule.services;
    let l = &later.rule.services;

    if p.is_any() {
        return CheckOutcome::pass(Dimension::Service, "Preceding rule allows any service");
    }
    if p == l {
        return CheckOutcome::pass(Dimension::Service, format!("Services are identical ({})", p));
    }
    if options.application_default == ApplicationDefault::Broad && p.contains(APPLICATION_DEFAULT) {
        return CheckOutcome::pass(
            Dimension::Service,
            "Preceding rule uses application-default, treated as covering all services",
        );
    }

    check_members(Dimension::Service, "services", p, l)
}

pub fn check_source_address_by_name(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    addresses_by_name(
        Dimension::SourceAddress,
        "source",
        &preceding.rule.source_addresses,
        &later.rule.source_addresses,
    )
}

pub fn check_destination_address_by_name(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    addresses_by_name(
        Dimension::DestinationAddress,
        "destination",
        &preceding.rule.destination_addresses,
        &later.rule.destination_addresses,
    )
}

pub fn check_source_address_by_value(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    addresses_by_value(
        Dimension::SourceAddress,
        "source",
        preceding.source.as_ref(),
        later.source.as_ref(),
    )
}

pub fn check_destination_address_by_value(
    preceding: &PreparedRule<'_>,
    later: &PreparedRule<'_>,
    _options: &EngineOptions,
) -> CheckOutcome {
    addresses_by_value(
        Dimension::DestinationAddress,
        "destination",
        preceding.destination.as_ref(),
        later.destination.as_ref(),
    )
}

/// Plain set containment with the `any` wildcard
fn check_members(dimension: Dimension, label: &str, preceding: &Members, later: &Members) -> CheckOutcome {
    if preceding.is_any() {
        return CheckOutcome::pass(dimension, format!("Preceding rule {} is 'any'", label));
    }
    if preceding == later {
        return CheckOutcome::pass(dimension, format!("The same {}", label));
    }
    if later.is_any() {
        return CheckOutcome::fail(dimension, format!("Rule {} is 'any', preceding rule is narrower", label));
    }

    if later.is_covered_by(preceding) {
        CheckOutcome::pass(dimension, format!("Preceding rule {} contain rule's {}", label, label))
    } else {
        CheckOutcome::fail(
            dimension,
            format!(
                "Preceding rule {} do not contain: {}",
                label,
                later.missing_from(preceding).join(", ")
            ),
        )
    }
}

fn addresses_by_name(dimension: Dimension, side: &str, preceding: &Members, later: &Members) -> CheckOutcome {
    if preceding.is_any() {
        return CheckOutcome::pass(dimension, format!("Preceding rule allows any {} address", side));
    }
    if later.is_any() {
        return CheckOutcome::fail(dimension, format!("Rule allows any {} address, preceding rule does not", side));
    }

    let missing = later.missing_from(preceding);
    if missing.is_empty() {
        CheckOutcome::pass(
            dimension,
            format!("Preceding rule lists every {} address reference of the rule", side),
        )
    } else {
        CheckOutcome::fail(
            dimension,
            format!("{} references not listed in preceding rule: {}", capitalize(side), missing.join(", ")),
        )
    }
}

fn addresses_by_value(
    dimension: Dimension,
    side: &str,
    preceding: Option<&ResolvedAddressSet>,
    later: Option<&ResolvedAddressSet>,
) -> CheckOutcome {
    let (Some(preceding), Some(later)) = (preceding, later) else {
        return CheckOutcome::fail(dimension, format!("{} addresses were not resolved", capitalize(side)));
    };

    if preceding.is_any {
        return CheckOutcome::pass(dimension, format!("Preceding rule allows any {} address", side));
    }
    if preceding.has_unresolved {
        return CheckOutcome::fail(
            dimension,
            format!(
                "Preceding rule {} addresses could not be fully resolved: {}",
                side,
                preceding.unresolved.join("; ")
            ),
        );
    }
    if later.has_unresolved {
        return CheckOutcome::fail(
            dimension,
            format!(
                "Rule {} addresses could not be fully resolved: {}",
                side,
                later.unresolved.join("; ")
            ),
        );
    }

    let later_ranges: Vec<AddrRange> = if later.is_any {
        vec![AddrRange::ALL_V4, AddrRange::ALL_V6]
    } else {
        later.ranges.clone()
    };
    if later_ranges.is_empty() {
        return CheckOutcome::fail(dimension, format!("Rule has no concrete {} addresses", side));
    }

    let union = RangeUnion::new(&preceding.ranges);
    if union.is_empty() {
        return CheckOutcome::fail(dimension, format!("Preceding rule has no concrete {} addresses", side));
    }
    match later_ranges.iter().find(|range| !union.contains(range)) {
        Some(uncovered) => CheckOutcome::fail(
            dimension,
            format!("{} range {} not covered by preceding rule", capitalize(side), uncovered),
        ),
        None => CheckOutcome::pass(
            dimension,
            format!("All {} ranges are covered by preceding rule", side),
        ),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::catalog::{AddressCatalog, AddressGroup, AddressKind, AddressObject};
    use crate::address::resolver::AddressResolver;
    use crate::rule::{Action, SecurityRule};

    fn prepare<'r>(rule: &'r SecurityRule, resolver: &mut AddressResolver<'_>) -> PreparedRule<'r> {
        PreparedRule {
            rule,
            source: Some(resolver.resolve_all(rule.source_addresses.names())),
            destination: Some(resolver.resolve_all(rule.destination_addresses.names())),
        }
    }

    fn create_test_catalog() -> AddressCatalog {
        AddressCatalog::from_parts(
            vec![
                AddressObject::new("net-16", AddressKind::IpNetmask, "10.0.0.0/16"),
                AddressObject::new("net-24", AddressKind::IpNetmask, "10.0.0.0/24"),
                AddressObject::new("other-24", AddressKind::IpNetmask, "10.1.0.0/24"),
                AddressObject::new("portal", AddressKind::Fqdn, "portal.example.com"),
            ],
            vec![
                AddressGroup::with_static("lower", ["10.0.0.0/25"]),
                AddressGroup::with_static("halves", ["lower", "10.0.0.128/25"]),
            ],
        )
    }

    #[test]
    fn test_action() {
        let allow = SecurityRule::new("a", 1);
        let deny = SecurityRule::new("b", 2).with_action(Action::Deny);
        let options = EngineOptions::basic();

        assert!(check_action(&PreparedRule::basic(&allow), &PreparedRule::basic(&allow), &options).covers);
        assert!(!check_action(&PreparedRule::basic(&allow), &PreparedRule::basic(&deny), &options).covers);
    }

    #[test]
    fn test_zones() {
        let wide = SecurityRule::new("wide", 1).with_zones(Members::of(["trust", "dmz"]), Members::any());
        let narrow = SecurityRule::new("narrow", 2).with_zones(Members::of(["trust"]), Members::of(["untrust"]));
        let options = EngineOptions::basic();
        let (w, n) = (PreparedRule::basic(&wide), PreparedRule::basic(&narrow));

        assert!(check_source_zone(&w, &n, &options).covers);
        assert!(check_destination_zone(&w, &n, &options).covers);
        assert!(!check_source_zone(&n, &w, &options).covers);
        assert!(!check_destination_zone(&n, &w, &options).covers);
    }

    #[test]
    fn test_services_application_default_policy() {
        let app_default = SecurityRule::new("p", 1).with_services(Members::of([APPLICATION_DEFAULT]));
        let http = SecurityRule::new("l", 2).with_services(Members::of(["service-http"]));
        let (p, l) = (PreparedRule::basic(&app_default), PreparedRule::basic(&http));

        let opaque = EngineOptions::basic();
        let broad = EngineOptions::basic().with_application_default(ApplicationDefault::Broad);

        assert!(!check_service(&p, &l, &opaque).covers);
        assert!(check_service(&p, &l, &broad).covers);
        // Both sides application-default
        assert!(check_service(&p, &p, &opaque).covers);
    }

    #[test]
    fn test_addresses_by_name() {
        let preceding = SecurityRule::new("p", 1).with_addresses(Members::of(["a", "b"]), Members::any());
        let later = SecurityRule::new("l", 2).with_addresses(Members::of(["a"]), Members::of(["c"]));
        let options = EngineOptions::basic();
        let (p, l) = (PreparedRule::basic(&preceding), PreparedRule::basic(&later));

        assert!(check_source_address_by_name(&p, &l, &options).covers);
        assert!(check_destination_address_by_name(&p, &l, &options).covers);

        let outcome = check_source_address_by_name(&l, &p, &options);
        assert!(!outcome.covers);
        assert!(outcome.reason.contains('b'));
    }

    #[test]
    fn test_addresses_by_value_containment() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);
        let options = EngineOptions::advanced();

        let wide = SecurityRule::new("wide", 1).with_addresses(Members::of(["net-16"]), Members::any());
        let narrow = SecurityRule::new("narrow", 2).with_addresses(Members::of(["net-24"]), Members::any());
        let disjoint = SecurityRule::new("disjoint", 3).with_addresses(Members::of(["other-24"]), Members::any());

        let w = prepare(&wide, &mut resolver);
        let n = prepare(&narrow, &mut resolver);
        let d = prepare(&disjoint, &mut resolver);

        assert!(check_source_address_by_value(&w, &n, &options).covers);
        assert!(!check_source_address_by_value(&n, &w, &options).covers);
        assert!(!check_source_address_by_value(&w, &d, &options).covers);
    }

    #[test]
    fn test_addresses_by_value_union() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);
        let options = EngineOptions::advanced();

        let halves = SecurityRule::new("halves", 1).with_addresses(Members::of(["halves"]), Members::any());
        let whole = SecurityRule::new("whole", 2).with_addresses(Members::of(["net-24"]), Members::any());

        let h = prepare(&halves, &mut resolver);
        let w = prepare(&whole, &mut resolver);

        assert!(check_source_address_by_value(&h, &w, &options).covers);
    }

    #[test]
    fn test_addresses_by_value_unresolved_never_covers() {
        let catalog = create_test_catalog();
        let mut resolver = AddressResolver::new(&catalog);
        let options = EngineOptions::advanced();

        let fqdn = SecurityRule::new("fqdn", 1).with_addresses(Members::any(), Members::of(["portal", "net-16"]));
        let net = SecurityRule::new("net", 2).with_addresses(Members::any(), Members::of(["net-24"]));

        let f = prepare(&fqdn, &mut resolver);
        let n = prepare(&net, &mut resolver);

        assert!(!check_destination_address_by_value(&f, &n, &options).covers);
        assert!(!check_destination_address_by_value(&n, &f, &options).covers);
        assert!(!check_destination_address_by_value(&f, &f, &options).covers);
    }

    #[test]
    fn test_later_any_needs_full_space() {
        let catalog = AddressCatalog::new();
        let mut resolver = AddressResolver::new(&catalog);
        let options = EngineOptions::advanced();

        let everything = SecurityRule::new("everything", 1)
            .with_addresses(Members::of(["0.0.0.0/0", "::/0"]), Members::any());
        let v4_only = SecurityRule::new("v4", 2).with_addresses(Members::of(["0.0.0.0/0"]), Members::any());
        let any = SecurityRule::new("any", 3);

        let e = prepare(&everything, &mut resolver);
        let v = prepare(&v4_only, &mut resolver);
        let a = prepare(&any, &mut resolver);

        assert!(check_source_address_by_value(&e, &a, &options).covers);
        assert!(!check_source_address_by_value(&v, &a, &options).covers);
    }

    #[test]
    fn test_by_value_without_resolution_fails() {
        let rule = SecurityRule::new("r", 1);
        let p = PreparedRule::basic(&rule);
        let outcome = check_source_address_by_value(&p, &p, &EngineOptions::advanced());
        assert!(!outcome.covers);
    }

    #[test]
    fn test_empty_preceding_group_covers_nothing() {
        let catalog = AddressCatalog::from_parts(
            vec![AddressObject::new("net-24", AddressKind::IpNetmask, "10.0.0.0/24")],
            vec![AddressGroup::with_static("empty", Vec::<String>::new())],
        );
        let mut resolver = AddressResolver::new(&catalog);

        let empty = SecurityRule::new("empty", 1).with_addresses(Members::of(["empty"]), Members::any());
        let net = SecurityRule::new("net", 2).with_addresses(Members::of(["net-24"]), Members::any());

        let e = prepare(&empty, &mut resolver);
        let n = prepare(&net, &mut resolver);

        let outcome = check_source_address_by_value(&e, &n, &EngineOptions::advanced());
        assert!(!outcome.covers);
        assert!(outcome.reason.contains("no concrete source addresses"));
    }
}
