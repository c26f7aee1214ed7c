//! Concrete address intervals and union containment

use ipnet::{IpNet, Ipv4Subnets, Ipv6Subnets};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// An inclusive interval of addresses within one family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrRange {
    V4 { start: Ipv4Addr, end: Ipv4Addr },
    V6 { start: Ipv6Addr, end: Ipv6Addr },
}

impl AddrRange {
    /// The whole IPv4 space
    pub const ALL_V4: AddrRange = AddrRange::V4 {
        start: Ipv4Addr::UNSPECIFIED,
        end: Ipv4Addr::BROADCAST,
    };

    /// The whole IPv6 space
    pub const ALL_V6: AddrRange = AddrRange::V6 {
        start: Ipv6Addr::UNSPECIFIED,
        end: Ipv6Addr::new(0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff),
    };

    /// Range spanned by a network, host bits ignored
    pub fn from_net(net: IpNet) -> Self {
        match net {
            IpNet::V4(n) => AddrRange::V4 {
                start: n.network(),
                end: n.broadcast(),
            },
            IpNet::V6(n) => AddrRange::V6 {
                start: n.network(),
                end: n.broadcast(),
            },
        }
    }

    /// Range between two addresses; `None` when families differ or start > end
    pub fn from_bounds(start: IpAddr, end: IpAddr) -> Option<Self> {
        match (start, end) {
            (IpAddr::V4(s), IpAddr::V4(e)) if s <= e => Some(AddrRange::V4 { start: s, end: e }),
            (IpAddr::V6(s), IpAddr::V6(e)) if s <= e => Some(AddrRange::V6 { start: s, end: e }),
            _ => None,
        }
    }

    /// Parse `10.0.0.0/8`, `10.0.0.1` or `2001:db8::/32`
    pub fn parse_network(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(net) = value.parse::<IpNet>() {
            return Some(Self::from_net(net));
        }
        value.parse::<IpAddr>().ok().map(|ip| Self::from_net(IpNet::from(ip)))
    }

    /// Parse `10.0.0.1-10.0.0.20`
    pub fn parse_range(value: &str) -> Option<Self> {
        let (start, end) = value.trim().split_once('-')?;
        let start = start.trim().parse::<IpAddr>().ok()?;
        let end = end.trim().parse::<IpAddr>().ok()?;
        Self::from_bounds(start, end)
    }

    /// Parse either notation, used for inline addresses in rules
    pub fn parse_literal(value: &str) -> Option<Self> {
        Self::parse_network(value).or_else(|| Self::parse_range(value))
    }

    /// Inclusive containment within a single other range
    pub fn is_within(&self, other: &AddrRange) -> bool {
        let (family, start, end) = self.key();
        let (other_family, other_start, other_end) = other.key();
        family == other_family && start >= other_start && end <= other_end
    }

    fn key(&self) -> (u8, u128, u128) {
        match self {
            AddrRange::V4 { start, end } => (4, u32::from(*start) as u128, u32::from(*end) as u128),
            AddrRange::V6 { start, end } => (6, u128::from(*start), u128::from(*end)),
        }
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Print as a single CIDR when the interval is exactly one prefix
        match self {
            AddrRange::V4 { start, end } => {
                let mut nets = Ipv4Subnets::new(*start, *end, 0);
                match (nets.next(), nets.next()) {
                    (Some(net), None) => write!(f, "{}", net),
                    _ => write!(f, "{}-{}", start, end),
                }
            }
            AddrRange::V6 { start, end } => {
                let mut nets = Ipv6Subnets::new(*start, *end, 0);
                match (nets.next(), nets.next()) {
                    (Some(net), None) => write!(f, "{}", net),
                    _ => write!(f, "{}-{}", start, end),
                }
            }
        }
    }
}

/// Merged, sorted, non-overlapping view over a set of ranges.
///
/// Adjacent intervals are coalesced so that a later range straddling two
/// preceding ranges (e.g. `10.0.0.0/25` + `10.0.0.128/25` vs `10.0.0.0/24`)
/// is still recognised as covered.
#[derive(Debug, Clone, Default)]
pub struct RangeUnion {
    intervals: Vec<(u8, u128, u128)>,
}

impl RangeUnion {
    pub fn new<'a>(ranges: impl IntoIterator<Item = &'a AddrRange>) -> Self {
        let mut keys: Vec<(u8, u128, u128)> = ranges.into_iter().map(AddrRange::key).collect();
        keys.sort_unstable();

        let mut intervals: Vec<(u8, u128, u128)> = Vec::with_capacity(keys.len());
        for (family, start, end) in keys {
            if let Some(last) = intervals.last_mut() {
                let touches = last.0 == family && last.2.checked_add(1).map_or(true, |next| start <= next);
                if touches {
                    last.2 = last.2.max(end);
                    continue;
                }
            }
            intervals.push((family, start, end));
        }

        Self { intervals }
    }

    /// Whether `range` lies entirely inside the union
    pub fn contains(&self, range: &AddrRange) -> bool {
        let (family, start, end) = range.key();
        let idx = self
            .intervals
            .partition_point(|&(f, s, _)| (f, s) <= (family, start));
        if idx == 0 {
            return false;
        }
        let (f, _, e) = self.intervals[idx - 1];
        f == family && e >= end
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
