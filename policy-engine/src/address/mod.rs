//! Address catalog, concrete ranges and reference resolution

pub mod catalog;
pub mod range;
pub mod resolver;

pub use catalog::{AddressCatalog, AddressGroup, AddressKind, AddressObject, CatalogEntry, GroupMembers};
pub use range::{AddrRange, RangeUnion};
pub use resolver::{AddressResolver, ResolvedAddressSet, ANY};
