//! Rule shadowing analysis for ordered firewall security policies

pub mod address;
pub mod check;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod rule;

// Re-export commonly used types
pub use address::{AddressCatalog, AddressGroup, AddressKind, AddressObject, AddressResolver, ResolvedAddressSet};
pub use check::{AddressMode, ApplicationDefault, CheckOutcome, CheckRegistry, Dimension, EngineOptions};
pub use config::{BundleValidator, ConfigLoader, CsvSources, InspectorConfig, PolicyBundle, PolicyLoader, ReportFormat, Scope};
pub use error::{EngineError, Result, ValidationError};
pub use evaluator::{GroupReport, RuleVerdict, ShadowEvaluator, ShadowReport, ShadowingMatch};
pub use rule::{Action, Members, RuleField, SecurityRule};
