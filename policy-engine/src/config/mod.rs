//! Settings, policy bundles and their validation

pub mod bundle;
pub mod loader;
pub mod panos;
pub mod schema;
pub mod spreadsheet;
pub mod validator;

pub use bundle::{PolicyBundle, Scope};
pub use loader::{ConfigLoader, PolicyLoader};
pub use schema::{EngineConfig, InspectorConfig, ReportConfig, ReportFormat};
pub use spreadsheet::CsvSources;
pub use validator::{BundleValidator, ValidationWarning};
