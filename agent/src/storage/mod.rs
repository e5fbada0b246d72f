//! On-disk layout, settings and the repository registry

pub mod layout;
pub mod registry;
pub mod settings;

pub use layout::StorageLayout;
pub use registry::RepoRegistry;
pub use settings::Settings;
