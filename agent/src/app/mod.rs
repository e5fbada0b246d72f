//! Application wiring

pub mod options;
pub mod run;
pub mod state;

pub use options::AppOptions;
pub use run::{renew_certificates, run, run_with};
pub use state::DeploymentRecord;
