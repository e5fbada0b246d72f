//! Deployment module

pub mod compose;
pub mod executor;
pub mod fsm;
pub mod health;
pub mod placement;
pub mod provision;
pub mod reconciler;
pub mod sync;

pub use executor::{DeployOptions, DeployPlan, DeploymentExecutor, RunOutcome};
pub use fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};
