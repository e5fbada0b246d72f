//! FSM unit tests

use deploy_agent::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};
use deploy_agent::errors::DeployError;

#[test]
fn test_fsm_initial_state() {
    let fsm = DeploymentFsm::new();
    assert_eq!(fsm.state(), DeploymentState::Starting);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.history(), &[DeploymentState::Starting]);
}

#[test]
fn test_fsm_fullstack_flow() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Fetch).unwrap();
    fsm.process(DeploymentEvent::Pull).unwrap();
    fsm.process(DeploymentEvent::DeployFullstack).unwrap();

    // Service leg first, then the site
    fsm.process(DeploymentEvent::DeployServer).unwrap();
    fsm.process(DeploymentEvent::DeployClient).unwrap();
    fsm.process(DeploymentEvent::Complete).unwrap();

    assert_eq!(
        fsm.history(),
        &[
            DeploymentState::Starting,
            DeploymentState::Fetching,
            DeploymentState::Pulling,
            DeploymentState::DeployingFullstack,
            DeploymentState::DeployingServer,
            DeploymentState::DeployingClient,
            DeploymentState::Success,
        ]
    );
}

#[test]
fn test_fsm_container_flow_with_migrations() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Fetch).unwrap();
    fsm.process(DeploymentEvent::Pull).unwrap();
    fsm.process(DeploymentEvent::BuildDocker).unwrap();
    fsm.process(DeploymentEvent::DeployDocker).unwrap();
    fsm.process(DeploymentEvent::RunMigrations).unwrap();

    assert_eq!(fsm.state(), DeploymentState::RunningMigrations);
    assert_eq!(fsm.process(DeploymentEvent::Complete).unwrap(), DeploymentState::Success);
}

#[test]
fn test_fsm_up_to_date_skips_deploy() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Fetch).unwrap();
    fsm.process(DeploymentEvent::UpToDate).unwrap();

    assert_eq!(fsm.state(), DeploymentState::Success);
    assert!(fsm.state().is_terminal());
    assert!(!fsm.history().contains(&DeploymentState::Pulling));
}

#[test]
fn test_fsm_failure_from_any_stage() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Fetch).unwrap();
    fsm.process(DeploymentEvent::Pull).unwrap();
    fsm.process(DeploymentEvent::BuildDocker).unwrap();
    fsm.process(DeploymentEvent::Fail("image build failed".to_string())).unwrap();

    assert_eq!(fsm.state(), DeploymentState::Failed);
    assert_eq!(fsm.error(), Some("image build failed"));
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = DeploymentFsm::new();

    // Cannot deploy before pulling
    let err = fsm.process(DeploymentEvent::DeployClient).unwrap_err();
    assert!(matches!(err, DeployError::InvalidTransition(_)));
    assert_eq!(fsm.state(), DeploymentState::Starting);

    // Migrations only follow a container deploy
    fsm.process(DeploymentEvent::Fetch).unwrap();
    fsm.process(DeploymentEvent::Pull).unwrap();
    fsm.process(DeploymentEvent::DeployServer).unwrap();
    assert!(fsm.process(DeploymentEvent::RunMigrations).is_err());
    assert_eq!(fsm.history().len(), 4);
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut fsm = DeploymentFsm::new();
    fsm.process(DeploymentEvent::Fetch).unwrap();
    fsm.process(DeploymentEvent::UpToDate).unwrap();

    assert!(fsm.process(DeploymentEvent::Fail("late".to_string())).is_err());
    assert!(fsm.error().is_none());
}

#[test]
fn test_state_names() {
    assert_eq!(DeploymentState::DeployingFullstack.to_string(), "DEPLOYING_FULLSTACK");
    let json = serde_json::to_string(&DeploymentState::RunningMigrations).unwrap();
    assert_eq!(json, "\"RUNNING_MIGRATIONS\"");
}
