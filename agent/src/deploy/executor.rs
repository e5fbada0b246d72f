//! Deployment executor

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::build::{
    BuildOptions, Builder, ContainerBuilder, ServiceBuilder, ServiceKind, StaticSiteBuilder,
};
use crate::deploy::compose::{ComposeOptions, ContainerDeployment};
use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};
use crate::deploy::health::{HealthOptions, HealthVerifier};
use crate::deploy::placement::{Placement, PlacementManager, DEFAULT_RETENTION};
use crate::deploy::provision::Provisioner;
use crate::deploy::reconciler::{ProcessReconciler, ReconcileOptions};
use crate::deploy::sync::SourceSync;
use crate::errors::DeployError;
use crate::exec::CommandRunner;
use crate::http::HttpProbe;
use crate::models::{DeploymentContext, ProjectShape, RepoConfig};
use crate::tools::certbot::{Certbot, CertbotOptions};
use crate::tools::compose::Compose;
use crate::tools::nginx::{Nginx, NginxOptions};
use crate::tools::pm2::{Pm2, StartSpec};

/// Everything a run needs besides its context
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub build: BuildOptions,
    pub reconcile: ReconcileOptions,
    pub health: HealthOptions,
    pub compose: ComposeOptions,
    pub nginx: NginxOptions,
    pub certbot: CertbotOptions,
    pub backup_root: PathBuf,
    pub backup_retention: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            build: BuildOptions::default(),
            reconcile: ReconcileOptions::default(),
            health: HealthOptions::default(),
            compose: ComposeOptions::default(),
            nginx: NginxOptions::default(),
            certbot: CertbotOptions::default(),
            backup_root: PathBuf::from("/var/tmp/deployment-backups"),
            backup_retention: DEFAULT_RETENTION,
        }
    }
}

/// Deployment path, chosen once from the repository config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPlan {
    Client,
    Server,
    Fullstack,
    Containers,
}

impl DeployPlan {
    pub fn for_config(config: &RepoConfig) -> Self {
        match (config.shape, config.combined) {
            (ProjectShape::Containerized, _) => DeployPlan::Containers,
            (_, true) => DeployPlan::Fullstack,
            (ProjectShape::Static, false) => DeployPlan::Client,
            _ => DeployPlan::Server,
        }
    }
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The working copy already matched the remote
    UpToDate,
    Deployed,
}

/// Runs one deployment: sync, build, place, reconcile, verify
pub struct DeploymentExecutor {
    ctx: DeploymentContext,
    options: DeployOptions,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn HttpProbe>,
    fsm: DeploymentFsm,
    pm2: Pm2,
    placement: PlacementManager,
    provisioner: Provisioner,
}

impl DeploymentExecutor {
    /// Create a new executor
    pub fn new(
        ctx: DeploymentContext,
        options: DeployOptions,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn HttpProbe>,
    ) -> Self {
        let nginx = Arc::new(Nginx::new(options.nginx.clone(), runner.clone()));
        let placement = PlacementManager::new(&options.backup_root, nginx.clone())
            .with_retention(options.backup_retention);
        let certbot = Certbot::new(options.certbot.clone(), runner.clone());

        Self {
            pm2: Pm2::new(runner.clone()),
            provisioner: Provisioner::new(nginx, certbot),
            placement,
            fsm: DeploymentFsm::new(),
            ctx,
            options,
            runner,
            probe,
        }
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.ctx
    }

    /// Get the current deployment state
    pub fn state(&self) -> DeploymentState {
        self.fsm.state()
    }

    pub fn history(&self) -> &[DeploymentState] {
        self.fsm.history()
    }

    pub fn placement(&self) -> &PlacementManager {
        &self.placement
    }

    /// Run the deployment to a terminal state
    pub async fn run(&mut self) -> Result<RunOutcome, DeployError> {
        info!("Starting deployment {} for {}", self.ctx.deployment_id, self.ctx.repo_name);
        info!(
            "Branch: {} | Commit: {} | Pusher: {} | Shape: {:?} | Combined: {}",
            self.ctx.branch,
            self.ctx.short_commit(),
            self.ctx.pusher,
            self.ctx.config.shape,
            self.ctx.config.combined
        );

        let mut sync = SourceSync::new(&self.ctx, self.runner.clone());
        let result = self.run_stages(&mut sync).await;
        sync.restore_stash().await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Deployment failed: {}", e);
                if let Err(fsm_err) = self.fsm.process(DeploymentEvent::Fail(e.to_string())) {
                    warn!("{}", fsm_err);
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self, sync: &mut SourceSync) -> Result<RunOutcome, DeployError> {
        sync.prepare().await?;

        self.fsm.process(DeploymentEvent::Fetch)?;
        sync.fetch().await?;

        if !sync.has_updates().await? {
            info!("No changes to deploy, {} is up to date", self.ctx.repo_name);
            sync.restore_stash().await;
            self.fsm.process(DeploymentEvent::UpToDate)?;
            return Ok(RunOutcome::UpToDate);
        }

        self.fsm.process(DeploymentEvent::Pull)?;
        sync.pull().await?;
        sync.restore_stash().await;

        let config = self.ctx.config.clone();
        match DeployPlan::for_config(&config) {
            DeployPlan::Client => {
                self.fsm.process(DeploymentEvent::DeployClient)?;
                self.deploy_client(&config).await?;
            }
            DeployPlan::Server => {
                self.fsm.process(DeploymentEvent::DeployServer)?;
                self.deploy_server(&config).await?;
            }
            DeployPlan::Fullstack => {
                self.fsm.process(DeploymentEvent::DeployFullstack)?;

                info!("Step 1/2: deploying server");
                self.fsm.process(DeploymentEvent::DeployServer)?;
                self.deploy_server(&config.server_leg()).await?;

                info!("Step 2/2: deploying client");
                self.fsm.process(DeploymentEvent::DeployClient)?;
                self.deploy_client(&config).await?;
            }
            DeployPlan::Containers => self.deploy_containers(&config).await?,
        }

        self.fsm.process(DeploymentEvent::Complete)?;
        info!(
            "Deployed {} ({}) from {}",
            self.ctx.repo_name,
            self.ctx.short_commit(),
            self.ctx.branch
        );
        Ok(RunOutcome::Deployed)
    }

    fn verifier(&self) -> HealthVerifier<'_> {
        HealthVerifier::new(&self.pm2, self.probe.as_ref(), self.options.health.clone())
    }

    async fn deploy_client(&self, config: &RepoConfig) -> Result<(), DeployError> {
        PlacementManager::guard_target(&config.web_root)?;

        let client_dir = config.client_path();
        info!("Client directory: {}", client_dir.display());

        let build = Builder::Static(StaticSiteBuilder::new(&client_dir, self.runner.clone()))
            .build()
            .await?;

        self.provisioner.static_site(config).await;

        let placement = self.placement.place(&build.output_dir, &config.web_root).await?;

        if let Err(e) = self.verifier().verify(config.domain(), None).await {
            error!("Health check failed: {}", e);
            return Err(self.roll_back_placement(placement, &config.web_root, e).await);
        }
        Ok(())
    }

    async fn roll_back_placement(
        &self,
        placement: Placement,
        target: &Path,
        original: DeployError,
    ) -> DeployError {
        let Some(backup) = placement.backup else {
            warn!("No backup of {} available, cannot roll back", target.display());
            return original;
        };

        warn!("Rolling back {} from {}", target.display(), backup.path.display());
        match self.placement.restore(&backup, target).await {
            Ok(()) => {
                info!("Rollback completed, previous release restored");
                DeployError::RolledBack {
                    original: Box::new(original),
                }
            }
            Err(rollback) => {
                error!("Rollback failed: {}", rollback);
                DeployError::StateInconsistency {
                    original: Box::new(original),
                    rollback: Box::new(rollback),
                }
            }
        }
    }

    async fn deploy_server(&self, config: &RepoConfig) -> Result<(), DeployError> {
        if !self.pm2.is_installed().await {
            return Err(DeployError::Precondition("pm2 is not installed".to_string()));
        }

        let server_dir = config.server_path();
        info!("Server directory: {}", server_dir.display());

        let kind = match config.shape {
            ProjectShape::ServiceTranspiled => ServiceKind::Transpiled,
            _ => ServiceKind::Untranspiled,
        };
        let build = Builder::Service(ServiceBuilder::new(
            &server_dir,
            kind,
            &config.server_entry,
            self.options.build.clone(),
            self.runner.clone(),
        ))
        .build()
        .await?;

        self.provisioner.reverse_proxy(config).await;

        let start = StartSpec {
            name: config.name.clone(),
            work_dir: server_dir,
            descriptor: config.process_descriptor.clone(),
            entry: build.entry,
        };
        ProcessReconciler::new(&self.pm2, start, self.options.reconcile.clone())
            .deploy()
            .await?;

        self.verifier()
            .verify(config.domain(), Some(&config.name))
            .await
    }

    async fn deploy_containers(&mut self, config: &RepoConfig) -> Result<(), DeployError> {
        self.fsm.process(DeploymentEvent::BuildDocker)?;

        let compose = Arc::new(
            Compose::new(
                config.server_path(),
                config.compose_file.as_deref(),
                config.env_file.as_deref(),
                self.runner.clone(),
            )
            .detect_program()
            .await,
        );
        info!(
            "Compose directory: {} | file: {}",
            compose.work_dir().display(),
            compose.compose_file()
        );

        Builder::Container(ContainerBuilder::new(compose.clone()))
            .build()
            .await?;

        self.fsm.process(DeploymentEvent::DeployDocker)?;
        let deployment = ContainerDeployment::new(&compose, self.options.compose.clone());

        if let Err(e) = deployment.deploy().await {
            error!("Container deployment failed: {}", e);
            return Err(roll_back_containers(&deployment, e).await);
        }

        if config.requires_migrations {
            self.fsm.process(DeploymentEvent::RunMigrations)?;
            deployment
                .run_migrations(config.migration_command.as_deref(), &config.migration_service)
                .await?;
        }

        self.provisioner.reverse_proxy(config).await;

        if let Err(e) = self.verify_containers(&compose, config).await {
            error!("Container verification failed: {}", e);
            return Err(roll_back_containers(&deployment, e).await);
        }

        info!("Container deployment completed");
        Ok(())
    }

    async fn verify_containers(&self, compose: &Compose, config: &RepoConfig) -> Result<(), DeployError> {
        compose.check_health().await?;

        if let Some(url) = config.health_check_target() {
            self.verifier().check_http(&url).await?;
        }
        Ok(())
    }
}

async fn roll_back_containers(deployment: &ContainerDeployment<'_>, original: DeployError) -> DeployError {
    deployment.dump_failure_logs().await;

    match deployment.rollback().await {
        Ok(()) => original,
        Err(rollback) => {
            error!("Container rollback failed: {}", rollback);
            DeployError::StateInconsistency {
                original: Box::new(original),
                rollback: Box::new(rollback),
            }
        }
    }
}
