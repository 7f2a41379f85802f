//! Infrastructure export
//!
//! Turns a topology snapshot into a Docker Compose file and an equivalent
//! Terraform configuration. Export is a pure function of the snapshot and
//! the [`ExportConfig`]: identical inputs give byte-identical artifacts, and
//! if anything is wrong neither artifact is produced.

mod compose;
mod plan;
mod report;
mod terraform;

use std::sync::Arc;
use std::thread;

use tracing::{info, span, Level};

pub use compose::ComposeExporter;
pub use plan::{ExportPlan, NetworkAttachment, NetworkPlan, ServicePlan, VolumePlan};
pub use report::{ExportIssue, ExportReport, ExportWarning};
pub use terraform::TerraformExporter;

use crate::core::{Result, Topology, TopologyError};

/// A renderer for one artifact
pub trait Exporter: Send + Sync {
    /// Short artifact name used in diagnostics
    fn name(&self) -> &'static str;

    /// Render the artifact text for a validated plan
    fn render(&self, plan: &ExportPlan) -> std::result::Result<String, ExportIssue>;
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Written as the compose `name` key when set
    pub project_name: Option<String>,
    /// Driver of every generated network
    pub network_driver: String,
    /// Terraform registry source of the Docker provider
    pub provider_source: String,
    /// Version constraint of the Docker provider
    pub provider_version: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            project_name: None,
            network_driver: "bridge".to_string(),
            provider_source: "kreuzwerker/docker".to_string(),
            provider_version: "~> 3.0".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn with_network_driver(mut self, driver: impl Into<String>) -> Self {
        self.network_driver = driver.into();
        self
    }

    pub fn with_provider(mut self, source: impl Into<String>, version: impl Into<String>) -> Self {
        self.provider_source = source.into();
        self.provider_version = version.into();
        self
    }
}

/// Generated artifacts plus any warnings raised while planning
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBundle {
    pub compose: String,
    pub terraform: String,
    pub warnings: Vec<ExportWarning>,
}

/// Companion file names for a project's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub compose: String,
    pub terraform: String,
}

impl ArtifactNames {
    /// `<base>-compose.yml` and `<base>.tf`
    pub fn for_base(base: &str) -> Self {
        Self {
            compose: format!("{}-compose.yml", base),
            terraform: format!("{}.tf", base),
        }
    }
}

/// Plans and renders both artifacts
#[derive(Debug, Clone, Default)]
pub struct ExportEngine {
    config: ExportConfig,
}

impl ExportEngine {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Validate and plan without rendering
    pub fn plan(&self, topology: &Topology) -> Result<ExportPlan> {
        ExportPlan::build(topology, &self.config).map_err(TopologyError::Export)
    }

    /// Produce both artifacts, or an error listing every issue
    pub fn export(&self, topology: &Topology) -> Result<ExportBundle> {
        let export_span = span!(
            Level::INFO,
            "export",
            device_count = topology.device_count(),
            connection_count = topology.connection_count()
        );
        let _enter = export_span.enter();

        let plan = self.plan(topology)?;

        let compose_exporter = ComposeExporter::new();
        let terraform_exporter = TerraformExporter::new(
            self.config.provider_source.clone(),
            self.config.provider_version.clone(),
        );

        let mut issues = Vec::new();
        let compose = compose_exporter.render(&plan).map_err(|i| issues.push(i)).ok();
        let terraform = terraform_exporter.render(&plan).map_err(|i| issues.push(i)).ok();

        match (compose, terraform) {
            (Some(compose), Some(terraform)) if issues.is_empty() => {
                info!(
                    services = plan.services.len(),
                    networks = plan.networks.len(),
                    warnings = plan.warnings.len(),
                    "Export completed"
                );
                Ok(ExportBundle {
                    compose,
                    terraform,
                    warnings: plan.warnings,
                })
            }
            _ => Err(TopologyError::Export(ExportReport::new(issues))),
        }
    }

    /// Export a snapshot on a worker thread.
    ///
    /// The snapshot is immutable, so the caller may keep editing the store
    /// while the export runs.
    pub fn spawn(&self, snapshot: Arc<Topology>) -> thread::JoinHandle<Result<ExportBundle>> {
        let engine = self.clone();
        thread::spawn(move || engine.export(&snapshot))
    }
}

/// Export with default settings
pub fn export(topology: &Topology) -> Result<ExportBundle> {
    ExportEngine::default().export(topology)
}
