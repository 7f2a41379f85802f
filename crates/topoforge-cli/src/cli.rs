//! Command-line interface for the topoforge utility
//!
//! Provides a CLI to validate topology projects and generate Docker Compose
//! and Terraform files from them.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::colorizer::{error_line, ok_line, paint, warning_line, Tone};
use crate::table::Table;
use topoforge::core::logging::init_logging;
use topoforge::core::naming::slug_or;
use topoforge::export::{ArtifactNames, ExportConfig, ExportEngine};
use topoforge::project::{load_project, to_json_string, LoadedProject, ProjectMeta};
use topoforge::{kind_schemas, DeviceKind, Topology, TopologyError};

/// Topoforge - Generate infrastructure code from network topologies
#[derive(Parser)]
#[command(name = "topoforge")]
#[command(about = "Validate network topology projects and export Docker Compose and Terraform files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Set log level (trace|debug|info|warn|error)
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Set log format (compact|pretty|json)
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// When to use colors in diagnostics
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    pub color: ColorChoice,
}

/// Log level options
#[derive(Copy, Clone, Debug, clap::ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format options
#[derive(Copy, Clone, Debug, clap::ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate Docker Compose and Terraform files from a project
    Export {
        /// Project file (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for the generated files (defaults to the project's directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Base name of the generated files (defaults to the project file stem)
        #[arg(long)]
        base: Option<String>,

        /// Which artifacts to generate
        #[arg(long, value_enum, default_value_t = ArtifactChoice::All)]
        only: ArtifactChoice,

        /// Print the artifact to stdout instead of writing files
        #[arg(long)]
        stdout: bool,

        /// Compose project name
        #[arg(long)]
        project_name: Option<String>,

        /// Driver of the generated networks
        #[arg(long, default_value = "bridge")]
        network_driver: String,

        /// Version constraint for the Terraform Docker provider
        #[arg(long, default_value = "~> 3.0")]
        provider_version: String,
    },

    /// Check a project and report every export problem
    Validate {
        /// Project file to validate (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Summarize the devices and connections of a project
    Inspect {
        /// Project file to inspect (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Show in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show supported device kinds and their defaults
    Kinds {
        /// Show in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Rewrite a project in the current format
    Convert {
        /// Project file to convert (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create an empty project file
    New {
        /// File to create
        output: PathBuf,

        /// Project name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,

        /// Project description
        #[arg(long, default_value = "")]
        description: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Artifacts produced by `export`
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq, Default)]
pub enum ArtifactChoice {
    /// Compose file and Terraform file
    #[default]
    All,
    Compose,
    Terraform,
}

/// When to colorize output
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Use colors if stderr is a terminal and NO_COLOR is not set
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Serialize)]
struct DeviceSummary {
    id: String,
    name: String,
    kind: &'static str,
    image: Option<String>,
    service: bool,
    networks: Vec<String>,
}

#[derive(Serialize)]
struct ConnectionSummary {
    id: String,
    source: String,
    target: String,
    network: String,
}

#[derive(Serialize)]
struct ProjectSummary {
    name: String,
    description: String,
    legacy: bool,
    devices: Vec<DeviceSummary>,
    connections: Vec<ConnectionSummary>,
    networks: Vec<String>,
}

impl ProjectSummary {
    fn new(loaded: &LoadedProject) -> Self {
        let topology = &loaded.topology;
        let name_of = |id| {
            topology
                .device(id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| id.to_string())
        };

        let devices = topology
            .devices()
            .map(|device| {
                let mut networks: Vec<String> = topology
                    .connections_of(device.id)
                    .into_iter()
                    .map(|c| c.network.clone())
                    .collect();
                networks.sort();
                networks.dedup();
                DeviceSummary {
                    id: device.id.to_string(),
                    name: device.name.clone(),
                    kind: device.kind.token(),
                    image: device.config.image.clone(),
                    service: device.renders_service(),
                    networks,
                }
            })
            .collect();

        let connections = topology
            .connections()
            .map(|conn| ConnectionSummary {
                id: conn.id.to_string(),
                source: name_of(conn.source),
                target: name_of(conn.target),
                network: conn.network.clone(),
            })
            .collect();

        Self {
            name: loaded.meta.name.clone(),
            description: loaded.meta.description.clone(),
            legacy: loaded.legacy,
            devices,
            connections,
            networks: topology.network_names(),
        }
    }
}

/// Main CLI application
pub struct TopoforgeApp {
    color: bool,
}

impl TopoforgeApp {
    /// Create a new application instance with colors disabled
    pub fn new() -> Self {
        Self { color: false }
    }

    /// Run the application with the given CLI arguments
    pub fn run(&mut self, cli: Cli) -> Result<()> {
        // Environment variables take precedence over flags
        let log_level_str = std::env::var("TOPOFORGE_LOG_LEVEL")
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .or_else(|| Some(cli.log_level.as_str().to_string()));

        let log_format_str = std::env::var("TOPOFORGE_LOG_FORMAT")
            .ok()
            .or_else(|| Some(cli.log_format.as_str().to_string()));

        if let Err(e) = init_logging(log_level_str.as_deref(), log_format_str.as_deref()) {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        self.color = should_colorize(cli.color);

        if cli.verbose {
            eprintln!("Topoforge v{}", env!("CARGO_PKG_VERSION"));
        }

        match cli.command {
            Commands::Export {
                input,
                out_dir,
                base,
                only,
                stdout,
                project_name,
                network_driver,
                provider_version,
            } => {
                let mut config = ExportConfig::new()
                    .with_network_driver(network_driver)
                    .with_provider("kreuzwerker/docker", provider_version);
                if let Some(name) = project_name {
                    config = config.with_project_name(name);
                }
                self.export_command(input, out_dir, base, only, stdout, config, cli.verbose)
            }
            Commands::Validate { input } => self.validate_command(input, cli.verbose),
            Commands::Inspect { input, json } => self.inspect_command(input, json),
            Commands::Kinds { json } => self.kinds_command(json),
            Commands::Convert { input, output } => self.convert_command(input, output),
            Commands::New {
                output,
                name,
                description,
                force,
            } => self.new_command(&output, name, description, force),
        }
    }

    fn load(&self, input: Option<PathBuf>, verbose: bool) -> Result<LoadedProject> {
        let label = input
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let content = self.read_input(input)?;

        if verbose {
            eprintln!("Read {} bytes of input", content.len());
        }

        let loaded = load_project(&content)
            .with_context(|| format!("Failed to load project '{}'", label))?;
        debug!(
            input = %label,
            devices = loaded.topology.device_count(),
            connections = loaded.topology.connection_count(),
            legacy = loaded.legacy,
            "Project loaded"
        );
        if loaded.legacy {
            eprintln!(
                "{}",
                warning_line(
                    &format!("'{}' uses the version 1 layout; run `topoforge convert` to upgrade it", label),
                    self.color
                )
            );
        }
        for warning in &loaded.warnings {
            eprintln!("{}", warning_line(warning, self.color));
        }
        Ok(loaded)
    }

    /// Handle the export command
    #[allow(clippy::too_many_arguments)]
    fn export_command(
        &self,
        input: Option<PathBuf>,
        out_dir: Option<PathBuf>,
        base: Option<String>,
        only: ArtifactChoice,
        stdout: bool,
        config: ExportConfig,
        verbose: bool,
    ) -> Result<()> {
        if stdout && only == ArtifactChoice::All {
            bail!("--stdout needs --only compose or --only terraform");
        }

        let source = input.clone().filter(|p| p.to_string_lossy() != "-");
        let loaded = self.load(input, verbose)?;

        let engine = ExportEngine::new(config);
        let bundle = match engine.export(&loaded.topology) {
            Ok(bundle) => bundle,
            Err(TopologyError::Export(report)) => {
                for issue in &report.issues {
                    eprintln!("{}", error_line(&issue.to_string(), self.color));
                }
                return Err(anyhow!("Export failed with {} issue(s)", report.issues.len()));
            }
            Err(e) => return Err(e.into()),
        };
        for warning in &bundle.warnings {
            eprintln!("{}", warning_line(&warning.to_string(), self.color));
        }

        if stdout {
            let text = match only {
                ArtifactChoice::Terraform => &bundle.terraform,
                _ => &bundle.compose,
            };
            return self.write_output(None, text);
        }

        let base = base.unwrap_or_else(|| default_base(source.as_deref(), &loaded.meta));
        let dir = out_dir
            .or_else(|| source.as_deref().and_then(Path::parent).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let names = ArtifactNames::for_base(&base);
        debug!(dir = %dir.display(), %base, ?only, "Writing artifacts");

        let mut artifacts = Vec::new();
        if only != ArtifactChoice::Terraform {
            artifacts.push((dir.join(&names.compose), bundle.compose.as_str()));
        }
        if only != ArtifactChoice::Compose {
            artifacts.push((dir.join(&names.terraform), bundle.terraform.as_str()));
        }
        for path in write_artifacts(&dir, &artifacts)? {
            eprintln!("{}", ok_line(&format!("Wrote {}", path.display()), self.color));
        }
        Ok(())
    }

    /// Handle the validate command
    fn validate_command(&self, input: Option<PathBuf>, verbose: bool) -> Result<()> {
        let loaded = self.load(input, verbose)?;
        let topology = &loaded.topology;

        match ExportEngine::default().plan(topology) {
            Ok(plan) => {
                for warning in &plan.warnings {
                    println!("{}", warning_line(&warning.to_string(), self.color));
                }
                println!(
                    "{}",
                    ok_line(
                        &format!(
                            "Valid project '{}': {} device(s), {} connection(s), {} service(s)",
                            loaded.meta.name,
                            topology.device_count(),
                            topology.connection_count(),
                            plan.services.len()
                        ),
                        self.color
                    )
                );
                Ok(())
            }
            Err(TopologyError::Export(report)) => {
                for issue in &report.issues {
                    println!("{}", error_line(&issue.to_string(), self.color));
                }
                Err(anyhow!(
                    "Project '{}' has {} issue(s)",
                    loaded.meta.name,
                    report.issues.len()
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Handle the inspect command
    fn inspect_command(&self, input: Option<PathBuf>, json: bool) -> Result<()> {
        let loaded = self.load(input, false)?;
        let summary = ProjectSummary::new(&loaded);

        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        println!("{}", paint(&summary.name, Tone::Heading, self.color));
        if !summary.description.is_empty() {
            println!("{}", summary.description);
        }
        println!();

        let mut devices = Table::new(["NAME", "KIND", "IMAGE", "SERVICE", "NETWORKS"]);
        for device in &summary.devices {
            devices.push_row([
                device.name.clone(),
                device.kind.to_string(),
                device.image.clone().unwrap_or_else(|| "-".to_string()),
                if device.service { "yes" } else { "no" }.to_string(),
                device.networks.join(", "),
            ]);
        }
        print!("{}", devices.render(self.color));

        if !summary.connections.is_empty() {
            println!();
            let mut connections = Table::new(["SOURCE", "TARGET", "NETWORK"]);
            for conn in &summary.connections {
                connections.push_row([conn.source.as_str(), conn.target.as_str(), conn.network.as_str()]);
            }
            print!("{}", connections.render(self.color));
        }

        println!();
        println!(
            "Total: {} device(s), {} connection(s), {} network(s)",
            summary.devices.len(),
            summary.connections.len(),
            summary.networks.len()
        );
        Ok(())
    }

    /// Handle the kinds command
    fn kinds_command(&self, json: bool) -> Result<()> {
        let schemas = kind_schemas();

        if json {
            let kinds: Vec<_> = schemas
                .iter()
                .map(|schema| {
                    serde_json::json!({
                        "name": schema.kind.token(),
                        "role": kind_role(schema.kind),
                        "description": schema.summary,
                        "service": schema.service_by_default,
                        "cpus": schema.default_cpus,
                        "memory": schema.default_memory.map(|m| m.to_string()),
                        "restart": schema.default_restart.token(),
                        "interface": schema.default_interface,
                    })
                })
                .collect();
            let output = serde_json::json!({ "kinds": kinds, "total": schemas.len() });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        let mut table = Table::new([
            "KIND",
            "ROLE",
            "SERVICE",
            "CPUS",
            "MEMORY",
            "INTERFACE",
            "DESCRIPTION",
        ]);
        for schema in schemas {
            table.push_row([
                schema.kind.token().to_string(),
                kind_role(schema.kind).to_string(),
                if schema.service_by_default { "yes" } else { "no" }.to_string(),
                schema
                    .default_cpus
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                schema
                    .default_memory
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                schema.default_interface.unwrap_or("-").to_string(),
                schema.summary.to_string(),
            ]);
        }
        print!("{}", table.render(self.color));
        Ok(())
    }

    /// Handle the convert command
    fn convert_command(&self, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
        let loaded = self.load(input, false)?;
        let text = to_json_string(&loaded.topology, &loaded.meta)?;
        self.write_output(output, &text)
    }

    /// Handle the new command
    fn new_command(
        &self,
        output: &Path,
        name: Option<String>,
        description: String,
        force: bool,
    ) -> Result<()> {
        if output.exists() && !force {
            bail!(
                "'{}' already exists; pass --force to overwrite it",
                output.display()
            );
        }
        let name = name.unwrap_or_else(|| {
            output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled Project".to_string())
        });
        let meta = ProjectMeta::named(name).with_description(description);
        let text = to_json_string(&Topology::new(), &meta)?;
        self.write_output(Some(output.to_path_buf()), &text)?;
        eprintln!(
            "{}",
            ok_line(&format!("Created {}", output.display()), self.color)
        );
        Ok(())
    }

    /// Read input from file or stdin
    pub fn read_input(&self, input: Option<PathBuf>) -> Result<String> {
        match input {
            Some(path) if path.to_string_lossy() != "-" => fs::read_to_string(&path)
                .map_err(|e| anyhow!("Failed to read input file '{}': {}", path.display(), e)),
            _ => {
                let mut content = String::new();
                io::stdin().read_to_string(&mut content)?;
                Ok(content)
            }
        }
    }

    /// Write output to file or stdout
    pub fn write_output(&self, output: Option<PathBuf>, content: &str) -> Result<()> {
        match output {
            Some(path) if path.to_string_lossy() != "-" => {
                fs::write(&path, content).map_err(|e| {
                    anyhow!("Failed to write output file '{}': {}", path.display(), e)
                })?;
            }
            _ => {
                let mut stdout = io::stdout();
                stdout.write_all(content.as_bytes())?;
                if !content.is_empty() && !content.ends_with('\n') {
                    stdout.write_all(b"\n")?;
                }
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

impl Default for TopoforgeApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Write every artifact or none of them
///
/// Contents are staged in temporary files inside `dir` first. If moving one
/// into place fails, the artifacts already moved are removed again.
fn write_artifacts(dir: &Path, artifacts: &[(PathBuf, &str)]) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(artifacts.len());
    for (path, content) in artifacts {
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        // Temporary files are created owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .with_context(|| format!("Failed to set permissions for {}", path.display()))?;
        }
        staged.push((file, path));
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (file, path) in staged {
        if let Err(e) = file.persist(path) {
            for done in &written {
                if let Err(cleanup) = fs::remove_file(done) {
                    debug!(path = %done.display(), error = %cleanup, "Failed to remove artifact");
                }
            }
            return Err(e.error).with_context(|| format!("Failed to write {}", path.display()));
        }
        written.push(path.clone());
    }
    Ok(written)
}

/// Role column for the kinds listing
fn kind_role(kind: DeviceKind) -> &'static str {
    if kind.is_network_gear() {
        "network"
    } else {
        "workload"
    }
}

/// Base name for artifacts: the project file stem, else the project name slug
fn default_base(source: Option<&Path>, meta: &ProjectMeta) -> String {
    source
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| slug_or(&meta.name, "topology"))
}

/// Determine if diagnostics on stderr should be colored
fn should_colorize(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                return false;
            }
            crossterm::tty::IsTty::is_tty(&std::io::stderr())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use topoforge::prelude::*;

    fn sample_project(dir: &Path) -> PathBuf {
        let mut store = TopologyStore::new();
        let web = store
            .add_device_from_template(DeviceKind::Computer, "web", Position::default())
            .unwrap();
        let db = store
            .add_device_from_template(DeviceKind::Database, "db", Position::default())
            .unwrap();
        store
            .update_device(web, &DeviceUpdate::new().image(Some("nginx:latest")))
            .unwrap();
        store
            .update_device(db, &DeviceUpdate::new().image(Some("postgres:15")))
            .unwrap();
        store.add_connection(web, db, Some("backend")).unwrap();

        let path = dir.join("lab.json");
        let text = to_json_string(store.topology(), &ProjectMeta::named("lab")).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_cli_parsing_export_command() {
        let args = vec![
            "topoforge",
            "export",
            "--input",
            "lab.json",
            "--out-dir",
            "out",
            "--only",
            "terraform",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Export {
                input,
                out_dir,
                only,
                stdout,
                network_driver,
                provider_version,
                ..
            } => {
                assert_eq!(input.unwrap().to_string_lossy(), "lab.json");
                assert_eq!(out_dir.unwrap().to_string_lossy(), "out");
                assert_eq!(only, ArtifactChoice::Terraform);
                assert!(!stdout);
                assert_eq!(network_driver, "bridge"); // default
                assert_eq!(provider_version, "~> 3.0"); // default
            }
            _ => panic!("Expected Export command"),
        }
    }

    #[test]
    fn test_cli_parsing_kinds_command() {
        let cli = Cli::try_parse_from(["topoforge", "kinds", "--json"]).unwrap();
        match cli.command {
            Commands::Kinds { json } => assert!(json),
            _ => panic!("Expected Kinds command"),
        }
    }

    #[test]
    fn test_cli_parsing_new_command() {
        let cli = Cli::try_parse_from(["topoforge", "new", "lab.json", "--name", "Lab"]).unwrap();
        match cli.command {
            Commands::New {
                output, name, force, ..
            } => {
                assert_eq!(output.to_string_lossy(), "lab.json");
                assert_eq!(name.as_deref(), Some("Lab"));
                assert!(!force);
            }
            _ => panic!("Expected New command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["topoforge", "--verbose", "validate", "--color", "never"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_export_writes_companion_files() {
        let dir = tempdir().unwrap();
        let project = sample_project(dir.path());
        let app = TopoforgeApp::new();

        app.export_command(
            Some(project),
            None,
            None,
            ArtifactChoice::All,
            false,
            ExportConfig::default(),
            false,
        )
        .unwrap();

        let compose = fs::read_to_string(dir.path().join("lab-compose.yml")).unwrap();
        let terraform = fs::read_to_string(dir.path().join("lab.tf")).unwrap();
        assert!(compose.contains("nginx:latest"));
        assert!(terraform.contains("resource \"docker_network\" \"backend\""));
    }

    #[test]
    fn test_kind_roles() {
        assert_eq!(kind_role(DeviceKind::Router), "network");
        assert_eq!(kind_role(DeviceKind::Firewall), "network");
        assert_eq!(kind_role(DeviceKind::Database), "workload");
        assert_eq!(kind_role(DeviceKind::LoadBalancer), "workload");
    }

    #[test]
    fn test_failed_export_leaves_no_partial_artifacts() {
        let dir = tempdir().unwrap();
        let project = sample_project(dir.path());
        // A directory in the way of the terraform file
        fs::create_dir(dir.path().join("lab.tf")).unwrap();
        let app = TopoforgeApp::new();

        let err = app
            .export_command(
                Some(project),
                None,
                None,
                ArtifactChoice::All,
                false,
                ExportConfig::default(),
                false,
            )
            .unwrap_err();
        assert!(err.to_string().contains("lab.tf"), "{:#}", err);

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["lab.json".to_string(), "lab.tf".to_string()]);
    }

    #[test]
    fn test_export_stdout_requires_single_artifact() {
        let dir = tempdir().unwrap();
        let project = sample_project(dir.path());
        let app = TopoforgeApp::new();
        let err = app
            .export_command(
                Some(project),
                None,
                None,
                ArtifactChoice::All,
                true,
                ExportConfig::default(),
                false,
            )
            .unwrap_err();
        assert!(err.to_string().contains("--only"));
    }

    #[test]
    fn test_validate_reports_missing_image() {
        let dir = tempdir().unwrap();
        let mut store = TopologyStore::new();
        store
            .add_device_from_template(DeviceKind::Computer, "web", Position::default())
            .unwrap();
        let path = dir.path().join("broken.json");
        fs::write(
            &path,
            to_json_string(store.topology(), &ProjectMeta::named("broken")).unwrap(),
        )
        .unwrap();

        let app = TopoforgeApp::new();
        let err = app.validate_command(Some(path), false).unwrap_err();
        assert!(err.to_string().contains("1 issue"));
    }

    #[test]
    fn test_convert_upgrades_legacy_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("old.json");
        let output = dir.path().join("new.json");
        fs::write(
            &input,
            r#"{"name": "old", "version": "1.0.0", "devices": {}, "connections": {}}"#,
        )
        .unwrap();

        let app = TopoforgeApp::new();
        app.convert_command(Some(input), Some(output.clone())).unwrap();
        let text = fs::read_to_string(&output).unwrap();
        let loaded = load_project(&text).unwrap();
        assert!(!loaded.legacy);
        assert_eq!(loaded.meta.name, "old");
    }

    #[test]
    fn test_new_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lab.json");
        let app = TopoforgeApp::new();

        app.new_command(&path, None, String::new(), false).unwrap();
        let loaded = load_project(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.meta.name, "lab");

        assert!(app.new_command(&path, None, String::new(), false).is_err());
        assert!(app.new_command(&path, Some("again".into()), String::new(), true).is_ok());
    }

    #[test]
    fn test_default_base() {
        let meta = ProjectMeta::named("My Lab");
        assert_eq!(default_base(Some(Path::new("/tmp/office.json")), &meta), "office");
        assert_eq!(default_base(None, &meta), "my-lab");
    }

    #[test]
    fn test_kinds_command_formats() {
        let app = TopoforgeApp::new();
        assert!(app.kinds_command(true).is_ok());
        assert!(app.kinds_command(false).is_ok());
    }

    #[test]
    fn test_read_input_from_file() {
        let app = TopoforgeApp::new();
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.json");
        fs::write(&path, "{}").unwrap();
        assert_eq!(app.read_input(Some(path)).unwrap(), "{}");
    }
}
