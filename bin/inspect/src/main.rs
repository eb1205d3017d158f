//! Command line inspector for switchyard node wiring.
//!
//! Loads a workflow definition and a run-data snapshot from JSON files and
//! shows what one node would see: its input table, a resolved parameter, or
//! the output of a built-in control-flow kind. Results go to stdout as JSON,
//! logs go to stderr.

use clap::{Args, Parser, Subcommand};
use rootcause::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use switchyard_workflow::{
    ExecutionContext, ExecutionMetadata, NodeRegistry, NodeRuntime, ParameterOptions,
    RuntimeConfig, TemplateEvaluator, Workflow,
};
use tracing::info;

/// Inspect how a switchyard node is wired and parameterized
#[derive(Debug, Parser)]
#[command(name = "switchyard-inspect")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Runtime configuration file (JSON, YAML or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the node's assembled input table
    Wire(Target),

    /// Resolve one parameter for one input item
    Param {
        #[command(flatten)]
        target: Target,

        /// Dotted path into the node's parameters
        #[arg(long)]
        path: String,

        /// Index of the input item to evaluate against
        #[arg(long, default_value_t = 0)]
        item: usize,

        /// Return the stored value without evaluating expressions
        #[arg(long)]
        raw: bool,

        /// JSON value returned when the path is missing
        #[arg(long)]
        fallback: Option<String>,
    },

    /// Execute a built-in control-flow node and print its output
    Run(Target),
}

#[derive(Debug, Args)]
struct Target {
    /// Path to the workflow definition (JSON)
    #[arg(long)]
    workflow: PathBuf,

    /// Path to the recorded run data (JSON, node name to output set)
    #[arg(long)]
    run_data: PathBuf,

    /// Name of the node to inspect
    #[arg(long)]
    node: String,
}

/// Failures surfaced by the inspector.
#[derive(Debug)]
enum CliError {
    ReadFile { path: PathBuf },
    ParseFile { path: PathBuf },
    Config,
    UnknownNode { node: String },
    InvalidFallback,
    Parameter { path: String },
    Execution { node: String },
    Output,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFile { path } => write!(f, "failed to read {}", path.display()),
            Self::ParseFile { path } => write!(f, "failed to parse {}", path.display()),
            Self::Config => write!(f, "failed to load runtime configuration"),
            Self::UnknownNode { node } => write!(f, "workflow has no node named {node:?}"),
            Self::InvalidFallback => write!(f, "fallback is not valid JSON"),
            Self::Parameter { path } => write!(f, "failed to resolve parameter {path:?}"),
            Self::Execution { node } => write!(f, "node {node:?} failed"),
            Self::Output => write!(f, "failed to serialize output"),
        }
    }
}

impl std::error::Error for CliError {}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Report<CliError>> {
    let content = std::fs::read_to_string(path).context(CliError::ReadFile {
        path: path.to_path_buf(),
    })?;
    serde_json::from_str(&content).context(CliError::ParseFile {
        path: path.to_path_buf(),
    })
}

/// Workflow and run data loaded for one target node.
struct Loaded {
    workflow: Workflow,
    run_data: ExecutionContext,
    execution: ExecutionMetadata,
}

impl Loaded {
    fn from_target(target: &Target) -> Result<Self, Report<CliError>> {
        let workflow: Workflow = read_json(&target.workflow)?;
        let run_data: ExecutionContext = read_json(&target.run_data)?;
        if workflow.node(&target.node).is_none() {
            return Err(CliError::UnknownNode {
                node: target.node.clone(),
            }
            .into());
        }
        info!(
            workflow = %workflow.name,
            nodes = workflow.nodes.len(),
            recorded = run_data.len(),
            "loaded workflow"
        );
        Ok(Self {
            workflow,
            run_data,
            execution: ExecutionMetadata::default(),
        })
    }

    fn runtime<'a>(
        &'a self,
        node: &str,
        evaluator: &'a TemplateEvaluator,
        config: &'a RuntimeConfig,
    ) -> Result<NodeRuntime<'a>, Report<CliError>> {
        let definition = self.workflow.node(node).ok_or_else(|| CliError::UnknownNode {
            node: node.to_string(),
        })?;
        Ok(
            NodeRuntime::new(&self.workflow, definition, &self.run_data, &self.execution)
                .with_evaluator(evaluator)
                .with_config(config),
        )
    }
}

/// Runs one command and returns the JSON it prints.
fn execute(cli: &Cli) -> Result<JsonValue, Report<CliError>> {
    let config = RuntimeConfig::load(cli.config.as_deref()).context(CliError::Config)?;
    let evaluator = TemplateEvaluator::new();

    match &cli.command {
        Command::Wire(target) => {
            let loaded = Loaded::from_target(target)?;
            let runtime = loaded.runtime(&target.node, &evaluator, &config)?;
            serde_json::to_value(runtime.inputs()).context(CliError::Output)
        }
        Command::Param {
            target,
            path,
            item,
            raw,
            fallback,
        } => {
            let fallback = match fallback {
                Some(text) => serde_json::from_str(text).context(CliError::InvalidFallback)?,
                None => JsonValue::Null,
            };
            let options = if *raw {
                ParameterOptions::raw()
            } else {
                ParameterOptions::default()
            };
            let loaded = Loaded::from_target(target)?;
            let runtime = loaded.runtime(&target.node, &evaluator, &config)?;
            runtime
                .get_parameter_with(path, *item, fallback, options)
                .context(CliError::Parameter { path: path.clone() })
        }
        Command::Run(target) => {
            let loaded = Loaded::from_target(target)?;
            let runtime = loaded.runtime(&target.node, &evaluator, &config)?;
            let registry = NodeRegistry::with_control_flow();
            let failed = || CliError::Execution {
                node: target.node.clone(),
            };
            let node = registry.get(&runtime.node().kind).context(failed())?;
            let output = runtime.run(node.as_ref()).context(failed())?;
            info!(
                ports = output.port_count(),
                items = output.item_count(),
                "node executed"
            );
            serde_json::to_value(&output).context(CliError::Output)
        }
    }
}

fn main() -> Result<(), Report<CliError>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let value = execute(&cli)?;
    let rendered = serde_json::to_string_pretty(&value).context(CliError::Output)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_param_command() {
        let cli = Cli::try_parse_from([
            "switchyard-inspect",
            "param",
            "--workflow",
            "wf.json",
            "--run-data",
            "run.json",
            "--node",
            "Check",
            "--path",
            "conditions.0.leftValue",
            "--item",
            "2",
            "--raw",
        ])
        .expect("parse");
        match cli.command {
            Command::Param {
                target,
                path,
                item,
                raw,
                fallback,
            } => {
                assert_eq!(target.node, "Check");
                assert_eq!(path, "conditions.0.leftValue");
                assert_eq!(item, 2);
                assert!(raw);
                assert!(fallback.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    struct Files {
        _dir: tempfile::TempDir,
        workflow: PathBuf,
        run_data: PathBuf,
    }

    fn write_json(path: &Path, value: &JsonValue) {
        let mut file = std::fs::File::create(path).expect("create");
        file.write_all(value.to_string().as_bytes()).expect("write");
    }

    fn fixture() -> Files {
        let dir = tempfile::tempdir().expect("tempdir");
        let workflow = dir.path().join("workflow.json");
        let run_data = dir.path().join("run.json");
        write_json(
            &workflow,
            &json!({
                "name": "Orders",
                "nodes": [
                    { "name": "Fetch", "type": "manual" },
                    {
                        "name": "Check",
                        "type": "if",
                        "parameters": {
                            "conditions": [
                                { "leftValue": "={{ json.total }}", "operation": "larger", "rightValue": 100 }
                            ]
                        }
                    }
                ],
                "connections": {
                    "Fetch": { "main": [[{ "node": "Check", "index": 0 }]] }
                }
            }),
        );
        write_json(
            &run_data,
            &json!({
                "Fetch": [[{ "data": { "total": 150 } }, { "data": { "total": 5 } }]]
            }),
        );
        Files {
            _dir: dir,
            workflow,
            run_data,
        }
    }

    fn target(files: &Files, node: &str) -> Target {
        Target {
            workflow: files.workflow.clone(),
            run_data: files.run_data.clone(),
            node: node.to_string(),
        }
    }

    #[test]
    fn wire_prints_input_table() {
        let files = fixture();
        let cli = Cli {
            config: None,
            command: Command::Wire(target(&files, "Check")),
        };
        let value = execute(&cli).expect("wire");
        assert_eq!(value["main"][0].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn param_evaluates_against_item() {
        let files = fixture();
        let cli = Cli {
            config: None,
            command: Command::Param {
                target: target(&files, "Check"),
                path: "conditions.0.leftValue".to_string(),
                item: 1,
                raw: false,
                fallback: None,
            },
        };
        assert_eq!(execute(&cli).expect("param"), json!(5));
    }

    #[test]
    fn run_routes_items() {
        let files = fixture();
        let cli = Cli {
            config: None,
            command: Command::Run(target(&files, "Check")),
        };
        let value = execute(&cli).expect("run");
        assert_eq!(value[0][0]["data"], json!({ "total": 150 }));
        assert_eq!(value[1][0]["data"], json!({ "total": 5 }));
    }

    #[test]
    fn unknown_node_is_reported() {
        let files = fixture();
        let cli = Cli {
            config: None,
            command: Command::Wire(target(&files, "Missing")),
        };
        let err = execute(&cli).expect_err("unknown node");
        assert!(matches!(
            err.current_context(),
            CliError::UnknownNode { node } if node == "Missing"
        ));
    }
}
