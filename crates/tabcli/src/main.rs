use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tabcore::{ExecutionEvent, NodeKind, NodeSpec, Workflow};
use tabruntime::{build_plan, NodeRegistry, Runtime, RuntimeConfig};

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Tabular workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow definition file in-process
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Preview this node's output after the run
        #[arg(short, long)]
        preview: Option<String>,

        /// Row bound for the preview
        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow definition file without running it
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow definition
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

/// On-disk workflow definition: name plus node list. The `type` tag of each
/// node selects the variant and the remaining fields are its config.
#[derive(Debug, Serialize, Deserialize)]
struct WorkflowFile {
    name: String,
    nodes: Vec<NodeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeEntry {
    name: String,
    #[serde(flatten)]
    kind: NodeKind,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            preview,
            limit,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file, preview, limit).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn load_definition(file: &PathBuf) -> Result<WorkflowFile> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", file.display()))
}

fn default_runtime() -> Runtime {
    let mut registry = NodeRegistry::new();
    tabnodes::register_all(&mut registry);
    Runtime::with_registry(Arc::new(registry), RuntimeConfig::default())
}

async fn run_workflow(file: PathBuf, preview: Option<String>, limit: usize) -> Result<()> {
    let definition = load_definition(&file)?;
    println!("Loaded workflow '{}' ({} nodes)", definition.name, definition.nodes.len());

    let runtime = default_runtime();
    runtime.create_workflow(&definition.name).await?;
    for node in &definition.nodes {
        runtime
            .add_node(&definition.name, &node.name, node.kind.clone())
            .await
            .with_context(|| format!("adding node '{}'", node.name))?;
    }

    // Print progress from the event stream while the run executes.
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::RunStarted { workflow, .. } => {
                    println!("▶ Run started: {}", workflow);
                }
                ExecutionEvent::NodeStarted { node, node_type, .. } => {
                    println!("  … {} ({})", node, node_type);
                }
                ExecutionEvent::NodeSucceeded {
                    node,
                    rows,
                    duration_ms,
                    ..
                } => {
                    println!("  ✔ {} ({} rows, {}ms)", node, rows, duration_ms);
                }
                ExecutionEvent::NodeFailed { node, error, .. } => {
                    println!("  ✘ {}: {}", node, error);
                }
                ExecutionEvent::RunCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("Run completed successfully in {}ms", duration_ms);
                    } else {
                        println!("Run failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let outcome = runtime.run_workflow(&definition.name).await?;

    // Give the printer a moment to drain, then stop it.
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    event_task.abort();

    println!();
    println!("Status: {:?}", outcome.status);
    if !outcome.failed_nodes.is_empty() {
        println!("Failed nodes: {}", outcome.failed_nodes.join(", "));
    }

    if let Some(node) = preview {
        println!();
        println!("Preview of '{}' (limit {}):", node, limit);
        let rows = runtime.preview(&definition.name, &node, limit).await?;
        for row in rows {
            println!("{}", serde_json::to_string(&row)?);
        }
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    let definition = load_definition(&file)?;

    let mut registry = NodeRegistry::new();
    tabnodes::register_all(&mut registry);

    // Replay the node list through the same validation the store applies,
    // then check the dependency graph for cycles.
    let mut workflow = Workflow::new(&definition.name);
    for node in &definition.nodes {
        if workflow.find_node(&node.name).is_some() {
            anyhow::bail!("duplicate node name '{}'", node.name);
        }
        registry
            .validate(&node.name, &node.kind, &workflow)
            .with_context(|| format!("node '{}'", node.name))?;
        workflow.nodes.push(NodeSpec::new(&node.name, node.kind.clone()));
    }
    let plan = build_plan(&workflow)?;

    println!("Workflow '{}' is valid", definition.name);
    println!("Execution order: {}", plan.order.join(" → "));
    Ok(())
}

fn list_nodes() {
    let mut registry = NodeRegistry::new();
    tabnodes::register_all(&mut registry);

    println!("Available node types:");
    for node_type in registry.list_node_types() {
        match registry.get_metadata(&node_type) {
            Some(info) => {
                println!("  • {} ({})", node_type, info.category);
                println!("    {}", info.description);
            }
            None => println!("  • {}", node_type),
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let example = WorkflowFile {
        name: "sales".to_string(),
        nodes: vec![
            NodeEntry {
                name: "read_sales".to_string(),
                kind: NodeKind::Source {
                    file_path: "testdataset/Sales.csv".to_string(),
                },
            },
            NodeEntry {
                name: "read_features".to_string(),
                kind: NodeKind::Source {
                    file_path: "testdataset/Features.csv".to_string(),
                },
            },
            NodeEntry {
                name: "join_sales_features".to_string(),
                kind: NodeKind::Join {
                    left: "read_sales".to_string(),
                    right: "read_features".to_string(),
                    on: vec!["Store".to_string(), "Date".to_string()],
                    how: Default::default(),
                },
            },
        ],
    };

    let json = serde_json::to_string_pretty(&example)?;
    std::fs::write(&output, json)?;

    println!("Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  tabflow run --file {} --preview join_sales_features", output.display());
    Ok(())
}
