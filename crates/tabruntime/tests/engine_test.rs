//! End-to-end engine tests: store + DAG builder + executor + preview wired
//! through the runtime facade, with the real CSV and join nodes registered.

use std::sync::Arc;
use tabcore::{
    Cell, EngineError, ExecutionEvent, FilterOp, JoinHow, NodeKind, NodeStatus, WorkflowStatus,
};
use tabruntime::{NodeRegistry, Runtime, RuntimeConfig};

fn runtime() -> Runtime {
    let mut registry = NodeRegistry::new();
    tabnodes::register_all(&mut registry);
    Runtime::with_registry(Arc::new(registry), RuntimeConfig::default())
}

fn dataset(file: &str) -> String {
    format!("{}/../../testdataset/{}", env!("CARGO_MANIFEST_DIR"), file)
}

fn source(file: &str) -> NodeKind {
    NodeKind::Source {
        file_path: dataset(file),
    }
}

fn join(left: &str, right: &str, on: &[&str]) -> NodeKind {
    NodeKind::Join {
        left: left.into(),
        right: right.into(),
        on: on.iter().map(|s| s.to_string()).collect(),
        how: JoinHow::Inner,
    }
}

#[tokio::test]
async fn sales_workflow_runs_to_success() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_1", source("Sales.csv"))
        .await
        .unwrap();

    let outcome = rt.run_workflow("sales").await.unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Success);
    assert!(outcome.failed_nodes.is_empty());

    let workflows = rt.list_workflows().await;
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].status, WorkflowStatus::Success);
    assert!(workflows[0].last_run_at.is_some());
    assert!(workflows[0].failed_nodes.is_empty());

    let nodes = rt.list_nodes("sales").await.unwrap();
    assert_eq!(nodes[0].status, NodeStatus::Success);
    assert_eq!(nodes[0].node_type, "source.csv");
}

#[tokio::test]
async fn join_pipeline_runs_in_dependency_order() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_sales", source("Sales.csv"))
        .await
        .unwrap();
    rt.add_node("sales", "read_features", source("Features.csv"))
        .await
        .unwrap();
    rt.add_node(
        "sales",
        "join_sales_features",
        join("read_sales", "read_features", &["Store", "Date"]),
    )
    .await
    .unwrap();

    let outcome = rt.run_workflow("sales").await.unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Success);

    let rows = rt.preview("sales", "join_sales_features", 5).await.unwrap();
    assert_eq!(rows.len(), 5);
    // Overlapping non-key column from the right input gets suffixed.
    assert!(rows[0].contains_key("IsHoliday"));
    assert!(rows[0].contains_key("IsHoliday_right"));
    assert!(rows[0].contains_key("Temperature"));
}

#[tokio::test]
async fn filter_pipeline_keeps_matching_rows() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_sales", source("Sales.csv"))
        .await
        .unwrap();
    rt.add_node(
        "sales",
        "holiday_sales",
        NodeKind::Filter {
            input: "read_sales".into(),
            column: "IsHoliday".into(),
            op: FilterOp::Eq,
            value: Cell::Bool(true),
        },
    )
    .await
    .unwrap();

    let outcome = rt.run_workflow("sales").await.unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Success);

    let rows = rt.preview("sales", "holiday_sales", 100).await.unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row["IsHoliday"], serde_json::json!(true));
    }
}

#[tokio::test]
async fn filter_on_missing_node_leaves_node_set_unchanged() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_1", source("Sales.csv"))
        .await
        .unwrap();

    let err = rt
        .add_node(
            "sales",
            "filtered",
            NodeKind::Filter {
                input: "ghost".into(),
                column: "Store".into(),
                op: FilterOp::Eq,
                value: Cell::Int(1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
    assert_eq!(rt.list_nodes("sales").await.unwrap().len(), 1);
}

#[tokio::test]
async fn two_missing_source_files_both_fail() {
    let rt = runtime();
    rt.create_workflow("broken").await.unwrap();
    rt.add_node("broken", "read_a", source("NoSuchA.csv"))
        .await
        .unwrap();
    rt.add_node("broken", "read_b", source("NoSuchB.csv"))
        .await
        .unwrap();

    let outcome = rt.run_workflow("broken").await.unwrap();
    assert_eq!(outcome.status, WorkflowStatus::Failed);
    assert_eq!(outcome.failed_nodes, vec!["read_a", "read_b"]);

    let workflows = rt.list_workflows().await;
    assert_eq!(workflows[0].status, WorkflowStatus::Failed);
    assert_eq!(workflows[0].failed_nodes, vec!["read_a", "read_b"]);
    assert!(workflows[0].last_run_at.is_some());
}

#[tokio::test]
async fn sibling_branch_survives_a_failure() {
    let rt = runtime();
    rt.create_workflow("partial").await.unwrap();
    rt.add_node("partial", "bad", source("NoSuch.csv"))
        .await
        .unwrap();
    rt.add_node("partial", "good", source("Stores.csv"))
        .await
        .unwrap();

    let outcome = rt.run_workflow("partial").await.unwrap();
    assert_eq!(outcome.failed_nodes, vec!["bad"]);

    // The independent branch reached its own terminal status.
    let nodes = rt.list_nodes("partial").await.unwrap();
    let good = nodes.iter().find(|n| n.name == "good").unwrap();
    assert_eq!(good.status, NodeStatus::Success);
}

#[tokio::test]
async fn failure_propagates_to_dependents_without_compute() {
    let rt = runtime();
    rt.create_workflow("cascade").await.unwrap();
    rt.add_node("cascade", "bad", source("NoSuch.csv"))
        .await
        .unwrap();
    rt.add_node("cascade", "stores", source("Stores.csv"))
        .await
        .unwrap();
    rt.add_node("cascade", "joined", join("bad", "stores", &["Store"]))
        .await
        .unwrap();

    let outcome = rt.run_workflow("cascade").await.unwrap();
    assert_eq!(outcome.failed_nodes, vec!["bad", "joined"]);

    let nodes = rt.list_nodes("cascade").await.unwrap();
    let stores = nodes.iter().find(|n| n.name == "stores").unwrap();
    assert_eq!(stores.status, NodeStatus::Success);
}

#[tokio::test]
async fn rerun_is_deterministic() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_sales", source("Sales.csv"))
        .await
        .unwrap();
    rt.add_node("sales", "read_stores", source("Stores.csv"))
        .await
        .unwrap();
    rt.add_node(
        "sales",
        "enriched",
        join("read_sales", "read_stores", &["Store"]),
    )
    .await
    .unwrap();

    let first = rt.run_workflow("sales").await.unwrap();
    let rows_first = rt.preview("sales", "enriched", 100).await.unwrap();

    let second = rt.run_workflow("sales").await.unwrap();
    let rows_second = rt.preview("sales", "enriched", 100).await.unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.failed_nodes, second.failed_nodes);
    assert_eq!(rows_first, rows_second);
}

#[tokio::test]
async fn preview_is_bounded_and_state_neutral() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_1", source("Sales.csv"))
        .await
        .unwrap();
    rt.run_workflow("sales").await.unwrap();

    let before = rt.list_workflows().await[0].last_run_at;

    let rows = rt.preview("sales", "read_1", 5).await.unwrap();
    assert_eq!(rows.len(), 5);

    let all = rt.preview("sales", "read_1", 1000).await.unwrap();
    assert_eq!(all.len(), 8); // min(limit, total rows)

    assert_eq!(rt.list_workflows().await[0].last_run_at, before);
}

#[tokio::test]
async fn preview_recomputes_without_marking_nodes() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_sales", source("Sales.csv"))
        .await
        .unwrap();
    rt.add_node("sales", "read_stores", source("Stores.csv"))
        .await
        .unwrap();
    rt.add_node(
        "sales",
        "enriched",
        join("read_sales", "read_stores", &["Store"]),
    )
    .await
    .unwrap();

    // No run has happened: preview must compute the whole ancestor chain.
    let rows = rt.preview("sales", "enriched", 3).await.unwrap();
    assert_eq!(rows.len(), 3);

    // Statuses and run bookkeeping are untouched.
    let workflows = rt.list_workflows().await;
    assert_eq!(workflows[0].status, WorkflowStatus::Idle);
    assert!(workflows[0].last_run_at.is_none());
    for node in rt.list_nodes("sales").await.unwrap() {
        assert_eq!(node.status, NodeStatus::Pending);
    }
}

#[tokio::test]
async fn preview_zero_limit_is_rejected() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_1", source("Sales.csv"))
        .await
        .unwrap();

    assert!(matches!(
        rt.preview("sales", "read_1", 0).await,
        Err(EngineError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn preview_unknown_node_is_not_found() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();

    assert!(matches!(
        rt.preview("sales", "ghost", 5).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        rt.preview("missing_wf", "ghost", 5).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn preview_surfaces_compute_failure() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "bad", source("NoSuch.csv"))
        .await
        .unwrap();

    let err = rt.preview("sales", "bad", 5).await.unwrap_err();
    assert_eq!(err.kind(), "IOError");
}

#[tokio::test]
async fn dangling_join_dependency_leaves_node_set_unchanged() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_1", source("Sales.csv"))
        .await
        .unwrap();

    let err = rt
        .add_node("sales", "join_1", join("read_1", "ghost", &["Store"]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));

    let nodes = rt.list_nodes("sales").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "read_1");
}

#[tokio::test]
async fn run_emits_lifecycle_events() {
    let rt = runtime();
    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_1", source("Sales.csv"))
        .await
        .unwrap();

    let mut events = rt.subscribe_events();
    rt.run_workflow("sales").await.unwrap();

    let mut saw_started = false;
    let mut saw_node_success = false;
    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ExecutionEvent::RunStarted { workflow, .. } => {
                assert_eq!(workflow, "sales");
                saw_started = true;
            }
            ExecutionEvent::NodeSucceeded { node, rows, .. } => {
                assert_eq!(node, "read_1");
                assert_eq!(rows, 8);
                saw_node_success = true;
            }
            ExecutionEvent::RunCompleted { success, .. } => {
                assert!(success);
                saw_completed = true;
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_node_success && saw_completed);
}

#[tokio::test]
async fn outputs_above_cache_cap_are_recomputed_by_preview() {
    let mut registry = NodeRegistry::new();
    tabnodes::register_all(&mut registry);
    let rt = Runtime::with_registry(
        Arc::new(registry),
        RuntimeConfig {
            max_cached_rows: 2, // below the fixture's 8 rows
            ..RuntimeConfig::default()
        },
    );

    rt.create_workflow("sales").await.unwrap();
    rt.add_node("sales", "read_1", source("Sales.csv"))
        .await
        .unwrap();
    rt.run_workflow("sales").await.unwrap();

    // The run succeeded but the output was too large to retain; preview
    // recomputes it on demand and still honors the bound.
    let nodes = rt.list_nodes("sales").await.unwrap();
    assert_eq!(nodes[0].status, NodeStatus::Success);

    let rows = rt.preview("sales", "read_1", 5).await.unwrap();
    assert_eq!(rows.len(), 5);
}
