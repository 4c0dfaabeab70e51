use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabcore::{Cell, EngineError, FilterOp, JoinHow, NodeKind};
use tabruntime::Runtime;
use tracing::{error, info};

/// Application state shared across handlers
struct AppState {
    runtime: Arc<Runtime>,
}

#[derive(Debug, Deserialize)]
struct CreateWorkflowRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AddReadNodeRequest {
    name: String,
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct AddJoinNodeRequest {
    name: String,
    left: String,
    right: String,
    on: Vec<String>,
    how: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddFilterNodeRequest {
    name: String,
    input: String,
    column: String,
    op: FilterOp,
    value: Cell,
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    limit: Option<usize>,
}

/// Structured error payload: stable kind plus human-readable message.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    kind: String,
    message: String,
}

fn error_response(e: &EngineError) -> HttpResponse {
    let body = ErrorResponse {
        kind: e.kind().to_string(),
        message: e.to_string(),
    };
    match e.kind() {
        "NotFound" => HttpResponse::NotFound().json(body),
        "Conflict" | "AlreadyRunning" => HttpResponse::Conflict().json(body),
        "InvalidConfig" | "CyclicGraph" | "IOError" | "ParseError" | "SchemaError"
        | "JoinConflict" => HttpResponse::UnprocessableEntity().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "tabserver"
    }))
}

/// List all workflows with status, last run time and failed nodes
#[get("/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let workflows = data.runtime.list_workflows().await;
    Ok(HttpResponse::Ok().json(workflows))
}

/// Create a new workflow
#[post("/workflow")]
async fn create_workflow(
    data: web::Data<AppState>,
    req: web::Json<CreateWorkflowRequest>,
) -> ActixResult<impl Responder> {
    let req = req.into_inner();
    info!("Creating workflow: {}", req.name);

    match data.runtime.create_workflow(&req.name).await {
        Ok(summary) => Ok(HttpResponse::Created().json(summary)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Delete a workflow and every node it owns
#[actix_web::delete("/workflow/{name}")]
async fn delete_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let name = path.into_inner();
    match data.runtime.delete_workflow(&name).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "status": "deleted",
            "workflow": name,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

/// List a workflow's nodes
#[get("/workflow/{name}/nodes")]
async fn list_nodes(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    match data.runtime.list_nodes(&path.into_inner()).await {
        Ok(nodes) => Ok(HttpResponse::Ok().json(nodes)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Add a CSV source node
#[post("/workflow/{name}/read_node")]
async fn add_read_node(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AddReadNodeRequest>,
) -> ActixResult<impl Responder> {
    let workflow = path.into_inner();
    let req = req.into_inner();
    let kind = NodeKind::Source {
        file_path: req.file_path,
    };

    match data.runtime.add_node(&workflow, &req.name, kind).await {
        Ok(summary) => Ok(HttpResponse::Created().json(summary)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Add a join node. Dependencies are declared explicitly as the left and
/// right node names; both must already exist in the workflow.
#[post("/workflow/{name}/join_node")]
async fn add_join_node(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AddJoinNodeRequest>,
) -> ActixResult<impl Responder> {
    let workflow = path.into_inner();
    let req = req.into_inner();

    let how = match req.how.as_deref() {
        None | Some("inner") => JoinHow::Inner,
        Some("left") => JoinHow::Left,
        Some(other) => {
            return Ok(error_response(&EngineError::InvalidConfig(format!(
                "unknown join strategy '{}', expected 'inner' or 'left'",
                other
            ))));
        }
    };
    let kind = NodeKind::Join {
        left: req.left,
        right: req.right,
        on: req.on,
        how,
    };

    match data.runtime.add_node(&workflow, &req.name, kind).await {
        Ok(summary) => Ok(HttpResponse::Created().json(summary)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Add a filter node keeping rows whose `column` value satisfies `op value`
#[post("/workflow/{name}/filter_node")]
async fn add_filter_node(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AddFilterNodeRequest>,
) -> ActixResult<impl Responder> {
    let workflow = path.into_inner();
    let req = req.into_inner();
    let kind = NodeKind::Filter {
        input: req.input,
        column: req.column,
        op: req.op,
        value: req.value,
    };

    match data.runtime.add_node(&workflow, &req.name, kind).await {
        Ok(summary) => Ok(HttpResponse::Created().json(summary)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Run a workflow end to end
#[post("/workflow/{name}/run")]
async fn run_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let name = path.into_inner();
    info!("Run requested for workflow: {}", name);

    match data.runtime.run_workflow(&name).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => {
            error!("Run of '{}' rejected: {}", name, e);
            Ok(error_response(&e))
        }
    }
}

/// Preview up to `limit` rows of a node's output
#[get("/workflow/{name}/nodes/{node}/preview")]
async fn preview_node(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<PreviewQuery>,
) -> ActixResult<impl Responder> {
    let (workflow, node) = path.into_inner();
    let limit = query.limit.unwrap_or(5);

    match data.runtime.preview(&workflow, &node, limit).await {
        Ok(rows) => Ok(HttpResponse::Ok().json(rows)),
        Err(e) => Ok(error_response(&e)),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Starting tabflow server");

    let mut registry = tabruntime::NodeRegistry::new();
    tabnodes::register_all(&mut registry);

    let runtime = Runtime::with_registry(
        Arc::new(registry),
        tabruntime::RuntimeConfig::default(),
    );

    let app_state = web::Data::new(AppState {
        runtime: Arc::new(runtime),
    });

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    info!("Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_workflows)
            .service(create_workflow)
            .service(delete_workflow)
            .service(list_nodes)
            .service(add_read_node)
            .service(add_join_node)
            .service(add_filter_node)
            .service(run_workflow)
            .service(preview_node)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
