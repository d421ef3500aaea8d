use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use query::{KnowledgeTools, TOOLS, ToolError, ToolSpec};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
struct AppState {
    tools: Arc<KnowledgeTools>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    knowledge_base: String,
    exists: bool,
}

#[derive(Serialize)]
struct ToolResponse {
    tool: String,
    result: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn router(tools: KnowledgeTools) -> Router {
    let state = AppState {
        tools: Arc::new(tools),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(call_tool))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(tools: KnowledgeTools, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Tool server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(tools)).await?;
    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let root = state.tools.store().root();
    Json(HealthResponse {
        status: "ok",
        knowledge_base: root.display().to_string(),
        exists: root.is_dir(),
    })
}

async fn list_tools() -> Json<&'static [ToolSpec]> {
    Json(TOOLS)
}

async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<HashMap<String, String>>>,
) -> Result<Json<ToolResponse>, ApiError> {
    let args = body.map(|Json(args)| args).unwrap_or_default();

    // store reads are blocking filesystem work
    let tools = state.tools.clone();
    let tool = name.clone();
    let outcome = tokio::task::spawn_blocking(move || tools.call(&tool, &args))
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match outcome {
        Ok(result) => {
            info!(tool = %name, chars = result.len(), "Tool called");
            Ok(Json(ToolResponse { tool: name, result }))
        }
        Err(e @ ToolError::UnknownTool(_)) => Err(error(StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ ToolError::MissingArgument { .. }) => Err(error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

fn error(status: StatusCode, message: String) -> ApiError {
    (status, Json(ErrorResponse { error: message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use query::KnowledgeStore;
    use tower::ServiceExt;

    fn app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let people = dir.path().join("entities/people");
        std::fs::create_dir_all(&people).unwrap();
        std::fs::write(
            people.join("jane-doe.md"),
            "---\ntype: person\nname: Jane Doe\norganization: Proximus\n---\n\n# Jane Doe\n",
        )
        .unwrap();
        let app = router(KnowledgeTools::new(KnowledgeStore::new(dir.path())));
        (dir, app)
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_call_tool() {
        let (_dir, app) = app();
        let (status, json) = post_json(
            app,
            "/tools/find_entity_knowledge",
            r#"{"entity_type": "people", "entity_name": "jane"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["tool"], "find_entity_knowledge");
        assert!(json["result"].as_str().unwrap().contains("Jane Doe"));
    }

    #[tokio::test]
    async fn test_errors() {
        let (_dir, app) = app();
        let (status, _) = post_json(app.clone(), "/tools/nope", "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = post_json(app, "/tools/get_person_network", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("person_name"));
    }

    #[tokio::test]
    async fn test_file_tools() {
        let (_dir, app) = app();
        let (status, json) = post_json(
            app.clone(),
            "/tools/read_markdown_file",
            r#"{"filename": "entities/people/jane-doe.md"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["result"].as_str().unwrap().contains("# Jane Doe"));

        let (status, json) = post_json(
            app,
            "/tools/read_markdown_file",
            r#"{"filename": "../../etc/passwd.md"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["result"].as_str().unwrap().starts_with("Rejected:"));
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (_dir, app) = app();
        let response = app
            .oneshot(Request::get("/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json.as_array().unwrap().len(), TOOLS.len());
        assert_eq!(json[0]["name"], "list_knowledge_categories");
    }
}
