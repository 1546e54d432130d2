//! HTTP surface over a shared [`Judge`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::judge::{Judge, JudgeError, Submission, SubmissionField};

#[derive(Clone)]
pub struct AppState {
    judge: Arc<Judge>,
}

impl AppState {
    pub fn new(judge: Judge) -> Self {
        Self {
            judge: Arc::new(judge),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/prizes", get(list_prizes))
        .route("/api/agents/check-gemini-prize", post(check_gemini))
        .route("/api/agents/check-dot-tech-prize", post(check_dot_tech))
        .route("/api/agents/check-mongodb-prize", post(check_mongodb))
        .route("/api/agents/check-elevenlabs-prize", post(check_elevenlabs))
        .route("/api/agents/code-review", post(code_review))
        .route("/api/agents/check/{prize}", post(check_prize))
        .route("/api/agents/chat", post(chat))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body `{"error": ...}` with a status derived from the failure.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl From<JudgeError> for ApiError {
    fn from(error: JudgeError) -> Self {
        let status = match &error {
            JudgeError::UnknownPrize(_) => StatusCode::NOT_FOUND,
            JudgeError::MissingField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            JudgeError::Prompt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            JudgeError::Agent(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!(%error, "judging request failed");
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// JSON request body whose rejections are reported as `{"error": ...}`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[derive(Debug, Serialize)]
struct PrizeSummary {
    id: String,
    name: String,
    description: Option<String>,
    required_fields: Vec<SubmissionField>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to MLH Sidekick API" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "message": "API is running" }))
}

async fn list_prizes(State(state): State<AppState>) -> Json<Value> {
    let prizes: Vec<PrizeSummary> = state
        .judge
        .catalog()
        .iter()
        .map(|prize| PrizeSummary {
            id: prize.id.clone(),
            name: prize.name.clone(),
            description: prize.description.clone(),
            required_fields: prize.required_fields.clone(),
        })
        .collect();
    Json(json!({ "prizes": prizes }))
}

async fn judge_prize(state: &AppState, prize_id: &str, submission: Submission) -> Result<Json<Value>, ApiError> {
    tracing::info!(prize = prize_id, "judging submission");
    let verdict = state.judge.judge(prize_id, &submission).await?;
    Ok(Json(json!({ "result": verdict })))
}

async fn check_gemini(
    State(state): State<AppState>,
    JsonBody(submission): JsonBody<Submission>,
) -> Result<Json<Value>, ApiError> {
    judge_prize(&state, "gemini", submission).await
}

async fn check_dot_tech(
    State(state): State<AppState>,
    JsonBody(submission): JsonBody<Submission>,
) -> Result<Json<Value>, ApiError> {
    judge_prize(&state, "dot-tech", submission).await
}

async fn check_mongodb(
    State(state): State<AppState>,
    JsonBody(submission): JsonBody<Submission>,
) -> Result<Json<Value>, ApiError> {
    judge_prize(&state, "mongodb", submission).await
}

async fn check_elevenlabs(
    State(state): State<AppState>,
    JsonBody(submission): JsonBody<Submission>,
) -> Result<Json<Value>, ApiError> {
    judge_prize(&state, "elevenlabs", submission).await
}

async fn code_review(
    State(state): State<AppState>,
    JsonBody(submission): JsonBody<Submission>,
) -> Result<Json<Value>, ApiError> {
    judge_prize(&state, "code-review", submission).await
}

async fn check_prize(
    State(state): State<AppState>,
    Path(prize): Path<String>,
    JsonBody(submission): JsonBody<Submission>,
) -> Result<Json<Value>, ApiError> {
    judge_prize(&state, &prize, submission).await
}

async fn chat(State(state): State<AppState>, JsonBody(request): JsonBody<ChatRequest>) -> Result<Json<Value>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::unprocessable("message must not be empty"));
    }
    let response = state.judge.chat(message).await?;
    Ok(Json(json!({ "response": response })))
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::{
        judge::{AgentGenerator, PrizeCatalog, Toolbox},
        providers::scripted::ScriptedProvider,
    };

    fn state(provider: ScriptedProvider) -> AppState {
        let generator = AgentGenerator::new(Arc::new(provider), "model-x");
        AppState::new(Judge::new(Arc::new(generator), PrizeCatalog::builtin(), Toolbox::empty()))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn root_and_health_messages() {
        assert_eq!(root().await.0["message"], "Welcome to MLH Sidekick API");
        let health = health().await.0;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["message"], "API is running");
    }

    #[tokio::test]
    async fn mongodb_check_returns_result() {
        let state = state(ScriptedProvider::from_texts([
            "```json\n{\"mongodb_usage_detected\": true, \"final_determination\": \"QUALIFIED\"}\n```",
        ]));
        let submission = Submission::default().with_repo_url("https://github.com/a/b");

        let Json(body) = check_mongodb(State(state), JsonBody(submission)).await.expect("ok");
        assert_eq!(body["result"]["final_determination"], "QUALIFIED");
        assert_eq!(body["result"]["mongodb_usage_detected"], true);
    }

    #[tokio::test]
    async fn missing_field_maps_to_422() {
        let state = state(ScriptedProvider::new());
        let submission = Submission::default().with_repo_url("https://github.com/a/b");

        let error = check_gemini(State(state), JsonBody(submission)).await.unwrap_err();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap_or_default().contains("project_number"));
    }

    #[tokio::test]
    async fn unknown_prize_maps_to_404() {
        let state = state(ScriptedProvider::new());
        let error = check_prize(
            State(state),
            Path("best-hardware-hack".to_string()),
            JsonBody(Submission::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_502() {
        let state = state(ScriptedProvider::new());
        let submission = Submission::default().with_repo_url("https://github.com/a/b");
        let error = code_review(State(state), JsonBody(submission)).await.unwrap_err();
        assert_eq!(error.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn chat_returns_last_model_text() {
        let state = state(ScriptedProvider::from_texts(["Judging opens at noon."]));
        let Json(body) = chat(
            State(state),
            JsonBody(ChatRequest {
                message: "When does judging start?".to_string(),
            }),
        )
        .await
        .expect("ok");
        assert_eq!(body["response"], "Judging opens at noon.");
    }

    #[tokio::test]
    async fn prizes_lists_catalog() {
        let state = state(ScriptedProvider::new());
        let Json(body) = list_prizes(State(state)).await;
        let prizes = body["prizes"].as_array().expect("array");
        assert_eq!(prizes.len(), 5);
        assert_eq!(prizes[0]["id"], "gemini");
        assert_eq!(prizes[0]["required_fields"], json!(["repo_url", "project_number"]));
    }
    async fn post_json(app: Router, uri: &str, body: &'static str) -> Response {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .expect("request");
        app.oneshot(request).await.expect("response")
    }

    #[tokio::test]
    async fn malformed_body_is_reported_as_json_error() {
        let app = router(state(ScriptedProvider::new()));
        let response = post_json(app, "/api/agents/check-mongodb-prize", "{not json").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("Failed to parse the request body as JSON"));
    }

    #[tokio::test]
    async fn wrongly_typed_body_is_reported_as_json_error() {
        let app = router(state(ScriptedProvider::new()));
        let response = post_json(app, "/api/agents/chat", r#"{"message": 42}"#).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn routed_check_returns_result() {
        let app = router(state(ScriptedProvider::from_texts([
            "{\"final_determination\": \"DISQUALIFIED\", \"detected_tld\": \".com\"}",
        ])));
        let response = post_json(
            app,
            "/api/agents/check/dot-tech",
            r#"{"project_url": "see snackbot.com"}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["final_determination"], "DISQUALIFIED");
    }
}
