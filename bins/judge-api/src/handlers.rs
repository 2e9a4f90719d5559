// HTTP route handlers for the judge API

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use judge_common::types::ExecutionMode;
use judge_engine::{JudgeError, RunRequest, SubmitRequest};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

/// Header carrying the user id established by the external auth layer
pub const USER_HEADER: &str = "x-user-id";

fn status_for(err: &JudgeError) -> StatusCode {
    match err {
        JudgeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        JudgeError::Unauthenticated => StatusCode::UNAUTHORIZED,
        JudgeError::ProblemNotFound(_) => StatusCode::NOT_FOUND,
        JudgeError::UnsupportedLanguage(_) | JudgeError::NoTestCases(_) => StatusCode::UNPROCESSABLE_ENTITY,
        JudgeError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn reason_for(err: &JudgeError) -> &'static str {
    match err {
        JudgeError::InvalidRequest(_) => "invalid_request",
        JudgeError::Unauthenticated => "unauthenticated",
        JudgeError::ProblemNotFound(_) => "problem_not_found",
        JudgeError::UnsupportedLanguage(_) => "unsupported_language",
        JudgeError::NoTestCases(_) => "no_test_cases",
        JudgeError::Store(_) => "store_unavailable",
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn rejected(state: &AppState, mode: ExecutionMode, err: JudgeError) -> Response {
    let status = status_for(&err);
    state.metrics.record_rejection(mode, reason_for(&err));

    if status.is_server_error() {
        error!(mode = %mode, error = %err, "Request failed before execution");
    } else {
        warn!(mode = %mode, error = %err, "Request rejected");
    }
    error_response(status, err.to_string())
}

/// POST /run - Judge against sample cases or custom input, nothing persisted
pub async fn run(State(state): State<Arc<AppState>>, Json(payload): Json<RunRequest>) -> Response {
    match state.engine.run(payload).await {
        Ok(response) => {
            state
                .metrics
                .record_judgement(ExecutionMode::Run, response.verdict, response.backend);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => rejected(&state, ExecutionMode::Run, e),
    }
}

/// POST /submit - Judge against the full suite and record the submission
pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut payload): Json<SubmitRequest>,
) -> Response {
    payload.user_id = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match state.engine.submit(payload).await {
        Ok(response) => {
            state
                .metrics
                .record_judgement(ExecutionMode::Submit, response.verdict, response.backend);
            let status = if response.submission_id.is_some() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(response)).into_response()
        }
        Err(e) => rejected(&state, ExecutionMode::Submit, e),
    }
}

/// GET /submissions/{submission_id}
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
) -> Response {
    let id = match Uuid::parse_str(&submission_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid submission ID format".to_string()),
    };

    match state.engine.get_submission(&id).await {
        Ok(Some(record)) => {
            info!(submission_id = %id, verdict = %record.verdict, "Submission retrieved");
            (StatusCode::OK, Json(record)).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("submission not found: {}", id)),
        Err(e) => {
            error!(submission_id = %id, error = %e, "Failed to fetch submission");
            error_response(status_for(&e), e.to_string())
        }
    }
}

/// GET /progress/{user_id}
pub async fn get_progress(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> Response {
    match state.engine.get_progress(&user_id).await {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch progress");
            error_response(status_for(&e), e.to_string())
        }
    }
}

/// GET /languages
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Response {
    let languages = state.engine.languages().to_vec();
    (StatusCode::OK, Json(serde_json::json!({ "languages": languages }))).into_response()
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "remote_sandbox": state.engine.has_remote(),
        })),
    )
}

/// GET /metrics - Prometheus text exposition
pub async fn export_metrics() -> Response {
    match metrics::gather() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::HeaderValue;
    use judge_common::memory::MemoryStore;
    use judge_common::types::{
        ComparisonMode, Difficulty, ExecutionOutcome, OutcomeStatus, Problem, ProviderStatus, TestCase,
    };
    use judge_engine::builder::ExecutionRequest;
    use judge_engine::executor::Executor;
    use judge_engine::{ExecutionError, JudgeEngine, LanguageRegistry};
    use serde_json::Value;

    /// Echoes each case's expected output
    struct Echo;

    #[async_trait]
    impl Executor for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, request: &ExecutionRequest) -> Result<Vec<ExecutionOutcome>, ExecutionError> {
            Ok(request
                .test_cases()
                .iter()
                .map(|tc| ExecutionOutcome {
                    stdout: tc.expected_output.clone().unwrap_or_default(),
                    stderr: String::new(),
                    compile_output: None,
                    elapsed_ms: 3,
                    memory_kb: 1024,
                    exit_code: Some(0),
                    status: OutcomeStatus::Accepted,
                    provider_status: ProviderStatus { id: 3, description: "Accepted".to_string() },
                })
                .collect())
        }
    }

    fn state() -> Arc<AppState> {
        let problem = Problem {
            id: "two-sum".to_string(),
            title: "Two Sum".to_string(),
            difficulty: Difficulty::Easy,
            entry_point: "twoSum".to_string(),
            comparison: ComparisonMode::Ordered,
            limits: None,
            test_cases: vec![
                TestCase::visible("[2,7,11,15]\n9", "[0,1]"),
                TestCase::hidden("[3,2,4]\n6", "[1,2]"),
            ],
        };
        let store = Arc::new(MemoryStore::with_problems([problem]));
        let engine = JudgeEngine::new(
            LanguageRegistry::builtin(),
            Arc::new(Echo),
            store.clone(),
            store.clone(),
            store,
        );
        let (metrics, _registry) = Metrics::isolated();
        Arc::new(AppState { engine, metrics })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn submit_payload(language: &str) -> SubmitRequest {
        serde_json::from_value(serde_json::json!({
            "source_code": "function twoSum() {}",
            "language": language,
            "problem_id": "two-sum",
        }))
        .unwrap()
    }

    fn user_headers(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_str(user).unwrap());
        headers
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&JudgeError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&JudgeError::ProblemNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&JudgeError::UnsupportedLanguage("cobol".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&JudgeError::NoTestCases("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&JudgeError::InvalidRequest("x".into())), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_run_returns_visible_results_only() {
        let payload: RunRequest = serde_json::from_value(serde_json::json!({
            "source_code": "function twoSum() {}",
            "language": "js",
            "problem_id": "two-sum",
        }))
        .unwrap();

        let response = run(State(state()), Json(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["verdict"], "Accepted");
        assert_eq!(body["test_results"].as_array().unwrap().len(), 1);
        assert!(!body.to_string().contains("[3,2,4]"));
    }

    #[tokio::test]
    async fn test_submit_uses_user_header() {
        let state = state();

        let response = submit(State(state.clone()), user_headers("alice"), Json(submit_payload("javascript"))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["verdict"], "Accepted");
        assert_eq!(body["passed"], 2);
        assert_eq!(body["first_solve"], true);

        let id = body["submission_id"].as_str().unwrap().to_string();
        let fetched = get_submission(State(state.clone()), Path(id)).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await["user_id"], "alice");

        let progress = get_progress(State(state), Path("alice".to_string())).await;
        assert_eq!(body_json(progress).await["total_solved"], 1);
    }

    #[tokio::test]
    async fn test_submit_body_cannot_choose_user() {
        let payload: SubmitRequest = serde_json::from_value(serde_json::json!({
            "source_code": "function twoSum() {}",
            "language": "javascript",
            "problem_id": "two-sum",
            "user_id": "mallory",
        }))
        .unwrap();

        let response = submit(State(state()), HeaderMap::new(), Json(payload)).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(response).await["error"].as_str().unwrap().contains("authentication"));
    }

    #[tokio::test]
    async fn test_submit_unsupported_language() {
        let response = submit(State(state()), user_headers("alice"), Json(submit_payload("cobol"))).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_get_submission_rejects_bad_ids() {
        let bad = get_submission(State(state()), Path("not-a-uuid".to_string())).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let missing = get_submission(State(state()), Path(Uuid::new_v4().to_string())).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_languages() {
        let response = list_languages(State(state())).await;
        let body = body_json(response).await;

        let names: Vec<&str> = body["languages"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|l| l["name"].as_str())
            .collect();
        assert!(names.contains(&"javascript"));
        assert!(names.contains(&"python"));
    }
}
