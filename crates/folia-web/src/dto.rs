use axum::response::{IntoResponse, Response};
use axum::Json;
use folia_core::{ErrorKind, OperationOk, OperationResult};
use serde::{Deserialize, Serialize};

use crate::error::status_for;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub parent_path: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub path: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_path: String,
    #[serde(default)]
    pub dest_parent_path: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchMatches {
    pub matches: Vec<String>,
}

/// An operation handler's result as an HTTP response.
///
/// Success is `{ "ok": true, ...value }` with status 200; failure is
/// `{ "ok": false, "error": "<kind>" }` with the status from [`status_for`].
pub struct OperationReply<T = OperationOk>(pub OperationResult<T>);

#[derive(Serialize)]
struct Success<T> {
    ok: bool,
    #[serde(flatten)]
    value: T,
}

#[derive(Serialize)]
struct Failure {
    ok: bool,
    error: ErrorKind,
}

impl<T: Serialize> IntoResponse for OperationReply<T> {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(value) => Json(Success { ok: true, value }).into_response(),
            Err(kind) => {
                (status_for(kind), Json(Failure { ok: false, error: kind })).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_flattens_the_value() {
        let response = OperationReply(Ok(OperationOk::new("ideas", "ideas"))).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({ "ok": true, "path": "ideas", "name": "ideas" }));
    }

    #[tokio::test]
    async fn failure_carries_kebab_case_kind() {
        let response = OperationReply::<OperationOk>(Err(ErrorKind::Exists)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({ "ok": false, "error": "exists" }));
    }
}
