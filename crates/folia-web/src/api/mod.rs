mod auth_handlers;
pub mod files;
pub mod folders;
pub mod library;

use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use folia_core::Authorizer;

use crate::auth::middleware::Caller;
use crate::error::AppError;
use crate::state::AppState;

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/logout", post(auth_handlers::logout))
}

/// Library routes. Callers without a valid token still reach the handlers,
/// which answer `unauthorized` in the operation response shape.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/library", get(library::snapshot))
        .route("/search", get(library::search))
        .route("/folders", post(folders::create))
        .route("/folders/rename", post(folders::rename))
        .route("/folders/delete", post(folders::delete))
        .route("/folders/copy", post(folders::copy))
        .route("/folders/move", post(folders::r#move))
        .route("/files", post(files::create))
        .route("/files/rename", post(files::rename))
        .route("/files/delete", post(files::delete))
        .route("/files/copy", post(files::copy))
        .route("/files/move", post(files::r#move))
        .route(
            "/files/content",
            get(files::load_content).put(files::save_content),
        )
}

/// Unwraps a JSON body, but only for an authorized caller. Anyone else is
/// told `unauthorized` whatever the body held.
fn authorized_body<T>(caller: &Caller, body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    if !caller.is_authorized() {
        return Err(AppError::Auth(folia_core::ErrorKind::Unauthorized.to_string()));
    }
    let Json(req) = body?;
    Ok(req)
}

/// Runs a filesystem-bound closure off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Blocking task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use folia_core::{Library, LibraryConfig};
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn app(root: &Path, password_hash: Option<String>) -> Router {
        let mut config = ServerConfig::default();
        config.library.root = Some(root.to_path_buf());
        config.auth.jwt_secret = SECRET.to_string();
        if let Some(hash) = password_hash {
            config.auth.password_hash = hash;
        }
        let library = Library::new(LibraryConfig::new(root));
        Router::new()
            .nest("/api", auth_router().merge(protected_router()))
            .with_state(AppState::new(config, library))
    }

    fn seeded() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("notes")).unwrap();
        std::fs::write(tmp.path().join("notes/todo.md"), "first line\n- [ ] todo item\n").unwrap();
        tmp
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn create_rename_and_snapshot() {
        let tmp = seeded();
        let app = app(tmp.path(), None);

        let (status, body) =
            send(&app, post_json("/api/folders", json!({ "parentPath": "", "name": "Ideas" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "path": "ideas", "name": "ideas" }));

        let request = post_json("/api/files", json!({ "parentPath": "ideas", "name": "My First Page" }));
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "ideas/my-first-page.md");

        let request = post_json("/api/files", json!({ "parentPath": "ideas", "name": "My First Page" }));
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({ "ok": false, "error": "exists" }));

        let request = post_json("/api/folders/rename", json!({ "path": "notes", "newName": "Archive" }));
        let (_, body) = send(&app, request).await;
        assert_eq!(body["path"], "archive");

        let (status, body) = send(&app, get_request("/api/library")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rootMissing"], false);
        assert_eq!(body["tree"]["children"][0]["path"], "archive");
        assert_eq!(body["tree"]["children"][0]["children"][0]["path"], "archive/todo.md");
    }

    #[tokio::test]
    async fn move_into_descendant_is_bad_request() {
        let tmp = seeded();
        let app = app(tmp.path(), None);

        let request = post_json(
            "/api/folders/move",
            json!({ "sourcePath": "notes", "destParentPath": "notes/sub", "name": "x" }),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid-path");
    }

    #[tokio::test]
    async fn content_round_trip_and_search() {
        let tmp = seeded();
        let app = app(tmp.path(), None);

        let (status, body) = send(&app, get_request("/api/files/content?path=notes/todo.md")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "first line\n- [ ] todo item\n");

        let request = Request::builder()
            .method("PUT")
            .uri("/api/files/content")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "path": "notes/todo.md", "content": "needle" }).to_string()))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get_request("/api/search?q=needle")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matches"], json!(["notes/todo.md"]));

        let (status, body) = send(&app, get_request("/api/search?q=a%0Ab")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid-query");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request_for_authorized_caller() {
        let tmp = seeded();
        let app = app(tmp.path(), None);

        let (status, body) =
            send(&app, post_json("/api/folders", json!({ "parentPath": "" }))).await;
        assert!(status.is_client_error());
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn password_protected_library() {
        use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2::Argon2::default()
            .hash_password(b"hunter22", &salt)
            .unwrap()
            .to_string();
        let tmp = seeded();
        let app = app(tmp.path(), Some(hash));

        let (status, body) =
            send(&app, post_json("/api/folders", json!({ "parentPath": "..", "name": "x" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = send(&app, get_request("/api/library")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let malformed = Request::builder()
            .method("POST")
            .uri("/api/files/rename")
            .header("content-type", "application/json")
            .body(Body::from("{\"path\": 1"))
            .unwrap();
        let (status, body) = send(&app, malformed).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "ok": false, "error": "unauthorized" }));

        let (status, _) =
            send(&app, post_json("/api/auth/login", json!({ "password": "wrong" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            send(&app, post_json("/api/auth/login", json!({ "password": "hunter22" }))).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let authed = |request: Request<Body>| {
            let (mut parts, body) = request.into_parts();
            parts
                .headers
                .insert("authorization", format!("Bearer {token}").parse().unwrap());
            Request::from_parts(parts, body)
        };

        let (status, body) = send(&app, authed(get_request("/api/library"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collections"][0]["name"], "notes");

        let (status, _) = send(&app, authed(post_json("/api/auth/logout", json!({})))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, authed(get_request("/api/library"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
