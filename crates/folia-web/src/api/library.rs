use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use folia_core::{Authorizer, ErrorKind};

use super::blocking;
use crate::auth::middleware::Caller;
use crate::dto::{OperationReply, SearchMatches, SearchQuery};
use crate::error::AppError;
use crate::state::AppState;

/// Returns the current library snapshot.
pub async fn snapshot(caller: Caller, State(state): State<AppState>) -> Result<Response, AppError> {
    if !caller.is_authorized() {
        return Ok(OperationReply::<()>(Err(ErrorKind::Unauthorized)).into_response());
    }
    let snapshot = state.library.snapshot().await?;
    Ok(Json(&*snapshot).into_response())
}

pub async fn search(
    caller: Caller,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<OperationReply<SearchMatches>, AppError> {
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.search(&caller, &query.q)).await?;
    Ok(OperationReply(result.map(|matches| SearchMatches {
        matches: matches.into_iter().collect(),
    })))
}
