use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::Json;

use super::{authorized_body, blocking};
use crate::auth::middleware::Caller;
use crate::dto::{CreateRequest, OperationReply, PathRequest, RenameRequest, TransferRequest};
use crate::error::AppError;
use crate::state::AppState;

pub async fn create(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.create_folder(&caller, &req.parent_path, &req.name)).await?;
    Ok(OperationReply(result))
}

pub async fn rename(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.rename_folder(&caller, &req.path, &req.new_name)).await?;
    Ok(OperationReply(result))
}

pub async fn delete(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<PathRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.delete_folder(&caller, &req.path)).await?;
    Ok(OperationReply(result))
}

pub async fn copy(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || {
        library.copy_folder(&caller, &req.source_path, &req.dest_parent_path, &req.name)
    })
    .await?;
    Ok(OperationReply(result))
}

pub async fn r#move(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || {
        library.move_folder(&caller, &req.source_path, &req.dest_parent_path, &req.name)
    })
    .await?;
    Ok(OperationReply(result))
}
