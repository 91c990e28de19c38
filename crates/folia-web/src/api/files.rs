use std::sync::Arc;

use axum::extract::{Query, State};
use axum::extract::rejection::JsonRejection;
use axum::Json;
use folia_core::LoadedFile;

use super::{authorized_body, blocking};
use crate::auth::middleware::Caller;
use crate::dto::{
    CreateRequest, OperationReply, PathRequest, RenameRequest, SaveRequest, TransferRequest,
};
use crate::error::AppError;
use crate::state::AppState;

pub async fn create(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.create_file(&caller, &req.parent_path, &req.name)).await?;
    Ok(OperationReply(result))
}

pub async fn rename(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.rename_file(&caller, &req.path, &req.new_name)).await?;
    Ok(OperationReply(result))
}

pub async fn delete(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<PathRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.delete_file(&caller, &req.path)).await?;
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
        library.copy_file(&caller, &req.source_path, &req.dest_parent_path, &req.name)
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
        library.move_file(&caller, &req.source_path, &req.dest_parent_path, &req.name)
    })
    .await?;
    Ok(OperationReply(result))
}

pub async fn load_content(
    caller: Caller,
    State(state): State<AppState>,
    Query(req): Query<PathRequest>,
) -> Result<OperationReply<LoadedFile>, AppError> {
    let library = Arc::clone(&state.library);
    let result = blocking(move || library.load_file_content(&caller, &req.path)).await?;
    Ok(OperationReply(result))
}

pub async fn save_content(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<OperationReply, AppError> {
    let req = authorized_body(&caller, body)?;
    let library = Arc::clone(&state.library);
    let result =
        blocking(move || library.save_file_content(&caller, &req.path, &req.content)).await?;
    Ok(OperationReply(result))
}
