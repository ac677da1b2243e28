use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    context::CallContext,
    error::RpcResult,
    rpc::Empty,
    state::AppState,
    tasks::{
        dto::{CreateTaskRequest, ListTasksResponse, TaskIdRequest, TaskResponse, UpdateTaskRequest},
        services::TaskService,
        CREATE_TASK, DELETE_TASK, GET_TASK, LIST_TASKS, UPDATE_TASK,
    },
};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route(CREATE_TASK, post(create_task))
        .route(GET_TASK, post(get_task))
        .route(UPDATE_TASK, post(update_task))
        .route(LIST_TASKS, post(list_tasks))
        .route(DELETE_TASK, post(delete_task))
}

#[instrument(skip_all)]
pub async fn create_task(
    State(tasks): State<TaskService>,
    ctx: CallContext,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> RpcResult<Empty> {
    let owner = ctx.user_id()?;
    let Json(req) = payload?;
    tasks.create(owner, req.into()).await?;
    Ok(Json(Empty {}))
}

#[instrument(skip_all)]
pub async fn get_task(
    State(tasks): State<TaskService>,
    ctx: CallContext,
    payload: Result<Json<TaskIdRequest>, JsonRejection>,
) -> RpcResult<TaskResponse> {
    ctx.user_id()?;
    let Json(req) = payload?;
    let task = tasks.get_by_id(req.id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip_all)]
pub async fn update_task(
    State(tasks): State<TaskService>,
    ctx: CallContext,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> RpcResult<TaskResponse> {
    ctx.user_id()?;
    let Json(req) = payload?;
    let (id, edit) = req.into_parts();
    let task = tasks.update(id, edit).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip_all)]
pub async fn list_tasks(
    State(tasks): State<TaskService>,
    ctx: CallContext,
    payload: Result<Json<Empty>, JsonRejection>,
) -> RpcResult<ListTasksResponse> {
    let owner = ctx.user_id()?;
    let Json(Empty {}) = payload?;
    let tasks = tasks.list(owner).await?;
    Ok(Json(ListTasksResponse { tasks }))
}

#[instrument(skip_all)]
pub async fn delete_task(
    State(tasks): State<TaskService>,
    ctx: CallContext,
    payload: Result<Json<TaskIdRequest>, JsonRejection>,
) -> RpcResult<Empty> {
    ctx.user_id()?;
    let Json(req) = payload?;
    tasks.delete(req.id).await?;
    Ok(Json(Empty {}))
}
