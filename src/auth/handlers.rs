use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            CreateUserRequest, CreateUserResponse, LoginRequest, LoginResponse, UpdateUserRequest,
            UserResponse,
        },
        services::AccountService,
        CREATE_USER, GET_ME, LOGIN, LOGOUT, UPDATE_USER,
    },
    context::CallContext,
    error::RpcResult,
    rpc::Empty,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(CREATE_USER, post(create_user))
        .route(LOGIN, post(login))
        .route(UPDATE_USER, post(update_user))
        .route(GET_ME, post(get_me))
        .route(LOGOUT, post(logout))
}

#[instrument(skip_all)]
pub async fn create_user(
    State(accounts): State<AccountService>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> RpcResult<CreateUserResponse> {
    let Json(req) = payload?;
    let user_id = accounts
        .register(&req.name, &req.email, &req.password)
        .await?;
    Ok(Json(CreateUserResponse { user_id }))
}

#[instrument(skip_all)]
pub async fn login(
    State(accounts): State<AccountService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> RpcResult<LoginResponse> {
    let Json(req) = payload?;
    let access_token = accounts.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { access_token }))
}

#[instrument(skip_all)]
pub async fn update_user(
    State(accounts): State<AccountService>,
    ctx: CallContext,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> RpcResult<UserResponse> {
    let user_id = ctx.user_id()?;
    let Json(req) = payload?;
    let user = accounts.update(user_id, req.into()).await?;
    Ok(Json(UserResponse { user: user.into() }))
}

#[instrument(skip_all)]
pub async fn get_me(
    State(accounts): State<AccountService>,
    ctx: CallContext,
    payload: Result<Json<Empty>, JsonRejection>,
) -> RpcResult<UserResponse> {
    let user_id = ctx.user_id()?;
    let Json(Empty {}) = payload?;
    let user = accounts.get_by_id(user_id).await?;
    Ok(Json(UserResponse { user: user.into() }))
}

/// Sessions are stateless: the token stays valid until it expires and the
/// client is expected to drop it.
#[instrument(skip_all)]
pub async fn logout(
    ctx: CallContext,
    payload: Result<Json<Empty>, JsonRejection>,
) -> RpcResult<Empty> {
    let user_id = ctx.user_id()?;
    let Json(Empty {}) = payload?;
    info!(user_id = %user_id, "user logged out");
    Ok(Json(Empty {}))
}
