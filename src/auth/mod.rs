use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub const CREATE_USER: &str = "/user.v1.UserService/CreateUser";
pub const LOGIN: &str = "/user.v1.UserService/Login";
pub const UPDATE_USER: &str = "/user.v1.UserService/UpdateUser";
pub const GET_ME: &str = "/user.v1.UserService/GetMe";
pub const LOGOUT: &str = "/user.v1.UserService/Logout";

/// Procedures callable without a session token.
pub const PUBLIC_PROCEDURES: [&str; 2] = [CREATE_USER, LOGIN];

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
