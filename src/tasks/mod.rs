use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub const CREATE_TASK: &str = "/task.v1.TaskService/CreateTask";
pub const GET_TASK: &str = "/task.v1.TaskService/GetTask";
pub const UPDATE_TASK: &str = "/task.v1.TaskService/UpdateTask";
pub const LIST_TASKS: &str = "/task.v1.TaskService/ListTasks";
pub const DELETE_TASK: &str = "/task.v1.TaskService/DeleteTask";

pub fn router() -> Router<AppState> {
    handlers::task_routes()
}
