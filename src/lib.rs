pub mod app;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod interceptors;
pub mod rpc;
pub mod state;
pub mod tasks;
