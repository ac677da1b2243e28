use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{
    jwt::TokenService, password::PasswordHasher, services::AccountService, PUBLIC_PROCEDURES,
};
use crate::config::AppConfig;
use crate::db::{self, MemoryStore, Store};
use crate::interceptors::AccessInterceptor;
use crate::tasks::services::TaskService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: AccountService,
    pub tasks: TaskService,
    pub access: AccessInterceptor,
}

impl AppState {
    /// Read config from the environment, open the store and wire the services.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let store = db::connect(&config).await?;
        Self::from_parts(config, store)
    }

    pub fn from_parts(config: AppConfig, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenService::new(&config.jwt));
        let hasher = PasswordHasher::new(&config.password)?;
        let accounts = AccountService::new(store.clone(), hasher, tokens.clone())?;
        let tasks = TaskService::new(store);
        let access = AccessInterceptor::new(tokens, PUBLIC_PROCEDURES);
        Ok(Self {
            config: Arc::new(config),
            accounts,
            tasks,
            access,
        })
    }

    /// Fully wired state over a fresh [`MemoryStore`].
    pub fn in_memory(secret: &str) -> anyhow::Result<Self> {
        Self::from_parts(AppConfig::for_memory(secret), Arc::new(MemoryStore::new()))
    }
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        state.accounts.clone()
    }
}

impl FromRef<AppState> for TaskService {
    fn from_ref(state: &AppState) -> Self {
        state.tasks.clone()
    }
}
