use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    jwt::TokenService,
    password::PasswordHasher,
    repo_types::{NewUser, User},
};
use crate::db::{self, Store};
use crate::error::{ServiceError, AUTHENTICATION_FAILED};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Profile fields to change. An empty string leaves the stored value as is.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Registration, login and profile management.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    // verified against when the email is unknown so both login failures cost the same
    decoy_hash: Arc<str>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
    ) -> anyhow::Result<Self> {
        let decoy_hash = hasher.hash(&Uuid::new_v4().to_string())?.into();
        Ok(Self {
            store,
            hasher,
            tokens,
            decoy_hash,
        })
    }

    async fn hash(&self, plain: &str) -> Result<String, ServiceError> {
        let hasher = self.hasher.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await?
            .map_err(ServiceError::internal)
    }

    async fn verify(&self, hash: &str, plain: &str) -> Result<bool, ServiceError> {
        let hasher = self.hasher.clone();
        let (hash, plain) = (hash.to_owned(), plain.to_owned());
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&hash, &plain)).await?)
    }

    /// Create an account and return its id.
    ///
    /// The email lookup is advisory; the store's unique constraint decides a
    /// race between two registrations of the same address.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Uuid, ServiceError> {
        let email = normalize_email(email);
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("name must not be empty"));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(ServiceError::validation("invalid email"));
        }

        if self.store.users().find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(ServiceError::Conflict("user already exists".into()));
        }

        let password_hash = self.hash(password).await?;
        let user = self
            .store
            .users()
            .create(NewUser {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email,
                password_hash,
            })
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(user.id)
    }

    /// Check credentials and issue a session token. Unknown email and wrong
    /// password fail identically.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        let email = normalize_email(email);
        let user = self.store.users().find_by_email(&email).await?;

        let Some(user) = user else {
            let _ = self.verify(&self.decoy_hash, password).await?;
            warn!(email = %email, "login unknown email");
            return Err(ServiceError::Authentication(AUTHENTICATION_FAILED));
        };

        if !self.verify(&user.password_hash, password).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ServiceError::Authentication(AUTHENTICATION_FAILED));
        }

        let token = self
            .tokens
            .issue(user.id, &user.email)
            .map_err(ServiceError::internal)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<User, ServiceError> {
        self.store
            .users()
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("user"))
    }

    /// Apply `changes` to user `id` inside one unit of work and return the
    /// stored result.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, changes: ProfileUpdate) -> Result<User, ServiceError> {
        let name = changes.name.trim().to_string();
        let email = normalize_email(&changes.email);
        if !email.is_empty() && !is_valid_email(&email) {
            return Err(ServiceError::validation("invalid email"));
        }
        let password_hash = if changes.password.is_empty() {
            None
        } else {
            Some(self.hash(&changes.password).await?)
        };

        let uow = self.store.begin().await?;
        let result: Result<User, ServiceError> = async {
            let mut user = uow
                .users()
                .find_by_id(id)
                .await?
                .ok_or(ServiceError::NotFound("user"))?;

            if !name.is_empty() {
                user.name = name;
            }
            if !email.is_empty() && email != user.email {
                if let Some(other) = uow.users().find_by_email(&email).await? {
                    if other.id != id {
                        return Err(ServiceError::Conflict("user already exists".into()));
                    }
                }
                user.email = email;
            }
            if let Some(hash) = password_hash {
                user.password_hash = hash;
            }

            Ok(uow.users().update(&user).await?)
        }
        .await;

        let user = db::finish(uow, result).await?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::MemoryStore;

    fn service() -> AccountService {
        let cfg = AppConfig::for_memory("test-secret");
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::new(&cfg.password).unwrap();
        let tokens = Arc::new(TokenService::new(&cfg.jwt));
        AccountService::new(store, hasher, tokens).unwrap()
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ann@x.com"));
        assert!(!is_valid_email("ann"));
        assert!(!is_valid_email("ann@x"));
        assert!(!is_valid_email("a nn@x.com"));
    }

    #[tokio::test]
    async fn register_login_verify_scenario() {
        let accounts = service();

        let id = accounts.register("Ann", "ann@x.com", "secret1").await.unwrap();

        let dup = accounts.register("Ann", "ann@x.com", "secret1").await.unwrap_err();
        assert!(matches!(dup, ServiceError::Conflict(_)));
        assert_eq!(dup.to_string(), "user already exists");

        let bad = accounts.login("ann@x.com", "wrong").await.unwrap_err();
        assert!(matches!(bad, ServiceError::Authentication(_)));
        assert_eq!(bad.to_string(), "authentication failed");

        let token = accounts.login("ann@x.com", "secret1").await.unwrap();
        assert!(!token.is_empty());
        assert_eq!(accounts.tokens.verify(&token), Ok(id));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_the_same_way() {
        let accounts = service();
        accounts.register("Ann", "ann@x.com", "secret1").await.unwrap();

        let unknown = accounts.login("nobody@x.com", "secret1").await.unwrap_err();
        let wrong = accounts.login("ann@x.com", "nope").await.unwrap_err();
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn register_normalizes_and_hashes() {
        let accounts = service();
        let id = accounts
            .register(" Ann ", "  Ann@X.com ", "secret1")
            .await
            .unwrap();
        let user = accounts.get_by_id(id).await.unwrap();
        assert_eq!(user.name, "Ann");
        assert_eq!(user.email, "ann@x.com");
        assert_ne!(user.password_hash, "secret1");
        assert!(accounts.hasher.verify(&user.password_hash, "secret1"));

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let accounts = service();
        let err = accounts.register("", "ann@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = accounts.register("Ann", "not-an-email", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn get_unknown_user_is_not_found() {
        let accounts = service();
        let err = accounts.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("user")));
    }

    #[tokio::test]
    async fn update_with_empty_password_keeps_hash() {
        let accounts = service();
        let id = accounts.register("Ann", "ann@x.com", "secret1").await.unwrap();
        let before = accounts.get_by_id(id).await.unwrap();

        let updated = accounts
            .update(
                id,
                ProfileUpdate {
                    name: "Annie".into(),
                    email: "annie@x.com".into(),
                    password: String::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Annie");
        assert_eq!(updated.email, "annie@x.com");
        assert_eq!(updated.password_hash, before.password_hash);
        assert!(updated.updated_at >= before.created_at);
        assert!(accounts.login("annie@x.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn update_with_new_password_rehashes() {
        let accounts = service();
        let id = accounts.register("Ann", "ann@x.com", "secret1").await.unwrap();

        accounts
            .update(
                id,
                ProfileUpdate {
                    password: "secret2".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(accounts.login("ann@x.com", "secret1").await.is_err());
        assert!(accounts.login("ann@x.com", "secret2").await.is_ok());
        assert_eq!(accounts.get_by_id(id).await.unwrap().name, "Ann");
    }

    #[tokio::test]
    async fn update_to_taken_email_is_rolled_back() {
        let accounts = service();
        accounts.register("Bob", "bob@x.com", "pw").await.unwrap();
        let id = accounts.register("Ann", "ann@x.com", "pw").await.unwrap();

        let err = accounts
            .update(
                id,
                ProfileUpdate {
                    name: "Renamed".into(),
                    email: "bob@x.com".into(),
                    password: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let user = accounts.get_by_id(id).await.unwrap();
        assert_eq!(user.name, "Ann");
        assert_eq!(user.email, "ann@x.com");
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let accounts = service();
        let err = accounts
            .update(Uuid::new_v4(), ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("user")));
    }
}
