use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::app_error::{AppError, AppResult};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Uuid>;
    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>>;
    /// Removes the user and, by cascade, their subscription and magic links.
    async fn delete_user(&self, user_id: Uuid) -> AppResult<()>;
    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
    /// Marks an unexpired, unconsumed link as consumed and returns its user.
    async fn consume_magic_link(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct AuthUseCases {
    repo: Arc<dyn UserRepo>,
    email: Arc<dyn EmailSender>,
    app_origin: String,
}

impl AuthUseCases {
    pub fn new(repo: Arc<dyn UserRepo>, email: Arc<dyn EmailSender>, app_origin: String) -> Self {
        Self {
            repo,
            email,
            app_origin,
        }
    }

    #[instrument(skip(self))]
    pub async fn request_magic_link(&self, email: &str, ttl_minutes: i64) -> AppResult<()> {
        let email = normalize_email(email)?;
        let user_id = self.repo.find_or_create_by_email(&email).await?;
        let raw = generate_token();
        let token_hash = hash_token(&raw);
        let expires_at = Utc::now() + chrono::Duration::minutes(ttl_minutes);
        self.repo
            .create_magic_link(user_id, &token_hash, expires_at)
            .await?;
        let link = format!(
            "{}/magic?token={}",
            self.app_origin.trim_end_matches('/'),
            raw
        );
        self.email
            .send(
                &email,
                "Your TaskPro login link",
                &format!("<a href=\"{}\">Sign in to TaskPro</a>", link),
            )
            .await
    }

    #[instrument(skip(self, raw_token))]
    pub async fn consume_magic_link(&self, raw_token: &str) -> AppResult<Option<Uuid>> {
        let token_hash = hash_token(raw_token.trim());
        self.repo.consume_magic_link(&token_hash, Utc::now()).await
    }

    pub async fn email_for(&self, user_id: Uuid) -> AppResult<String> {
        self.repo
            .get_email_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)
    }

    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: Uuid) -> AppResult<()> {
        self.repo.delete_user(user_id).await?;
        tracing::info!(%user_id, "Account deleted");
        Ok(())
    }
}

fn normalize_email(input: &str) -> AppResult<String> {
    let email = input.trim().to_lowercase();
    if email.is_empty() || !email.validate_email() {
        return Err(AppError::InvalidInput("Invalid email address".into()));
    }
    Ok(email)
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
