//! User accounts, one-time email tokens and search history.
//!
//! Handlers never touch a global user list; they receive an
//! `Arc<dyn UserStore>` through the server state. [`InMemoryUserStore`] is
//! the development implementation; a persistent store implements the same
//! trait.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub verification_token: Option<OneTimeToken>,
    pub reset_token: Option<OneTimeToken>,
    /// Most recent last.
    pub search_history: Vec<SearchHistoryEntry>,
}

impl User {
    fn token(&self, purpose: TokenPurpose) -> Option<&OneTimeToken> {
        match purpose {
            TokenPurpose::PasswordReset => self.reset_token.as_ref(),
            TokenPurpose::EmailVerification => self.verification_token.as_ref(),
        }
    }

    fn token_slot(&mut self, purpose: TokenPurpose) -> &mut Option<OneTimeToken> {
        match purpose {
            TokenPurpose::PasswordReset => &mut self.reset_token,
            TokenPurpose::EmailVerification => &mut self.verification_token,
        }
    }
}

// ============ One-time tokens ============

/// A single-use secret delivered by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::EmailVerification => "email_verification",
        }
    }
}

/// The account change a redeemed token authorizes.
#[derive(Debug, Clone)]
pub enum Redemption {
    ResetPassword { password_hash: String },
    VerifyEmail,
}

impl Redemption {
    pub fn purpose(&self) -> TokenPurpose {
        match self {
            Redemption::ResetPassword { .. } => TokenPurpose::PasswordReset,
            Redemption::VerifyEmail => TokenPurpose::EmailVerification,
        }
    }
}

/// Result of looking up a one-time token.
#[derive(Debug)]
pub enum TokenCheck {
    Valid(User),
    /// No account holds this token.
    Invalid,
    Expired,
}

/// The account fields safe to return to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub is_verified: bool,
    pub search_history: Vec<SearchHistoryEntry>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: user.created_at,
            is_verified: user.is_verified,
            search_history: user.search_history.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    /// Token for the address-confirmation email, if one is sent.
    pub verification_token: Option<OneTimeToken>,
}

/// Fields to change; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
}

/// Another account already uses the email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTaken;

impl fmt::Display for EmailTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("email address is already registered")
    }
}

impl std::error::Error for EmailTaken {}

/// Normalized form used for lookups and uniqueness.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates an account. Fails with [`EmailTaken`] on a duplicate email.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Applies `update`; `Ok(None)` if the user does not exist.
    async fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<Option<User>>;

    /// Appends to the user's history, dropping the oldest entries beyond
    /// `limit`.
    async fn append_history(&self, id: &str, entry: SearchHistoryEntry, limit: usize)
        -> Result<()>;

    async fn count(&self) -> Result<usize>;

    /// Stores `token` on the account registered under `email`, replacing any
    /// earlier token with the same purpose. `Ok(None)` if there is no such
    /// account.
    async fn issue_token(
        &self,
        email: &str,
        purpose: TokenPurpose,
        token: OneTimeToken,
    ) -> Result<Option<User>>;

    /// Looks a token up without consuming it.
    async fn check_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenCheck>;

    /// Consumes a live token and applies `redemption` to its account.
    /// Expired tokens are left in place and change nothing.
    async fn redeem_token(
        &self,
        token: &str,
        redemption: Redemption,
        now: DateTime<Utc>,
    ) -> Result<TokenCheck>;
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_in_use(users: &HashMap<String, User>, email: &str, except: Option<&str>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id.as_str()) != except)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let email = normalize_email(&user.email);
        let mut users = self.users.write().await;
        if email_in_use(&users, &email, None) {
            return Err(EmailTaken.into());
        }

        let created = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
            password_hash: user.password_hash,
            created_at: Utc::now(),
            is_verified: false,
            verified_at: None,
            verification_token: user.verification_token,
            reset_token: None,
            search_history: Vec::new(),
        };
        users.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email {
            if email_in_use(&users, &normalize_email(email), Some(id)) {
                return Err(EmailTaken.into());
            }
        }

        let Some(user) = users.get_mut(id) else {
            return Ok(None);
        };
        if let Some(email) = update.email {
            user.email = normalize_email(&email);
        }
        if let Some(name) = update.first_name {
            user.first_name = name.trim().to_string();
        }
        if let Some(name) = update.last_name {
            user.last_name = name.trim().to_string();
        }
        if let Some(hash) = update.password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }

    async fn append_history(
        &self,
        id: &str,
        entry: SearchHistoryEntry,
        limit: usize,
    ) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("unknown user {}", id))?;
        user.search_history.push(entry);
        let excess = user.search_history.len().saturating_sub(limit);
        user.search_history.drain(..excess);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.users.read().await.len())
    }

    async fn issue_token(
        &self,
        email: &str,
        purpose: TokenPurpose,
        token: OneTimeToken,
    ) -> Result<Option<User>> {
        let email = normalize_email(email);
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| u.email == email) else {
            return Ok(None);
        };
        *user.token_slot(purpose) = Some(token);
        Ok(Some(user.clone()))
    }

    async fn check_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenCheck> {
        let users = self.users.read().await;
        let found = users
            .values()
            .find(|u| u.token(purpose).is_some_and(|t| t.value == token));
        Ok(match found {
            None => TokenCheck::Invalid,
            Some(u) if u.token(purpose).is_some_and(|t| t.is_expired_at(now)) => {
                TokenCheck::Expired
            }
            Some(u) => TokenCheck::Valid(u.clone()),
        })
    }

    async fn redeem_token(
        &self,
        token: &str,
        redemption: Redemption,
        now: DateTime<Utc>,
    ) -> Result<TokenCheck> {
        let purpose = redemption.purpose();
        let mut users = self.users.write().await;
        let Some(user) = users
            .values_mut()
            .find(|u| u.token(purpose).is_some_and(|t| t.value == token))
        else {
            return Ok(TokenCheck::Invalid);
        };
        if user.token(purpose).is_some_and(|t| t.is_expired_at(now)) {
            return Ok(TokenCheck::Expired);
        }

        *user.token_slot(purpose) = None;
        match redemption {
            Redemption::ResetPassword { password_hash } => user.password_hash = password_hash,
            Redemption::VerifyEmail => {
                user.is_verified = true;
                user.verified_at = Some(now);
            }
        }
        Ok(TokenCheck::Valid(user.clone()))
    }
}

/// Records a search for `user_id` on a detached task. Failures are logged
/// and never reach the caller.
pub fn spawn_history_hook(
    store: Arc<dyn UserStore>,
    user_id: String,
    query: String,
    limit: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let entry = SearchHistoryEntry {
            query,
            timestamp: Utc::now(),
        };
        if let Err(e) = store.append_history(&user_id, entry, limit).await {
            tracing::warn!(user = %user_id, error = %e, "failed to record search history");
        }
    })
}
