//! Session context
//!
//! Resolves "current user or none" and exposes sign-in, sign-up and
//! sign-out. The current identity is published on a watch channel so
//! hydration can follow identity changes.

mod file;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::UserId;

pub use file::SessionFile;

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Authentication is not configured yet.")]
    NotConfigured,

    #[error("Email and password are required.")]
    MissingCredentials,

    #[error("Passwords must match.")]
    PasswordMismatch,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("An account already exists for {0}")]
    AccountExists(String),

    #[error("Authentication backend error: {0}")]
    Backend(String),
}

impl SessionError {
    /// Caught before any async call; nothing was attempted
    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::MissingCredentials | SessionError::PasswordMismatch)
    }
}

/// Email + password pair
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), SessionError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        Ok(())
    }
}

/// Sign-up form: credentials plus the confirmation field
#[derive(Debug, Clone)]
pub struct SignUp {
    pub credentials: Credentials,
    pub confirm_password: String,
}

impl SignUp {
    pub fn new(email: impl Into<String>, password: impl Into<String>, confirm_password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(email, password),
            confirm_password: confirm_password.into(),
        }
    }

    /// Inline validation, run before any backend call
    pub fn validate(&self) -> Result<(), SessionError> {
        self.credentials.validate()?;
        if self.confirm_password != self.credentials.password {
            return Err(SessionError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Identity backend
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserId, SessionError>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<UserId, SessionError>;

    async fn sign_out(&self, _user: &UserId) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Canonical form used as the account key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Salted SHA-256 of a password, hex encoded
pub fn password_digest(user: &UserId, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current identity plus the operations that change it
#[derive(Clone)]
pub struct SessionContext {
    user_tx: Arc<watch::Sender<Option<UserId>>>,
    auth: Option<Arc<dyn Authenticator>>,
}

impl SessionContext {
    pub fn new(auth: Option<Arc<dyn Authenticator>>) -> Self {
        debug!(configured = auth.is_some(), "SessionContext::new: called");
        let (user_tx, _) = watch::channel(None);
        Self {
            user_tx: Arc::new(user_tx),
            auth,
        }
    }

    /// A session with no authentication backend (local-only usage)
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.user_tx.borrow().clone()
    }

    /// Watch identity changes
    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.user_tx.subscribe()
    }

    /// Publish an identity; only notifies watchers when it actually changes
    pub fn set_user(&self, user: Option<UserId>) {
        self.user_tx.send_if_modified(|current| {
            if *current == user {
                return false;
            }
            info!(from = ?current, to = ?user, "Session identity changed");
            *current = user;
            true
        });
    }

    fn backend(&self) -> Result<&Arc<dyn Authenticator>, SessionError> {
        self.auth.as_ref().ok_or(SessionError::NotConfigured)
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<UserId, SessionError> {
        debug!(email = %credentials.email, "sign_in: called");
        credentials.validate()?;
        let user = self.backend()?.sign_in(credentials).await?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_up(&self, form: &SignUp) -> Result<UserId, SessionError> {
        debug!(email = %form.credentials.email, "sign_up: called");
        form.validate()?;
        let user = self.backend()?.sign_up(&form.credentials).await?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Clear the identity; backend failures are logged, the local identity is cleared regardless
    pub async fn sign_out(&self) {
        debug!("sign_out: called");
        if let (Some(user), Some(auth)) = (self.current_user(), self.auth.as_ref()) {
            if let Err(e) = auth.sign_out(&user).await {
                warn!(error = %e, "Backend sign-out failed");
            }
        }
        self.set_user(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;

    fn session() -> SessionContext {
        SessionContext::new(Some(Arc::new(MemoryRemote::new())))
    }

    #[tokio::test]
    async fn test_password_mismatch_is_caught_before_backend() {
        // No backend: a mismatch must still surface as validation, not NotConfigured
        let session = SessionContext::anonymous();
        let err = session.sign_up(&SignUp::new("a@b.c", "one", "two")).await.unwrap_err();
        assert!(matches!(err, SessionError::PasswordMismatch));
        assert!(err.is_validation());
        assert_eq!(session.current_user(), None);
    }

    #[tokio::test]
    async fn test_sign_up_sign_out_sign_in() {
        let session = session();
        let mut rx = session.subscribe();

        let id = session.sign_up(&SignUp::new("me@x.io", "pw", "pw")).await.unwrap();
        assert_eq!(session.current_user(), Some(id.clone()));
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        session.sign_out().await;
        assert_eq!(session.current_user(), None);

        let again = session.sign_in(&Credentials::new("me@x.io", "pw")).await.unwrap();
        assert_eq!(again, id);
    }

    #[tokio::test]
    async fn test_sign_in_without_backend() {
        let err = SessionContext::anonymous()
            .sign_in(&Credentials::new("a@b.c", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConfigured));
    }

    #[test]
    fn test_set_same_user_does_not_notify() {
        let session = SessionContext::anonymous();
        let mut rx = session.subscribe();
        session.set_user(Some(UserId::new("u")));
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();
        session.set_user(Some(UserId::new("u")));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_password_digest_is_salted() {
        let a = password_digest(&UserId::new("a"), "pw");
        let b = password_digest(&UserId::new("b"), "pw");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
