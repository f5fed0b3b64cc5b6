//! Sessions and the identity provider.
//!
//! A session is either anonymous or authenticated; both own data. Only the
//! absence of a session means "logged out". The provider publishes the current
//! session over a `watch` channel that every feature controller follows.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::AppError;

/// Who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Anonymous { session_id: String },
    Authenticated { user_id: String, email: String },
}

impl Identity {
    /// The id documents are scoped by.
    pub fn owner_id(&self) -> &str {
        match self {
            Identity::Anonymous { session_id } => session_id,
            Identity::Authenticated { user_id, .. } => user_id,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous { .. })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous { session_id } => write!(f, "anonymous ({})", session_id),
            Identity::Authenticated { user_id, email } => write!(f, "{} ({})", email, user_id),
        }
    }
}

/// An active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            identity: Identity::Anonymous {
                session_id: Uuid::new_v4().to_string(),
            },
            display_name: None,
            verified: false,
            photo_url: None,
        }
    }

    pub fn authenticated(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            identity: Identity::Authenticated {
                user_id: user_id.into(),
                email: email.into(),
            },
            display_name: None,
            verified: false,
            photo_url: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    pub fn owner_id(&self) -> &str {
        self.identity.owner_id()
    }

    /// Name shown next to forum posts and replies.
    pub fn author_name(&self) -> String {
        match (&self.display_name, &self.identity) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Identity::Authenticated { email, .. }) => email.clone(),
            (_, Identity::Anonymous { .. }) => "Anonymous".to_string(),
        }
    }
}

/// Issues sessions and broadcasts changes to them.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IdentityProvider {
    pub fn new(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Starts a fresh anonymous session, replacing any current one.
    pub fn sign_in_anonymously(&self) -> Session {
        let session = Session::anonymous();
        tracing::info!(owner = session.owner_id(), "anonymous sign-in");
        self.tx.send_replace(Some(session.clone()));
        session
    }

    pub fn sign_in(&self, user_id: &str, email: &str) -> Result<Session, AppError> {
        let user_id = user_id.trim();
        let email = email.trim();
        if user_id.is_empty() || user_id.contains('/') {
            return Err(AppError::validation("A valid user id is required"));
        }
        if !email.contains('@') {
            return Err(AppError::validation("A valid email address is required"));
        }

        let session = Session::authenticated(user_id, email);
        tracing::info!(owner = user_id, "signed in");
        self.tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
    }

    /// Updates profile attributes on the current session.
    ///
    /// `None` leaves an attribute unchanged.
    pub fn update_profile(
        &self,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Result<Session, AppError> {
        let mut updated = None;
        self.tx.send_if_modified(|current| match current {
            Some(session) => {
                if let Some(name) = &display_name {
                    session.display_name = Some(name.clone());
                }
                if let Some(url) = &photo_url {
                    session.photo_url = Some(url.clone());
                }
                updated = Some(session.clone());
                display_name.is_some() || photo_url.is_some()
            }
            None => false,
        });
        updated.ok_or(AppError::AuthRequired)
    }
}
