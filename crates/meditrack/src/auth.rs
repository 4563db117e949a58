//! Authentication bridge.
//!
//! The journal only ever reads the signed-in identity. Signing in and out are
//! fire-and-forget: callers observe the outcome through
//! [`IdentityProvider::current_identity`] or an identity-change watch, never
//! through a return value.
//!
//! [`SessionIdentityProvider`] takes the profile from the `[identity]` config
//! section and keeps the signed-in flag in a small JSON session file, so the
//! state survives between CLI invocations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, IdentityConfig};
use crate::error::{Error, Result};
use crate::model::{OwnerId, UserIdentity};

/// Receives the identity after every sign-in or sign-out.
pub type IdentityCallback = Box<dyn FnMut(Option<UserIdentity>) + Send + 'static>;

/// Source of the signed-in identity.
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    /// The signed-in identity, if any.
    fn current_identity(&self) -> Option<UserIdentity>;

    /// Call `callback` with the current identity now and again after every
    /// change, until the returned watch is dropped.
    fn on_identity_changed(&self, callback: IdentityCallback) -> IdentityWatch;

    /// Start a session.
    fn sign_in(&self);

    /// End the session.
    fn sign_out(&self);
}

/// Handle for an identity-change registration.
#[derive(Debug)]
pub struct IdentityWatch {
    task: JoinHandle<()>,
}

impl IdentityWatch {
    /// Stop notifications.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for IdentityWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Persisted session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    /// Identity id, kept after sign-out so the same owner returns.
    id: String,
    signed_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signed_in_at: Option<DateTime<Utc>>,
}

/// Identity provider backed by configuration and a session file.
#[derive(Debug)]
pub struct SessionIdentityProvider {
    profile: IdentityConfig,
    session_path: PathBuf,
    state: watch::Sender<Option<UserIdentity>>,
}

impl SessionIdentityProvider {
    /// Build a provider from configuration, restoring any saved session.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.identity.clone(), config.session_path())
    }

    /// Build a provider for `profile`, with its session kept at `session_path`.
    #[must_use]
    pub fn new(profile: IdentityConfig, session_path: PathBuf) -> Self {
        let identity = match read_session(&session_path) {
            Ok(Some(session)) if session.signed_in => Some(build_identity(&profile, &session.id)),
            Ok(_) => None,
            Err(err) => {
                warn!(path = %session_path.display(), error = %err, "Ignoring unreadable session file");
                None
            }
        };
        let (state, _) = watch::channel(identity);
        Self {
            profile,
            session_path,
            state,
        }
    }

    /// Path of the session file.
    #[must_use]
    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Identity id to use for a new session: configured, then remembered,
    /// then freshly generated.
    fn session_id(&self) -> String {
        if let Some(id) = self.profile.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        match read_session(&self.session_path) {
            Ok(Some(session)) => session.id,
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }

    fn try_sign_in(&self) -> Result<UserIdentity> {
        let session = Session {
            id: self.session_id(),
            signed_in: true,
            signed_in_at: Some(Utc::now()),
        };
        write_session(&self.session_path, &session)?;
        Ok(build_identity(&self.profile, &session.id))
    }

    fn try_sign_out(&self) -> Result<()> {
        let Some(session) = read_session(&self.session_path)? else {
            return Ok(());
        };
        write_session(
            &self.session_path,
            &Session {
                signed_in: false,
                signed_in_at: None,
                ..session
            },
        )
    }
}

impl IdentityProvider for SessionIdentityProvider {
    fn current_identity(&self) -> Option<UserIdentity> {
        self.state.borrow().clone()
    }

    fn on_identity_changed(&self, mut callback: IdentityCallback) -> IdentityWatch {
        let mut receiver = self.state.subscribe();
        let task = tokio::spawn(async move {
            let current = receiver.borrow_and_update().clone();
            callback(current);
            while receiver.changed().await.is_ok() {
                let current = receiver.borrow_and_update().clone();
                callback(current);
            }
        });
        IdentityWatch { task }
    }

    fn sign_in(&self) {
        match self.try_sign_in() {
            Ok(identity) => {
                info!(id = %identity.id, "Signed in");
                self.state.send_replace(Some(identity));
            }
            Err(err) => error!(error = %err, "Sign-in failed"),
        }
    }

    fn sign_out(&self) {
        match self.try_sign_out() {
            Ok(()) => {
                info!("Signed out");
                self.state.send_replace(None);
            }
            Err(err) => error!(error = %err, "Sign-out failed"),
        }
    }
}

fn build_identity(profile: &IdentityConfig, id: &str) -> UserIdentity {
    UserIdentity {
        id: OwnerId::new(id),
        display_name: profile.display_name.clone(),
        email: profile.email.clone(),
        avatar_url: profile.avatar_url.clone(),
    }
}

fn read_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

fn write_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(session)?)?;
    debug!(path = %path.display(), signed_in = session.signed_in, "Wrote session file");
    Ok(())
}
