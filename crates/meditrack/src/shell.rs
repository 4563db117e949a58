//! Navigation shell: page selection, the navigation rail, and the identity
//! badge. Nothing is rendered for a signed-out user.

use std::str::FromStr;
use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::error::{Error, Result};
use crate::model::UserIdentity;

/// A destination in the navigation rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Page {
    /// Aggregate statistics.
    #[default]
    Dashboard,
    /// Consultation log.
    Patients,
    /// Daily reflections.
    Reflections,
    /// Professional goals.
    Goals,
}

impl Page {
    /// Rail order.
    pub const ALL: [Page; 4] = [Self::Dashboard, Self::Patients, Self::Reflections, Self::Goals];

    /// Rail label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Patients => "Patients",
            Self::Reflections => "Reflections",
            Self::Goals => "Goals",
        }
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Page {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|page| page.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation("page", format!("unknown page `{}`", s.trim())))
    }
}

/// Routes between pages for the signed-in user.
#[derive(Debug)]
pub struct Shell {
    provider: Arc<dyn IdentityProvider>,
    selected: Page,
}

impl Shell {
    /// A shell on the dashboard.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            selected: Page::default(),
        }
    }

    /// Currently selected page.
    #[must_use]
    pub fn selected(&self) -> Page {
        self.selected
    }

    /// Switch pages.
    pub fn select(&mut self, page: Page) {
        tracing::debug!(%page, "Page selected");
        self.selected = page;
    }

    /// The signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSignedIn`] when nobody is signed in.
    pub fn identity(&self) -> Result<UserIdentity> {
        self.provider.current_identity().ok_or(Error::NotSignedIn)
    }

    /// End the session.
    pub fn sign_out(&self) {
        self.provider.sign_out();
    }

    /// Navigation rail, selected page marked with `>`.
    #[must_use]
    pub fn render_rail(&self) -> String {
        Page::ALL
            .iter()
            .map(|page| {
                let marker = if *page == self.selected { '>' } else { ' ' };
                format!("{marker} {page}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Badge for the signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSignedIn`] when nobody is signed in.
    pub fn render_badge(&self) -> Result<String> {
        Ok(badge(&self.identity()?))
    }

    /// Badge followed by the rail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSignedIn`] when nobody is signed in.
    pub fn render(&self) -> Result<String> {
        Ok(format!("{}\n\n{}", self.render_badge()?, self.render_rail()))
    }
}

/// `[A] Name <email>`; the avatar URL replaces the initial when present.
#[must_use]
pub fn badge(user: &UserIdentity) -> String {
    let avatar = match &user.avatar_url {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => user.initial().to_string(),
    };
    match user.email.as_deref().filter(|email| !email.is_empty()) {
        Some(email) => format!("[{avatar}] {} <{email}>", user.display_name_or_default()),
        None => format!("[{avatar}] {}", user.display_name_or_default()),
    }
}
