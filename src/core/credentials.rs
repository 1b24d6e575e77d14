//! Login credentials held in memory for the lifetime of a session

use std::fmt;

/// Login + secret pair for one backend.
///
/// Never serialized and never written to disk; `Debug` output hides the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    login: String,
    secret: String,
}

impl Credential {
    pub fn new(login: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            secret: secret.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Both parts present and non-blank
    pub fn is_complete(&self) -> bool {
        !self.login.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("secret", &"********")
            .finish()
    }
}
