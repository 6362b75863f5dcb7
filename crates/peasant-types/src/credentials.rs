//! An opaque credentials bundle passed to the workspace provisioner.
//!
//! Deliberately minimal: the core never inspects the contents, only hands
//! the value to a collaborator. `Debug` is redacted so a stray `{:?}` in a
//! log line never leaks a token.

use std::fmt;

#[derive(Clone, Default)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    pub fn none() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
