use tracing::{info, warn};

use crate::config::AdminSecret;
use crate::domain::Session;

use super::AppError;

/// Result of presenting a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Denied,
}

/// Holds the administrative secret for the lifetime of the process.
///
/// A changed secret replaces the in-memory value only; the next process
/// starts again from the environment.
pub struct SecretGate {
    current: AdminSecret,
}

impl SecretGate {
    pub fn new(secret: AdminSecret) -> Self {
        Self { current: secret }
    }

    /// Compare the supplied secret and set the session flag on a match.
    /// A mismatch leaves the session untouched; retries are unlimited.
    pub fn authenticate(&self, session: &mut Session, supplied: &str) -> AuthOutcome {
        if self.current.matches(supplied) {
            session.grant();
            info!("administrative session authenticated");
            AuthOutcome::Authenticated
        } else {
            warn!("administrative authentication denied");
            AuthOutcome::Denied
        }
    }

    pub fn change(&mut self, old: &str, new: &str, confirm: &str) -> Result<(), AppError> {
        if !self.current.matches(old) {
            return Err(AppError::WrongOldSecret);
        }
        if new != confirm {
            return Err(AppError::SecretMismatch);
        }
        self.current = AdminSecret::new(new)?;
        info!("administrative secret changed for this process");
        Ok(())
    }
}
