//! Process configuration, read once at startup.

use std::fmt;

use crate::application::AppError;

/// Environment variable holding the administrative secret.
pub const SECRET_ENV_VAR: &str = "TUITION_LEDGER_SECRET";

/// Environment variable a non-interactive caller can use to supply the
/// secret to `admin` commands instead of the command line.
pub const ADMIN_LOGIN_ENV_VAR: &str = "TUITION_LEDGER_ADMIN_LOGIN";

/// Environment variable holding the database path.
pub const DATABASE_ENV_VAR: &str = "TUITION_LEDGER_DB";

pub const DEFAULT_DATABASE_PATH: &str = "tuition-ledger.db";

/// The shared secret gating the administrative view. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSecret(String);

impl AdminSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self, AppError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AppError::EmptySecret);
        }
        Ok(Self(secret))
    }

    pub fn matches(&self, supplied: &str) -> bool {
        self.0 == supplied
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(****)")
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub database_path: String,
    pub admin_secret: AdminSecret,
}

impl LedgerConfig {
    /// Build the configuration from the process environment.
    ///
    /// A missing or empty secret is a configuration error.
    pub fn from_env(database_path: impl Into<String>) -> Result<Self, AppError> {
        let secret = std::env::var(SECRET_ENV_VAR).ok();
        Self::from_parts(database_path, secret)
    }

    pub fn from_parts(
        database_path: impl Into<String>,
        secret: Option<String>,
    ) -> Result<Self, AppError> {
        let admin_secret = match secret {
            Some(value) if !value.is_empty() => AdminSecret(value),
            Some(_) => {
                return Err(AppError::Configuration(format!(
                    "{} is set but empty",
                    SECRET_ENV_VAR
                )));
            }
            None => {
                return Err(AppError::Configuration(format!(
                    "{} is not set",
                    SECRET_ENV_VAR
                )));
            }
        };

        Ok(Self {
            database_path: database_path.into(),
            admin_secret,
        })
    }
}
