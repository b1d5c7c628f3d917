use std::fmt;
use std::path::PathBuf;

use crate::error::{SurveyError, SurveyResult};
use crate::report::DEFAULT_REPORT_PATH;

pub const ENV_FILE_VAR: &str = "SURVEY_ENV_FILE";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const OWNER_PASSWORD_VAR: &str = "SURVEY_OWNER_PASSWORD";
pub const REPORT_PATH_VAR: &str = "SURVEY_REPORT_PATH";

/// The owner's password, kept only as a digest.
#[derive(Clone)]
pub struct OwnerSecret(blake3::Hash);

impl OwnerSecret {
    pub fn new(password: &str) -> Self {
        Self(blake3::hash(password.as_bytes()))
    }

    /// Digest equality is constant-time.
    pub fn verify(&self, attempt: &str) -> bool {
        blake3::hash(attempt.as_bytes()) == self.0
    }
}

impl fmt::Debug for OwnerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OwnerSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub owner_secret: Option<OwnerSecret>,
    pub report_path: PathBuf,
}

impl AppConfig {
    /// Loads `.env` (or `$SURVEY_ENV_FILE`) and then reads the environment.
    pub fn load() -> SurveyResult<Self> {
        load_env_file(std::env::var(ENV_FILE_VAR).ok().as_deref())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SurveyResult<Self> {
        let owner_secret = lookup(OWNER_PASSWORD_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(|password| OwnerSecret::new(password.trim()));

        let database_url = lookup(DATABASE_URL_VAR).filter(|value| !value.trim().is_empty());
        let report_path = lookup(REPORT_PATH_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH));

        Ok(Self {
            database_url,
            owner_secret,
            report_path,
        })
    }

    /// Only the interactive program needs the owner password.
    pub fn require_owner_secret(&self) -> SurveyResult<&OwnerSecret> {
        self.owner_secret.as_ref().ok_or_else(|| {
            SurveyError::Configuration(format!(
                "{OWNER_PASSWORD_VAR} must be set (environment or .env file)"
            ))
        })
    }

    pub fn require_database_url(&self) -> SurveyResult<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            SurveyError::Configuration(format!(
                "{DATABASE_URL_VAR} must be set to a Postgres instance (or use --ephemeral)"
            ))
        })
    }
}

/// An explicitly named env file must load; the default `.env` is optional.
fn load_env_file(explicit: Option<&str>) -> SurveyResult<()> {
    match explicit {
        Some(path) => dotenvy::from_path(path).map_err(|err| {
            SurveyError::Configuration(format!("cannot load {ENV_FILE_VAR}={path}: {err}"))
        }),
        None => {
            let _ = dotenvy::dotenv();
            Ok(())
        }
    }
}
