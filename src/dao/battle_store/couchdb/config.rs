use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "remix_battle";

/// Runtime configuration describing how to reach CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server URL without the database path.
    pub base_url: String,
    /// Database holding players, sounds and battles.
    pub database: String,
    /// Basic auth user and password.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Build a configuration from `COUCH_BASE_URL`, `COUCH_DB` and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;
        let database = std::env::var("COUCH_DB")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let credentials = std::env::var("COUCH_USERNAME")
            .ok()
            .zip(std::env::var("COUCH_PASSWORD").ok());

        Ok(Self {
            base_url,
            database,
            credentials,
        })
    }
}
