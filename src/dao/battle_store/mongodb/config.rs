use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// How long `MongoBattleStore::connect` keeps pinging a database that does not answer yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectRetry {
    /// Pings attempted before giving up.
    pub max_attempts: u32,
    /// Delay after the first failed ping; doubles after each further failure.
    pub initial_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Connection settings for [`MongoBattleStore`](super::MongoBattleStore).
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding the collections.
    pub database_name: String,
    /// Ping schedule used while connecting.
    pub retry: ConnectRetry,
}

impl MongoConfig {
    /// Parse `uri`; the database defaults to `remix_battle`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or("remix_battle").to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            retry: ConnectRetry::default(),
        })
    }

    /// Read `MONGO_URI`, `MONGO_DB` and the optional `MONGO_CONNECT_ATTEMPTS` and
    /// `MONGO_CONNECT_DELAY_MS` overrides.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        let mut config = Self::from_uri(&uri, db.as_deref()).await?;
        config.retry = retry_from_env(
            std::env::var("MONGO_CONNECT_ATTEMPTS").ok().as_deref(),
            std::env::var("MONGO_CONNECT_DELAY_MS").ok().as_deref(),
        )?;
        Ok(config)
    }
}

fn retry_from_env(attempts: Option<&str>, delay_ms: Option<&str>) -> MongoResult<ConnectRetry> {
    let mut retry = ConnectRetry::default();
    if let Some(raw) = attempts {
        retry.max_attempts = raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|attempts| *attempts > 0)
            .ok_or(MongoDaoError::InvalidEnvVar {
                var: "MONGO_CONNECT_ATTEMPTS",
            })?;
    }
    if let Some(raw) = delay_ms {
        let millis = raw.trim().parse::<u64>().map_err(|_| MongoDaoError::InvalidEnvVar {
            var: "MONGO_CONNECT_DELAY_MS",
        })?;
        retry.initial_delay = Duration::from_millis(millis);
        retry.max_delay = retry.max_delay.max(retry.initial_delay);
    }
    Ok(retry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_defaults_without_overrides() {
        assert_eq!(retry_from_env(None, None).unwrap(), ConnectRetry::default());
    }

    #[test]
    fn retry_overrides_are_parsed() {
        let retry = retry_from_env(Some("3"), Some("10000")).unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay, Duration::from_secs(10));
        assert_eq!(retry.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_are_rejected() {
        assert!(matches!(
            retry_from_env(Some("0"), None),
            Err(MongoDaoError::InvalidEnvVar { var: "MONGO_CONNECT_ATTEMPTS" })
        ));
    }
}
