use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("invalid value for MongoDB environment variable `{var}`")]
    InvalidEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save player `{id}`")]
    SavePlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load player `{id}`")]
    LoadPlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save sound `{id}`")]
    SaveSound {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load sound `{id}`")]
    LoadSound {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list sounds")]
    ListSounds {
        #[source]
        source: MongoError,
    },
    #[error("failed to save battle `{id}`")]
    SaveBattle {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load battle `{id}`")]
    LoadBattle {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list battles")]
    ListBattles {
        #[source]
        source: MongoError,
    },
    #[error("battle `{id}` was modified concurrently")]
    BattleConflict { id: Uuid },
    #[error("stored document `{id}` is malformed: {reason}")]
    MalformedDocument { id: String, reason: &'static str },
}
