mod config;
mod error;
mod models;
pub mod store;

pub use config::{ConnectRetry, MongoConfig};
pub use error::MongoDaoError;
pub use store::MongoBattleStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::BattleConflict { id } => StorageError::conflict("battle", id),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
