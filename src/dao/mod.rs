/// Battle, player and sound storage and retrieval operations.
pub mod battle_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
