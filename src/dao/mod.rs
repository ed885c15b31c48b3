/// Balance persistence backends and the contract the cache consumes.
pub mod balance_store;
/// Permission-group directory used to validate tier configuration.
pub mod groups;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
