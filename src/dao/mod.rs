/// Persisted document and trip-membership model definitions.
pub mod models;
/// Plan persistence backends.
pub mod plan_store;
/// Storage abstraction layer shared by all backends.
pub mod storage;
