// Collection Tracker - Core Library
// Catalog loading, faceted filtering, ownership tracking and navigation,
// shared by the terminal browser and the API server

pub mod error;
pub mod config;
pub mod catalog;    // Partitioned catalog, merged in request order
pub mod filter;     // Facet predicates and filter state
pub mod ownership;  // Per-item acquisition flags
pub mod store;      // Durable homes for ownership state
pub mod query;      // Stable filtered result list
pub mod navigation; // Cyclic selection cursor

// Re-export commonly used types
pub use error::{ConfigError, LoadError, OwnershipError};
pub use config::{Config, StoreBackend};
pub use catalog::{
    CatalogEntry, CatalogStore, DirectoryLoader, PartitionLoader, RawEntry,
    coerce_weight, GROUPS, ROTATIONS, TYPES,
};
pub use filter::{
    FacetFilterEngine, FilterState, GroupSelection, OwnershipState, WeightBucket,
    ALL_GROUPS_LABEL,
};
pub use ownership::{
    OwnershipCount, OwnershipMap, OwnershipRecord, OwnershipStore, OwnershipSummary,
    OwnershipTracker, CHANNELS, STORE_KEY,
};
pub use store::{JsonFileStore, MemoryStore, SqliteStore};
pub use query::QueryEvaluator;
pub use navigation::SelectionNavigator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
