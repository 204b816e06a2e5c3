pub mod config;
pub mod errors;
pub mod mesh;
pub mod routes;
pub mod worldgen;

// Selective re-exports for external consumers

pub use config::RouteParams;
pub use errors::{WayfarerError, WayfarerResult};
pub use mesh::{CellId, Feature, Settlement, WorldMesh};
pub use routes::{NetworkBuilder, RouteKind, RouteNetwork, RouteSegment};
