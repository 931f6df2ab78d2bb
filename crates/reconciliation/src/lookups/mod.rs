//! Lookup collaborators consumed by the reconciliation service.
//!
//! User, catalog, and location management live outside this system; the
//! service only needs these narrow read interfaces. The in-memory
//! implementations back the test suites and the default binary.

pub mod catalog;
pub mod identity;
pub mod location;

pub use catalog::{CatalogItem, CatalogLookup, InMemoryCatalog};
pub use identity::{Actor, IdentityLookup, InMemoryIdentity, Role};
pub use location::{InMemoryLocations, LocationInfo, LocationLookup};
