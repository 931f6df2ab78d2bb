//! Reconciliation layer for the retail-ops order backend.
//!
//! This crate provides the only code path allowed to mutate orders:
//! - the `ReconciliationService` orchestrating creation, payment capture,
//!   status changes, and refunds as atomic store writes
//! - lookup collaborator traits for the catalog, identity, and location
//!   subsystems, with in-memory implementations
//! - the configurable order-number generation policy

pub mod error;
pub mod lookups;
pub mod number;
pub mod requests;
pub mod service;

pub use error::{ReconcileError, Result};
pub use lookups::{
    Actor, CatalogItem, CatalogLookup, IdentityLookup, InMemoryCatalog, InMemoryIdentity,
    InMemoryLocations, LocationInfo, LocationLookup, Role,
};
pub use number::OrderNumberPolicy;
pub use requests::{CreateOrderRequest, LineRequest};
pub use service::ReconciliationService;
