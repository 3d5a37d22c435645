//! HCIFlow Cloud Engine
//!
//! Reconciles declared HCI cloud entities (environments, VPCs, networks,
//! volumes, bare-metal servers, ...) against the HCI REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  HCIFlow CLI                     │
//! │          (hciflow plan / apply / destroy)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                hciflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Engine  ── Declared (tagged registry)   │   │
//! │  └──────────────────┬───────────────────────┘   │
//! │  ┌──────────────────▼───────────────────────┐   │
//! │  │  trait Reconciler (one impl per entity)   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌────────────┐ ┌─────────────┐ ┌────────────┐  │
//! │  │ Identifier │ │  Resource   │ │  Update    │  │
//! │  │ resolver   │ │  catalog    │ │  planner   │  │
//! │  └────────────┘ └──────┬──────┘ └────────────┘  │
//! └────────────────────────┼────────────────────────┘
//!                          │ trait ApiClient
//!                  ┌───────▼───────┐
//!                  │ hciflow-cloud │
//!                  │     -http     │
//!                  └───────────────┘
//! ```
//!
//! Names given in place of ids are resolved against catalogs that are
//! listed at most once per pass. Nothing is retried and asynchronous task
//! ids are reported, never awaited.

pub mod action;
pub mod api;
pub mod catalog;
pub mod context;
pub mod engine;
pub mod entities;
pub mod error;
pub mod identifier;
pub mod membership;
pub mod plan;
pub mod reconciler;
pub mod registry;
pub mod service;
pub mod spec;

#[cfg(test)]
mod testing;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use api::{ApiClient, ApiErrorEntry, ApiRequest, ApiResponse, Method, Options, TaskRef};
pub use catalog::{CatalogEntry, CatalogItem, DirectoryCatalog, ResourceCatalog};
pub use context::EnvironmentContext;
pub use engine::{Engine, EngineOptions};
pub use entities::ResizeErrorPolicy;
pub use error::{ApiErrorResponse, CloudError, ErrorKind, Result};
pub use identifier::{Reference, TokenClass};
pub use membership::{MemberSet, RoleAssignment};
pub use plan::{RemoteOperation, UpdateFamily};
pub use reconciler::{LifecycleState, ObservedState, ReadMode, ReconciliationResult, Reconciler};
pub use registry::{Declared, DeclaredEntity, EntityKind, Manifest};
pub use spec::{Declare, DesiredSpec, FieldValue};
