//! # geosync-engine — Catalog Reconciliation
//!
//! Keeps a resource's GeoServer workspace consistent with the publishable
//! geospatial files in its repository manifest.
//!
//! ## Components
//!
//! - **Inventory** (`inventory`): manifest to desired [`LayerDescriptor`]s.
//! - **Catalog** (`catalog`): workspace to actual [`CatalogEntry`]s.
//! - **Planner** (`plan`): pure diff of the two.
//! - **Stager** (`stage`): copies files into GeoServer's storage.
//! - **Publisher** (`publish`, `style`): register, verify, rename, style.
//! - **Unpublisher** (`unpublish`): catalog delete plus storage cleanup.
//! - **Workspace manager** (`workspace`): create and destroy as a unit.
//! - **Orchestrator** (`reconcile`): sequences one convergence run.
//! - **Dispatcher** (`dispatch`): one run per resource at a time.
//! - **Audit** (`audit`): read-only comparisons for reporting.
//!
//! ## Crate Policy
//!
//! - All HTTP goes through `geosync-client`.
//! - No state is persisted; every run recomputes desired and actual state.
//!
//! [`LayerDescriptor`]: geosync_core::LayerDescriptor
//! [`CatalogEntry`]: geosync_core::CatalogEntry

pub mod audit;
pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod outcome;
pub mod plan;
pub mod publish;
pub mod reconcile;
pub mod stage;
pub mod style;
pub mod unpublish;
pub mod workspace;

pub use dispatch::{Dispatcher, ResourceLocks};
pub use error::{LayerFailure, PublishStep, ReconcileError, StageError, StyleError};
pub use inventory::{Access, Inventory};
pub use outcome::{LayerResult, LayerStatus, Outcome};
pub use plan::ReconciliationPlan;
pub use publish::PublishedLayer;
pub use reconcile::Reconciler;
pub use unpublish::UnregisterFailure;
