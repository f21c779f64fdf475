//! idgraph Core Library
//!
//! Declarative schemas, run-tagged records and the pure half of the
//! directory sync pipeline. Nothing in this crate talks to the graph or
//! the network.

pub mod error;
pub mod models;
pub mod normalize;
pub mod plan;
pub mod record;
pub mod run_tag;
pub mod schema;
pub mod source;
pub mod summary;

pub use error::{IdGraphError, IdGraphResult};
pub use normalize::{normalize, normalize_batch, normalize_relationship};
pub use plan::{NodeSync, ParentEndpoint, RelationshipSync, SyncPlan};
pub use record::{NodeRecord, PropertyValue, RawEntity, RelationshipRecord};
pub use run_tag::RunTag;
pub use schema::{Direction, NodeSchema, PropertyRef, RelationshipSchema, SchemaRegistry};
pub use source::{EntitySource, Page};
pub use summary::{RunSummary, TypeKind, TypeStatus, TypeSummary};
