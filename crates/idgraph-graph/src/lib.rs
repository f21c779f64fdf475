//! # idgraph Graph
//!
//! Neo4j side of the directory sync.
//!
//! Provides the `GraphStore` seam (Neo4j and in-memory), the upsert engine,
//! the mark-and-sweep cleanup planner and the run orchestrator that
//! sequences them.

pub mod client;
pub mod schema;
pub mod store;
pub mod sync;

pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use store::{GraphStore, MemoryGraph, Neo4jStore, NodeMerge, NodeSweep, RelationshipMerge};
pub use sync::cleanup::{CleanupPlanner, SweepCounts};
pub use sync::upsert::{NodeUpsert, RelationshipUpsert, UpsertEngine};
pub use sync::{SyncOptions, SyncOrchestrator};
