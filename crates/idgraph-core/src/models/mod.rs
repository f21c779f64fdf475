//! Directory models shipped with idgraph.

pub mod msft365;
