//! # idgraph Microsoft Graph
//!
//! Directory source backed by the Microsoft Graph API: client-credentials
//! auth, OData pagination and throttling retries, exposed as an
//! [`idgraph_core::EntitySource`].

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod source;

pub use auth::TokenCache;
pub use client::{MsGraphClient, ODataPage};
pub use config::MsGraphConfig;
pub use error::{MsGraphError, MsGraphResult};
pub use source::MsGraphSource;
