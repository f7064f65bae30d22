//! Client SDK for the Fastn integration platform.
//!
//! Connectors and their tools come from a locally synced registry
//! (`.fastn/registry.json`); calls go to the hosted API through a blocking
//! ([`FastnClient`]) or async ([`AsyncFastnClient`]) client.

// Error taxonomy
pub mod error;

// Layered configuration (constructor > env > file > defaults)
pub mod config;

// JWT claims, request headers
pub mod jwt;
pub mod headers;

// Device-code login and token refresh
pub mod auth;

// HTTP/GraphQL transports and response classification
pub mod transport;

// Registry document and read-only catalog
pub mod registry;
pub mod catalog;

// Runtime-dispatched connector proxies
pub mod proxy;

// LLM tool formats
pub mod convert;

// Client facades
pub mod client;

pub use catalog::{Catalog, ConnectorSummary, ToolMatch};
pub use client::{
    AsyncConnectionScope, AsyncFastnClient, ClientBuilder, Connection, ConnectionScope,
    FastnClient, Project, Skill, SkillRun,
};
pub use config::{FastnConfig, Stage};
pub use convert::{ToolDefinition, ToolFormat};
pub use error::{FastnError, Result};
pub use proxy::{AsyncConnectorProxy, CallOptions, ConnectorProxy, InvocationRequest};
pub use registry::{ConnectorEntry, Registry, ToolEntry};
