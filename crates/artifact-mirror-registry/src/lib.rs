//! # Artifact Mirror Registry
//!
//! Tag discovery against upstream container registries.
//!
//! This crate provides:
//!
//! - [`RetryingClient`] - bounded exponential-backoff retry over an injectable [`HttpTransport`]
//! - [`client`] - one tag-listing client per registry API flavor
//! - [`RegistryResolver`] - route table from registry host to client
//! - [`version`] - regex filters, semver constraints and latest-version reduction
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use artifact_mirror_registry::{
//!     Credentials, HttpConfig, RegistryResolver, ReqwestTransport, RetryingClient, TagSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = ReqwestTransport::new(&HttpConfig::default())?;
//!     let http = RetryingClient::new(Arc::new(transport));
//!     let resolver = RegistryResolver::new(http, Credentials::new());
//!
//!     let tags = resolver.list_tags("quay.io/skopeo/stable").await?;
//!     println!("{} tags", tags.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! reference ──> ImageLocation ──> RegistryResolver ──> TagLister ──> RetryingClient ──> HttpTransport
//!                                   (route table)     (per flavor)   (backoff)         (reqwest / mock)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
mod config;
mod error;
pub mod mock;
mod reference;
mod resolver;
mod retry;
mod transport;
pub mod version;

pub use client::TagLister;
pub use config::{Credentials, HttpConfig};
pub use error::RegistryError;
pub use reference::{is_docker_hub_host, ImageLocation, DOCKER_HUB_HOST, DOCKER_HUB_LIBRARY};
pub use resolver::{RegistryResolver, SharedTagSource, TagSource};
pub use retry::{RetryPolicy, RetryingClient};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
pub use version::VersionConstraint;
