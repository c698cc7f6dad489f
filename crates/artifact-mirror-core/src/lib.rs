//! # Artifact Mirror Core
//!
//! Core data model of the artifact mirror: the declarative list of
//! container artifacts to mirror, the repositories they are mirrored to,
//! and the pure logic that reconciles and derives them.
//!
//! This crate provides:
//!
//! - [`Artifact`] - One mirrorable source reference with its tags and mirroring rules
//! - [`ArtifactAccumulator`] - Identity-keyed tag-set union and one-sided tag difference
//! - [`Config`] - The whole `config.yaml` document and its derivation into sync directives
//! - [`regsync`] - The downstream sync tool's configuration document
//! - [`fingerprint`] - Order-independent hashing of a change-set
//! - [`validation`] - Validation framework shared by every configuration type
//!
//! ## Example
//!
//! ```rust
//! use artifact_mirror_core::{Artifact, ArtifactAccumulator};
//!
//! let existing = Artifact::new("library/ubuntu", vec!["20.04".to_string()])?;
//! let discovered = Artifact::new(
//!     "library/ubuntu",
//!     vec!["20.04".to_string(), "22.04".to_string()],
//! )?;
//!
//! let mut accumulator = ArtifactAccumulator::new();
//! accumulator.add(existing);
//!
//! let new_tags = accumulator.tag_difference(&discovered).expect("22.04 is new");
//! assert_eq!(new_tags.tags(), ["22.04"]);
//! # Ok::<(), artifact_mirror_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accumulator;
pub mod artifact;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod regsync;
pub mod validation;

#[cfg(test)]
mod proptest_tests;

pub use accumulator::ArtifactAccumulator;
pub use artifact::{Artifact, ArtifactKey, DoNotMirror};
pub use config::{Config, Repository};
pub use error::{Error, Result};
pub use fingerprint::fingerprint;
pub use regsync::{RegsyncConfig, SyncDirective};
pub use validation::{Validate, ValidationError, ValidationErrors};
