//! Minio operator - reconciles `Minio` custom resources into a running Minio
//!
//! A `Minio` resource (`operator.heureso.com/v1alpha1`) declares root
//! credentials for a single Minio instance. The operator keeps a Deployment
//! and a Service in the resource's namespace in line with it and reports the
//! outcome on the resource's `Ready` condition.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definition and status conditions
//! - [`assets`] - Baseline Deployment and Service manifests
//! - [`projector`] - Desired state of the operands for one resource
//! - [`owner`] - Controller owner references on operands
//! - [`apply`] - Create-or-patch with JSON merge patches
//! - [`controller`] - Reconciliation logic and controller wiring
//! - [`list`] - Tabular listing of Minio resources
//! - [`config`] - Command line and environment configuration
//! - [`telemetry`] - Logging initialization
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod apply;
pub mod assets;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod list;
pub mod owner;
pub mod projector;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
