//! Core types for dockerize.
//!
//! This crate defines the stack registry ([`Registry`]) and its load-time
//! validation, stack detection ([`detect`]) over a [`FileOracle`], the
//! layered per-invocation [`ConfigSet`], the `dockerize.toml` schema
//! ([`DockerizeConfig`]), and shared error types.

pub mod config;
pub mod detect;
pub mod error;
pub mod oracle;
pub mod registry;
pub mod stack;
pub mod template;
pub mod variables;

pub use config::{CONFIG_FILE, DockerizeConfig, ProjectConfig, parse_override};
pub use detect::detect;
pub use error::{DetectionFailure, Error, RegistryError, Rejection, Result, UnknownStack};
pub use oracle::{FileOracle, FsOracle, MemoryOracle};
pub use registry::{ArtifactKind, ArtifactTemplate, Registry, TemplateSet, validate_relative_path};
pub use stack::{BUILTIN_VARIABLES, Marker, StackId, StackProfile};
pub use template::{Rendered, Segment, Template};
pub use variables::{ConfigSet, ConfigValue, Evaluation, Resolved, Source, VariableSpec};
