//! Template resolution and artifact writing for dockerize.
//!
//! # Pipeline
//!
//! ```text
//! dockerize generate
//!   1. Detect    ── dockerize_core::detect over the project root
//!   2. Configure ── ConfigSet: defaults < environment < overrides
//!   3. Resolve   ── resolve() renders the stack's template set
//!   4. Write     ── write() stages every artifact, then persists them
//! ```
//!
//! # Failure modes
//!
//! Resolution never blanks a placeholder it cannot fill: the placeholder
//! stays in the rendered text and its root variable is listed in
//! [`ResolutionResult::unresolved`]. [`write`] refuses such a result with
//! [`WriteError::IncompleteConfiguration`] before touching the filesystem.

pub mod resolve;
pub mod writer;

pub use resolve::{RenderedArtifact, ResolutionResult, resolve};
pub use writer::{WriteError, WriteOutcome, write};
