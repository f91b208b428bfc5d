//! Tool-facing pieces: canonical names, typed arguments, and the manual
//! operations offered to the model.
//!
//! # Submodules
//!
//! - [`names`]: tool-name constants, the built-in protected list, and
//!   [`ToolKind`](names::ToolKind) classification.
//! - [`args`]: [`ToolArgs`](args::ToolArgs), a tagged view over the JSON
//!   arguments hosts send.
//! - [`manual`]: `sieve_distill`, `sieve_compress`, `sieve_prune`:
//!   definitions, argument parsing, and dispatch.

pub mod args;
pub mod manual;
pub mod names;

pub use args::ToolArgs;
pub use manual::{ManualToolDef, definitions as manual_tool_definitions};
pub use names::ToolKind;
