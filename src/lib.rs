//! pardon: author, execute, and verify HTTP request collections.
//!
//! The crate is built around a bidirectional template/schema kernel
//! (see [`schema`]) that both *matches* concrete HTTP traffic against
//! templates and *renders* templates into concrete requests. Everything
//! else — the collection loader, the execution pipeline, the async
//! attribution tracker, flows — is built on top of that kernel.
//!
//! Module map:
//! - [`pattern`]: string/regex variable templates (`{{...}}` spans).
//! - [`scope`]: hierarchical variable scopes and the restricted expression
//!   language used in `= expr` bindings.
//! - [`schema`]: the core `Schematic`/`Schema` traits and merge kernel.
//! - [`config_space`]: option-row based configuration resolution.
//! - [`https`]: HTTP request/response templates and the `.https` file
//!   format.
//! - [`pipeline`]: the six-stage lazy execution state machine.
//! - [`tracker`]: async task attribution for concurrent executions.
//! - [`flows`]: multi-step flow composition on top of the pipeline.
//! - [`collection`]: loading a directory tree of layers into a collection.
//! - [`cmd`]: the CLI surface.
//! - [`errors`]: the crate-wide error type.
//! - [`log`]: tracing/subscriber initialization.

pub mod cmd;
pub mod collection;
pub mod config_space;
pub mod errors;
pub mod flows;
pub mod https;
pub mod log;
pub mod pattern;
pub mod pipeline;
pub mod schema;
pub mod scope;
pub mod tracker;
pub mod utils;

pub use errors::{PardonError, Result};
