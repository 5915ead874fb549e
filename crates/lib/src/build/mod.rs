//! Build orchestration.
//!
//! A build run validates the content, checks the build profile out, and for
//! every enabled platform in order switches the environment, re-validates,
//! bundles and relocates the output into the staging root. Once every
//! platform has succeeded the manifest and metadata are stamped and the
//! staging root is archived. The first failure aborts the run; the original
//! build profile is put back on every exit path.
//!
//! # Submodules
//!
//! - [`observer`] - Hooks called around each platform build
//! - [`pipeline`] - The orchestrator and the manual build flows

pub mod observer;
pub mod pipeline;
mod types;

pub use observer::{BuildObserver, NoopObserver};
pub use pipeline::{DestinationPrompt, Pipeline};
pub use types::*;
