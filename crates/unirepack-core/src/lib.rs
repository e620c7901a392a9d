pub mod archive;
pub mod config;
pub mod content;
pub mod convert;
pub mod error;
pub mod gather;
pub mod loader;
pub mod meta;
pub mod overrides;
pub mod package;
pub mod pipeline;
pub mod pubgrub_adapter;
pub mod registry;
pub mod resolver;
pub mod sources;
pub mod types;
pub mod validate;

pub mod reporter;

pub use error::{RepackError, Result};
pub use pipeline::{Repackager, RunOptions, RunSummary};
pub use reporter::{NullReporter, Reporter};
