// riptools-cli/src/lib.rs
//
// Library portion of the riptools CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands};
pub use commands::detect_crop::run_detect_crop;
pub use commands::inspect::run_inspect;
pub use commands::remux::run_remux;
pub use commands::transcode::run_transcode;
