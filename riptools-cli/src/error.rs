// riptools-cli/src/error.rs
//
// Error handling for the CLI layer. Commands surface core errors directly;
// main translates them into an exit code.

use riptools_core::CoreError;

pub type CliResult<T> = Result<T, CoreError>;
