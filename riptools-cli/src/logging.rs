// riptools-cli/src/logging.rs
//
// Logging helpers. The main logging implementation uses the standard `log`
// crate with `env_logger` as the backend, configured in main.rs; verbosity
// is controlled through RUST_LOG (info by default).

/// Returns the current local timestamp formatted as "YYYY-MM-DD HH:MM:SS",
/// used to stamp run log headers.
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
