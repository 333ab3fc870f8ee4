//! Interactions with the external CLI tools this library orchestrates.
//!
//! Everything riptools does is delegated to mature external binaries:
//! `ffprobe`/`ffmpeg` for analysis and crop detection, `mkvmerge`/
//! `mkvpropedit` for container work, and `HandBrakeCLI` for transcoding.
//! This module holds the dependency checks and the two subprocess execution
//! styles shared by the tools, plus per-tool submodules for output parsing.

use crate::error::{CoreError, CoreResult, command_failed_error, command_start_error};
use crate::utils::shell_join;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, Stdio};

pub mod ffmpeg;
pub mod ffprobe;
pub mod handbrake;

pub use handbrake::AvailableEncoders;

/// An external tool riptools can shell out to, with the argument its
/// version check expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffprobe,
    Ffmpeg,
    Mkvmerge,
    Mkvpropedit,
    HandBrake,
}

impl Tool {
    /// Binary name as invoked.
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            Tool::Ffprobe => "ffprobe",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Mkvmerge => "mkvmerge",
            Tool::Mkvpropedit => "mkvpropedit",
            Tool::HandBrake => "HandBrakeCLI",
        }
    }

    // ffmpeg-family tools take a single dash here, everything else a double.
    fn version_arg(self) -> &'static str {
        match self {
            Tool::Ffprobe | Tool::Ffmpeg => "-version",
            Tool::Mkvmerge | Tool::Mkvpropedit | Tool::HandBrake => "--version",
        }
    }
}

/// Checks that a required external command is available and executable.
///
/// Runs the tool's version argument with null stdio and only inspects
/// whether the process could be spawned at all.
pub fn check_dependency(tool: Tool) -> CoreResult<()> {
    let result = Command::new(tool.command())
        .arg(tool.version_arg())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(_) => {
            log::debug!("Found dependency: {}", tool.command());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Dependency '{}' not found", tool.command());
            Err(CoreError::DependencyNotFound(tool.command().to_string()))
        }
        Err(e) => {
            log::error!("Failed to start dependency check for '{}': {}", tool.command(), e);
            Err(command_start_error(tool.command(), e))
        }
    }
}

/// Verifies every tool a command needs before doing any work.
pub fn verify_tools(tools: &[Tool]) -> CoreResult<()> {
    for tool in tools {
        check_dependency(*tool)?;
    }
    Ok(())
}

/// Runs a short-lived command to completion, capturing its output.
///
/// The shell-quoted command line and the combined output are appended to
/// `log_file` when one is given. Non-zero exits surface as `CommandFailed`.
pub fn run_logged(argv: &[String], log_file: Option<&mut File>) -> CoreResult<()> {
    let (tool, args) = split_argv(argv)?;

    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| command_start_error(tool, e))?;

    if let Some(log) = log_file {
        writeln!(log, "{}\n", shell_join(argv))?;
        log.write_all(&output.stdout)?;
        log.write_all(&output.stderr)?;
        log.flush()?;
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(command_failed_error(
            tool,
            output.status,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

/// Runs a long-lived command, streaming its stderr into the log file.
///
/// stdout is inherited so the tool's own progress output stays visible on
/// the terminal; stderr lines are appended to the log as they arrive.
/// Used for HandBrakeCLI, which reports progress on stdout and everything
/// else on stderr.
pub fn run_streaming(argv: &[String], log_file: &mut File) -> CoreResult<()> {
    let (tool, args) = split_argv(argv)?;

    writeln!(log_file, "{}\n", shell_join(argv))?;

    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| command_start_error(tool, e))?;

    // stderr is always piped above, so take() cannot fail here
    if let Some(stderr) = child.stderr.take() {
        let reader = BufReader::new(stderr);
        for line in reader.lines() {
            let line = line?;
            writeln!(log_file, "{line}")?;
            log_file.flush()?;
        }
    }

    let status = child.wait().map_err(|e| command_start_error(tool, e))?;
    if status.success() {
        Ok(())
    } else {
        writeln!(log_file, "Command failed: {tool}, exit status: {status}")?;
        Err(command_failed_error(tool, status, String::new()))
    }
}

/// Runs a command with inherited stdio, so its own progress output lands on
/// the user's terminal. Used for plain remuxes, which keep no log file.
pub fn run_passthrough(argv: &[String]) -> CoreResult<()> {
    let (tool, args) = split_argv(argv)?;

    let status = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .status()
        .map_err(|e| command_start_error(tool, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(command_failed_error(tool, status, String::new()))
    }
}

fn split_argv(argv: &[String]) -> CoreResult<(&str, &[String])> {
    match argv.split_first() {
        Some((tool, args)) => Ok((tool.as_str(), args)),
        None => Err(CoreError::OperationFailed(
            "Empty command line".to_string(),
        )),
    }
}

/// Opens (creating or appending to) the plain-text log that sits next to a
/// transcode output, e.g. `Movie.mkv.log`.
pub fn open_run_log(output_file: &Path) -> CoreResult<File> {
    let mut log_path = output_file.as_os_str().to_os_string();
    log_path.push(".log");
    Ok(File::options()
        .create(true)
        .append(true)
        .open(Path::new(&log_path))?)
}
