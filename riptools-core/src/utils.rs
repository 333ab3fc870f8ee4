//! Utility functions for formatting and argument handling.
//!
//! General-purpose helpers used throughout the riptools-core library:
//! duration and bitrate formatting for inspection reports, timestamp
//! parsing for `--start`/`--stop`, and shell quoting for dry-run output.

/// Formats a duration in seconds as H:MM:SS (e.g. 5970.0 -> "1:39:30").
/// Returns "?:??:??" for invalid inputs.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "?:??:??".to_string();
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{hours}:{minutes:02}:{secs:02}")
}

/// Formats a bitrate in kb/s with thousands separators (e.g. 24000 -> "24,000 kb/s").
#[must_use]
pub fn format_bitrate(kbps: u64) -> String {
    let digits = kbps.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{grouped} kb/s")
}

/// Parses an `HH:MM:SS` or `MM:SS` timestamp into whole seconds.
/// Returns `None` for anything else, including out-of-range fields.
#[must_use]
pub fn parse_timestamp(timestamp: &str) -> Option<u64> {
    let parts: Vec<&str> = timestamp.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }

    let mut seconds = 0u64;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value = part.parse::<u64>().ok()?;
        // Minutes and seconds fields must stay below 60
        if i > 0 && value >= 60 {
            return None;
        }
        seconds = seconds * 60 + value;
    }
    Some(seconds)
}

/// Parses an ffprobe rational such as "24000/1001" into a float.
#[must_use]
pub fn parse_rational(rational: &str) -> Option<f64> {
    match rational.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => rational.trim().parse::<f64>().ok(),
    }
}

/// Quotes a single argument for display, POSIX-shell style.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Joins a command line into a single shell-quoted string for dry-run
/// printing and log headers.
#[must_use]
pub fn shell_join<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| shell_quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
