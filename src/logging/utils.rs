//! Log file location, ANSI stripping and timestamps for the file layer.
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Remove CSI escape sequences (colors, cursor movement) from console text
/// before it is written to the log file.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            // parameters run until the final byte in `@`..=`~`
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// Directory holding per-command logs: `$XDG_CACHE_HOME/cfgctl`, else
/// `$HOME/.cache/cfgctl`, else `./.cache/cfgctl`.
fn log_dir_from(xdg_cache: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let cache = xdg_cache.filter(|v| !v.is_empty()).map_or_else(
        || {
            home.filter(|v| !v.is_empty())
                .map_or_else(|| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    cache.join("cfgctl")
}

/// `<log dir>/<command>.log`, creating the directory. `None` if it cannot
/// be created; logging then stays console-only.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let dir = log_dir_from(
        std::env::var_os("XDG_CACHE_HOME"),
        std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")),
    );
    fs::create_dir_all(&dir).ok()?;
    Some(dir.join(format!("{command}.log")))
}

/// Current UTC time for the run header.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format(DATETIME_FORMAT).to_string()
}

/// Current UTC time for each log line.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_is_stored_without_colors() {
        let line = "\x1b[32m2 ok\x1b[0m, \x1b[31m1 failed\x1b[0m \x1b[2mlog: /c/format.log\x1b[0m";
        assert_eq!(strip_ansi(line), "2 ok, 1 failed log: /c/format.log");
    }

    #[test]
    fn log_dir_prefers_xdg_cache() {
        let dir = log_dir_from(Some("/xdg".into()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/xdg/cfgctl"));
    }

    #[test]
    fn log_dir_falls_back_to_home_cache() {
        let dir = log_dir_from(Some(OsString::new()), Some("/home/u".into()));
        assert_eq!(dir, PathBuf::from("/home/u/.cache/cfgctl"));
        assert_eq!(log_dir_from(None, None), PathBuf::from("./.cache/cfgctl"));
    }
}
