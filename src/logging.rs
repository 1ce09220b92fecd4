//! Durable activity/transcript log.
//!
//! Every submitted text and every status/style/error event is appended with a
//! timestamp to a plain text file. Unlike the bounded in-memory log the UI
//! shows, this file never evicts. Logging must never break the UI: all write
//! failures are swallowed.

use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, OnceLock,
    },
    time::{SystemTime, UNIX_EPOCH},
};

const DEFAULT_LOG_FILENAME: &str = "console.log";

static LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_CONTENT: AtomicBool = AtomicBool::new(false);
static LOG_STATE: OnceLock<Mutex<LogState>> = OnceLock::new();

#[derive(Default)]
struct LogState {
    path: Option<PathBuf>,
    file: Option<fs::File>,
}

fn log_state() -> &'static Mutex<LogState> {
    LOG_STATE.get_or_init(|| Mutex::new(LogState::default()))
}

/// Resolve the log path: `SPEAKTERM_LOG_PATH` wins, else a sibling of the
/// config file.
pub fn log_event_path(config_path: &Path) -> PathBuf {
    if let Some(path) = env::var_os("SPEAKTERM_LOG_PATH") {
        return PathBuf::from(path);
    }
    config_path.with_file_name(DEFAULT_LOG_FILENAME)
}

/// Configure the durable log. Called once at startup, before the engine runs.
/// `content_enabled` archives the submitted texts themselves and is on by
/// default; opting out keeps only the event lines.
pub fn init_logging(enabled: bool, content_enabled: bool, config_path: &Path) {
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
    LOG_CONTENT.store(enabled && content_enabled, Ordering::Relaxed);
    let mut state = log_state().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if enabled {
        state.path = Some(log_event_path(config_path));
        state.file = None;
    } else {
        state.path = None;
        state.file = None;
    }
}

/// Append one timestamped event line. Best effort.
pub fn log_event(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let line = format!("[{}] {msg}\n", clock_stamp());
    let mut state = log_state().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if state.file.is_none() {
        let Some(path) = state.path.clone() else { return };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        state.file = fs::OpenOptions::new().create(true).append(true).open(&path).ok();
    }
    if let Some(file) = state.file.as_mut() {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Archive a submitted text in the transcript without showing it in the UI
/// log panel. Suppressed only when content logging was opted out.
pub fn log_user_text(text: &str) {
    if text.is_empty() || !LOG_CONTENT.load(Ordering::Relaxed) {
        return;
    }
    log_event(&format!("User input: {text}"));
}

/// UTC wall-clock stamp (`HH:MM:SS`) used for both the durable log and the
/// in-memory activity entries.
pub(crate) fn clock_stamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_clock(secs)
}

fn format_clock(secs_since_epoch: u64) -> String {
    let day_secs = secs_since_epoch % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        day_secs / 3_600,
        (day_secs % 3_600) / 60,
        day_secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env mutation is process-global; every test touching SPEAKTERM_LOG_PATH
    // serializes on this lock.
    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn clock_format_wraps_at_midnight() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(86_399), "23:59:59");
        assert_eq!(format_clock(86_400), "00:00:00");
        assert_eq!(format_clock(3_661), "01:01:01");
    }

    #[test]
    fn env_override_wins_for_log_path() {
        let _guard = env_lock().lock().unwrap();
        let previous = env::var_os("SPEAKTERM_LOG_PATH");
        env::set_var("SPEAKTERM_LOG_PATH", "/tmp/custom_speakterm.log");
        let path = log_event_path(Path::new("/home/user/.speakterm/config.json"));
        assert_eq!(path, PathBuf::from("/tmp/custom_speakterm.log"));
        match previous {
            Some(value) => env::set_var("SPEAKTERM_LOG_PATH", value),
            None => env::remove_var("SPEAKTERM_LOG_PATH"),
        }
    }

    #[test]
    fn default_log_path_sits_beside_the_config() {
        let _guard = env_lock().lock().unwrap();
        let previous = env::var_os("SPEAKTERM_LOG_PATH");
        env::remove_var("SPEAKTERM_LOG_PATH");
        let path = log_event_path(Path::new("/home/user/.speakterm/config.json"));
        assert_eq!(path, PathBuf::from("/home/user/.speakterm/console.log"));
        if let Some(value) = previous {
            env::set_var("SPEAKTERM_LOG_PATH", value);
        }
    }

    #[test]
    fn submitted_text_reaches_the_transcript_with_content_logging_on() {
        let _guard = env_lock().lock().unwrap();
        let previous = env::var_os("SPEAKTERM_LOG_PATH");
        env::remove_var("SPEAKTERM_LOG_PATH");

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let dir = env::temp_dir().join(format!("speakterm_transcript_{nanos}"));
        let config_path = dir.join("config.json");

        init_logging(true, true, &config_path);
        log_user_text("Hello world");
        init_logging(false, false, &config_path);

        let content = fs::read_to_string(dir.join(DEFAULT_LOG_FILENAME)).expect("transcript file");
        assert!(
            content.contains("User input: Hello world"),
            "transcript missing the submitted text: {content:?}"
        );

        let _ = fs::remove_dir_all(&dir);
        if let Some(value) = previous {
            env::set_var("SPEAKTERM_LOG_PATH", value);
        }
    }
}
