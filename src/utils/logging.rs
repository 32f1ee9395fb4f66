use std::io::Write;

const DEFAULT_LOG_FILE: &str = "credence-debug.log";

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => ({
        $crate::utils::logging::append(&format!($($arg)*));
    })
}

/// `CREDENCE_LOG_FILE` picks the file; `off` silences logging.
pub fn log_file() -> Option<String> {
    match std::env::var("CREDENCE_LOG_FILE") {
        Ok(value) if value.trim().eq_ignore_ascii_case("off") => None,
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => Some(DEFAULT_LOG_FILE.to_string()),
    }
}

pub fn append(message: &str) {
    let Some(path) = log_file() else {
        return;
    };
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        let _ = writeln!(file, "[{}] {}", now, message);
    }
}
