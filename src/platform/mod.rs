use std::path::{Path, PathBuf};

/// Platform-specific filesystem conventions behind a common interface.
/// Each OS provides its own `NativePlatform` so call sites stay free of `#[cfg]` blocks.
pub trait Platform {
    /// Set restrictive *directory* permissions (0o700 on Unix, no-op on Windows).
    fn restrict_dir_permissions(path: &Path);

    /// Set restrictive *file* permissions (0o600 on Unix, no-op on Windows).
    fn restrict_file_permissions(path: &Path);

    /// Root data directory holding the state file, lock and optional config.
    /// Unix: `~/.iceout-relay`, Windows: `%APPDATA%\iceout-relay`.
    fn data_dir() -> PathBuf;
}

pub const DATA_DIR_ENV: &str = "ICEOUT_RELAY_DATA_DIR";

/// Honors the `ICEOUT_RELAY_DATA_DIR` override, otherwise returns `default`.
fn resolve_data_dir(default: PathBuf) -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => default,
    }
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
