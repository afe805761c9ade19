//! Locates the flightline-overlap tool executable on the system.

use crate::error::FlightlineError;
use std::path::{Path, PathBuf};
use which::which;

/// Environment variable that overrides the default tool binary path.
pub const FLIGHTLINE_BIN_ENV_VAR: &str = "FLIGHTLINE_TOOL_BIN";

/// Base name of the tool executable, without any platform suffix.
pub const TOOL_NAME: &str = "lidar_flightline_overlap";

/// Platform file name of the tool executable: `.exe` is appended on
/// Windows-family targets, nothing elsewhere.
#[must_use]
pub fn tool_file_name() -> String {
    if cfg!(windows) {
        format!("{TOOL_NAME}.exe")
    } else {
        TOOL_NAME.to_string()
    }
}

/// Resolves the tool executable inside a host-supplied tools directory,
/// e.g. the `plugins/NativePlugins` directory under the host's resources.
///
/// The returned path is a plain join; existence is not checked.
#[must_use]
pub fn tool_in_dir(dir: &Path) -> PathBuf {
    dir.join(tool_file_name())
}

/// Locates the tool executable.
///
/// An explicit path, when given, is authoritative: it either exists or the
/// lookup fails. Without one, the `FLIGHTLINE_TOOL_BIN` environment
/// variable, `$PATH`, and a handful of conventional install directories
/// are probed in that order.
///
/// # Errors
///
/// Returns `FlightlineError::ExecutableNotFound` when no valid executable
/// can be located.
pub fn discover_tool(explicit_path: Option<PathBuf>) -> Result<PathBuf, FlightlineError> {
    if let Some(path) = explicit_path {
        return if path.exists() {
            Ok(path)
        } else {
            Err(FlightlineError::ExecutableNotFound(format!(
                "no tool binary at {}",
                path.display()
            )))
        };
    }

    env_override()
        .or_else(|| which(TOOL_NAME).ok())
        .or_else(|| install_candidates().find(|candidate| candidate.exists()))
        .inspect(|path| tracing::debug!(tool = %path.display(), "resolved tool binary"))
        .ok_or_else(|| {
            FlightlineError::ExecutableNotFound(format!(
                "{TOOL_NAME} is not on PATH and no install location has it; \
                 install WhiteboxTools or point {FLIGHTLINE_BIN_ENV_VAR} at the binary"
            ))
        })
}

/// Path named by `FLIGHTLINE_TOOL_BIN`, if the variable is set and the
/// file is actually there.
fn env_override() -> Option<PathBuf> {
    let path = PathBuf::from(std::env::var_os(FLIGHTLINE_BIN_ENV_VAR)?);
    path.exists().then_some(path)
}

/// Install locations probed when the binary is neither overridden nor on
/// PATH.
fn install_candidates() -> impl Iterator<Item = PathBuf> {
    let mut dirs_to_probe = Vec::new();
    if let Some(home) = dirs::home_dir() {
        if cfg!(unix) {
            dirs_to_probe.push(home.join(".local/bin"));
        }
        dirs_to_probe.push(home.join("WhiteboxTools"));
    }
    dirs_to_probe.push(if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\WhiteboxTools")
    } else {
        PathBuf::from("/usr/local/bin")
    });
    dirs_to_probe.into_iter().map(|dir| tool_in_dir(&dir))
}
