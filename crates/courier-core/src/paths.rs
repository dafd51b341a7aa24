//! Where the client keeps state that outlives one process, such as the
//! last session id the server handed out.

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Overrides the state directory when set.
pub const STATE_DIR_ENV: &str = "COURIER_STATE_DIR";

/// State directory relative to the user's home.
const HOME_STATE_DIR: &str = ".courier/state";

/// State directory for the current user, honouring `COURIER_STATE_DIR`.
pub fn default_state_dir() -> PathBuf {
    state_dir_from(env::var_os(STATE_DIR_ENV), env::var_os("HOME"))
}

/// Picks the override, then `<home>/.courier/state`, then a path relative
/// to the working directory. Empty values count as unset.
pub fn state_dir_from(override_dir: Option<OsString>, home: Option<OsString>) -> PathBuf {
    if let Some(dir) = override_dir.filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }

    match home.filter(|home| !home.is_empty()) {
        Some(home) => Path::new(&home).join(HOME_STATE_DIR),
        None => PathBuf::from(HOME_STATE_DIR),
    }
}
