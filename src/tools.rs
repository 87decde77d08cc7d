//! Locating the external programs this tool drives.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LUDUSAVI: &str = "ludusavi";
pub const RESTIC: &str = "restic";

const LUDUSAVI_HOME: &str = "https://github.com/mtkennerly/ludusavi";
const RESTIC_HOME: &str = "https://restic.net/";

/// Resolve `program`, preferring an explicit override over the search path.
///
/// An override must point at an existing file; it is not looked up on `PATH`.
pub fn find_executable(program: &str, override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            debug!("Using {} from override: {}", program, path.display());
            return Ok(path.to_path_buf());
        }
        return Err(Error::ExecutableNotFound {
            program: program.to_string(),
            hint: format!("{} does not exist", path.display()),
        });
    }

    which::which(program)
        .map(|path| {
            debug!("Found {} at {}", program, path.display());
            path
        })
        .map_err(|_| Error::ExecutableNotFound {
            program: program.to_string(),
            hint: install_hint(program),
        })
}

fn install_hint(program: &str) -> String {
    match program {
        LUDUSAVI => LUDUSAVI_HOME.to_string(),
        RESTIC => RESTIC_HOME.to_string(),
        other => format!("Install {} and make sure it is on PATH", other),
    }
}
