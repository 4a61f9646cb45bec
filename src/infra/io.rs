//! Small filesystem helpers shared by load and save

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, Result};

/// Renames and creations go through this first; clobbering an existing
/// file would lose user configuration.
pub fn assert_vacant(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::Invariant(format!(
            "refusing to overwrite existing file {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
pub fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
pub fn permissions_of(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    Ok(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn permissions_of(_path: &Path) -> Result<u32> {
    Ok(0o755)
}

/// Name of the forwarder a proxified script gets inside the cfg dir, so
/// the generator still runs it during a load.
pub fn forwarder_path(cfg_dir: &Path, script_path: &Path) -> PathBuf {
    let name = script_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    cfg_dir.join(format!("LS_{name}"))
}

/// Writes a forwarder: a two line shell script naming the real script.
/// Returns false when one already exists.
pub fn create_script_forwarder(cfg_dir: &Path, script_path: &Path, prefix: &str) -> Result<bool> {
    let target = forwarder_path(cfg_dir, script_path);
    if target.exists() {
        return Ok(false);
    }
    let script = script_path.to_string_lossy();
    let script = script.strip_prefix(prefix).unwrap_or(&script);
    let content = format!("#!/bin/sh\n'{script}'");
    fs::write(&target, content).map_err(|e| Error::io(&target, e))?;
    set_permissions(&target, 0o755)?;
    Ok(true)
}

pub fn remove_script_forwarder(cfg_dir: &Path, script_path: &Path) -> Result<()> {
    let target = forwarder_path(cfg_dir, script_path);
    fs::remove_file(&target).map_err(|e| Error::io(&target, e))
}

/// Reads the script path out of a forwarder file (the quoted second line).
pub fn read_script_forwarder(forwarder: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(forwarder).ok()?;
    let line = content.lines().nth(1)?.trim();
    let inner = line.strip_prefix('\'')?.strip_suffix('\'')?;
    if inner.is_empty() {
        return None;
    }
    Some(PathBuf::from(inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarder_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("proxifiedScripts").join("linux");
        let created = create_script_forwarder(dir.path(), &script, "").unwrap();
        assert!(created);
        // second creation is a no-op
        assert!(!create_script_forwarder(dir.path(), &script, "").unwrap());

        let forwarder = forwarder_path(dir.path(), &script);
        assert_eq!(read_script_forwarder(&forwarder), Some(script.clone()));

        remove_script_forwarder(dir.path(), &script).unwrap();
        assert!(!forwarder.exists());
    }

    #[test]
    fn vacancy_check_rejects_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        assert!(assert_vacant(&file).is_ok());
        std::fs::write(&file, "x").unwrap();
        assert!(assert_vacant(&file).is_err());
    }
}
