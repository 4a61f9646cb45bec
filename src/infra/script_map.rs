//! Persistent map from a script's original (generator-assigned) file name
//! to its current file name
//!
//! Renaming or re-prioritizing a script moves its file; the generator
//! then assigns entries to the new name. This map remembers where each
//! file started so default menu positions survive such moves. Stored as
//! `.script_sources.txt` in the cfg dir, one tab separated row per
//! script, paths relative to the cfg dir.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::core::error::{Error, Result};

const MAP_FILE: &str = ".script_sources.txt";

#[derive(Debug)]
pub struct ScriptSourceMap {
    cfg_dir: PathBuf,
    /// original path -> current path, both absolute
    map: IndexMap<PathBuf, PathBuf>,
    file_existed: bool,
}

impl ScriptSourceMap {
    pub fn new(cfg_dir: &Path) -> Self {
        ScriptSourceMap {
            cfg_dir: cfg_dir.to_path_buf(),
            map: IndexMap::new(),
            file_existed: false,
        }
    }

    fn map_path(&self) -> PathBuf {
        self.cfg_dir.join(MAP_FILE)
    }

    /// True when a map file was present at the last `load`. A missing
    /// file means a first run; defaults are registered from the scripts
    /// actually found.
    pub fn file_existed(&self) -> bool {
        self.file_existed
    }

    pub fn load(&mut self) -> Result<()> {
        self.map.clear();
        let path = self.map_path();
        self.file_existed = path.exists();
        if !self.file_existed {
            debug!(file = %path.display(), "no script source map yet");
            return Ok(());
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        for line in content.lines() {
            let Some((default, current)) = line.split_once('\t') else {
                continue;
            };
            self.map
                .insert(self.cfg_dir.join(default), self.cfg_dir.join(current));
        }
        Ok(())
    }

    /// Writes the map, dropping rows that carry no information: identity
    /// mappings and paths outside the cfg dir.
    pub fn save(&self) -> Result<()> {
        let mut out = String::new();
        for (default, current) in &self.map {
            if default == current {
                continue;
            }
            let (Ok(d), Ok(c)) = (
                default.strip_prefix(&self.cfg_dir),
                current.strip_prefix(&self.cfg_dir),
            ) else {
                continue;
            };
            out.push_str(&format!("{}\t{}\n", d.display(), c.display()));
        }
        let path = self.map_path();
        if out.is_empty() {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            }
            return Ok(());
        }
        fs::write(&path, out).map_err(|e| Error::io(&path, e))
    }

    /// Registers a script under its current path. A script never seen
    /// before maps to itself.
    pub fn add_script(&mut self, path: &Path) {
        if self.map.values().any(|c| c == path) {
            return;
        }
        self.map.insert(path.to_path_buf(), path.to_path_buf());
    }

    /// Records that the file at `old_path` now lives at `new_path`,
    /// keeping its original name as the key.
    pub fn register_move(&mut self, old_path: &Path, new_path: &Path) {
        let default = self
            .map
            .iter()
            .find(|(_, current)| current.as_path() == old_path)
            .map(|(d, _)| d.clone());
        match default {
            Some(default) => {
                self.map.insert(default, new_path.to_path_buf());
            }
            None => {
                self.map
                    .insert(old_path.to_path_buf(), new_path.to_path_buf());
            }
        }
    }

    /// The original path of the script currently at `path`.
    pub fn source_name(&self, path: &Path) -> Option<&Path> {
        self.map
            .iter()
            .find(|(_, current)| current.as_path() == path)
            .map(|(default, _)| default.as_path())
    }

    /// Whether some script originally lived at `path`. Renumeration must
    /// not hand that slot to another script.
    pub fn has_default(&self, path: &Path) -> bool {
        self.map.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_chain_back_to_the_original_name() {
        let mut map = ScriptSourceMap::new(Path::new("/etc/menu.d"));
        map.add_script(Path::new("/etc/menu.d/10_linux"));
        map.register_move(Path::new("/etc/menu.d/10_linux"), Path::new("/etc/menu.d/25_linux"));
        map.register_move(Path::new("/etc/menu.d/25_linux"), Path::new("/etc/menu.d/30_linux"));

        assert_eq!(
            map.source_name(Path::new("/etc/menu.d/30_linux")),
            Some(Path::new("/etc/menu.d/10_linux"))
        );
        assert!(map.has_default(Path::new("/etc/menu.d/10_linux")));
        assert!(!map.has_default(Path::new("/etc/menu.d/30_linux")));
    }

    #[test]
    fn save_and_load_skip_identity_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = ScriptSourceMap::new(dir.path());
        map.add_script(&dir.path().join("40_custom"));
        map.register_move(&dir.path().join("10_linux"), &dir.path().join("25_linux"));
        map.save().unwrap();

        let mut reloaded = ScriptSourceMap::new(dir.path());
        reloaded.load().unwrap();
        assert!(reloaded.file_existed());
        assert_eq!(
            reloaded.source_name(&dir.path().join("25_linux")),
            Some(dir.path().join("10_linux").as_path())
        );
        // identity row was dropped on save
        assert_eq!(reloaded.source_name(&dir.path().join("40_custom")), None);
    }
}
