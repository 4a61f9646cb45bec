//! The repository: every script the cfg dir currently provides
//!
//! Scripts are kept in directory order; removed scripts move to a trash
//! list so rules that still reference their entries keep resolving until
//! save wipes the files.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::core::entry::EntryId;
use crate::core::error::{Error, Result};
use crate::core::script::{Script, ScriptId};
use crate::infra::proxy_script;

#[derive(Debug, Default)]
pub struct Repository {
    pub scripts: Vec<Script>,
    pub trash: Vec<Script>,
}

impl Repository {
    /// Scans a directory for scripts. In the main cfg dir only files named
    /// `NN_name` count, and proxy fragments are skipped (they are loaded as
    /// proxies, not scripts). In the proxified dir every file is a script
    /// and its name is decoded from the file name.
    pub fn load_dir(&mut self, directory: &Path, is_proxified_dir: bool) -> Result<()> {
        let Ok(read) = std::fs::read_dir(directory) else {
            debug!(dir = %directory.display(), "script directory missing, skipping");
            return Ok(());
        };
        let mut paths: Vec<PathBuf> = read
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| !p.is_dir())
            .collect();
        paths.sort();

        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if is_proxified_dir {
                let name = decode_proxified_name(file_name);
                self.scripts.push(Script::from_file(name, &path));
            } else if !proxy_script::is_proxy_script(&path)
                && crate::core::script::extract_index_and_name(file_name).is_some()
            {
                let name = &file_name[3..];
                self.scripts.push(Script::from_file(name, &path));
            }
        }
        Ok(())
    }

    pub fn script(&self, id: ScriptId) -> Option<&Script> {
        self.scripts
            .iter()
            .chain(self.trash.iter())
            .find(|s| s.id == id)
    }

    pub fn script_mut(&mut self, id: ScriptId) -> Option<&mut Script> {
        self.scripts
            .iter_mut()
            .chain(self.trash.iter_mut())
            .find(|s| s.id == id)
    }

    pub fn script_by_file(&self, file_path: &Path) -> Option<&Script> {
        self.scripts.iter().find(|s| s.file_path == file_path)
    }

    pub fn script_by_file_or_create(&mut self, file_path: &Path) -> ScriptId {
        if let Some(s) = self.script_by_file(file_path) {
            return s.id;
        }
        let script = Script::new("noname", file_path);
        let id = script.id;
        self.scripts.push(script);
        id
    }

    pub fn script_by_name(&self, name: &str) -> Option<&Script> {
        self.scripts.iter().find(|s| s.name == name)
    }

    /// The script whose tree holds `entry`, trash included.
    pub fn script_by_entry(&self, entry: EntryId) -> Option<&Script> {
        self.scripts
            .iter()
            .chain(self.trash.iter())
            .find(|s| s.contains(entry))
    }

    pub fn custom_script(&self) -> Option<&Script> {
        self.scripts.iter().find(|s| s.is_custom)
    }

    /// Current file path of every script, trash included. Used to resolve
    /// foreign rule references during the final sync of a load.
    pub fn script_path_map(&self) -> IndexMap<PathBuf, ScriptId> {
        self.scripts
            .iter()
            .chain(self.trash.iter())
            .map(|s| (s.file_path.clone(), s.id))
            .collect()
    }

    /// Drops parsed entries everywhere, keeping user-edited scripts intact.
    pub fn clear_entries(&mut self, preserve_modified: bool) {
        for script in &mut self.scripts {
            if preserve_modified && script.is_modified() {
                continue;
            }
            script.entries_mut().clear();
        }
    }

    /// Writes and registers a new custom script file.
    pub fn create_script(&mut self, name: &str, file_path: &Path, content: &str) -> Result<ScriptId> {
        crate::infra::io::assert_vacant(file_path)?;
        std::fs::write(file_path, content).map_err(|e| Error::io(file_path, e))?;
        let script = Script::from_file(name, file_path);
        let id = script.id;
        self.scripts.push(script);
        Ok(id)
    }

    pub fn remove_script(&mut self, id: ScriptId) {
        if let Some(pos) = self.scripts.iter().position(|s| s.id == id) {
            let script = self.scripts.remove(pos);
            self.trash.push(script);
        }
    }

    pub fn clear_trash(&mut self) -> Result<()> {
        for script in self.trash.drain(..) {
            if script.file_path.exists() {
                std::fs::remove_file(&script.file_path)
                    .map_err(|e| Error::io(&script.file_path, e))?;
            }
        }
        Ok(())
    }
}

/// File name for a script stored in the proxified dir. Slashes cannot
/// appear in file names; a `~N` suffix resolves clashes.
pub fn encode_proxified_name(script_name: &str, existing: &[String]) -> String {
    let base = script_name.replace('/', "_");
    if !existing.iter().any(|e| e == &base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}~{n}");
        if !existing.iter().any(|e| e == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

pub fn decode_proxified_name(file_name: &str) -> String {
    match file_name.rsplit_once('~') {
        Some((base, suffix)) if suffix.chars().all(|c| c.is_ascii_digit()) => base.to_string(),
        _ => file_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::Entry;

    #[test]
    fn script_by_entry_searches_trash_too() {
        let mut repo = Repository::default();
        let mut script = Script::new("memtest", "/etc/menu.d/20_memtest");
        let entry = Entry::menu("Memtest86+", "", "linux16 /memtest\n");
        let entry_id = entry.id;
        script.entries_mut().push(entry);
        let script_id = script.id;
        repo.scripts.push(script);

        assert_eq!(repo.script_by_entry(entry_id).unwrap().id, script_id);
        repo.remove_script(script_id);
        assert!(repo.scripts.is_empty());
        assert_eq!(repo.script_by_entry(entry_id).unwrap().id, script_id);
        assert!(repo.script_path_map().contains_key(Path::new("/etc/menu.d/20_memtest")));
    }

    #[test]
    fn proxified_name_round_trip() {
        let existing = vec!["os-prober".to_string()];
        let encoded = encode_proxified_name("os-prober", &existing);
        assert_eq!(encoded, "os-prober~1");
        assert_eq!(decode_proxified_name(&encoded), "os-prober");
        assert_eq!(decode_proxified_name("linux"), "linux");
    }
}
