//! Scripts: one generator script and the entry tree it produced
//!
//! A script owns a synthetic root entry whose descendants are everything
//! the script emitted on the last load. Entries are addressed by identity
//! path (the chain of names from the root, usable while names stay unique
//! within their level) or by content hash.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::core::entry::{Entry, EntryId, EntryKind};
use crate::core::error::{Error, Result};

static NEXT_SCRIPT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScriptId(u64);

impl ScriptId {
    pub fn fresh() -> Self {
        ScriptId(NEXT_SCRIPT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// First line of a user-editable (custom) script.
pub const CUSTOM_SCRIPT_SHEBANG: &str = "#!/bin/sh";
/// Second line marking a script as custom; everything after line 2 is
/// emitted verbatim by the generator.
pub const CUSTOM_SCRIPT_MARKER: &str = "exec tail -n +3 $0";

#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub id: ScriptId,
    pub name: String,
    pub file_path: PathBuf,
    pub is_custom: bool,
    pub root: Entry,
}

impl Script {
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Script {
            id: ScriptId::fresh(),
            name: name.into(),
            file_path: file_path.into(),
            is_custom: false,
            root: Entry::root(),
        }
    }

    /// Reads the header of the backing file to detect custom scripts.
    pub fn from_file(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        let mut script = Script::new(name, file_path);
        if let Ok(head) = std::fs::read_to_string(&script.file_path) {
            let mut lines = head.lines();
            script.is_custom = lines.next() == Some(CUSTOM_SCRIPT_SHEBANG)
                && lines.next().map(|l| l.trim_end()) == Some(CUSTOM_SCRIPT_MARKER);
        }
        script
    }

    pub fn entries(&self) -> &[Entry] {
        &self.root.children
    }

    pub fn entries_mut(&mut self) -> &mut Vec<Entry> {
        &mut self.root.children
    }

    /// Resolves an identity path. The empty path is the root itself. A
    /// segment shared by several siblings resolves to nothing: an
    /// ambiguous name identifies no entry.
    pub fn entry_by_path(&self, path: &[String]) -> Option<&Entry> {
        let mut current = &self.root;
        for segment in path {
            current = &current.children[unique_child(&current.children, segment)?];
        }
        Some(current)
    }

    pub fn entry_by_path_mut(&mut self, path: &[String]) -> Option<&mut Entry> {
        let mut current = &mut self.root;
        for segment in path {
            let index = unique_child(&current.children, segment)?;
            current = &mut current.children[index];
        }
        Some(current)
    }

    /// First menu entry (depth first) whose body hashes to `hash`. Only
    /// real menu entries carry a hash identity; a plaintext block with
    /// the same body never matches.
    pub fn entry_by_hash(&self, hash: &str) -> Option<&Entry> {
        fn walk<'a>(list: &'a [Entry], hash: &str) -> Option<&'a Entry> {
            for entry in list {
                match entry.kind {
                    EntryKind::Menu if entry.content_hash().as_deref() == Some(hash) => {
                        return Some(entry);
                    }
                    EntryKind::Submenu => {
                        if let Some(found) = walk(&entry.children, hash) {
                            return Some(found);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        walk(&self.root.children, hash)
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        fn walk(entry: &Entry, id: EntryId) -> Option<&Entry> {
            if entry.id == id {
                return Some(entry);
            }
            entry.children.iter().find_map(|c| walk(c, id))
        }
        walk(&self.root, id)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        fn walk(entry: &mut Entry, id: EntryId) -> Option<&mut Entry> {
            if entry.id == id {
                return Some(entry);
            }
            entry.children.iter_mut().find_map(|c| walk(c, id))
        }
        walk(&mut self.root, id)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entry(id).is_some()
    }

    /// Identity path of an entry inside this script. The root maps to the
    /// empty path.
    pub fn path_of(&self, id: EntryId) -> Option<Vec<String>> {
        fn walk(entry: &Entry, id: EntryId, trail: &mut Vec<String>) -> bool {
            if entry.id == id {
                return true;
            }
            for child in &entry.children {
                trail.push(child.name.clone());
                if walk(child, id, trail) {
                    return true;
                }
                trail.pop();
            }
            false
        }
        let mut trail = Vec::new();
        walk(&self.root, id, &mut trail).then_some(trail)
    }

    /// The plaintext preamble entry, when one was parsed.
    pub fn plaintext_entry(&self) -> Option<&Entry> {
        self.root.children.iter().find(|e| e.kind == EntryKind::Plaintext)
    }

    /// True once a user edit touched any entry of this script.
    pub fn is_modified(&self) -> bool {
        fn walk(entry: &Entry) -> bool {
            entry.is_modified || entry.children.iter().any(walk)
        }
        walk(&self.root)
    }

    pub fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        fn walk(entry: &mut Entry, id: EntryId) -> bool {
            if let Some(pos) = entry.children.iter().position(|c| c.id == id) {
                entry.children.remove(pos);
                return true;
            }
            entry.children.iter_mut().any(|c| walk(c, id))
        }
        if walk(&mut self.root, id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("entry {id:?} in script '{}'", self.name)))
        }
    }

    /// Renames the backing file, asserting the target slot is free.
    pub fn move_file(&mut self, new_path: &Path) -> Result<()> {
        crate::infra::io::assert_vacant(new_path)?;
        std::fs::rename(&self.file_path, new_path)
            .map_err(|e| Error::io(new_path, e))?;
        self.file_path = new_path.to_path_buf();
        Ok(())
    }
}

/// Index of the single child named `name`, or None when the name is
/// absent or not unique at this level.
fn unique_child(list: &[Entry], name: &str) -> Option<usize> {
    let mut matches = list
        .iter()
        .enumerate()
        .filter(|(_, e)| e.name == name)
        .map(|(i, _)| i);
    let first = matches.next()?;
    matches.next().is_none().then_some(first)
}

/// Splits a generator file name of the form `NN_name` into its two-digit
/// index and logical name.
pub fn extract_index_and_name(file_name: &str) -> Option<(u32, &str)> {
    let (index, name) = file_name.split_at_checked(2)?;
    let index: u32 = index.parse().ok()?;
    let name = name.strip_prefix('_')?;
    Some((index, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Script {
        let mut s = Script::new("os-prober", "/etc/menu.d/30_os-prober");
        let mut sub = Entry::new(EntryKind::Submenu, "Advanced");
        sub.children.push(Entry::menu("Recovery", "", "linux /vmlinuz recovery\n"));
        s.entries_mut().push(Entry::menu("Debian", "", "linux /vmlinuz\n"));
        s.entries_mut().push(sub);
        s
    }

    #[test]
    fn path_lookup_and_back() {
        let s = sample();
        let path = vec!["Advanced".to_string(), "Recovery".to_string()];
        let entry = s.entry_by_path(&path).unwrap();
        assert_eq!(entry.name, "Recovery");
        assert_eq!(s.path_of(entry.id).unwrap(), path);
    }

    #[test]
    fn empty_path_is_the_root() {
        let s = sample();
        let root = s.entry_by_path(&[]).unwrap();
        assert_eq!(root.kind, EntryKind::Root);
        assert_eq!(s.path_of(root.id).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn ambiguous_names_resolve_to_nothing() {
        let mut s = sample();
        s.entries_mut().push(Entry::menu("Debian", "", "linux /vmlinuz.old\n"));

        assert!(s.entry_by_path(&["Debian".to_string()]).is_none());
        assert!(s.entry_by_path_mut(&["Debian".to_string()]).is_none());
        // unique names still resolve next to the duplicates
        assert_eq!(s.entry_by_path(&["Advanced".to_string()]).unwrap().name, "Advanced");
    }

    #[test]
    fn hash_lookup_recurses() {
        let s = sample();
        let hash = crate::core::entry::content_hash("linux /vmlinuz recovery\n").unwrap();
        assert_eq!(s.entry_by_hash(&hash).unwrap().name, "Recovery");
        assert!(s.entry_by_hash("0000").is_none());
    }

    #[test]
    fn hash_lookup_ignores_plaintext_bodies() {
        let mut s = sample();
        // a preamble with the same body must not steal the identity
        s.entries_mut()
            .insert(0, Entry::plaintext("linux /vmlinuz recovery\n"));

        let hash = crate::core::entry::content_hash("linux /vmlinuz recovery\n").unwrap();
        let found = s.entry_by_hash(&hash).unwrap();
        assert_eq!(found.kind, EntryKind::Menu);
        assert_eq!(found.name, "Recovery");
    }

    #[test]
    fn index_and_name_extraction() {
        assert_eq!(extract_index_and_name("30_os-prober"), Some((30, "os-prober")));
        assert_eq!(extract_index_and_name("README"), None);
        assert_eq!(extract_index_and_name("3x_bad"), None);
    }
}
