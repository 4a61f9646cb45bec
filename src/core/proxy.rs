//! Proxies: one rule tree filtering and rearranging one script
//!
//! The sync algorithm lives here. It reconnects rules to entries after a
//! regeneration in five passes: resolve by identity path, resolve by
//! content hash, synthesize missing placeholders, expand placeholders with
//! rules for unlisted entries, and finally prune rules whose entry is gone.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{trace, warn};

use crate::core::entry::{Entry, EntryId, EntryKind};
use crate::core::error::{Error, Result};
use crate::core::repository::Repository;
use crate::core::rule::{Rule, RuleId, RuleKind};
use crate::core::script::{Script, ScriptId};
use crate::core::wire::{self, PathContext};

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId(u64);

impl ProxyId {
    pub fn fresh() -> Self {
        ProxyId(NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Map from a script's current file path to the script, used to resolve
/// foreign rules. Sync without one leaves foreign rules untouched.
pub type ScriptPathMap = IndexMap<PathBuf, ScriptId>;

#[derive(Debug)]
pub struct Proxy {
    pub id: ProxyId,
    pub rules: Vec<Rule>,
    /// Two digit ordering index, the `NN` of the file name.
    pub index: u32,
    pub permissions: u32,
    /// Backing file; equals the script's own file while no proxy file was
    /// written.
    pub file_path: Option<PathBuf>,
    pub source: ScriptId,
}

/// Per-sync bookkeeping: which identity paths are already represented,
/// per script, split into ordinary rules and placeholders.
#[derive(Debug, Default)]
struct SyncIndex {
    paths: IndexMap<ScriptId, Vec<Vec<String>>>,
    placeholders: IndexMap<ScriptId, Vec<Vec<String>>>,
}

impl Proxy {
    /// An accept-all proxy for `script`: one placeholder selecting every
    /// entry, expanded immediately. With `activate` false the whole tree
    /// starts hidden.
    pub fn new(repo: &Repository, script: ScriptId, activate: bool) -> Proxy {
        let mut proxy = Proxy {
            id: ProxyId::fresh(),
            rules: vec![Rule::with_name(RuleKind::Placeholder, Vec::new(), "*", activate)],
            index: 90,
            permissions: 0o755,
            file_path: None,
            source: script,
        };
        proxy.sync(repo, None, true, true);
        proxy
    }

    pub fn from_rules(script: ScriptId, rules: Vec<Rule>) -> Proxy {
        Proxy {
            id: ProxyId::fresh(),
            rules,
            index: 90,
            permissions: 0o755,
            file_path: None,
            source: script,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.permissions & 0o111 != 0
    }

    pub fn set_executable(&mut self, value: bool) {
        if value {
            self.permissions |= 0o111;
        } else {
            self.permissions &= !0o111;
        }
    }

    // ---- navigation -------------------------------------------------

    pub fn contains_rule(&self, id: RuleId) -> bool {
        self.rule_index_path(id).is_some()
    }

    /// Index path from the toplevel list down to the rule.
    pub fn rule_index_path(&self, id: RuleId) -> Option<Vec<usize>> {
        fn walk(list: &[Rule], id: RuleId, trail: &mut Vec<usize>) -> bool {
            for (i, rule) in list.iter().enumerate() {
                trail.push(i);
                if rule.id == id || walk(&rule.children, id, trail) {
                    return true;
                }
                trail.pop();
            }
            false
        }
        let mut trail = Vec::new();
        walk(&self.rules, id, &mut trail).then_some(trail)
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        let path = self.rule_index_path(id)?;
        self.rule_at(&path)
    }

    pub fn rule_mut(&mut self, id: RuleId) -> Option<&mut Rule> {
        let path = self.rule_index_path(id)?;
        let mut list = &mut self.rules;
        let (last, init) = path.split_last()?;
        for &i in init {
            list = &mut list[i].children;
        }
        list.get_mut(*last)
    }

    fn rule_at(&self, index_path: &[usize]) -> Option<&Rule> {
        let mut list = &self.rules;
        let (last, init) = index_path.split_last()?;
        for &i in init {
            list = &list[i].children;
        }
        list.get(*last)
    }

    fn list_at_mut(&mut self, index_path: &[usize]) -> &mut Vec<Rule> {
        let mut list = &mut self.rules;
        for &i in index_path {
            list = &mut list[i].children;
        }
        list
    }

    /// `Some(None)` for toplevel rules, `Some(Some(id))` for nested ones.
    pub fn parent_of(&self, id: RuleId) -> Option<Option<RuleId>> {
        let path = self.rule_index_path(id)?;
        if path.len() == 1 {
            return Some(None);
        }
        Some(self.rule_at(&path[..path.len() - 1]).map(|r| r.id))
    }

    pub fn list(&self, parent: Option<RuleId>) -> Option<&Vec<Rule>> {
        match parent {
            None => Some(&self.rules),
            Some(id) => self.rule(id).map(|r| &r.children),
        }
    }

    pub fn list_mut(&mut self, parent: Option<RuleId>) -> Option<&mut Vec<Rule>> {
        match parent {
            None => Some(&mut self.rules),
            Some(id) => self.rule_mut(id).map(|r| &mut r.children),
        }
    }

    pub fn rule_by_entry_kind(&self, entry: EntryId, kind: RuleKind) -> Option<RuleId> {
        fn walk(list: &[Rule], entry: EntryId, kind: RuleKind) -> Option<RuleId> {
            for rule in list {
                if rule.data_source == Some(entry) && rule.kind == kind {
                    return Some(rule.id);
                }
                if let Some(found) = walk(&rule.children, entry, kind) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.rules, entry, kind)
    }

    pub fn visible_rule_for_entry(&self, entry: EntryId) -> Option<RuleId> {
        fn walk(list: &[Rule], entry: EntryId) -> Option<RuleId> {
            for rule in list {
                if rule.visible && rule.data_source == Some(entry) {
                    return Some(rule.id);
                }
                if let Some(found) = walk(&rule.children, entry) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.rules, entry)
    }

    /// Visible rules of one kind, in menu order. Hidden submenus hide
    /// their subtree.
    pub fn visible_rules_by_kind(&self, kind: RuleKind) -> Vec<RuleId> {
        fn walk(list: &[Rule], kind: RuleKind, out: &mut Vec<RuleId>) {
            for rule in list {
                if rule.visible {
                    if rule.kind == kind {
                        out.push(rule.id);
                    }
                    walk(&rule.children, kind, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.rules, kind, &mut out);
        out
    }

    pub fn has_visible_rules(&self) -> bool {
        fn walk(list: &[Rule]) -> bool {
            list.iter().any(|r| {
                r.visible && (r.kind != RuleKind::Submenu || walk(&r.children))
            })
        }
        walk(&self.rules)
    }

    pub fn count_visible_toplevel(&self) -> usize {
        self.rules.iter().filter(|r| r.visible).count()
    }

    /// Next visible rule in the same list as `base`, walking `direction`.
    pub fn next_visible_in_list(&self, base: RuleId, direction: i32) -> Option<RuleId> {
        let parent = self.parent_of(base)?;
        let list = self.list(parent)?;
        let pos = list.iter().position(|r| r.id == base)?;
        if direction > 0 {
            list[pos + 1..].iter().find(|r| r.visible).map(|r| r.id)
        } else {
            list[..pos].iter().rev().find(|r| r.visible).map(|r| r.id)
        }
    }

    /// First visible toplevel rule from the front (direction > 0) or the
    /// back (direction < 0).
    pub fn edge_visible_toplevel(&self, direction: i32) -> Option<RuleId> {
        if direction > 0 {
            self.rules.iter().find(|r| r.visible).map(|r| r.id)
        } else {
            self.rules.iter().rev().find(|r| r.visible).map(|r| r.id)
        }
    }

    pub fn rule_from_own_script(&self, rule: RuleId, own: &Script) -> bool {
        self.rule(rule)
            .and_then(|r| r.data_source)
            .is_some_and(|e| own.contains(e))
    }

    // ---- mutation ----------------------------------------------------

    /// Removes a rule without touching its ancestors.
    pub fn detach_rule(&mut self, id: RuleId) -> Option<Rule> {
        let path = self.rule_index_path(id)?;
        let (last, init) = path.split_last()?;
        let init = init.to_vec();
        let last = *last;
        Some(self.list_at_mut(&init).remove(last))
    }

    /// Removes a rule and every submenu that becomes empty above it.
    pub fn remove_rule(&mut self, id: RuleId) {
        let mut target = Some(id);
        while let Some(id) = target {
            let Some(parent) = self.parent_of(id) else { return };
            let Some(list) = self.list_mut(parent) else { return };
            if let Some(pos) = list.iter().position(|r| r.id == id) {
                list.remove(pos);
                target = if list.is_empty() { parent } else { None };
            } else {
                return;
            }
        }
    }

    /// Removes rules equivalent to `base` (same entry, same kind); for
    /// grouping rules without an entry, recurses into the children.
    pub fn remove_equivalent(&mut self, base: &Rule) {
        if let Some(entry) = base.data_source {
            if let Some(found) = self.rule_by_entry_kind(entry, base.kind) {
                self.remove_rule(found);
            }
        } else {
            for child in &base.children {
                self.remove_equivalent(child);
            }
        }
    }

    /// Replaces a submenu by up to two copies: the rules before `position`
    /// and the rules from `position` on. Returns the id of `position`,
    /// which ends up first in the second copy.
    pub fn split_submenu(&mut self, position: RuleId) -> Result<RuleId> {
        let parent = self
            .parent_of(position)
            .flatten()
            .ok_or(Error::NotFound("submenu to split".into()))?;
        let grandparent = self
            .parent_of(parent)
            .ok_or(Error::NotFound("submenu parent".into()))?;

        let Some(submenu) = self.rule_mut(parent) else {
            return Err(Error::NotFound("submenu to split".into()));
        };
        let children = std::mem::take(&mut submenu.children);
        let template = submenu.clone();
        let pos = children
            .iter()
            .position(|r| r.id == position)
            .ok_or(Error::NotFound("rule inside submenu".into()))?;
        let mut before = children;
        let after = before.split_off(pos);

        let list = self
            .list_mut(grandparent)
            .ok_or(Error::NotFound("submenu list".into()))?;
        let insert_at = list
            .iter()
            .position(|r| r.id == parent)
            .ok_or(Error::NotFound("submenu position".into()))?;

        let mut replacements = Vec::new();
        if !before.is_empty() {
            let mut first = template.clone_detached();
            first.children = before;
            replacements.push(first);
        }
        let mut second = template.clone_detached();
        second.children = after;
        replacements.push(second);

        list.splice(insert_at..=insert_at, replacements);
        Ok(position)
    }

    /// Inserts a fresh, empty submenu right before `position`.
    pub fn create_submenu(&mut self, position: RuleId) -> Result<RuleId> {
        let parent = self
            .parent_of(position)
            .ok_or(Error::NotFound("rule for submenu creation".into()))?;
        let list = self
            .list_mut(parent)
            .ok_or(Error::NotFound("rule list".into()))?;
        let pos = list
            .iter()
            .position(|r| r.id == position)
            .ok_or(Error::NotFound("rule position".into()))?;
        let submenu = Rule::with_name(RuleKind::Submenu, Vec::new(), "", true);
        let id = submenu.id;
        list.insert(pos, submenu);
        Ok(id)
    }

    pub fn unsync(&mut self) {
        fn walk(list: &mut [Rule]) {
            for rule in list {
                rule.data_source = None;
                walk(&mut rule.children);
            }
        }
        walk(&mut self.rules);
    }

    // ---- sync ---------------------------------------------------------

    /// Reconnects the rule tree to the current entry trees. Returns false
    /// when the own script is unknown to the repository.
    pub fn sync(
        &mut self,
        repo: &Repository,
        script_map: Option<&ScriptPathMap>,
        delete_invalid: bool,
        expand: bool,
    ) -> bool {
        let Some(own) = repo.script(self.source) else {
            return false;
        };
        trace!(script = %own.name, expand, delete_invalid, "syncing proxy");

        let mut index = SyncIndex::default();
        let mut rules = std::mem::take(&mut self.rules);
        sync_connect_by_path(&mut rules, own, repo, script_map, &mut index);
        sync_connect_by_hash(&mut rules, own, repo, script_map, &mut index);
        if expand {
            sync_add_placeholders(&mut rules, &[], own, &mut index);
        }
        self.rules = rules;
        if expand {
            self.sync_expand(repo, &index);
        }
        if delete_invalid {
            sync_cleanup(&mut self.rules, script_map.is_some());
        }
        true
    }

    /// Pass 4: behind every placeholder whose scope resolves, insert rules
    /// for the scope's entries nobody lists yet, inheriting the
    /// placeholder's visibility.
    fn sync_expand(&mut self, repo: &Repository, index: &SyncIndex) {
        for (script_id, scope_paths) in &index.placeholders {
            let Some(script) = repo.script(*script_id) else {
                continue;
            };
            for scope_path in scope_paths {
                let Some(scope) = script.entry_by_path(scope_path) else {
                    continue;
                };
                let Some(placeholder) =
                    self.rule_by_entry_kind(scope.id, RuleKind::Placeholder)
                else {
                    continue;
                };
                let visible = self.rule(placeholder).map(|r| r.visible).unwrap_or(true);
                let blacklist = index
                    .paths
                    .get(script_id)
                    .cloned()
                    .unwrap_or_default();

                let mut additions = Vec::new();
                for child in &scope.children {
                    let represented = [RuleKind::Normal, RuleKind::Plaintext, RuleKind::Placeholder]
                        .iter()
                        .any(|k| self.rule_by_entry_kind(child.id, *k).is_some());
                    if represented {
                        continue;
                    }
                    let Some(child_path) = script.path_of(child.id) else {
                        continue;
                    };
                    additions.push(Rule::from_entry(child, visible, script, &blacklist, child_path));
                }
                if additions.is_empty() {
                    continue;
                }
                let Some(ph_path) = self.rule_index_path(placeholder) else {
                    continue;
                };
                let (last, init) = ph_path.split_last().map(|(l, i)| (*l, i.to_vec())).unwrap_or((0, Vec::new()));
                let list = self.list_at_mut(&init);
                list.splice(last + 1..last + 1, additions);
            }
        }
    }

    // ---- structural comparison ---------------------------------------

    /// True once the rule tree no longer mirrors the script verbatim: any
    /// reorder, rename, hide or grouping makes a proxy file necessary.
    pub fn is_modified(&self, own: &Script) -> bool {
        lists_modified(&self.rules, own.entries())
    }

    // ---- file generation -----------------------------------------------

    /// Scripts this proxy draws from: its own first, then every foreign
    /// source, deduplicated, in wire-path form.
    pub fn script_list(&self, ctx: &PathContext, repo: &Repository, own: &Script) -> Vec<String> {
        let own_path = wire_path(ctx, own);
        let mut foreign: Vec<String> = Vec::new();
        collect_foreign(&self.rules, repo, own, &mut |script| {
            foreign.push(wire_path(ctx, script));
        });
        foreign.sort();
        foreign.dedup();
        std::iter::once(own_path).chain(foreign).collect()
    }

    /// Writes the proxy fragment: a shell script that pipes the generator
    /// output of its source scripts through the proxy filter binary with
    /// the wire rule block as argument.
    pub fn generate_file(
        &mut self,
        path: &Path,
        ctx: &PathContext,
        repo: &Repository,
        cfg_dir_noprefix: &str,
    ) -> Result<()> {
        let own = repo
            .script(self.source)
            .ok_or(Error::NotFound("proxy source script".into()))?;
        let scripts = self.script_list(ctx, repo, own);
        let multi = scripts.len() > 1;

        let mut out = String::from("#!/bin/sh\n#THIS IS A GRUB PROXY SCRIPT\n");
        if !multi {
            out.push_str(&format!("'{}'", scripts[0]));
        } else {
            out.push_str("sh -c '");
            out.push_str(
                &scripts
                    .iter()
                    .map(|s| {
                        format!("echo \"### BEGIN {s} ###\";\n\"{s}\";\necho \"### END {s} ###\";")
                    })
                    .join("\n"),
            );
            out.push('\'');
        }
        out.push_str(&format!(" | {cfg_dir_noprefix}/bin/menumeld_proxy \""));
        out.push_str(&wire::serialize_rules(&self.rules, ctx));
        out.push('"');
        if multi {
            out.push_str(" multi");
        }

        std::fs::write(path, out).map_err(|e| Error::io(path, e))?;
        crate::infra::io::set_permissions(path, self.permissions)?;
        self.file_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn delete_file(&mut self) -> Result<()> {
        if let Some(path) = self.file_path.take() {
            std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }
        Ok(())
    }

    /// Points every foreign rule's script path at the owning script's
    /// current file, so the next sync resolves them again.
    pub fn refresh_foreign_origins(&mut self, repo: &Repository, own: &Script) {
        fn walk(list: &mut [Rule], repo: &Repository, own: &Script) {
            for rule in list {
                if let Some(entry) = rule.data_source {
                    if !own.contains(entry) {
                        if let Some(script) = repo.script_by_entry(entry) {
                            rule.origin = Some(script.file_path.clone());
                        }
                    }
                }
                walk(&mut rule.children, repo, own);
            }
        }
        walk(&mut self.rules, repo, own);
    }
}

fn wire_path(ctx: &PathContext, script: &Script) -> String {
    let target: &Path = ctx
        .targets
        .and_then(|t| t.get(&script.id).map(PathBuf::as_path))
        .unwrap_or(&script.file_path);
    let text = target.to_string_lossy();
    text.strip_prefix(ctx.prefix).unwrap_or(&text).to_string()
}

fn collect_foreign(list: &[Rule], repo: &Repository, own: &Script, sink: &mut impl FnMut(&Script)) {
    for rule in list {
        if let Some(entry) = rule.data_source {
            if !own.contains(entry) {
                if let Some(script) = repo.script_by_entry(entry) {
                    sink(script);
                }
            }
        }
        collect_foreign(&rule.children, repo, own, sink);
    }
}

/// Resolves the script a rule belongs to: the proxy's own script when the
/// rule has no foreign path, otherwise through the script map.
fn resolve_script<'a>(
    rule: &Rule,
    own: &'a Script,
    repo: &'a Repository,
    script_map: Option<&ScriptPathMap>,
) -> Option<&'a Script> {
    match &rule.origin {
        None => Some(own),
        Some(path) => {
            let map = script_map?;
            match map.get(path).and_then(|id| repo.script(*id)) {
                Some(script) => Some(script),
                None => {
                    warn!(path = %path.display(), "foreign script not found, rule stays unresolved");
                    None
                }
            }
        }
    }
}

/// Pass 1: resolve rules by identity path and record every path (resolved
/// or not) in the sync index.
fn sync_connect_by_path(
    list: &mut [Rule],
    own: &Script,
    repo: &Repository,
    script_map: Option<&ScriptPathMap>,
    index: &mut SyncIndex,
) {
    for rule in list {
        if rule.kind == RuleKind::Submenu {
            if !rule.children.is_empty() {
                sync_connect_by_path(&mut rule.children, own, repo, script_map, index);
            }
            continue;
        }
        let Some(script) = resolve_script(rule, own, repo, script_map) else {
            continue;
        };
        let slot = if rule.kind == RuleKind::Placeholder {
            index.placeholders.entry(script.id).or_default()
        } else {
            index.paths.entry(script.id).or_default()
        };
        slot.push(rule.id_path.clone());

        match script.entry_by_path(&rule.id_path) {
            Some(entry) => {
                rule.data_source = Some(entry.id);
                if rule.kind == RuleKind::Normal {
                    rule.id_hash = entry.content_hash();
                }
            }
            None => rule.data_source = None,
        }
    }
}

/// Pass 2: rules still unresolved but carrying a content hash get matched
/// against entry bodies; a hit also refreshes the identity path.
fn sync_connect_by_hash(
    list: &mut [Rule],
    own: &Script,
    repo: &Repository,
    script_map: Option<&ScriptPathMap>,
    index: &mut SyncIndex,
) {
    for rule in list {
        if rule.data_source.is_none() {
            if let Some(hash) = rule.id_hash.clone() {
                if let Some(script) = resolve_script(rule, own, repo, script_map) {
                    if let Some(entry) = script.entry_by_hash(&hash) {
                        rule.data_source = Some(entry.id);
                        if let Some(path) = script.path_of(entry.id) {
                            index.paths.entry(script.id).or_default().push(path.clone());
                            rule.id_path = path;
                        }
                    }
                }
            }
        }
        if !rule.children.is_empty() {
            sync_connect_by_hash(&mut rule.children, own, repo, script_map, index);
        }
    }
}

/// Pass 3: every scope of the own script that has no placeholder yet gets
/// one, prepended and visible. Recurses into submenu rules whose identity
/// path resolves to a submenu entry.
fn sync_add_placeholders(
    list: &mut Vec<Rule>,
    scope_path: &[String],
    own: &Script,
    index: &mut SyncIndex,
) {
    let known = index
        .placeholders
        .get(&own.id)
        .is_some_and(|paths| paths.iter().any(|p| p == scope_path));
    if !known {
        let mut placeholder =
            Rule::with_name(RuleKind::Placeholder, scope_path.to_vec(), "*", true);
        placeholder.data_source = own.entry_by_path(scope_path).map(|e| e.id);
        list.insert(0, placeholder);
        index
            .placeholders
            .entry(own.id)
            .or_default()
            .push(scope_path.to_vec());
    }

    for rule in list.iter_mut() {
        if rule.kind != RuleKind::Submenu || rule.id_path.is_empty() {
            continue;
        }
        let resolves_to_submenu = own
            .entry_by_path(&rule.id_path)
            .is_some_and(|e| e.kind == EntryKind::Submenu);
        if resolves_to_submenu {
            let path = rule.id_path.clone();
            sync_add_placeholders(&mut rule.children, &path, own, index);
        }
    }
}

/// Pass 5: prune rules whose entry is gone. Foreign rules survive when no
/// script map was available to resolve them.
fn sync_cleanup(list: &mut Vec<Rule>, map_present: bool) {
    for rule in list.iter_mut() {
        sync_cleanup(&mut rule.children, map_present);
    }
    list.retain(|rule| {
        let keep = match rule.kind {
            RuleKind::Submenu => !rule.children.is_empty(),
            _ => rule.data_source.is_some(),
        };
        keep || (rule.origin.is_some() && !map_present)
    });
}

fn lists_modified(rules: &[Rule], entries: &[Entry]) -> bool {
    // an unmodified list is the placeholder plus one rule per entry
    if rules.len() != entries.len() + 1 {
        return true;
    }
    let mut iter = rules.iter();
    match iter.next() {
        Some(first) if first.kind == RuleKind::Placeholder => {
            if !first.visible {
                return true;
            }
        }
        _ => return true,
    }
    for (rule, entry) in iter.zip(entries) {
        let kind_mismatch = match rule.kind {
            RuleKind::Normal => entry.kind != EntryKind::Menu,
            RuleKind::Plaintext => entry.kind != EntryKind::Plaintext,
            RuleKind::Submenu => entry.kind != EntryKind::Submenu,
            RuleKind::Placeholder => false,
        };
        if kind_mismatch || rule.output_name != entry.name || !rule.visible {
            return true;
        }
        if rule.kind == RuleKind::Submenu && lists_modified(&rule.children, &entry.children) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_with_script() -> (Repository, ScriptId) {
        let mut repo = Repository::default();
        let mut script = Script::new("linux", "/etc/menu.d/10_linux");
        script.entries_mut().push(Entry::menu("Ubuntu", "", "linux /vmlinuz\n"));
        let mut sub = Entry::new(EntryKind::Submenu, "Advanced");
        sub.children.push(Entry::menu("Recovery", "", "linux /vmlinuz single\n"));
        script.entries_mut().push(sub);
        let id = script.id;
        repo.scripts.push(script);
        (repo, id)
    }

    fn names(list: &[Rule]) -> Vec<&str> {
        list.iter().map(|r| r.output_name.as_str()).collect()
    }

    #[test]
    fn accept_all_proxy_expands_everything() {
        let (repo, script) = repo_with_script();
        let proxy = Proxy::new(&repo, script, true);

        assert_eq!(names(&proxy.rules), ["*", "Ubuntu", "Advanced"]);
        assert_eq!(proxy.rules[0].kind, RuleKind::Placeholder);
        assert!(proxy.rules[0].data_source.is_some());
        assert_eq!(proxy.rules[2].kind, RuleKind::Submenu);
        // submenu expansion: scoped placeholder first, then the entry
        assert_eq!(names(&proxy.rules[2].children), ["*", "Recovery"]);
        assert!(!proxy.is_modified(repo.script(script).unwrap()));
    }

    #[test]
    fn deactivated_proxy_is_fully_hidden() {
        let (repo, script) = repo_with_script();
        let proxy = Proxy::new(&repo, script, false);
        fn all_hidden(list: &[Rule]) -> bool {
            list.iter().all(|r| !r.visible && all_hidden(&r.children))
        }
        assert!(all_hidden(&proxy.rules));
        assert!(!proxy.has_visible_rules());
    }

    #[test]
    fn sync_is_idempotent() {
        let (repo, script) = repo_with_script();
        let mut proxy = Proxy::new(&repo, script, true);
        let snapshot: Vec<Rule> = proxy.rules.iter().map(Rule::clone_detached).collect();

        proxy.sync(&repo, None, true, true);
        assert_eq!(proxy.rules.len(), snapshot.len());
        for (a, b) in proxy.rules.iter().zip(&snapshot) {
            assert!(a.structural_eq(b));
        }
    }

    #[test]
    fn new_entries_appear_behind_the_placeholder() {
        let (mut repo, script) = repo_with_script();
        let mut proxy = Proxy::new(&repo, script, true);

        // regeneration adds an entry the rules don't mention
        repo.script_mut(script)
            .unwrap()
            .entries_mut()
            .push(Entry::menu("Memtest", "", "linux16 /memtest\n"));
        proxy.sync(&repo, None, true, true);

        assert_eq!(names(&proxy.rules), ["*", "Memtest", "Ubuntu", "Advanced"]);
    }

    #[test]
    fn vanished_entries_are_pruned_and_hash_moves_survive() {
        let (mut repo, script) = repo_with_script();
        let mut proxy = Proxy::new(&repo, script, true);

        {
            let s = repo.script_mut(script).unwrap();
            s.entries_mut().retain(|e| e.name != "Ubuntu");
            // renamed but same body: the hash finds it again
            if let Some(e) = s.entry_by_path_mut(&["Advanced".into(), "Recovery".into()]) {
                e.name = "Rescue mode".to_string();
            }
        }
        proxy.sync(&repo, None, true, true);

        assert_eq!(names(&proxy.rules), ["*", "Advanced"]);
        let recovery = &proxy.rules[1].children[1];
        assert!(recovery.data_source.is_some());
        assert_eq!(recovery.id_path, vec!["Advanced", "Rescue mode"]);
    }

    #[test]
    fn hidden_placeholder_keeps_new_entries_hidden() {
        let (mut repo, script) = repo_with_script();
        let mut proxy = Proxy::new(&repo, script, true);
        proxy.rules[0].set_visibility(false);

        repo.script_mut(script)
            .unwrap()
            .entries_mut()
            .push(Entry::menu("Memtest", "", "linux16 /memtest\n"));
        proxy.sync(&repo, None, true, true);

        let memtest = proxy.rules.iter().find(|r| r.output_name == "Memtest").unwrap();
        assert!(!memtest.visible);
    }

    #[test]
    fn is_modified_detects_each_user_change() {
        let (repo, script) = repo_with_script();
        let own = repo.script(script).unwrap();

        let mut proxy = Proxy::new(&repo, script, true);
        assert!(!proxy.is_modified(own));

        proxy.rules[1].output_name = "Renamed".into();
        assert!(proxy.is_modified(own));

        let mut proxy = Proxy::new(&repo, script, true);
        proxy.rules[1].visible = false;
        assert!(proxy.is_modified(own));

        let mut proxy = Proxy::new(&repo, script, true);
        let moved = proxy.rules.remove(1);
        proxy.rules.push(moved);
        assert!(proxy.is_modified(own));
    }

    #[test]
    fn remove_rule_prunes_empty_submenus() {
        let (repo, script) = repo_with_script();
        let mut proxy = Proxy::new(&repo, script, true);
        let submenu = proxy.rules[2].id;
        let placeholder = proxy.rules[2].children[0].id;
        let recovery = proxy.rules[2].children[1].id;

        proxy.remove_rule(placeholder);
        proxy.remove_rule(recovery);
        assert!(!proxy.contains_rule(submenu));
        assert_eq!(names(&proxy.rules), ["*", "Ubuntu"]);
    }

    #[test]
    fn split_submenu_keeps_order() {
        let (mut repo, script) = repo_with_script();
        {
            let s = repo.script_mut(script).unwrap();
            let sub = s.entries_mut().iter_mut().find(|e| e.name == "Advanced").unwrap();
            sub.children.push(Entry::menu("Old kernel", "", "linux /vmlinuz-old\n"));
        }
        let mut proxy = Proxy::new(&repo, script, true);
        let old_kernel = proxy.rules[2]
            .children
            .iter()
            .find(|r| r.output_name == "Old kernel")
            .unwrap()
            .id;

        proxy.split_submenu(old_kernel).unwrap();
        // two submenus now, the split point leading the second
        let submenus: Vec<&Rule> =
            proxy.rules.iter().filter(|r| r.kind == RuleKind::Submenu).collect();
        assert_eq!(submenus.len(), 2);
        assert_eq!(submenus[1].children[0].output_name, "Old kernel");
    }
}
