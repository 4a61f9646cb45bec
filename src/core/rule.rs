//! Rules: the user-authored view over entries
//!
//! A rule selects an entry (by identity path and/or content hash), hides or
//! shows it, renames it, and may group other rules as a submenu. Rules own
//! their children; the entry they select is referenced by `EntryId` and
//! re-resolved on every sync.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::core::entry::{Entry, EntryId, EntryKind};
use crate::core::script::Script;

static NEXT_RULE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RuleId(u64);

impl RuleId {
    pub fn fresh() -> Self {
        RuleId(NEXT_RULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleKind {
    /// Shows one concrete entry.
    Normal,
    /// Stands for "every entry not explicitly listed at this scope".
    Placeholder,
    /// The script's plaintext preamble.
    Plaintext,
    /// A grouping node; children are rules, not entries.
    Submenu,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    pub id: RuleId,
    pub kind: RuleKind,
    /// Name shown in the rendered menu; differs from the entry name after
    /// a rename.
    pub output_name: String,
    pub visible: bool,
    /// Resolved entry, if the last sync found one.
    pub data_source: Option<EntryId>,
    /// Identity path of the entry within its script.
    pub id_path: Vec<String>,
    /// Content-hash identity, the fallback when the path moved.
    pub id_hash: Option<String>,
    /// Backing file of the owning script when that script is not the
    /// proxy's own (a foreign rule).
    pub origin: Option<PathBuf>,
    pub children: Vec<Rule>,
}

impl Rule {
    pub fn new(kind: RuleKind, id_path: Vec<String>, visible: bool) -> Self {
        let output_name = match kind {
            RuleKind::Placeholder => "*".to_string(),
            RuleKind::Plaintext => "#text".to_string(),
            _ => id_path.last().cloned().unwrap_or_default(),
        };
        Rule::with_name(kind, id_path, output_name, visible)
    }

    pub fn with_name(
        kind: RuleKind,
        id_path: Vec<String>,
        output_name: impl Into<String>,
        visible: bool,
    ) -> Self {
        Rule {
            id: RuleId::fresh(),
            kind,
            output_name: output_name.into(),
            visible,
            data_source: None,
            id_path,
            id_hash: None,
            origin: None,
            children: Vec::new(),
        }
    }

    /// Expands an entry subtree into a rule subtree. Paths listed in
    /// `blacklist` already have a rule elsewhere and are skipped. Submenu
    /// entries get a leading placeholder child anchored to the submenu
    /// scope so later additions inside it surface.
    pub fn from_entry(
        source: &Entry,
        visible: bool,
        script: &Script,
        blacklist: &[Vec<String>],
        current_path: Vec<String>,
    ) -> Rule {
        let kind = match source.kind {
            EntryKind::Plaintext => RuleKind::Plaintext,
            EntryKind::Submenu => RuleKind::Submenu,
            _ => RuleKind::Normal,
        };
        let mut rule = Rule::with_name(kind, current_path.clone(), source.name.clone(), visible);
        if kind != RuleKind::Submenu {
            rule.data_source = Some(source.id);
            if kind == RuleKind::Normal {
                rule.id_hash = source.content_hash();
            }
        } else {
            let mut placeholder =
                Rule::with_name(RuleKind::Placeholder, current_path.clone(), "*", visible);
            placeholder.data_source = script.entry_by_path(&current_path).map(|e| e.id);
            rule.children.push(placeholder);
        }
        for child in &source.children {
            let mut child_path = current_path.clone();
            child_path.push(child.name.clone());
            if blacklist.contains(&child_path) {
                continue;
            }
            rule.children
                .push(Rule::from_entry(child, visible, script, blacklist, child_path));
        }
        rule
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
        for child in &mut self.children {
            child.set_visibility(visible);
        }
    }

    /// True when the subtree still shows something concrete.
    pub fn has_real_children(&self) -> bool {
        self.children.iter().any(|r| {
            r.visible
                && ((r.kind == RuleKind::Normal && r.data_source.is_some())
                    || (r.kind == RuleKind::Submenu && r.has_real_children()))
        })
    }

    /// Deep copy under fresh rule ids. The original keeps its identity;
    /// the clone is a new object for all callers holding `RuleId`s.
    pub fn clone_detached(&self) -> Rule {
        let mut copy = self.clone();
        copy.id = RuleId::fresh();
        copy.children = self.children.iter().map(Rule::clone_detached).collect();
        copy
    }

    /// Renders the effective config text for this rule, resolving entries
    /// through `lookup`. Hidden rules render nothing.
    pub fn render(&self, out: &mut String, lookup: &dyn Fn(EntryId) -> Option<Entry>) {
        if !self.visible {
            return;
        }
        match self.kind {
            RuleKind::Plaintext => {
                if let Some(entry) = self.data_source.and_then(lookup) {
                    out.push_str(&entry.content);
                }
            }
            RuleKind::Normal => {
                if let Some(entry) = self.data_source.and_then(lookup) {
                    out.push_str("menuentry \"");
                    out.push_str(&self.output_name);
                    out.push('"');
                    out.push_str(&entry.extension);
                    out.push_str("{\n");
                    out.push_str(&entry.content);
                    out.push_str("}\n");
                }
            }
            RuleKind::Submenu if self.has_real_children() => {
                out.push_str("submenu \"");
                out.push_str(&self.output_name);
                out.push_str("\"{\n");
                for child in &self.children {
                    child.render(out, lookup);
                }
                out.push_str("}\n");
            }
            _ => {}
        }
    }

    /// Structural equality ignoring ids and resolution state; what the
    /// wire format preserves.
    pub fn structural_eq(&self, other: &Rule) -> bool {
        self.kind == other.kind
            && self.output_name == other.output_name
            && self.visible == other.visible
            && self.id_path == other.id_path
            && self.id_hash == other.id_hash
            && self.origin == other.origin
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.structural_eq(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_with_submenu() -> Script {
        let mut s = Script::new("linux", "/etc/menu.d/10_linux");
        let mut sub = Entry::new(EntryKind::Submenu, "Advanced");
        sub.children.push(Entry::menu("Recovery", "", "linux /vmlinuz single\n"));
        s.entries_mut().push(sub);
        s
    }

    #[test]
    fn from_entry_expands_submenus_with_leading_placeholder() {
        let s = script_with_submenu();
        let sub_entry = &s.entries()[0];
        let rule = Rule::from_entry(sub_entry, true, &s, &[], vec!["Advanced".to_string()]);

        assert_eq!(rule.kind, RuleKind::Submenu);
        assert_eq!(rule.data_source, None);
        assert_eq!(rule.children[0].kind, RuleKind::Placeholder);
        assert_eq!(rule.children[0].data_source, Some(sub_entry.id));
        assert_eq!(rule.children[1].kind, RuleKind::Normal);
        assert_eq!(rule.children[1].id_path, vec!["Advanced", "Recovery"]);
        assert!(rule.children[1].id_hash.is_some());
    }

    #[test]
    fn blacklisted_paths_are_skipped() {
        let s = script_with_submenu();
        let sub_entry = &s.entries()[0];
        let blacklist = vec![vec!["Advanced".to_string(), "Recovery".to_string()]];
        let rule = Rule::from_entry(sub_entry, true, &s, &blacklist, vec!["Advanced".to_string()]);
        assert_eq!(rule.children.len(), 1); // placeholder only
    }

    #[test]
    fn visibility_propagates_down() {
        let s = script_with_submenu();
        let mut rule =
            Rule::from_entry(&s.entries()[0], true, &s, &[], vec!["Advanced".to_string()]);
        rule.set_visibility(false);
        assert!(!rule.visible);
        assert!(rule.children.iter().all(|c| !c.visible));
        assert!(!rule.has_real_children());
    }

    #[test]
    fn detached_clone_gets_fresh_ids() {
        let s = script_with_submenu();
        let rule = Rule::from_entry(&s.entries()[0], true, &s, &[], vec!["Advanced".to_string()]);
        let copy = rule.clone_detached();
        assert!(rule.structural_eq(&copy));
        assert_ne!(rule.id, copy.id);
        assert_ne!(rule.children[0].id, copy.children[0].id);
    }
}
