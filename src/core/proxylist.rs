//! The ordered proxy collection making up the visible menu
//!
//! Proxy order is menu order. Removed proxies whose backing file must be
//! deleted on save are parked in a trash list. Rule traversal here crosses
//! proxy boundaries; traversal inside a submenu never leaves its proxy.

use itertools::Itertools;

use crate::core::entry::EntryId;
use crate::core::error::{Error, Result};
use crate::core::proxy::{Proxy, ProxyId, ScriptPathMap};
use crate::core::repository::Repository;
use crate::core::rule::{RuleId, RuleKind};
use crate::core::script::ScriptId;

#[derive(Debug, Default)]
pub struct Proxylist {
    pub proxies: Vec<Proxy>,
    pub trash: Vec<Proxy>,
}

impl Proxylist {
    pub fn position(&self, id: ProxyId) -> Option<usize> {
        self.proxies.iter().position(|p| p.id == id)
    }

    pub fn proxy(&self, id: ProxyId) -> Option<&Proxy> {
        self.proxies.iter().find(|p| p.id == id)
    }

    pub fn proxy_mut(&mut self, id: ProxyId) -> Option<&mut Proxy> {
        self.proxies.iter_mut().find(|p| p.id == id)
    }

    pub fn proxies_by_script(&self, script: ScriptId) -> Vec<ProxyId> {
        self.proxies
            .iter()
            .filter(|p| p.source == script)
            .map(|p| p.id)
            .collect()
    }

    pub fn proxy_by_rule(&self, rule: RuleId) -> Option<ProxyId> {
        self.proxies
            .iter()
            .find(|p| p.contains_rule(rule))
            .map(|p| p.id)
    }

    pub fn sync_all(
        &mut self,
        repo: &Repository,
        related_script: Option<ScriptId>,
        script_map: Option<&ScriptPathMap>,
        delete_invalid: bool,
        expand: bool,
    ) {
        for proxy in &mut self.proxies {
            if related_script.is_none() || related_script == Some(proxy.source) {
                proxy.sync(repo, script_map, delete_invalid, expand);
            }
        }
    }

    pub fn unsync_all(&mut self) {
        for proxy in &mut self.proxies {
            proxy.unsync();
        }
    }

    /// A script needs proxy files once it has several proxies, or its
    /// single proxy diverges from the plain script output.
    pub fn proxy_required(&self, repo: &Repository, script: ScriptId) -> bool {
        let list = self.proxies_by_script(script);
        if list.len() == 1 {
            let Some(own) = repo.script(script) else {
                return true;
            };
            return self
                .proxy(list[0])
                .map(|p| p.is_modified(own))
                .unwrap_or(true);
        }
        true
    }

    /// Deletes every proxy fragment on disk (a save rewrites the needed
    /// ones from scratch). Files identical to the script's own file stay.
    pub fn delete_all_proxyscript_files(&mut self, repo: &Repository) -> Result<()> {
        for proxy in &mut self.proxies {
            let script_file = repo.script(proxy.source).map(|s| s.file_path.clone());
            if let (Some(file), Some(script_file)) = (&proxy.file_path, script_file) {
                if *file != script_file {
                    proxy.delete_file()?;
                }
            }
        }
        Ok(())
    }

    /// Sorts by index, then by script name for equal indices.
    pub fn sort(&mut self, repo: &Repository) {
        self.proxies.sort_by_key(|p| {
            let name = repo
                .script(p.source)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            (p.index, name)
        });
    }

    /// Removes a proxy. When its backing file differs from the script's
    /// own file, the proxy moves to trash so save deletes the file.
    pub fn delete_proxy(&mut self, id: ProxyId, repo: &Repository) {
        let Some(pos) = self.position(id) else { return };
        let proxy = self.proxies.remove(pos);
        let script_file = repo.script(proxy.source).map(|s| &s.file_path);
        if proxy.file_path.is_some() && proxy.file_path.as_ref() != script_file {
            self.trash.push(proxy);
        }
    }

    pub fn clear_trash(&mut self) -> Result<()> {
        for mut proxy in self.trash.drain(..) {
            proxy.delete_file()?;
        }
        Ok(())
    }

    pub fn visible_rule_for_entry(&self, entry: EntryId) -> Option<(ProxyId, RuleId)> {
        self.proxies
            .iter()
            .find_map(|p| p.visible_rule_for_entry(entry).map(|r| (p.id, r)))
    }

    pub fn visible_rules_by_kind(&self, kind: RuleKind) -> Vec<(ProxyId, RuleId)> {
        self.proxies
            .iter()
            .flat_map(|p| {
                p.visible_rules_by_kind(kind)
                    .into_iter()
                    .map(move |r| (p.id, r))
            })
            .collect()
    }

    /// Next visible rule from `base` in `direction` (+1 down, -1 up).
    /// Toplevel traversal continues into neighbouring proxies; inside a
    /// submenu the submenu is the boundary.
    pub fn next_visible_rule(&self, base: RuleId, direction: i32) -> Result<RuleId> {
        let proxy_id = self
            .proxy_by_rule(base)
            .ok_or(Error::NotFound("rule in any proxy".into()))?;
        let proxy = self.proxy(proxy_id).ok_or(Error::NoMoveTarget)?;

        let has_parent = proxy.parent_of(base).flatten().is_some();
        if let Some(next) = proxy.next_visible_in_list(base, direction) {
            return Ok(next);
        }
        if has_parent {
            return Err(Error::NoMoveTarget);
        }

        // continue into the following proxies' toplevel rules
        let start = self.position(proxy_id).ok_or(Error::NoMoveTarget)?;
        let following: Vec<&Proxy> = if direction > 0 {
            self.proxies[start + 1..].iter().collect()
        } else {
            self.proxies[..start].iter().rev().collect()
        };
        for proxy in following {
            if let Some(rule) = proxy.edge_visible_toplevel(direction) {
                return Ok(rule);
            }
        }
        Err(Error::NoMoveTarget)
    }

    /// The current entry source of every script used by any proxy, for
    /// save-time foreign path rewriting.
    pub fn refresh_foreign_origins(&mut self, repo: &Repository) {
        for proxy in &mut self.proxies {
            if let Some(own) = repo.script(proxy.source) {
                proxy.refresh_foreign_origins(repo, own);
            }
        }
    }

    /// Proxies currently showing at least one rule, in menu order.
    pub fn visible_proxies(&self) -> Vec<ProxyId> {
        self.proxies
            .iter()
            .filter(|p| p.has_visible_rules())
            .map(|p| p.id)
            .collect()
    }

    pub fn summary(&self, repo: &Repository) -> String {
        self.proxies
            .iter()
            .map(|p| {
                let name = repo
                    .script(p.source)
                    .map(|s| s.name.as_str())
                    .unwrap_or("?");
                format!("{:02}_{name}", p.index)
            })
            .join(", ")
    }
}
