//! The menu: repository, proxies and the load/save orchestration
//!
//! `load` runs the external menu generator, parses its streamed output
//! into entry trees, re-reads proxy fragments from the cfg dir and syncs
//! everything back together. `save` is the reverse: decide which scripts
//! need proxy files, move script files to their final slots, write the
//! fragments and run the install command.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::core::entry::{Entry, EntryId, EntryKind, Rows};
use crate::core::error::{Error, Result};
use crate::core::proxy::{Proxy, ProxyId};
use crate::core::repository::{encode_proxified_name, Repository};
use crate::core::rule::{Rule, RuleId, RuleKind};
use crate::core::runner::CommandRunner;
use crate::core::script::{extract_index_and_name, ScriptId, CUSTOM_SCRIPT_MARKER, CUSTOM_SCRIPT_SHEBANG};
use crate::core::wire::{self, PathContext};
use crate::core::worker::LoadStatus;
use crate::core::proxylist::Proxylist;
use crate::infra::config::Config;
use crate::infra::io;
use crate::infra::proxy_script::ProxyScriptData;
use crate::infra::script_map::ScriptSourceMap;

/// Name of the filter binary proxy fragments pipe through. The real
/// filtering happens at save time; the installed binary just forwards.
const FILTER_BINARY: &str = "menumeld_proxy";

pub struct Menu {
    pub repository: Repository,
    pub proxies: Proxylist,
    pub script_map: ScriptSourceMap,
    pub config: Config,
    runner: Box<dyn CommandRunner>,
}

impl Menu {
    pub fn new(config: Config, runner: Box<dyn CommandRunner>) -> Self {
        let script_map = ScriptSourceMap::new(&config.cfg_dir_path());
        Menu {
            repository: Repository::default(),
            proxies: Proxylist::default(),
            script_map,
            config,
            runner,
        }
    }

    // ---- loading -------------------------------------------------------

    /// Full reload: scan the cfg dir, run the generator, reconnect rules.
    pub fn load(&mut self, status: &LoadStatus) -> Result<()> {
        let cfg_dir = self.config.cfg_dir_path();
        let proxified_dir = self.config.proxified_dir_path();
        let prefix = self.config.cfg_dir_prefix.clone();

        status.set(0.0, "scanning configuration directory");
        self.repository = Repository::default();
        self.proxies = Proxylist::default();
        self.repository.load_dir(&cfg_dir, false)?;
        self.repository.load_dir(&proxified_dir, true)?;

        status.set(0.05, "reading proxy files");
        self.load_proxies(&cfg_dir, &prefix)?;
        self.proxies.sort(&self.repository);

        // proxies the generator cannot or will not show contribute nothing
        let dead: Vec<ProxyId> = self
            .proxies
            .proxies
            .iter()
            .filter(|p| !p.is_executable() || !p.has_visible_rules())
            .map(|p| p.id)
            .collect();
        for id in dead {
            debug!(?id, "dropping proxy without visible output");
            self.proxies.delete_proxy(id, &self.repository);
        }

        // the generator only runs executable files directly inside the cfg
        // dir: forward proxified scripts and park their fragments at 0644,
        // make sure plain scripts run (their file doubles as their proxy)
        let mut forwarders: Vec<PathBuf> = Vec::new();
        for script in &self.repository.scripts {
            if script.file_path.starts_with(&proxified_dir) {
                if io::create_script_forwarder(&cfg_dir, &script.file_path, &prefix)? {
                    forwarders.push(script.file_path.clone());
                }
                for proxy in &self.proxies.proxies {
                    if proxy.source != script.id {
                        continue;
                    }
                    if let Some(file) = &proxy.file_path {
                        io::set_permissions(file, 0o644)?;
                    }
                }
            } else {
                io::set_permissions(&script.file_path, 0o755)?;
            }
        }

        status.set(0.1, "running the menu generator");
        self.script_map = ScriptSourceMap::new(&cfg_dir);
        self.script_map.load()?;
        for script in &self.repository.scripts {
            self.script_map.add_script(&script.file_path);
        }

        let generated = self.read_generated(status);

        status.set(0.9, "restoring file states");
        for path in &forwarders {
            io::remove_script_forwarder(&cfg_dir, path)?;
        }
        for proxy in &self.proxies.proxies {
            if let Some(file) = &proxy.file_path {
                io::set_permissions(file, proxy.permissions)?;
            }
        }
        generated?;

        if self.has_conflicts() {
            info!("proxy indices conflict, renumbering");
            self.renumerate(true);
        }
        status.set(1.0, "done");
        Ok(())
    }

    /// Turns every `NN_name` file in the cfg dir into a proxy: parsed
    /// fragments carry their stored rules, plain scripts get an accept-all
    /// rule with the script file doubling as the proxy file. Fragments
    /// whose source script is gone go straight to trash so the next save
    /// removes them.
    fn load_proxies(&mut self, cfg_dir: &Path, prefix: &str) -> Result<()> {
        let Ok(read) = fs::read_dir(cfg_dir) else {
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
            let Some((index, _)) = extract_index_and_name(file_name) else {
                continue;
            };

            let (rules, source) = match ProxyScriptData::load(&path) {
                Some(data) => {
                    let script_file =
                        PathBuf::from(format!("{prefix}{}", data.script_path.display()));
                    (
                        wire::parse_rules(&data.rule_string, prefix),
                        self.repository.script_by_file(&script_file).map(|s| s.id),
                    )
                }
                None => (
                    wire::parse_rules("+*", prefix),
                    self.repository.script_by_file(&path).map(|s| s.id),
                ),
            };

            let mut proxy = Proxy::from_rules(source.unwrap_or(ScriptId::fresh()), rules);
            proxy.index = index;
            proxy.permissions = io::permissions_of(&path)?;
            proxy.file_path = Some(path.clone());

            match source {
                Some(_) => self.proxies.proxies.push(proxy),
                None => {
                    warn!(file = %path.display(), "proxy references an unknown script, trashing");
                    self.proxies.trash.push(proxy);
                }
            }
        }
        Ok(())
    }

    /// Streams the generator output, carving it into per-script sections
    /// at the BEGIN/END markers and parsing entry blocks in between.
    fn read_generated(&mut self, status: &LoadStatus) -> Result<()> {
        let prefix = self.config.cfg_dir_prefix.clone();
        let mut child = self.runner.spawn_streamed(&self.config.mkconfig_cmd)?;
        let mut rows = Rows::from_lines(child.take_lines().map(Ok));

        let mut in_script: Option<ScriptId> = None;
        let mut plaintext = String::new();
        let mut sections = 0u32;

        while let Some(row) = rows.next_row().map_err(|e| Error::io("generator output", e))? {
            if status.is_cancelled() {
                break;
            }
            if let Some(path) = section_marker(&row, "### BEGIN ") {
                self.flush_plaintext(in_script.take(), &mut plaintext);
                let actual = self.resolve_section_path(&path, &prefix);
                in_script = Some(self.repository.script_by_file_or_create(&actual));
                sections += 1;
                status.set(
                    (0.1 + f64::from(sections) * 0.02).min(0.85),
                    &format!("reading section {}", path),
                );
            } else if section_marker(&row, "### END ").is_some() {
                let script = in_script.take();
                self.flush_plaintext(script, &mut plaintext);
                if let Some(script) = script {
                    self.proxies
                        .sync_all(&self.repository, Some(script), None, true, true);
                }
            } else if let Some(script_id) = in_script {
                if crate::core::entry::starts_block(&row) {
                    let entry = Entry::parse_block(&row, &mut rows)
                        .map_err(|e| Error::io("generator output", e))?;
                    if let Some(script) = self.repository.script_mut(script_id) {
                        // edited scripts keep their edited tree; submenus
                        // are structure, not content, and always land
                        if entry.kind == EntryKind::Submenu || !script.is_modified() {
                            script.entries_mut().push(entry);
                        }
                    }
                    self.proxies
                        .sync_all(&self.repository, Some(script_id), None, false, false);
                } else {
                    plaintext.push_str(&row);
                    plaintext.push('\n');
                }
            }
        }
        self.flush_plaintext(in_script.take(), &mut plaintext);

        let out = child.finish()?;
        if !out.success && !status.is_cancelled() {
            return Err(Error::GeneratorFailed { output: out.output });
        }

        let map = self.repository.script_path_map();
        self.proxies
            .sync_all(&self.repository, None, Some(&map), true, true);
        Ok(())
    }

    /// Section paths may name a forwarder; follow it to the real script.
    fn resolve_section_path(&self, path: &str, prefix: &str) -> PathBuf {
        let actual = PathBuf::from(format!("{prefix}{path}"));
        let is_forwarder = actual
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("LS_"));
        if is_forwarder {
            if let Some(inner) = io::read_script_forwarder(&actual) {
                return PathBuf::from(format!("{prefix}{}", inner.display()));
            }
        }
        actual
    }

    /// Preamble text collected for a section becomes a plaintext entry at
    /// the front of the script, unless the user edited the script.
    fn flush_plaintext(&mut self, script: Option<ScriptId>, buffer: &mut String) {
        let text = std::mem::take(buffer);
        let Some(script) = script else { return };
        if text.trim().is_empty() {
            return;
        }
        if let Some(script) = self.repository.script_mut(script) {
            if !script.is_modified() && script.plaintext_entry().is_none() {
                script.entries_mut().insert(0, Entry::plaintext(text));
            }
        }
    }

    // ---- saving ---------------------------------------------------------

    /// Writes everything back: moves script files, regenerates proxy
    /// fragments, rewrites edited custom scripts and runs the installer.
    pub fn save(&mut self) -> Result<()> {
        let cfg_dir = self.config.cfg_dir_path();
        let proxified_dir = self.config.proxified_dir_path();
        let prefix = self.config.cfg_dir_prefix.clone();
        let cfg_dir_noprefix = self.config.cfg_dir_noprefix();

        self.proxies.delete_all_proxyscript_files(&self.repository)?;
        self.proxies.clear_trash()?;
        self.repository.clear_trash()?;

        // decide where every script file belongs
        let required: HashSet<ScriptId> = self
            .repository
            .scripts
            .iter()
            .filter(|s| self.proxies.proxy_required(&self.repository, s.id))
            .map(|s| s.id)
            .collect();

        let mut targets: IndexMap<ScriptId, PathBuf> = IndexMap::new();
        let mut used_proxified: Vec<String> = Vec::new();
        for script in &self.repository.scripts {
            let target = if required.contains(&script.id) {
                let name = encode_proxified_name(&script.name, &used_proxified);
                used_proxified.push(name.clone());
                proxified_dir.join(name)
            } else {
                let index = self
                    .proxies
                    .proxies_by_script(script.id)
                    .first()
                    .and_then(|id| self.proxies.proxy(*id))
                    .map(|p| p.index)
                    .unwrap_or(90);
                cfg_dir.join(format!("{index:02}_{}", script.name))
            };
            targets.insert(script.id, target);
        }

        // move files into their slots
        for (sid, target) in &targets {
            let Some(script) = self.repository.script_mut(*sid) else {
                continue;
            };
            if &script.file_path == target {
                self.script_map.add_script(target);
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            let old = script.file_path.clone();
            script.move_file(target)?;
            self.script_map.register_move(&old, target);
        }

        // write proxy fragments; plain scripts carry their proxy's mode
        let mut fragments = 0usize;
        for proxy in &mut self.proxies.proxies {
            let Some(script) = self.repository.script(proxy.source) else {
                continue;
            };
            if required.contains(&proxy.source) {
                let file = cfg_dir.join(format!("{:02}_{}_proxy", proxy.index, script.name));
                let ctx = PathContext {
                    repo: &self.repository,
                    own: proxy.source,
                    targets: Some(&targets),
                    prefix: &prefix,
                };
                proxy.generate_file(&file, &ctx, &self.repository, &cfg_dir_noprefix)?;
                io::set_permissions(&script.file_path, 0o755)?;
                fragments += 1;
            } else {
                io::set_permissions(&script.file_path, proxy.permissions)?;
                proxy.file_path = Some(script.file_path.clone());
            }
        }

        if proxified_dir.exists() {
            let empty = fs::read_dir(&proxified_dir)
                .map(|mut d| d.next().is_none())
                .unwrap_or(false);
            if empty {
                fs::remove_dir(&proxified_dir).map_err(|e| Error::io(&proxified_dir, e))?;
            }
        }

        self.write_filter_binary(&cfg_dir, fragments > 0)?;
        self.rewrite_custom_scripts()?;
        self.script_map.save()?;

        let out = self.runner.run_captured(&self.config.update_cmd)?;
        self.proxies.refresh_foreign_origins(&self.repository);
        if !out.success {
            return Err(Error::InstallFailed { output: out.output });
        }
        Ok(())
    }

    /// The installed filter binary is a passthrough; fragments are shaped
    /// so the generated config is already filtered.
    fn write_filter_binary(&self, cfg_dir: &Path, needed: bool) -> Result<()> {
        let bin_dir = cfg_dir.join("bin");
        let binary = bin_dir.join(FILTER_BINARY);
        if needed {
            fs::create_dir_all(&bin_dir).map_err(|e| Error::io(&bin_dir, e))?;
            fs::write(&binary, "#!/bin/sh\ncat\n").map_err(|e| Error::io(&binary, e))?;
            io::set_permissions(&binary, 0o755)?;
        } else if binary.exists() {
            fs::remove_file(&binary).map_err(|e| Error::io(&binary, e))?;
            let _ = fs::remove_dir(&bin_dir);
        }
        Ok(())
    }

    /// Edited custom scripts get their file rewritten from the entry tree.
    fn rewrite_custom_scripts(&mut self) -> Result<()> {
        let edited: Vec<ScriptId> = self
            .repository
            .scripts
            .iter()
            .filter(|s| s.is_custom && s.is_modified())
            .map(|s| s.id)
            .collect();

        for sid in edited {
            let rendered = {
                let proxy = Proxy::new(&self.repository, sid, true);
                let mut out = String::new();
                for rule in &proxy.rules {
                    rule.render(&mut out, &|id| {
                        self.repository
                            .script_by_entry(id)
                            .and_then(|s| s.entry(id))
                            .cloned()
                    });
                }
                out
            };
            let Some(script) = self.repository.script_mut(sid) else {
                continue;
            };
            let content = format!("{CUSTOM_SCRIPT_SHEBANG}\n{CUSTOM_SCRIPT_MARKER}\n{rendered}");
            fs::write(&script.file_path, content).map_err(|e| Error::io(&script.file_path, e))?;
            io::set_permissions(&script.file_path, 0o755)?;
            fn clear(entry: &mut Entry) {
                entry.is_modified = false;
                entry.children.iter_mut().for_each(clear);
            }
            clear(&mut script.root);
        }
        Ok(())
    }

    // ---- numbering -------------------------------------------------------

    /// Two proxies competing for one file slot cannot both be written.
    pub fn has_conflicts(&self) -> bool {
        let mut seen = HashSet::new();
        for proxy in &self.proxies.proxies {
            let name = self
                .repository
                .script(proxy.source)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            if !seen.insert((proxy.index, name)) {
                return true;
            }
        }
        false
    }

    /// Assigns ascending indices in menu order. With `favor_source_index`
    /// each script keeps the index its original file name carried when
    /// that does not break the ordering; slots whose file name another
    /// script originally owned are skipped. Falls back to plain counting
    /// when favoring overflows the two digit space.
    pub fn renumerate(&mut self, favor_source_index: bool) {
        let cfg_dir = self.config.cfg_dir_path();
        let mut next = 0u32;
        let order: Vec<ProxyId> = self.proxies.proxies.iter().map(|p| p.id).collect();

        for id in order {
            let script = self
                .proxies
                .proxy(id)
                .and_then(|p| self.repository.script(p.source));
            let mut index = next;
            let mut favored = false;

            if favor_source_index {
                let source_index = script
                    .and_then(|s| self.script_map.source_name(&s.file_path))
                    .and_then(|p| p.file_name().and_then(|n| n.to_str()))
                    .and_then(extract_index_and_name)
                    .map(|(i, _)| i);
                if let Some(i) = source_index {
                    if i >= next {
                        index = i;
                        favored = true;
                    }
                }
            }
            if !favored {
                if let Some(script) = script {
                    let name = script.name.clone();
                    while self
                        .script_map
                        .has_default(&cfg_dir.join(format!("{index:02}_{name}")))
                    {
                        index += 1;
                    }
                }
            }
            if let Some(proxy) = self.proxies.proxy_mut(id) {
                proxy.index = index;
            }
            next = index + 1;
        }
        self.proxies.sort(&self.repository);

        if next > 100 && favor_source_index {
            self.renumerate(false);
        }
    }

    /// Back to stock: one accept-all proxy per script, original order.
    pub fn revert(&mut self) {
        let ids: Vec<ProxyId> = self.proxies.proxies.iter().map(|p| p.id).collect();
        for id in ids {
            self.proxies.delete_proxy(id, &self.repository);
        }

        let mut fallback = 50u32;
        let scripts: Vec<ScriptId> = self.repository.scripts.iter().map(|s| s.id).collect();
        for sid in scripts {
            let mut proxy = Proxy::new(&self.repository, sid, true);
            let Some(script) = self.repository.script(sid) else {
                continue;
            };
            let mut index = self
                .script_map
                .source_name(&script.file_path)
                .and_then(|p| p.file_name().and_then(|n| n.to_str()))
                .and_then(extract_index_and_name)
                .map(|(i, _)| i)
                .unwrap_or_else(|| {
                    let i = fallback;
                    fallback += 1;
                    i
                });
            let name = script.name.clone();
            while self.index_taken(index, &name) {
                index += 1;
            }
            proxy.index = index;
            self.proxies.proxies.push(proxy);
        }
        self.proxies.sort(&self.repository);
    }

    fn index_taken(&self, index: u32, name: &str) -> bool {
        self.proxies.proxies.iter().any(|p| {
            p.index == index
                && self
                    .repository
                    .script(p.source)
                    .is_some_and(|s| s.name == name)
        })
    }

    // ---- entry level operations ------------------------------------------

    /// Entries no visible rule shows anywhere, as (script, identity path).
    pub fn removed_entries(&self) -> Vec<(ScriptId, Vec<String>)> {
        let mut out = Vec::new();
        for script in &self.repository.scripts {
            fn walk(
                entries: &[Entry],
                trail: &mut Vec<String>,
                script: ScriptId,
                proxies: &Proxylist,
                out: &mut Vec<(ScriptId, Vec<String>)>,
            ) {
                for entry in entries {
                    trail.push(entry.name.clone());
                    match entry.kind {
                        EntryKind::Menu => {
                            if proxies.visible_rule_for_entry(entry.id).is_none() {
                                out.push((script, trail.clone()));
                            }
                        }
                        EntryKind::Submenu => {
                            walk(&entry.children, trail, script, proxies, out)
                        }
                        _ => {}
                    }
                    trail.pop();
                }
            }
            let mut trail = Vec::new();
            walk(script.entries(), &mut trail, script.id, &self.proxies, &mut out);
        }
        out
    }

    /// Brings a removed entry back: appended to the script's last proxy,
    /// or to a fresh proxy at the end of the menu.
    pub fn add_entry(&mut self, entry: EntryId) -> Result<RuleId> {
        let script = self
            .repository
            .script_by_entry(entry)
            .ok_or(Error::NotFound("entry in any script".into()))?;
        let sid = script.id;
        let path = script
            .path_of(entry)
            .ok_or(Error::NotFound("entry path".into()))?;
        let entry_ref = script
            .entry(entry)
            .ok_or(Error::NotFound("entry".into()))?;
        let rule = Rule::from_entry(entry_ref, true, script, &[], path);
        let rule_id = rule.id;

        let reuse = self
            .proxies
            .proxies
            .last()
            .filter(|p| p.source == sid)
            .map(|p| p.id);
        let target = match reuse {
            Some(id) => {
                if let Some(p) = self.proxies.proxy_mut(id) {
                    p.set_executable(true);
                }
                id
            }
            None => {
                let proxy = Proxy::new(&self.repository, sid, false);
                let id = proxy.id;
                self.proxies.proxies.push(proxy);
                self.renumerate(true);
                id
            }
        };
        let proxy = self
            .proxies
            .proxy_mut(target)
            .ok_or(Error::NotFound("target proxy".into()))?;
        proxy.remove_equivalent(&rule);
        proxy.rules.push(rule);
        proxy.sync(&self.repository, None, false, false);
        Ok(rule_id)
    }

    /// Removes an entry from its script along with every rule showing it.
    pub fn delete_entry(&mut self, entry: EntryId) -> Result<()> {
        let sid = self
            .repository
            .script_by_entry(entry)
            .ok_or(Error::NotFound("entry in any script".into()))?
            .id;
        for proxy in &mut self.proxies.proxies {
            for kind in [RuleKind::Normal, RuleKind::Plaintext, RuleKind::Placeholder] {
                while let Some(rule) = proxy.rule_by_entry_kind(entry, kind) {
                    proxy.remove_rule(rule);
                }
            }
        }
        self.repository
            .script_mut(sid)
            .ok_or(Error::NotFound("script".into()))?
            .delete_entry(entry)
    }

    // ---- rule addressing ---------------------------------------------------

    /// Display path of a rule: ancestor output names joined by `>`.
    pub fn rule_path(&self, proxy: ProxyId, rule: RuleId) -> Option<String> {
        let proxy = self.proxies.proxy(proxy)?;
        let index_path = proxy.rule_index_path(rule)?;
        let mut names = Vec::new();
        let mut list = &proxy.rules;
        for i in index_path {
            names.push(list[i].output_name.clone());
            list = &list[i].children;
        }
        Some(names.join(">"))
    }

    /// Resolves a `a>b>c` display path to the first matching rule, in
    /// menu order across proxies.
    pub fn find_rule(&self, path: &str) -> Option<(ProxyId, RuleId)> {
        let segments: Vec<&str> = path.split('>').map(str::trim).collect();
        if segments.is_empty() {
            return None;
        }
        for proxy in &self.proxies.proxies {
            let mut list = &proxy.rules;
            let mut found: Option<RuleId> = None;
            for (depth, segment) in segments.iter().enumerate() {
                match list.iter().find(|r| r.output_name == *segment) {
                    Some(rule) => {
                        found = Some(rule.id);
                        if depth + 1 < segments.len() {
                            list = &rule.children;
                        }
                    }
                    None => {
                        found = None;
                        break;
                    }
                }
            }
            if let Some(rule) = found {
                return Some((proxy.id, rule));
            }
        }
        None
    }

    pub fn rename_rule(&mut self, proxy: ProxyId, rule: RuleId, name: &str) -> Result<()> {
        let rule = self
            .proxies
            .proxy_mut(proxy)
            .and_then(|p| p.rule_mut(rule))
            .ok_or(Error::NotFound("rule".into()))?;
        name.clone_into(&mut rule.output_name);
        Ok(())
    }

    pub fn set_rule_visibility(
        &mut self,
        proxy: ProxyId,
        rule: RuleId,
        visible: bool,
    ) -> Result<()> {
        let rule = self
            .proxies
            .proxy_mut(proxy)
            .and_then(|p| p.rule_mut(rule))
            .ok_or(Error::NotFound("rule".into()))?;
        rule.set_visibility(visible);
        Ok(())
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }
}

fn section_marker(row: &str, opening: &str) -> Option<String> {
    let inner = row.trim().strip_prefix(opening)?;
    let inner = inner.strip_suffix(" ###")?;
    Some(inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runner::FixedRunner;
    use crate::core::script::Script;

    fn menu_with(runner: FixedRunner, cfg_dir: &Path) -> Menu {
        let config = Config {
            cfg_dir: cfg_dir.to_string_lossy().into_owned(),
            cfg_dir_prefix: String::new(),
            mkconfig_cmd: "true".to_string(),
            update_cmd: "true".to_string(),
            output_file: String::new(),
        };
        Menu::new(config, Box::new(runner))
    }

    #[test]
    fn generated_stream_builds_scripts_and_entries() {
        let dir = tempfile::tempdir().unwrap();
        let script_file = dir.path().join("10_linux");
        std::fs::write(&script_file, "#!/bin/sh\necho menu\n").unwrap();

        let stream = format!(
            "### BEGIN {p} ###\n\
             set default=0\n\
             menuentry 'Ubuntu' {{\n\tlinux /vmlinuz\n}}\n\
             submenu 'Advanced' {{\nmenuentry 'Recovery' {{\n\tlinux /vmlinuz single\n}}\n}}\n\
             ### END {p} ###\n",
            p = script_file.display()
        );
        let mut menu = menu_with(
            FixedRunner { stdout: stream, success: true },
            dir.path(),
        );
        let status = LoadStatus::default();
        menu.load(&status).unwrap();

        let script = menu.repository.script_by_file(&script_file).unwrap();
        let names: Vec<&str> = script.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["#text", "Ubuntu", "Advanced"]);
        assert_eq!(script.entries()[0].kind, EntryKind::Plaintext);
        assert_eq!(script.entries()[0].content, "set default=0\n");
        assert_eq!(script.entries()[2].children[0].name, "Recovery");
        assert_eq!(status.progress(), 1.0);
    }

    #[test]
    fn generator_failure_surfaces_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = menu_with(
            FixedRunner { stdout: String::new(), success: false },
            dir.path(),
        );
        let err = menu.load(&LoadStatus::default()).unwrap_err();
        assert!(matches!(err, Error::GeneratorFailed { .. }));
    }

    #[test]
    fn cancelled_load_stops_reading_and_tolerates_generator_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script_file = dir.path().join("10_linux");
        std::fs::write(&script_file, "#!/bin/sh\necho menu\n").unwrap();

        let stream = format!(
            "### BEGIN {p} ###\nmenuentry 'Ubuntu' {{\n\tlinux /vmlinuz\n}}\n### END {p} ###\n",
            p = script_file.display()
        );
        // the generator is killed by the cancel, so its exit is non-zero
        let mut menu = menu_with(
            FixedRunner { stdout: stream, success: false },
            dir.path(),
        );
        let status = LoadStatus::default();
        status.request_cancel();

        menu.load(&status).unwrap();
        let script = menu.repository.script_by_file(&script_file).unwrap();
        assert!(script.entries().is_empty());
    }

    #[test]
    fn find_rule_walks_display_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = menu_with(
            FixedRunner { stdout: String::new(), success: true },
            dir.path(),
        );
        let mut script = Script::new("linux", dir.path().join("10_linux"));
        let mut sub = Entry::new(EntryKind::Submenu, "Advanced");
        sub.children.push(Entry::menu("Recovery", "", "linux /vmlinuz single\n"));
        script.entries_mut().push(sub);
        let sid = script.id;
        menu.repository.scripts.push(script);
        menu.proxies.proxies.push(Proxy::new(&menu.repository, sid, true));

        let (proxy, rule) = menu.find_rule("Advanced>Recovery").unwrap();
        assert_eq!(menu.rule_path(proxy, rule).unwrap(), "Advanced>Recovery");
        assert!(menu.find_rule("Advanced>Nothing").is_none());

        menu.rename_rule(proxy, rule, "Rescue").unwrap();
        let (_, renamed) = menu.find_rule("Advanced>Rescue").unwrap();
        assert_eq!(renamed, rule);
    }

    #[test]
    fn removed_entries_reports_hidden_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = menu_with(
            FixedRunner { stdout: String::new(), success: true },
            dir.path(),
        );
        let mut script = Script::new("linux", dir.path().join("10_linux"));
        script.entries_mut().push(Entry::menu("Ubuntu", "", "linux /vmlinuz\n"));
        script.entries_mut().push(Entry::menu("Memtest", "", "linux16 /memtest\n"));
        let sid = script.id;
        menu.repository.scripts.push(script);
        menu.proxies.proxies.push(Proxy::new(&menu.repository, sid, true));
        assert!(menu.removed_entries().is_empty());

        let (proxy, rule) = menu.find_rule("Memtest").unwrap();
        menu.set_rule_visibility(proxy, rule, false).unwrap();
        let removed = menu.removed_entries();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].1, vec!["Memtest"]);

        // and back
        menu.set_rule_visibility(proxy, rule, true).unwrap();
        assert!(menu.removed_entries().is_empty());
    }

    #[test]
    fn revert_rebuilds_one_proxy_per_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = menu_with(
            FixedRunner { stdout: String::new(), success: true },
            dir.path(),
        );
        for (index, name) in [(10u32, "linux"), (30u32, "os-prober")] {
            let mut script =
                Script::new(name, dir.path().join(format!("{index:02}_{name}")));
            script.entries_mut().push(Entry::menu("E", "", "boot\n"));
            let sid = script.id;
            menu.repository.scripts.push(script);
            menu.script_map.add_script(&dir.path().join(format!("{index:02}_{name}")));
            let mut a = Proxy::new(&menu.repository, sid, true);
            let mut b = Proxy::new(&menu.repository, sid, false);
            a.index = index;
            b.index = index + 1;
            menu.proxies.proxies.push(a);
            menu.proxies.proxies.push(b);
        }
        menu.revert();

        assert_eq!(menu.proxies.proxies.len(), 2);
        let indices: Vec<u32> = menu.proxies.proxies.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![10, 30]);
    }

    #[test]
    fn renumerate_keeps_source_indices_when_possible() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = menu_with(
            FixedRunner { stdout: String::new(), success: true },
            dir.path(),
        );
        for (index, name) in [(10u32, "linux"), (30u32, "os-prober")] {
            let path = dir.path().join(format!("{index:02}_{name}"));
            let mut script = Script::new(name, &path);
            script.entries_mut().push(Entry::menu("E", "", "boot\n"));
            let sid = script.id;
            menu.repository.scripts.push(script);
            menu.script_map.add_script(&path);
            let mut proxy = Proxy::new(&menu.repository, sid, true);
            proxy.index = 90;
            menu.proxies.proxies.push(proxy);
        }
        menu.renumerate(true);
        let indices: Vec<u32> = menu.proxies.proxies.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![10, 30]);
        assert!(!menu.has_conflicts());
    }
}
