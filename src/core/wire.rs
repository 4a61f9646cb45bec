//! The wire format: rule trees as single lines of text
//!
//! This is the format proxy files carry between saves and loads. Parse and
//! serialize are exact inverses over the fields the format preserves:
//! kind, visibility, identity path, content hash, foreign script path,
//! display name and children.
//!
//! Grammar per rule: a `+`/`-` visibility sigil, then one of
//! `'seg'/'seg'/...` (entry path, `''` escapes a quote), `...'/*` or bare
//! `*` (placeholder), `#text` (plaintext); then any of `~hash~`,
//! ` as 'name'`, ` from 'script-path'`, `{children}`. Commas and
//! whitespace between rules are insignificant.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::core::entry::EntryId;
use crate::core::repository::Repository;
use crate::core::rule::{Rule, RuleKind};
use crate::core::script::{Script, ScriptId};

/// Resolution context for serialization: where entries live and what wire
/// path each script gets.
pub struct PathContext<'a> {
    pub repo: &'a Repository,
    /// The proxy's own script; its entries carry no `from` clause.
    pub own: ScriptId,
    /// Overrides the wire path per script; at save time scripts may be
    /// about to move.
    pub targets: Option<&'a IndexMap<ScriptId, PathBuf>>,
    /// Prefix stripped from (and re-added to) foreign script paths.
    pub prefix: &'a str,
}

impl<'a> PathContext<'a> {
    pub fn new(repo: &'a Repository, own: ScriptId) -> Self {
        PathContext { repo, own, targets: None, prefix: "" }
    }

    fn locate(&self, id: EntryId) -> Option<(&'a Script, Vec<String>)> {
        let script = self.repo.script_by_entry(id)?;
        let path = script.path_of(id)?;
        Some((script, path))
    }

    /// Wire path for a foreign script; `None` for the proxy's own script.
    fn script_wire_path(&self, script: &Script) -> Option<String> {
        if script.id == self.own {
            return None;
        }
        let target: &Path = self
            .targets
            .and_then(|t| t.get(&script.id).map(PathBuf::as_path))
            .unwrap_or(&script.file_path);
        let text = target.to_string_lossy();
        Some(text.strip_prefix(self.prefix).unwrap_or(&text).to_string())
    }
}

fn quote(segment: &str) -> String {
    format!("'{}'", segment.replace('\'', "''"))
}

fn quote_path(path: &[String]) -> String {
    path.iter().map(|s| quote(s)).join("/")
}

fn placeholder_path(path: &[String]) -> String {
    if path.is_empty() {
        "*".to_string()
    } else {
        format!("{}/*", quote_path(path))
    }
}

/// One rule as one wire expression (children inline).
pub fn serialize_rule(rule: &Rule, ctx: &PathContext) -> String {
    let mut out = String::from(if rule.visible { "+" } else { "-" });

    let located = rule.data_source.and_then(|id| ctx.locate(id));
    let mut foreign_path: Option<String> = None;

    match rule.kind {
        RuleKind::Plaintext => out.push_str("#text"),
        RuleKind::Placeholder => {
            let path = located
                .as_ref()
                .map(|(_, p)| p.as_slice())
                .unwrap_or(&rule.id_path);
            out.push_str(&placeholder_path(path));
        }
        RuleKind::Submenu => {
            if rule.id_path.is_empty() {
                out.push_str("'SUBMENU'");
            } else {
                out.push_str(&quote_path(&rule.id_path));
            }
        }
        RuleKind::Normal => match &located {
            Some((script, path)) => {
                out.push_str(&quote_path(path));
                if let Some(hash) = rule
                    .data_source
                    .and_then(|id| script.entry(id))
                    .and_then(|e| e.content_hash())
                {
                    out.push_str(&format!("~{hash}~"));
                }
            }
            None => {
                out.push_str(&quote_path(&rule.id_path));
                if let Some(hash) = &rule.id_hash {
                    out.push_str(&format!("~{hash}~"));
                }
            }
        },
    }

    if let Some((script, _)) = &located {
        foreign_path = ctx.script_wire_path(script);
    } else if let Some(origin) = &rule.origin {
        let text = origin.to_string_lossy();
        foreign_path = Some(text.strip_prefix(ctx.prefix).unwrap_or(&text).to_string());
    }

    let alias_needed = match rule.kind {
        RuleKind::Submenu => true,
        RuleKind::Normal => match &located {
            Some((script, _)) => rule
                .data_source
                .and_then(|id| script.entry(id))
                .is_some_and(|e| e.name != rule.output_name),
            None => rule.id_path.last() != Some(&rule.output_name),
        },
        _ => false,
    };
    if alias_needed {
        out.push_str(&format!(" as {}", quote(&rule.output_name)));
    }

    if let Some(path) = foreign_path {
        out.push_str(&format!(" from {}", quote(&path)));
    }

    if rule.kind == RuleKind::Submenu && !rule.children.is_empty() {
        out.push('{');
        out.push_str(
            &rule
                .children
                .iter()
                .map(|c| serialize_rule(c, ctx))
                .join(", "),
        );
        out.push('}');
    }
    out
}

/// All toplevel rules, one line each, trailing newline included.
pub fn serialize_rules(rules: &[Rule], ctx: &PathContext) -> String {
    let mut out = String::new();
    for rule in rules {
        out.push_str(&serialize_rule(rule, ctx));
        out.push('\n');
    }
    out
}

/// Parses a wire rule block. Unknown entries stay unresolved; sync connects
/// them afterwards. `cfg_dir_prefix` is prepended to foreign script paths.
pub fn parse_rules(input: &str, cfg_dir_prefix: &str) -> Vec<Rule> {
    let chars: Vec<char> = input.chars().collect();
    let mut cursor = Cursor { chars, pos: 0 };
    parse_list(&mut cursor, cfg_dir_prefix)
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        let end = self.pos + s.chars().count();
        if end <= self.chars.len() && self.chars[self.pos..end].iter().collect::<String>() == s {
            self.pos = end;
            true
        } else {
            false
        }
    }

    /// Reads a `'...'` string, `''` unescaping included. The cursor must
    /// stand on the opening quote.
    fn quoted(&mut self) -> String {
        let mut out = String::new();
        if !self.eat('\'') {
            return out;
        }
        while let Some(c) = self.bump() {
            if c == '\'' {
                if self.eat('\'') {
                    out.push('\'');
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }
}

fn parse_list(cursor: &mut Cursor, prefix: &str) -> Vec<Rule> {
    let mut rules = Vec::new();
    let mut visible = false;

    while let Some(c) = cursor.peek() {
        match c {
            '}' => break,
            '+' => {
                visible = true;
                cursor.pos += 1;
            }
            '-' => {
                visible = false;
                cursor.pos += 1;
            }
            '\'' => {
                let rule = parse_path_rule(cursor, visible);
                let rule = parse_suffixes(cursor, rule, prefix);
                rules.push(rule);
            }
            '*' => {
                cursor.pos += 1;
                let rule = Rule::with_name(RuleKind::Placeholder, Vec::new(), "*", visible);
                rules.push(parse_suffixes(cursor, rule, prefix));
            }
            '#' => {
                if cursor.eat_str("#text") {
                    let rule = Rule::with_name(
                        RuleKind::Plaintext,
                        vec!["#text".to_string()],
                        "#text",
                        visible,
                    );
                    rules.push(parse_suffixes(cursor, rule, prefix));
                } else {
                    cursor.pos += 1;
                }
            }
            // commas and whitespace between rules
            _ => {
                cursor.pos += 1;
            }
        }
    }
    rules
}

fn parse_path_rule(cursor: &mut Cursor, visible: bool) -> Rule {
    let mut path = Vec::new();
    loop {
        let segment = cursor.quoted();
        path.push(segment);
        if cursor.eat('/') {
            if cursor.eat('*') {
                return Rule::with_name(RuleKind::Placeholder, path, "*", visible);
            }
            continue;
        }
        return Rule::new(RuleKind::Normal, path, visible);
    }
}

fn parse_suffixes(cursor: &mut Cursor, mut rule: Rule, prefix: &str) -> Rule {
    loop {
        cursor.skip_blank();
        match cursor.peek() {
            Some('~') => {
                cursor.pos += 1;
                let mut hash = String::new();
                while let Some(c) = cursor.bump() {
                    if c == '~' {
                        break;
                    }
                    hash.push(c);
                }
                rule.id_hash = Some(hash);
            }
            Some('a') if cursor.eat_str("as") => {
                cursor.skip_blank();
                rule.output_name = cursor.quoted();
            }
            Some('f') if cursor.eat_str("from") => {
                cursor.skip_blank();
                rule.origin = Some(PathBuf::from(format!("{prefix}{}", cursor.quoted())));
            }
            Some('{') => {
                cursor.pos += 1;
                rule.children = parse_list(cursor, prefix);
                cursor.eat('}');
                rule.kind = RuleKind::Submenu;
            }
            _ => return rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_ctx(repo: &Repository) -> PathContext<'_> {
        PathContext::new(repo, ScriptId::fresh())
    }

    #[test]
    fn parses_the_common_shapes() {
        let rules = parse_rules(
            "+'linux'/'Ubuntu'~abc123~ as 'Ubuntu, with Linux'\n-'memtest86+'\n+*\n+#text\n",
            "",
        );
        assert_eq!(rules.len(), 4);

        assert_eq!(rules[0].kind, RuleKind::Normal);
        assert_eq!(rules[0].id_path, vec!["linux", "Ubuntu"]);
        assert_eq!(rules[0].id_hash.as_deref(), Some("abc123"));
        assert_eq!(rules[0].output_name, "Ubuntu, with Linux");
        assert!(rules[0].visible);

        assert!(!rules[1].visible);
        assert_eq!(rules[1].output_name, "memtest86+");

        assert_eq!(rules[2].kind, RuleKind::Placeholder);
        assert!(rules[2].id_path.is_empty());

        assert_eq!(rules[3].kind, RuleKind::Plaintext);
    }

    #[test]
    fn parses_submenus_and_scoped_placeholders() {
        let rules = parse_rules(
            "+'Advanced' as 'Expert mode'{+'Advanced'/*, -'Advanced'/'Recovery'}",
            "",
        );
        assert_eq!(rules.len(), 1);
        let submenu = &rules[0];
        assert_eq!(submenu.kind, RuleKind::Submenu);
        assert_eq!(submenu.output_name, "Expert mode");
        assert_eq!(submenu.id_path, vec!["Advanced"]);
        assert_eq!(submenu.children.len(), 2);
        assert_eq!(submenu.children[0].kind, RuleKind::Placeholder);
        assert_eq!(submenu.children[0].id_path, vec!["Advanced"]);
        assert_eq!(submenu.children[1].id_path, vec!["Advanced", "Recovery"]);
    }

    #[test]
    fn parses_foreign_references_with_prefix() {
        let rules = parse_rules("+'Windows 10' from '/etc/menu.d/30_os-prober'", "/mnt");
        assert_eq!(
            rules[0].origin.as_deref(),
            Some(Path::new("/mnt/etc/menu.d/30_os-prober"))
        );
    }

    #[test]
    fn unescapes_doubled_quotes() {
        let rules = parse_rules("+'It''s here' as 'really ''quoted'''", "");
        assert_eq!(rules[0].id_path, vec!["It's here"]);
        assert_eq!(rules[0].output_name, "really 'quoted'");
    }

    #[test]
    fn serializes_back_to_the_same_text() {
        let repo = Repository::default();
        let ctx = detached_ctx(&repo);
        let text = "+'linux'/'Ubuntu'~abc123~ as 'Ubuntu, with Linux'\n-'memtest86+'\n+* \
                    \n+#text\n+'Advanced' as 'More'{+'Advanced'/*, -'Advanced'/'Recovery'}\n";
        let rules = parse_rules(text, "");
        let rendered = serialize_rules(&rules, &ctx);
        let reparsed = parse_rules(&rendered, "");

        assert_eq!(rules.len(), reparsed.len());
        for (a, b) in rules.iter().zip(&reparsed) {
            assert!(a.structural_eq(b), "mismatch:\n{a:#?}\n{b:#?}");
        }
    }
}
