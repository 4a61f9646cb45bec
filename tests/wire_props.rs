// Property tests for the wire rule format: whatever a rule tree says,
// its serialized text must parse back to the same structure, quoting
// and escaping included.

use proptest::prelude::*;
use std::path::PathBuf;

use menumeld::core::repository::Repository;
use menumeld::core::rule::{Rule, RuleKind};
use menumeld::core::script::ScriptId;
use menumeld::core::wire::{parse_rules, serialize_rules, PathContext};

fn segment() -> impl Strategy<Value = String> {
    // quotes, commas, braces and tildes are all legal inside quoted text
    proptest::string::string_regex("[A-Za-z0-9 '(),./*{}~_+-]{1,12}").unwrap()
}

fn normal_rule() -> impl Strategy<Value = Rule> {
    (
        proptest::collection::vec(segment(), 1..4),
        proptest::option::of(segment()),
        proptest::option::of(proptest::string::string_regex("[0-9a-f]{32}").unwrap()),
        proptest::option::of(Just("/etc/menu.d/30_os-prober".to_string())),
        any::<bool>(),
    )
        .prop_map(|(path, alias, hash, origin, visible)| {
            let mut rule = match alias {
                Some(name) => Rule::with_name(RuleKind::Normal, path, name, visible),
                None => Rule::new(RuleKind::Normal, path, visible),
            };
            rule.id_hash = hash;
            rule.origin = origin.map(PathBuf::from);
            rule
        })
}

fn placeholder_rule() -> impl Strategy<Value = Rule> {
    (proptest::collection::vec(segment(), 0..3), any::<bool>())
        .prop_map(|(path, visible)| Rule::with_name(RuleKind::Placeholder, path, "*", visible))
}

fn plaintext_rule() -> impl Strategy<Value = Rule> {
    any::<bool>().prop_map(|visible| {
        Rule::with_name(RuleKind::Plaintext, vec!["#text".to_string()], "#text", visible)
    })
}

fn leaf_rule() -> impl Strategy<Value = Rule> {
    prop_oneof![
        4 => normal_rule(),
        1 => placeholder_rule(),
        1 => plaintext_rule(),
    ]
}

// one submenu level with leaf children; deeper nesting adds nothing the
// parser handles differently
fn submenu_rule() -> impl Strategy<Value = Rule> {
    (
        proptest::collection::vec(segment(), 1..3),
        segment(),
        any::<bool>(),
        proptest::collection::vec(leaf_rule(), 1..4),
    )
        .prop_map(|(path, name, visible, children)| {
            let mut rule = Rule::with_name(RuleKind::Submenu, path, name, visible);
            rule.children = children;
            rule
        })
}

fn rule_list() -> impl Strategy<Value = Vec<Rule>> {
    proptest::collection::vec(
        prop_oneof![3 => leaf_rule(), 1 => submenu_rule()],
        1..6,
    )
}

proptest! {
    #[test]
    fn wire_text_preserves_rule_structure(rules in rule_list()) {
        let repo = Repository::default();
        let ctx = PathContext::new(&repo, ScriptId::fresh());

        let text = serialize_rules(&rules, &ctx);
        let parsed = parse_rules(&text, "");

        prop_assert_eq!(rules.len(), parsed.len(), "wire text:\n{}", text);
        for (original, roundtripped) in rules.iter().zip(&parsed) {
            prop_assert!(
                original.structural_eq(roundtripped),
                "structure lost through:\n{}\n{:#?}\n{:#?}",
                text,
                original,
                roundtripped
            );
        }
    }

    #[test]
    fn serialization_is_a_fixed_point(rules in rule_list()) {
        let repo = Repository::default();
        let ctx = PathContext::new(&repo, ScriptId::fresh());

        let text = serialize_rules(&rules, &ctx);
        let again = serialize_rules(&parse_rules(&text, ""), &ctx);
        prop_assert_eq!(text, again);
    }
}

#[test]
fn foreign_prefix_applies_on_parse_and_strips_on_serialize() {
    let repo = Repository::default();
    let rules = parse_rules("+'Windows 10' from '/etc/menu.d/30_os-prober'", "/mnt");
    assert_eq!(
        rules[0].origin.as_deref(),
        Some(std::path::Path::new("/mnt/etc/menu.d/30_os-prober"))
    );

    let ctx = PathContext {
        repo: &repo,
        own: ScriptId::fresh(),
        targets: None,
        prefix: "/mnt",
    };
    let text = serialize_rules(&rules, &ctx);
    assert_eq!(text, "+'Windows 10' from '/etc/menu.d/30_os-prober'\n");
}
