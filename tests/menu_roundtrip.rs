// Full load/save/load cycle against a real directory, with the external
// generator replaced by canned output. Verifies that an edit ends up in
// a proxy fragment on disk and comes back intact in a fresh process.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use assert_fs::prelude::*;
use menumeld::core::menu::Menu;
use menumeld::core::runner::FixedRunner;
use menumeld::core::worker::LoadStatus;
use menumeld::infra::config::Config;

fn write_executable(file: &assert_fs::fixture::ChildPath, content: &str) {
    file.write_str(content).expect("write script");
    let perms = std::fs::Permissions::from_mode(0o755);
    std::fs::set_permissions(file.path(), perms).expect("chmod script");
}

fn file_mode(path: &Path) -> u32 {
    std::fs::metadata(path).expect("metadata").permissions().mode() & 0o777
}

fn config_for(cfg_dir: &Path) -> Config {
    Config {
        cfg_dir: cfg_dir.to_string_lossy().into_owned(),
        cfg_dir_prefix: String::new(),
        mkconfig_cmd: "generate-menu".to_string(),
        update_cmd: "install-menu".to_string(),
        output_file: String::new(),
    }
}

/// Two plain scripts, plus the generator output they would produce.
fn make_fixture() -> (assert_fs::TempDir, String) {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let cfg = tmp.child("menu.d");
    cfg.create_dir_all().expect("cfg dir");
    write_executable(&cfg.child("10_linux"), "#!/bin/sh\necho entries\n");
    write_executable(&cfg.child("20_memtest"), "#!/bin/sh\necho entries\n");

    let stream = format!(
        "### BEGIN {linux} ###\n\
         menuentry 'Ubuntu' {{\n\tlinux /vmlinuz\n}}\n\
         ### END {linux} ###\n\
         ### BEGIN {memtest} ###\n\
         menuentry 'Memtest86+' {{\n\tlinux16 /memtest\n}}\n\
         ### END {memtest} ###\n",
        linux = cfg.child("10_linux").path().display(),
        memtest = cfg.child("20_memtest").path().display(),
    );
    (tmp, stream)
}

#[test]
fn hiding_an_entry_survives_save_and_reload() {
    let (tmp, stream) = make_fixture();
    let cfg = tmp.child("menu.d");

    let mut menu = Menu::new(
        config_for(cfg.path()),
        Box::new(FixedRunner { stdout: stream, success: true }),
    );
    menu.load(&LoadStatus::default()).unwrap();

    assert_eq!(menu.proxies.proxies.len(), 2);
    let indices: Vec<u32> = menu.proxies.proxies.iter().map(|p| p.index).collect();
    assert_eq!(indices, [10, 20]);
    assert!(menu.removed_entries().is_empty());

    let (proxy, rule) = menu.find_rule("Memtest86+").unwrap();
    menu.set_rule_visibility(proxy, rule, false).unwrap();
    menu.save().unwrap();

    // the edited script moved aside; a fragment holds its rules now
    cfg.child("10_linux").assert(predicates::path::exists());
    cfg.child("20_memtest").assert(predicates::path::missing());
    cfg.child("proxifiedScripts/memtest").assert(predicates::path::exists());
    let fragment = cfg.child("20_memtest_proxy");
    fragment.assert(predicates::path::exists());
    let content = std::fs::read_to_string(fragment.path()).unwrap();
    assert!(content.starts_with("#!/bin/sh\n#THIS IS A GRUB PROXY SCRIPT\n"));
    assert!(content.contains("-'Memtest86+'"), "fragment:\n{content}");
    assert!(content.contains("proxifiedScripts/memtest"));
    cfg.child("bin/menumeld_proxy").assert(predicates::path::exists());
    cfg.child(".script_sources.txt").assert(predicates::path::exists());

    // a fresh menu reads the generator through the forwarder and
    // reconnects the stored rules to the regenerated entries
    let reload_stream = format!(
        "### BEGIN {linux} ###\n\
         menuentry 'Ubuntu' {{\n\tlinux /vmlinuz\n}}\n\
         ### END {linux} ###\n\
         ### BEGIN {forwarder} ###\n\
         menuentry 'Memtest86+' {{\n\tlinux16 /memtest\n}}\n\
         ### END {forwarder} ###\n",
        linux = cfg.child("10_linux").path().display(),
        forwarder = cfg.child("LS_memtest").path().display(),
    );
    let mut reloaded = Menu::new(
        config_for(cfg.path()),
        Box::new(FixedRunner { stdout: reload_stream, success: true }),
    );
    reloaded.load(&LoadStatus::default()).unwrap();

    let (proxy, rule) = reloaded.find_rule("Memtest86+").unwrap();
    let rule = reloaded.proxies.proxy(proxy).unwrap().rule(rule).unwrap();
    assert!(!rule.visible);

    let removed = reloaded.removed_entries();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].1, vec!["Memtest86+"]);

    let indices: Vec<u32> = reloaded.proxies.proxies.iter().map(|p| p.index).collect();
    assert_eq!(indices, [10, 20]);

    // load parked the fragment while the generator ran, then put the
    // executable bit back
    assert_eq!(file_mode(fragment.path()), 0o755);
    assert_eq!(file_mode(&cfg.path().join("proxifiedScripts/memtest")), 0o755);
    cfg.child("LS_memtest").assert(predicates::path::missing());
}

#[test]
fn saving_an_untouched_menu_writes_no_fragments() {
    let (tmp, stream) = make_fixture();
    let cfg = tmp.child("menu.d");

    let mut menu = Menu::new(
        config_for(cfg.path()),
        Box::new(FixedRunner { stdout: stream, success: true }),
    );
    menu.load(&LoadStatus::default()).unwrap();
    menu.save().unwrap();

    cfg.child("10_linux").assert(predicates::path::exists());
    cfg.child("20_memtest").assert(predicates::path::exists());
    cfg.child("10_linux_proxy").assert(predicates::path::missing());
    cfg.child("20_memtest_proxy").assert(predicates::path::missing());
    cfg.child("bin").assert(predicates::path::missing());
    // identity rows carry no information and are not persisted
    cfg.child(".script_sources.txt").assert(predicates::path::missing());
}

#[test]
fn failing_install_command_surfaces_as_an_error() {
    let (tmp, stream) = make_fixture();
    let cfg = tmp.child("menu.d");

    let mut menu = Menu::new(
        config_for(cfg.path()),
        Box::new(FixedRunner { stdout: stream, success: true }),
    );
    menu.load(&LoadStatus::default()).unwrap();

    // swap in a runner that fails the update command
    let mut failing = Menu::new(
        config_for(cfg.path()),
        Box::new(FixedRunner { stdout: "boom".to_string(), success: false }),
    );
    std::mem::swap(&mut failing.repository, &mut menu.repository);
    std::mem::swap(&mut failing.proxies, &mut menu.proxies);
    let err = failing.save().unwrap_err();
    assert!(matches!(err, menumeld::core::error::Error::InstallFailed { .. }));
}
