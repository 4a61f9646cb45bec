// End-to-end tests running the compiled binary against a disposable
// menu directory. The generator is faked with a tiny shell script that
// does what the real one does: run every executable file in the cfg
// dir and wrap its output in BEGIN/END markers.
#![cfg(unix)]

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use clap::Parser;
use menumeld::cli::{Cli, Commands, MoveDirection};
use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::process::Command;

#[test]
fn move_flag_parsing() {
    // Given
    let argv = vec!["menumeld", "move", "Advanced>Recovery", "down", "--steps", "3"];

    // When
    let cmd = Cli::parse_from(argv);

    // Then
    match cmd.command {
        Commands::Move(args) => {
            assert_eq!(args.entry, "Advanced>Recovery");
            assert!(matches!(args.direction, MoveDirection::Down));
            assert_eq!(args.steps, 3);
        }
        _ => panic!("expected Move command"),
    }
}

#[test]
fn global_flags_are_accepted_after_the_subcommand() {
    let cmd = Cli::parse_from(vec!["menumeld", "show", "--all", "--quiet", "--dry-run"]);
    assert!(cmd.quiet);
    assert!(cmd.dry_run);
    match cmd.command {
        Commands::Show(args) => assert!(args.all),
        _ => panic!("expected Show command"),
    }
}

/// Writes a generator script that prints one menuentry block per name.
fn write_script(file: &assert_fs::fixture::ChildPath, entries: &[(&str, &str)]) {
    let mut body = String::from("#!/bin/sh\n");
    for (name, line) in entries {
        body.push_str(&format!(
            "echo \"menuentry '{name}' {{\"\necho \"{line}\"\necho \"}}\"\n"
        ));
    }
    file.write_str(&body).expect("write script");
    let mut perms = std::fs::metadata(file.path()).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(file.path(), perms).expect("chmod script");
}

/// A cfg dir with two scripts, a fake generator and a config file
/// pointing at both.
fn make_fixture() -> assert_fs::TempDir {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let cfg = tmp.child("grub.d");
    cfg.create_dir_all().expect("cfg dir");

    write_script(
        &cfg.child("10_linux"),
        &[("Ubuntu", "\tlinux /vmlinuz"), ("Fedora", "\tlinux /vmlinuz-fedora")],
    );
    write_script(&cfg.child("30_os-prober"), &[("Windows 10", "\tchainloader +1")]);

    let gen_sh = tmp.child("gen.sh");
    gen_sh.write_str(&format!(
        "#!/bin/sh\n\
         for f in \"{dir}\"/*; do\n\
         \t[ -f \"$f\" ] && [ -x \"$f\" ] || continue\n\
         \techo \"### BEGIN $f ###\"\n\
         \t\"$f\"\n\
         \techo \"### END $f ###\"\n\
         done\n",
        dir = cfg.path().display()
    ))
    .expect("write gen.sh");

    tmp.child("menumeld.toml")
        .write_str(&format!(
            "cfg_dir = \"{dir}\"\n\
             cfg_dir_prefix = \"\"\n\
             mkconfig_cmd = \"sh {gen_sh}\"\n\
             update_cmd = \"true\"\n\
             output_file = \"{out}\"\n",
            dir = cfg.path().display(),
            gen_sh = gen_sh.path().display(),
            out = tmp.child("menu.cfg").path().display()
        ))
        .expect("write config");
    tmp
}

fn menumeld(tmp: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("menumeld").expect("binary");
    cmd.current_dir(tmp.path());
    cmd
}

#[test]
fn show_lists_generated_entries() {
    let tmp = make_fixture();

    menumeld(&tmp)
        .arg("show")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Ubuntu")
                .and(predicate::str::contains("Fedora"))
                .and(predicate::str::contains("Windows 10")),
        );
}

#[test]
fn show_detail_appends_kernel_fields() {
    let tmp = make_fixture();

    menumeld(&tmp)
        .args(["show", "--detail"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/vmlinuz"));
}

#[test]
fn show_json_dumps_the_rule_tree() {
    let tmp = make_fixture();

    let assert = menumeld(&tmp).args(["show", "--json"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let rules: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");

    let names: Vec<&str> = rules
        .as_array()
        .expect("toplevel array")
        .iter()
        .filter_map(|r| r["output_name"].as_str())
        .collect();
    assert_eq!(names, vec!["Ubuntu", "Fedora", "Windows 10"]);
}

#[test]
fn rename_writes_a_proxy_and_survives_a_reload() {
    let tmp = make_fixture();
    let cfg = tmp.child("grub.d");

    menumeld(&tmp)
        .args(["rename", "Ubuntu", "First choice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Menu installed"));

    // the edited script moved aside and a proxy fragment took its slot
    cfg.child("10_linux").assert(predicate::path::missing());
    cfg.child("proxifiedScripts/linux").assert(predicate::path::exists());
    cfg.child("10_linux_proxy").assert(
        predicate::path::exists().and(predicate::str::contains("#THIS IS A GRUB PROXY SCRIPT")
            .and(predicate::str::contains("as 'First choice'"))
            .from_utf8()
            .from_file_path()),
    );
    cfg.child("bin/menumeld_proxy").assert(predicate::path::exists());

    // a fresh process reads the rename back through the fragment
    menumeld(&tmp)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("First choice").and(predicate::str::contains("Fedora")));
}

#[test]
fn hidden_entries_drop_from_the_tree() {
    let tmp = make_fixture();

    menumeld(&tmp)
        .args(["set-visibility", "Windows 10", "hidden"])
        .assert()
        .success();

    menumeld(&tmp)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Windows 10").not());

    menumeld(&tmp)
        .args(["show", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Windows 10").and(predicate::str::contains("(hidden)")));

    menumeld(&tmp)
        .args(["show", "--removed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("os-prober").and(predicate::str::contains("Windows 10")));
}

#[test]
fn move_reorders_entries_across_reloads() {
    let tmp = make_fixture();

    menumeld(&tmp)
        .args(["move", "Fedora", "up"])
        .assert()
        .success();

    let assert = menumeld(&tmp).arg("show").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let fedora = stdout.find("Fedora").expect("Fedora in tree");
    let ubuntu = stdout.find("Ubuntu").expect("Ubuntu in tree");
    assert!(fedora < ubuntu, "expected Fedora before Ubuntu:\n{stdout}");
}

#[test]
fn dry_run_changes_nothing_on_disk() {
    let tmp = make_fixture();
    let cfg = tmp.child("grub.d");

    menumeld(&tmp)
        .args(["--dry-run", "set-visibility", "Windows 10", "hidden"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"));

    cfg.child("30_os-prober").assert(predicate::path::exists());
    cfg.child("30_os-prober_proxy").assert(predicate::path::missing());

    menumeld(&tmp)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Windows 10"));
}

#[test]
fn init_scaffolds_a_config_file() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    menumeld(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));
    tmp.child("menumeld.toml").assert(predicate::path::exists());

    // refuses to clobber without --force
    menumeld(&tmp).arg("init").assert().failure();
    menumeld(&tmp).args(["init", "--force"]).assert().success();
}

#[test]
fn completions_print_to_stdout() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    menumeld(&tmp)
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("menumeld"));
}
