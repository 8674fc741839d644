#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `symlinks` command.
//!
//! Every test runs against a temporary repository and a fake home directory
//! passed through `CFGCTL_HOME`; the real home directory is never touched.
#![cfg(unix)]

mod common;

use std::fs;

use cfgctl::commands::symlinks::{self, SymlinkAction};
use common::*;

fn is_symlink(path: &std::path::Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

#[test]
fn create_links_every_file_under_home() {
    let ctx = TestContextBuilder::new()
        .with_home_file(".bashrc", "# bash")
        .with_home_file(".config/git/config", "[user]")
        .with_file("README.md", "not linked")
        .build();

    let out = ctx.run(&["symlinks", "create"]);
    assert!(out.status.success(), "{}", output_text(&out));

    let bashrc = ctx.home().join(".bashrc");
    assert!(is_symlink(&bashrc));
    let root = fs::canonicalize(ctx.root()).unwrap();
    assert_eq!(fs::read_link(&bashrc).unwrap(), root.join("home/.bashrc"));
    assert_eq!(
        fs::read_to_string(ctx.home().join(".config/git/config")).unwrap(),
        "[user]"
    );
    assert!(!ctx.home().join("README.md").exists());
}

#[test]
fn create_twice_is_idempotent() {
    let ctx = TestContextBuilder::new()
        .with_home_file(".bashrc", "# bash")
        .build();

    assert!(ctx.run(&["symlinks", "create"]).status.success());
    let link = ctx.home().join(".bashrc");
    let first = fs::read_link(&link).unwrap();

    let out = ctx.run(&["s", "c"]);
    assert!(out.status.success());
    assert!(output_text(&out).contains("0 changed, 1 already ok"));
    assert_eq!(fs::read_link(&link).unwrap(), first);
}

#[test]
fn create_then_remove_round_trip() {
    let ctx = TestContextBuilder::new()
        .with_home_file(".bashrc", "# bash")
        .with_home_file(".vim/vimrc", "set nu")
        .build();

    assert!(ctx.run(&["symlinks", "create"]).status.success());
    let out = ctx.run(&["links", "remove"]);
    assert!(out.status.success(), "{}", output_text(&out));

    assert!(ctx.home().join(".bashrc").symlink_metadata().is_err());
    assert!(ctx.home().join(".vim/vimrc").symlink_metadata().is_err());
    assert_eq!(
        fs::read_to_string(ctx.root().join("home/.bashrc")).unwrap(),
        "# bash"
    );
}

#[test]
fn existing_regular_file_is_left_alone() {
    let ctx = TestContextBuilder::new()
        .with_home_file(".bashrc", "# repo")
        .with_user_file(".bashrc", "# mine")
        .build();

    let out = ctx.run(&["symlinks", "create"]);
    let text = output_text(&out);
    assert!(out.status.success(), "{text}");
    assert!(text.contains("~/.bashrc is not a symlink - skipping"), "{text}");
    assert_eq!(
        fs::read_to_string(ctx.home().join(".bashrc")).unwrap(),
        "# mine"
    );

    let out = ctx.run(&["symlinks", "remove"]);
    assert!(out.status.success());
    assert_eq!(
        fs::read_to_string(ctx.home().join(".bashrc")).unwrap(),
        "# mine"
    );
}

#[test]
fn dry_run_touches_nothing() {
    let ctx = TestContextBuilder::new()
        .with_home_file(".config/nvim/init.lua", "-- nvim")
        .build();

    let out = ctx.run(&["-d", "symlinks", "create"]);
    let text = output_text(&out);
    assert!(out.status.success(), "{text}");
    assert!(text.contains("linking ~/.config/nvim/init.lua to home/.config/nvim/init.lua"));
    assert!(!ctx.home().join(".config").exists());
}

#[test]
fn missing_home_tree_fails() {
    let ctx = TestContextBuilder::new().build();
    fs::remove_dir(ctx.root().join("home")).unwrap();
    let out = ctx.run(&["symlinks", "create"]);
    assert!(!out.status.success());
    assert!(output_text(&out).contains("is not a directory"));
}

#[test]
fn action_is_required() {
    let ctx = TestContextBuilder::new().build();
    assert!(!ctx.run(&["symlinks"]).status.success());
}

#[test]
fn library_sync_reports_counts() {
    let ctx = TestContextBuilder::new()
        .with_home_file(".a", "a")
        .with_home_file(".b", "b")
        .with_home_file(".c", "c")
        .with_user_file(".c", "user data")
        .build();
    let (context, log) = ctx.context(true);

    let stats = symlinks::sync(&context, SymlinkAction::Link).unwrap();
    assert_eq!(stats.changed, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 0);
    assert!(log.contains("linking ~/.a to home/.a"));

    let stats = symlinks::sync(&context, SymlinkAction::Unlink).unwrap();
    assert_eq!(stats.changed, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(fs::read_to_string(ctx.home().join(".c")).unwrap(), "user data");
}
