//! End-to-end oracle behavior over real repositories.

mod common;

use common::{TestRepo, plain_context};
use gitver_core::{BuildContext, compute};
use pretty_assertions::assert_eq;

#[test]
fn no_repository_yields_the_degenerate_version() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = plain_context();
    let result = compute(tmp.path(), None, &[], &ctx).unwrap();
    assert_eq!(result.artifacts.version, "0.0.1.0");
    assert_eq!(result.artifacts.git_commit_id, "");
    assert_eq!(result.artifacts.git_version_height, 0);
    assert!(!result.artifacts.public_release);
}

#[test]
fn empty_repository_yields_the_degenerate_version() {
    let repo = TestRepo::new();
    let ctx = plain_context();
    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(result.artifacts.version, "0.0.1.0");
    assert_eq!(result.artifacts.git_commit_id, "");
    assert_eq!(result.artifacts.git_version_height, 0);
    assert!(!result.artifacts.public_release);
}

#[test]
fn empty_repository_reads_working_copy_configuration() {
    let repo = TestRepo::new();
    repo.write_file("version.json", r#"{ "version": "2.4-beta" }"#);
    let ctx = plain_context();
    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    // build and revision stay zero without a commit
    assert_eq!(result.artifacts.version, "2.4.0.0");
    assert_eq!(result.artifacts.prerelease_version, "-beta");
    assert_eq!(result.artifacts.git_commit_id, "");
}

#[test]
fn linear_history_without_configuration_counts_all_commits() {
    let repo = TestRepo::new();
    repo.commit_empty("one");
    repo.commit_empty("two");
    let head = repo.commit_empty("three");
    let ctx = plain_context();

    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    let artifacts = &result.artifacts;
    assert_eq!(artifacts.git_version_height, 3);
    assert_eq!(artifacts.major_minor_version, "0.0");
    assert_eq!(artifacts.simple_version, "0.0.3");

    let fragment = u64::from(u16::from_be_bytes([
        u8::from_str_radix(&head[0..2], 16).unwrap(),
        u8::from_str_radix(&head[2..4], 16).unwrap(),
    ]))
    .min(0x7FFE);
    assert_eq!(artifacts.version, format!("0.0.3.{fragment}"));
    assert_eq!(
        artifacts.assembly_informational_version,
        format!("0.0.3+g{}", artifacts.git_commit_id_short)
    );
}

#[test]
fn each_version_lineage_restarts_at_one() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "4.8" }"#);
    let ctx = plain_context();
    assert_eq!(
        compute(repo.path(), None, &[], &ctx).unwrap().artifacts.simple_version,
        "4.8.1"
    );
    repo.commit_empty("work");
    assert_eq!(
        compute(repo.path(), None, &[], &ctx).unwrap().artifacts.simple_version,
        "4.8.2"
    );

    repo.set_version_json("", r#"{ "version": "4.9" }"#);
    assert_eq!(
        compute(repo.path(), None, &[], &ctx).unwrap().artifacts.simple_version,
        "4.9.1"
    );
    repo.commit_empty("more");
    repo.commit_empty("even more");
    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(result.artifacts.simple_version, "4.9.3");
    assert_eq!(result.artifacts.git_version_height, 3);
}

#[test]
fn nested_configuration_scopes_height_to_its_directory() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "1.0" }"#);
    repo.set_version_json("a/b", r#"{ "version": "1.1" }"#);
    std::fs::create_dir_all(repo.path().join("a/b/c")).unwrap();
    repo.commit_file("a/b/c/code.txt", "one\n", "inside scope");
    repo.commit_file("docs/readme.md", "words\n", "outside scope");
    let ctx = plain_context();

    let project = repo.path().join("a/b/c");
    let result = compute(&project, None, &[], &ctx).unwrap();
    // the 1.1 boundary commit plus the a/b/c change; the docs change is out
    // of scope
    assert_eq!(result.artifacts.major_minor_version, "1.1");
    assert_eq!(result.artifacts.git_version_height, 2);
    assert_eq!(result.config_directory.as_deref(), Some("a/b"));

    // the root project keeps counting everything under the 1.0 lineage
    let root = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(root.artifacts.major_minor_version, "1.0");
}

#[test]
fn public_release_follows_the_ref_spec() {
    let repo = TestRepo::new();
    repo.set_version_json(
        "",
        r#"{ "version": "1.0", "publicReleaseRefSpec": ["^refs/heads/release$"] }"#,
    );
    for _ in 0..4 {
        repo.commit_empty("work");
    }
    let ctx = plain_context();

    let on_main = compute(repo.path(), None, &[], &ctx).unwrap();
    assert!(!on_main.artifacts.public_release);
    assert_eq!(
        on_main.artifacts.nu_get_package_version,
        format!("1.0.5-g{}", on_main.artifacts.git_commit_id_short)
    );

    repo.git(&["checkout", "-b", "release"]);
    let on_release = compute(repo.path(), None, &[], &ctx).unwrap();
    assert!(on_release.artifacts.public_release);
    assert_eq!(on_release.artifacts.nu_get_package_version, "1.0.5");
}

#[test]
fn cloud_provided_ref_wins_over_head() {
    let repo = TestRepo::new();
    repo.set_version_json(
        "",
        r#"{ "version": "1.0", "publicReleaseRefSpec": ["^refs/heads/release$"] }"#,
    );
    // HEAD is main, but the build service says it is building release
    let ctx = BuildContext::for_testing([
        ("TF_BUILD", "True"),
        ("BUILD_SOURCEBRANCH", "refs/heads/release"),
    ]);
    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    assert!(result.artifacts.public_release);
}

#[test]
fn committish_selects_the_stamped_commit() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "3.2" }"#);
    let first = repo.head();
    repo.commit_empty("second");
    let ctx = plain_context();

    let at_first = compute(repo.path(), Some(&first), &[], &ctx).unwrap();
    assert_eq!(at_first.artifacts.git_version_height, 1);
    assert_eq!(at_first.artifacts.git_commit_id, first);

    let at_head = compute(repo.path(), Some("HEAD"), &[], &ctx).unwrap();
    assert_eq!(at_head.artifacts.git_version_height, 2);

    let by_branch = compute(repo.path(), Some("main"), &[], &ctx).unwrap();
    assert_eq!(by_branch.artifacts.git_version_height, 2);
}

#[test]
fn unknown_committish_is_an_error() {
    let repo = TestRepo::new();
    repo.commit_empty("only");
    let ctx = plain_context();
    assert!(compute(repo.path(), Some("no-such-ref"), &[], &ctx).is_err());
}

#[test]
fn determinism_across_runs() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "2.0-rc.{height}" }"#);
    repo.commit_empty("a");
    repo.commit_empty("b");
    let ctx = plain_context();

    let first = compute(repo.path(), None, &[], &ctx).unwrap();
    let second = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(first.artifacts, second.artifacts);
    assert_eq!(first.artifacts.prerelease_version, "-rc.3");
}

#[test]
fn height_cache_is_written_and_honored() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "1.5" }"#);
    repo.commit_empty("work");
    let ctx = plain_context();

    let first = compute(repo.path(), None, &[], &ctx).unwrap();
    let cache_path = repo.path().join("version.cache.json");
    assert!(cache_path.is_file());

    // a second run consumes the cache and must agree
    let second = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(first.artifacts, second.artifacts);

    // a poisoned cache for a different commit is ignored
    let stale = r#"{ "version": "1.5", "commitId": "0000000000000000000000000000000000000000", "height": 99 }"#;
    std::fs::write(&cache_path, stale).unwrap();
    let third = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(first.artifacts, third.artifacts);
}

#[test]
fn merge_height_is_max_over_parents_plus_one() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "1.0" }"#); // height 1
    repo.git(&["checkout", "-b", "side"]);
    repo.commit_empty("side 1"); // side height 2
    repo.commit_empty("side 2"); // side height 3
    repo.git(&["checkout", "main"]);
    repo.commit_empty("main 1"); // main height 2
    repo.git(&["merge", "--no-ff", "side", "-m", "merge"]);
    let ctx = plain_context();

    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    // merge = 1 + max(2, 3)
    assert_eq!(result.artifacts.git_version_height, 4);
}

#[test]
fn changing_path_filters_starts_a_new_lineage() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "1.0" }"#);
    repo.commit_empty("work");
    let ctx = plain_context();
    assert_eq!(
        compute(repo.path(), None, &[], &ctx).unwrap().artifacts.git_version_height,
        2
    );

    // same version, different filters: the height count resets
    repo.set_version_json("", r#"{ "version": "1.0", "pathFilters": ["src"] }"#);
    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(result.artifacts.git_version_height, 1);
}

#[test]
fn path_filters_skip_commits_without_terminating_the_walk() {
    let repo = TestRepo::new();
    repo.write_file("src/lib.txt", "code\n");
    repo.git(&["add", "-A"]);
    repo.set_version_json("", r#"{ "version": "1.0", "pathFilters": ["src"] }"#); // height 1
    repo.commit_file("src/lib.txt", "more code\n", "in scope"); // height 2
    repo.commit_file("docs/guide.md", "words\n", "skipped"); // still 2
    repo.commit_file("src/other.txt", "also code\n", "in scope again"); // height 3
    let ctx = plain_context();

    let result = compute(repo.path(), None, &[], &ctx).unwrap();
    assert_eq!(result.artifacts.git_version_height, 3);
}

#[test]
fn shallow_clone_surfaces_a_distinct_error() {
    let origin = TestRepo::new();
    origin.set_version_json("", r#"{ "version": "1.0" }"#);
    for i in 0..3 {
        origin.commit_file("file.txt", &format!("rev {i}\n"), &format!("c{i}"));
    }

    let clone_root = tempfile::tempdir().unwrap();
    let output = std::process::Command::new("git")
        .args([
            "clone",
            "--depth",
            "1",
            &format!("file://{}", origin.path().display()),
            "shallow",
        ])
        .current_dir(clone_root.path())
        .output()
        .expect("run git clone");
    assert!(output.status.success());

    let ctx = plain_context();
    let err = compute(&clone_root.path().join("shallow"), None, &[], &ctx).unwrap_err();
    assert!(matches!(
        err,
        gitver_core::Error::Git(git_store::Error::ShallowClone(_))
    ));
}

#[test]
fn annotated_tag_resolves_as_committish() {
    let repo = TestRepo::new();
    repo.set_version_json("", r#"{ "version": "1.0" }"#);
    repo.git(&["tag", "-a", "v1.0.1", "-m", "release"]);
    repo.commit_empty("after tag");
    let ctx = plain_context();

    let at_tag = compute(repo.path(), Some("v1.0.1"), &[], &ctx).unwrap();
    assert_eq!(at_tag.artifacts.git_version_height, 1);
}
