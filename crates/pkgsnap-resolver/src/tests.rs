use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use pkgsnap_core::{ErrorKind, LockMode, PackageId, PackageManifest};
use pkgsnap_db::{AccessMode, DatabaseLayout, InstallReason, PackageDb};
use pkgsnap_registry::ConfiguredRegistryIndex;
use pkgsnap_security::sha256_hex;

use crate::*;

#[test]
fn job_targets_match_name_or_identifier_by_glob() {
    let mut jobs = JobSet::new(JobKind::Install, JobFlags::default());
    jobs.add(MatchStyle::Glob, ["foo-1.*", "bar", "foo-1.0"])
        .expect("targets must parse");

    let targets = jobs.targets();
    assert_eq!(targets.len(), 3);
    assert!(targets[0].matches("foo", "1.4"));
    assert!(!targets[0].matches("foo", "2.0"));
    assert!(targets[1].matches("bar", "9.9"));
    assert!(!targets[1].matches("barn", "1.0"));
    assert!(targets[2].matches("foo", "1.0"));
    assert_eq!(jobs.kind(), JobKind::Install);
}

#[test]
fn exact_targets_do_not_expand_wildcards() {
    let mut jobs = JobSet::new(JobKind::Install, JobFlags::default());
    jobs.add(MatchStyle::Exact, ["foo-*"]).expect("targets must parse");
    assert!(!jobs.targets()[0].matches("foo", "1.0"));
    assert!(jobs.targets()[0].matches("foo", "*"));
}

#[test]
fn invalid_glob_target_is_a_parse_error() {
    let mut jobs = JobSet::new(JobKind::Install, JobFlags::default());
    let err = jobs
        .add(MatchStyle::Glob, ["ok-1.0", "bad-[1.0"])
        .expect_err("unterminated class must fail");
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(jobs.is_empty(), "no target is added from a rejected batch");
}

#[test]
fn selects_latest_matching_version() {
    let manifests = vec![manifest("tool", "1.2.0", ""), manifest("tool", "1.3", "")];
    let req = semver::VersionReq::parse("^1.0").expect("req should parse");
    let resolved = select_highest_compatible(&manifests, &req).expect("must resolve");
    assert_eq!(resolved.version.to_string(), "1.3");
}

#[test]
fn resolves_dependencies_before_dependents() {
    let repo = BTreeMap::from([
        ("app".to_string(), vec![manifest("app", "1.0", "[dependencies]\nlib = \"^2\"\n")]),
        (
            "lib".to_string(),
            vec![
                manifest("lib", "2.1", "[dependencies]\nzlib = \"*\"\n"),
                manifest("lib", "3.0", ""),
            ],
        ),
        ("zlib".to_string(), vec![manifest("zlib", "1.3", "")]),
    ]);

    let graph = resolve_dependency_graph_with_installed(
        &[root("app", "1.0")],
        &BTreeMap::new(),
        |name| Ok(repo.get(name).cloned().unwrap_or_default()),
    )
    .expect("graph must resolve");

    assert_eq!(graph.install_order, vec!["zlib", "lib", "app"]);
    assert_eq!(graph.manifests["lib"].version.to_string(), "2.1");
}

#[test]
fn prefers_installed_version_when_it_satisfies_constraints() {
    let repo = BTreeMap::from([
        ("app".to_string(), vec![manifest("app", "1.0", "[dependencies]\nlib = \"^2\"\n")]),
        (
            "lib".to_string(),
            vec![manifest("lib", "2.5", ""), manifest("lib", "2.1", "")],
        ),
    ]);
    let installed = BTreeMap::from([("lib".to_string(), manifest("lib", "2.1", ""))]);

    let graph = resolve_dependency_graph_with_installed(&[root("app", "1.0")], &installed, |name| {
        Ok(repo.get(name).cloned().unwrap_or_default())
    })
    .expect("graph must resolve");
    assert_eq!(graph.manifests["lib"].version.to_string(), "2.1");
}

#[test]
fn backtracks_away_from_versions_conflicting_with_installed() {
    let repo = BTreeMap::from([(
        "tool".to_string(),
        vec![
            manifest("tool", "2.0", "[conflicts]\nlegacy = \"*\"\n"),
            manifest("tool", "1.9", ""),
        ],
    )]);
    let installed = BTreeMap::from([("legacy".to_string(), manifest("legacy", "0.1", ""))]);

    let graph = resolve_dependency_graph_with_installed(
        &[RootRequirement {
            name: "tool".to_string(),
            requirement: semver::VersionReq::STAR,
        }],
        &installed,
        |name| Ok(repo.get(name).cloned().unwrap_or_default()),
    )
    .expect("older version must be chosen");
    assert_eq!(graph.manifests["tool"].version.to_string(), "1.9");

    let err = resolve_dependency_graph_with_installed(&[root("tool", "2.0")], &installed, |name| {
        Ok(repo.get(name).cloned().unwrap_or_default())
    })
    .expect_err("pinned conflicting version must fail");
    assert!(format!("{err:#}").contains("conflicts with the selected or installed packages"));
}

#[test]
fn reports_dependency_cycles() {
    let repo = BTreeMap::from([
        ("a".to_string(), vec![manifest("a", "1.0", "[dependencies]\nb = \"*\"\n")]),
        ("b".to_string(), vec![manifest("b", "1.0", "[dependencies]\na = \"*\"\n")]),
    ]);
    let err = resolve_dependency_graph_with_installed(&[root("a", "1.0")], &BTreeMap::new(), |name| {
        Ok(repo.get(name).cloned().unwrap_or_default())
    })
    .expect_err("cycle must fail");
    assert!(err.to_string().contains("dependency cycle detected involving: a, b"));
}

#[test]
fn plan_fingerprint_ignores_generation_but_not_actions() {
    let action = PlannedAction {
        kind: ActionKind::Install,
        manifest: manifest("foo", "1.0", ""),
        source: "local".to_string(),
        reason: InstallReason::Root,
    };
    let first = Plan {
        actions: vec![action.clone()],
        checked: 1,
        base_generation: 3,
    };
    let second = Plan {
        base_generation: 4,
        ..first.clone()
    };
    assert_eq!(first.fingerprint(), second.fingerprint());

    let mut upgraded = first.clone();
    upgraded.actions[0].kind = ActionKind::Upgrade {
        from: pkgsnap_core::PackageVersion::parse("0.9").expect("version"),
    };
    assert_ne!(first.fingerprint(), upgraded.fingerprint());
    assert_eq!(upgraded.actions[0].to_string(), "Upgrading foo: 0.9 -> 1.0");
    assert_eq!(action.to_string(), "Installing foo-1.0");
}

#[test]
fn plan_fingerprint_tracks_every_manifest_field() {
    let plan_for = |extra: &str| Plan {
        actions: vec![PlannedAction {
            kind: ActionKind::Install,
            manifest: manifest("foo", "1.0", extra),
            source: "local".to_string(),
            reason: InstallReason::Root,
        }],
        checked: 1,
        base_generation: 0,
    };
    let plain = plan_for("");

    let republished = [
        "message = \"restart the daemon\"\n",
        "license = \"MIT\"\n",
        "[dependencies]\nlib = \"^1\"\n",
        "[conflicts]\nfoo-legacy = \"*\"\n",
        "[artifact]\npath = \"files/foo.bin\"\n",
    ];
    for extra in republished {
        let changed = plan_for(extra);
        assert_ne!(changed.actions, plain.actions);
        assert_ne!(
            plain.fingerprint(),
            changed.fingerprint(),
            "fingerprint must change for: {extra}"
        );
    }
    assert_eq!(plain.fingerprint(), plan_for("").fingerprint());

    let mut as_dependency = plan_for("");
    as_dependency.actions[0].reason = InstallReason::Dependency;
    assert_ne!(plain.fingerprint(), as_dependency.fingerprint());
}

#[test]
fn solve_reports_no_actions_when_everything_is_installed() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    env.publish("bar", "2.3", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        apply_targets(&mut solver, &db, &lock, &["foo-1.0", "bar-2.3"]);

        let plan = solver
            .solve(&db, &lock, &jobs(&["foo-1.0", "bar-2.3"], true))
            .expect("must solve");
        assert!(plan.is_empty());
        assert_eq!(plan.checked, 2);
    }
    db.close().expect("must close");
}

#[test]
fn solve_orders_dependencies_and_marks_reasons() {
    let env = TestEnv::new();
    env.publish("app", "1.0", "[dependencies]\nlib = \"^1\"\n");
    env.publish("lib", "1.4", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::ReadOnly).expect("must lock");
        let plan = solver
            .solve(&db, &lock, &jobs(&["app-1.0"], true))
            .expect("must solve");
        let summary: Vec<(String, InstallReason)> = plan
            .actions
            .iter()
            .map(|action| (action.to_string(), action.reason))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Installing lib-1.4".to_string(), InstallReason::Dependency),
                ("Installing app-1.0".to_string(), InstallReason::Root),
            ]
        );
        assert_eq!(plan.checked, 2);
        assert_eq!(plan.base_generation, 0);
    }
    db.close().expect("must close");
}

#[test]
fn version_test_accepts_newer_installed_versions() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    env.publish("foo", "1.2", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        apply_targets(&mut solver, &db, &lock, &["foo-1.2"]);

        let plan = solver
            .solve(&db, &lock, &jobs(&["foo-1.0"], true))
            .expect("must solve");
        assert!(plan.is_empty(), "newer installed version satisfies the target");

        let plan = solver
            .solve(&db, &lock, &jobs(&["foo-1.0"], false))
            .expect("must solve");
        assert_eq!(plan.action_count(), 1);
        assert_eq!(plan.actions[0].to_string(), "Downgrading foo: 1.2 -> 1.0");
    }
    db.close().expect("must close");
}

#[test]
fn unmatched_targets_are_unsatisfiable() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::ReadOnly).expect("must lock");
        let err = solver
            .solve(&db, &lock, &jobs(&["foo-1.0", "ghost-0.1"], true))
            .expect_err("unknown target must fail");
        assert_eq!(err.kind(), ErrorKind::UnsatisfiableTargets);
        assert!(err.to_string().contains("ghost-0.1"));
    }
    db.close().expect("must close");
}

#[test]
fn installed_packages_missing_from_repository_stay_satisfied() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        apply_targets(&mut solver, &db, &lock, &["foo-1.0"]);
        fs::remove_dir_all(env.repo.join("index").join("foo")).expect("must unpublish");

        let plan = solver
            .solve(&db, &lock, &jobs(&["foo-1.0"], true))
            .expect("installed target needs nothing");
        assert!(plan.is_empty());
    }
    db.close().expect("must close");
}

#[test]
fn apply_stages_verified_artifacts_and_records_installs() {
    let env = TestEnv::new();
    let payload = b"tool payload";
    env.write_repo_file("files/tool.bin", payload);
    env.publish(
        "tool",
        "1.0",
        &format!(
            "message = \"tool is ready\"\n[artifact]\npath = \"files/tool.bin\"\nsha256 = \"{}\"\n",
            sha256_hex(payload)
        ),
    );
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        let plan = solver
            .solve(&db, &lock, &jobs(&["tool-1.0"], true))
            .expect("must solve");
        let report = solver.apply(&db, &lock, &plan).expect("must apply");

        assert_eq!(report.installed, vec![PackageId::from("tool-1.0")]);
        assert_eq!(report.messages, vec!["tool is ready".to_string()]);
        assert!(env.layout.artifact_cache_dir("tool", "1.0").join("tool.bin").is_file());
        assert_eq!(
            fs::read(env.layout.package_dir("tool", "1.0").join("tool.bin")).expect("installed"),
            payload
        );

        let record = db
            .installed_record(&lock, "tool")
            .expect("must query")
            .expect("record must exist");
        assert_eq!(record.artifact_sha256, Some(sha256_hex(payload)));
        assert_eq!(record.source.as_deref(), Some("local"));
        assert_eq!(db.generation(&lock).expect("generation"), 1);
    }
    db.close().expect("must close");
}

#[test]
fn apply_records_streamed_digest_of_unpinned_artifact() {
    let env = TestEnv::new();
    let payload = vec![0x5a_u8; 200 * 1024];
    env.write_repo_file("files/big.bin", &payload);
    env.publish("big", "2.0", "[artifact]\npath = \"files/big.bin\"\n");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        apply_targets(&mut solver, &db, &lock, &["big-2.0"]);

        let record = db
            .installed_record(&lock, "big")
            .expect("must query")
            .expect("record must exist");
        assert_eq!(record.artifact_sha256, Some(sha256_hex(&payload)));
    }
    db.close().expect("must close");
}

#[test]
fn apply_rejects_checksum_mismatch() {
    let env = TestEnv::new();
    env.write_repo_file("files/tool.bin", b"tampered");
    env.publish(
        "tool",
        "1.0",
        &format!(
            "[artifact]\npath = \"files/tool.bin\"\nsha256 = \"{}\"\n",
            sha256_hex(b"original")
        ),
    );
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        let plan = solver
            .solve(&db, &lock, &jobs(&["tool-1.0"], true))
            .expect("must solve");
        let err = solver.apply(&db, &lock, &plan).expect_err("must reject");
        assert_eq!(err.kind(), ErrorKind::ApplyFailed);
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(db.installed_record(&lock, "tool").expect("must query").is_none());
    }
    db.close().expect("must close");
}

#[test]
fn apply_detects_database_changes_as_conflict() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    env.publish("bar", "1.0", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        let plan = solver
            .solve(&db, &lock, &jobs(&["foo-1.0"], true))
            .expect("must solve");
        apply_targets(&mut solver, &db, &lock, &["bar-1.0"]);

        let err = solver.apply(&db, &lock, &plan).expect_err("stale plan");
        assert_eq!(err.kind(), ErrorKind::ApplyConflict);
        assert!(err.kind().is_recoverable());
        assert!(db.installed_record(&lock, "foo").expect("must query").is_none());
    }
    db.close().expect("must close");
}

#[test]
fn apply_detects_repository_changes_as_conflict() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        let plan = solver
            .solve(&db, &lock, &jobs(&["foo-1.0"], true))
            .expect("must solve");
        env.publish("foo", "1.0", "message = \"republished\"\n");

        let err = solver.apply(&db, &lock, &plan).expect_err("stale plan");
        assert_eq!(err.kind(), ErrorKind::ApplyConflict);

        let fresh = solver
            .solve(&db, &lock, &jobs(&["foo-1.0"], true))
            .expect("must solve again");
        assert_eq!(fresh.base_generation, plan.base_generation);
        assert_ne!(fresh.fingerprint(), plan.fingerprint());
        let report = solver.apply(&db, &lock, &fresh).expect("fresh plan applies");
        assert_eq!(report.messages, vec!["republished"]);
    }
    db.close().expect("must close");
}

#[test]
fn apply_requires_exclusive_lock() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::ReadOnly).expect("must lock");
        let plan = solver
            .solve(&db, &lock, &jobs(&["foo-1.0"], true))
            .expect("must solve");
        let err = solver.apply(&db, &lock, &plan).expect_err("read-only lock");
        assert_eq!(err.kind(), ErrorKind::LockBusy);
    }
    db.close().expect("must close");
}

#[test]
fn upgrade_replaces_previous_package_directory() {
    let env = TestEnv::new();
    env.publish("foo", "1.0", "");
    let mut solver = env.solver();
    let db = env.open_db();
    {
        let lock = db.lock(LockMode::Exclusive).expect("must lock");
        apply_targets(&mut solver, &db, &lock, &["foo-1.0"]);
        assert!(env.layout.package_dir("foo", "1.0").is_dir());

        env.publish("foo", "1.1", "");
        apply_targets(&mut solver, &db, &lock, &["foo-1.1"]);
        assert!(!env.layout.package_dir("foo", "1.0").exists());
        assert!(env.layout.package_dir("foo", "1.1").is_dir());
        assert_eq!(
            db.installed_record(&lock, "foo")
                .expect("must query")
                .map(|record| record.version),
            Some("1.1".to_string())
        );
    }
    db.close().expect("must close");
}

struct TestEnv {
    base: PathBuf,
    repo: PathBuf,
    layout: DatabaseLayout,
}

impl TestEnv {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let mut base = std::env::temp_dir();
        base.push(format!(
            "pkgsnap-resolver-tests-{}-{}-{}",
            std::process::id(),
            nanos,
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        Self {
            repo: base.join("repo"),
            layout: DatabaseLayout::new(base.join("root")),
            base,
        }
    }

    fn publish(&self, name: &str, version: &str, extra: &str) {
        let dir = self.repo.join("index").join(name);
        fs::create_dir_all(&dir).expect("must create package dir");
        fs::write(
            dir.join(format!("{version}.toml")),
            format!("name = \"{name}\"\nversion = \"{version}\"\n{extra}"),
        )
        .expect("must write manifest");
    }

    fn write_repo_file(&self, relative: &str, bytes: &[u8]) {
        let path = self.repo.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("must create parent");
        }
        fs::write(path, bytes).expect("must write repository file");
    }

    fn solver(&self) -> RepositorySolver {
        RepositorySolver::new(ConfiguredRegistryIndex::single("local", &self.repo))
    }

    fn open_db(&self) -> PackageDb {
        PackageDb::open(self.layout.clone(), AccessMode::ReadWrite).expect("must open database")
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.base);
    }
}

fn apply_targets(
    solver: &mut RepositorySolver,
    db: &PackageDb,
    lock: &pkgsnap_db::DbLock<'_>,
    targets: &[&str],
) {
    let plan = solver
        .solve(db, lock, &jobs(targets, true))
        .expect("setup solve");
    solver.apply(db, lock, &plan).expect("setup apply");
}

fn jobs(targets: &[&str], version_test: bool) -> JobSet {
    let mut jobs = JobSet::new(
        JobKind::Install,
        JobFlags {
            dry_run: false,
            version_test,
        },
    );
    jobs.add(MatchStyle::Glob, targets).expect("targets must parse");
    jobs
}

fn root(name: &str, version: &str) -> RootRequirement {
    RootRequirement {
        name: name.to_string(),
        requirement: pkgsnap_core::PackageVersion::parse(version)
            .expect("version")
            .exact_requirement(),
    }
}

fn manifest(name: &str, version: &str, extra: &str) -> PackageManifest {
    PackageManifest::from_toml_str(&format!(
        "name = \"{name}\"\nversion = \"{version}\"\n{extra}"
    ))
    .expect("manifest must parse")
}
