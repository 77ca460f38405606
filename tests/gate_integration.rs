// ABOUTME: Integration tests for the access gate.
// ABOUTME: End-to-end file checks, whitelist/rejection lifecycle, persistence, and concurrent access.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use callgate::admin::{AdminAdapter, AdminPrincipals, CallerContext};
use callgate::config::{Config, GateConfig};
use callgate::gate::{
    AdminGate, CallContext, CallableSubject, PathRuleSet, RejectionPersistence, RuleSpec,
    WHITELIST_FILE,
};

fn gate_config(dir: &Path, rejections: RejectionPersistence) -> GateConfig {
    GateConfig {
        secrets_dir: dir.to_path_buf(),
        rejections,
    }
}

/// Stands in for a deserialized remote callable carrying a foreign type name.
struct RemoteCallable(String);

impl CallableSubject for RemoteCallable {
    fn type_name(&self) -> &str {
        &self.0
    }
}

/// No rules installed: every file access falls through to the default deny.
#[test]
fn empty_rule_set_denies_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let gate = AdminGate::new(&gate_config(dir.path(), RejectionPersistence::Memory));
    assert!(!gate.check_file_access("read", "/x"));
}

/// A narrow deny before a catch-all allow carves out an exception.
#[test]
fn deny_exception_before_catch_all_allow() {
    let dir = tempfile::tempdir().unwrap();
    let toml_str = format!(
        r#"
[gate]
secrets_dir = "{}"

[[rules]]
op = "read"
path = "/secrets/.*"
allow = false

[[rules]]
op = "*"
path = ".*"
allow = true
"#,
        dir.path().display()
    );
    let config: Config = toml::from_str(&toml_str).unwrap();
    let gate = AdminGate::from_config(&config).unwrap();

    assert!(!gate.check_file_access("read", "/secrets/k"));
    assert!(gate.check_file_access("write", "/tmp/a"));
    // Only reads are excluded from /secrets.
    assert!(gate.check_file_access("write", "/secrets/k"));
}

/// A path reached through a symlink is matched by its literal text, not its target.
#[cfg(unix)]
#[test]
fn paths_are_matched_without_canonicalization() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("real");
    let link = dir.path().join("link");
    fs::create_dir(&real).unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();
    fs::write(real.join("file.txt"), "data").unwrap();

    let pattern = format!("{}/.*", regex::escape(&real.to_string_lossy()));
    let rules = PathRuleSet::from_specs(&[RuleSpec::new("read", &pattern, true)]).unwrap();
    let gate = AdminGate::with_rules(
        &gate_config(dir.path(), RejectionPersistence::Memory),
        rules,
    );

    let via_real = real.join("file.txt");
    let via_link = link.join("file.txt");
    assert_eq!(
        fs::canonicalize(&via_real).unwrap(),
        fs::canonicalize(&via_link).unwrap()
    );
    assert!(gate.check_file_access("read", &via_real));
    assert!(!gate.check_file_access("read", &via_link));
}

/// Unknown → Rejected → Whitelisted for a single callable type.
#[test]
fn rejected_callable_approved_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let gate = AdminGate::new(&gate_config(dir.path(), RejectionPersistence::Memory));
    let subject = RemoteCallable("evil.Callable".to_string());
    let ctx = CallContext::new("agent-7");

    assert!(!gate.is_whitelisted(&subject, &ctx));
    assert_eq!(gate.rejections().get(), vec!["evil.Callable"]);

    gate.approve("evil.Callable").unwrap();

    assert!(gate.is_whitelisted(&subject, &ctx));
    assert!(gate.rejections().get().is_empty());
}

/// Approving everything pending whitelists each type and empties the review list.
#[test]
fn approve_all_then_again_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(AdminGate::new(&gate_config(
        dir.path(),
        RejectionPersistence::Memory,
    )));
    let admin = AdminAdapter::new(
        Arc::clone(&gate),
        AdminPrincipals::new(vec!["root".to_string()]),
    );
    let root = CallerContext::new("root");
    let ctx = CallContext::default();

    gate.is_name_whitelisted("a.First", &ctx);
    gate.is_name_whitelisted("b.Second", &ctx);

    assert_eq!(admin.approve_all(&root).unwrap().len(), 2);
    assert!(gate.is_name_whitelisted("a.First", &ctx));
    assert!(gate.is_name_whitelisted("b.Second", &ctx));
    let on_disk = fs::read_to_string(dir.path().join(WHITELIST_FILE)).unwrap();

    assert!(admin.approve_all(&root).unwrap().is_empty());
    assert_eq!(
        fs::read_to_string(dir.path().join(WHITELIST_FILE)).unwrap(),
        on_disk
    );
}

/// Appending the same name twice is harmless.
#[test]
fn duplicate_approvals_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let gate = AdminGate::new(&gate_config(dir.path(), RejectionPersistence::Memory));
    gate.approve("dup.Name").unwrap();
    gate.approve("dup.Name").unwrap();

    assert!(gate.is_name_whitelisted("dup.Name", &CallContext::default()));
    assert_eq!(gate.whitelist().entries(), vec!["dup.Name"]);
}

/// Whitelist and, in file mode, pending rejections survive a restart.
#[test]
fn state_survives_restart_in_file_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = gate_config(dir.path(), RejectionPersistence::File);
    {
        let gate = AdminGate::new(&config);
        gate.approve("kept.Approved").unwrap();
        gate.is_name_whitelisted("still.Pending", &CallContext::default());
    }

    let gate = AdminGate::new(&config);
    assert!(gate.is_name_whitelisted("kept.Approved", &CallContext::default()));
    assert_eq!(gate.rejections().get(), vec!["still.Pending"]);
}

/// Memory mode forgets rejections across restarts but keeps the whitelist.
#[test]
fn memory_mode_forgets_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let config = gate_config(dir.path(), RejectionPersistence::Memory);
    {
        let gate = AdminGate::new(&config);
        gate.is_name_whitelisted("once.Pending", &CallContext::default());
    }

    let gate = AdminGate::new(&config);
    assert!(gate.rejections().get().is_empty());
}

/// Each gatectl command is a separate process: a rejection recorded by one
/// gate must be visible to the next one built from the same config.
#[test]
fn cli_flow_spans_separate_gates() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        gate: gate_config(dir.path(), RejectionPersistence::Memory),
        admin: callgate::config::AdminConfig {
            principals: vec!["root".to_string()],
        },
        ..Config::default()
    }
    .with_durable_rejections();
    let root = CallerContext::new("root");
    let ctx = CallContext::new("gatectl");

    // check-callable
    {
        let gate = AdminGate::from_config(&config).unwrap();
        assert!(!gate.is_name_whitelisted("evil.Callable", &ctx));
    }

    // pending
    {
        let gate = Arc::new(AdminGate::from_config(&config).unwrap());
        let admin = AdminAdapter::new(gate, AdminPrincipals::from(&config.admin));
        let pending = admin.pending(&root).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "evil.Callable");
    }

    // approve-all
    {
        let gate = Arc::new(AdminGate::from_config(&config).unwrap());
        let admin = AdminAdapter::new(gate, AdminPrincipals::from(&config.admin));
        assert_eq!(admin.approve_all(&root).unwrap(), vec!["evil.Callable"]);
    }

    // check-callable again
    let gate = AdminGate::from_config(&config).unwrap();
    assert!(gate.is_name_whitelisted("evil.Callable", &ctx));
    assert!(gate.rejections().get().is_empty());
}

/// Readers racing a stream of replaces see either the whole old or the whole new file.
#[test]
fn replace_is_atomic_for_concurrent_readers() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(AdminGate::new(&gate_config(
        dir.path(),
        RejectionPersistence::Memory,
    )));

    let old: String = (0..5000).map(|i| format!("old.Type{i}\n")).collect();
    let new: String = (0..5000).map(|i| format!("new.Type{i}\n")).collect();
    gate.replace_whitelist(&old).unwrap();
    let path = gate.whitelist().path().to_path_buf();

    let writer = {
        let gate = Arc::clone(&gate);
        let (old, new) = (old.clone(), new.clone());
        thread::spawn(move || {
            for round in 0..100 {
                let text = if round % 2 == 0 { &new } else { &old };
                gate.replace_whitelist(text).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let path = path.clone();
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                for _ in 0..200 {
                    let on_disk = fs::read_to_string(&path).unwrap();
                    assert!(on_disk == old || on_disk == new, "torn file read");

                    let in_memory = gate.whitelist().text();
                    assert!(in_memory == old || in_memory == new, "torn snapshot");

                    let entries = gate.whitelist().entries();
                    let all_old = entries.iter().all(|e| e.starts_with("old."));
                    let all_new = entries.iter().all(|e| e.starts_with("new."));
                    assert!(all_old || all_new, "mixed entries");
                    assert_eq!(entries.len(), 5000);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

/// Many threads rejecting the same few types record each exactly once.
#[test]
fn concurrent_rejections_are_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(AdminGate::new(&gate_config(
        dir.path(),
        RejectionPersistence::File,
    )));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let ctx = CallContext::new(format!("peer-{worker}"));
                for i in 0..50 {
                    let name = format!("remote.Type{}", i % 5);
                    assert!(!gate.is_name_whitelisted(&name, &ctx));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let pending = gate.rejections().pending();
    assert_eq!(pending.len(), 5);
    assert_eq!(pending.iter().map(|r| r.attempts).sum::<u64>(), 400);

    let mirror = fs::read_to_string(dir.path().join("rejected-callables.txt")).unwrap();
    assert_eq!(mirror.lines().count(), 5);
}

/// Swapping rules while checks run never yields an answer from a half-built set.
#[test]
fn rule_swaps_are_seen_whole() {
    let dir = tempfile::tempdir().unwrap();
    let allow_all = || PathRuleSet::from_specs(&[RuleSpec::new("*", ".*", true)]).unwrap();
    let deny_then_allow = || {
        PathRuleSet::from_specs(&[
            RuleSpec::new("*", "/data/.*", false),
            RuleSpec::new("*", ".*", true),
        ])
        .unwrap()
    };
    let gate = Arc::new(AdminGate::with_rules(
        &gate_config(dir.path(), RejectionPersistence::Memory),
        allow_all(),
    ));

    let swapper = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            for round in 0..200 {
                if round % 2 == 0 {
                    gate.install_rules(deny_then_allow());
                } else {
                    gate.install_rules(allow_all());
                }
            }
        })
    };

    for _ in 0..2000 {
        // /tmp is allowed by both snapshots.
        assert!(gate.check_file_access("read", "/tmp/x"));
        let rules = gate.rules();
        assert!(rules.len() == 1 || rules.len() == 2);
    }
    swapper.join().unwrap();
}
