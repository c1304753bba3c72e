//! Loading log setup files from disk.

use ptail_config::{ColorName, ColorToken, ConfigError, LogSetup};
use std::fs;
use tempfile::TempDir;

#[test]
fn load_missing_file_yields_empty_setup() {
    let dir = TempDir::new().expect("create temp dir");
    let setup = LogSetup::load(&dir.path().join("ptail.yaml")).expect("missing file is fine");
    assert!(setup.is_empty());
    assert!(setup.source().is_none());
}

#[test]
fn load_real_file_keeps_order_and_source() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("ptail.yaml");
    fs::write(
        &path,
        r#"
zookeeper:
  color: grey_on_yellow
  format: '^(?P<date>\S+ \S+) \[(?P<thread>[^\]]*)\] (?P<level>\w+) (?P<text>.*)$'
  label: zk
'\.out$':
  label: stdout
"#,
    )
    .expect("write setup");

    let setup = LogSetup::load(&path).expect("load setup");
    assert_eq!(setup.rules().len(), 2);
    assert_eq!(setup.source(), Some(path.as_path()));

    let zk = setup.first_match("/var/log/zookeeper/zookeeper.log").expect("zk rule");
    assert_eq!(
        zk.color,
        Some(ColorToken::on(ColorName::Grey, ColorName::Yellow))
    );
    assert_eq!(zk.label.as_deref(), Some("zk"));
    let names: Vec<_> = zk
        .format
        .as_ref()
        .expect("format")
        .capture_names()
        .flatten()
        .collect();
    assert_eq!(names, vec!["date", "thread", "level", "text"]);

    let out = setup.first_match("/opt/app/nohup.out").expect("out rule");
    assert_eq!(out.label.as_deref(), Some("stdout"));
}

#[test]
fn load_malformed_file_is_fatal() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("ptail.yaml");
    fs::write(&path, "kafka:\n  format: '(no-named-groups)'\n").expect("write setup");

    let err = LogSetup::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidFormat { .. }), "{err}");
}
