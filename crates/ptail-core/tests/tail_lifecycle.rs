//! End-to-end discovery and tailing against a scripted probe.
//!
//! Real files in a temp dir, fake processes from [`MockProbe`].

use ptail_config::LogSetup;
use ptail_core::collect::{FileType, LogDiscovery, ProcessNamer, Selector, DEFAULT_LOG_FILTER};
use ptail_core::color::{emphasize, render, PALETTE};
use ptail_core::log_meta::LogMetadataResolver;
use ptail_core::mock_probe::MockProbe;
use ptail_core::tail::{FilterSet, LineRules, TailOptions, TailOrchestrator};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;

const APP_SETUP: &str = r#"
app:
  color: red
  format: '^(?P<id>\d+) (?P<text>.*)$'
  label: app
"#;

struct Logs {
    dir: TempDir,
}

impl Logs {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Create an empty file and return its path.
    fn create(&self, name: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, "").unwrap();
        path.to_string_lossy().into_owned()
    }

    fn append(&self, path: &str, text: &str) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }
}

fn discovery(probe: MockProbe, setup: LogSetup) -> LogDiscovery<MockProbe> {
    LogDiscovery::new(
        probe,
        LogMetadataResolver::new(setup),
        Regex::new(DEFAULT_LOG_FILTER).unwrap(),
    )
}

fn orchestrator(probe: MockProbe, setup: LogSetup) -> TailOrchestrator<MockProbe, Vec<u8>> {
    TailOrchestrator::new(
        discovery(probe, setup),
        Selector::Name("myapp".into()),
        TailOptions {
            refresh_interval: Duration::ZERO,
            ..TailOptions::default()
        },
        Vec::new(),
    )
}

fn take(o: &mut TailOrchestrator<MockProbe, Vec<u8>>) -> String {
    String::from_utf8(std::mem::take(o.output_mut())).unwrap()
}

fn open_set(o: &TailOrchestrator<MockProbe, Vec<u8>>) -> BTreeSet<String> {
    o.open_paths().map(str::to_string).collect()
}

mod discovery_cycles {
    use super::*;

    #[test]
    fn binary_sibling_is_excluded() {
        let probe = MockProbe::new()
            .with_process(100, "myapp --serve")
            .with_process(200, "unrelated")
            .with_open_file(100, "/var/log/myapp.log")
            .with_open_file(100, "/var/log/myapp.dat")
            .with_open_file(200, "/var/log/other.log")
            .with_file_type("/var/log/myapp.log", FileType::Text)
            .with_file_type("/var/log/myapp.dat", FileType::Binary)
            .with_file_type("/var/log/other.log", FileType::Text);
        let mut d = discovery(probe, LogSetup::empty());

        let logs = d.discover(&Selector::Name("myapp".into()));
        assert_eq!(logs.len(), 1);
        let log = &logs["/var/log/myapp.log"];
        assert_eq!(log.command_short, "myapp");
        assert_eq!(log.label, "myapp.log");
        assert_eq!(log.processes.len(), 1);
        assert_eq!(log.processes[0].pid, 100);
    }

    #[test]
    fn settled_types_are_probed_once() {
        let probe = MockProbe::new()
            .with_process(1, "myapp")
            .with_open_file(1, "/logs/a.log")
            .with_open_file(1, "/logs/b.out")
            .with_file_type("/logs/a.log", FileType::Text)
            .with_file_type("/logs/b.out", FileType::Binary);
        let mut d = discovery(probe.clone(), LogSetup::empty());

        for _ in 0..4 {
            d.discover(&Selector::Pids(vec![1]));
        }
        assert_eq!(probe.file_type_calls("/logs/a.log"), 1);
        assert_eq!(probe.file_type_calls("/logs/b.out"), 1);
    }

    #[test]
    fn empty_file_is_reprobed_until_it_has_content() {
        let probe = MockProbe::new()
            .with_process(1, "myapp")
            .with_open_file(1, "/logs/late.log")
            .with_file_type("/logs/late.log", FileType::Empty);
        let mut d = discovery(probe.clone(), LogSetup::empty());
        let selector = Selector::Pids(vec![1]);

        assert!(d.discover(&selector).is_empty());
        assert!(d.discover(&selector).is_empty());
        assert_eq!(probe.file_type_calls("/logs/late.log"), 2);

        probe.set_file_type("/logs/late.log", FileType::Text);
        assert_eq!(d.discover(&selector).len(), 1);
        d.discover(&selector);
        assert_eq!(probe.file_type_calls("/logs/late.log"), 3);
    }

    #[test]
    fn shared_log_names_process_count() {
        let probe = MockProbe::new()
            .with_process(1, "myapp worker")
            .with_process(2, "myapp worker")
            .with_open_file(1, "/logs/shared.log")
            .with_open_file(2, "/logs/shared.log")
            .with_file_type("/logs/shared.log", FileType::Text);
        let mut d = discovery(probe, LogSetup::empty());
        let logs = d.discover(&Selector::Name("myapp".into()));
        assert_eq!(logs["/logs/shared.log"].command_short, "[proc: 2]");
    }

    #[test]
    fn java_processes_are_named_by_main_class() {
        let probe = MockProbe::new()
            .with_process(
                7,
                "/usr/bin/java -Xmx1g -cp /opt/hive.jar org.apache.hive.service.server.HiveServer2",
            )
            .with_open_file(7, "/logs/hs2.log")
            .with_file_type("/logs/hs2.log", FileType::Text);
        let mut d = discovery(probe.clone(), LogSetup::empty());
        let logs = d.discover(&Selector::Pids(vec![7]));
        assert_eq!(logs["/logs/hs2.log"].command_short, "HiveServer2");

        let mut plain = discovery(probe, LogSetup::empty()).with_namer(ProcessNamer::new());
        let logs = plain.discover(&Selector::Pids(vec![7]));
        assert_eq!(logs["/logs/hs2.log"].command_short, "java");
    }

    #[test]
    fn palette_colors_wrap_after_eleven_logs() {
        let mut probe = MockProbe::new().with_process(1, "myapp");
        for i in 0..12 {
            let path = format!("/logs/log{:02}.log", i);
            probe = probe
                .with_open_file(1, &path)
                .with_file_type(&path, FileType::Text);
        }
        let mut d = discovery(probe, LogSetup::empty());
        let logs = d.discover(&Selector::Pids(vec![1]));

        let colors: Vec<_> = logs.values().map(|l| l.color).collect();
        assert_eq!(colors.len(), 12);
        assert_eq!(&colors[..11], &PALETTE[..]);
        assert_eq!(colors[11], PALETTE[0]);
    }

    #[test]
    fn failed_listing_discovers_nothing() {
        let probe = MockProbe::new()
            .with_process(1, "myapp")
            .with_open_file(1, "/logs/a.log")
            .with_file_type("/logs/a.log", FileType::Text);
        probe.set_fail_listing(true);
        let mut d = discovery(probe.clone(), LogSetup::empty());
        assert!(d.discover(&Selector::Pids(vec![1])).is_empty());

        probe.set_fail_listing(false);
        assert_eq!(d.discover(&Selector::Pids(vec![1])).len(), 1);
    }
}

mod open_set {
    use super::*;

    #[test]
    fn open_set_tracks_discovery_minus_bad_logs() {
        let logs = Logs::new();
        let a = logs.create("a.log");
        let b = logs.create("b.log");
        let c = logs.create("c.log");
        let ghost = logs.dir.path().join("ghost.log").to_string_lossy().into_owned();

        let probe = MockProbe::new().with_process(1, "myapp");
        for path in [&a, &b, &ghost] {
            probe.add_open_file(1, path);
            probe.set_file_type(path, FileType::Text);
        }
        probe.set_file_type(&c, FileType::Text);

        let mut o = orchestrator(probe.clone(), LogSetup::empty());
        o.tail(&LineRules::default()).unwrap();
        assert_eq!(open_set(&o), BTreeSet::from([a.clone(), b.clone()]));
        assert!(o.bad_logs().contains(&ghost));

        // next cycle: a goes away, c appears, ghost is still reported
        probe.close_file(1, &a);
        probe.add_open_file(1, &c);
        take(&mut o);
        o.tail(&LineRules::default()).unwrap();
        assert_eq!(open_set(&o), BTreeSet::from([b.clone(), c.clone()]));

        // ghost now exists but stays bad
        std::fs::write(&ghost, "late\n").unwrap();
        o.tail(&LineRules::default()).unwrap();
        assert!(!open_set(&o).contains(&ghost));

        let out = take(&mut o);
        assert_eq!(out.matches(&format!("Unfollowing log file: {}", a)).count(), 1);
        assert_eq!(out.matches(&format!("Following log file: {}", c)).count(), 1);
        assert!(!out.contains(&format!("Following log file: {}", ghost)));
    }

    #[test]
    fn dead_process_closes_its_logs_once() {
        let logs = Logs::new();
        let a = logs.create("a.log");
        let probe = MockProbe::new()
            .with_process(1, "myapp")
            .with_open_file(1, &a)
            .with_file_type(&a, FileType::Text);

        let mut o = orchestrator(probe.clone(), LogSetup::empty());
        o.tail(&LineRules::default()).unwrap();
        probe.kill(1);
        o.tail(&LineRules::default()).unwrap();
        o.tail(&LineRules::default()).unwrap();
        o.shutdown().unwrap();

        assert_eq!(o.open_paths().count(), 0);
        assert_eq!(take(&mut o).matches("Unfollowing log file").count(), 1);
    }
}

mod lines {
    use super::*;

    fn app_log() -> (Logs, String, MockProbe) {
        let logs = Logs::new();
        let path = logs.create("app.log");
        let probe = MockProbe::new()
            .with_process(1, "myapp")
            .with_open_file(1, &path)
            .with_file_type(&path, FileType::Text);
        (logs, path, probe)
    }

    fn label() -> String {
        render("[app]", "red".parse().unwrap())
    }

    #[test]
    fn continuation_joins_into_one_logical_line() {
        let (logs, path, probe) = app_log();
        let mut o = orchestrator(probe, LogSetup::from_yaml_str(APP_SETUP).unwrap());
        o.tail(&LineRules::default()).unwrap();
        take(&mut o);

        logs.append(&path, "1 hello\nstack trace continued\n");
        assert_eq!(o.tail(&LineRules::default()).unwrap(), 0);
        assert_eq!(o.tail(&LineRules::default()).unwrap(), 1);
        assert_eq!(
            take(&mut o),
            format!("{} 1 hello\nstack trace continued\n", label())
        );
    }

    #[test]
    fn next_record_flushes_previous_one() {
        let (logs, path, probe) = app_log();
        let mut o = orchestrator(probe, LogSetup::from_yaml_str(APP_SETUP).unwrap());
        o.tail(&LineRules::default()).unwrap();
        take(&mut o);

        logs.append(&path, "1 first\n\tat Foo.bar\n2 second\n");
        assert_eq!(o.tail(&LineRules::default()).unwrap(), 1);
        assert_eq!(take(&mut o), format!("{} 1 first\n\tat Foo.bar\n", label()));

        o.shutdown().unwrap();
        assert!(take(&mut o).starts_with(&format!("{} 2 second\n", label())));
    }

    #[test]
    fn filters_fail_closed() {
        let (logs, path, probe) = app_log();
        let mut o = orchestrator(probe, LogSetup::from_yaml_str(APP_SETUP).unwrap());
        o.tail(&LineRules::default()).unwrap();
        take(&mut o);

        let by_id = LineRules::new(FilterSet::new().with("id", Regex::new("^7$").unwrap()), None);
        let by_other = LineRules::new(FilterSet::new().with("level", Regex::new("ERROR").unwrap()), None);

        logs.append(&path, "7 keep\n8 drop\n");
        o.tail(&by_id).unwrap();
        o.tail(&by_id).unwrap();
        let out = take(&mut o);
        assert!(out.contains("7 keep"));
        assert!(!out.contains("8 drop"));

        logs.append(&path, "7 no shared column\n");
        o.tail(&by_other).unwrap();
        o.tail(&by_other).unwrap();
        assert!(take(&mut o).is_empty());
    }

    #[test]
    fn highlight_marks_matches_only() {
        let (logs, path, probe) = app_log();
        let mut o = orchestrator(probe, LogSetup::from_yaml_str(APP_SETUP).unwrap());
        o.tail(&LineRules::default()).unwrap();
        take(&mut o);

        let rules = LineRules::new(FilterSet::new(), Some(Regex::new("BAD").unwrap()));
        logs.append(&path, "1 foo BAD bar\n");
        o.tail(&rules).unwrap();
        o.tail(&rules).unwrap();
        assert_eq!(
            take(&mut o),
            format!("{} 1 foo {} bar\n", label(), emphasize("BAD"))
        );
    }

    #[test]
    fn from_top_replays_existing_content() {
        let (logs, path, probe) = app_log();
        logs.append(&path, "1 before start\n");
        let mut o = TailOrchestrator::new(
            discovery(probe, LogSetup::from_yaml_str(APP_SETUP).unwrap()),
            Selector::Pids(vec![1]),
            TailOptions {
                refresh_interval: Duration::ZERO,
                from_top: true,
                ..TailOptions::default()
            },
            Vec::new(),
        );
        o.tail(&LineRules::default()).unwrap();
        o.tail(&LineRules::default()).unwrap();
        assert!(take(&mut o).contains(&format!("{} 1 before start\n", label())));
    }
}
