//! Short log names.
//!
//! Log file names tend to carry host names, pids and timestamps
//! (`impalad.db1.example.com.impala.log.INFO.20240101-101010.4242`).
//! The short name keeps only the stable, human meaningful part.

use std::path::Path;

const SEPARATORS: [char; 4] = ['.', '-', '_', '*'];

/// Host aliases ordered longest first, so `db1.example.com` is removed before `db1`.
pub fn order_host_names(mut names: Vec<String>) -> Vec<String> {
    names.retain(|n| !n.trim().is_empty());
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();
    names
}

/// Derive the short display name of `path`.
///
/// `host_names` must already be ordered by [`order_host_names`].
pub fn short_log_name(path: &str, host_names: &[String]) -> String {
    let mut name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    for host in host_names {
        name = name.replace(host.as_str(), "");
    }

    name.retain(|c| !c.is_ascii_digit());

    let mut collapsed = String::with_capacity(name.len());
    let mut last = None;
    for c in name.chars() {
        if SEPARATORS.contains(&c) && last == Some(c) {
            continue;
        }
        collapsed.push(c);
        last = Some(c);
    }

    collapsed.trim_end_matches(SEPARATORS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        order_host_names(vec![
            "db1".to_string(),
            "db1.example.com".to_string(),
            "10.0.0.5".to_string(),
            "localhost".to_string(),
            "".to_string(),
        ])
    }

    #[test]
    fn test_order_host_names() {
        assert_eq!(hosts(), vec!["db1.example.com", "localhost", "10.0.0.5", "db1"]);
    }

    #[test]
    fn test_plain_name() {
        assert_eq!(short_log_name("/var/log/myapp.log", &[]), "myapp.log");
    }

    #[test]
    fn test_strips_hosts_digits_and_trailing_noise() {
        assert_eq!(
            short_log_name(
                "/var/log/impala/impalad.db1.example.com.impala.log.INFO.20240101-101010.4242",
                &hosts()
            ),
            "impalad.impala.log.INFO"
        );
    }

    #[test]
    fn test_collapses_repeated_separators() {
        assert_eq!(short_log_name("/x/app__2024--01..out", &[]), "app_-.out");
        assert_eq!(short_log_name("/x/kafka-server-10.0.0.5.log", &hosts()), "kafka-server-.log");
    }

    #[test]
    fn test_only_separators_left() {
        assert_eq!(short_log_name("/x/20240101.123", &[]), "");
    }
}
