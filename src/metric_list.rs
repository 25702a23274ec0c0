//! Parsing of the plaintext statistics served by receiver-mock at `/metrics-list`.
//!
//! The body holds one `<metric-name>:<count>` record per line. Metric names
//! may contain colons themselves, so the last colon on a line is the split
//! point.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Mapping of metric names to the number of times the metric was observed.
pub type MetricCounts = HashMap<String, i64>;

/// Parses a `/metrics-list` body.
///
/// Empty lines are skipped. A line without a colon, or with the colon as its
/// first character, is rejected, as is a count that isn't an integer. When a
/// metric name appears more than once the last line wins.
pub fn parse_metric_list(raw: &str) -> Result<MetricCounts> {
    let mut counts = MetricCounts::new();
    for line in raw.split('\n') {
        if line.is_empty() {
            continue;
        }
        let (name, count) = parse_line(line)?;
        counts.insert(name.to_string(), count);
    }
    Ok(counts)
}

fn parse_line(line: &str) -> Result<(&str, i64)> {
    let split_index = match line.rfind(':') {
        Some(0) | None => {
            return Err(Error::MalformedLine {
                line: line.to_string(),
            })
        }
        Some(i) => i,
    };
    let name = &line[..split_index];
    let count = line[split_index + 1..]
        .trim()
        .parse::<i64>()
        .map_err(|source| Error::InvalidCount {
            line: line.to_string(),
            source,
        })?;
    Ok((name, count))
}

/// Renders counts in the `/metrics-list` format, one line per metric sorted
/// by name.
pub fn format_metric_list(counts: &MetricCounts) -> String {
    let mut names: Vec<&String> = counts.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("{}:{}\n", name, counts[name]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, i64)]) -> MetricCounts {
        entries
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect()
    }

    #[test]
    fn test_parse_simple_list() {
        let parsed = parse_metric_list("up:3\nnode_load1:12\n").unwrap();
        assert_eq!(parsed, counts(&[("up", 3), ("node_load1", 12)]));
    }

    #[test]
    fn test_last_colon_is_separator() {
        let parsed = parse_metric_list("foo:bar:3").unwrap();
        assert_eq!(parsed, counts(&[("foo:bar", 3)]));
    }

    #[test]
    fn test_empty_lines_are_skipped() {
        let parsed = parse_metric_list("\n\nup:1\n\n\nkube_pod_info:7\n").unwrap();
        assert_eq!(parsed, counts(&[("up", 1), ("kube_pod_info", 7)]));
        assert!(parse_metric_list("").unwrap().is_empty());
    }

    #[test]
    fn test_count_whitespace_is_trimmed() {
        let parsed = parse_metric_list("up: 4\r\nnode_cpu_seconds_total:10\r\n").unwrap();
        assert_eq!(parsed, counts(&[("up", 4), ("node_cpu_seconds_total", 10)]));
    }

    #[test]
    fn test_line_without_colon_is_rejected() {
        let err = parse_metric_list("up:1\nno_colon_here\n").unwrap_err();
        match err {
            Error::MalformedLine { line } => assert_eq!(line, "no_colon_here"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_leading_colon_is_rejected() {
        let err = parse_metric_list(":5").unwrap_err();
        assert!(matches!(err, Error::MalformedLine { ref line } if line == ":5"));
    }

    #[test]
    fn test_non_integer_count_is_rejected() {
        let err = parse_metric_list("foo:abc").unwrap_err();
        match err {
            Error::InvalidCount { line, .. } => assert_eq!(line, "foo:abc"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(parse_metric_list("foo:1.5").is_err());
        assert!(parse_metric_list("foo:").is_err());
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let parsed = parse_metric_list("up:1\nup:9\n").unwrap();
        assert_eq!(parsed, counts(&[("up", 9)]));
    }

    #[test]
    fn test_format_then_parse_keeps_counts() {
        let original = counts(&[
            ("up", 3),
            ("foo:bar", 0),
            ("apiserver_request_total", 1024),
            ("negative", -2),
        ]);
        let body = format_metric_list(&original);
        assert_eq!(parse_metric_list(&body).unwrap(), original);
    }

    #[test]
    fn test_format_is_sorted_by_name() {
        let body = format_metric_list(&counts(&[("b", 2), ("a", 1)]));
        assert_eq!(body, "a:1\nb:2\n");
    }
}
