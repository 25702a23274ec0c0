use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Label names mapped to label values.
pub type Labels = BTreeMap<String, String>;

/// Query parameters used to filter the samples returned by `/metrics-samples`.
pub type MetadataFilters = BTreeMap<String, String>;

/// A single observation of a metric as recorded by receiver-mock.
///
/// Missing fields and `null`s decode to the field's default. receiver-mock
/// writes non-finite values, such as the NaN of an empty summary, as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSample {
    #[serde(deserialize_with = "null_as_default")]
    pub metric: String,
    #[serde(deserialize_with = "null_as_default")]
    pub value: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Labels,
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl MetricSample {
    /// Returns the value of label `name`, if the sample carries it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Orders samples newest first.
    pub fn cmp_by_time_desc(a: &MetricSample, b: &MetricSample) -> Ordering {
        b.timestamp.cmp(&a.timestamp)
    }
}

/// Sorts samples so the most recent one comes first. Samples with equal
/// timestamps keep their relative order.
pub fn sort_by_time_desc(samples: &mut [MetricSample]) {
    samples.sort_by(MetricSample::cmp_by_time_desc);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(metric: &str, timestamp: u64) -> MetricSample {
        MetricSample {
            metric: metric.to_string(),
            timestamp,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_two_samples() {
        let body = r#"[
            {"metric": "up", "value": 1, "labels": {"pod": "x", "cluster": "y"}, "timestamp": 1700000000000},
            {"metric": "container_memory_working_set_bytes", "value": 1234.5, "labels": {}, "timestamp": 1700000001000}
        ]"#;
        let samples: Vec<MetricSample> = serde_json::from_str(body).unwrap();
        assert_eq!(samples.len(), 2);

        assert_eq!(samples[0].metric, "up");
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[0].label("pod"), Some("x"));
        assert_eq!(samples[0].label("cluster"), Some("y"));
        assert_eq!(samples[0].timestamp, 1_700_000_000_000);

        assert_eq!(samples[1].metric, "container_memory_working_set_bytes");
        assert_eq!(samples[1].value, 1234.5);
        assert!(samples[1].labels.is_empty());
        assert_eq!(samples[1].timestamp, 1_700_000_001_000);
    }

    #[test]
    fn test_missing_fields_default() {
        let samples: Vec<MetricSample> = serde_json::from_str(r#"[{"metric": "up"}]"#).unwrap();
        assert_eq!(samples, vec![sample("up", 0)]);
    }

    #[test]
    fn test_null_fields_default() {
        let body = r#"[
            {"metric": "up", "value": null, "labels": null, "timestamp": 1},
            {"metric": null, "value": 2.5, "labels": {"pod": "x"}, "timestamp": null}
        ]"#;
        let samples: Vec<MetricSample> = serde_json::from_str(body).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], sample("up", 1));
        assert_eq!(samples[1].metric, "");
        assert_eq!(samples[1].value, 2.5);
        assert_eq!(samples[1].label("pod"), Some("x"));
        assert_eq!(samples[1].timestamp, 0);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(serde_json::from_str::<Vec<MetricSample>>(r#"{"metric": "up"}"#).is_err());
        assert!(serde_json::from_str::<Vec<MetricSample>>("[{").is_err());
        assert!(
            serde_json::from_str::<Vec<MetricSample>>(r#"[{"timestamp": -1}]"#).is_err()
        );
    }

    #[test]
    fn test_sort_by_time_desc() {
        let mut samples = vec![sample("a", 10), sample("b", 30), sample("c", 20), sample("d", 30)];
        sort_by_time_desc(&mut samples);
        let order: Vec<&str> = samples.iter().map(|s| s.metric.as_str()).collect();
        assert_eq!(order, vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn test_label_missing() {
        assert_eq!(sample("up", 1).label("pod"), None);
    }
}
