#![cfg_attr(feature = "strict", deny(warnings))]

//! A client for the receiver-mock HTTP API, used to assert on the metrics a
//! collector shipped during integration tests.

pub use clap;
pub use log;
pub use simple_logger;
pub use ureq;
pub use url;

pub mod args;
pub mod client;
pub mod error;
pub mod metric_list;
pub mod sample;
/// Helpers to be used in integration tests.
pub mod testing;
pub mod tunnel;

pub use client::ReceiverMockClient;
pub use error::{Error, Result};
pub use metric_list::{format_metric_list, parse_metric_list, MetricCounts};
pub use sample::{sort_by_time_desc, Labels, MetadataFilters, MetricSample};
pub use tunnel::{PortForward, Tunnel, TunnelGuard};
