//! Shared data structures for hopstat.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportFile {
    pub version: u32,
    pub reports: Vec<TraceReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceReport {
    pub target: String,
    #[serde(rename = "timestamp-utc")]
    pub timestamp_utc: String,
    pub path: PathModel,
}

/// Per-hop view of one probe run. `rounds` is the number of rounds that were
/// requested and is the denominator for every loss figure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathModel {
    pub rounds: u32,
    pub hops: Vec<Hop>,
}

impl PathModel {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds,
            hops: Vec::new(),
        }
    }

    pub fn hop(&self, hop_number: u32) -> Option<&Hop> {
        self.hops.iter().find(|hop| hop.hop_number == hop_number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Host {
    #[serde(rename = "ip")]
    pub address: IpAddr,
    #[serde(rename = "hostname", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Host {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            name: None,
        }
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|name| !name.is_empty())
    }
}

/// One position along the path. Latency fields are in microseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Hop {
    pub hop_number: u32,
    pub hosts: Vec<Host>,
    #[serde(rename = "packet-times")]
    pub packet_micros: Vec<u64>,
    pub sent: u32,
    pub received: u32,
    pub dropped: u32,
    pub lost_percent: f64,
    pub mean: f64,
    pub best: u64,
    pub worst: u64,
    pub standard_dev: f64,
    pub mean_jitter: f64,
    pub worst_jitter: u64,
    /// RFC 3550 A.8 smoothed estimate.
    pub interarrival_jitter: i64,
}

impl Hop {
    pub fn new(hop_number: u32) -> Self {
        Self {
            hop_number,
            ..Self::default()
        }
    }

    pub fn first_address(&self) -> Option<IpAddr> {
        self.hosts.first().map(|host| host.address)
    }
}
