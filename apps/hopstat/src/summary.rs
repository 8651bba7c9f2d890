use hopstat_model::{Host, Hop, TraceReport};
use std::fmt::Write;

const HEADER: &str =
    "  #  Host                                 Loss%   Snt   Rcv    Avg   Best  Worst  StDev   Javg   Jmax   Jint";

/// mtr-style report table. Latencies are shown in milliseconds.
pub fn render_summary(report: &TraceReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "HOST: {}  ({}, {} rounds)",
        report.target, report.timestamp_utc, report.path.rounds
    );
    let _ = writeln!(out, "{HEADER}");

    for hop in &report.path.hops {
        render_hop(&mut out, hop);
    }
    out
}

fn render_hop(out: &mut String, hop: &Hop) {
    let first = hop.hosts.first().map(host_label).unwrap_or_else(|| "???".to_string());
    let _ = writeln!(
        out,
        "{:>3}. {:<36} {:>5.1}% {:>5} {:>5} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
        hop.hop_number,
        truncate(&first, 36),
        hop.lost_percent * 100.0,
        hop.sent,
        hop.received,
        millis(hop.mean),
        millis(hop.best as f64),
        millis(hop.worst as f64),
        millis(hop.standard_dev),
        millis(hop.mean_jitter),
        millis(hop.worst_jitter as f64),
        millis(hop.interarrival_jitter as f64),
    );

    for host in hop.hosts.iter().skip(1) {
        let _ = writeln!(out, "     {}", host_label(host));
    }
}

fn host_label(host: &Host) -> String {
    match host.name.as_deref() {
        Some(name) if !name.is_empty() && name != host.address.to_string() => {
            format!("{name} ({})", host.address)
        }
        _ => host.address.to_string(),
    }
}

fn millis(micros: f64) -> String {
    format!("{:.1}", micros / 1000.0)
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        value.chars().take(width).collect()
    }
}
