use hopstat_model::Hop;

/// Fills in the derived fields of every hop. `rounds` is the loss
/// denominator; hops that never answered only get their counters set.
pub fn compile_stats(hops: &mut [Hop], rounds: u32) {
    for hop in hops {
        compile_hop(hop, rounds);
    }
}

fn compile_hop(hop: &mut Hop, rounds: u32) {
    let received = u32::try_from(hop.packet_micros.len()).unwrap_or(u32::MAX);

    hop.sent = rounds;
    hop.received = received;
    hop.dropped = rounds.saturating_sub(received);
    hop.lost_percent = if rounds == 0 {
        0.0
    } else {
        f64::from(hop.dropped) / f64::from(rounds)
    };

    let Some((&first, _)) = hop.packet_micros.split_first() else {
        return;
    };

    let mut total: u64 = 0;
    let mut best = first;
    let mut worst = first;
    let mut jitter_total: u64 = 0;
    let mut worst_jitter: u64 = 0;
    let mut interarrival: i64 = 0;
    let mut previous: Option<u64> = None;

    for &sample in &hop.packet_micros {
        if let Some(previous) = previous {
            let delta = sample.abs_diff(previous);
            worst_jitter = worst_jitter.max(delta);
            jitter_total += delta;
            // RFC 3550 A.8: J += |D| - ((J + 8) >> 4)
            interarrival += delta as i64 - ((interarrival + 8) >> 4);
        }
        total += sample;
        best = best.min(sample);
        worst = worst.max(sample);
        previous = Some(sample);
    }

    let count = f64::from(received);
    let mean = total as f64 / count;
    let squared_diff: f64 = hop
        .packet_micros
        .iter()
        .map(|&sample| {
            let diff = sample as f64 - mean;
            diff * diff
        })
        .sum();

    hop.mean = mean;
    hop.best = best;
    hop.worst = worst;
    hop.worst_jitter = worst_jitter;
    hop.interarrival_jitter = interarrival;
    // Divides by the sample count even though there is one delta fewer.
    hop.mean_jitter = jitter_total as f64 / count;
    // Normalised by the mean latency rather than the sample count, matching
    // the figures existing consumers already expect.
    hop.standard_dev = if mean == 0.0 {
        0.0
    } else {
        (squared_diff / mean).sqrt()
    };
}
