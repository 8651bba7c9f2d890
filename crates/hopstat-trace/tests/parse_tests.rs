use hopstat_trace::{parse_mtr_raw, process_mtr_raw, trim_trailing_duplicates, ParseError};
use std::collections::HashSet;

fn addresses(hop: &hopstat_model::Hop) -> Vec<String> {
    hop.hosts.iter().map(|host| host.address.to_string()).collect()
}

#[test]
fn parse_ecmp_network() {
    let raw = include_str!("fixtures/mtr_raw_ecmp.txt");
    let model = process_mtr_raw(raw.as_bytes(), 10).unwrap();

    assert_eq!(model.rounds, 10);
    let numbers: Vec<u32> = model.hops.iter().map(|hop| hop.hop_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

    let hop1 = model.hop(1).unwrap();
    assert_eq!(addresses(hop1), vec!["1.2.3.87", "1.2.3.81", "1.2.3.83"]);
    assert_eq!(hop1.received, 10);
    assert_eq!(hop1.dropped, 0);
    assert_eq!(hop1.best, 171);
    assert_eq!(hop1.worst, 285);
    assert!((hop1.mean - 222.6).abs() < 1e-9);
    assert_eq!(hop1.worst_jitter, 94);
    assert!((hop1.mean_jitter - 35.7).abs() < 1e-9);
    assert_eq!(hop1.interarrival_jitter, 274);
    assert!((hop1.standard_dev - 8.712849512686867).abs() < 1e-9);

    let hop2 = model.hop(2).unwrap();
    assert_eq!(
        addresses(hop2),
        vec!["1.2.3.45", "1.2.3.7", "1.2.3.19", "1.2.3.5"]
    );
    assert_eq!(hop2.worst, 18393);

    let hop5 = model.hop(5).unwrap();
    assert_eq!(addresses(hop5), vec!["1.6.5.154"]);
    assert_eq!(hop5.hosts[0].name.as_deref(), Some("1.6.5.154"));
    assert_eq!(hop5.interarrival_jitter, 350);
}

#[test]
fn every_hop_accounts_for_every_round() {
    let raw = include_str!("fixtures/mtr_raw_ecmp.txt");
    let model = process_mtr_raw(raw.as_bytes(), 12).unwrap();

    for hop in &model.hops {
        assert_eq!(hop.received as usize, hop.packet_micros.len());
        assert_eq!(hop.dropped + hop.received, hop.sent);
        assert_eq!(hop.lost_percent, f64::from(hop.dropped) / f64::from(hop.sent));
        assert!((0.0..=1.0).contains(&hop.lost_percent));

        let unique: HashSet<_> = hop.hosts.iter().map(|host| host.address).collect();
        assert_eq!(unique.len(), hop.hosts.len());
    }
}

#[test]
fn fanout_aggregates_samples_across_addresses() {
    let raw = include_str!("fixtures/mtr_raw_fanout.txt");
    let model = process_mtr_raw(raw.as_bytes(), 3).unwrap();

    assert_eq!(model.hops.len(), 1);
    let hop = &model.hops[0];
    assert_eq!(addresses(hop), vec!["1.2.3.87", "1.2.3.81"]);
    assert_eq!(hop.packet_micros, vec![310, 290, 305]);
    assert_eq!(hop.lost_percent, 0.0);
    assert_eq!(hop.hosts[0].name.as_deref(), Some("edge-a.example.net"));
    assert_eq!(hop.hosts[1].name.as_deref(), Some("1.2.3.81"));
}

#[test]
fn repeated_destination_is_trimmed() {
    let raw = include_str!("fixtures/mtr_raw_trailing.txt");

    let untrimmed = parse_mtr_raw(raw.as_bytes(), 3).unwrap();
    assert_eq!(untrimmed.hops.len(), 5);

    let model = process_mtr_raw(raw.as_bytes(), 3).unwrap();
    let numbers: Vec<u32> = model.hops.iter().map(|hop| hop.hop_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    let last = &model.hops[2];
    assert_eq!(addresses(last), vec!["203.0.113.9"]);
    assert_eq!(last.packet_micros, vec![9800, 9700]);
    assert_eq!(last.dropped, 1);

    let mut hops = model.hops.clone();
    trim_trailing_duplicates(&mut hops);
    assert_eq!(hops, model.hops);
}

#[test]
fn parse_ipv6_with_names() {
    let raw = include_str!("fixtures/mtr_raw_ipv6.txt");
    let model = process_mtr_raw(raw.as_bytes(), 1).unwrap();

    assert_eq!(model.hops.len(), 3);
    assert_eq!(addresses(&model.hops[0]), vec!["fe80::1"]);
    assert_eq!(model.hops[0].hosts[0].name.as_deref(), Some("router.lan"));
    assert_eq!(model.hops[1].hosts[0].name, None);
    assert_eq!(
        model.hops[2].hosts[0].name.as_deref(),
        Some("one.one.one.one")
    );
}

#[test]
fn duplicate_host_lines_are_idempotent() {
    let raw = b"h 1 10.0.0.1\nh 1 10.0.0.1\nh 1 10.0.0.1\np 1 100 1\n";
    let model = process_mtr_raw(raw, 1).unwrap();

    assert_eq!(model.hops.len(), 1);
    assert_eq!(model.hops[0].hosts.len(), 1);
}

#[test]
fn hops_keep_discovery_order() {
    let raw = b"h 3 10.0.0.3\nh 1 10.0.0.1\nh 2 10.0.0.2\n";
    let model = parse_mtr_raw(raw, 1).unwrap();

    let numbers: Vec<u32> = model.hops.iter().map(|hop| hop.hop_number).collect();
    assert_eq!(numbers, vec![3, 1, 2]);
}

#[test]
fn packets_before_host_lines_are_dropped() {
    let raw = b"p 1 250 1\nh 1 10.0.0.1\np 1 260 2\n";
    let model = process_mtr_raw(raw, 2).unwrap();

    assert_eq!(model.hops[0].packet_micros, vec![260]);
    assert_eq!(model.hops[0].dropped, 1);
}

#[test]
fn unknown_tags_are_ignored() {
    let raw = b"x 0 1\nt 1 whatever\nh 1 10.0.0.1\np 1 100 2\n";
    let model = process_mtr_raw(raw, 1).unwrap();

    assert_eq!(model.hops.len(), 1);
    assert_eq!(model.hops[0].received, 1);
}

#[test]
fn empty_output_yields_empty_path() {
    let model = process_mtr_raw(b"", 5).unwrap();
    assert!(model.hops.is_empty());
    assert_eq!(model.rounds, 5);
}

#[test]
fn crlf_line_endings_are_accepted() {
    let raw = b"h 1 10.0.0.1\r\np 1 100 1\r\n";
    let model = process_mtr_raw(raw, 1).unwrap();
    assert_eq!(model.hops[0].packet_micros, vec![100]);
}

#[test]
fn non_numeric_packet_time_is_fatal() {
    let raw = b"h 1 10.0.0.1\np 1 12x 33001\n";
    let err = process_mtr_raw(raw, 1).unwrap_err();

    assert_eq!(
        err,
        ParseError::InvalidNumber {
            line: 2,
            field: "packet time",
            value: "12x".to_string(),
        }
    );
}

#[test]
fn non_numeric_hop_number_is_fatal() {
    let err = process_mtr_raw(b"h one 10.0.0.1\n", 1).unwrap_err();
    assert!(matches!(
        err,
        ParseError::InvalidNumber {
            line: 1,
            field: "hop number",
            ..
        }
    ));
}

#[test]
fn truncated_line_is_fatal() {
    let err = process_mtr_raw(b"h 1 10.0.0.1\np 1\n", 1).unwrap_err();
    assert!(matches!(err, ParseError::Truncated { line: 2, .. }));
}

#[test]
fn blank_line_is_fatal() {
    let err = process_mtr_raw(b"h 1 10.0.0.1\n\np 1 100 1\n", 1).unwrap_err();
    assert!(matches!(err, ParseError::Truncated { line: 2, .. }));
}

#[test]
fn bad_address_is_fatal() {
    let err = process_mtr_raw(b"h 1 not-an-ip\n", 1).unwrap_err();
    assert!(matches!(err, ParseError::InvalidAddress { line: 1, .. }));
    assert!(err.to_string().contains("not-an-ip"));
}

#[test]
fn more_samples_than_rounds_is_fatal() {
    let raw = b"h 1 10.0.0.1\np 1 100 1\np 1 110 2\n";
    let err = process_mtr_raw(raw, 1).unwrap_err();
    assert_eq!(
        err,
        ParseError::TooManySamples {
            line: 3,
            hop_number: 1,
            rounds: 1,
        }
    );
}

#[test]
fn oversized_packet_time_is_rejected() {
    let raw = b"h 1 10.0.0.1\np 1 18446744073709551615 1\np 1 18446744073709551615 2\n";
    let err = process_mtr_raw(raw, 2).unwrap_err();

    assert_eq!(
        err,
        ParseError::InvalidNumber {
            line: 2,
            field: "packet time",
            value: "18446744073709551615".to_string(),
        }
    );
}

#[test]
fn largest_packet_times_still_compile() {
    let raw = b"h 1 10.0.0.1\np 1 4294967295 1\np 1 4294967295 2\np 1 0 3\n";
    let model = process_mtr_raw(raw, 3).unwrap();
    let hop = &model.hops[0];

    assert_eq!(hop.worst, 4294967295);
    assert_eq!(hop.best, 0);
    assert_eq!(hop.worst_jitter, 4294967295);
    assert!((hop.mean - 8589934590.0 / 3.0).abs() < 1e-3);
}

#[test]
fn unterminated_last_record_is_dropped() {
    let model = process_mtr_raw(b"h 1 10.0.0.1\np 1 26", 1).unwrap();

    assert_eq!(model.hops.len(), 1);
    assert!(model.hops[0].packet_micros.is_empty());
    assert_eq!(model.hops[0].dropped, 1);
}

#[test]
fn output_without_any_newline_is_empty() {
    let model = process_mtr_raw(b"h 1 10.0.0.1", 1).unwrap();
    assert!(model.hops.is_empty());
}
