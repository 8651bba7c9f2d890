use crate::error::ParseError;
use crate::stats::compile_stats;
use crate::trim::trim_trailing_duplicates;
use hopstat_model::{Host, Hop, PathModel};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use tracing::{debug, trace};

const TAG_HOST: u8 = b'h';
const TAG_DNS: u8 = b'd';
const TAG_PACKET: u8 = b'p';
const TAG_ROUND: u8 = b'x';

/// Parses, trims and annotates `mtr --raw` output in one go.
pub fn process_mtr_raw(raw: &[u8], rounds: u32) -> Result<PathModel, ParseError> {
    let mut model = parse_mtr_raw(raw, rounds)?;
    trim_trailing_duplicates(&mut model.hops);
    compile_stats(&mut model.hops, model.rounds);
    Ok(model)
}

/// Folds `mtr --raw` records into hops in discovery order. Statistics are left
/// untouched; see [`process_mtr_raw`] for the full pipeline.
pub fn parse_mtr_raw(raw: &[u8], rounds: u32) -> Result<PathModel, ParseError> {
    let mut builder = PathBuilder::new(rounds);

    // Only newline-terminated records count; mtr can be cut off mid-line.
    let Some(end) = raw.iter().rposition(|&byte| byte == b'\n') else {
        if !raw.is_empty() {
            debug!(bytes = raw.len(), "dropping unterminated record");
        }
        return Ok(builder.finish());
    };
    if end + 1 < raw.len() {
        debug!(bytes = raw.len() - end - 1, "dropping unterminated record");
    }
    let text = &raw[..end];
    if text.is_empty() {
        return Ok(builder.finish());
    }

    for (index, line) in text.split(|&byte| byte == b'\n').enumerate() {
        let line_no = index + 1;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let record = split_record(line, line_no)?;

        match record.tag {
            TAG_HOST => {
                let address = parse_address(record.payload, line_no)?;
                builder.announce_host(record.hop_number, address);
            }
            TAG_DNS => {
                let name = String::from_utf8_lossy(record.payload);
                builder.resolve_name(record.hop_number, name.trim());
            }
            TAG_PACKET => {
                let micros_field = record
                    .payload
                    .split(|&byte| byte == b' ')
                    .next()
                    .unwrap_or_default();
                let micros = parse_packet_time(micros_field, line_no)?;
                builder.record_packet(record.hop_number, micros, line_no)?;
            }
            TAG_ROUND => {}
            other => trace!(line = line_no, tag = %char::from(other), "ignoring record"),
        }
    }

    Ok(builder.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Record<'a> {
    tag: u8,
    hop_number: u32,
    payload: &'a [u8],
}

/// Splits `<tag> <hop-number> <payload>`.
fn split_record(line: &[u8], line_no: usize) -> Result<Record<'_>, ParseError> {
    let truncated = || ParseError::Truncated {
        line: line_no,
        record: String::from_utf8_lossy(line).into_owned(),
    };

    let (&tag, rest) = line.split_first().ok_or_else(truncated)?;
    let rest = rest.strip_prefix(b" ").ok_or_else(truncated)?;
    let space = rest
        .iter()
        .position(|&byte| byte == b' ')
        .ok_or_else(truncated)?;

    let hop_field = &rest[..space];
    let hop_number = parse_decimal(hop_field, "hop number", line_no)?;
    let hop_number = u32::try_from(hop_number).map_err(|_| ParseError::InvalidNumber {
        line: line_no,
        field: "hop number",
        value: String::from_utf8_lossy(hop_field).into_owned(),
    })?;

    Ok(Record {
        tag,
        hop_number,
        payload: &rest[space + 1..],
    })
}

/// Strict unsigned decimal: ASCII digits only, no sign, no overflow.
fn parse_decimal(field: &[u8], name: &'static str, line_no: usize) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        line: line_no,
        field: name,
        value: String::from_utf8_lossy(field).into_owned(),
    };

    if field.is_empty() {
        return Err(invalid());
    }

    field
        .iter()
        .try_fold(0u64, |acc, &byte| {
            if !byte.is_ascii_digit() {
                return None;
            }
            acc.checked_mul(10)?.checked_add(u64::from(byte - b'0'))
        })
        .ok_or_else(invalid)
}

/// Packet times are bounded to `u32` microseconds so per-hop sums stay
/// within `u64` for any round count.
fn parse_packet_time(field: &[u8], line_no: usize) -> Result<u64, ParseError> {
    let micros = parse_decimal(field, "packet time", line_no)?;
    if micros > u64::from(u32::MAX) {
        return Err(ParseError::InvalidNumber {
            line: line_no,
            field: "packet time",
            value: String::from_utf8_lossy(field).into_owned(),
        });
    }
    Ok(micros)
}

fn parse_address(payload: &[u8], line_no: usize) -> Result<IpAddr, ParseError> {
    let invalid = || ParseError::InvalidAddress {
        line: line_no,
        value: String::from_utf8_lossy(payload).into_owned(),
    };

    std::str::from_utf8(payload)
        .map_err(|_| invalid())?
        .trim()
        .parse()
        .map_err(|_| invalid())
}

struct PathBuilder {
    model: PathModel,
    hop_index: HashMap<u32, usize>,
    seen_hosts: HashSet<(u32, IpAddr)>,
}

impl PathBuilder {
    fn new(rounds: u32) -> Self {
        Self {
            model: PathModel::new(rounds),
            hop_index: HashMap::new(),
            seen_hosts: HashSet::new(),
        }
    }

    fn announce_host(&mut self, hop_number: u32, address: IpAddr) {
        let index = match self.hop_index.get(&hop_number) {
            Some(&index) => index,
            None => {
                let index = self.model.hops.len();
                self.model.hops.push(Hop::new(hop_number));
                self.hop_index.insert(hop_number, index);
                index
            }
        };

        if self.seen_hosts.insert((hop_number, address)) {
            self.model.hops[index].hosts.push(Host::new(address));
        }
    }

    fn resolve_name(&mut self, hop_number: u32, name: &str) {
        if name.is_empty() {
            return;
        }
        let Some(hop) = self.hop_mut(hop_number) else {
            debug!(hop_number, name, "name for unknown hop");
            return;
        };

        let by_address = hop
            .hosts
            .iter()
            .position(|host| host.address.to_string() == name);
        let slot = by_address.or_else(|| hop.hosts.iter().position(|host| !host.has_name()));

        if let Some(index) = slot {
            hop.hosts[index].name = Some(name.to_string());
        }
    }

    fn record_packet(&mut self, hop_number: u32, micros: u64, line_no: usize) -> Result<(), ParseError> {
        let rounds = self.model.rounds;
        let Some(hop) = self.hop_mut(hop_number) else {
            debug!(hop_number, micros, "packet for unknown hop");
            return Ok(());
        };

        if hop.packet_micros.len() >= rounds as usize {
            return Err(ParseError::TooManySamples {
                line: line_no,
                hop_number,
                rounds,
            });
        }
        hop.packet_micros.push(micros);
        Ok(())
    }

    fn hop_mut(&mut self, hop_number: u32) -> Option<&mut Hop> {
        let index = *self.hop_index.get(&hop_number)?;
        self.model.hops.get_mut(index)
    }

    fn finish(self) -> PathModel {
        self.model
    }
}
