use hopstat_model::Hop;
use std::net::IpAddr;
use tracing::debug;

/// mtr keeps confirming the destination at every TTL past the real path
/// length. Cuts the path right after the last hop whose first address differs
/// from the one before it; hops without hosts never move the cut.
pub fn trim_trailing_duplicates(hops: &mut Vec<Hop>) {
    let mut boundary = 0;
    let mut previous: Option<IpAddr> = None;

    for (index, hop) in hops.iter().enumerate() {
        let Some(address) = hop.first_address() else {
            continue;
        };
        if previous != Some(address) {
            previous = Some(address);
            boundary = index + 1;
        }
    }

    if boundary > 0 && boundary < hops.len() {
        debug!(
            kept = boundary,
            removed = hops.len() - boundary,
            "trimming duplicate trailing hops"
        );
        hops.truncate(boundary);
    }
}
