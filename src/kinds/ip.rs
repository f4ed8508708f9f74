//! Client address matching: exact addresses, CIDR ranges and `*` wildcard
//! segments, for both IPv4 and IPv6.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::warn;

use crate::parser::split_entries;

/// True if `address` falls into any of the configured `ranges`.
///
/// `ranges` is a newline and/or comma separated list. An empty or
/// unparsable caller address never matches.
pub fn matches(ranges: &str, address: &str) -> bool {
    let addr: IpAddr = match address.trim().parse() {
        Ok(a) => a,
        Err(_) => return false,
    };
    split_entries(ranges)
        .into_iter()
        .any(|entry| entry_matches(entry, addr))
}

fn entry_matches(entry: &str, addr: IpAddr) -> bool {
    if entry == "*" {
        return true;
    }
    if let Some((net, prefix)) = entry.split_once('/') {
        return cidr_matches(net.trim(), prefix.trim(), addr).unwrap_or_else(|| {
            warn!(entry, "ignoring malformed CIDR range");
            false
        });
    }
    if entry.contains('*') {
        return match addr {
            IpAddr::V4(a) => wildcard_v4(entry, a),
            IpAddr::V6(a) => wildcard_v6(entry, a),
        }
        .unwrap_or(false);
    }
    match entry.parse::<IpAddr>() {
        Ok(exact) => exact == addr,
        Err(_) => {
            warn!(entry, "ignoring malformed address");
            false
        }
    }
}

fn cidr_matches(net: &str, prefix: &str, addr: IpAddr) -> Option<bool> {
    let net: IpAddr = net.parse().ok()?;
    let bits: u32 = prefix.parse().ok()?;
    match (net, addr) {
        (IpAddr::V4(n), IpAddr::V4(a)) => {
            if bits > 32 {
                return None;
            }
            let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
            Some(u32::from(n) & mask == u32::from(a) & mask)
        }
        (IpAddr::V6(n), IpAddr::V6(a)) => {
            if bits > 128 {
                return None;
            }
            let mask = if bits == 0 { 0 } else { u128::MAX << (128 - bits) };
            Some(u128::from(n) & mask == u128::from(a) & mask)
        }
        // Family mismatch is a valid entry that simply does not apply.
        _ => Some(false),
    }
}

// `192.168.*` is a prefix of four segments.
fn wildcard_v4(entry: &str, addr: Ipv4Addr) -> Option<bool> {
    let parts: Vec<&str> = entry.split('.').collect();
    if parts.len() > 4 {
        return None;
    }
    let octets = addr.octets();
    for (part, octet) in parts.iter().zip(octets.iter()) {
        if *part == "*" {
            continue;
        }
        let want: u8 = part.parse().ok()?;
        if want != *octet {
            return Some(false);
        }
    }
    Some(true)
}

fn wildcard_v6(entry: &str, addr: Ipv6Addr) -> Option<bool> {
    let parts: Vec<&str> = entry.split(':').collect();
    if parts.len() > 8 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let segments = addr.segments();
    for (part, segment) in parts.iter().zip(segments.iter()) {
        if *part == "*" {
            continue;
        }
        let want = u16::from_str_radix(part, 16).ok()?;
        if want != *segment {
            return Some(false);
        }
    }
    Some(true)
}
