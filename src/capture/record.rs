//! Capture line parsing and direction classification
//!
//! Input lines carry nine tab-separated fields as emitted by the capture tool:
//! timestamp, frame length, protocol chain, source IP, destination IP,
//! TCP source/destination port and UDP source/destination port.

use crate::report::format_instant;
use crate::{CaptureError, Result};
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;

/// Number of layers kept after dropping the link and network layer
const PROTOCOL_LAYERS: usize = 6;

/// One accepted capture line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub timestamp: DateTime<Utc>,
    pub frame_length: u64,
    pub protocol_chain: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: Option<String>,
    pub dst_port: Option<String>,
}

impl CaptureRecord {
    /// Parse a capture line.
    ///
    /// Returns `Ok(None)` for lines without both addresses (IPv6 and other
    /// non-IPv4 frames), `Err` when the timestamp cannot be parsed.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |idx: usize| fields.get(idx).copied().unwrap_or("");

        let (src_ip, dst_ip) = match (last_address(field(3)), last_address(field(4))) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return Ok(None),
        };

        let timestamp = parse_timestamp(field(0))?;
        let frame_length = field(1).trim().parse::<u64>().unwrap_or(0);

        Ok(Some(Self {
            timestamp,
            frame_length,
            protocol_chain: field(2).to_string(),
            src_ip,
            dst_ip,
            src_port: first_port(field(5), field(7)),
            dst_port: first_port(field(6), field(8)),
        }))
    }
}

/// Capture record with direction and flow identity resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPacket {
    pub timestamp: DateTime<Utc>,
    pub frame_length: u64,
    pub is_upload: bool,
    pub local_ip: String,
    pub remote_ip: String,
    pub remote_port: String,
    pub protocol: String,
}

impl ClassifiedPacket {
    /// Classify a record relative to the private network.
    ///
    /// Returns `None` when neither endpoint is a private address, since such
    /// a record has no local side to account against.
    pub fn classify(record: CaptureRecord) -> Option<Self> {
        let is_upload = is_local_ip(&record.src_ip);
        if !is_upload && !is_local_ip(&record.dst_ip) {
            return None;
        }

        let protocol = compact_protocols(&record.protocol_chain);
        let (local_ip, remote_ip, remote_port) = if is_upload {
            (record.src_ip, record.dst_ip, record.dst_port)
        } else {
            (record.dst_ip, record.src_ip, record.src_port)
        };

        Some(Self {
            timestamp: record.timestamp,
            frame_length: record.frame_length,
            is_upload,
            local_ip,
            remote_ip,
            remote_port: remote_port.unwrap_or_default(),
            protocol,
        })
    }
}

/// Parse and classify one input line.
///
/// `Ok(None)` is a silent filter: the line is expected noise in a live feed.
pub fn parse_line(line: &str) -> Result<Option<ClassifiedPacket>> {
    Ok(CaptureRecord::parse(line)?.and_then(ClassifiedPacket::classify))
}

/// Whether `ip` is an RFC 1918 IPv4 address
/// (10.0.0.0/8, 172.16.0.0/12 or 192.168.0.0/16)
pub fn is_local_ip(ip: &str) -> bool {
    ip.parse::<Ipv4Addr>()
        .map(|addr| addr.is_private())
        .unwrap_or(false)
}

/// Drop the two outermost layers (`eth:ip`) and keep at most six of the rest
pub fn compact_protocols(protocols: &str) -> String {
    protocols
        .split(':')
        .skip(2)
        .take(PROTOCOL_LAYERS)
        .collect::<Vec<_>>()
        .join(":")
}

/// Prefix a raw capture line with `ts`, producing the timestamp field
/// expected by `parse_line`
pub fn stamp_line(ts: DateTime<Utc>, line: &str) -> String {
    format!("{}\t{}", format_instant(ts), line)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CaptureError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

// Tunnelled frames list one address per IP layer; the innermost is last.
fn last_address(field: &str) -> Option<String> {
    field
        .rsplit(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn first_port(tcp: &str, udp: &str) -> Option<String> {
    [tcp, udp]
        .into_iter()
        .map(str::trim)
        .find(|port| !port.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(fields: [&str; 9]) -> String {
        fields.join("\t")
    }

    #[test]
    fn test_is_local_ip_private_ranges() {
        for ip in [
            "10.0.0.1",
            "10.255.255.255",
            "172.16.0.1",
            "172.31.255.254",
            "192.168.0.1",
            "192.168.2.100",
        ] {
            assert!(is_local_ip(ip), "{} should be local", ip);
        }
    }

    #[test]
    fn test_is_local_ip_public_and_invalid() {
        for ip in [
            "8.8.8.8",
            "172.15.255.255",
            "172.32.0.1",
            "192.169.0.1",
            "11.0.0.1",
            "128.65.210.180",
            "fe80::1",
            "",
            "not-an-ip",
        ] {
            assert!(!is_local_ip(ip), "{} should not be local", ip);
        }
    }

    #[test]
    fn test_compact_protocols_truncates() {
        assert_eq!(
            compact_protocols("eth:ip:tcp:http:json:extra:more:evenmore:x"),
            "tcp:http:json:extra:more:evenmore"
        );
        assert_eq!(compact_protocols("eth:ethertype:ip:udp:dns"), "ip:udp:dns");
        assert_eq!(compact_protocols("tcp"), "");
        assert_eq!(compact_protocols(""), "");
    }

    #[test]
    fn test_parse_download() {
        let input = line([
            "2019-10-27T13:40:00.001Z",
            "1003",
            "eth:ethertype:ip:tcp:tls",
            "128.65.210.180",
            "192.168.2.100",
            "443",
            "51234",
            "",
            "",
        ]);

        let packet = parse_line(&input).unwrap().expect("should be accepted");
        assert!(!packet.is_upload);
        assert_eq!(packet.local_ip, "192.168.2.100");
        assert_eq!(packet.remote_ip, "128.65.210.180");
        assert_eq!(packet.remote_port, "443");
        assert_eq!(packet.protocol, "ip:tcp:tls");
        assert_eq!(packet.frame_length, 1003);
    }

    #[test]
    fn test_parse_upload_udp_port_fallback() {
        let input = line([
            "2019-10-27T13:40:00Z",
            "80",
            "eth:ethertype:ip:udp:dns",
            "192.168.2.100",
            "8.8.8.8",
            "",
            "",
            "53124",
            "53",
        ]);

        let packet = parse_line(&input).unwrap().expect("should be accepted");
        assert!(packet.is_upload);
        assert_eq!(packet.local_ip, "192.168.2.100");
        assert_eq!(packet.remote_ip, "8.8.8.8");
        assert_eq!(packet.remote_port, "53");
    }

    #[test]
    fn test_parse_missing_address_is_filtered() {
        let ipv6 = line([
            "2019-10-27T13:40:00Z",
            "100",
            "eth:ethertype:ipv6:tcp",
            "",
            "",
            "443",
            "51234",
            "",
            "",
        ]);
        assert!(parse_line(&ipv6).unwrap().is_none());

        let half = line([
            "2019-10-27T13:40:00Z",
            "100",
            "eth:ethertype:ip:tcp",
            "192.168.2.100",
            "",
            "443",
            "51234",
            "",
            "",
        ]);
        assert!(parse_line(&half).unwrap().is_none());
    }

    #[test]
    fn test_parse_takes_last_tunnel_address() {
        let input = line([
            "2019-10-27T13:40:00Z",
            "1500",
            "eth:ethertype:ip:gre:ip:tcp",
            "85.1.1.1,128.65.210.180",
            "85.2.2.2,192.168.2.100",
            "443",
            "51234",
            "",
            "",
        ]);

        let packet = parse_line(&input).unwrap().expect("should be accepted");
        assert_eq!(packet.remote_ip, "128.65.210.180");
        assert_eq!(packet.local_ip, "192.168.2.100");
    }

    #[test]
    fn test_parse_without_ports_and_bad_length() {
        let input = line([
            "2019-10-27T13:40:00Z",
            "garbage",
            "eth:ethertype:ip:icmp",
            "192.168.2.100",
            "1.1.1.1",
            "",
            "",
            "",
            "",
        ]);

        let packet = parse_line(&input).unwrap().expect("should be accepted");
        assert_eq!(packet.remote_port, "");
        assert_eq!(packet.frame_length, 0);
        assert_eq!(packet.protocol, "ip:icmp");
    }

    #[test]
    fn test_parse_short_line_is_filtered() {
        assert!(parse_line("2019-10-27T13:40:00Z\t100").unwrap().is_none());
        assert!(parse_line("").unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_timestamp_is_error() {
        let input = line([
            "yesterday",
            "100",
            "eth:ethertype:ip:tcp",
            "192.168.2.100",
            "1.1.1.1",
            "51234",
            "443",
            "",
            "",
        ]);

        let err = parse_line(&input).unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_stamped_line_parses() {
        let ts: DateTime<Utc> = "2019-10-27T13:40:00.250Z".parse().unwrap();
        let raw = "1003\teth:ethertype:ip:tcp\t128.65.210.180\t192.168.2.100\t443\t51234\t\t";

        let stamped = stamp_line(ts, raw);
        assert!(stamped.starts_with("2019-10-27T13:40:00.250Z\t1003"));

        let packet = parse_line(&stamped).unwrap().unwrap();
        assert_eq!(packet.timestamp, ts);
        assert_eq!(packet.frame_length, 1003);
    }

    #[test]
    fn test_public_to_public_is_filtered() {
        let input = line([
            "2019-10-27T13:40:00Z",
            "100",
            "eth:ethertype:ip:tcp",
            "1.1.1.1",
            "8.8.8.8",
            "51234",
            "443",
            "",
            "",
        ]);
        assert!(parse_line(&input).unwrap().is_none());
    }
}
