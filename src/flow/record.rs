use std::net::Ipv4Addr;
use std::sync::Once;
use log::warn;
use serde::Serialize;
use super::bytes::{be_uint, Reader};
use super::template::FieldSpec;

pub const FIELD_IN_BYTES:       u16 = 1;
pub const FIELD_IN_PKTS:        u16 = 2;
pub const FIELD_PROTOCOL:       u16 = 4;
pub const FIELD_L4_SRC_PORT:    u16 = 7;
pub const FIELD_IPV4_SRC_ADDR:  u16 = 8;
pub const FIELD_L4_DST_PORT:    u16 = 11;
pub const FIELD_IPV4_DST_ADDR:  u16 = 12;
pub const FIELD_LAST_SWITCHED:  u16 = 21;
pub const FIELD_FIRST_SWITCHED: u16 = 22;

/// One decoded flow observation. Every attribute is optional on the wire;
/// absent fields keep their defaults and the sink decides presentation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct FlowRecord {
    pub source_ip:        String,
    pub destination_ip:   String,
    pub source_port:      u16,
    pub destination_port: u16,
    pub protocol:         u8,
    pub packet_count:     u32,
    pub byte_count:       u32,
    pub flow_start:       String,
    pub flow_end:         String,
    pub probe_name:       String,
}

/// Projects one data record onto a `FlowRecord` under its template. The
/// template is authoritative about on-wire widths: the cursor advances by
/// the declared length of every field, known or not. The caller hands in
/// exactly one record's worth of bytes.
pub fn materialize(fields: &[FieldSpec], bytes: &[u8], probe: &str) -> FlowRecord {
    let mut record = FlowRecord {
        probe_name: probe.to_owned(),
        ..FlowRecord::default()
    };

    let mut reader = Reader::new(bytes);

    for field in fields {
        let value = match reader.take(field.length as usize) {
            Ok(value) => value,
            Err(_)    => break,
        };

        match field.kind {
            FIELD_IN_BYTES      => record.byte_count       = counter(value),
            FIELD_IN_PKTS       => record.packet_count     = counter(value),
            FIELD_PROTOCOL      => record.protocol         = value.first().copied().unwrap_or(0),
            FIELD_L4_SRC_PORT   => record.source_port      = be_uint(value) as u16,
            FIELD_L4_DST_PORT   => record.destination_port = be_uint(value) as u16,
            FIELD_IPV4_SRC_ADDR => {
                if let Some(ip) = ipv4(value) {
                    record.source_ip = ip;
                }
            }
            FIELD_IPV4_DST_ADDR => {
                if let Some(ip) = ipv4(value) {
                    record.destination_ip = ip;
                }
            }
            // Uptime-relative timestamps are accepted but not projected.
            FIELD_LAST_SWITCHED | FIELD_FIRST_SWITCHED => (),
            _ => (),
        }
    }

    record
}

/// Counters keep the declared width on the wire; widths past four bytes
/// project the low 32 bits.
fn counter(bytes: &[u8]) -> u32 {
    if bytes.len() > 4 {
        static WIDE: Once = Once::new();
        WIDE.call_once(|| warn!("counter field wider than 32 bits, keeping low bits"));
    }
    be_uint(bytes) as u32
}

/// Dotted quad from a four byte address field. Other widths cannot be an
/// IPv4 address and leave the attribute at its default.
fn ipv4(bytes: &[u8]) -> Option<String> {
    match *bytes {
        [a, b, c, d] => Some(Ipv4Addr::new(a, b, c, d).to_string()),
        _            => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn spec(kind: u16, length: u16) -> FieldSpec {
        FieldSpec { kind, length }
    }

    #[test]
    fn projects_known_fields() {
        let fields = [spec(8, 4), spec(7, 2), spec(4, 1)];
        let bytes  = [192, 0, 2, 1, 0x01, 0xbb, 17];

        let record = materialize(&fields, &bytes, "edge");
        assert_eq!(record.source_ip, "192.0.2.1");
        assert_eq!(record.source_port, 443);
        assert_eq!(record.protocol, 17);
        assert_eq!(record.probe_name, "edge");
        assert_eq!(record.destination_ip, "");
        assert_eq!(record.destination_port, 0);
    }

    #[test]
    fn unknown_fields_only_advance_the_offset() {
        let fields = [spec(999, 3), spec(11, 2)];
        let bytes  = [0xde, 0xad, 0xbe, 0x00, 0x35];

        let record = materialize(&fields, &bytes, "edge");
        assert_eq!(record.destination_port, 53);
    }

    #[test]
    fn wide_counter_keeps_low_bits() {
        let fields = [spec(1, 8)];
        let bytes  = [0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x05, 0xdc];

        let record = materialize(&fields, &bytes, "edge");
        assert_eq!(record.byte_count, 1500);
    }

    #[test]
    fn odd_width_address_is_not_projected() {
        let fields = [spec(8, 6)];
        let bytes  = [192, 0, 2, 1, 0, 0];

        let record = materialize(&fields, &bytes, "edge");
        assert_eq!(record.source_ip, "");
    }
}
