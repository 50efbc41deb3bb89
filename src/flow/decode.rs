use std::fmt;
use log::{debug, warn};
use crate::sink::Sink;
use super::bytes::{Reader, Truncated};
use super::record;
use super::template::{FieldSpec, Template, TemplateTable};
use super::template::{MIN_TEMPLATE_ID, OPTIONS_FLOWSET, TEMPLATE_FLOWSET};

const VERSION_V9:    u16 = 9;
const VERSION_IPFIX: u16 = 10;

/// Conditions terminal to one datagram. None of them is fatal to the
/// probe: the caller logs the condition and waits for the next datagram.
/// Records emitted before the condition fired stay persisted.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    Empty,
    Version(u16),
    ShortHeader,
    ShortFlowSet,
    Length(u16),
    Overrun { length: u16, remaining: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Empty        => write!(f, "datagram too short for a version field"),
            Error::Version(v)   => write!(f, "Unknown NetFlow version: {}", v),
            Error::ShortHeader  => write!(f, "datagram shorter than the NetFlow v9 header"),
            Error::ShortFlowSet => write!(f, "Incomplete FlowSet header"),
            Error::Length(n)    => write!(f, "FlowSet length {} below the FlowSet header size", n),
            Error::Overrun { length, remaining } => {
                write!(f, "FlowSet length exceeds remaining packet length ({} > {})", length, remaining)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Dispatches one datagram by export-protocol version and returns the
/// number of flow records handed to the sink.
pub fn datagram(
    buf: &[u8],
    templates: &mut TemplateTable,
    probe: &str,
    sink: &mut dyn Sink,
) -> Result<usize, Error> {
    if buf.len() < 2 {
        return Err(Error::Empty);
    }

    match u16::from_be_bytes([buf[0], buf[1]]) {
        VERSION_V9 => v9(buf, templates, probe, sink),
        VERSION_IPFIX => {
            warn!("IPFIX (NetFlow v10) is not decoded yet, dropping datagram");
            Ok(0)
        }
        other => Err(Error::Version(other)),
    }
}

struct Header {
    count:      u16,
    sys_uptime: u32,
    unix_secs:  u32,
    sequence:   u32,
    source_id:  u32,
}

fn header(reader: &mut Reader) -> Result<Header, Truncated> {
    let _version = reader.u16()?;
    Ok(Header {
        count:      reader.u16()?,
        sys_uptime: reader.u32()?,
        unix_secs:  reader.u32()?,
        sequence:   reader.u32()?,
        source_id:  reader.u32()?,
    })
}

/// The v9 state machine: walks the FlowSets of one datagram, installing
/// templates and decoding data records against the probe's table.
fn v9(
    buf: &[u8],
    templates: &mut TemplateTable,
    probe: &str,
    sink: &mut dyn Sink,
) -> Result<usize, Error> {
    let mut reader = Reader::new(buf);
    let head = header(&mut reader).map_err(|_| Error::ShortHeader)?;

    let mut records   = 0;
    let mut installed = 0;

    while reader.remaining() > 0 {
        if reader.remaining() < 4 {
            return Err(Error::ShortFlowSet);
        }

        let id     = reader.u16().map_err(|_| Error::ShortFlowSet)?;
        let length = reader.u16().map_err(|_| Error::ShortFlowSet)?;

        if length < 4 {
            return Err(Error::Length(length));
        }

        let body = match reader.take(length as usize - 4) {
            Ok(body) => body,
            Err(_)   => return Err(Error::Overrun { length, remaining: reader.remaining() }),
        };

        match id {
            TEMPLATE_FLOWSET => installed += install(body, templates),
            OPTIONS_FLOWSET  => debug!("options template FlowSet skipped"),
            2..=255          => debug!("reserved FlowSet id {} skipped", id),
            _                => records += data(body, id, templates, probe, sink),
        }
    }

    // The header count is advisory: it also covers options records, which
    // are skipped above, so a mismatch is not an error.
    if usize::from(head.count) != records + installed {
        debug!(
            "header claims {} records, decoded {} (uptime {} ms, exported {}, seq {}, source {})",
            head.count, records + installed,
            head.sys_uptime, head.unix_secs, head.sequence, head.source_id,
        );
    }

    Ok(records)
}

/// Installs every template record packed into one template FlowSet body.
/// Trailing bytes shorter than a record header are padding.
fn install(body: &[u8], templates: &mut TemplateTable) -> usize {
    let mut reader = Reader::new(body);
    let mut installed = 0;

    while reader.remaining() >= 4 {
        let id    = match reader.u16() { Ok(v) => v, Err(_) => break };
        let count = match reader.u16() { Ok(v) => v, Err(_) => break };

        if count == 0 {
            warn!("template {} declares no fields, ignored", id);
            continue;
        }

        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let kind = match reader.u16() {
                Ok(v)  => v,
                Err(_) => {
                    warn!("truncated template record {}, rest of FlowSet dropped", id);
                    return installed;
                }
            };
            let length = match reader.u16() {
                Ok(v)  => v,
                Err(_) => {
                    warn!("truncated template record {}, rest of FlowSet dropped", id);
                    return installed;
                }
            };
            fields.push(FieldSpec { kind, length });
        }

        if id < MIN_TEMPLATE_ID {
            warn!("template id {} is reserved, ignored", id);
            continue;
        }

        match Template::new(fields) {
            Some(template) => {
                templates.insert(id, template);
                installed += 1;
            }
            None => warn!("template {} declares a zero width record, ignored", id),
        }
    }

    installed
}

/// Decodes fixed-width records out of one data FlowSet body. Residue
/// shorter than the record width is the exporter's alignment padding.
fn data(
    body: &[u8],
    id: u16,
    templates: &TemplateTable,
    probe: &str,
    sink: &mut dyn Sink,
) -> usize {
    let template = match templates.get(id) {
        Some(template) => template,
        None => {
            warn!("Unknown template ID: {}", id);
            return 0;
        }
    };

    let width = template.width();
    let mut reader = Reader::new(body);
    let mut records = 0;

    while reader.remaining() >= width {
        let bytes = match reader.take(width) {
            Ok(bytes) => bytes,
            Err(_)    => break,
        };

        let record = record::materialize(template.fields(), bytes, probe);
        records += 1;

        if let Err(e) = sink.write(&record) {
            warn!("failed to store flow record: {}", e);
        }
    }

    records
}
