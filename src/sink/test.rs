use std::fs;
use anyhow::Result;
use crate::flow::FlowRecord;
use super::{Sink, SqliteSink, TextSink};

fn record(probe: &str) -> FlowRecord {
    FlowRecord {
        source_ip:        "10.0.0.1".to_owned(),
        destination_ip:   "10.0.0.2".to_owned(),
        source_port:      443,
        destination_port: 51514,
        protocol:         6,
        packet_count:     2,
        byte_count:       1500,
        flow_start:       String::new(),
        flow_end:         String::new(),
        probe_name:       probe.to_owned(),
    }
}

#[test]
fn text_sink_writes_the_header_once() -> Result<()> {
    let dir  = tempfile::tempdir()?;
    let path = dir.path().join("flows.csv");
    let path = path.to_str().unwrap();

    let mut sink = TextSink::new(path);
    sink.health_check()?;
    sink.open()?;
    sink.write(&record("edge"))?;
    sink.close();

    // Reopening an existing file appends without a second header.
    let mut sink = TextSink::new(path);
    sink.open()?;
    sink.write(&record("core"))?;
    sink.close();

    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("source_ip,destination_ip,"));
    assert_eq!(lines[1], "10.0.0.1,10.0.0.2,443,51514,6,2,1500,,,edge");
    assert_eq!(lines[2], "10.0.0.1,10.0.0.2,443,51514,6,2,1500,,,core");

    Ok(())
}

#[test]
fn sqlite_sink_round_trip() -> Result<()> {
    let dir  = tempfile::tempdir()?;
    let path = dir.path().join("flows.db");
    let path = path.to_str().unwrap();

    let mut sink = SqliteSink::new(path);
    sink.open()?;
    sink.ensure_schema()?;
    sink.write(&record("edge"))?;
    sink.write(&record("edge"))?;
    sink.health_check()?;
    sink.close();

    let conn = rusqlite::Connection::open(path)?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM flows", [], |row| row.get(0))?;
    assert_eq!(count, 2);

    let (source, probe): (String, String) = conn.query_row(
        "SELECT source_ip, probe_name FROM flows LIMIT 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(source, "10.0.0.1");
    assert_eq!(probe, "edge");

    Ok(())
}

#[test]
fn writes_before_open_are_refused() {
    let mut text = TextSink::new("never-created.csv");
    assert!(text.write(&record("edge")).is_err());

    let mut sqlite = SqliteSink::new("never-created.db");
    assert!(sqlite.write(&record("edge")).is_err());
}
