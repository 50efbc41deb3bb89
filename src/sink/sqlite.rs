use log::info;
use rusqlite::{params, Connection};
use crate::flow::FlowRecord;
use super::{Error, Sink};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS flows (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    source_ip        TEXT NOT NULL,
    destination_ip   TEXT NOT NULL,
    source_port      INTEGER NOT NULL,
    destination_port INTEGER NOT NULL,
    protocol         INTEGER NOT NULL,
    packet_count     INTEGER NOT NULL,
    byte_count       INTEGER NOT NULL,
    flow_start       TEXT NOT NULL,
    flow_end         TEXT NOT NULL,
    probe_name       TEXT NOT NULL
)";

const INSERT: &str = "INSERT INTO flows (
    source_ip, destination_ip, source_port, destination_port, protocol,
    packet_count, byte_count, flow_start, flow_end, probe_name
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

/// Embedded SQL backend over a local SQLite file.
pub struct SqliteSink {
    path: String,
    conn: Option<Connection>,
}

impl SqliteSink {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_owned(), conn: None }
    }
}

impl Sink for SqliteSink {
    fn open(&mut self) -> Result<(), Error> {
        self.conn = Some(Connection::open(&self.path)?);
        self.ensure_schema()?;
        info!("sqlite database {} ready", self.path);
        Ok(())
    }

    fn ensure_schema(&mut self) -> Result<(), Error> {
        let conn = self.conn.as_ref().ok_or(Error::Closed)?;
        conn.execute(SCHEMA, [])?;
        Ok(())
    }

    fn write(&mut self, record: &FlowRecord) -> Result<(), Error> {
        let conn = self.conn.as_ref().ok_or(Error::Closed)?;
        conn.execute(INSERT, params![
            record.source_ip,
            record.destination_ip,
            record.source_port,
            record.destination_port,
            record.protocol,
            record.packet_count,
            record.byte_count,
            record.flow_start,
            record.flow_end,
            record.probe_name,
        ])?;
        Ok(())
    }

    fn health_check(&mut self) -> Result<(), Error> {
        let conn = Connection::open(&self.path)?;
        let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(())
    }

    fn close(&mut self) {
        self.conn = None;
    }
}
