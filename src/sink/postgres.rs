use log::info;
use postgres::{Client, NoTls};
use crate::config::DatabaseConfig;
use crate::flow::FlowRecord;
use super::{Error, Sink};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS flows (
    id               BIGSERIAL PRIMARY KEY,
    source_ip        TEXT NOT NULL,
    destination_ip   TEXT NOT NULL,
    source_port      INTEGER NOT NULL,
    destination_port INTEGER NOT NULL,
    protocol         SMALLINT NOT NULL,
    packet_count     BIGINT NOT NULL,
    byte_count       BIGINT NOT NULL,
    flow_start       TEXT NOT NULL,
    flow_end         TEXT NOT NULL,
    probe_name       TEXT NOT NULL
)";

const INSERT: &str = "INSERT INTO flows (
    source_ip, destination_ip, source_port, destination_port, protocol,
    packet_count, byte_count, flow_start, flow_end, probe_name
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

/// Client/server SQL backend over a PostgreSQL connection. Inserts are
/// parameterized; record values never reach the statement text.
pub struct PostgresSink {
    host:     String,
    port:     u16,
    user:     String,
    password: String,
    dbname:   String,
    client:   Option<Client>,
}

impl PostgresSink {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            host:     config.host.clone(),
            port:     config.port,
            user:     config.user.clone(),
            password: config.password.clone(),
            dbname:   config.dbname.clone(),
            client:   None,
        }
    }

    fn params(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.dbname,
        )
    }
}

impl Sink for PostgresSink {
    fn open(&mut self) -> Result<(), Error> {
        self.client = Some(Client::connect(&self.params(), NoTls)?);
        self.ensure_schema()?;
        info!("postgres database {} on {} ready", self.dbname, self.host);
        Ok(())
    }

    fn ensure_schema(&mut self) -> Result<(), Error> {
        let client = self.client.as_mut().ok_or(Error::Closed)?;
        client.batch_execute(SCHEMA)?;
        Ok(())
    }

    fn write(&mut self, record: &FlowRecord) -> Result<(), Error> {
        let client = self.client.as_mut().ok_or(Error::Closed)?;

        let source_port      = i32::from(record.source_port);
        let destination_port = i32::from(record.destination_port);
        let protocol         = i16::from(record.protocol);
        let packet_count     = i64::from(record.packet_count);
        let byte_count       = i64::from(record.byte_count);

        client.execute(INSERT, &[
            &record.source_ip,
            &record.destination_ip,
            &source_port,
            &destination_port,
            &protocol,
            &packet_count,
            &byte_count,
            &record.flow_start,
            &record.flow_end,
            &record.probe_name,
        ])?;
        Ok(())
    }

    fn health_check(&mut self) -> Result<(), Error> {
        let mut client = Client::connect(&self.params(), NoTls)?;
        client.simple_query("SELECT 1")?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.close();
        }
    }
}
