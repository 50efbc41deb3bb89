use std::fmt;
use crate::config::{DatabaseConfig, SinkKind};
use crate::flow::FlowRecord;

pub use self::postgres::PostgresSink;
pub use self::sqlite::SqliteSink;
pub use self::text::TextSink;

mod postgres;
mod sqlite;
mod text;

#[cfg(test)]
mod test;

/// Capability set shared by every persistence backend. A probe owns its
/// sink by value; rows are independent and never batched in transactions.
pub trait Sink: Send {
    /// Acquires the backend and runs `ensure_schema`.
    fn open(&mut self) -> Result<(), Error>;

    /// Creates the target table or file header if absent; a no-op when it
    /// already exists.
    fn ensure_schema(&mut self) -> Result<(), Error>;

    /// Appends one record. Failures are record-local: the caller logs and
    /// drops the record, never retries.
    fn write(&mut self, record: &FlowRecord) -> Result<(), Error>;

    /// Probes reachability without touching the schema.
    fn health_check(&mut self) -> Result<(), Error>;

    /// Releases resources. Idempotent.
    fn close(&mut self);
}

#[derive(Debug)]
pub enum Error {
    Sqlite(rusqlite::Error),
    Postgres(::postgres::Error),
    Csv(csv::Error),
    Io(std::io::Error),
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Sqlite(e)   => write!(f, "sqlite error: {}", e),
            Error::Postgres(e) => write!(f, "postgres error: {}", e),
            Error::Csv(e)      => write!(f, "csv error: {}", e),
            Error::Io(e)       => write!(f, "i/o error: {}", e),
            Error::Closed      => write!(f, "sink is not open"),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Sqlite(err)
    }
}

impl From<::postgres::Error> for Error {
    fn from(err: ::postgres::Error) -> Self {
        Error::Postgres(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Builds the configured backend without touching any resource.
pub fn make(config: &DatabaseConfig) -> Box<dyn Sink> {
    match config.kind {
        SinkKind::EmbeddedSql     => Box::new(SqliteSink::new(&config.path)),
        SinkKind::ClientServerSql => Box::new(PostgresSink::new(config)),
        SinkKind::DelimitedText   => Box::new(TextSink::new(&config.path)),
    }
}

/// Builds and opens a backend, schema included.
pub fn open(config: &DatabaseConfig) -> Result<Box<dyn Sink>, Error> {
    let mut sink = make(config);
    sink.open()?;
    Ok(sink)
}
