use std::fs::{self, File, OpenOptions};
use csv::{Writer, WriterBuilder};
use log::info;
use crate::flow::FlowRecord;
use super::{Error, Sink};

const HEADER: [&str; 10] = [
    "source_ip", "destination_ip", "source_port", "destination_port",
    "protocol", "packet_count", "byte_count", "flow_start", "flow_end",
    "probe_name",
];

/// Append-only delimited text backend. The header row is written once,
/// when the file is created; existing files are appended to as-is.
pub struct TextSink {
    path:   String,
    writer: Option<Writer<File>>,
}

impl TextSink {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_owned(), writer: None }
    }
}

impl Sink for TextSink {
    fn open(&mut self) -> Result<(), Error> {
        self.ensure_schema()?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = Some(WriterBuilder::new().has_headers(false).from_writer(file));
        info!("delimited text file {} ready", self.path);
        Ok(())
    }

    fn ensure_schema(&mut self) -> Result<(), Error> {
        // An empty file counts as absent so the header is never skipped.
        let present = fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
        if present {
            return Ok(());
        }
        let file = File::create(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(())
    }

    fn write(&mut self, record: &FlowRecord) -> Result<(), Error> {
        let writer = self.writer.as_mut().ok_or(Error::Closed)?;
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    fn health_check(&mut self) -> Result<(), Error> {
        OpenOptions::new().append(true).create(true).open(&self.path)?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
