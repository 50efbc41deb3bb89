use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use anyhow::Result;
use log::{debug, info, warn};
use crate::config::ProbeConfig;
use crate::diag::Diag;
use crate::flow::{self, TemplateTable};
use crate::sink::Sink;
use super::{filter, socket};
use super::socket::Received;

/// The running probe set. Each probe gets its own thread, socket,
/// template table and sink; nothing on the decode path is shared.
pub struct Probes {
    threads: Vec<JoinHandle<()>>,
    stop:    Arc<AtomicBool>,
}

impl Probes {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self { threads: Vec::new(), stop }
    }

    /// Binds the probe's socket and starts its receive loop. Bind and
    /// sink failures belong to startup and stay fatal to the caller.
    pub fn add(
        &mut self,
        config: ProbeConfig,
        sink: Box<dyn Sink>,
        diag: Option<Arc<Diag>>,
        display: bool,
    ) -> Result<()> {
        let socket = socket::bind(config.port)?;
        let name   = config.name.clone();
        let port   = config.port;

        let mut task = Task {
            config,
            socket,
            templates: TemplateTable::new(),
            sink,
            diag,
            display,
            stop: self.stop.clone(),
        };

        self.threads.push(thread::spawn(move || {
            info!("probe {} listening on port {}", name, port);
            match task.poll() {
                Ok(())  => debug!("probe {} finished", name),
                Err(e)  => warn!("probe {} stopped: {:?}", name, e),
            }
            task.sink.close();
        }));

        Ok(())
    }

    pub fn join(self) {
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}

struct Task {
    config:    ProbeConfig,
    socket:    UdpSocket,
    templates: TemplateTable,
    sink:      Box<dyn Sink>,
    diag:      Option<Arc<Diag>>,
    display:   bool,
    stop:      Arc<AtomicBool>,
}

impl Task {
    fn poll(&mut self) -> Result<()> {
        let mut buf = [0u8; socket::MAX_DATAGRAM];

        while !self.stop.load(Ordering::Acquire) {
            match socket::receive_one(&self.socket, &mut buf)? {
                Received::Datagram(len, from) => self.handle(&buf[..len], from),
                Received::Idle                => continue,
            }
        }

        Ok(())
    }

    fn handle(&mut self, data: &[u8], from: SocketAddr) {
        let accepted = filter::accept(from.ip(), self.config.filter.as_deref());

        if self.display {
            let status = match (accepted, self.config.filter.as_deref()) {
                (true, _)         => "[ACCEPTED]".to_owned(),
                (false, expected) => {
                    format!("[REJECTED] (Expected source IP: {})", expected.unwrap_or(""))
                }
            };
            println!("Received packet from {} on port {} {}", from.ip(), self.config.port, status);
        }

        if let Some(diag) = &self.diag {
            diag.record(&self.config.name, data);
        }

        if !accepted {
            return;
        }

        match flow::datagram(data, &mut self.templates, &self.config.name, self.sink.as_mut()) {
            Ok(records) => debug!("probe {}: {} flow records", self.config.name, records),
            Err(e)      => warn!("probe {}: {}", self.config.name, e),
        }
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use crate::flow::FlowRecord;
    use crate::sink::{self, Sink};
    use super::*;

    #[derive(Default)]
    struct Memory {
        records: Vec<FlowRecord>,
    }

    impl Sink for Memory {
        fn open(&mut self) -> Result<(), sink::Error> { Ok(()) }
        fn ensure_schema(&mut self) -> Result<(), sink::Error> { Ok(()) }
        fn write(&mut self, record: &FlowRecord) -> Result<(), sink::Error> {
            self.records.push(record.clone());
            Ok(())
        }
        fn health_check(&mut self) -> Result<(), sink::Error> { Ok(()) }
        fn close(&mut self) {}
    }

    fn task(filter: Option<&str>) -> Result<Task> {
        Ok(Task {
            config: ProbeConfig {
                name:    "edge".to_owned(),
                version: "9".to_owned(),
                filter:  filter.map(str::to_owned),
                port:    0,
            },
            socket:    UdpSocket::bind("127.0.0.1:0")?,
            templates: TemplateTable::new(),
            sink:      Box::new(Memory::default()),
            diag:      None,
            display:   false,
            stop:      Arc::new(AtomicBool::new(false)),
        })
    }

    fn template_datagram() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&9u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&[0; 16]);
        buf.extend_from_slice(&0u16.to_be_bytes());   // template flowset
        buf.extend_from_slice(&12u16.to_be_bytes());
        buf.extend_from_slice(&256u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&8u16.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf
    }

    #[test]
    fn rejected_source_leaves_no_trace() -> Result<()> {
        let mut task = task(Some("192.0.2.10"))?;
        task.handle(&template_datagram(), "192.0.2.11:2055".parse()?);
        assert!(task.templates.is_empty());
        Ok(())
    }

    #[test]
    fn accepted_source_reaches_the_decoder() -> Result<()> {
        let mut task = task(Some("192.0.2.10"))?;
        task.handle(&template_datagram(), "192.0.2.10:2055".parse()?);
        assert_eq!(task.templates.len(), 1);
        Ok(())
    }
}
