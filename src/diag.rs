use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use anyhow::{Context, Result};
use log::warn;
use parking_lot::Mutex;

/// Hex-dump trace of every received datagram, shared by all probe
/// threads. One datagram's dump is a single critical section so its
/// lines stay contiguous in the file.
pub struct Diag {
    path: String,
    file: Mutex<File>,
}

impl Diag {
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("cannot open diagnostic file: {}", path))?;

        Ok(Self { path: path.to_owned(), file: Mutex::new(file) })
    }

    pub fn record(&self, probe: &str, data: &[u8]) {
        let mut dump = String::with_capacity(data.len() * 3 + probe.len() + 16);

        let _ = writeln!(dump, "Probe: {}", probe);
        dump.push_str("Data: ");
        for byte in data {
            let _ = write!(dump, "{:02x} ", byte);
        }
        dump.push_str("\n\n");

        let mut file = self.file.lock();
        if let Err(e) = file.write_all(dump.as_bytes()) {
            warn!("cannot write diagnostic file {}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use super::*;

    #[test]
    fn dumps_one_block_per_datagram() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("diag.txt");
        let path = path.to_str().unwrap();

        let diag = Diag::open(path)?;
        diag.record("edge", &[0x00, 0x09, 0xff]);
        diag.record("core", &[0x0a]);

        let text = fs::read_to_string(path)?;
        assert_eq!(text, "Probe: edge\nData: 00 09 ff \n\nProbe: core\nData: 0a \n\n");
        Ok(())
    }
}
