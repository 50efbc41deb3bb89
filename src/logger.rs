use anyhow::{anyhow, Result};
use log::{LevelFilter, Log, Metadata, Record};
use syslog::{BasicLogger, Facility, Formatter3164};

/// Diagnostics always go to standard error; with `[General] log = 1` the
/// same records are mirrored into the system log.
struct Tee {
    stderr: env_logger::Logger,
    syslog: Option<Box<dyn Log>>,
}

impl Log for Tee {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.stderr.log(record);
        if let Some(syslog) = &self.syslog {
            syslog.log(record);
        }
    }

    fn flush(&self) {
        self.stderr.flush();
        if let Some(syslog) = &self.syslog {
            syslog.flush();
        }
    }
}

pub fn init(syslog: bool) -> Result<()> {
    let stderr = env_logger::Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .build();
    let level = stderr.filter();

    let syslog = match syslog {
        true  => Some(system_log()?),
        false => None,
    };

    log::set_boxed_logger(Box::new(Tee { stderr, syslog }))?;
    log::set_max_level(level);

    Ok(())
}

fn system_log() -> Result<Box<dyn Log>> {
    let formatter = Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process:  "nfsond".to_owned(),
        pid:      std::process::id(),
    };

    let logger = syslog::unix(formatter)
        .map_err(|e| anyhow!("cannot connect to syslog: {}", e))?;

    Ok(Box::new(BasicLogger::new(logger)))
}
