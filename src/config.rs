use std::collections::HashMap;
use std::fs;
use std::str::FromStr;
use anyhow::{bail, Context, Result};

/// Which persistence backend the probes write to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SinkKind {
    EmbeddedSql,
    ClientServerSql,
    DelimitedText,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub kind:     SinkKind,
    pub path:     String,
    pub host:     String,
    pub port:     u16,
    pub user:     String,
    pub password: String,
    pub dbname:   String,
}

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub name:    String,
    pub version: String,
    /// Source address the probe accepts datagrams from; `None` accepts all.
    pub filter:  Option<String>,
    pub port:    u16,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub syslog:   bool,
    pub probes:   Vec<ProbeConfig>,
}

/// Loads and validates the configuration file. Any missing required field
/// is fatal: the caller exits with status 1.
pub fn load(path: &str) -> Result<Config> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot open configuration file: {}", path))?;
    parse(&text)
}

fn parse(text: &str) -> Result<Config> {
    let ini = Ini::parse(text);

    let kind = match ini.get("Database", "type").unwrap_or("") {
        "embedded-sql"      => SinkKind::EmbeddedSql,
        "client-server-sql" => SinkKind::ClientServerSql,
        "delimited-text"    => SinkKind::DelimitedText,
        ""                  => bail!("[Database] type is not set"),
        other               => bail!("database type not implemented: {}", other),
    };

    let database = DatabaseConfig {
        kind,
        path:     ini.get("Database", "path").unwrap_or("").to_owned(),
        host:     ini.get("Database", "host").unwrap_or("localhost").to_owned(),
        port:     ini.int("Database", "port").unwrap_or(5432),
        user:     ini.get("Database", "user").unwrap_or("").to_owned(),
        password: ini.get("Database", "password").unwrap_or("").to_owned(),
        dbname:   ini.get("Database", "dbname").unwrap_or("").to_owned(),
    };

    if database.path.is_empty() && database.kind != SinkKind::ClientServerSql {
        bail!("[Database] path is required for this database type");
    }

    let syslog = ini.int("General", "log").unwrap_or(0) == 1;

    let count: usize = ini.int("SondeCount", "count").unwrap_or(0);
    let mut probes = Vec::with_capacity(count);

    for i in 1..=count {
        let section = format!("Sonda{}", i);

        let name    = ini.get(&section, "name").unwrap_or("").to_owned();
        let version = ini.get(&section, "version").unwrap_or("").to_owned();
        let port    = ini.int(&section, "port").unwrap_or(0);
        let filter  = ini.get(&section, "listen_address")
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        if name.is_empty() || port == 0 {
            bail!("missing data in configuration for {}", section);
        }

        probes.push(ProbeConfig { name, version, filter, port });
    }

    Ok(Config { database, syslog, probes })
}

/// Key/value file with `[section]` groups, `;` and `#` comments and
/// whitespace-trimmed `key = value` pairs.
#[derive(Debug, Default)]
struct Ini {
    sections: HashMap<String, HashMap<String, String>>,
}

impl Ini {
    fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();

        for line in text.lines() {
            let line = match line.find(|c: char| c == ';' || c == '#') {
                Some(n) => &line[..n],
                None    => line,
            };
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current = line[1..line.len() - 1].to_owned();
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                sections.entry(current.clone())
                    .or_default()
                    .insert(key.trim().to_owned(), value.trim().to_owned());
            }
        }

        Self { sections }
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    /// Absent or unparseable values fall back to the caller's default.
    fn int<T: FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.get(section, key).and_then(|v| v.parse().ok())
    }
}
