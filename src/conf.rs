use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SLOW_REQUEST_SECS: f64 = 5.0;
const DB_FILE_NAME: &str = "plots.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::InvalidInput(format!(
                "Unknown log format: {other}, expected text or json"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conf {
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub slow_request_secs: f64,
}

impl Conf {
    pub fn from_env() -> Result<Conf> {
        Conf::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Conf> {
        let db_path = match lookup("PLOTS_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_db_path(&lookup)?,
        };
        Ok(Conf {
            db_path,
            bind_addr: lookup("PLOTS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            port: parse(&lookup, "PLOTS_PORT")?.unwrap_or(DEFAULT_PORT),
            log_format: parse(&lookup, "PLOTS_LOG_FORMAT")?.unwrap_or(LogFormat::Text),
            slow_request_secs: parse(&lookup, "PLOTS_SLOW_REQUEST_SECS")?
                .unwrap_or(DEFAULT_SLOW_REQUEST_SECS),
        })
    }
}

/// `$XDG_DATA_HOME/plots/plots.db`, falling back to `~/.local/share`.
fn default_db_path(lookup: &impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    let data_home = match lookup("XDG_DATA_HOME").filter(|it| !it.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => lookup("HOME")
            .filter(|it| !it.is_empty())
            .map(|home| PathBuf::from(home).join(".local/share"))
            .ok_or_else(|| {
                Error::InvalidInput("Set PLOTS_DB_PATH, HOME is not defined".into())
            })?,
    };
    Ok(data_home.join("plots").join(DB_FILE_NAME))
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    lookup(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| Error::InvalidInput(format!("Invalid value of {key}: {value}")))
        })
        .transpose()
}

#[cfg(test)]
mod test {
    use super::{Conf, LogFormat};
    use crate::{Error, Result};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() -> Result<()> {
        let conf = Conf::from_lookup(lookup(&[("PLOTS_DB_PATH", "/tmp/plots.db")]))?;
        assert_eq!(PathBuf::from("/tmp/plots.db"), conf.db_path);
        assert_eq!("127.0.0.1", conf.bind_addr);
        assert_eq!(8000, conf.port);
        assert_eq!(LogFormat::Text, conf.log_format);
        assert_eq!(5.0, conf.slow_request_secs);
        Ok(())
    }

    #[test]
    fn default_db_path() -> Result<()> {
        let conf = Conf::from_lookup(lookup(&[("HOME", "/home/farmer")]))?;
        assert_eq!(
            PathBuf::from("/home/farmer/.local/share/plots/plots.db"),
            conf.db_path
        );
        let conf = Conf::from_lookup(lookup(&[
            ("HOME", "/home/farmer"),
            ("XDG_DATA_HOME", "/srv/data"),
        ]))?;
        assert_eq!(PathBuf::from("/srv/data/plots/plots.db"), conf.db_path);
        assert!(matches!(
            Conf::from_lookup(lookup(&[])),
            Err(Error::InvalidInput(_))
        ));
        Ok(())
    }

    #[test]
    fn overrides() -> Result<()> {
        let conf = Conf::from_lookup(lookup(&[
            ("PLOTS_DB_PATH", "/tmp/plots.db"),
            ("PLOTS_BIND_ADDR", "0.0.0.0"),
            ("PLOTS_PORT", "9000"),
            ("PLOTS_LOG_FORMAT", "json"),
            ("PLOTS_SLOW_REQUEST_SECS", "0.5"),
        ]))?;
        assert_eq!("0.0.0.0", conf.bind_addr);
        assert_eq!(9000, conf.port);
        assert_eq!(LogFormat::Json, conf.log_format);
        assert_eq!(0.5, conf.slow_request_secs);
        Ok(())
    }

    #[test]
    fn invalid_values() {
        for (key, value) in [
            ("PLOTS_PORT", "eighty"),
            ("PLOTS_LOG_FORMAT", "xml"),
            ("PLOTS_SLOW_REQUEST_SECS", "soon"),
        ] {
            let res = Conf::from_lookup(lookup(&[("PLOTS_DB_PATH", "/tmp/plots.db"), (key, value)]));
            assert!(matches!(res, Err(Error::InvalidInput(_))), "{key}");
        }
    }
}
