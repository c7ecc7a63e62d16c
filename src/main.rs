pub use error::Error;
mod conf;
mod db;
mod error;
mod plot;
mod rest;
mod server;
use conf::{Conf, LogFormat};
use std::env;
use tracing_subscriber::EnvFilter;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[actix_web::main]
async fn main() -> Result<()> {
    let conf = Conf::from_env()?;
    init_logging(conf.log_format);

    let args: Vec<String> = env::args().collect();

    let command = match args.get(1) {
        Some(some) => some.as_str(),
        None => Err(Error::InvalidInput("No actions passed".into()))?,
    };

    match (command, args.get(2).map(String::as_str)) {
        ("server", _) => server::run(conf).await?,
        ("db", Some("migrate")) => {
            let mut conn = db::open_connection(&conf.db_path)?;
            db::migration::run(&mut conn)?;
        }
        ("db", other) => Err(Error::InvalidInput(format!(
            "Unknown db command: {}",
            other.unwrap_or_default()
        )))?,
        (first_arg, _) => Err(Error::InvalidInput(format!("Unknown command: {first_arg}")))?,
    }

    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}
