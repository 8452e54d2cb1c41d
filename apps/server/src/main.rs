use anyhow::Context;
use larp::domain::config::{ApiConfig, LoggingConfig};
use larp::kernel::config::load_config;
use larp_logger::{Logger, parse_level, parse_rotation};
use larp_server::Server;

fn init_logging(cfg: &LoggingConfig) -> anyhow::Result<Logger> {
    let mut builder = Logger::builder().name(env!("CARGO_PKG_NAME")).level(parse_level(&cfg.level)?);
    if let Some(filter) = &cfg.filter {
        builder = builder.env_filter(filter.clone());
    }
    let logger = match &cfg.path {
        Some(path) => builder.path(path).rotation(parse_rotation(&cfg.rotation)?).json(cfg.json).init()?,
        None => builder.init()?,
    };
    Ok(logger)
}

#[larp_runtime::main(high_performance)]
async fn main() -> anyhow::Result<()> {
    let cfg: ApiConfig = load_config(Some("server")).context("Critical: Configuration is malformed")?;
    let _log = init_logging(&cfg.logging)?;

    Server::builder().config(cfg).build()?.run().await
}
