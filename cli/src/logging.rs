use crate::config::LoggingConfig;
use anyhow::Context;

/// Logs go to stderr (stdout carries the rendered output) and, when
/// configured, to a log file as well.
pub fn setup_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level: log::LevelFilter = config.level.parse()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {}", config.level))?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d][%H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = &config.output {
        dispatch = dispatch.chain(
            fern::log_file(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?,
        );
    }

    dispatch.apply()?;
    Ok(())
}
