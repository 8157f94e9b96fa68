use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use std::path::Path;

pub const DEFAULT_LOG_FILE: &str = "taxmap.log";

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}";

pub fn setup_default_logging(level: LevelFilter) {
    // Log only to stderr, keep stdout for results.
    let stderr = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));

    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("Logging already initialized: {}", e);
            }
        }
        Err(e) => eprintln!("Bad logging config: {}", e),
    }
}

pub fn setup_file_logging<P: AsRef<Path>>(fp: P, level: LevelFilter) -> std::io::Result<()> {
    // Log to stderr and append to file log.
    let pattern = Box::new(PatternEncoder::new(LOG_PATTERN));

    let logfile = FileAppender::builder()
        .encoder(pattern.clone())
        .build(fp.as_ref())?;

    let stderr = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(pattern)
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .appender(Appender::builder().build("file", Box::new(logfile)))
        .build(
            Root::builder()
                .appender("file")
                .appender("stderr")
                .build(level),
        )
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    log4rs::init_config(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    log::debug!("Logging to {}", fp.as_ref().to_string_lossy());
    Ok(())
}
