// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Log module sets up a file logger, reference
//! https://docs.rs/log4rs
//!
//! The rest of the crate only uses the `log` facade, so any other logger
//! installed by the host application works as well.

use crate::error::{PostFxError, PostFxResult};
use log::LevelFilter;
use log4rs::{
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

/// Log line layout: time, level, target, message
pub const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} {m}{n}";

/// init logs system, writing to `file_path`
pub fn init_log(level: LevelFilter, file_path: &str) -> PostFxResult<()> {
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(file_path)?;
    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("logfile", Box::new(logfile)),
        )
        .build(Root::builder().appender("logfile").build(level))
        .map_err(|e| PostFxError::Logging(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| PostFxError::Logging(e.to_string()))?;
    Ok(())
}
