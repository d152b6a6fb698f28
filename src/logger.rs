use {
  crate::Result,
  anyhow::Context,
  log::LevelFilter,
  log4rs::{
    append::{
      console::ConsoleAppender,
      rolling_file::{
        policy::compound::{
          roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
      },
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
  },
  std::path::Path,
};

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l} [{t}] {m}{n}";
const LOG_FILE_SIZE_LIMIT: u64 = 50 * 1024 * 1024;
const LOG_FILE_COUNT: u32 = 10;

/// Console plus size-rotated, gzipped file logging.
pub fn init(level: LevelFilter, dir: &Path) -> Result {
  let stdout = ConsoleAppender::builder()
    .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
    .build();

  let roller = FixedWindowRoller::builder().build(
    dir
      .join("memepool.{}.log.gz")
      .to_str()
      .context("log directory is not valid UTF-8")?,
    LOG_FILE_COUNT,
  )?;

  let policy = CompoundPolicy::new(
    Box::new(SizeTrigger::new(LOG_FILE_SIZE_LIMIT)),
    Box::new(roller),
  );

  let file = RollingFileAppender::builder()
    .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
    .build(dir.join("memepool.log"), Box::new(policy))?;

  let config = Config::builder()
    .appender(Appender::builder().build("stdout", Box::new(stdout)))
    .appender(Appender::builder().build("file", Box::new(file)))
    .build(
      Root::builder()
        .appender("stdout")
        .appender("file")
        .build(level),
    )?;

  log4rs::init_config(config)?;

  Ok(())
}
