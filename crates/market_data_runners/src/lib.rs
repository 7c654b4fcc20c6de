use anyhow::{Context, Result};
use base::notifier::{LogNotifier, Notifier, TelegramNotifier};
use base::requests::ureq::UreqRequestApi;
use base::settings::{Settings, StorageFormat, StorageSettings};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use market_data::historical_data::serialization::{
    CsvSeriesStorage, DatasetStorage, JsonSnapshotStorage,
};
use plotly::Plot;
use std::path::Path;
use trading_apis::{MetaapiAccountApi, MetaapiMarketDataApi};

pub mod prompt;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";
const LOG_FILE: &str = "logs/market_data.log";
const ROLLED_LOG_FILES: &str = "logs/market_data.{}.log.gz";
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;
const NUMBER_OF_ROLLED_LOG_FILES: u32 = 5;

/// Logs to the console and to a size-rotated file under `logs/`.
pub fn init_logging(level: LevelFilter) -> Result<()> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let roller = FixedWindowRoller::builder()
        .build(ROLLED_LOG_FILES, NUMBER_OF_ROLLED_LOG_FILES)
        .context("error on creating a log roller")?;

    let file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(
            LOG_FILE,
            Box::new(CompoundPolicy::new(
                Box::new(SizeTrigger::new(MAX_LOG_FILE_SIZE)),
                Box::new(roller),
            )),
        )
        .with_context(|| format!("error on opening log file {}", LOG_FILE))?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(level),
        )
        .context("invalid logging config")?;

    log4rs::init_config(config).context("error on initializing logging")?;

    Ok(())
}

pub fn dataset_storage(settings: &StorageSettings) -> Box<dyn DatasetStorage> {
    match settings.format {
        StorageFormat::JsonSnapshot => Box::new(JsonSnapshotStorage::new(&settings.path)),
        StorageFormat::CsvSeries => Box::new(CsvSeriesStorage::new(&settings.path)),
    }
}

/// Telegram if it's configured, the log otherwise.
pub fn notifier(settings: &Settings) -> Box<dyn Notifier> {
    match &settings.telegram {
        Some(telegram) => Box::new(TelegramNotifier::new(
            telegram.bot_token.clone(),
            telegram.chat_id.clone(),
            UreqRequestApi::new(),
        )),
        None => {
            log::warn!("telegram isn't configured, notifications go to the log only");
            Box::new(LogNotifier::new(settings.target_logger.clone()))
        }
    }
}

pub fn market_data_api(settings: &Settings) -> MetaapiMarketDataApi<UreqRequestApi> {
    MetaapiMarketDataApi::new(
        (&settings.metaapi).into(),
        (&settings.metaapi).into(),
        settings.target_logger.clone(),
        UreqRequestApi::new(),
    )
}

pub fn account_api(settings: &Settings) -> MetaapiAccountApi<UreqRequestApi> {
    MetaapiAccountApi::new(
        (&settings.metaapi).into(),
        (&settings.metaapi).into(),
        Default::default(),
        settings.target_logger.clone(),
        UreqRequestApi::new(),
    )
}

pub fn write_chart(plot: &Plot, path: &Path) {
    plot.write_html(path);
    log::info!("the chart is written to {:?}", path);
}
