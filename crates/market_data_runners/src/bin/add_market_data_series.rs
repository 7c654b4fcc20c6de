use anyhow::{bail, Context, Result};
use base::entities::Timeframe;
use base::settings::Settings;
use chrono::{DateTime, Utc};
use market_data::historical_data::add_series;
use market_data::SeriesKey;
use market_data_runners::{account_api, dataset_storage, init_logging, market_data_api};
use std::env;
use std::str::FromStr;
use trading_apis::AccountApi;

const USAGE: &str = "usage: add_market_data_series <SYMBOL> <RESOLUTION> <START_RFC3339>";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (symbol, timeframe, history_start) = match args.as_slice() {
        [symbol, timeframe, history_start] => (symbol, timeframe, history_start),
        _ => bail!(USAGE),
    };

    let key = SeriesKey::new(symbol.as_str(), Timeframe::from_str(timeframe)?);
    let history_start = DateTime::parse_from_rfc3339(history_start)
        .with_context(|| format!("invalid start of the history: {}", history_start))?
        .with_timezone(&Utc);

    let settings = Settings::from_env()?;
    init_logging(settings.log_level)?;

    account_api(&settings)
        .connect()
        .context("error on connecting to the account")?;

    let number_of_candles = add_series(
        &key,
        history_start,
        &market_data_api(&settings),
        &dataset_storage(&settings.storage),
        Utc::now(),
    )?;

    log::info!("{} series added with {} candles", key, number_of_candles);

    Ok(())
}
