use anyhow::{Context, Result};
use base::settings::Settings;
use chrono::Utc;
use market_data::historical_data::update_all_series;
use market_data_runners::{account_api, dataset_storage, init_logging, market_data_api, notifier};
use trading_apis::AccountApi;

fn main() -> Result<()> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level)?;

    account_api(&settings)
        .connect()
        .context("error on connecting to the account")?;

    let report = update_all_series(
        &market_data_api(&settings),
        &dataset_storage(&settings.storage),
        &notifier(&settings),
        Utc::now,
    )?;

    log::info!(
        "{} new candles, {} of {} series failed",
        report.number_of_new_candles(),
        report.number_of_failed_series(),
        report.series.len()
    );

    Ok(())
}
