use anyhow::Result;
use base::settings::Settings;
use market_data::charts::market_data_chart;
use market_data::SeriesKey;
use market_data_runners::prompt::choose;
use market_data_runners::{dataset_storage, init_logging, write_chart};
use std::io;
use std::path::Path;

const CHART_FILE: &str = "market_data_chart.html";

fn main() -> Result<()> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_level)?;

    let dataset = dataset_storage(&settings.storage).load_dataset()?;

    let symbols: Vec<String> = dataset.symbols().cloned().collect();
    let symbol = choose("symbol", &symbols, io::stdin().lock(), io::stdout())?;

    let timeframes = dataset.timeframes(&symbol);
    let timeframe = choose("resolution", &timeframes, io::stdin().lock(), io::stdout())?;

    let key = SeriesKey::new(symbol, timeframe);
    let candles = dataset
        .series(&key)
        .map(|series| series.candles())
        .unwrap_or_default();

    log::info!("{} candles of {}", candles.len(), key);

    let plot = market_data_chart(&key, candles);
    write_chart(&plot, Path::new(CHART_FILE));
    plot.show();

    Ok(())
}
