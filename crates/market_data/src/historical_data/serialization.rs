use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use base::entities::{Candle, CandlePrice, TickVolume, Timeframe};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::{Dataset, Series, SeriesKey};

const CSV_EXTENSION: &str = "csv";
const TEMPORARY_FILE_SUFFIX: &str = ".tmp";

pub trait DatasetStorage {
    /// Returns `None` if nothing was stored yet.
    fn try_to_load_dataset(&self) -> Result<Option<Dataset>>;

    /// Stores the dataset after the given series was changed.
    fn save_dataset(&self, dataset: &Dataset, updated_series: &SeriesKey) -> Result<()>;

    fn load_dataset(&self) -> Result<Dataset> {
        self.try_to_load_dataset()?
            .context("there is no stored dataset, add a series first")
    }
}

impl<S: DatasetStorage + ?Sized> DatasetStorage for Box<S> {
    fn try_to_load_dataset(&self) -> Result<Option<Dataset>> {
        (**self).try_to_load_dataset()
    }

    fn save_dataset(&self, dataset: &Dataset, updated_series: &SeriesKey) -> Result<()> {
        (**self).save_dataset(dataset, updated_series)
    }
}

fn create_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("error on creating directory {:?}", parent))?;
        }
    }

    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut temporary_path = OsString::from(path.as_os_str());
    temporary_path.push(TEMPORARY_FILE_SUFFIX);
    PathBuf::from(temporary_path)
}

/// Writes the file next to its destination first, so a crash in the middle of writing
/// never leaves a truncated file behind.
fn write_through_temporary_file(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    create_parent_dirs(path)?;

    let temporary_path = temporary_path(path);
    let mut writer = BufWriter::new(
        File::create(&temporary_path)
            .with_context(|| format!("error on creating file {:?}", temporary_path))?,
    );

    write(&mut writer)?;
    writer.flush()?;
    drop(writer);

    fs::rename(&temporary_path, path)
        .with_context(|| format!("error on moving {:?} to {:?}", temporary_path, path))
}

/// The whole dataset in a single json file, rewritten on every save.
pub struct JsonSnapshotStorage {
    path: PathBuf,
}

impl JsonSnapshotStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetStorage for JsonSnapshotStorage {
    fn try_to_load_dataset(&self) -> Result<Option<Dataset>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("error on opening snapshot {:?}", self.path))?;

        let dataset = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("error on deserializing snapshot {:?}", self.path))?;

        Ok(Some(dataset))
    }

    fn save_dataset(&self, dataset: &Dataset, _updated_series: &SeriesKey) -> Result<()> {
        write_through_temporary_file(&self.path, |writer| {
            serde_json::to_writer(writer, dataset).context("error on serializing the dataset")
        })?;

        log::debug!("dataset saved to {:?}", self.path);

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct CsvCandle {
    time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    tick_volume: TickVolume,
}

impl From<&Candle> for CsvCandle {
    fn from(candle: &Candle) -> Self {
        Self {
            time: candle.time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            open: candle.open.to_string(),
            high: candle.high.to_string(),
            low: candle.low.to_string(),
            close: candle.close.to_string(),
            tick_volume: candle.tick_volume,
        }
    }
}

impl TryFrom<CsvCandle> for Candle {
    type Error = anyhow::Error;

    fn try_from(candle: CsvCandle) -> Result<Self> {
        let price = |price: &str| {
            CandlePrice::from_str(price).with_context(|| format!("invalid price {}", price))
        };

        Ok(Candle {
            time: DateTime::parse_from_rfc3339(&candle.time)
                .with_context(|| format!("invalid candle time {}", candle.time))?
                .with_timezone(&Utc),
            open: price(&candle.open)?,
            high: price(&candle.high)?,
            low: price(&candle.low)?,
            close: price(&candle.close)?,
            tick_volume: candle.tick_volume,
        })
    }
}

/// Every series in its own csv file: `{directory}/{symbol}/{timeframe}.csv`.
/// Only the updated series is rewritten on save.
pub struct CsvSeriesStorage {
    directory: PathBuf,
}

impl CsvSeriesStorage {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn series_path(&self, key: &SeriesKey) -> PathBuf {
        let mut path = self.directory.clone();
        path.push(&key.symbol);
        path.push(format!("{}.{}", key.timeframe, CSV_EXTENSION));
        path
    }

    fn read_series(path: &Path) -> Result<Series> {
        let mut reader = Reader::from_path(path)
            .with_context(|| format!("error on creating a reader from {:?}", path))?;

        let mut candles = Vec::new();
        for candle in reader.deserialize() {
            let candle: CsvCandle =
                candle.with_context(|| format!("error on deserializing a candle of {:?}", path))?;
            candles.push(Candle::try_from(candle)?);
        }

        Series::try_from(candles).with_context(|| format!("invalid series in {:?}", path))
    }

    fn write_series(path: &Path, series: &Series) -> Result<()> {
        write_through_temporary_file(path, |writer| {
            let mut csv_writer = Writer::from_writer(writer);
            for candle in series.candles() {
                csv_writer.serialize(CsvCandle::from(candle))?;
            }
            csv_writer.flush()?;
            Ok(())
        })
    }
}

impl DatasetStorage for CsvSeriesStorage {
    fn try_to_load_dataset(&self) -> Result<Option<Dataset>> {
        if !self.directory.exists() {
            return Ok(None);
        }

        let mut dataset = Dataset::new();

        for symbol_entry in fs::read_dir(&self.directory)
            .with_context(|| format!("error on reading directory {:?}", self.directory))?
        {
            let symbol_entry = symbol_entry?;
            if !symbol_entry.file_type()?.is_dir() {
                continue;
            }

            let symbol = symbol_entry.file_name().to_string_lossy().to_string();

            for series_entry in fs::read_dir(symbol_entry.path())? {
                let series_path = series_entry?.path();
                if series_path.extension().and_then(OsStr::to_str) != Some(CSV_EXTENSION) {
                    continue;
                }

                let timeframe = series_path
                    .file_stem()
                    .and_then(OsStr::to_str)
                    .context("no file name of a series")
                    .and_then(Timeframe::from_str)
                    .with_context(|| format!("unknown timeframe of {:?}", series_path))?;

                dataset.insert_series(
                    SeriesKey::new(symbol.clone(), timeframe),
                    Self::read_series(&series_path)?,
                );
            }
        }

        Ok(Some(dataset))
    }

    fn save_dataset(&self, dataset: &Dataset, updated_series: &SeriesKey) -> Result<()> {
        let series = dataset
            .series(updated_series)
            .with_context(|| format!("there is no {} series in the dataset", updated_series))?;

        let path = self.series_path(updated_series);
        Self::write_series(&path, series)?;

        log::debug!("{} series saved to {:?}", updated_series, path);

        Ok(())
    }
}
