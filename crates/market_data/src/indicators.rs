//! Technical indicators for charts. Every output has the length of the input,
//! the values that can't be calculated yet are `None`.

use base::entities::Candle;
use base::helpers::price_to_f64;

pub type IndicatorValue = f64;
pub type IndicatorLine = Vec<Option<IndicatorValue>>;
pub type Period = usize;

pub const RSI_PERIOD: Period = 14;
pub const MACD_FAST_PERIOD: Period = 12;
pub const MACD_SLOW_PERIOD: Period = 26;
pub const MACD_SIGNAL_PERIOD: Period = 9;
pub const BOLLINGER_PERIOD: Period = 20;
pub const BOLLINGER_DEVIATIONS: f64 = 2.0;
pub const STOCHASTIC_FAST_K_PERIOD: Period = 14;
pub const STOCHASTIC_SLOW_K_PERIOD: Period = 3;
pub const STOCHASTIC_SLOW_D_PERIOD: Period = 3;
pub const ADX_PERIOD: Period = 14;
pub const ATR_PERIOD: Period = 14;

pub fn sma(values: &[f64], period: Period) -> IndicatorLine {
    let mut line = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return line;
    }

    let mut sum: f64 = values[..period].iter().sum();
    line[period - 1] = Some(sum / period as f64);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        line[i] = Some(sum / period as f64);
    }

    line
}

/// Exponential moving average seeded with the simple average of the first `period` values.
pub fn ema(values: &[f64], period: Period) -> IndicatorLine {
    let mut line = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return line;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut previous = values[..period].iter().sum::<f64>() / period as f64;
    line[period - 1] = Some(previous);

    for i in period..values.len() {
        previous = (values[i] - previous) * k + previous;
        line[i] = Some(previous);
    }

    line
}

/// Applies the calculation to the defined tail of the line and shifts the result back.
fn over_defined_values(
    line: &[Option<f64>],
    calculate: impl Fn(&[f64]) -> IndicatorLine,
) -> IndicatorLine {
    let first_defined = match line.iter().position(Option::is_some) {
        Some(i) => i,
        None => return vec![None; line.len()],
    };

    let values: Vec<f64> = line[first_defined..]
        .iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect();

    let mut result = vec![None; first_defined];
    result.extend(calculate(&values));
    result
}

/// Wilder's smoothing: the first value is the average of `period` values, then
/// `previous + (value - previous) / period`. `values[0]` is skipped, as it has no previous candle.
fn wilder_average_from_second(values: &[f64], period: Period) -> IndicatorLine {
    let mut line = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return line;
    }

    let mut previous = values[1..=period].iter().sum::<f64>() / period as f64;
    line[period] = Some(previous);

    for i in period + 1..values.len() {
        previous += (values[i] - previous) / period as f64;
        line[i] = Some(previous);
    }

    line
}

pub fn rsi(closes: &[f64], period: Period) -> IndicatorLine {
    let gains: Vec<f64> = (0..closes.len())
        .map(|i| if i == 0 { 0.0 } else { (closes[i] - closes[i - 1]).max(0.0) })
        .collect();
    let losses: Vec<f64> = (0..closes.len())
        .map(|i| if i == 0 { 0.0 } else { (closes[i - 1] - closes[i]).max(0.0) })
        .collect();

    let average_gains = wilder_average_from_second(&gains, period);
    let average_losses = wilder_average_from_second(&losses, period);

    average_gains
        .into_iter()
        .zip(average_losses)
        .map(|(gain, loss)| match (gain, loss) {
            (Some(gain), Some(loss)) if loss == 0.0 => Some(if gain == 0.0 { 50.0 } else { 100.0 }),
            (Some(gain), Some(loss)) => Some(100.0 - 100.0 / (1.0 + gain / loss)),
            _ => None,
        })
        .collect()
}

pub struct Macd {
    pub macd: IndicatorLine,
    pub signal: IndicatorLine,
}

pub fn macd(closes: &[f64], fast: Period, slow: Period, signal: Period) -> Macd {
    let fast_line = ema(closes, fast);
    let slow_line = ema(closes, slow);

    let macd: IndicatorLine = fast_line
        .into_iter()
        .zip(slow_line)
        .map(|(fast, slow)| Some(fast? - slow?))
        .collect();

    let signal = over_defined_values(&macd, |values| ema(values, signal));

    Macd { macd, signal }
}

pub struct BollingerBands {
    pub upper: IndicatorLine,
    pub middle: IndicatorLine,
    pub lower: IndicatorLine,
}

pub fn bollinger_bands(closes: &[f64], period: Period, deviations: f64) -> BollingerBands {
    let middle = sma(closes, period);
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];

    for (i, mean) in middle.iter().enumerate() {
        if let Some(mean) = mean {
            let window = &closes[i + 1 - period..=i];
            let variance =
                window.iter().map(|close| (close - mean).powi(2)).sum::<f64>() / period as f64;
            let deviation = variance.sqrt() * deviations;

            upper[i] = Some(mean + deviation);
            lower[i] = Some(mean - deviation);
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

pub struct Stochastic {
    pub slow_k: IndicatorLine,
    pub slow_d: IndicatorLine,
}

pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    fast_k_period: Period,
    slow_k_period: Period,
    slow_d_period: Period,
) -> Stochastic {
    let fast_k: IndicatorLine = (0..closes.len())
        .map(|i| {
            if fast_k_period == 0 || i + 1 < fast_k_period {
                return None;
            }

            let window = i + 1 - fast_k_period..=i;
            let highest = highs[window.clone()].iter().copied().fold(f64::MIN, f64::max);
            let lowest = lows[window].iter().copied().fold(f64::MAX, f64::min);

            Some(if highest == lowest {
                0.0
            } else {
                (closes[i] - lowest) / (highest - lowest) * 100.0
            })
        })
        .collect();

    let slow_k = over_defined_values(&fast_k, |values| sma(values, slow_k_period));
    let slow_d = over_defined_values(&slow_k, |values| sma(values, slow_d_period));

    Stochastic { slow_k, slow_d }
}

fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            if i == 0 {
                return highs[0] - lows[0];
            }

            (highs[i] - lows[i])
                .max((highs[i] - closes[i - 1]).abs())
                .max((lows[i] - closes[i - 1]).abs())
        })
        .collect()
}

pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: Period) -> IndicatorLine {
    wilder_average_from_second(&true_ranges(highs, lows, closes), period)
}

pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: Period) -> IndicatorLine {
    let len = closes.len();
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];

    for i in 1..len {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];

        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let true_ranges = true_ranges(highs, lows, closes);

    // smoothed sums and averages differ by the constant `period`, which cancels out in DI
    let smoothed_true_ranges = wilder_average_from_second(&true_ranges, period);
    let smoothed_plus_dm = wilder_average_from_second(&plus_dm, period);
    let smoothed_minus_dm = wilder_average_from_second(&minus_dm, period);

    let dx: IndicatorLine = (0..len)
        .map(|i| {
            let true_range = smoothed_true_ranges[i]?;
            if true_range == 0.0 {
                return Some(0.0);
            }

            let plus_di = smoothed_plus_dm[i]? / true_range * 100.0;
            let minus_di = smoothed_minus_dm[i]? / true_range * 100.0;

            Some(if plus_di + minus_di == 0.0 {
                0.0
            } else {
                (plus_di - minus_di).abs() / (plus_di + minus_di) * 100.0
            })
        })
        .collect();

    // the first dx has no predecessor to skip, so an artificial one is put in front
    over_defined_values(&dx, |values| {
        let mut shifted = Vec::with_capacity(values.len() + 1);
        shifted.push(0.0);
        shifted.extend_from_slice(values);

        let mut line = wilder_average_from_second(&shifted, period);
        line.remove(0);
        line
    })
}

pub fn obv(closes: &[f64], volumes: &[f64]) -> IndicatorLine {
    let mut line = Vec::with_capacity(closes.len());
    let mut current = 0.0;

    for i in 0..closes.len() {
        if i == 0 {
            current = volumes[0];
        } else if closes[i] > closes[i - 1] {
            current += volumes[i];
        } else if closes[i] < closes[i - 1] {
            current -= volumes[i];
        }

        line.push(Some(current));
    }

    line
}

/// All the indicators shown on the market data chart.
pub struct Indicators {
    pub rsi: IndicatorLine,
    pub macd: Macd,
    pub bollinger_bands: BollingerBands,
    pub stochastic: Stochastic,
    pub adx: IndicatorLine,
    pub obv: IndicatorLine,
    pub atr: IndicatorLine,
}

impl Indicators {
    pub fn calculate(candles: &[Candle]) -> Self {
        let highs: Vec<f64> = candles.iter().map(|c| price_to_f64(c.high)).collect();
        let lows: Vec<f64> = candles.iter().map(|c| price_to_f64(c.low)).collect();
        let closes: Vec<f64> = candles.iter().map(|c| price_to_f64(c.close)).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.tick_volume as f64).collect();

        Self {
            rsi: rsi(&closes, RSI_PERIOD),
            macd: macd(&closes, MACD_FAST_PERIOD, MACD_SLOW_PERIOD, MACD_SIGNAL_PERIOD),
            bollinger_bands: bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_DEVIATIONS),
            stochastic: stochastic(
                &highs,
                &lows,
                &closes,
                STOCHASTIC_FAST_K_PERIOD,
                STOCHASTIC_SLOW_K_PERIOD,
                STOCHASTIC_SLOW_D_PERIOD,
            ),
            adx: adx(&highs, &lows, &closes, ADX_PERIOD),
            obv: obv(&closes, &volumes),
            atr: atr(&highs, &lows, &closes, ATR_PERIOD),
        }
    }
}
