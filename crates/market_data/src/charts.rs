use base::entities::{Candle, CandlePrice};
use base::helpers::price_to_f64;
use plotly::common::{Mode, Title};
use plotly::layout::{Axis, RangeSlider};
use plotly::{Candlestick, Layout, Plot, Scatter};

use crate::indicators::{IndicatorLine, Indicators};
use crate::SeriesKey;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Vertical share of the price panel, the rest is split between the indicator panels.
const PRICE_PANEL_HEIGHT: f64 = 0.4;
const NUMBER_OF_INDICATOR_PANELS: usize = 6;
const PANEL_GAP: f64 = 0.01;

fn indicator_panel_domain(panel: usize) -> [f64; 2] {
    let height = (1.0 - PRICE_PANEL_HEIGHT) / NUMBER_OF_INDICATOR_PANELS as f64;
    let top = 1.0 - PRICE_PANEL_HEIGHT - height * panel as f64;
    [(top - height + PANEL_GAP).max(0.0), top - PANEL_GAP]
}

fn line(
    x: &[String],
    y: IndicatorLine,
    name: &str,
    y_axis: &str,
) -> Box<Scatter<String, Option<f64>>> {
    Scatter::new(x.to_vec(), y)
        .name(name)
        .mode(Mode::Lines)
        .x_axis("x")
        .y_axis(y_axis)
}

fn indicator_axis(panel: usize, title: &str) -> Axis {
    Axis::new()
        .domain(&indicator_panel_domain(panel))
        .anchor("x")
        .title(Title::new(title))
        .fixed_range(false)
}

/// Candlesticks with bollinger bands on top and a panel for every other indicator below.
pub fn market_data_chart(key: &SeriesKey, candles: &[Candle]) -> Plot {
    let x: Vec<String> = candles
        .iter()
        .map(|candle| candle.time.format(TIME_FORMAT).to_string())
        .collect();

    let prices = |price: fn(&Candle) -> CandlePrice| -> Vec<f64> {
        candles
            .iter()
            .map(|candle| price_to_f64(price(candle)))
            .collect()
    };

    let indicators = Indicators::calculate(candles);

    let mut plot = Plot::new();

    plot.add_trace(Box::new(
        Candlestick::new(
            x.clone(),
            prices(|c| c.open),
            prices(|c| c.high),
            prices(|c| c.low),
            prices(|c| c.close),
        )
        .name(&key.to_string()),
    ));

    let bands = indicators.bollinger_bands;
    plot.add_trace(line(&x, bands.upper, "BB upper", "y"));
    plot.add_trace(line(&x, bands.middle, "BB middle", "y"));
    plot.add_trace(line(&x, bands.lower, "BB lower", "y"));

    plot.add_trace(line(&x, indicators.rsi, "RSI", "y2"));

    plot.add_trace(line(&x, indicators.macd.macd, "MACD", "y3"));
    plot.add_trace(line(&x, indicators.macd.signal, "MACD signal", "y3"));

    plot.add_trace(line(&x, indicators.stochastic.slow_k, "Slow K", "y4"));
    plot.add_trace(line(&x, indicators.stochastic.slow_d, "Slow D", "y4"));

    plot.add_trace(line(&x, indicators.adx, "ADX", "y5"));
    plot.add_trace(line(&x, indicators.obv, "OBV", "y6"));
    plot.add_trace(line(&x, indicators.atr, "ATR", "y7"));

    let layout = Layout::new()
        .title(Title::new(&format!("{} market data", key)))
        .show_legend(false)
        .height(1400)
        .x_axis(Axis::new().range_slider(RangeSlider::new().visible(false)))
        .y_axis(
            Axis::new()
                .domain(&[1.0 - PRICE_PANEL_HEIGHT + PANEL_GAP, 1.0])
                .title(Title::new("Price"))
                .fixed_range(false),
        )
        .y_axis2(indicator_axis(0, "RSI"))
        .y_axis3(indicator_axis(1, "MACD"))
        .y_axis4(indicator_axis(2, "Stoch"))
        .y_axis5(indicator_axis(3, "ADX"))
        .y_axis6(indicator_axis(4, "OBV"))
        .y_axis7(indicator_axis(5, "ATR"));

    plot.set_layout(layout);

    plot
}
