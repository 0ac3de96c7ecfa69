use stock_core::{CrossSignal, RsiSignal};

/// RSI level whose upward exit marks a buy signal.
pub const RSI_OVERSOLD: f64 = 30.0;
/// RSI level whose downward exit marks a sell signal.
pub const RSI_OVERBOUGHT: f64 = 70.0;

/// Exponentially weighted mean seeded with the first value, one output per
/// input. Recursive form: `y[t] = alpha * x[t] + (1 - alpha) * y[t-1]`.
pub fn ewm(data: &[f64], alpha: f64) -> Vec<f64> {
    let mut result = Vec::with_capacity(data.len());
    let Some(&first) = data.first() else {
        return result;
    };
    let mut prev = first;
    result.push(prev);
    for &value in &data[1..] {
        prev = alpha * value + (1.0 - alpha) * prev;
        result.push(prev);
    }
    result
}

/// Exponential moving average with span-based smoothing, `alpha = 2/(N+1)`.
pub fn ema(data: &[f64], span: usize) -> Vec<f64> {
    ewm(data, 2.0 / (span as f64 + 1.0))
}

/// Simple rolling mean, aligned to the input: `None` until `window` samples
/// have accumulated.
pub fn sma(data: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(data.len());
    if window == 0 {
        result.resize(data.len(), None);
        return result;
    }
    let mut sum = 0.0;
    for (i, &value) in data.iter().enumerate() {
        sum += value;
        if i + 1 > window {
            sum -= data[i - window];
        }
        if i + 1 >= window {
            result.push(Some(sum / window as f64));
        } else {
            result.push(None);
        }
    }
    result
}

/// MACD line, signal line and histogram, each aligned to the input series.
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(data: &[f64], fast: usize, slow: usize, signal_span: usize) -> MacdSeries {
    let ema_fast = ema(data, fast);
    let ema_slow = ema(data, slow);

    let macd: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&macd, signal_span);
    let histogram: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

    MacdSeries {
        macd,
        signal,
        histogram,
    }
}

/// RSI with Wilder smoothing in exponential form (`alpha = 1/period`),
/// aligned to the input. The first element has no delta and is `None`; a
/// run with zero smoothed loss but positive smoothed gain pins at 100; a
/// fully flat run (both zero) stays `None`.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    if data.len() < 2 || period == 0 {
        return vec![None; data.len()];
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for pair in data.windows(2) {
        let delta = pair[1] - pair[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let alpha = 1.0 / period as f64;
    let avg_gain = ewm(&gains, alpha);
    let avg_loss = ewm(&losses, alpha);

    let mut result = Vec::with_capacity(data.len());
    result.push(None);
    for (gain, loss) in avg_gain.iter().zip(&avg_loss) {
        if *loss == 0.0 {
            result.push(if *gain > 0.0 { Some(100.0) } else { None });
        } else {
            let rs = gain / loss;
            result.push(Some(100.0 - 100.0 / (1.0 + rs)));
        }
    }
    result
}

/// Cross labels between a fast and a slow series: GOLDEN where the fast
/// series reaches or exceeds the slow one after sitting below it, DEAD in
/// the mirror case. A tie counts toward the side being entered. Undefined
/// wherever either series is undefined on this or the prior date.
pub fn detect_cross(fast: &[Option<f64>], slow: &[Option<f64>]) -> Vec<Option<CrossSignal>> {
    let len = fast.len().min(slow.len());
    let mut result = vec![None; len];
    for i in 1..len {
        let (Some(f), Some(s), Some(pf), Some(ps)) = (fast[i], slow[i], fast[i - 1], slow[i - 1])
        else {
            continue;
        };
        if f >= s && pf < ps {
            result[i] = Some(CrossSignal::Golden);
        } else if f <= s && pf > ps {
            result[i] = Some(CrossSignal::Dead);
        }
    }
    result
}

/// Zero-line cross labels for the MACD histogram: GOLDEN where it turns
/// non-negative, DEAD where it turns non-positive. The first element has
/// no predecessor and carries no label.
pub fn detect_zero_cross(histogram: &[f64]) -> Vec<Option<CrossSignal>> {
    let mut result = vec![None; histogram.len()];
    for i in 1..histogram.len() {
        if histogram[i] >= 0.0 && histogram[i - 1] < 0.0 {
            result[i] = Some(CrossSignal::Golden);
        } else if histogram[i] <= 0.0 && histogram[i - 1] > 0.0 {
            result[i] = Some(CrossSignal::Dead);
        }
    }
    result
}

/// BUY where RSI climbs back out of oversold territory, SELL where it
/// drops back out of overbought territory.
pub fn detect_rsi_signals(rsi: &[Option<f64>]) -> Vec<Option<RsiSignal>> {
    let mut result = vec![None; rsi.len()];
    for i in 1..rsi.len() {
        let (Some(current), Some(prev)) = (rsi[i], rsi[i - 1]) else {
            continue;
        };
        if current >= RSI_OVERSOLD && prev < RSI_OVERSOLD {
            result[i] = Some(RsiSignal::Buy);
        } else if current <= RSI_OVERBOUGHT && prev > RSI_OVERBOUGHT {
            result[i] = Some(RsiSignal::Sell);
        }
    }
    result
}
