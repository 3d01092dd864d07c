//! Conversion between typed records and flat rows

use super::models::{BarRow, Batch, OverviewRow, SeriesKey, TickRow, Timestamped};
use crate::constant::{Exchange, Interval};
use crate::error::{Result, StoreError};
use crate::models::{BarData, BarOverview, TickData, TickOverview};
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// Nanoseconds since the Unix epoch
pub fn to_epoch_ns(dt: &DateTime<Tz>) -> Result<i64> {
    dt.timestamp_nanos_opt().ok_or_else(|| {
        StoreError::Validation(format!("datetime {dt} is outside the storable range"))
    })
}

/// Query bound in nanoseconds, saturating at the storable range
pub fn to_epoch_ns_clamped(dt: &DateTime<Tz>) -> i64 {
    dt.timestamp_nanos_opt()
        .unwrap_or(if dt.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

/// Inverse of [`to_epoch_ns`], expressed in `tz`
pub fn from_epoch_ns(ns: i64, tz: Tz) -> DateTime<Tz> {
    tz.timestamp_nanos(ns)
}

/// Flatten bars into one batch.
///
/// All bars must share symbol, exchange and interval. Later bars replace
/// earlier ones with the same timestamp.
pub fn bars_to_batch(bars: &[BarData]) -> Result<Batch<BarRow>> {
    let first = bars
        .first()
        .ok_or_else(|| StoreError::Validation("cannot save an empty bar batch".to_string()))?;
    let key = bar_key(first)?;

    let mut rows: BTreeMap<i64, BarRow> = BTreeMap::new();
    for bar in bars {
        let this_key = bar_key(bar)?;
        if this_key != key {
            return Err(StoreError::Validation(format!(
                "bar batch mixes series {key} and {this_key}"
            )));
        }

        let datetime = to_epoch_ns(&bar.datetime)?;
        rows.insert(
            datetime,
            BarRow {
                symbol: this_key.symbol,
                exchange: this_key.exchange,
                interval: this_key.interval.unwrap_or_default(),
                datetime,
                volume: bar.volume,
                turnover: bar.turnover,
                open_interest: bar.open_interest,
                open_price: bar.open_price,
                high_price: bar.high_price,
                low_price: bar.low_price,
                close_price: bar.close_price,
            },
        );
    }

    Ok(dedup_batch(key, rows, bars.len()))
}

/// Flatten ticks into one batch; same rules as [`bars_to_batch`]
pub fn ticks_to_batch(ticks: &[TickData]) -> Result<Batch<TickRow>> {
    let first = ticks
        .first()
        .ok_or_else(|| StoreError::Validation("cannot save an empty tick batch".to_string()))?;
    let key = tick_key(first)?;

    let mut rows: BTreeMap<i64, TickRow> = BTreeMap::new();
    for tick in ticks {
        let this_key = tick_key(tick)?;
        if this_key != key {
            return Err(StoreError::Validation(format!(
                "tick batch mixes series {key} and {this_key}"
            )));
        }

        let datetime = to_epoch_ns(&tick.datetime)?;
        let localtime = tick.localtime.as_ref().map(to_epoch_ns).transpose()?;
        rows.insert(
            datetime,
            TickRow {
                symbol: this_key.symbol,
                exchange: this_key.exchange,
                datetime,
                name: tick.name.clone(),
                volume: tick.volume,
                turnover: tick.turnover,
                open_interest: tick.open_interest,
                last_price: tick.last_price,
                last_volume: tick.last_volume,
                limit_up: tick.limit_up,
                limit_down: tick.limit_down,
                open_price: tick.open_price,
                high_price: tick.high_price,
                low_price: tick.low_price,
                pre_close: tick.pre_close,
                bid_price: [
                    tick.bid_price_1,
                    tick.bid_price_2,
                    tick.bid_price_3,
                    tick.bid_price_4,
                    tick.bid_price_5,
                ],
                ask_price: [
                    tick.ask_price_1,
                    tick.ask_price_2,
                    tick.ask_price_3,
                    tick.ask_price_4,
                    tick.ask_price_5,
                ],
                bid_volume: [
                    tick.bid_volume_1,
                    tick.bid_volume_2,
                    tick.bid_volume_3,
                    tick.bid_volume_4,
                    tick.bid_volume_5,
                ],
                ask_volume: [
                    tick.ask_volume_1,
                    tick.ask_volume_2,
                    tick.ask_volume_3,
                    tick.ask_volume_4,
                    tick.ask_volume_5,
                ],
                localtime,
            },
        );
    }

    Ok(dedup_batch(key, rows, ticks.len()))
}

fn dedup_batch<R: Timestamped>(
    key: SeriesKey,
    rows: BTreeMap<i64, R>,
    received: usize,
) -> Batch<R> {
    if rows.len() < received {
        tracing::debug!(
            "Collapsed {} duplicate timestamps in batch for {}",
            received - rows.len(),
            key
        );
    }
    Batch {
        key,
        rows: rows.into_values().collect(),
    }
}

fn bar_key(bar: &BarData) -> Result<SeriesKey> {
    if bar.symbol.is_empty() {
        return Err(StoreError::Validation("bar symbol must not be empty".to_string()));
    }
    let interval = bar.interval.ok_or_else(|| {
        StoreError::Validation(format!(
            "bar {} at {} has no interval",
            bar.vt_symbol(),
            bar.datetime
        ))
    })?;

    Ok(SeriesKey {
        symbol: bar.symbol.clone(),
        exchange: bar.exchange.value().to_string(),
        interval: Some(interval.value().to_string()),
    })
}

fn tick_key(tick: &TickData) -> Result<SeriesKey> {
    if tick.symbol.is_empty() {
        return Err(StoreError::Validation("tick symbol must not be empty".to_string()));
    }

    Ok(SeriesKey {
        symbol: tick.symbol.clone(),
        exchange: tick.exchange.value().to_string(),
        interval: None,
    })
}

/// Rebuild bars from stored rows, keeping row order
pub fn bars_from_rows(rows: Vec<BarRow>, tz: Tz) -> Result<Vec<BarData>> {
    rows.into_iter()
        .map(|row| {
            Ok(BarData {
                exchange: row.exchange.parse::<Exchange>()?,
                interval: Some(row.interval.parse::<Interval>()?),
                datetime: from_epoch_ns(row.datetime, tz),
                symbol: row.symbol,
                volume: row.volume,
                turnover: row.turnover,
                open_interest: row.open_interest,
                open_price: row.open_price,
                high_price: row.high_price,
                low_price: row.low_price,
                close_price: row.close_price,
            })
        })
        .collect()
}

/// Rebuild ticks from stored rows, keeping row order
pub fn ticks_from_rows(rows: Vec<TickRow>, tz: Tz) -> Result<Vec<TickData>> {
    rows.into_iter()
        .map(|row| {
            let [bid_price_1, bid_price_2, bid_price_3, bid_price_4, bid_price_5] = row.bid_price;
            let [ask_price_1, ask_price_2, ask_price_3, ask_price_4, ask_price_5] = row.ask_price;
            let [bid_volume_1, bid_volume_2, bid_volume_3, bid_volume_4, bid_volume_5] =
                row.bid_volume;
            let [ask_volume_1, ask_volume_2, ask_volume_3, ask_volume_4, ask_volume_5] =
                row.ask_volume;

            Ok(TickData {
                exchange: row.exchange.parse::<Exchange>()?,
                datetime: from_epoch_ns(row.datetime, tz),
                localtime: row.localtime.map(|ns| from_epoch_ns(ns, tz)),
                symbol: row.symbol,
                name: row.name,
                volume: row.volume,
                turnover: row.turnover,
                open_interest: row.open_interest,
                last_price: row.last_price,
                last_volume: row.last_volume,
                limit_up: row.limit_up,
                limit_down: row.limit_down,
                open_price: row.open_price,
                high_price: row.high_price,
                low_price: row.low_price,
                pre_close: row.pre_close,
                bid_price_1,
                bid_price_2,
                bid_price_3,
                bid_price_4,
                bid_price_5,
                ask_price_1,
                ask_price_2,
                ask_price_3,
                ask_price_4,
                ask_price_5,
                bid_volume_1,
                bid_volume_2,
                bid_volume_3,
                bid_volume_4,
                bid_volume_5,
                ask_volume_1,
                ask_volume_2,
                ask_volume_3,
                ask_volume_4,
                ask_volume_5,
            })
        })
        .collect()
}

pub fn bar_overview_from_row(row: OverviewRow, tz: Tz) -> Result<BarOverview> {
    let interval = row
        .key
        .interval
        .as_deref()
        .ok_or_else(|| StoreError::Decode(format!("bar overview {} has no interval", row.key)))?
        .parse::<Interval>()?;

    Ok(BarOverview {
        exchange: row.key.exchange.parse::<Exchange>()?,
        interval,
        count: row.count,
        start: from_epoch_ns(row.start, tz),
        end: from_epoch_ns(row.end, tz),
        symbol: row.key.symbol,
    })
}

pub fn tick_overview_from_row(row: OverviewRow, tz: Tz) -> Result<TickOverview> {
    Ok(TickOverview {
        exchange: row.key.exchange.parse::<Exchange>()?,
        count: row.count,
        start: from_epoch_ns(row.start, tz),
        end: from_epoch_ns(row.end, tz),
        symbol: row.key.symbol,
    })
}
