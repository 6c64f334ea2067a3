//! Heuristic Engine
//!
//! Closed-form, network-free analysis of a snapshot. Used by the mux as the
//! last-resort data source and callable directly by anyone holding a snapshot.
//!
//! Policy:
//! - stop loss = price * 0.95
//! - take profit ladder = price * [1.05, 1.10, 1.20]
//! - floor pivots (S2, S1, Pivot, R1, R2) from the 24h range, each clamped
//!   to within ±3.5% of price
//!
//! Same input gives the same output; only `generated_at_ms` reads the clock.

use crate::models::types::{HeuristicResult, PriceLevel, Snapshot};
use crate::utils::constants::{
    MAX_LEVEL_DEVIATION, MODERATE_LIQUIDITY_USD, STOP_LOSS_RATIO, TAKE_PROFIT_RATIOS,
    THIN_LIQUIDITY_USD,
};

/// Analyze a snapshot
pub fn analyze(snapshot: &Snapshot) -> HeuristicResult {
    analyze_at(snapshot, chrono::Utc::now().timestamp_millis())
}

/// Analyze with an explicit informational timestamp
pub fn analyze_at(snapshot: &Snapshot, generated_at_ms: i64) -> HeuristicResult {
    let price = snapshot.price;
    let (low, high) = sane_range(price, snapshot.low_24h, snapshot.high_24h);

    HeuristicResult {
        address: snapshot.address.clone(),
        reference_price: price,
        levels: pivot_levels(price, low, high),
        stop_loss: price * STOP_LOSS_RATIO,
        take_profit: TAKE_PROFIT_RATIOS.iter().map(|r| price * r).collect(),
        indicators: indicators(snapshot, low, high),
        generated_at_ms,
    }
}

/// Replace unusable high/low with price; (low, high)
fn sane_range(price: f64, low: f64, high: f64) -> (f64, f64) {
    let usable = |v: f64| v.is_finite() && v > 0.0;
    let low = if usable(low) { low } else { price };
    let high = if usable(high) { high } else { price };
    if low > high {
        (price, price)
    } else {
        (low, high)
    }
}

fn deviation(price: f64, level: f64) -> f64 {
    (level - price).abs() / price
}

/// Clamp into the band, then step toward price until the rounded relative
/// deviation is within it as well
fn clamp_to_band(price: f64, level: f64) -> f64 {
    let floor = price * (1.0 - MAX_LEVEL_DEVIATION);
    let ceiling = price * (1.0 + MAX_LEVEL_DEVIATION);
    let mut level = level.clamp(floor, ceiling);
    while deviation(price, level) > MAX_LEVEL_DEVIATION && level != price {
        level = step_toward(level, price);
    }
    level
}

/// Adjacent f64 toward `target`; both positive and finite
fn step_toward(x: f64, target: f64) -> f64 {
    let bits = x.to_bits();
    if target < x {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}

fn pivot_levels(price: f64, low: f64, high: f64) -> Vec<PriceLevel> {
    let pivot = (high + low + price) / 3.0;
    let range = high - low;

    let raw = [
        ("S2", pivot - range),
        ("S1", 2.0 * pivot - high),
        ("Pivot", pivot),
        ("R1", 2.0 * pivot - low),
        ("R2", pivot + range),
    ];

    let mut levels: Vec<PriceLevel> = raw
        .iter()
        .map(|(label, level)| PriceLevel {
            label: label.to_string(),
            price: clamp_to_band(price, *level),
        })
        .collect();

    // Stable sort keeps the S2..R2 order on ties
    levels.sort_by(|a, b| {
        a.price
            .partial_cmp(&b.price)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    levels
}

fn indicators(snapshot: &Snapshot, low: f64, high: f64) -> Vec<String> {
    let price = snapshot.price;
    let mut out = Vec::with_capacity(4);

    let range_pct = (high - low) / price * 100.0;
    out.push(format!("24h range: {:.2}% of price", range_pct));

    if high > low {
        let position = (price - low) / (high - low) * 100.0;
        out.push(format!("Position in 24h range: {:.0}%", position.clamp(0.0, 100.0)));
    } else {
        out.push("Position in 24h range: flat".to_string());
    }

    if snapshot.liquidity > 0.0 {
        out.push(format!(
            "Volume/liquidity turnover: {:.2}x",
            snapshot.volume_24h / snapshot.liquidity
        ));
    } else {
        out.push("Volume/liquidity turnover: n/a".to_string());
    }

    let tier = if snapshot.liquidity < THIN_LIQUIDITY_USD {
        "thin"
    } else if snapshot.liquidity < MODERATE_LIQUIDITY_USD {
        "moderate"
    } else {
        "deep"
    };
    out.push(format!("Liquidity: {} (${:.0})", tier, snapshot.liquidity));

    out
}
