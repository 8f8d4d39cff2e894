//! Paper-trading demo loop: a synthetic random-walk feed per instrument is
//! pushed through the aggregator, completed candles drive the portfolio
//! runner, and the resulting fills are rolled up into a performance report.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use candleflow::aggregator::CandleAggregator;
use candleflow::candle::Candle;
use candleflow::config::Config;
use candleflow::error::Error;
use candleflow::events::{CandleClosedEvent, Instrument};
use candleflow::logging::{json_log, log_at, obj, v_num, v_str, Level};
use candleflow::metrics::{compute_report, equity_from_round_trips, round_trips_from_fills};
use candleflow::policy::EqualSplitPolicy;
use candleflow::portfolio::{PortfolioRunner, PortfolioStrategy};
use candleflow::strategies::{TrendParams, TrendStrategy};

// Demo feed origin: 2023-11-14 22:13:20 UTC, aligned below to the base grid.
const FEED_ORIGIN_MS: u64 = 1_700_000_000_000;

/// Synthetic random-walk base-period candles for one instrument.
struct SyntheticFeed {
    rng: StdRng,
    price: f64,
    ts: u64,
    step_ms: u64,
}

impl SyntheticFeed {
    fn new(seed: u64, start_price: f64, start_ts: u64, step_ms: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            price: start_price,
            ts: start_ts,
            step_ms,
        }
    }

    fn next_candle(&mut self) -> Candle {
        let drift: f64 = self.rng.gen_range(-0.004..0.0045);
        let open = self.price;
        let close = open * (1.0 + drift);
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..0.002));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..0.002));
        let volume = self.rng.gen_range(50.0..150.0);
        let tick_count = self.rng.gen_range(10..40);

        let candle = Candle {
            timestamp: self.ts,
            open,
            high,
            low,
            close,
            volume,
            tick_count,
        };
        self.price = close;
        self.ts += self.step_ms;
        candle
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;

    let mut aggregator = match cfg.base_period {
        Some(base) => CandleAggregator::with_base_period(cfg.target_period, base)?,
        None => CandleAggregator::new(cfg.target_period)?,
    };
    let (base, target, factor) = aggregator.describe();
    json_log(
        "system",
        obj(&[
            ("event", v_str("startup")),
            ("base_period", v_str(&base.to_string())),
            ("target_period", v_str(&target.to_string())),
            ("factor", v_num(f64::from(factor))),
            ("symbols", v_str(&cfg.symbols.join(","))),
        ]),
    );

    let (fill_tx, mut fill_rx) = mpsc::unbounded_channel();
    let params = TrendParams {
        ema_fast: cfg.ema_fast,
        ema_slow: cfg.ema_slow,
        atr_window: cfg.atr_window,
        atr_risk_mult: cfg.atr_risk_mult,
        min_size: cfg.min_size,
        max_size: cfg.max_size,
    };
    let strategies: Vec<Box<dyn PortfolioStrategy>> = cfg
        .symbols
        .iter()
        .map(|symbol| {
            Box::new(TrendStrategy::new(
                Instrument::new(symbol.clone()),
                params,
                fill_tx.clone(),
            )) as Box<dyn PortfolioStrategy>
        })
        .collect();
    drop(fill_tx);

    let mut runner = PortfolioRunner::new(
        strategies,
        Box::new(EqualSplitPolicy::new(cfg.portfolio_risk_budget)),
        cfg.default_risk_per_trade,
    );

    let base_ms = base.duration_ms()?;
    let start_ts = FEED_ORIGIN_MS - FEED_ORIGIN_MS % base_ms;
    let mut feeds: Vec<(Instrument, SyntheticFeed)> = cfg
        .symbols
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            (
                Instrument::new(symbol.clone()),
                SyntheticFeed::new(
                    cfg.feed_seed + i as u64,
                    100.0 * (i as f64 + 1.0),
                    start_ts,
                    base_ms,
                ),
            )
        })
        .collect();

    for _ in 0..cfg.feed_candles {
        for (instrument, feed) in feeds.iter_mut() {
            let candle = feed.next_candle();
            match aggregator.update(instrument, &candle) {
                Ok(None) => {}
                Ok(Some(completed)) => {
                    log_at(
                        Level::Debug,
                        "market",
                        obj(&[
                            ("event", v_str("candle_closed")),
                            ("instrument", v_str(instrument.as_str())),
                            ("ts", v_num(completed.timestamp as f64)),
                            ("close", v_num(completed.close)),
                        ]),
                    );
                    let event = CandleClosedEvent {
                        instrument: instrument.clone(),
                        period: target,
                        candle: completed,
                    };
                    runner.on_candle_close(&event).await?;
                }
                Err(err @ Error::StaleCandle { .. }) => {
                    // Recoverable: drop the candle, keep the stream going.
                    log_at(
                        Level::Warn,
                        "market",
                        obj(&[
                            ("event", v_str("stale_candle")),
                            ("instrument", v_str(instrument.as_str())),
                            ("error", v_str(&err.to_string())),
                        ]),
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    let mut fills = Vec::new();
    while let Ok(fill) = fill_rx.try_recv() {
        fills.push(fill);
    }
    for fill in &fills {
        json_log(
            "fill",
            obj(&[
                ("instrument", v_str(fill.instrument.as_str())),
                ("side", v_str(fill.side.as_str())),
                ("size", v_num(fill.size)),
                ("price", v_num(fill.price)),
                ("ts", v_num(fill.timestamp as f64)),
            ]),
        );
    }

    let trips = round_trips_from_fills(&fills)?;
    let equity = equity_from_round_trips(&trips, cfg.starting_equity);
    let report = compute_report(&equity, &fills)?;
    json_log("report", serde_json::to_value(&report)?);

    Ok(())
}
