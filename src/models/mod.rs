use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::Result;

/// One interval's OHLC summary for an asset pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vwap: f64,
    pub volume: f64,
    pub trade_count: u64,
}

/// Ordered candle history for one (pair, interval).
///
/// Construction validates strictly increasing timestamps; within one
/// evaluation cycle the series is read-only.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    pair: String,
    interval_minutes: u32,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(
        pair: impl Into<String>,
        interval_minutes: u32,
        candles: Vec<Candle>,
    ) -> Result<Self> {
        for window in candles.windows(2) {
            if window[1].time <= window[0].time {
                return Err(BotError::Data(format!(
                    "candles out of order or duplicated at {}",
                    window[1].time
                )));
            }
        }
        Ok(Self {
            pair: pair.into(),
            interval_minutes,
            candles,
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Directional signal attached to a candle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    /// Numeric convention: Buy = +1, Sell = -1, Hold = 0.
    pub fn value(&self) -> i8 {
        match self {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::Hold => 0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

/// Per-loop memory of the most recent signals.
///
/// The only state that outlives a polling cycle. A flat (all-Hold) cycle
/// must not erase the standing directional bias, so the non-zero fields
/// survive until a new non-zero signal overwrites them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    /// Signal at the most recent candle, possibly Hold.
    pub last_signal: Signal,
    /// Most recent Buy or Sell observed, if any.
    pub last_non_zero: Option<Signal>,
    /// Close price at the candle that produced `last_non_zero`.
    pub last_non_zero_price: Option<f64>,
    /// Candles elapsed since `last_non_zero` fired.
    pub periods_since_non_zero: Option<u32>,
}

/// Live holdings snapshot for one base asset, derived fresh each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub balance: f64,
    /// Cost of the most recent closed buy for this asset.
    pub cost_basis: f64,
    /// Value of the balance walked through current order book bids.
    pub orderbook_value: f64,
    pub estimated_fee: f64,
    /// `orderbook_value - cost_basis - estimated_fee`.
    pub pnl_after_fees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

/// An order ready for submission. Constructed by the reconciliation step,
/// consumed exactly once per accepted decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub order_type: OrderType,
    pub volume: f64,
    pub pair: String,
    pub limit_price: Option<f64>,
}

/// Exchange acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub txids: Vec<String>,
    pub description: String,
}

/// A settled order from the exchange's closed-orders history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedOrder {
    pub txid: String,
    pub pair: String,
    pub side: OrderSide,
    pub cost: f64,
    pub volume: f64,
    pub price: f64,
    pub closed_at: DateTime<Utc>,
    pub status: String,
}

/// Order book snapshot, best price first on both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookDepth {
    pub bid_prices: Vec<f64>,
    pub bid_quantities: Vec<f64>,
    pub ask_prices: Vec<f64>,
    pub ask_quantities: Vec<f64>,
}

impl OrderBookDepth {
    pub fn best_bid(&self) -> Option<f64> {
        self.bid_prices.first().copied()
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.ask_prices.first().copied()
    }

    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    pub fn spread_percentage(&self) -> Option<f64> {
        let ask = self.best_ask()?;
        Some((ask - self.best_bid()?) / ask * 100.0)
    }
}

/// Final actionable output of one evaluation cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    PlaceBuy { volume: f64 },
    PlaceSell { volume: f64 },
    NoAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
}
