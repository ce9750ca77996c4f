// Account state derivation: balances, cost basis, order book valuation.
pub mod orderbook;

pub use orderbook::{effective_price, liquidation_value, position_pnl, PositionSide};

use crate::models::{AccountPosition, ClosedOrder, OrderBookDepth, OrderSide};

/// Build the live position snapshot for one base asset.
///
/// Derived fresh from exchange data each reconciliation; never cached
/// across cycles. Returns None for a zero/absent balance: the asset is
/// flat and there is no position to value.
///
/// Cost basis comes from the most recent closed buy whose pair contains
/// the asset (closed orders arrive newest first). The balance is valued
/// against current bids, and the estimated taker fee is charged on that
/// value.
pub fn build_position(
    asset: &str,
    balance: f64,
    closed_orders: &[ClosedOrder],
    depth: Option<&OrderBookDepth>,
    fee_rate: f64,
) -> Option<AccountPosition> {
    if balance <= 0.0 {
        return None;
    }

    let cost_basis = closed_orders
        .iter()
        .find(|order| order.side == OrderSide::Buy && order.pair.contains(asset))
        .map(|order| order.cost)
        .unwrap_or(0.0);

    let orderbook_value = depth
        .map(|d| liquidation_value(balance, &d.bid_prices, &d.bid_quantities))
        .unwrap_or(0.0);
    let estimated_fee = orderbook_value * fee_rate;

    Some(AccountPosition {
        balance,
        cost_basis,
        orderbook_value,
        estimated_fee,
        pnl_after_fees: orderbook_value - cost_basis - estimated_fee,
    })
}
