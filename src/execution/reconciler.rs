use crate::models::{AccountPosition, Action, Decision, Signal, SignalState};

/// Reconcile the tracked signal state against current holdings.
///
/// Buy only when flat, sell only when holding; a repeated signal with a
/// position already open stays a no-op, so the loop never stacks duplicate
/// market orders on every poll.
pub fn decide(
    state: &SignalState,
    position: Option<&AccountPosition>,
    trade_volume: f64,
) -> Decision {
    let balance = position.map(|p| p.balance).unwrap_or(0.0);
    let holding = balance > 0.0;

    match state.last_non_zero {
        Some(Signal::Buy) if !holding => Decision {
            action: Action::PlaceBuy {
                volume: trade_volume,
            },
            reason: "buy bias with no open balance".to_string(),
        },
        Some(Signal::Buy) => Decision {
            action: Action::NoAction,
            reason: format!("already in trade (balance {balance})"),
        },
        Some(Signal::Sell) if holding => Decision {
            action: Action::PlaceSell {
                volume: trade_volume,
            },
            reason: format!("sell bias with open balance {balance}"),
        },
        Some(Signal::Sell) => Decision {
            action: Action::NoAction,
            reason: "sell bias but no balance to sell".to_string(),
        },
        // Hold never reaches last_non_zero; treat it like no signal.
        Some(Signal::Hold) | None => Decision {
            action: Action::NoAction,
            reason: "no signal yet".to_string(),
        },
    }
}
