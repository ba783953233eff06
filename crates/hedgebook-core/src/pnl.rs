//! Realized P&L
//!
//! Physical P&L is `(net sale - net buy) * quantity` over trades that carry a
//! sale signal; hedge P&L is `(exit - entry) * volume` over every hedge with a
//! nonzero volume, open or not. Nothing here rounds.

use std::iter::Sum;
use std::ops::Add;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::*;

/// Physical, hedge and combined P&L in currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    pub physical_pnl: f64,
    pub hedge_pnl: f64,
    pub net_pnl: f64,
}

impl PnlBreakdown {
    pub fn new(physical_pnl: f64, hedge_pnl: f64) -> Self {
        Self {
            physical_pnl,
            hedge_pnl,
            net_pnl: physical_pnl + hedge_pnl,
        }
    }
}

impl Add for PnlBreakdown {
    type Output = PnlBreakdown;

    fn add(self, rhs: Self) -> Self::Output {
        PnlBreakdown::new(self.physical_pnl + rhs.physical_pnl, self.hedge_pnl + rhs.hedge_pnl)
    }
}

impl Sum for PnlBreakdown {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(PnlBreakdown::default(), |acc, item| acc + item)
    }
}

/// Realized P&L over a set of physical trades and hedges.
///
/// The hedge leg does not look at `status`: an open hedge with a zero exit
/// price contributes `-entry_price * volume`. Callers wanting closed-only
/// figures filter before calling.
pub fn calculate_pnl(physical_trades: &[PhysicalTrade], hedge_trades: &[HedgeTrade]) -> PnlBreakdown {
    let physical_pnl = physical_trades
        .iter()
        .filter_map(physical_contribution)
        .fold(0.0, |acc, pnl| acc + pnl);

    let hedge_pnl = hedge_trades
        .iter()
        .filter_map(hedge_contribution)
        .fold(0.0, |acc, pnl| acc + pnl);

    PnlBreakdown::new(physical_pnl, hedge_pnl)
}

/// What a single physical trade adds to realized P&L, if anything.
fn physical_contribution(trade: &PhysicalTrade) -> Option<f64> {
    if trade.quantity == 0.0 || !trade.has_sale_signal() {
        return None;
    }
    Some((trade.net_sale_price() - trade.net_buy_price()) * trade.quantity)
}

fn hedge_contribution(hedge: &HedgeTrade) -> Option<f64> {
    if hedge.volume == 0.0 {
        return None;
    }
    Some((hedge.exit_price - hedge.entry_price) * hedge.volume)
}

// =============================================================================
// Per-position Breakdown
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPnlRow {
    /// 1-based position in the input
    pub id: usize,
    pub date: NaiveDate,
    pub quantity: f64,
    pub net_buy_price: f64,
    pub net_sale_price: f64,
    /// Whether the row counts towards realized P&L
    pub included: bool,
    pub unit_pnl: f64,
    /// Contribution to `physical_pnl` (0 when not included)
    pub pnl: f64,
    pub status: TradeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgePnlRow {
    pub id: usize,
    pub contract: String,
    pub trade_date: NaiveDate,
    pub volume: f64,
    pub side: HedgeSide,
    pub entry_price: f64,
    /// `None` while the position is open
    pub exit_price: Option<f64>,
    pub unit_pnl: f64,
    /// Contribution to `hedge_pnl`
    pub pnl: f64,
    pub status: HedgeStatus,
}

pub fn physical_rows(physical_trades: &[PhysicalTrade]) -> Vec<PhysicalPnlRow> {
    physical_trades
        .iter()
        .enumerate()
        .map(|(idx, trade)| {
            let contribution = physical_contribution(trade);
            PhysicalPnlRow {
                id: idx + 1,
                date: trade.date,
                quantity: trade.quantity,
                net_buy_price: trade.net_buy_price(),
                net_sale_price: trade.net_sale_price(),
                included: contribution.is_some(),
                unit_pnl: trade.net_sale_price() - trade.net_buy_price(),
                pnl: contribution.unwrap_or(0.0),
                status: trade.status(),
            }
        })
        .collect()
}

pub fn hedge_rows(hedge_trades: &[HedgeTrade]) -> Vec<HedgePnlRow> {
    hedge_trades
        .iter()
        .enumerate()
        .map(|(idx, hedge)| HedgePnlRow {
            id: idx + 1,
            contract: hedge.contract.clone(),
            trade_date: hedge.trade_date,
            volume: hedge.volume,
            side: hedge.side(),
            entry_price: hedge.entry_price,
            exit_price: (!hedge.is_open()).then_some(hedge.exit_price),
            unit_pnl: hedge.exit_price - hedge.entry_price,
            pnl: hedge_contribution(hedge).unwrap_or(0.0),
            status: hedge.status,
        })
        .collect()
}

// =============================================================================
// Aggregates
// =============================================================================

/// Quantity-weighted price averages over all physical trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalSummary {
    pub total_quantity: f64,
    pub avg_buy_price: f64,
    pub avg_sale_price: f64,
    pub avg_buy_premium_discount: f64,
    pub avg_sale_premium_discount: f64,
    pub avg_net_buy_price: f64,
    pub avg_net_sale_price: f64,
    /// `avg_net_sale_price - avg_net_buy_price`
    pub unit_profit: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HedgeSummary {
    pub total_volume: f64,
    pub open_volume: f64,
    pub closed_volume: f64,
    /// `|total hedge volume / total physical quantity| * 100`
    pub hedge_ratio_pct: f64,
}

/// Exposure still waiting on a sale or a hedge exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub pending_trades: usize,
    pub open_hedges: usize,
    pub pending_physical_volume: f64,
    /// Sum of absolute open hedge volumes
    pub open_hedge_volume: f64,
    pub hedge_ratio_pct: f64,
}

pub fn physical_summary(physical_trades: &[PhysicalTrade]) -> PhysicalSummary {
    let total_quantity: f64 = physical_trades.iter().fold(0.0, |acc, t| acc + t.quantity);

    let weighted = |price: fn(&PhysicalTrade) -> f64| -> f64 {
        if total_quantity == 0.0 {
            return 0.0;
        }
        physical_trades
            .iter()
            .fold(0.0, |acc, t| acc + price(t) * t.quantity)
            / total_quantity
    };

    let avg_buy_price = weighted(|t| t.buy_price);
    let avg_sale_price = weighted(|t| t.sale_price);
    let avg_buy_premium_discount = weighted(|t| t.buy_premium_discount);
    let avg_sale_premium_discount = weighted(|t| t.sale_premium_discount);
    let avg_net_buy_price = avg_buy_price + avg_buy_premium_discount;
    let avg_net_sale_price = avg_sale_price + avg_sale_premium_discount;

    PhysicalSummary {
        total_quantity,
        avg_buy_price,
        avg_sale_price,
        avg_buy_premium_discount,
        avg_sale_premium_discount,
        avg_net_buy_price,
        avg_net_sale_price,
        unit_profit: avg_net_sale_price - avg_net_buy_price,
    }
}

pub fn hedge_summary(hedge_trades: &[HedgeTrade], total_physical_quantity: f64) -> HedgeSummary {
    let mut summary = HedgeSummary::default();

    for hedge in hedge_trades {
        summary.total_volume += hedge.volume;
        match hedge.status {
            HedgeStatus::Open => summary.open_volume += hedge.volume,
            HedgeStatus::Closed => summary.closed_volume += hedge.volume,
        }
    }

    if total_physical_quantity != 0.0 {
        summary.hedge_ratio_pct = (summary.total_volume / total_physical_quantity).abs() * 100.0;
    }

    summary
}

pub fn pending_summary(physical_trades: &[PhysicalTrade], hedge_trades: &[HedgeTrade]) -> PendingSummary {
    let mut summary = PendingSummary::default();

    for trade in physical_trades.iter().filter(|t| t.is_pending()) {
        summary.pending_trades += 1;
        summary.pending_physical_volume += trade.quantity;
    }
    for hedge in hedge_trades.iter().filter(|h| h.is_open()) {
        summary.open_hedges += 1;
        summary.open_hedge_volume += hedge.volume.abs();
    }

    if summary.pending_physical_volume > 0.0 {
        summary.hedge_ratio_pct = summary.open_hedge_volume / summary.pending_physical_volume * 100.0;
    }

    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CumulativePnlPoint {
    pub date: NaiveDate,
    pub pnl: f64,
    pub cumulative_pnl: f64,
}

/// Running realized physical P&L in record order.
pub fn cumulative_physical_pnl(physical_trades: &[PhysicalTrade]) -> Vec<CumulativePnlPoint> {
    let mut running = 0.0;
    physical_trades
        .iter()
        .map(|trade| {
            let pnl = physical_contribution(trade).unwrap_or(0.0);
            running += pnl;
            CumulativePnlPoint {
                date: trade.date,
                pnl,
                cumulative_pnl: running,
            }
        })
        .collect()
}
