//! Trade book
//!
//! The caller-owned record collections for one cargo, with the booking rules
//! the desk applies: buys land as pending trades (optionally with an opening
//! hedge), sales and hedge exits complete records in place, and records are
//! only ever removed all at once.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::error::{HedgebookError, HedgebookResult};
use crate::models::*;
use crate::pnl::{calculate_pnl, pending_summary, PendingSummary, PnlBreakdown};

pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Descriptive cargo details stamped onto new trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoInfo {
    pub cargo_name: String,
    #[serde(default)]
    pub delivery_point: String,
    pub product_category: String,
    pub product_name: String,
}

impl Default for CargoInfo {
    fn default() -> Self {
        Self {
            cargo_name: "GO-KAKI STAR 0.5%".to_string(),
            delivery_point: String::new(),
            product_category: "Crude Oil".to_string(),
            product_name: "Dubai".to_string(),
        }
    }
}

impl CargoInfo {
    /// Cargo for a catalog selection, honoring a custom product name.
    pub fn new(cargo_name: impl Into<String>, selection: &str, custom_product: Option<&str>) -> Self {
        Self {
            cargo_name: cargo_name.into(),
            delivery_point: String::new(),
            product_category: catalog::category_of(selection).unwrap_or_default().to_string(),
            product_name: catalog::resolve_product_name(selection, custom_product),
        }
    }
}

/// Inclusive range of allowed purchase dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurchaseWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl PurchaseWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> HedgebookResult<Self> {
        if start > end {
            return Err(HedgebookError::InvalidPurchaseWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn check(&self, date: NaiveDate) -> HedgebookResult<()> {
        if self.contains(date) {
            Ok(())
        } else {
            Err(HedgebookError::OutsidePurchaseWindow {
                date,
                start: self.start,
                end: self.end,
            })
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

/// A physical purchase, optionally hedged at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyOperation {
    pub date: NaiveDate,
    pub quantity: f64,
    pub buy_price: f64,
    #[serde(default)]
    pub buy_premium_discount: f64,
    #[serde(default)]
    pub hedge: Option<HedgeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeEntry {
    pub contract: String,
    pub volume: f64,
    pub entry_price: f64,
    /// Defaults to the purchase date
    #[serde(default)]
    pub trade_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

/// Completes a pending trade, closes an open hedge, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleOperation {
    #[serde(default)]
    pub physical: Option<SaleEntry>,
    #[serde(default)]
    pub hedge: Option<HedgeExit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEntry {
    /// 1-based trade ID
    pub trade_id: usize,
    #[serde(default)]
    pub sale_price: f64,
    #[serde(default)]
    pub sale_premium_discount: f64,
    /// Closes the position for mark-to-market from this date on
    pub sale_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeExit {
    /// 1-based hedge ID
    pub hedge_id: usize,
    #[serde(default)]
    pub exit_price: f64,
    #[serde(default)]
    pub exit_date: Option<NaiveDate>,
}

/// IDs assigned by a buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub trade_id: usize,
    pub hedge_id: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CompletedStep {
    PhysicalSale { trade_id: usize },
    HedgeClosed { hedge_id: usize },
}

// =============================================================================
// Trade Book
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeBook {
    pub cargo: CargoInfo,
    pub purchase_window: Option<PurchaseWindow>,
    pub max_records: usize,
    physical_trades: Vec<PhysicalTrade>,
    hedge_trades: Vec<HedgeTrade>,
}

impl Default for TradeBook {
    fn default() -> Self {
        Self::new(CargoInfo::default())
    }
}

impl TradeBook {
    pub fn new(cargo: CargoInfo) -> Self {
        Self {
            cargo,
            purchase_window: None,
            max_records: DEFAULT_MAX_RECORDS,
            physical_trades: Vec::new(),
            hedge_trades: Vec::new(),
        }
    }

    pub fn with_purchase_window(mut self, window: PurchaseWindow) -> Self {
        self.purchase_window = Some(window);
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// The reference cargo: one sold parcel and its closed sell hedge.
    pub fn sample() -> Self {
        let mut book = Self::default();
        let day = NaiveDate::from_ymd_opt(2019, 1, 15).unwrap_or_default();
        let settled = NaiveDate::from_ymd_opt(2019, 2, 7).unwrap_or_default();

        let mut trade = PhysicalTrade::purchase(day, 245778.0, 72.46, 0.0)
            .with_product(book.cargo.product_name.clone(), book.cargo.product_category.clone());
        trade.record_sale(78.96, 0.0, Some(settled));

        let mut hedge = HedgeTrade::open("GASOIL Mo1", -245778.0, 75.87, day);
        hedge.close(81.98, Some(settled));

        book.physical_trades.push(trade);
        book.hedge_trades.push(hedge);
        book
    }

    pub fn physical_trades(&self) -> &[PhysicalTrade] {
        &self.physical_trades
    }

    pub fn hedge_trades(&self) -> &[HedgeTrade] {
        &self.hedge_trades
    }

    pub fn len(&self) -> usize {
        self.physical_trades.len() + self.hedge_trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Book a purchase. Returns the IDs of the new records.
    pub fn add_buy(&mut self, op: BuyOperation) -> HedgebookResult<BuyReceipt> {
        let hedge = op
            .hedge
            .filter(|h| h.contract.trim() != catalog::NO_HEDGE && !h.contract.trim().is_empty() && h.volume != 0.0);
        let hedge_date = hedge.as_ref().map(|h| h.trade_date.unwrap_or(op.date));

        if let Some(window) = &self.purchase_window {
            window.check(op.date)?;
            if let Some(date) = hedge_date {
                window.check(date)?;
            }
        }
        if op.quantity == 0.0 {
            return Err(HedgebookError::ZeroQuantity);
        }

        let added = 1 + usize::from(hedge.is_some());
        if self.len() + added > self.max_records {
            return Err(HedgebookError::BookFull(self.max_records));
        }

        let trade = PhysicalTrade::purchase(op.date, op.quantity, op.buy_price, op.buy_premium_discount)
            .with_product(self.cargo.product_name.clone(), self.cargo.product_category.clone());
        self.physical_trades.push(trade);
        let trade_id = self.physical_trades.len();

        let hedge_id = match (hedge, hedge_date) {
            (Some(entry), Some(trade_date)) => {
                let mut record = HedgeTrade::open(entry.contract.trim(), entry.volume, entry.entry_price, trade_date);
                record.expiry = entry.expiry;
                self.hedge_trades.push(record);
                Some(self.hedge_trades.len())
            }
            _ => None,
        };

        tracing::info!(
            trade_id,
            hedge_id = ?hedge_id,
            quantity = op.quantity,
            "Buy operation booked"
        );

        Ok(BuyReceipt { trade_id, hedge_id })
    }

    /// Complete a sale and/or close a hedge.
    ///
    /// Every leg is validated before anything is written, so a rejected
    /// operation leaves the book untouched.
    pub fn complete_sale(&mut self, op: SaleOperation) -> HedgebookResult<Vec<CompletedStep>> {
        if let Some(exit) = &op.hedge {
            if exit.exit_price <= 0.0 {
                return Err(HedgebookError::MissingExitPrice);
            }
        }
        if op.physical.is_none() && op.hedge.is_none() {
            return Err(HedgebookError::EmptyOperation);
        }

        if let Some(sale) = &op.physical {
            let trade = sale
                .trade_id
                .checked_sub(1)
                .and_then(|idx| self.physical_trades.get(idx))
                .ok_or(HedgebookError::TradeNotFound(sale.trade_id))?;
            if !trade.is_pending() {
                return Err(HedgebookError::TradeAlreadyCompleted(sale.trade_id));
            }
            if sale.sale_price <= 0.0 && sale.sale_premium_discount == 0.0 {
                return Err(HedgebookError::MissingSalePrice);
            }
        }
        if let Some(exit) = &op.hedge {
            let hedge = exit
                .hedge_id
                .checked_sub(1)
                .and_then(|idx| self.hedge_trades.get(idx))
                .ok_or(HedgebookError::HedgeNotFound(exit.hedge_id))?;
            if !hedge.is_open() {
                return Err(HedgebookError::HedgeAlreadyClosed(exit.hedge_id));
            }
        }

        let mut steps = Vec::new();

        if let Some(sale) = op.physical {
            let trade = &mut self.physical_trades[sale.trade_id - 1];
            trade.record_sale(sale.sale_price, sale.sale_premium_discount, Some(sale.sale_date));
            tracing::info!(trade_id = sale.trade_id, sale_price = sale.sale_price, "Physical sale completed");
            steps.push(CompletedStep::PhysicalSale { trade_id: sale.trade_id });
        }
        if let Some(exit) = op.hedge {
            let hedge = &mut self.hedge_trades[exit.hedge_id - 1];
            hedge.close(exit.exit_price, exit.exit_date);
            tracing::info!(hedge_id = exit.hedge_id, exit_price = exit.exit_price, "Hedge position closed");
            steps.push(CompletedStep::HedgeClosed { hedge_id: exit.hedge_id });
        }

        Ok(steps)
    }

    /// Trades still awaiting a sale, with their IDs.
    pub fn pending_trades(&self) -> Vec<(usize, &PhysicalTrade)> {
        self.physical_trades
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_pending())
            .map(|(idx, t)| (idx + 1, t))
            .collect()
    }

    pub fn open_hedges(&self) -> Vec<(usize, &HedgeTrade)> {
        self.hedge_trades
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_open())
            .map(|(idx, h)| (idx + 1, h))
            .collect()
    }

    pub fn pending_summary(&self) -> PendingSummary {
        pending_summary(&self.physical_trades, &self.hedge_trades)
    }

    pub fn pnl(&self) -> PnlBreakdown {
        calculate_pnl(&self.physical_trades, &self.hedge_trades)
    }

    /// Drop every record; cargo details and the purchase window are kept.
    pub fn clear(&mut self) {
        tracing::info!(records = self.len(), "Trade book cleared");
        self.physical_trades.clear();
        self.hedge_trades.clear();
    }
}
