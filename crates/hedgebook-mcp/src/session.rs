//! In-memory session: the trade book and the loaded price table.
//!
//! The core engine is stateless; this is the one place that owns records
//! between tool calls.

use chrono::NaiveDate;
use hedgebook_core::{
    calculate_pnl, catalog, cumulative_physical_pnl, evaluate, hedge_rows, hedge_summary, normalize,
    physical_rows, physical_summary, series, BuyOperation, BuyReceipt, CargoInfo, CompletedStep,
    HedgeTrade, MtmPoint, MtmSnapshot, PhysicalTrade, PnlBreakdown, PriceTable, PurchaseWindow,
    RawPriceTable, SaleOperation, TradeBook,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{HedgebookMcpError, Result};

pub struct Session {
    book: TradeBook,
    prices: Option<PriceTable>,
}

/// Realized P&L with its per-position breakdown and aggregates.
#[derive(Debug, Serialize)]
pub struct PnlReport {
    pub totals: PnlBreakdown,
    pub physical: Vec<hedgebook_core::PhysicalPnlRow>,
    pub hedges: Vec<hedgebook_core::HedgePnlRow>,
    pub physical_summary: hedgebook_core::PhysicalSummary,
    pub hedge_summary: hedgebook_core::HedgeSummary,
    pub cumulative_physical_pnl: Vec<hedgebook_core::CumulativePnlPoint>,
}

#[derive(Debug, Serialize)]
pub struct PriceLoadSummary {
    pub rows_received: usize,
    pub rows_kept: usize,
    pub dates: Vec<NaiveDate>,
    pub instruments: Vec<String>,
}

impl Session {
    pub fn new(book: TradeBook) -> Self {
        Self { book, prices: None }
    }

    pub fn book(&self) -> &TradeBook {
        &self.book
    }

    pub fn prices(&self) -> Option<&PriceTable> {
        self.prices.as_ref()
    }

    fn require_prices(&self) -> Result<&PriceTable> {
        self.prices.as_ref().ok_or(HedgebookMcpError::NoPriceTable)
    }

    /// Realized P&L over the session book, or over caller-supplied records.
    ///
    /// With `closed_only`, open hedges are left out before calculating.
    pub fn calculate_pnl(
        &self,
        records: Option<(Vec<PhysicalTrade>, Vec<HedgeTrade>)>,
        closed_only: bool,
    ) -> PnlBreakdown {
        let (physical, hedges) = match records {
            Some((physical, hedges)) => (physical, hedges),
            None => (
                self.book.physical_trades().to_vec(),
                self.book.hedge_trades().to_vec(),
            ),
        };

        if closed_only {
            let closed: Vec<HedgeTrade> = hedges.into_iter().filter(|h| !h.is_open()).collect();
            calculate_pnl(&physical, &closed)
        } else {
            calculate_pnl(&physical, &hedges)
        }
    }

    pub fn pnl_report(&self) -> PnlReport {
        let physical = self.book.physical_trades();
        let hedges = self.book.hedge_trades();
        let physical_totals = physical_summary(physical);

        PnlReport {
            totals: calculate_pnl(physical, hedges),
            physical: physical_rows(physical),
            hedges: hedge_rows(hedges),
            hedge_summary: hedge_summary(hedges, physical_totals.total_quantity),
            physical_summary: physical_totals,
            cumulative_physical_pnl: cumulative_physical_pnl(physical),
        }
    }

    pub fn load_prices(&mut self, raw: RawPriceTable) -> Result<PriceLoadSummary> {
        let table = normalize(&raw).map_err(hedgebook_core::HedgebookError::from)?;

        let summary = PriceLoadSummary {
            rows_received: raw.rows.len(),
            rows_kept: table.len(),
            dates: table.dates(),
            instruments: table.instruments(),
        };
        tracing::info!(
            rows_received = summary.rows_received,
            rows_kept = summary.rows_kept,
            "Price table loaded"
        );

        self.prices = Some(table);
        Ok(summary)
    }

    pub fn lookup_price(&self, instrument: &str, as_of: NaiveDate) -> Result<Option<f64>> {
        Ok(self.require_prices()?.lookup(instrument, as_of))
    }

    pub fn evaluate_mtm(&self, as_of: NaiveDate) -> Result<MtmSnapshot> {
        let prices = self.require_prices()?;
        Ok(evaluate(
            prices,
            self.book.physical_trades(),
            self.book.hedge_trades(),
            as_of,
        ))
    }

    pub fn mtm_series(&self) -> Result<Vec<MtmPoint>> {
        let prices = self.require_prices()?;
        Ok(series(
            prices,
            self.book.physical_trades(),
            self.book.hedge_trades(),
        ))
    }

    pub fn add_buy(&mut self, op: BuyOperation) -> Result<BuyReceipt> {
        Ok(self.book.add_buy(op)?)
    }

    pub fn complete_sale(&mut self, op: SaleOperation) -> Result<Vec<CompletedStep>> {
        Ok(self.book.complete_sale(op)?)
    }

    /// Replace cargo details and the purchase window. Existing records keep
    /// the product they were booked with.
    pub fn configure_cargo(&mut self, cargo: CargoInfo, window: Option<PurchaseWindow>) {
        tracing::info!(
            cargo = %cargo.cargo_name,
            product = %cargo.product_name,
            "Cargo details updated"
        );
        self.book.cargo = cargo;
        self.book.purchase_window = window;
    }

    pub fn records(&self) -> Value {
        let pending: Vec<usize> = self.book.pending_trades().into_iter().map(|(id, _)| id).collect();
        let open: Vec<usize> = self.book.open_hedges().into_iter().map(|(id, _)| id).collect();

        json!({
            "cargo": self.book.cargo,
            "purchase_window": self.book.purchase_window,
            "physical_trades": self.book.physical_trades(),
            "hedge_trades": self.book.hedge_trades(),
            "pending_trade_ids": pending,
            "open_hedge_ids": open,
            "pending_summary": self.book.pending_summary(),
        })
    }

    /// Clear all records, and optionally the price table.
    pub fn reset(&mut self, include_prices: bool) {
        self.book.clear();
        if include_prices {
            self.prices = None;
        }
    }

    /// Replace the records with the reference sample, keeping limits and window.
    pub fn load_sample(&mut self) {
        let mut sample = TradeBook::sample();
        sample.purchase_window = self.book.purchase_window;
        sample.max_records = self.book.max_records;
        self.book = sample;
        tracing::info!("Sample data loaded");
    }

    pub fn catalog() -> Value {
        let categories: Vec<Value> = catalog::PRODUCT_CATALOG
            .iter()
            .map(|(category, products)| json!({"category": category, "products": products}))
            .collect();

        json!({
            "categories": categories,
            "custom_product": catalog::CUSTOM_PRODUCT,
            "hedge_contracts": catalog::HEDGE_CONTRACTS,
            "no_hedge": catalog::NO_HEDGE,
        })
    }
}
