//! Trade record models
//!
//! A cargo is bought as a [`PhysicalTrade`] and usually hedged with one or
//! more [`HedgeTrade`]s. Both records are created at entry time with their
//! exit fields zeroed and later completed in place; nothing links a hedge to
//! its physical trade other than the trader's intent.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Physical Trades
// =============================================================================

/// One cargo purchase, optionally later sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalTrade {
    /// Purchase date
    pub date: NaiveDate,

    /// Quantity in metric tonnes (signed; zero rows are inert)
    pub quantity: f64,

    /// Per-unit purchase price
    #[serde(default)]
    pub buy_price: f64,

    /// Premium (positive) or discount (negative) on the purchase price
    #[serde(default)]
    pub buy_premium_discount: f64,

    /// Per-unit sale price, `0.0` until the cargo is sold
    #[serde(default)]
    pub sale_price: f64,

    /// Premium (positive) or discount (negative) on the sale price
    #[serde(default)]
    pub sale_premium_discount: f64,

    /// Sale date, if the sale has been booked with one
    #[serde(default, deserialize_with = "blank_as_none")]
    pub sale_date: Option<NaiveDate>,

    /// Product name, used as the instrument for price lookups
    #[serde(default)]
    pub product_name: String,

    /// Product category (e.g. "Crude Oil")
    #[serde(default)]
    pub product_category: String,
}

/// Display status of a physical trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeStatus {
    Pending,
    Completed,
}

impl PhysicalTrade {
    /// A fresh purchase with no sale booked yet.
    pub fn purchase(date: NaiveDate, quantity: f64, buy_price: f64, buy_premium_discount: f64) -> Self {
        Self {
            date,
            quantity,
            buy_price,
            buy_premium_discount,
            sale_price: 0.0,
            sale_premium_discount: 0.0,
            sale_date: None,
            product_name: String::new(),
            product_category: String::new(),
        }
    }

    pub fn with_product(mut self, name: impl Into<String>, category: impl Into<String>) -> Self {
        self.product_name = name.into();
        self.product_category = category.into();
        self
    }

    pub fn net_buy_price(&self) -> f64 {
        self.buy_price + self.buy_premium_discount
    }

    pub fn net_sale_price(&self) -> f64 {
        self.sale_price + self.sale_premium_discount
    }

    /// A trade is pending until a sale price is booked.
    pub fn is_pending(&self) -> bool {
        self.sale_price == 0.0
    }

    pub fn status(&self) -> TradeStatus {
        if self.is_pending() {
            TradeStatus::Pending
        } else {
            TradeStatus::Completed
        }
    }

    /// Whether the trade counts towards realized P&L.
    ///
    /// This is looser than [`is_pending`](Self::is_pending): a trade sold at a
    /// bare premium/discount with no base price still counts.
    pub fn has_sale_signal(&self) -> bool {
        !(self.sale_price <= 0.0 && self.sale_premium_discount == 0.0)
    }

    /// P&L the trade would realize if sold at the given price.
    pub fn estimated_pnl(&self, sale_price: f64, sale_premium_discount: f64) -> f64 {
        (sale_price + sale_premium_discount - self.net_buy_price()) * self.quantity
    }

    /// Book the sale leg in place.
    pub fn record_sale(&mut self, sale_price: f64, sale_premium_discount: f64, sale_date: Option<NaiveDate>) {
        self.sale_price = sale_price;
        self.sale_premium_discount = sale_premium_discount;
        self.sale_date = sale_date;
    }

    /// Instrument name for price lookups: the product name, or the
    /// category when no name was recorded.
    pub fn instrument(&self) -> &str {
        let name = self.product_name.trim();
        if name.is_empty() {
            self.product_category.trim()
        } else {
            name
        }
    }
}

// =============================================================================
// Hedge Trades
// =============================================================================

/// One derivative position placed against physical exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeTrade {
    /// Contract traded (e.g. "GASOIL Mo1"), used as the instrument for price lookups
    pub contract: String,

    /// Contract volume; negative for a sell hedge
    pub volume: f64,

    #[serde(default)]
    pub entry_price: f64,

    /// Exit price, `0.0` while the position is open
    #[serde(default)]
    pub exit_price: f64,

    pub trade_date: NaiveDate,

    #[serde(default, deserialize_with = "blank_as_none")]
    pub exit_date: Option<NaiveDate>,

    /// Contract expiry, informational only
    #[serde(default, deserialize_with = "blank_as_none")]
    pub expiry: Option<NaiveDate>,

    #[serde(default)]
    pub status: HedgeStatus,
}

/// Status of a hedge position
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HedgeStatus {
    #[default]
    Open,
    Closed,
}

/// Direction of a hedge position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HedgeSide {
    /// Short futures; profits when prices fall
    Sell,
    /// Long futures; profits when prices rise
    Buy,
}

impl HedgeTrade {
    pub fn open(contract: impl Into<String>, volume: f64, entry_price: f64, trade_date: NaiveDate) -> Self {
        Self {
            contract: contract.into(),
            volume,
            entry_price,
            exit_price: 0.0,
            trade_date,
            exit_date: None,
            expiry: None,
            status: HedgeStatus::Open,
        }
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Close the position. Exit price, exit date and status always move together.
    pub fn close(&mut self, exit_price: f64, exit_date: Option<NaiveDate>) {
        self.exit_price = exit_price;
        self.exit_date = exit_date;
        self.status = HedgeStatus::Closed;
    }

    pub fn is_open(&self) -> bool {
        self.status == HedgeStatus::Open
    }

    pub fn side(&self) -> HedgeSide {
        if self.volume < 0.0 {
            HedgeSide::Sell
        } else {
            HedgeSide::Buy
        }
    }

    /// P&L the position would realize if closed at `exit_price`.
    pub fn estimated_pnl(&self, exit_price: f64) -> f64 {
        (exit_price - self.entry_price) * self.volume
    }

    pub fn instrument(&self) -> &str {
        self.contract.trim()
    }
}

/// Accepts a missing field, `null`, or an empty string as "no date".
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_purchase_starts_pending() {
        let trade = PhysicalTrade::purchase(day(2019, 1, 15), 245778.0, 72.46, 0.5);
        assert!(trade.is_pending());
        assert_eq!(trade.status(), TradeStatus::Pending);
        assert!(!trade.has_sale_signal());
        assert_eq!(trade.net_buy_price(), 72.46 + 0.5);
    }

    #[test]
    fn test_premium_only_sale_counts_but_stays_pending() {
        let mut trade = PhysicalTrade::purchase(day(2019, 1, 15), 1000.0, 70.0, 0.0);
        trade.record_sale(0.0, 1.25, None);
        assert!(trade.is_pending());
        assert!(trade.has_sale_signal());
    }

    #[test]
    fn test_instrument_falls_back_to_category() {
        let trade = PhysicalTrade::purchase(day(2019, 1, 15), 1.0, 1.0, 0.0).with_product("  ", " Crude Oil ");
        assert_eq!(trade.instrument(), "Crude Oil");

        let trade = trade.with_product(" Dubai ", "Crude Oil");
        assert_eq!(trade.instrument(), "Dubai");
    }

    #[test]
    fn test_close_hedge_sets_all_exit_fields() {
        let mut hedge = HedgeTrade::open("GASOIL Mo1", -245778.0, 75.87, day(2019, 1, 15));
        assert!(hedge.is_open());
        assert_eq!(hedge.side(), HedgeSide::Sell);

        hedge.close(81.98, Some(day(2019, 2, 1)));
        assert!(!hedge.is_open());
        assert_eq!(hedge.status, HedgeStatus::Closed);
        assert_eq!(hedge.exit_price, 81.98);
        assert_eq!(hedge.exit_date, Some(day(2019, 2, 1)));
    }

    #[test]
    fn test_deserialize_with_defaults_and_blank_dates() {
        let trade: PhysicalTrade = serde_json::from_value(json!({
            "date": "2019-01-15",
            "quantity": 245778,
            "buy_price": 72.46,
            "sale_price": 78.96,
            "sale_date": ""
        }))
        .unwrap();
        assert_eq!(trade.buy_premium_discount, 0.0);
        assert_eq!(trade.sale_date, None);
        assert_eq!(trade.status(), TradeStatus::Completed);

        let hedge: HedgeTrade = serde_json::from_value(json!({
            "contract": "GASOIL Mo1",
            "volume": -245778,
            "entry_price": 75.87,
            "trade_date": "2019-01-15",
            "exit_date": "2019-02-01",
            "status": "Closed"
        }))
        .unwrap();
        assert_eq!(hedge.exit_date, Some(day(2019, 2, 1)));
        assert_eq!(hedge.expiry, None);
        assert_eq!(hedge.status, HedgeStatus::Closed);
    }

    #[test]
    fn test_deserialize_rejects_malformed_date() {
        let result: Result<HedgeTrade, _> = serde_json::from_value(json!({
            "contract": "GASOIL Mo1",
            "volume": 1.0,
            "trade_date": "2019-01-15",
            "exit_date": "next week"
        }));
        assert!(result.is_err());
    }
}
