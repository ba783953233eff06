//! Mark-to-market valuation
//!
//! Values positions still open on a given date against the price table.
//! Positions closed by that date contribute nothing here; their P&L is
//! realized and belongs to [`calculate_pnl`](crate::pnl::calculate_pnl).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::*;
use crate::prices::{instrument_key, PriceTable};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    Physical,
    Hedge,
}

/// Status of a position as of the valuation date
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// One valued position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtmPosition {
    pub kind: PositionKind,
    /// 1-based position in the input list of its kind
    pub id: usize,
    pub instrument: String,
    /// Purchase date or hedge trade date
    pub opened_on: NaiveDate,
    /// Quantity or volume
    pub quantity: f64,
    /// Net buy price or hedge entry price
    pub cost_price: f64,
    pub status: PositionStatus,
    /// Observed price, `None` when closed or not covered by the table
    pub market_price: Option<f64>,
    pub mtm_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtmSnapshot {
    pub as_of: NaiveDate,
    pub positions: Vec<MtmPosition>,
    pub physical_mtm: f64,
    pub hedge_mtm: f64,
    pub net_mtm: f64,
    /// Instruments of open positions with no price on `as_of`, one entry
    /// per instrument key, sorted by key
    pub missing_instruments: Vec<String>,
}

impl MtmSnapshot {
    pub fn has_missing_prices(&self) -> bool {
        !self.missing_instruments.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MtmPoint {
    pub date: NaiveDate,
    pub physical_pnl: f64,
    pub hedge_pnl: f64,
    pub net_pnl: f64,
}

/// Value every position that exists on `as_of`.
pub fn evaluate(
    prices: &PriceTable,
    physical_trades: &[PhysicalTrade],
    hedge_trades: &[HedgeTrade],
    as_of: NaiveDate,
) -> MtmSnapshot {
    let mut positions = Vec::new();
    // instrument key -> first spelling seen
    let mut missing: BTreeMap<String, String> = BTreeMap::new();
    let mut physical_mtm = 0.0;
    let mut hedge_mtm = 0.0;

    for (idx, trade) in physical_trades.iter().enumerate() {
        if trade.quantity == 0.0 || trade.date > as_of {
            continue;
        }

        let status = match trade.sale_date {
            Some(sold_on) if sold_on <= as_of => PositionStatus::Closed,
            _ => PositionStatus::Open,
        };

        let position = value_position(
            prices,
            PositionKind::Physical,
            idx + 1,
            trade.instrument(),
            trade.date,
            trade.quantity,
            trade.net_buy_price(),
            status,
            as_of,
            &mut missing,
        );
        physical_mtm += position.mtm_pnl;
        positions.push(position);
    }

    for (idx, hedge) in hedge_trades.iter().enumerate() {
        if hedge.volume == 0.0 || hedge.trade_date > as_of {
            continue;
        }

        let status = match hedge.exit_date {
            Some(exited_on) if exited_on <= as_of => PositionStatus::Closed,
            Some(_) => PositionStatus::Open,
            None => match hedge.status {
                HedgeStatus::Open => PositionStatus::Open,
                HedgeStatus::Closed => PositionStatus::Closed,
            },
        };

        let position = value_position(
            prices,
            PositionKind::Hedge,
            idx + 1,
            hedge.instrument(),
            hedge.trade_date,
            hedge.volume,
            hedge.entry_price,
            status,
            as_of,
            &mut missing,
        );
        hedge_mtm += position.mtm_pnl;
        positions.push(position);
    }

    if !missing.is_empty() {
        tracing::warn!(
            as_of = %as_of,
            missing = ?missing.values().collect::<Vec<_>>(),
            "No market price for open positions"
        );
    }

    MtmSnapshot {
        as_of,
        positions,
        physical_mtm,
        hedge_mtm,
        net_mtm: physical_mtm + hedge_mtm,
        missing_instruments: missing.into_values().collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn value_position(
    prices: &PriceTable,
    kind: PositionKind,
    id: usize,
    instrument: &str,
    opened_on: NaiveDate,
    quantity: f64,
    cost_price: f64,
    status: PositionStatus,
    as_of: NaiveDate,
    missing: &mut BTreeMap<String, String>,
) -> MtmPosition {
    let market_price = match status {
        PositionStatus::Closed => None,
        PositionStatus::Open => {
            let price = prices.lookup(instrument, as_of);
            if price.is_none() {
                missing
                    .entry(instrument_key(instrument))
                    .or_insert_with(|| instrument.to_string());
            }
            price
        }
    };

    MtmPosition {
        kind,
        id,
        instrument: instrument.to_string(),
        opened_on,
        quantity,
        cost_price,
        status,
        market_price,
        mtm_pnl: market_price.map_or(0.0, |price| (price - cost_price) * quantity),
    }
}

/// One snapshot per distinct price date, ascending.
pub fn series(prices: &PriceTable, physical_trades: &[PhysicalTrade], hedge_trades: &[HedgeTrade]) -> Vec<MtmPoint> {
    prices
        .dates()
        .into_iter()
        .map(|date| {
            let snapshot = evaluate(prices, physical_trades, hedge_trades, date);
            MtmPoint {
                date,
                physical_pnl: snapshot.physical_mtm,
                hedge_pnl: snapshot.hedge_mtm,
                net_pnl: snapshot.net_mtm,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::{normalize, RawPriceTable};
    use approx::assert_relative_eq;
    use serde_json::{json, Value};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn prices(rows: &[(&str, &str, f64)]) -> PriceTable {
        let raw = RawPriceTable::new(
            vec!["date".into(), "instrument".into(), "price".into()],
            rows.iter()
                .map(|(date, instrument, price)| vec![json!(date), json!(instrument), json!(price)])
                .collect::<Vec<Vec<Value>>>(),
        );
        normalize(&raw).unwrap()
    }

    fn dubai_cargo() -> PhysicalTrade {
        PhysicalTrade::purchase(day(2019, 1, 15), 1000.0, 70.0, 0.5).with_product("Dubai", "Crude Oil")
    }

    #[test]
    fn test_open_physical_uses_market_price() {
        let table = prices(&[("2019-01-20", "dubai", 74.0)]);
        let snapshot = evaluate(&table, &[dubai_cargo()], &[], day(2019, 1, 20));

        assert_relative_eq!(snapshot.physical_mtm, (74.0 - 70.5) * 1000.0);
        assert_eq!(snapshot.hedge_mtm, 0.0);
        assert_relative_eq!(snapshot.net_mtm, snapshot.physical_mtm);
        assert!(snapshot.missing_instruments.is_empty());

        let position = &snapshot.positions[0];
        assert_eq!(position.kind, PositionKind::Physical);
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.market_price, Some(74.0));
    }

    #[test]
    fn test_missing_price_is_reported_until_covered() {
        let trades = vec![dubai_cargo(), dubai_cargo()];

        let uncovered = prices(&[("2019-01-20", "Oman", 71.0)]);
        let snapshot = evaluate(&uncovered, &trades, &[], day(2019, 1, 20));
        assert_eq!(snapshot.physical_mtm, 0.0);
        assert_eq!(snapshot.missing_instruments, vec!["Dubai".to_string()]);
        assert!(snapshot.has_missing_prices());

        let covered = prices(&[("2019-01-20", "Oman", 71.0), ("2019-01-20", "DUBAI", 72.0)]);
        let snapshot = evaluate(&covered, &trades, &[], day(2019, 1, 20));
        assert_relative_eq!(snapshot.physical_mtm, 2.0 * (72.0 - 70.5) * 1000.0);
        assert!(snapshot.missing_instruments.is_empty());
    }

    #[test]
    fn test_missing_instruments_collapse_by_key() {
        let trades = vec![
            dubai_cargo(),
            PhysicalTrade::purchase(day(2019, 1, 16), 500.0, 71.0, 0.0).with_product(" DUBAI ", "Crude Oil"),
            PhysicalTrade::purchase(day(2019, 1, 16), 500.0, 71.0, 0.0).with_product("Basrah Light (Iraq)", "Crude Oil"),
        ];
        let hedges = vec![HedgeTrade::open("gasoil mo1", -1000.0, 75.0, day(2019, 1, 15))];
        let table = prices(&[("2019-01-20", "Oman", 71.0)]);

        let snapshot = evaluate(&table, &trades, &hedges, day(2019, 1, 20));
        assert_eq!(
            snapshot.missing_instruments,
            vec!["Basrah Light (Iraq)".to_string(), "Dubai".to_string(), "gasoil mo1".to_string()]
        );
    }

    #[test]
    fn test_sold_trade_is_closed_and_contributes_nothing() {
        let mut trade = dubai_cargo();
        trade.record_sale(78.0, 0.0, Some(day(2019, 1, 18)));
        let table = prices(&[("2019-01-18", "Dubai", 90.0), ("2019-01-20", "Dubai", 90.0)]);

        for as_of in [day(2019, 1, 18), day(2019, 1, 20)] {
            let snapshot = evaluate(&table, &[trade.clone()], &[], as_of);
            assert_eq!(snapshot.physical_mtm, 0.0);
            assert_eq!(snapshot.positions[0].status, PositionStatus::Closed);
            assert_eq!(snapshot.positions[0].market_price, None);
        }

        let before_sale = evaluate(&table, &[trade], &[], day(2019, 1, 17));
        assert_eq!(before_sale.positions[0].status, PositionStatus::Open);
        assert_eq!(before_sale.missing_instruments, vec!["Dubai".to_string()]);
    }

    #[test]
    fn test_future_positions_are_skipped() {
        let table = prices(&[("2019-01-10", "Dubai", 70.0)]);
        let snapshot = evaluate(&table, &[dubai_cargo()], &[], day(2019, 1, 10));
        assert!(snapshot.positions.is_empty());
        assert!(snapshot.missing_instruments.is_empty());
    }

    #[test]
    fn test_hedge_status_follows_exit_date() {
        let mut exited = HedgeTrade::open("GASOIL Mo1", -1000.0, 75.0, day(2019, 1, 15));
        exited.close(80.0, Some(day(2019, 1, 25)));

        let mut closed_undated = HedgeTrade::open("GASOIL Mo1", -500.0, 75.0, day(2019, 1, 15));
        closed_undated.close(80.0, None);

        let table = prices(&[("2019-01-20", "gasoil mo1", 78.0), ("2019-01-25", "gasoil mo1", 79.0)]);

        let snapshot = evaluate(&table, &[], &[exited.clone(), closed_undated.clone()], day(2019, 1, 20));
        assert_eq!(snapshot.positions[0].status, PositionStatus::Open);
        assert_eq!(snapshot.positions[1].status, PositionStatus::Closed);
        assert_relative_eq!(snapshot.hedge_mtm, (78.0 - 75.0) * -1000.0);

        let snapshot = evaluate(&table, &[], &[exited], day(2019, 1, 25));
        assert_eq!(snapshot.positions[0].status, PositionStatus::Closed);
        assert_eq!(snapshot.hedge_mtm, 0.0);
    }

    #[test]
    fn test_open_hedge_without_exit_date() {
        let hedge = HedgeTrade::open(" GASOIL Mo1 ", -1000.0, 75.0, day(2019, 1, 15));
        let table = prices(&[("2019-01-20", "GASOIL Mo1", 73.0)]);
        let snapshot = evaluate(&table, &[dubai_cargo()], &[hedge], day(2019, 1, 20));

        assert_relative_eq!(snapshot.hedge_mtm, (73.0 - 75.0) * -1000.0);
        assert_eq!(snapshot.missing_instruments, vec!["Dubai".to_string()]);
        assert_relative_eq!(snapshot.net_mtm, snapshot.physical_mtm + snapshot.hedge_mtm);
    }

    #[test]
    fn test_zero_volume_rows_are_ignored() {
        let hedge = HedgeTrade::open("GASOIL Mo1", 0.0, 75.0, day(2019, 1, 15));
        let table = prices(&[("2019-01-20", "GASOIL Mo1", 73.0)]);
        let snapshot = evaluate(&table, &[], &[hedge], day(2019, 1, 20));
        assert!(snapshot.positions.is_empty());
    }

    #[test]
    fn test_series_matches_point_evaluations() {
        let hedge = HedgeTrade::open("GASOIL Mo1", -1000.0, 75.0, day(2019, 1, 15));
        let physical = vec![dubai_cargo()];
        let hedges = vec![hedge];
        let table = prices(&[
            ("2019-01-21", "Dubai", 73.0),
            ("2019-01-20", "Dubai", 72.0),
            ("2019-01-20", "GASOIL Mo1", 76.0),
            ("2019-01-14", "Dubai", 69.0),
        ]);

        let points = series(&table, &physical, &hedges);
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day(2019, 1, 14), day(2019, 1, 20), day(2019, 1, 21)]);

        assert_eq!(points[0].net_pnl, 0.0);
        for point in &points {
            let snapshot = evaluate(&table, &physical, &hedges, point.date);
            assert_eq!(point.physical_pnl, snapshot.physical_mtm);
            assert_eq!(point.hedge_pnl, snapshot.hedge_mtm);
            assert_eq!(point.net_pnl, snapshot.net_mtm);
        }
        assert_relative_eq!(points[1].net_pnl, 1500.0 - 1000.0);
    }
}
