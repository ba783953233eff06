//! Market price table
//!
//! Raw price sheets arrive with whatever headers the desk used. [`normalize`]
//! maps them onto `(date, instrument, price, type)`, drops rows it cannot read,
//! and returns a [`PriceTable`] sorted by `(date, instrument_key)`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MissingColumnError;

const DATE_ALIASES: &[&str] = &["date", "valuation_date", "pricing_date"];
const INSTRUMENT_ALIASES: &[&str] = &["instrument", "product", "contract", "name"];
const PRICE_ALIASES: &[&str] = &["price", "market_price", "settlement", "value"];
const TYPE_ALIASES: &[&str] = &["type", "category", "instrument_type"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

static NULL_CELL: Value = Value::Null;

/// An un-normalized price sheet: a header row and loosely typed cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPriceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawPriceTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build from keyed records. Columns are taken in first-seen order and
    /// absent keys become `null` cells.
    pub fn from_records(records: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|col| record.remove(col).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }
}

/// One observed market price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub date: NaiveDate,
    /// Instrument as written in the source, trimmed
    pub instrument: String,
    /// Join key for lookups
    pub instrument_key: String,
    pub price: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Normalized price table, sorted by `(date, instrument_key)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceTable {
    entries: Vec<PriceEntry>,
}

/// Case-insensitive, whitespace-trimmed instrument join key.
pub fn instrument_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolve the header, coerce every row and sort the result.
///
/// Rows with an unreadable date, a blank instrument or a non-numeric price
/// are dropped. Only an unresolvable header is an error.
pub fn normalize(raw: &RawPriceTable) -> Result<PriceTable, MissingColumnError> {
    let date_col = resolve_column(&raw.columns, DATE_ALIASES);
    let instrument_col = resolve_column(&raw.columns, INSTRUMENT_ALIASES);
    let price_col = resolve_column(&raw.columns, PRICE_ALIASES);
    let type_col = resolve_column(&raw.columns, TYPE_ALIASES);

    let (date_col, instrument_col, price_col) = match (date_col, instrument_col, price_col) {
        (Some(d), Some(i), Some(p)) => (d, i, p),
        (d, i, p) => {
            let missing = [("date", d), ("instrument", i), ("price", p)]
                .into_iter()
                .filter(|(_, col)| col.is_none())
                .map(|(name, _)| name)
                .collect();
            return Err(MissingColumnError { missing });
        }
    };

    let mut entries: Vec<PriceEntry> = raw
        .rows
        .iter()
        .filter_map(|row| {
            let cell = |idx: usize| row.get(idx).unwrap_or(&NULL_CELL);

            let date = parse_date(cell(date_col))?;
            let instrument = parse_instrument(cell(instrument_col))?;
            let price = parse_price(cell(price_col))?;
            let kind = type_col.map(|idx| stringify(cell(idx))).unwrap_or_default();

            Some(PriceEntry {
                date,
                instrument_key: instrument_key(&instrument),
                instrument,
                price,
                kind,
            })
        })
        .collect();

    // Stable, so duplicates keep their input order and the last one wins lookups.
    entries.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.instrument_key.cmp(&b.instrument_key))
    });

    let dropped = raw.rows.len() - entries.len();
    tracing::debug!(
        rows = raw.rows.len(),
        kept = entries.len(),
        dropped,
        "Normalized price table"
    );

    Ok(PriceTable { entries })
}

impl PriceTable {
    pub fn entries(&self) -> &[PriceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Price of `instrument` on exactly `as_of`.
    ///
    /// There is no fallback to an earlier date. When the same day and
    /// instrument appear more than once, the last row in table order wins.
    pub fn lookup(&self, instrument: &str, as_of: NaiveDate) -> Option<f64> {
        if self.entries.is_empty() || instrument.trim().is_empty() {
            return None;
        }

        let key = instrument_key(instrument);
        let start = self.entries.partition_point(|e| e.date < as_of);
        let end = self.entries.partition_point(|e| e.date <= as_of);

        self.entries[start..end]
            .iter()
            .rev()
            .find(|e| e.instrument_key == key)
            .map(|e| e.price)
    }

    /// Distinct price dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.entries.iter().map(|e| e.date).collect();
        dates.dedup();
        dates
    }

    /// Distinct instruments (first spelling seen per key), sorted by key.
    pub fn instruments(&self) -> Vec<String> {
        let mut seen: Vec<(&str, &str)> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|(key, _)| *key == entry.instrument_key) {
                seen.push((entry.instrument_key.as_str(), entry.instrument.as_str()));
            }
        }
        seen.sort_by(|a, b| a.0.cmp(b.0));
        seen.into_iter().map(|(_, name)| name.to_string()).collect()
    }
}

/// Index of the first column matching an alias, aliases tried in priority order.
fn resolve_column(columns: &[String], aliases: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = columns.iter().map(|c| c.trim().to_lowercase()).collect();
    aliases
        .iter()
        .find_map(|alias| normalized.iter().position(|c| c == alias))
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

fn parse_instrument(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> RawPriceTable {
        RawPriceTable::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_resolves_aliases_case_insensitively() {
        let raw = table(
            &[" Pricing_Date ", "CONTRACT", "Settlement", "Instrument_Type"],
            vec![vec![json!("2019-01-15"), json!(" GASOIL Mo1 "), json!(81.98), json!("future")]],
        );
        let prices = normalize(&raw).unwrap();
        assert_eq!(prices.len(), 1);

        let entry = &prices.entries()[0];
        assert_eq!(entry.date, day(2019, 1, 15));
        assert_eq!(entry.instrument, "GASOIL Mo1");
        assert_eq!(entry.instrument_key, "gasoil mo1");
        assert_eq!(entry.price, 81.98);
        assert_eq!(entry.kind, "future");
    }

    #[test]
    fn test_alias_priority_wins_over_column_order() {
        let raw = table(
            &["Valuation_Date", "Name", "Date", "Product", "Value", "Price"],
            vec![vec![
                json!("2019-01-20"),
                json!("ignored"),
                json!("2019-01-15"),
                json!("Dubai"),
                json!(1.0),
                json!(70.5),
            ]],
        );
        let prices = normalize(&raw).unwrap();
        let entry = &prices.entries()[0];

        assert_eq!(entry.date, day(2019, 1, 15));
        assert_eq!(entry.instrument, "Dubai");
        assert_eq!(entry.price, 70.5);
    }

    #[test]
    fn test_missing_columns_are_named() {
        let raw = table(&["when", "product", "amount"], vec![]);
        let err = normalize(&raw).unwrap_err();
        assert_eq!(err.missing, vec!["date", "price"]);

        let raw = table(&[], vec![]);
        assert_eq!(normalize(&raw).unwrap_err().missing, vec!["date", "instrument", "price"]);
    }

    #[test]
    fn test_type_column_is_optional() {
        let raw = table(&["date", "instrument", "price"], vec![vec![json!("2019-01-15"), json!("Dubai"), json!("70.5")]]);
        let prices = normalize(&raw).unwrap();
        assert_eq!(prices.entries()[0].kind, "");
        assert_eq!(prices.entries()[0].price, 70.5);
    }

    #[test]
    fn test_bad_rows_are_dropped() {
        let raw = table(
            &["date", "instrument", "price"],
            vec![
                vec![json!("2019-01-15"), json!("Dubai"), json!(70.0)],
                vec![json!("not a date"), json!("Dubai"), json!(70.0)],
                vec![json!("2019-01-15"), json!("   "), json!(70.0)],
                vec![json!("2019-01-15"), json!("Oman"), json!("n/a")],
                vec![json!("2019-01-15"), json!("Oman"), json!("NaN")],
                vec![json!(null), json!("Oman"), json!(70.0)],
                vec![json!("2019-01-15")],
            ],
        );
        let prices = normalize(&raw).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.entries()[0].instrument, "Dubai");
    }

    #[test]
    fn test_date_formats_truncate_to_day() {
        for text in [
            "2019-01-15",
            "2019/01/15",
            "01/15/2019",
            "2019-01-15 17:30:00",
            "2019-01-15T17:30:00.250",
            "2019-01-15T17:30:00+00:00",
        ] {
            assert_eq!(parse_date(&json!(text)), Some(day(2019, 1, 15)), "{}", text);
        }
        assert_eq!(parse_date(&json!(43480)), None);
    }

    #[test]
    fn test_sorted_by_date_then_key() {
        let raw = table(
            &["date", "instrument", "price"],
            vec![
                vec![json!("2019-01-16"), json!("Dubai"), json!(1.0)],
                vec![json!("2019-01-15"), json!("oman"), json!(2.0)],
                vec![json!("2019-01-15"), json!("Dubai"), json!(3.0)],
            ],
        );
        let prices = normalize(&raw).unwrap();
        let order: Vec<f64> = prices.entries().iter().map(|e| e.price).collect();
        assert_eq!(order, vec![3.0, 2.0, 1.0]);
        assert_eq!(prices.dates(), vec![day(2019, 1, 15), day(2019, 1, 16)]);
        assert_eq!(prices.instruments(), vec!["Dubai".to_string(), "oman".to_string()]);
    }

    #[test]
    fn test_lookup_last_duplicate_wins() {
        let raw = table(
            &["date", "instrument", "price"],
            vec![
                vec![json!("2019-01-15"), json!("GASOIL Mo1"), json!(80.0)],
                vec![json!("2019-01-15"), json!("gasoil mo1 "), json!(81.5)],
            ],
        );
        let prices = normalize(&raw).unwrap();
        assert_eq!(prices.lookup("  Gasoil MO1", day(2019, 1, 15)), Some(81.5));
    }

    #[test]
    fn test_lookup_misses() {
        let raw = table(
            &["date", "instrument", "price"],
            vec![vec![json!("2019-01-15"), json!("Dubai"), json!(70.0)]],
        );
        let prices = normalize(&raw).unwrap();

        assert_eq!(prices.lookup("Dubai", day(2019, 1, 16)), None);
        assert_eq!(prices.lookup("Oman", day(2019, 1, 15)), None);
        assert_eq!(prices.lookup("   ", day(2019, 1, 15)), None);
        assert_eq!(PriceTable::default().lookup("Dubai", day(2019, 1, 15)), None);
    }

    #[test]
    fn test_from_records_fills_missing_keys() {
        let records = vec![
            json!({"date": "2019-01-15", "product": "Dubai", "market_price": 70.0}),
            json!({"date": "2019-01-15", "product": "Oman", "market_price": 71.0, "category": "crude"}),
        ]
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        })
        .collect();

        let raw = RawPriceTable::from_records(records);
        assert_eq!(raw.columns.len(), 4);
        assert_eq!(raw.rows[0].len(), 4);

        let prices = normalize(&raw).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.entries()[0].kind, "");
        assert_eq!(prices.lookup("OMAN", day(2019, 1, 15)), Some(71.0));
    }
}
