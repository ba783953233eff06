//! Configuration management for the MCP server

use chrono::NaiveDate;
use hedgebook_core::{catalog, CargoInfo, PurchaseWindow, TradeBook, DEFAULT_MAX_RECORDS};
use serde::Deserialize;

use crate::error::{HedgebookMcpError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub book: BookConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name reported in the MCP handshake
    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}

fn default_server_name() -> String {
    "hedgebook-mcp".to_string()
}

/// Initial state of the session trade book
#[derive(Debug, Clone, Deserialize)]
pub struct BookConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    #[serde(default = "default_cargo_name")]
    pub cargo_name: String,
    #[serde(default)]
    pub delivery_point: String,
    /// Catalog selection; a name outside the catalog is kept as-is
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default)]
    pub custom_product: Option<String>,
    #[serde(default = "default_purchase_start")]
    pub purchase_start: Option<NaiveDate>,
    #[serde(default = "default_purchase_end")]
    pub purchase_end: Option<NaiveDate>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            cargo_name: default_cargo_name(),
            delivery_point: String::new(),
            product: default_product(),
            custom_product: None,
            purchase_start: default_purchase_start(),
            purchase_end: default_purchase_end(),
        }
    }
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

fn default_cargo_name() -> String {
    "GO-KAKI STAR 0.5%".to_string()
}

fn default_product() -> String {
    "Dubai".to_string()
}

fn default_purchase_start() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2019, 1, 1)
}

fn default_purchase_end() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2019, 2, 7)
}

impl BookConfig {
    /// Build the empty trade book this configuration describes.
    pub fn build(&self) -> Result<TradeBook> {
        let mut cargo = CargoInfo::new(
            self.cargo_name.clone(),
            &self.product,
            self.custom_product.as_deref(),
        );
        cargo.delivery_point = self.delivery_point.clone();

        let mut book = TradeBook::new(cargo).with_max_records(self.max_records);

        match (self.purchase_start, self.purchase_end) {
            (Some(start), Some(end)) => {
                let window = PurchaseWindow::new(start, end)
                    .map_err(|e| HedgebookMcpError::Config(e.to_string()))?;
                book = book.with_purchase_window(window);
            }
            (None, None) => {}
            _ => {
                return Err(HedgebookMcpError::Config(
                    "book.purchase_start and book.purchase_end must be set together".into(),
                ))
            }
        }

        if catalog::category_of(&self.product).is_none() {
            tracing::debug!(product = %self.product, "Product is not in the catalog");
        }

        Ok(book)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "hedgebook_mcp=info,hedgebook_core=info".to_string()
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("server.name", default_server_name())?
            .set_default("book.max_records", default_max_records() as i64)?
            .set_default("book.cargo_name", default_cargo_name())?
            .set_default("book.product", default_product())?
            .set_default("log.filter", default_log_filter())?
            // hedgebook-mcp.toml / .yaml / .json, if present
            .add_source(config::File::with_name("hedgebook-mcp").required(false))
            // HEDGEBOOK__BOOK__MAX_RECORDS, HEDGEBOOK__LOG__FILTER, ...
            .add_source(
                config::Environment::with_prefix("HEDGEBOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
