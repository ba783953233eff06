//! MCP tool definitions and request handling
//!
//! This module defines all available tools and handles MCP protocol messages.

use hedgebook_core::{
    BuyOperation, CargoInfo, HedgeTrade, PhysicalTrade, PurchaseWindow, RawPriceTable, SaleOperation,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{optional_date, require_date, require_str, HedgebookMcpError, Result};
use crate::session::Session;

// =============================================================================
// MCP Protocol Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

// =============================================================================
// Hedgebook Tools
// =============================================================================

/// Tool handler over one session
pub struct HedgebookTools {
    server_name: String,
    session: Session,
}

fn date_property(description: &str) -> Value {
    json!({
        "type": "string",
        "format": "date",
        "description": description
    })
}

impl HedgebookTools {
    pub fn new(server_name: impl Into<String>, session: Session) -> Self {
        Self {
            server_name: server_name.into(),
            session,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Get all available tools
    pub fn get_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "hedgebook_health".to_string(),
                description: "Check the server status and the size of the current session.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_calculate_pnl".to_string(),
                description: "Calculate realized physical, hedge and net P&L. Uses the session trade book unless physical_trades/hedge_trades are supplied. Hedges are included whether open or closed unless closed_only is set.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "physical_trades": {
                            "type": "array",
                            "description": "Physical trade records (date, quantity, buy_price, buy_premium_discount, sale_price, sale_premium_discount, sale_date)"
                        },
                        "hedge_trades": {
                            "type": "array",
                            "description": "Hedge records (contract, volume, entry_price, exit_price, trade_date, exit_date, status)"
                        },
                        "closed_only": {
                            "type": "boolean",
                            "description": "Leave open hedges out of hedge P&L (default: false)"
                        }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_pnl_report".to_string(),
                description: "Per-position P&L rows, weighted average prices, hedge ratio and the cumulative physical P&L series for the session trade book.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_load_prices".to_string(),
                description: "Load a market price table into the session. Accepts columns+rows or a list of records. Date, instrument and price columns are required (aliases accepted); unreadable rows are dropped.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "columns": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Header row"
                        },
                        "rows": {
                            "type": "array",
                            "description": "Rows of cells, in header order"
                        },
                        "records": {
                            "type": "array",
                            "description": "Alternative to columns/rows: one object per price"
                        }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_lookup_price".to_string(),
                description: "Look up the market price of an instrument on an exact date.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "instrument": {
                            "type": "string",
                            "description": "Instrument name (case and surrounding whitespace ignored)"
                        },
                        "date": date_property("Pricing date (YYYY-MM-DD)")
                    },
                    "required": ["instrument", "date"]
                }),
            },
            Tool {
                name: "hedgebook_evaluate_mtm".to_string(),
                description: "Mark open positions to market as of a date. Returns per-position values, physical/hedge/net MTM, and instruments with no price on that date.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "as_of": date_property("Valuation date (YYYY-MM-DD)")
                    },
                    "required": ["as_of"]
                }),
            },
            Tool {
                name: "hedgebook_mtm_series".to_string(),
                description: "Mark-to-market P&L for every date in the loaded price table.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_add_buy".to_string(),
                description: "Book a physical purchase, optionally opening a hedge at the same time. Use a negative hedge volume for a sell hedge.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "date": date_property("Purchase date (YYYY-MM-DD)"),
                        "quantity": { "type": "number", "description": "Quantity in MT (non-zero)" },
                        "buy_price": { "type": "number", "description": "Buy price per unit" },
                        "buy_premium_discount": { "type": "number", "description": "Premium (+) or discount (-)" },
                        "hedge": {
                            "type": "object",
                            "description": "Optional hedge leg: contract, volume, entry_price, trade_date, expiry"
                        }
                    },
                    "required": ["date", "quantity", "buy_price"]
                }),
            },
            Tool {
                name: "hedgebook_complete_sale".to_string(),
                description: "Complete a pending physical trade and/or close an open hedge position, by ID.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "physical": {
                            "type": "object",
                            "description": "trade_id, sale_price, sale_premium_discount, sale_date (required)"
                        },
                        "hedge": {
                            "type": "object",
                            "description": "hedge_id, exit_price, exit_date"
                        }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_list_records".to_string(),
                description: "List all records in the session trade book with pending/open IDs and the pending exposure summary.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_configure_cargo".to_string(),
                description: "Set cargo details, product and purchase date window for new trades.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "cargo_name": { "type": "string" },
                        "delivery_point": { "type": "string" },
                        "product": { "type": "string", "description": "Product from the catalog" },
                        "custom_product": { "type": "string", "description": "Name used when product is the custom entry" },
                        "purchase_start": date_property("First allowed purchase date"),
                        "purchase_end": date_property("Last allowed purchase date")
                    },
                    "required": ["cargo_name", "product"]
                }),
            },
            Tool {
                name: "hedgebook_reset".to_string(),
                description: "Clear all trade records from the session.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "include_prices": {
                            "type": "boolean",
                            "description": "Also drop the loaded price table (default: false)"
                        }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_load_sample".to_string(),
                description: "Replace the session records with the reference sample cargo and hedge.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "hedgebook_catalog".to_string(),
                description: "List product categories, products and hedge contracts.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
        ]
    }

    /// Execute a tool by name
    pub fn execute(&mut self, name: &str, args: &Value) -> Result<Value> {
        match name {
            "hedgebook_health" => {
                let book = self.session.book();
                Ok(json!({
                    "status": "healthy",
                    "version": env!("CARGO_PKG_VERSION"),
                    "physical_trades": book.physical_trades().len(),
                    "hedge_trades": book.hedge_trades().len(),
                    "price_rows": self.session.prices().map(|p| p.len())
                }))
            }

            "hedgebook_calculate_pnl" => {
                let records = if args.get("physical_trades").is_some() || args.get("hedge_trades").is_some() {
                    let physical: Vec<PhysicalTrade> = array_arg(args, "physical_trades")?;
                    let hedges: Vec<HedgeTrade> = array_arg(args, "hedge_trades")?;
                    Some((physical, hedges))
                } else {
                    None
                };
                let closed_only = args["closed_only"].as_bool().unwrap_or(false);
                Ok(serde_json::to_value(self.session.calculate_pnl(records, closed_only))?)
            }

            "hedgebook_pnl_report" => Ok(serde_json::to_value(self.session.pnl_report())?),

            "hedgebook_load_prices" => {
                let raw = raw_price_table(args)?;
                Ok(serde_json::to_value(self.session.load_prices(raw)?)?)
            }

            "hedgebook_lookup_price" => {
                let instrument = require_str(args, "instrument")?;
                let date = require_date(args, "date")?;
                let price = self.session.lookup_price(instrument, date)?;
                Ok(json!({
                    "instrument": instrument,
                    "date": date,
                    "found": price.is_some(),
                    "price": price
                }))
            }

            "hedgebook_evaluate_mtm" => {
                let as_of = require_date(args, "as_of")?;
                Ok(serde_json::to_value(self.session.evaluate_mtm(as_of)?)?)
            }

            "hedgebook_mtm_series" => Ok(serde_json::to_value(self.session.mtm_series()?)?),

            "hedgebook_add_buy" => {
                let op: BuyOperation = serde_json::from_value(args.clone())?;
                Ok(serde_json::to_value(self.session.add_buy(op)?)?)
            }

            "hedgebook_complete_sale" => {
                let op: SaleOperation = serde_json::from_value(args.clone())?;
                let steps = self.session.complete_sale(op)?;
                Ok(json!({ "completed": steps }))
            }

            "hedgebook_list_records" => Ok(self.session.records()),

            "hedgebook_configure_cargo" => {
                let cargo_name = require_str(args, "cargo_name")?;
                let product = require_str(args, "product")?;
                let mut cargo = CargoInfo::new(cargo_name, product, args["custom_product"].as_str());
                cargo.delivery_point = args["delivery_point"].as_str().unwrap_or_default().trim().to_string();

                let window = match (optional_date(args, "purchase_start")?, optional_date(args, "purchase_end")?) {
                    (Some(start), Some(end)) => Some(PurchaseWindow::new(start, end)?),
                    (None, None) => None,
                    _ => {
                        return Err(HedgebookMcpError::InvalidParameter(
                            "purchase_start and purchase_end must be given together".into(),
                        ))
                    }
                };

                self.session.configure_cargo(cargo, window);
                Ok(json!({
                    "cargo": self.session.book().cargo,
                    "purchase_window": self.session.book().purchase_window
                }))
            }

            "hedgebook_reset" => {
                let include_prices = args["include_prices"].as_bool().unwrap_or(false);
                self.session.reset(include_prices);
                Ok(json!({ "status": "cleared", "include_prices": include_prices }))
            }

            "hedgebook_load_sample" => {
                self.session.load_sample();
                Ok(self.session.records())
            }

            "hedgebook_catalog" => Ok(Session::catalog()),

            _ => Err(HedgebookMcpError::UnknownTool(name.to_string())),
        }
    }
}

/// Deserialize an optional array argument; absent or null means empty.
fn array_arg<T: serde::de::DeserializeOwned>(args: &Value, key: &str) -> Result<Vec<T>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

fn raw_price_table(args: &Value) -> Result<RawPriceTable> {
    if let Some(records) = args.get("records") {
        let records: Vec<Map<String, Value>> = serde_json::from_value(records.clone())?;
        return Ok(RawPriceTable::from_records(records));
    }

    if args.get("columns").is_none() {
        return Err(HedgebookMcpError::InvalidParameter(
            "Provide either records or columns and rows".into(),
        ));
    }
    Ok(serde_json::from_value(args.clone())?)
}

// =============================================================================
// MCP Protocol Handlers
// =============================================================================

fn handle_initialize(tools: &HedgebookTools, _params: &Value) -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": tools.server_name(),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_list_tools(tools: &HedgebookTools) -> Value {
    json!({
        "tools": tools.get_tools()
    })
}

fn handle_call_tool(tools: &mut HedgebookTools, params: &Value) -> Value {
    let name = params["name"].as_str().unwrap_or("");
    let args = &params["arguments"];

    match tools.execute(name, args) {
        Ok(result) => {
            json!({
                "content": [{
                    "type": "text",
                    "text": serde_json::to_string_pretty(&result).unwrap_or_default()
                }]
            })
        }
        Err(e) => {
            tracing::warn!(tool = %name, error = %e, "Tool call failed");
            json!({
                "content": [{
                    "type": "text",
                    "text": format!("Error: {}", e)
                }],
                "isError": true
            })
        }
    }
}

/// Handle an incoming MCP request
pub fn handle_request(tools: &mut HedgebookTools, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let result = match request.method.as_str() {
        "initialize" => Some(handle_initialize(tools, &request.params)),
        "initialized" | "notifications/initialized" => None,
        "tools/list" => Some(handle_list_tools(tools)),
        "tools/call" => Some(handle_call_tool(tools, &request.params)),
        "notifications/cancelled" => None,
        // Notifications carry no id and never get a reply
        _ if request.id.is_null() => {
            tracing::debug!(method = %request.method, "Ignoring unknown notification");
            None
        }
        _ => {
            return Some(JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32601,
                    message: format!("Method not found: {}", request.method),
                }),
            });
        }
    };

    result.map(|r| JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id: request.id,
        result: Some(r),
        error: None,
    })
}
