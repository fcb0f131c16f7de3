//! Crypto market-data tools backed by a CoinGecko-compatible API.
//!
//! - `get_current_price(coin)` → `{"price": "$96,065.33"}`
//! - `get_historical_data(coin, date)` → `{"date", "price", "market_cap", "volume"}`

use crate::config::AgentConfig;
use crate::tools::{ParamType, Tool, ToolArgs, ToolSchema};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Date layouts accepted for `get_historical_data`.
const DATE_FORMATS: &[&str] = &[
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Build the market tools sharing one HTTP client.
pub fn market_tools(config: &AgentConfig) -> Result<Vec<Arc<dyn Tool>>> {
    let client = MarketClient::new(&config.market_api_url, config.request_timeout_secs)?;
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(CurrentPriceTool::new(client.clone())?),
        Arc::new(HistoricalDataTool::new(client)?),
    ];
    Ok(tools)
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MarketClient {
    base_url: String,
    http: reqwest::Client,
}

impl MarketClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("tagloop/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build market HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Market request: {} {:?}", url, query);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Market request to {path} failed"))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            bail!("no such coin or date: {}", path);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("market API error ({}): {}", status, body);
        }

        resp.json().await.context("Failed to parse market response")
    }
}

// ---------------------------------------------------------------------------
// get_current_price
// ---------------------------------------------------------------------------

pub struct CurrentPriceTool {
    schema: ToolSchema,
    client: MarketClient,
}

impl CurrentPriceTool {
    pub fn new(client: MarketClient) -> Result<Self> {
        let schema = ToolSchema::builder("get_current_price")
            .description(
                "Gets the current USD price of a cryptocurrency. \
                 `coin` is the coin id, e.g. \"bitcoin\" or \"solana\". \
                 Returns {\"price\": \"$96,065.33\"}.",
            )
            .param("coin", ParamType::String)
            .build()?;
        Ok(Self { schema, client })
    }
}

#[async_trait]
impl Tool for CurrentPriceTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value> {
        let coin = coin_id(args.str("coin")?)?;
        let body = self
            .client
            .get_json("/simple/price", &[("ids", coin.as_str()), ("vs_currencies", "usd")])
            .await?;
        let price = extract_current_price(&body, &coin)?;
        Ok(json!({ "price": format_usd(price) }))
    }
}

fn extract_current_price(body: &Value, coin: &str) -> Result<f64> {
    body.get(coin)
        .and_then(|entry| entry.get("usd"))
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("unknown coin '{}'", coin))
}

// ---------------------------------------------------------------------------
// get_historical_data
// ---------------------------------------------------------------------------

pub struct HistoricalDataTool {
    schema: ToolSchema,
    client: MarketClient,
}

impl HistoricalDataTool {
    pub fn new(client: MarketClient) -> Result<Self> {
        let schema = ToolSchema::builder("get_historical_data")
            .description(
                "Gets the daily USD price, market cap and volume of a cryptocurrency on a past date. \
                 `coin` is the coin id, e.g. \"ethereum\". \
                 `date` is e.g. \"Jan 12, 2024\" or \"2024-01-12\".",
            )
            .param("coin", ParamType::String)
            .param("date", ParamType::String)
            .build()?;
        Ok(Self { schema, client })
    }
}

#[async_trait]
impl Tool for HistoricalDataTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value> {
        let coin = coin_id(args.str("coin")?)?;
        let date = parse_date(args.str("date")?)?;
        let query_date = date.format("%d-%m-%Y").to_string();

        let body = self
            .client
            .get_json(
                &format!("/coins/{coin}/history"),
                &[("date", query_date.as_str()), ("localization", "false")],
            )
            .await?;

        extract_history(&body, date)
    }
}

fn extract_history(body: &Value, date: NaiveDate) -> Result<Value> {
    let market = body
        .get("market_data")
        .ok_or_else(|| anyhow!("no market data for {}", date.format("%b %d, %Y")))?;
    let usd = |field: &str| {
        market
            .get(field)
            .and_then(|v| v.get("usd"))
            .and_then(Value::as_f64)
    };

    let price = usd("current_price")
        .ok_or_else(|| anyhow!("no price for {}", date.format("%b %d, %Y")))?;

    Ok(json!({
        "date": date.format("%b %d, %Y").to_string(),
        "price": format_usd(price),
        "market_cap": usd("market_cap").map(format_usd),
        "volume": usd("total_volume").map(format_usd),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Normalise a coin name to an API id: `"Bitcoin Cash"` → `"bitcoin-cash"`.
fn coin_id(raw: &str) -> Result<String> {
    let id = raw
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        bail!("invalid coin id '{}'", raw);
    }
    Ok(id)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| anyhow!("unrecognised date '{}', use e.g. \"Jan 12, 2024\"", raw))?;
    if date > Utc::now().date_naive() {
        bail!("date {} is in the future", date);
    }
    Ok(date)
}

/// `$96,065.33`; amounts under one dollar keep up to six decimals.
fn format_usd(amount: f64) -> String {
    if amount.abs() < 1.0 {
        let s = format!("{:.6}", amount);
        let s = s.trim_end_matches('0').trim_end_matches('.');
        return format!("${s}");
    }

    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}")
}
