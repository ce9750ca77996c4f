use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::sign::{kraken_signature, urlencode};
use crate::config::ExchangeConfig;
use crate::error::BotError;
use crate::models::{
    Candle, CandleSeries, ClosedOrder, OrderBookDepth, OrderReceipt, OrderRequest, OrderSide,
    OrderType,
};
use crate::Result;

/// Signed REST client for the Kraken spot API.
///
/// One instance is shared process-wide behind an `Arc`: the connection
/// pool and key material are read-only after construction, the nonce is
/// atomic, and signing is stateless per request, so concurrent loops can
/// call it freely.
pub struct KrakenClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    nonce: AtomicU64,
    private_limiter: DefaultDirectRateLimiter,
}

#[derive(Debug, Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<Value>,
}

impl KrakenClient {
    pub fn new(config: &ExchangeConfig, api_key: String, api_secret: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let rate = NonZeroU32::new(config.private_calls_per_second.max(1))
            .expect("rate clamped to at least 1");

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            api_secret,
            nonce: AtomicU64::new(Utc::now().timestamp_millis() as u64),
            private_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    /// Fetch the OHLC candle history for a pair, ascending by time.
    pub async fn get_ohlc(&self, pair: &str, interval_minutes: u32) -> Result<CandleSeries> {
        let result = self
            .public_get(
                "/0/public/OHLC",
                &[
                    ("pair", pair.to_string()),
                    ("interval", interval_minutes.to_string()),
                ],
            )
            .await?;

        let rows = pair_entry(&result, pair)?
            .as_array()
            .ok_or_else(|| BotError::Data(format!("OHLC rows for {pair} are not an array")))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            candles.push(parse_candle(row)?);
        }
        candles.sort_by_key(|c| c.time);

        CandleSeries::new(pair, interval_minutes, candles)
    }

    /// Fetch all asset balances. Assets with zero balance may be absent.
    pub async fn get_balances(&self) -> Result<HashMap<String, f64>> {
        let result = self.private_post("/0/private/Balance", Vec::new()).await?;
        let entries = result
            .as_object()
            .ok_or_else(|| BotError::Data("balance result is not an object".into()))?;

        let mut balances = HashMap::with_capacity(entries.len());
        for (asset, value) in entries {
            balances.insert(asset.clone(), parse_f64(value, asset)?);
        }
        Ok(balances)
    }

    /// Fetch closed orders, newest first by close time.
    pub async fn get_closed_orders(&self) -> Result<Vec<ClosedOrder>> {
        let result = self
            .private_post(
                "/0/private/ClosedOrders",
                vec![("trades", "true".to_string())],
            )
            .await?;

        let closed = result
            .get("closed")
            .and_then(Value::as_object)
            .ok_or_else(|| BotError::Data("closed orders result missing 'closed'".into()))?;

        let mut orders = Vec::with_capacity(closed.len());
        for (txid, entry) in closed {
            orders.push(parse_closed_order(txid, entry)?);
        }
        orders.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        Ok(orders)
    }

    /// Fetch order book depth for a pair, best price first on both sides.
    pub async fn get_order_book_depth(&self, pair: &str) -> Result<OrderBookDepth> {
        let result = self
            .public_get("/0/public/Depth", &[("pair", pair.to_string())])
            .await?;
        let book = pair_entry(&result, pair)?;

        let mut depth = OrderBookDepth::default();
        for level in side_levels(book, "bids")? {
            depth.bid_prices.push(parse_f64(&level[0], "bid price")?);
            depth.bid_quantities.push(parse_f64(&level[1], "bid quantity")?);
        }
        for level in side_levels(book, "asks")? {
            depth.ask_prices.push(parse_f64(&level[0], "ask price")?);
            depth.ask_quantities.push(parse_f64(&level[1], "ask quantity")?);
        }
        Ok(depth)
    }

    /// Submit an order. The coordinator never re-issues the same logical
    /// order within one cycle; retry happens only through re-evaluation on
    /// the next poll.
    pub async fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt> {
        let mut params = vec![
            ("ordertype", request.order_type.as_str().to_string()),
            ("type", request.side.as_str().to_string()),
            ("volume", request.volume.to_string()),
            ("pair", request.pair.clone()),
        ];
        match (request.order_type, request.limit_price) {
            (OrderType::Limit, Some(price)) => params.push(("price", price.to_string())),
            (OrderType::Limit, None) => {
                return Err(BotError::Config("limit order requires a price".into()))
            }
            (OrderType::Market, _) => {}
        }

        let result = self.private_post("/0/private/AddOrder", params).await?;

        let txids = result
            .get("txid")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let description = result
            .get("descr")
            .and_then(|d| d.get("order"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(OrderReceipt { txids, description })
    }

    /// Strictly increasing nonce, millisecond-seeded, safe under
    /// concurrent calls (required by the exchange per API key).
    fn next_nonce(&self) -> u64 {
        let now = Utc::now().timestamp_millis() as u64;
        let prev = self
            .nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .expect("nonce update never fails");
        now.max(prev + 1)
    }

    async fn public_get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.get(&url).query(query);
        self.execute(request).await
    }

    async fn private_post(&self, path: &str, params: Vec<(&str, String)>) -> Result<Value> {
        self.private_limiter.until_ready().await;

        let nonce = self.next_nonce();
        let mut form = vec![("nonce", nonce.to_string())];
        form.extend(params);
        let body = urlencode(&form);
        let signature = kraken_signature(path, nonce, &body, &self.api_secret)?;

        let url = format!("{}{}", self.base_url, path);
        let request = self
            .client
            .post(&url)
            .header("API-Key", &self.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body);
        self.execute(request).await
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(BotError::Transport(format!("HTTP {status}: {text}")));
        }

        let envelope: KrakenResponse = serde_json::from_str(&text)
            .map_err(|e| BotError::Data(format!("malformed exchange response: {e}")))?;
        if !envelope.error.is_empty() {
            return Err(classify_exchange_errors(envelope.error));
        }
        envelope
            .result
            .ok_or_else(|| BotError::Data("exchange response missing result".into()))
    }
}

/// Map Kraken's error codes onto the engine taxonomy.
fn classify_exchange_errors(errors: Vec<String>) -> BotError {
    let joined = errors.join(", ");
    if errors.iter().any(|e| e.starts_with("EAPI:") || e.starts_with("EAuth:")) {
        BotError::Auth(joined)
    } else if errors
        .iter()
        .any(|e| e.starts_with("EOrder:") || e.starts_with("EFunding:"))
    {
        BotError::OrderRejected(joined)
    } else if errors.iter().any(|e| e.starts_with("EService:")) {
        BotError::Transport(joined)
    } else {
        BotError::Data(joined)
    }
}

/// Kraken keys results by its canonical pair name, which may differ from
/// the requested one (XBTUSD -> XXBTZUSD). Prefer an exact match, fall
/// back to the single non-"last" entry.
fn pair_entry<'a>(result: &'a Value, pair: &str) -> Result<&'a Value> {
    let object = result
        .as_object()
        .ok_or_else(|| BotError::Data("result is not an object".into()))?;
    object
        .get(pair)
        .or_else(|| {
            object
                .iter()
                .find(|(key, _)| key.as_str() != "last")
                .map(|(_, value)| value)
        })
        .ok_or_else(|| BotError::Data(format!("no result entry for {pair}")))
}

fn side_levels<'a>(book: &'a Value, side: &str) -> Result<Vec<&'a Vec<Value>>> {
    book.get(side)
        .and_then(Value::as_array)
        .ok_or_else(|| BotError::Data(format!("depth missing '{side}'")))?
        .iter()
        .map(|level| match level.as_array() {
            Some(fields) if fields.len() >= 2 => Ok(fields),
            _ => Err(BotError::Data(format!("malformed {side} level"))),
        })
        .collect()
}

/// Kraken OHLC rows: [time, open, high, low, close, vwap, volume, count],
/// with prices serialized as strings.
fn parse_candle(row: &Value) -> Result<Candle> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 8)
        .ok_or_else(|| BotError::Data("OHLC row is not an 8-field array".into()))?;

    let secs = fields[0]
        .as_i64()
        .ok_or_else(|| BotError::Data("OHLC row has non-integer time".into()))?;
    let time = Utc
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| BotError::Data(format!("OHLC row has invalid time {secs}")))?;

    Ok(Candle {
        time,
        open: parse_f64(&fields[1], "open")?,
        high: parse_f64(&fields[2], "high")?,
        low: parse_f64(&fields[3], "low")?,
        close: parse_f64(&fields[4], "close")?,
        vwap: parse_f64(&fields[5], "vwap")?,
        volume: parse_f64(&fields[6], "volume")?,
        trade_count: fields[7].as_u64().unwrap_or(0),
    })
}

fn parse_closed_order(txid: &str, entry: &Value) -> Result<ClosedOrder> {
    let descr = entry
        .get("descr")
        .ok_or_else(|| BotError::Data(format!("closed order {txid} missing descr")))?;
    let side = match descr.get("type").and_then(Value::as_str) {
        Some("buy") => OrderSide::Buy,
        Some("sell") => OrderSide::Sell,
        other => {
            return Err(BotError::Data(format!(
                "closed order {txid} has unknown side {other:?}"
            )))
        }
    };
    let closetm = entry
        .get("closetm")
        .and_then(Value::as_f64)
        .ok_or_else(|| BotError::Data(format!("closed order {txid} missing closetm")))?;
    let closed_at = millis_to_datetime((closetm * 1000.0) as i64)?;

    Ok(ClosedOrder {
        txid: txid.to_string(),
        pair: descr
            .get("pair")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        side,
        cost: entry.get("cost").map(|v| parse_f64(v, "cost")).transpose()?.unwrap_or(0.0),
        volume: entry.get("vol").map(|v| parse_f64(v, "vol")).transpose()?.unwrap_or(0.0),
        price: entry.get("price").map(|v| parse_f64(v, "price")).transpose()?.unwrap_or(0.0),
        closed_at,
        status: entry
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| BotError::Data(format!("invalid close timestamp {millis}")))
}

/// Kraken serializes most numbers as strings; accept both.
fn parse_f64(value: &Value, field: &str) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| BotError::Data(format!("bad {field}: {s:?}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| BotError::Data(format!("bad {field}: {n}"))),
        other => Err(BotError::Data(format!("bad {field}: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Any valid base64 works as a test secret.
    const TEST_SECRET: &str =
        "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";

    fn test_client(base_url: String) -> KrakenClient {
        let config = ExchangeConfig {
            base_url,
            timeout_secs: 5,
            private_calls_per_second: 50,
        };
        KrakenClient::new(&config, "test-key".to_string(), TEST_SECRET.to_string()).unwrap()
    }

    fn ohlc_body() -> serde_json::Value {
        json!({
            "error": [],
            "result": {
                "SOLUSD": [
                    [1_700_000_000, "100.0", "101.0", "99.5", "100.5", "100.2", "12.5", 42],
                    [1_700_000_060, "100.5", "102.0", "100.1", "101.7", "101.0", "8.2", 17]
                ],
                "last": 1_700_000_060
            }
        })
    }

    #[tokio::test]
    async fn test_get_ohlc_parses_candles() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/OHLC")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("pair".into(), "SOLUSD".into()),
                mockito::Matcher::UrlEncoded("interval".into(), "1".into()),
            ]))
            .with_body(ohlc_body().to_string())
            .create_async()
            .await;

        let client = test_client(server.url());
        let series = client.get_ohlc("SOLUSD", 1).await.unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.candles()[0].close, 100.5);
        assert_eq!(series.candles()[1].trade_count, 17);
        assert!(series.candles()[0].time < series.candles()[1].time);
    }

    #[tokio::test]
    async fn test_get_balances_parses_and_signs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/0/private/Balance")
            .match_header("API-Key", "test-key")
            .match_header("API-Sign", mockito::Matcher::Regex(".+".into()))
            .with_body(json!({"error": [], "result": {"ZUSD": "5000.1", "SOL": "1.25"}}).to_string())
            .create_async()
            .await;

        let client = test_client(server.url());
        let balances = client.get_balances().await.unwrap();

        assert_eq!(balances.get("SOL"), Some(&1.25));
        assert_eq!(balances.get("ZUSD"), Some(&5000.1));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_closed_orders_newest_first() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/ClosedOrders")
            .with_body(
                json!({
                    "error": [],
                    "result": {
                        "closed": {
                            "TX-OLD": {
                                "descr": {"pair": "SOLUSD", "type": "buy", "price": "90.0"},
                                "cost": "4.50", "vol": "0.05", "price": "90.0",
                                "closetm": 1_699_000_000.1, "status": "closed"
                            },
                            "TX-NEW": {
                                "descr": {"pair": "SOLUSD", "type": "sell", "price": "95.0"},
                                "cost": "4.75", "vol": "0.05", "price": "95.0",
                                "closetm": 1_699_900_000.9, "status": "closed"
                            }
                        },
                        "count": 2
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = test_client(server.url());
        let orders = client.get_closed_orders().await.unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].txid, "TX-NEW");
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[1].cost, 4.50);
    }

    #[tokio::test]
    async fn test_rejected_order_classified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/AddOrder")
            .with_body(json!({"error": ["EOrder:Insufficient funds"]}).to_string())
            .create_async()
            .await;

        let client = test_client(server.url());
        let request = OrderRequest {
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            volume: 0.05,
            pair: "SOLUSD".to_string(),
            limit_price: None,
        };
        let result = client.place_order(&request).await;
        assert!(matches!(result, Err(BotError::OrderRejected(_))));
    }

    #[tokio::test]
    async fn test_auth_error_classified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/Balance")
            .with_body(json!({"error": ["EAPI:Invalid signature"]}).to_string())
            .create_async()
            .await;

        let client = test_client(server.url());
        assert!(matches!(
            client.get_balances().await,
            Err(BotError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_http_failure_is_transport() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/OHLC")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = test_client(server.url());
        assert!(matches!(
            client.get_ohlc("SOLUSD", 1).await,
            Err(BotError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_place_order_returns_receipt() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/0/private/AddOrder")
            .with_body(
                json!({
                    "error": [],
                    "result": {
                        "txid": ["OU22CG-KLAF2-FWUDD7"],
                        "descr": {"order": "buy 0.05000000 SOLUSD @ market"}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = test_client(server.url());
        let request = OrderRequest {
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            volume: 0.05,
            pair: "SOLUSD".to_string(),
            limit_price: None,
        };
        let receipt = client.place_order(&request).await.unwrap();
        assert_eq!(receipt.txids, vec!["OU22CG-KLAF2-FWUDD7"]);
        assert!(receipt.description.contains("SOLUSD"));
    }

    #[tokio::test]
    async fn test_limit_order_without_price_refused() {
        let request = OrderRequest {
            side: OrderSide::Sell,
            order_type: OrderType::Limit,
            volume: 0.05,
            pair: "SOLUSD".to_string(),
            limit_price: None,
        };
        // Validation happens before any network call.
        let config = ExchangeConfig::default();
        let client =
            KrakenClient::new(&config, "k".to_string(), TEST_SECRET.to_string()).unwrap();
        let result = client.place_order(&request).await;
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_nonce_strictly_increasing() {
        let config = ExchangeConfig::default();
        let client =
            KrakenClient::new(&config, "k".to_string(), TEST_SECRET.to_string()).unwrap();
        let mut last = 0;
        for _ in 0..1000 {
            let nonce = client.next_nonce();
            assert!(nonce > last);
            last = nonce;
        }
    }
}
