//! Live pair lookups against indexed UniswapV2 subgraphs.
use std::collections::HashSet;

use cookbook_common::{
    amm::{rate, PairData, PairToken},
    math::pow10,
    models::{format_address, parse_address},
    Address,
};
use futures03::future::try_join_all;
use num_bigint::BigUint;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{config::RetryConfiguration, pairs::PairDiscoveryError};

const PAIRS_QUERY: &str = r#"
query Pairs($tokens: [String!]!) {
  byTokens: pairs(first: 1000, where: { token0_in: $tokens, token1_in: $tokens }) {
    ...PairFields
  }
  byAddress: pairs(first: 1000, where: { id_in: $tokens }) {
    ...PairFields
  }
}

fragment PairFields on Pair {
  id
  token0 { id symbol decimals }
  token1 { id symbol decimals }
  reserve0
  reserve1
}
"#;

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<PairsData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairsData {
    by_tokens: Vec<SubgraphPair>,
    by_address: Vec<SubgraphPair>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubgraphToken {
    id: String,
    symbol: String,
    decimals: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SubgraphPair {
    id: String,
    token0: SubgraphToken,
    token1: SubgraphToken,
    reserve0: String,
    reserve1: String,
}

/// Converts a decimal string such as `"1234.5"` into raw token units. Digits beyond `decimals`
/// are truncated.
pub fn parse_decimal_amount(value: &str, decimals: u8) -> Result<BigUint, PairDiscoveryError> {
    let invalid = || PairDiscoveryError::Parse(format!("invalid decimal amount {value:?}"));
    let (whole, fraction) = value
        .split_once('.')
        .unwrap_or((value, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(invalid());
    }
    let digits = |s: &str| -> Result<BigUint, PairDiscoveryError> {
        if s.is_empty() {
            return Ok(BigUint::default());
        }
        BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(invalid)
    };

    let decimals = usize::from(decimals);
    let mut fraction = fraction[..fraction.len().min(decimals)].to_string();
    fraction.extend(std::iter::repeat('0').take(decimals - fraction.len()));
    Ok(digits(whole)? * pow10(decimals as u32) + digits(&fraction)?)
}

impl SubgraphToken {
    fn to_pair_token(&self) -> Result<PairToken, PairDiscoveryError> {
        let decimals = self
            .decimals
            .parse::<u8>()
            .map_err(|e| PairDiscoveryError::Parse(format!("token {} decimals: {e}", self.id)))?;
        Ok(PairToken {
            address: parse_address(&self.id)
                .map_err(|e| PairDiscoveryError::Parse(e.to_string()))?,
            decimals,
            symbol: self.symbol.clone(),
        })
    }
}

impl SubgraphPair {
    /// `None` when the pool has no reserves to price it with.
    fn to_pair_data(&self) -> Result<Option<PairData>, PairDiscoveryError> {
        let token_a = self.token0.to_pair_token()?;
        let token_b = self.token1.to_pair_token()?;
        let reserve_a = parse_decimal_amount(&self.reserve0, token_a.decimals)?;
        let reserve_b = parse_decimal_amount(&self.reserve1, token_b.decimals)?;
        let Some(rate) = rate(&reserve_a, token_a.decimals, &reserve_b, token_b.decimals) else {
            debug!(pair = self.id, "Skipping pair without reserves");
            return Ok(None);
        };
        Ok(Some(PairData {
            pair_address: parse_address(&self.id)
                .map_err(|e| PairDiscoveryError::Parse(e.to_string()))?,
            token_a,
            token_b,
            rate,
        }))
    }
}

/// Queries every configured subgraph of one dialect on one network.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    http: Client,
    urls: Vec<Url>,
    retry: RetryConfiguration,
}

impl SubgraphClient {
    pub fn new(
        http: Client,
        urls: &[String],
        retry: RetryConfiguration,
    ) -> Result<Self, PairDiscoveryError> {
        let urls = urls
            .iter()
            .map(|u| {
                u.parse::<Url>()
                    .map_err(|e| PairDiscoveryError::InvalidUrl(u.clone(), e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { http, urls, retry })
    }

    /// Pairs matching `tokens` across all sources, de-duplicated by pair address.
    #[instrument(skip_all, fields(sources = self.urls.len(), tokens = tokens.len()))]
    pub async fn lookup(&self, tokens: &[Address]) -> Result<Vec<PairData>, PairDiscoveryError> {
        let tokens: Vec<String> = tokens
            .iter()
            .map(format_address)
            .collect();
        let per_source = try_join_all(
            self.urls
                .iter()
                .map(|url| self.query_source(url, &tokens)),
        )
        .await?;

        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for pair in per_source.into_iter().flatten() {
            if let Some(pair) = pair.to_pair_data()? {
                if seen.insert(pair.pair_address) {
                    pairs.push(pair);
                }
            }
        }
        debug!(found = pairs.len(), "Subgraph lookup");
        Ok(pairs)
    }

    async fn query_source(
        &self,
        url: &Url,
        tokens: &[String],
    ) -> Result<Vec<SubgraphPair>, PairDiscoveryError> {
        let body = json!({ "query": PAIRS_QUERY, "variables": { "tokens": tokens } });
        let response: GraphResponse = self.post_with_retry(url, &body).await?;
        if let Some(error) = response.errors.first() {
            return Err(PairDiscoveryError::Query {
                url: url.to_string(),
                msg: error.message.clone(),
            });
        }
        let data = response
            .data
            .ok_or_else(|| PairDiscoveryError::Parse(format!("{url} returned no data")))?;
        Ok(data
            .by_tokens
            .into_iter()
            .chain(data.by_address)
            .collect())
    }

    /// Posts `body`, retrying transport failures and 5xx responses with a constant cooldown.
    async fn post_with_retry(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> Result<GraphResponse, PairDiscoveryError> {
        let RetryConfiguration::Constant(retry) = &self.retry;
        let max_attempts = retry.max_attempts().max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self
                .http
                .post(url.clone())
                .json(body)
                .send()
                .await
            {
                Ok(response) if response.status().is_server_error() => {
                    last_error = format!("server responded with {}", response.status());
                }
                Ok(response) if response.status() != StatusCode::OK => {
                    return Err(PairDiscoveryError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                Ok(response) => {
                    return response
                        .json::<GraphResponse>()
                        .await
                        .map_err(|e| PairDiscoveryError::Parse(format!("{url}: {e}")));
                }
                Err(e) => last_error = e.to_string(),
            }
            if attempt < max_attempts {
                warn!(%url, attempt, error = last_error, "Subgraph request failed, retrying");
                sleep(retry.cooldown()).await;
            }
        }

        Err(PairDiscoveryError::Transport {
            url: url.to_string(),
            attempts: max_attempts,
            msg: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::whole("1234", 6, 1_234_000_000u64)]
    #[case::fraction("1234.5", 6, 1_234_500_000u64)]
    #[case::truncated("0.1234567", 6, 123_456u64)]
    #[case::leading_dot(".5", 2, 50u64)]
    #[case::no_decimals("42.9", 0, 42u64)]
    fn test_parse_decimal_amount(#[case] value: &str, #[case] decimals: u8, #[case] expected: u64) {
        assert_eq!(parse_decimal_amount(value, decimals).unwrap(), BigUint::from(expected));
    }

    #[rstest]
    #[case::empty("")]
    #[case::dot(".")]
    #[case::sign("-1")]
    #[case::exponent("1e5")]
    fn test_parse_decimal_amount_rejects(#[case] value: &str) {
        assert!(parse_decimal_amount(value, 18).is_err());
    }

    const RESPONSE: &str = r#"{
      "data": {
        "byTokens": [
          {
            "id": "0x6e7a5fafcec6bb1e78bae2a1f0b612012bf14827",
            "token0": { "id": "0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270", "symbol": "WMATIC", "decimals": "18" },
            "token1": { "id": "0x2791bca1f2de4661ed88a30c99a7a9449aa84174", "symbol": "USDC", "decimals": "6" },
            "reserve0": "1000000.0",
            "reserve1": "500000.123456"
          }
        ],
        "byAddress": [
          {
            "id": "0x6e7a5fafcec6bb1e78bae2a1f0b612012bf14827",
            "token0": { "id": "0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270", "symbol": "WMATIC", "decimals": "18" },
            "token1": { "id": "0x2791bca1f2de4661ed88a30c99a7a9449aa84174", "symbol": "USDC", "decimals": "6" },
            "reserve0": "1000000.0",
            "reserve1": "500000.123456"
          }
        ]
      }
    }"#;

    fn client(url: String, max_attempts: u64) -> SubgraphClient {
        SubgraphClient::new(
            Client::new(),
            &[url],
            RetryConfiguration::constant(max_attempts, Duration::from_millis(1)),
        )
        .unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_lookup_dedupes_pairs() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "variables": { "tokens": ["0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"] }
            })))
            .with_status(200)
            .with_body(RESPONSE)
            .create_async()
            .await;
        let wmatic = parse_address("0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270").unwrap();

        let pairs = client(server.url(), 1)
            .lookup(&[wmatic])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].token_a.symbol, "WMATIC");
        assert_eq!(pairs[0].token_b.decimals, 6);
        // 1e6 WMATIC against 500000.123456 USDC, in WMATIC per USDC
        assert_eq!(pairs[0].rate, BigUint::from(1_999_999_506_176_121_931u64));
    }

    #[test_log::test(tokio::test)]
    async fn test_retries_server_errors() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let res = client(server.url(), 3)
            .lookup(&[Address::repeat_byte(1)])
            .await;

        mock.assert_async().await;
        match res {
            Err(PairDiscoveryError::Transport { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let res = client(server.url(), 3)
            .lookup(&[Address::repeat_byte(1)])
            .await;

        mock.assert_async().await;
        assert!(matches!(res, Err(PairDiscoveryError::Status { status: 400, .. })));
    }

    #[test_log::test(tokio::test)]
    async fn test_graphql_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"errors": [{"message": "indexing error"}]}"#)
            .create_async()
            .await;

        let res = client(server.url(), 1)
            .lookup(&[Address::repeat_byte(1)])
            .await;

        assert!(matches!(res, Err(PairDiscoveryError::Query { msg, .. }) if msg == "indexing error"));
    }
}
