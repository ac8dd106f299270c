use alloy::{
    primitives::{Address, Bytes},
    rpc::{
        client::{ClientBuilder, ReqwestClient},
        types::{BlockNumberOrTag, TransactionInput, TransactionRequest},
    },
};
use async_trait::async_trait;
use cookbook_common::{
    abi::{
        decode_address, decode_get_reserves, decode_uint256, encode_fee_to, encode_get_reserves,
        encode_k_last, encode_total_supply,
    },
    traits::{PairReadError, PairStateReader},
};
use num_bigint::BigUint;
use tracing::{instrument, trace};

/// Reads pair and factory state with plain `eth_call`s against the latest block.
#[derive(Clone)]
pub struct RpcPairStateReader {
    inner: ReqwestClient,
}

impl RpcPairStateReader {
    pub fn new(rpc_url: &str) -> Result<Self, PairReadError> {
        let url = rpc_url
            .parse()
            .map_err(|e| PairReadError::Rpc(format!("Invalid RPC URL: {e}")))?;

        Ok(Self { inner: ClientBuilder::default().http(url) })
    }

    #[instrument(level = "debug", skip(self, calldata))]
    async fn eth_call(&self, to: Address, calldata: Vec<u8>) -> Result<Bytes, PairReadError> {
        if to.is_zero() {
            return Err(PairReadError::InvalidAddress(to.to_string()));
        }
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::both(calldata.into()));

        let res: Bytes = self
            .inner
            .request("eth_call", (&request, BlockNumberOrTag::Latest))
            .await
            .map_err(|e| PairReadError::Rpc(format!("eth_call to {to} failed: {e}")))?;
        trace!(len = res.len(), "eth_call returned");
        Ok(res)
    }
}

#[async_trait]
impl PairStateReader for RpcPairStateReader {
    async fn get_reserves(&self, pair: Address) -> Result<(BigUint, BigUint), PairReadError> {
        let data = self
            .eth_call(pair, encode_get_reserves())
            .await?;
        decode_get_reserves(&data).map_err(|e| PairReadError::Decode(e.to_string()))
    }

    async fn total_supply(&self, pair: Address) -> Result<BigUint, PairReadError> {
        let data = self
            .eth_call(pair, encode_total_supply())
            .await?;
        decode_uint256("totalSupply", &data).map_err(|e| PairReadError::Decode(e.to_string()))
    }

    async fn k_last(&self, pair: Address) -> Result<BigUint, PairReadError> {
        let data = self
            .eth_call(pair, encode_k_last())
            .await?;
        decode_uint256("kLast", &data).map_err(|e| PairReadError::Decode(e.to_string()))
    }

    async fn fee_to(&self, factory: Address) -> Result<Address, PairReadError> {
        let data = self
            .eth_call(factory, encode_fee_to())
            .await?;
        decode_address("feeTo", &data).map_err(|e| PairReadError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;

    use super::*;

    fn word(value: u64) -> String {
        format!("{value:064x}")
    }

    #[tokio::test]
    async fn test_zero_address_is_rejected_before_any_call() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .expect(0)
            .create_async()
            .await;
        let reader = RpcPairStateReader::new(&server.url()).unwrap();

        let res = reader.total_supply(Address::ZERO).await;

        mock.assert_async().await;
        assert!(matches!(res, Err(PairReadError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_get_reserves() {
        let mut server = Server::new_async().await;
        let body = format!(
            r#"{{"jsonrpc":"2.0","id":0,"result":"0x{}{}{}"}}"#,
            word(1000),
            word(2000),
            word(1_700_000_000)
        );
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(serde_json::json!({"method": "eth_call"})))
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await;
        let reader = RpcPairStateReader::new(&server.url()).unwrap();

        let reserves = reader
            .get_reserves(Address::repeat_byte(0x11))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reserves, (BigUint::from(1000u32), BigUint::from(2000u32)));
    }

    #[tokio::test]
    async fn test_fee_to_disabled() {
        let mut server = Server::new_async().await;
        let body = format!(r#"{{"jsonrpc":"2.0","id":0,"result":"0x{}"}}"#, word(0));
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let reader = RpcPairStateReader::new(&server.url()).unwrap();

        let fee_to = reader
            .fee_to(Address::repeat_byte(0x22))
            .await
            .unwrap();

        assert_eq!(fee_to, Address::ZERO);
    }

    #[tokio::test]
    async fn test_short_response_is_a_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":0,"result":"0x1234"}"#)
            .create_async()
            .await;
        let reader = RpcPairStateReader::new(&server.url()).unwrap();

        let res = reader
            .k_last(Address::repeat_byte(0x11))
            .await;

        assert!(matches!(res, Err(PairReadError::Decode(_))));
    }
}
