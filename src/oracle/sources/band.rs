//! Band standard-reference client (secondary source)
//!
//! `getReferenceData(base, quote)` returns a rate with 18 fractional
//! digits and one update time per leg of the pair.

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;

use super::{bounded, clamp_timestamp, ReferenceData, SecondarySource, SourceFailure};

abigen!(
    StdReference,
    r#"[
        function getReferenceData(string _base, string _quote) external view returns (uint256 rate, uint256 lastUpdatedBase, uint256 lastUpdatedQuote)
    ]"#
);

#[derive(Debug, Clone)]
pub struct BandReferenceClient {
    contract: StdReference<Provider<Http>>,
    call_timeout: Duration,
}

impl BandReferenceClient {
    pub fn new(provider: Arc<Provider<Http>>, address: Address, call_timeout: Duration) -> Self {
        Self {
            contract: StdReference::new(address, provider),
            call_timeout,
        }
    }
}

#[async_trait]
impl SecondarySource for BandReferenceClient {
    fn name(&self) -> &'static str {
        "Band"
    }

    async fn reference_data(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<ReferenceData, SourceFailure> {
        let (rate, updated_base, updated_quote) = bounded(self.call_timeout, async {
            self.contract
                .get_reference_data(base.to_string(), quote.to_string())
                .call()
                .await
                .map_err(|e| SourceFailure::Call(format!("getReferenceData: {}", e)))
        })
        .await?;

        // The pair is only as fresh as its stalest leg
        let last_updated_at = clamp_timestamp(updated_base.min(updated_quote));

        tracing::debug!(
            source = %"Band",
            base = %base,
            quote = %quote,
            rate = %rate,
            last_updated_at,
            "Fetched reference data"
        );

        Ok(ReferenceData {
            rate,
            last_updated_at,
        })
    }
}
