//! Chainlink aggregator client (primary source)
//!
//! Reads `decimals`, `latestRoundData` and `getRoundData` from an
//! AggregatorV3 contract over JSON-RPC.

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;

use super::{bounded, clamp_timestamp, PrimarySource, RoundData, SourceFailure};

abigen!(
    AggregatorV3,
    r#"[
        function decimals() external view returns (uint8)
        function latestRoundData() external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)
        function getRoundData(uint80 _roundId) external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)
    ]"#
);

#[derive(Debug, Clone)]
pub struct ChainlinkAggregatorClient {
    contract: AggregatorV3<Provider<Http>>,
    call_timeout: Duration,
}

impl ChainlinkAggregatorClient {
    pub fn new(provider: Arc<Provider<Http>>, address: Address, call_timeout: Duration) -> Self {
        Self {
            contract: AggregatorV3::new(address, provider),
            call_timeout,
        }
    }

    async fn decimals(&self) -> Result<u8, SourceFailure> {
        bounded(self.call_timeout, async {
            self.contract
                .decimals()
                .call()
                .await
                .map_err(|e| SourceFailure::Call(format!("decimals: {}", e)))
        })
        .await
    }
}

#[async_trait]
impl PrimarySource for ChainlinkAggregatorClient {
    fn name(&self) -> &'static str {
        "Chainlink"
    }

    async fn current_reading(&self) -> Result<RoundData, SourceFailure> {
        let precision = self.decimals().await?;
        let (round_id, answer, _started_at, updated_at, _answered_in_round) =
            bounded(self.call_timeout, async {
                self.contract
                    .latest_round_data()
                    .call()
                    .await
                    .map_err(|e| SourceFailure::Call(format!("latestRoundData: {}", e)))
            })
            .await?;

        tracing::debug!(
            source = %"Chainlink",
            round_id,
            answer = %answer,
            updated_at = %updated_at,
            "Fetched latest round"
        );

        Ok(RoundData {
            precision,
            round_id,
            answer,
            updated_at: clamp_timestamp(updated_at),
        })
    }

    async fn reading_at(&self, round_id: u128) -> Result<RoundData, SourceFailure> {
        let precision = self.decimals().await?;
        let (id, answer, _started_at, updated_at, _answered_in_round) =
            bounded(self.call_timeout, async {
                self.contract
                    .get_round_data(round_id)
                    .call()
                    .await
                    .map_err(|e| SourceFailure::Call(format!("getRoundData({}): {}", round_id, e)))
            })
            .await?;

        Ok(RoundData {
            precision,
            round_id: id,
            answer,
            updated_at: clamp_timestamp(updated_at),
        })
    }
}
