//! HTTP client for the ledger query gateway.

use super::{Ledger, LedgerError, PayoutScope};
use crate::domain::{
    Address, Amount, BlockNumber, Game, GameId, PayoutRecord, PlayerRecord, Round, TxRef,
};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger backed by a JSON query gateway in front of the game contract.
#[derive(Debug, Clone)]
pub struct GatewayLedger {
    client: Client,
    base_url: String,
    contract: Address,
}

impl GatewayLedger {
    pub fn new(base_url: String, contract: Address) -> Self {
        Self {
            client: Client::new(),
            base_url,
            contract,
        }
    }

    async fn post_query<T: DeserializeOwned>(
        &self,
        payload: serde_json::Value,
    ) -> Result<T, LedgerError> {
        let url = format!("{}/query", self.base_url.trim_end_matches('/'));
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let value = retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(LedgerError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(LedgerError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(LedgerError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(classify_client_error(
                    status.as_u16(),
                    &body,
                )));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(LedgerError::ParseError(e.to_string())))
        })
        .await?;

        serde_json::from_value(value).map_err(|e| LedgerError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: Option<String>,
    max_block_range: Option<u64>,
}

fn classify_client_error(status: u16, body: &str) -> LedgerError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.error.clone())
        .unwrap_or_else(|| "Client error".to_string());
    let max_range = parsed.as_ref().and_then(|b| b.max_block_range);

    if max_range.is_some() || message.to_ascii_lowercase().contains("block range") {
        return LedgerError::BlockRangeExceeded { max_range };
    }
    if status == 404 {
        return LedgerError::NotFound(message);
    }
    LedgerError::HttpError { status, message }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameResponse {
    total_rounds: u32,
    current_round: u32,
    start_time: i64,
    finalized: bool,
    cancelled: bool,
    entry_fee: Amount,
    player_count: u32,
    prize_pool: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoundResponse {
    start_time: i64,
    end_time: i64,
    alive_count_at_start: u32,
    cutoff_rank: u32,
    finalized: bool,
}

#[derive(Debug, Deserialize)]
struct PlayersResponse {
    players: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerRecordResponse {
    square_index: u32,
    alive: bool,
    elimination_round: u32,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeTxResponse {
    tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockResponse {
    block_number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayoutResponse {
    place: u8,
    winner: String,
    amount: Amount,
    tx_hash: String,
    block_number: u64,
}

#[derive(Debug, Deserialize)]
struct PayoutsResponse {
    records: Vec<PayoutResponse>,
}

fn parse_address(raw: &str) -> Result<Address, LedgerError> {
    Address::from_str(raw).map_err(|e| LedgerError::ParseError(format!("Invalid address: {}", e)))
}

#[async_trait]
impl Ledger for GatewayLedger {
    async fn get_game(&self, game_id: GameId) -> Result<Game, LedgerError> {
        debug!("Fetching game={}", game_id);

        let payload = serde_json::json!({
            "type": "game",
            "contract": self.contract.as_str(),
            "gameId": game_id.as_u64(),
        });
        let game: GameResponse = self.post_query(payload).await?;

        Ok(Game {
            id: game_id,
            total_rounds: game.total_rounds,
            current_round: game.current_round,
            start_time: game.start_time,
            finalized: game.finalized,
            cancelled: game.cancelled,
            entry_fee: game.entry_fee,
            player_count: game.player_count,
            prize_pool: game.prize_pool,
        })
    }

    async fn get_round(&self, game_id: GameId, round: u32) -> Result<Round, LedgerError> {
        debug!("Fetching round game={}, round={}", game_id, round);

        let payload = serde_json::json!({
            "type": "round",
            "contract": self.contract.as_str(),
            "gameId": game_id.as_u64(),
            "round": round,
        });
        let r: RoundResponse = self.post_query(payload).await?;

        Ok(Round {
            number: round,
            start_time: r.start_time,
            end_time: r.end_time,
            alive_count_at_start: r.alive_count_at_start,
            cutoff_rank: r.cutoff_rank,
            finalized: r.finalized,
        })
    }

    async fn get_players(&self, game_id: GameId) -> Result<Vec<Address>, LedgerError> {
        debug!("Fetching players game={}", game_id);

        let payload = serde_json::json!({
            "type": "players",
            "contract": self.contract.as_str(),
            "gameId": game_id.as_u64(),
        });
        let response: PlayersResponse = self.post_query(payload).await?;

        let mut players = Vec::with_capacity(response.players.len());
        for raw in &response.players {
            match parse_address(raw) {
                Ok(addr) => players.push(addr),
                Err(e) => warn!("Skipping player entry: {}", e),
            }
        }
        Ok(players)
    }

    async fn get_player_record(
        &self,
        game_id: GameId,
        player: &Address,
    ) -> Result<PlayerRecord, LedgerError> {
        debug!("Fetching player record game={}, player={}", game_id, player);

        let payload = serde_json::json!({
            "type": "playerRecord",
            "contract": self.contract.as_str(),
            "gameId": game_id.as_u64(),
            "player": player.as_str(),
        });
        let record: PlayerRecordResponse = self.post_query(payload).await?;

        Ok(PlayerRecord {
            address: player.clone(),
            square_index: record.square_index,
            alive: record.alive,
            elimination_round: record.elimination_round,
        })
    }

    async fn get_round_start_balance(
        &self,
        game_id: GameId,
        round: u32,
        player: &Address,
    ) -> Result<Amount, LedgerError> {
        let payload = serde_json::json!({
            "type": "roundStartBalance",
            "contract": self.contract.as_str(),
            "gameId": game_id.as_u64(),
            "round": round,
            "player": player.as_str(),
        });
        let response: BalanceResponse = self.post_query(payload).await?;
        Ok(response.balance)
    }

    async fn get_round_end_balance(
        &self,
        game_id: GameId,
        round: u32,
        player: &Address,
    ) -> Result<Amount, LedgerError> {
        let payload = serde_json::json!({
            "type": "roundEndBalance",
            "contract": self.contract.as_str(),
            "gameId": game_id.as_u64(),
            "round": round,
            "player": player.as_str(),
        });
        let response: BalanceResponse = self.post_query(payload).await?;
        Ok(response.balance)
    }

    async fn get_current_balance(&self, player: &Address) -> Result<Amount, LedgerError> {
        let payload = serde_json::json!({
            "type": "currentBalance",
            "contract": self.contract.as_str(),
            "player": player.as_str(),
        });
        let response: BalanceResponse = self.post_query(payload).await?;
        Ok(response.balance)
    }

    async fn get_finalize_tx(&self, game_id: GameId) -> Result<Option<TxRef>, LedgerError> {
        debug!("Fetching finalize tx game={}", game_id);

        let payload = serde_json::json!({
            "type": "finalizeTx",
            "contract": self.contract.as_str(),
            "gameId": game_id.as_u64(),
        });
        let response: FinalizeTxResponse = self.post_query(payload).await?;
        Ok(response.tx_hash.filter(|h| !h.is_empty()).map(TxRef::new))
    }

    async fn latest_block(&self) -> Result<BlockNumber, LedgerError> {
        let payload = serde_json::json!({ "type": "latestBlock" });
        let response: LatestBlockResponse = self.post_query(payload).await?;
        Ok(BlockNumber(response.block_number))
    }

    async fn get_payout_records(
        &self,
        game_id: GameId,
        scope: &PayoutScope,
    ) -> Result<Vec<PayoutRecord>, LedgerError> {
        let payload = match scope {
            PayoutScope::Transaction(tx) => {
                debug!("Fetching payouts game={}, tx={}", game_id, tx);
                serde_json::json!({
                    "type": "payoutsByTx",
                    "contract": self.contract.as_str(),
                    "gameId": game_id.as_u64(),
                    "txHash": tx.as_str(),
                })
            }
            PayoutScope::Blocks(range) => {
                debug!(
                    "Searching payouts game={}, from_block={}, to_block={}",
                    game_id,
                    range.from.as_u64(),
                    range.to.as_u64()
                );
                serde_json::json!({
                    "type": "payoutsByBlocks",
                    "contract": self.contract.as_str(),
                    "gameId": game_id.as_u64(),
                    "fromBlock": range.from.as_u64(),
                    "toBlock": range.to.as_u64(),
                })
            }
        };

        let response: PayoutsResponse = self.post_query(payload).await?;

        let mut records = Vec::with_capacity(response.records.len());
        for r in response.records {
            match parse_address(&r.winner) {
                Ok(winner) => records.push(PayoutRecord {
                    place: r.place,
                    winner,
                    amount: r.amount,
                    tx_ref: TxRef::new(r.tx_hash),
                    block_number: BlockNumber(r.block_number),
                }),
                Err(e) => warn!("Failed to parse payout record: {}", e),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_block_range_error() {
        let err = classify_client_error(400, r#"{"error":"too wide","maxBlockRange":5000}"#);
        assert_eq!(
            err,
            LedgerError::BlockRangeExceeded {
                max_range: Some(5000)
            }
        );

        let err = classify_client_error(400, r#"{"error":"Block range is too large"}"#);
        assert_eq!(err, LedgerError::BlockRangeExceeded { max_range: None });
    }

    #[test]
    fn test_classify_not_found_and_other() {
        let err = classify_client_error(404, r#"{"error":"unknown game"}"#);
        assert_eq!(err, LedgerError::NotFound("unknown game".to_string()));

        let err = classify_client_error(400, "not json");
        assert_eq!(
            err,
            LedgerError::HttpError {
                status: 400,
                message: "Client error".to_string()
            }
        );
    }

    #[test]
    fn test_parse_game_response() {
        let json = serde_json::json!({
            "totalRounds": 3,
            "currentRound": 2,
            "startTime": 1700000000,
            "finalized": false,
            "cancelled": false,
            "entryFee": "1000000000000000000",
            "playerCount": 4,
            "prizePool": "0"
        });
        let game: GameResponse = serde_json::from_value(json).unwrap();
        assert_eq!(game.total_rounds, 3);
        assert_eq!(game.entry_fee, Amount::new(1_000_000_000_000_000_000));
        assert!(game.prize_pool.is_zero());
    }

    #[test]
    fn test_parse_payouts_response() {
        let json = serde_json::json!({
            "records": [{
                "place": 1,
                "winner": "0x00000000000000000000000000000000000000aa",
                "amount": "600",
                "txHash": "0xabc",
                "blockNumber": 77
            }]
        });
        let payouts: PayoutsResponse = serde_json::from_value(json).unwrap();
        assert_eq!(payouts.records.len(), 1);
        assert_eq!(payouts.records[0].block_number, 77);
    }
}
