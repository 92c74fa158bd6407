use crate::domain::{Address, GameId};
use crate::engine::PayoutSearchConfig;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub ledger_api_url: String,
    pub arena_contract: Address,
    pub poll_interval_ms: u64,
    pub payout_search_chunk_blocks: u64,
    pub payout_search_lookback_blocks: u64,
    pub token_decimals: u32,
    pub watch_games: Vec<GameId>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", "8080", "must be a valid u16")?;

        let ledger_api_url = env_map
            .get("LEDGER_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("LEDGER_API_URL".to_string()))?;

        let arena_contract = env_map
            .get("ARENA_CONTRACT")
            .ok_or_else(|| ConfigError::MissingEnv("ARENA_CONTRACT".to_string()))
            .and_then(|s| {
                Address::from_str(s).map_err(|e| {
                    ConfigError::InvalidValue("ARENA_CONTRACT".to_string(), e.to_string())
                })
            })?;

        let poll_interval_ms: u64 =
            parse_or(&env_map, "POLL_INTERVAL_MS", "5000", "must be a valid u64")?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_MS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        let payout_search_chunk_blocks: u64 = parse_or(
            &env_map,
            "PAYOUT_SEARCH_CHUNK_BLOCKS",
            "10000",
            "must be a valid u64",
        )?;
        if payout_search_chunk_blocks == 0 {
            return Err(ConfigError::InvalidValue(
                "PAYOUT_SEARCH_CHUNK_BLOCKS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        let payout_search_lookback_blocks = parse_or(
            &env_map,
            "PAYOUT_SEARCH_LOOKBACK_BLOCKS",
            "500000",
            "must be a valid u64",
        )?;

        let token_decimals: u32 =
            parse_or(&env_map, "TOKEN_DECIMALS", "18", "must be a valid u32")?;
        if token_decimals > 28 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_DECIMALS".to_string(),
                "must be at most 28".to_string(),
            ));
        }

        let watch_games = parse_watch_games_from_map(&env_map)?;

        Ok(Config {
            port,
            ledger_api_url,
            arena_contract,
            poll_interval_ms,
            payout_search_chunk_blocks,
            payout_search_lookback_blocks,
            token_decimals,
            watch_games,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn payout_search(&self) -> PayoutSearchConfig {
        PayoutSearchConfig {
            chunk_blocks: self.payout_search_chunk_blocks,
            lookback_blocks: self.payout_search_lookback_blocks,
            ..PayoutSearchConfig::default()
        }
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
    hint: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), hint.to_string()))
}

fn parse_game_ids<'a>(
    key: &str,
    items: impl Iterator<Item = &'a str>,
) -> Result<Vec<GameId>, ConfigError> {
    let mut ids = items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            GameId::from_str(s).map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), format!("invalid game id: {}", s))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

fn parse_watch_games_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<GameId>, ConfigError> {
    if let Some(games_str) = env_map.get("WATCH_GAMES") {
        parse_game_ids("WATCH_GAMES", games_str.split(','))
    } else if let Some(file_path) = env_map.get("WATCH_GAMES_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "WATCH_GAMES_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        parse_game_ids("WATCH_GAMES_FILE", content.lines())
    } else {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            "LEDGER_API_URL".to_string(),
            "http://localhost:8545".to_string(),
        );
        map.insert(
            "ARENA_CONTRACT".to_string(),
            "0x00000000000000000000000000000000000000a1".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.poll_interval(), Duration::from_millis(5000));
        assert_eq!(config.token_decimals, 18);
        assert_eq!(config.payout_search().chunk_blocks, 10_000);
        assert_eq!(config.payout_search().lookback_blocks, 500_000);
        assert!(config.watch_games.is_empty());
    }

    #[test]
    fn test_missing_ledger_api_url() {
        let mut env_map = setup_required_env();
        env_map.remove("LEDGER_API_URL");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "LEDGER_API_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_arena_contract() {
        let mut env_map = setup_required_env();
        env_map.remove("ARENA_CONTRACT");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "ARENA_CONTRACT"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_arena_contract() {
        let mut env_map = setup_required_env();
        env_map.insert("ARENA_CONTRACT".to_string(), "0x12".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "ARENA_CONTRACT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("PAYOUT_SEARCH_CHUNK_BLOCKS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PAYOUT_SEARCH_CHUNK_BLOCKS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_watch_games_list() {
        let mut env_map = setup_required_env();
        env_map.insert("WATCH_GAMES".to_string(), "3, 1,,3".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.watch_games, vec![GameId(1), GameId(3)]);
    }

    #[test]
    fn test_watch_games_invalid() {
        let mut env_map = setup_required_env();
        env_map.insert("WATCH_GAMES".to_string(), "1,abc".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "WATCH_GAMES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_watch_games_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "12").unwrap();
        writeln!(file).unwrap();
        writeln!(file, " 4 ").unwrap();

        let mut env_map = setup_required_env();
        env_map.insert(
            "WATCH_GAMES_FILE".to_string(),
            file.path().to_string_lossy().to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.watch_games, vec![GameId(4), GameId(12)]);
    }
}
