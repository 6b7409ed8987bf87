use serde::Deserialize;

use freezetag_arena::ArenaSize;
use freezetag_core::config::GameConfig;

/// Top-level server configuration, loaded from `freezetag.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub arena: ArenaSize,
    /// Fixed seed for Seeker selection. Random when unset.
    pub seed: Option<u64>,
    pub limits: LimitsConfig,
    /// Inline game rules. When absent, `GameConfig::load` decides.
    pub game: Option<GameConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            arena: ArenaSize::Default,
            seed: None,
            limits: LimitsConfig::default(),
            game: None,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub broadcast_capacity: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            broadcast_capacity: 1024,
            ws_rate_limit_per_sec: 50.0,
            player_message_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Game rules for the match: the inline `[game]` table, else the
    /// standalone game config file, else defaults.
    pub fn game_config(&self) -> GameConfig {
        self.game.clone().unwrap_or_else(GameConfig::load)
    }

    /// Validate configuration, exiting on anything the server cannot run with.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.broadcast_capacity == 0 {
            tracing::error!("limits.broadcast_capacity must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }

        if let Err(e) = self.game_config().validate() {
            tracing::error!(error = %e, "Invalid game configuration");
            std::process::exit(1);
        }
        if self.seed.is_some() {
            tracing::warn!("Seeker selection seed is fixed; rotation is deterministic");
        }
    }

    /// Load config from `freezetag.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("freezetag.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from freezetag.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse freezetag.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No freezetag.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("FREEZETAG_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("FREEZETAG_SEED")
            && let Ok(seed) = val.parse::<u64>()
        {
            config.seed = Some(seed);
        }
        if let Ok(val) = std::env::var("FREEZETAG_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("FREEZETAG_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }

        config
    }
}
