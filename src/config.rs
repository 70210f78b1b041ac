use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Amora real-time gateway server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "amora-gateway", version, about = "Amora real-time gateway server")]
pub struct Config {
    /// Listen port
    #[arg(long, env = "AMORA_PORT", default_value = "3002")]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "AMORA_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Directory for the SQLite database and the JWT signing key
    #[arg(long, env = "AMORA_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// How long to wait, in milliseconds, for a call receiver to come online
    /// before telling the caller they are unavailable
    #[arg(long, env = "AMORA_CALL_GRACE_MS", default_value = "2000")]
    pub call_grace_ms: u64,

    /// Emit log lines as JSON (containerized deployments)
    #[arg(long, env = "AMORA_JSON_LOGS")]
    pub json_logs: bool,

    /// Path to an optional TOML config file
    #[arg(long, default_value = "./amora.toml")]
    pub config: String,

    /// Print a commented config template to stdout and exit
    #[arg(long)]
    pub generate_config: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3002,
            bind_address: "0.0.0.0".to_string(),
            data_dir: "./data".to_string(),
            call_grace_ms: 2000,
            json_logs: false,
            config: "./amora.toml".to_string(),
            generate_config: false,
        }
    }
}

impl Config {
    /// Layered precedence: built-in defaults < TOML file < AMORA_* env < CLI.
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("AMORA_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

pub fn generate_config_template() -> String {
    r#"# Amora gateway configuration.
# Looked up at ./amora.toml by default; override with --config <path>.
# Every key can also be set through AMORA_* environment variables or CLI flags.

# port = 3002
# bind_address = "0.0.0.0"

# Directory for the SQLite database and the JWT signing key.
# data_dir = "./data"

# How long to wait (ms) for a call receiver to come online before the caller
# is told they are unavailable.
# call_grace_ms = 2000

# Emit log lines as JSON.
# json_logs = false
"#
    .to_string()
}
