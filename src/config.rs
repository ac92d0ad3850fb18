use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::db::statement_guard::StatementPolicy;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
    pub read_only: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "anthropic", "remote", or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    /// Literal the model must emit right before its SQL section.
    pub marker: String,
    pub max_rows: usize,
    /// Character budget for the results summary embedded in the follow-up prompt.
    pub summary_char_budget: usize,
    pub query_timeout_secs: u64,
    pub generator_timeout_secs: u64,
    pub statement_policy: StatementPolicy,
    pub system_prompt_file: Option<PathBuf>,
    pub include_schema: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// DuckDB database file holding the ledger
    #[arg(long, value_name = "FILE")]
    pub database: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Defaults first so a config file only needs the keys it changes
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-ledger/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // NL_LEDGER__LLM__API_KEY, NL_LEDGER__AGENT__MAX_ROWS, ...
        config_builder = config_builder.add_source(
            Environment::with_prefix("NL_LEDGER")
                .prefix_separator("__")
                .separator("__"),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        config.apply_args(args);

        Ok(config)
    }

    fn apply_args(&mut self, args: &CliArgs) {
        if let Some(host) = &args.host {
            self.web.host = host.clone();
        }
        if let Some(port) = args.port {
            self.web.port = port;
        }
        if let Some(database) = &args.database {
            self.database.connection_string = database.clone();
        }
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "ledger.duckdb".to_string(),
                pool_size: 5,
                read_only: true,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            llm: LlmConfig {
                backend: "anthropic".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                api_key: None,
                api_url: None,
                max_tokens: 4096,
                timeout_secs: 60,
            },
            agent: AgentConfig {
                marker: "SQL_QUERY:".to_string(),
                max_rows: 50,
                summary_char_budget: 2000,
                query_timeout_secs: 30,
                generator_timeout_secs: 90,
                statement_policy: StatementPolicy::ReadOnly,
                system_prompt_file: None,
                include_schema: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_args() -> CliArgs {
        CliArgs {
            config: None,
            host: None,
            port: None,
            database: None,
        }
    }

    #[test]
    fn test_defaults_round_trip_through_config_builder() {
        let config: AppConfig = Config::builder()
            .add_source(Config::try_from(&AppConfig::default()).unwrap())
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.agent.marker, "SQL_QUERY:");
        assert_eq!(config.agent.max_rows, 50);
        assert_eq!(config.agent.summary_char_budget, 2000);
        assert_eq!(config.agent.statement_policy, StatementPolicy::ReadOnly);
        assert!(config.database.read_only);
        assert_eq!(config.llm.backend, "anthropic");
    }

    #[test]
    fn test_cli_args_override_file_values() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            host: Some("0.0.0.0".to_string()),
            port: Some(8080),
            database: Some("/srv/ledger.duckdb".to_string()),
            ..no_args()
        };

        config.apply_args(&args);

        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.database.connection_string, "/srv/ledger.duckdb");
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let toml = r#"
            [agent]
            max_rows = 10
            statement_policy = "trust"

            [llm]
            backend = "ollama"
        "#;

        let config: AppConfig = Config::builder()
            .add_source(Config::try_from(&AppConfig::default()).unwrap())
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.agent.max_rows, 10);
        assert_eq!(config.agent.statement_policy, StatementPolicy::Trust);
        assert_eq!(config.llm.backend, "ollama");
        // untouched keys keep their defaults
        assert_eq!(config.agent.marker, "SQL_QUERY:");
        assert_eq!(config.web.port, 5000);
    }
}
