use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};
use std::io::Write;
use std::path::PathBuf;

/// EduVerse Session Gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Gateway API key for client authentication
    #[arg(short = 'k', long, env = "GATEWAY_API_KEY")]
    pub gateway_key: Option<String>,

    /// Base URL of the identity/data provider
    #[arg(short = 'u', long, env = "EDUVERSE_PROVIDER_URL")]
    pub provider_url: Option<String>,

    /// Provider service (anon) key
    #[arg(short = 'a', long, env = "EDUVERSE_PROVIDER_KEY")]
    pub provider_key: Option<String>,

    /// Path of the persisted-session file
    #[arg(short = 's', long, env = "EDUVERSE_SESSION_FILE")]
    pub session_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Authentication
    pub gateway_api_key: String,

    // Provider
    pub provider_url: String,
    pub provider_api_key: String,
    pub session_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Parse CLI arguments
        let args = CliArgs::parse();

        let config = Config {
            // Server settings (from CLI with defaults)
            server_host: args.host,
            server_port: args.port,

            // Authentication (CLI > ENV, required)
            gateway_api_key: args
                .gateway_key
                .or_else(|| std::env::var("GATEWAY_API_KEY").ok())
                .context("GATEWAY_API_KEY is required (use -k or set GATEWAY_API_KEY env var)")?,

            // Provider
            provider_url: args
                .provider_url
                .or_else(|| std::env::var("EDUVERSE_PROVIDER_URL").ok())
                .context(
                    "EDUVERSE_PROVIDER_URL is required (use -u or set EDUVERSE_PROVIDER_URL env var)",
                )?,

            provider_api_key: args
                .provider_key
                .or_else(|| std::env::var("EDUVERSE_PROVIDER_KEY").ok())
                .context(
                    "EDUVERSE_PROVIDER_KEY is required (use -a or set EDUVERSE_PROVIDER_KEY env var)",
                )?,

            session_file: args
                .session_file
                .map(|s| expand_tilde(&s))
                .or_else(default_session_file)
                .context("Could not determine a session file path (set EDUVERSE_SESSION_FILE)")?,

            // HTTP client
            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            http_request_timeout: std::env::var("HTTP_REQUEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.provider_url.starts_with("http://") && !self.provider_url.starts_with("https://") {
            anyhow::bail!(
                "EDUVERSE_PROVIDER_URL must be an http(s) URL: {}",
                self.provider_url
            );
        }

        if self.gateway_api_key.is_empty() {
            anyhow::bail!("GATEWAY_API_KEY must not be empty");
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

/// Default persisted-session location under the platform data directory
fn default_session_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("eduverse").join("session.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_relative_path() {
        let path = expand_tilde("relative/path");
        assert_eq!(path, PathBuf::from("relative/path"));
    }

    #[test]
    fn test_default_session_file_location() {
        if let Some(path) = default_session_file() {
            assert!(path.ends_with("eduverse/session.json"));
        }
    }

    fn config() -> Config {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            gateway_api_key: "secret".to_string(),
            provider_url: "https://project.example.co".to_string(),
            provider_api_key: "anon".to_string(),
            session_file: PathBuf::from("/tmp/session.json"),
            http_connect_timeout: 30,
            http_request_timeout: 30,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_http_provider_url() {
        let mut config = config();
        config.provider_url = "project.example.co".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_gateway_key() {
        let mut config = config();
        config.gateway_api_key = String::new();
        assert!(config.validate().is_err());
    }
}

// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and missing required values)
pub fn needs_interactive_setup() -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();

    let has_gateway_key = std::env::var("GATEWAY_API_KEY").is_ok();
    let has_provider_url = std::env::var("EDUVERSE_PROVIDER_URL").is_ok();
    let has_provider_key = std::env::var("EDUVERSE_PROVIDER_KEY").is_ok();

    !env_file_exists && (!has_gateway_key || !has_provider_url || !has_provider_key)
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub gateway_api_key: String,
    pub provider_url: String,
    pub provider_api_key: String,
    pub server_port: String,
}

/// Run interactive setup to collect required configuration
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("EduVerse Session Gateway - First Time Setup");
    println!("No configuration found. Let's set up your gateway.");
    println!();

    let gateway_api_key: String = Password::new()
        .with_prompt("Enter a password to protect your gateway (GATEWAY_API_KEY)")
        .interact()
        .context("Failed to read GATEWAY_API_KEY")?;

    if gateway_api_key.is_empty() {
        anyhow::bail!("GATEWAY_API_KEY cannot be empty");
    }

    let provider_url: String = Input::new()
        .with_prompt("Provider base URL (EDUVERSE_PROVIDER_URL)")
        .interact_text()
        .context("Failed to read EDUVERSE_PROVIDER_URL")?;

    if !provider_url.starts_with("http://") && !provider_url.starts_with("https://") {
        anyhow::bail!("Provider URL must start with http:// or https://");
    }

    let provider_api_key: String = Password::new()
        .with_prompt("Provider service key (EDUVERSE_PROVIDER_KEY)")
        .interact()
        .context("Failed to read EDUVERSE_PROVIDER_KEY")?;

    let server_port: String = Input::new()
        .with_prompt("Server port")
        .default("8000".to_string())
        .interact_text()
        .context("Failed to read server port")?;

    let config = InteractiveConfig {
        gateway_api_key,
        provider_url,
        provider_api_key,
        server_port,
    };

    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!();
        println!("Configuration saved to .env file");
    }

    println!();
    println!("Setup complete! Starting gateway...");
    println!();

    Ok(config)
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let env_content = format!(
        r#"# EduVerse Session Gateway Configuration
# Generated by interactive setup

# Password to protect the gateway (required)
GATEWAY_API_KEY={}

# Identity/data provider (required)
EDUVERSE_PROVIDER_URL={}
EDUVERSE_PROVIDER_KEY={}

# Server settings
SERVER_HOST=127.0.0.1
SERVER_PORT={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.gateway_api_key, config.provider_url, config.provider_api_key, config.server_port,
    );

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
