//! Command line and environment configuration.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Mirage - contract-driven HTTP mock server
#[derive(Parser, Debug)]
#[command(name = "mirage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the contract file (YAML or JSON)
    #[arg(short, long, env = "MIRAGE_CONTRACT")]
    pub contract: PathBuf,

    /// Port for mocked traffic
    #[arg(short, long, env = "MIRAGE_PORT", default_value = "8080")]
    pub port: u16,

    /// Port for the admin API
    #[arg(long, env = "MIRAGE_ADMIN_PORT", default_value = "2525")]
    pub admin_port: u16,

    /// Address both listeners bind to
    #[arg(long, env = "MIRAGE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Root for bodyFile/valueFile lookups (defaults to the contract's directory)
    #[arg(short, long, env = "MIRAGE_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Path prefix under which the admin API is also served on the runtime port
    #[arg(long, env = "MIRAGE_ADMIN_PREFIX", default_value = "/__mirage__")]
    pub admin_prefix: String,

    /// Reload the contract when files in the workspace change
    #[arg(long, env = "MIRAGE_WATCH")]
    pub watch: bool,

    /// Poll interval for --watch, in milliseconds
    #[arg(long, env = "MIRAGE_WATCH_INTERVAL_MS", default_value = "1000")]
    pub watch_interval_ms: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "MIRAGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "MIRAGE_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Validated, immutable server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub contract_path: PathBuf,
    pub workspace_root: PathBuf,
    pub runtime_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub admin_prefix: String,
    pub watch: Option<Duration>,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let workspace_root = match &cli.workspace {
            Some(dir) => dir.clone(),
            None => cli
                .contract
                .parent()
                .map(|p| p.to_path_buf())
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        let config = Self {
            contract_path: cli.contract.clone(),
            workspace_root,
            runtime_addr: SocketAddr::new(cli.host, cli.port),
            admin_addr: SocketAddr::new(cli.host, cli.admin_port),
            admin_prefix: cli.admin_prefix.clone(),
            watch: cli
                .watch
                .then(|| Duration::from_millis(cli.watch_interval_ms)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.contract_path.is_file() {
            bail!("Contract file {} does not exist", self.contract_path.display());
        }
        let meta = std::fs::metadata(&self.workspace_root).with_context(|| {
            format!("Workspace root {} is not readable", self.workspace_root.display())
        })?;
        if !meta.is_dir() {
            bail!("Workspace root {} is not a directory", self.workspace_root.display());
        }
        if self.runtime_addr.port() != 0 && self.runtime_addr.port() == self.admin_addr.port() {
            bail!("Runtime and admin ports must differ (both {})", self.admin_addr.port());
        }
        if !self.admin_prefix.is_empty() && !self.admin_prefix.starts_with('/') {
            bail!("Admin prefix must start with '/': {}", self.admin_prefix);
        }
        if self.watch.is_some_and(|interval| interval.is_zero()) {
            bail!("Watch interval must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["mirage"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let contract = dir.path().join("contract.yaml");
        std::fs::write(&contract, "endpoints: []").unwrap();

        let cli = cli(&["--contract", contract.to_str().unwrap()]);
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.admin_port, 2525);
        assert_eq!(cli.admin_prefix, "/__mirage__");
        assert_eq!(cli.log_format, LogFormat::Text);

        let config = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(config.workspace_root, dir.path());
        assert_eq!(config.runtime_addr.port(), 8080);
        assert!(config.watch.is_none());
    }

    #[test]
    fn test_watch_interval() {
        let dir = TempDir::new().unwrap();
        let contract = dir.path().join("c.yaml");
        std::fs::write(&contract, "").unwrap();

        let cli = cli(&[
            "-c",
            contract.to_str().unwrap(),
            "--watch",
            "--watch-interval-ms",
            "250",
            "--log-format",
            "json",
        ]);
        let config = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(config.watch, Some(Duration::from_millis(250)));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_validation_errors() {
        let dir = TempDir::new().unwrap();
        let contract = dir.path().join("c.yaml");

        let missing = cli(&["-c", contract.to_str().unwrap()]);
        assert!(ServerConfig::from_cli(&missing).is_err());

        std::fs::write(&contract, "").unwrap();
        let same_port = cli(&["-c", contract.to_str().unwrap(), "-p", "9000", "--admin-port", "9000"]);
        assert!(ServerConfig::from_cli(&same_port)
            .unwrap_err()
            .to_string()
            .contains("must differ"));

        let bad_prefix = cli(&["-c", contract.to_str().unwrap(), "--admin-prefix", "admin"]);
        assert!(ServerConfig::from_cli(&bad_prefix).is_err());
    }
}
