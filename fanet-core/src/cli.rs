use std::path::PathBuf;

use clap::Parser;

/// CLI surface, mirroring `jet1090::cli::Options`'s shape: a handful of
/// overrides layered on top of the TOML configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "fanet-core",
    version,
    about = "Ingest, validate and broadcast FANET tracking data"
)]
pub struct Options {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override `log_level` from the configuration file.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override the HTTP/WebSocket server port.
    #[arg(long)]
    pub serve_port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_no_arguments() {
        let options = Options::parse_from(["fanet-core"]);
        assert!(options.config.is_none());
        assert!(options.serve_port.is_none());
    }

    #[test]
    fn parses_overrides() {
        let options = Options::parse_from([
            "fanet-core",
            "--config",
            "fanet.toml",
            "--serve-port",
            "9090",
        ]);
        assert_eq!(options.config, Some(PathBuf::from("fanet.toml")));
        assert_eq!(options.serve_port, Some(9090));
    }
}
