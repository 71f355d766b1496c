//! Packforge - modpack server builder
//!
//! Downloads a mod bundle and a server template, assembles the server,
//! boots it until every failing mod has been pruned and archives the
//! validated release.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use packforge_core::{PackBuilder, PackConfig, PackRun};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "packforge")]
#[command(author = "Packforge Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build a validated server release from a modpack", long_about = None)]
struct Cli {
    /// URL of the mod bundle archive
    #[arg(
        long = "mod",
        value_name = "URL",
        env = "PACKFORGE_MOD_URL",
        required_unless_present = "skip_bootstrap"
    )]
    mod_url: Option<String>,

    /// Destination directory for the workspace
    #[arg(long, value_name = "DIR", env = "PACKFORGE_DEST")]
    dest: PathBuf,

    /// TOML configuration file
    #[arg(long, value_name = "PATH", env = "PACKFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum validation runs (0 = unbounded)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Per-boot time limit in seconds (0 = unbounded)
    #[arg(long)]
    boot_timeout_secs: Option<u64>,

    /// Reuse an already extracted bundle and template under --dest
    #[arg(long)]
    skip_bootstrap: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn pack_config(&self) -> Result<PackConfig> {
        let mut config = PackConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(secs) = self.boot_timeout_secs {
            config.launch.boot_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    packforge_core::init_tracing(cli.json, level);

    let config = cli.pack_config()?;
    let builder = PackBuilder::new(config, &cli.dest).context("Failed to set up workspace")?;

    if !cli.skip_bootstrap {
        // clap guarantees --mod unless --skip-bootstrap was given
        let url = cli.mod_url.as_deref().context("--mod is required")?;
        builder
            .bootstrap(url)
            .await
            .context("Failed to download inputs")?;
    }

    let run = builder.build().await.context("Build failed")?;
    report(&run, cli.json)?;
    Ok(())
}

fn report(run: &PackRun, json: bool) -> Result<()> {
    if json {
        let summary = serde_json::json!({
            "pack": run.manifest.name,
            "version": run.manifest.version,
            "attempts": run.report.attempt_count(),
            "removed": run.report.removed_artifacts(),
            "release_tree": run.pair.release(),
            "report": run.report_path,
            "archive": run.release.archive_path,
            "sha256": run.release.sha256,
        });
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }

    info!(
        attempts = run.report.attempt_count(),
        removed = run.report.removed_artifacts().len(),
        "server release validated"
    );
    for artifact in run.report.removed_artifacts() {
        println!("removed  {artifact}");
    }
    println!("release  {}", run.pair.release().display());
    println!("archive  {}", run.release.archive_path.display());
    println!("sha256   {}", run.release.sha256);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mod_and_dest_are_parsed() {
        let cli = Cli::try_parse_from([
            "packforge",
            "--mod",
            "https://example.com/pack.zip",
            "--dest",
            "/tmp/out",
        ])
        .unwrap();
        assert_eq!(cli.mod_url.as_deref(), Some("https://example.com/pack.zip"));
        assert_eq!(cli.dest, PathBuf::from("/tmp/out"));
        assert!(!cli.skip_bootstrap);
    }

    #[test]
    fn skip_bootstrap_makes_mod_optional() {
        let cli =
            Cli::try_parse_from(["packforge", "--dest", "/tmp/out", "--skip-bootstrap"]).unwrap();
        assert!(cli.mod_url.is_none());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "packforge",
            "--dest",
            "/tmp/out",
            "--skip-bootstrap",
            "--max-attempts",
            "3",
            "--boot-timeout-secs",
            "0",
        ])
        .unwrap();
        let config = cli.pack_config().unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.launch.boot_timeout_secs, 0);
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packforge.toml");
        std::fs::write(&path, "max_attempts = 7\n[launch]\nstop_grace_secs = 9\n").unwrap();

        let cli = Cli::try_parse_from([
            "packforge",
            "--dest",
            "/tmp/out",
            "--skip-bootstrap",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let config = cli.pack_config().unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.launch.stop_grace_secs, 9);
    }
}
