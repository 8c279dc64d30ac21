//! Command-line interface definition.

use bounty_settlement::config::EngineConfig;
use bounty_settlement::SearchFilter;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Operator tooling for the bounty settlement engine.
///
/// Reads the payout ledger and the vulnerability registry in the data
/// directory. Never triggers payouts.
#[derive(Parser, Debug)]
#[command(name = "bounty-settlement")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory holding the ledger and registry files.
    #[arg(long, global = true, env = "BOUNTY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level.
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to configuration file.
    #[arg(long, short, global = true, env = "BOUNTY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Operator commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print registry statistics.
    Stats,

    /// Print an auditor's payout history.
    History {
        /// Auditor id.
        #[arg(long)]
        auditor: String,
    },

    /// Show whether a proof has already been paid.
    Validate {
        /// Proof id.
        #[arg(long)]
        proof_id: String,
    },

    /// Search registered vulnerabilities.
    Search(SearchArgs),

    /// Validate the configuration and report every problem found.
    CheckConfig,

    /// Write the effective configuration to a TOML file.
    InitConfig {
        /// Destination path.
        path: PathBuf,
    },
}

/// Search predicates.
#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Vulnerability type.
    #[arg(long = "type")]
    pub vulnerability_type: Option<String>,

    /// Language.
    #[arg(long)]
    pub language: Option<String>,

    /// Framework.
    #[arg(long)]
    pub framework: Option<String>,

    /// Attack vector.
    #[arg(long)]
    pub attack_vector: Option<String>,

    /// Auditor id.
    #[arg(long)]
    pub auditor: Option<String>,

    /// Lowest risk score, inclusive.
    #[arg(long)]
    pub min_risk: Option<u32>,

    /// Highest risk score, inclusive.
    #[arg(long)]
    pub max_risk: Option<u32>,

    /// Only records whose bounty has been paid.
    #[arg(long, conflicts_with = "unpaid")]
    pub paid: bool,

    /// Only records whose bounty has not been paid.
    #[arg(long)]
    pub unpaid: bool,

    /// Page size.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Records to skip.
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

impl Cli {
    /// Load the configuration file, if any, and apply CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn load_config(&self) -> color_eyre::Result<EngineConfig> {
        let mut config = if let Some(ref path) = self.config {
            EngineConfig::from_file(path)?
        } else {
            EngineConfig::default()
        };

        if let Some(ref data_dir) = self.data_dir {
            config.storage.data_dir.clone_from(data_dir);
        }
        config.log_level.clone_from(&self.log_level);

        Ok(config)
    }
}

impl From<SearchArgs> for SearchFilter {
    fn from(args: SearchArgs) -> Self {
        let bounty_paid = match (args.paid, args.unpaid) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };
        Self {
            min_risk_score: args.min_risk,
            max_risk_score: args.max_risk,
            vulnerability_type: args.vulnerability_type,
            language: args.language,
            framework: args.framework,
            attack_vector: args.attack_vector,
            auditor_id: args.auditor,
            bounty_paid,
            limit: args.limit,
            offset: args.offset,
            ..Self::default()
        }
    }
}
