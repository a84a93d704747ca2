// StockLedger CLI - marketplace orders against the inventory ledger sheet

mod exit_codes;
mod input;
mod report;
mod run;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stockledger_recon::ReconConfig;
use stockledger_sheets::SheetsError;

use exit_codes::{sheets_exit_code, EXIT_ERROR, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};
use input::{read_text, recon_err, GridSource};
use run::{InputArgs, InventoryArgs, OutputArgs, WriteArgs};

#[derive(Parser)]
#[command(name = "stockledger")]
#[command(about = "Reconcile marketplace orders against a spreadsheet inventory ledger")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve order lines to products and total sales per product
    #[command(after_help = "\
Examples:
  stockledger aggregate --orders orders.csv --catalog master.json
  stockledger aggregate --orders orders.csv --api http://localhost:3000 --json
  stockledger aggregate --orders orders.csv --catalog master.csv --policy first-wins")]
    Aggregate {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compute updated stock quantities for each inventory row
    #[command(after_help = "\
Examples:
  stockledger merge --orders orders.csv --catalog master.json --inventory stock.json
  stockledger merge --orders orders.csv --api http://localhost:3000 --sheet '在庫 A'
  stockledger merge --orders orders.csv --catalog master.json --inventory stock.json -o merge.json")]
    Merge {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        inventory: InventoryArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Pick the next ledger column group and print the writes (dry run)
    #[command(after_help = "\
Examples:
  stockledger plan --orders orders.csv --catalog master.json --inventory stock.json \\
      --sheet 'Stock A' --date 2024-05-01 --time 09:30 --manager 田中
  stockledger plan --orders orders.csv --api http://localhost:3000 --sheet 'Stock A' \\
      --date 2024-05-01 --time 09:30 --manager 田中 --json")]
    Plan {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        inventory: InventoryArgs,

        #[command(flatten)]
        write: WriteArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Plan the ledger writes and send them through the proxy
    #[command(after_help = "\
Examples:
  stockledger write --orders orders.csv --api http://localhost:3000 --sheet 'Stock A' \\
      --date 2024-05-01 --time 09:30 --manager 田中
  stockledger write --orders orders.csv --sheet 'Stock A' --date 2024-05-01 --time 09:30 \\
      --manager 田中 --retry 2 -o write-report.json

Exit codes:
  0   every range written
  11  no available write slot (nothing written)
  12  some ranges failed (the rest were written)
  13  proxy unreachable or returned an error")]
    Write {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        inventory: InventoryArgs,

        #[command(flatten)]
        write: WriteArgs,

        /// Re-send failed ranges up to N more times
        #[arg(long, default_value_t = 0, value_name = "N")]
        retry: usize,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the sheets the proxy can see
    #[command(after_help = "\
Examples:
  stockledger sheets --api http://localhost:3000
  STOCKLEDGER_API=http://localhost:3000 stockledger sheets --json")]
    Sheets {
        /// Spreadsheet proxy base URL
        #[arg(long, env = "STOCKLEDGER_API", value_name = "URL")]
        api: Option<String>,

        /// Output JSON array
        #[arg(long)]
        json: bool,
    },

    /// Engine config commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Parse and validate a config file
    #[command(after_help = "\
Examples:
  stockledger config validate stockledger.toml")]
    Validate {
        /// Config file (TOML)
        path: PathBuf,
    },

    /// Print the built-in config as TOML
    #[command(after_help = "\
Examples:
  stockledger config default > stockledger.toml")]
    Default,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  stockledger-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            eprintln!("Usage: stockledger <command> [options]");
            eprintln!("       stockledger --help for more information");
            Ok(())
        }
        Some(Commands::Aggregate { input, output }) => run::cmd_aggregate(input, output),
        Some(Commands::Merge { input, inventory, output }) => run::cmd_merge(input, inventory, output),
        Some(Commands::Plan { input, inventory, write, output }) => {
            run::cmd_plan(input, inventory, write, output)
        }
        Some(Commands::Write { input, inventory, write, retry, output }) => {
            run::cmd_write(input, inventory, write, retry, output)
        }
        Some(Commands::Sheets { api, json }) => cmd_sheets(api, json),
        Some(Commands::Config(config_cmd)) => match config_cmd {
            ConfigCommands::Validate { path } => cmd_config_validate(path),
            ConfigCommands::Default => cmd_config_default(),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from a proxy error with proper exit code.
    pub fn sheets(err: SheetsError) -> Self {
        let code = sheets_exit_code(&err);
        let hint = match &err {
            SheetsError::Network(_) => {
                Some("is the spreadsheet proxy running? check --api or STOCKLEDGER_API".to_string())
            }
            SheetsError::Http { status: 404, .. } => {
                Some("check the sheet name with `stockledger sheets`".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn cmd_sheets(api: Option<String>, json: bool) -> Result<(), CliError> {
    let client = GridSource { api }.client()?;
    let names = client.list_sheets().map_err(CliError::sheets)?;

    if json {
        let output = serde_json::to_string_pretty(&names)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", output);
        return Ok(());
    }

    for name in &names {
        println!("{}", name);
    }
    eprintln!("{} sheet(s) at {}", names.len(), client.api_base());
    Ok(())
}

fn cmd_config_validate(path: PathBuf) -> Result<(), CliError> {
    let text = read_text(&path)?;
    let config = ReconConfig::from_toml(&text).map_err(recon_err)?;
    let layout = &config.inventory;
    eprintln!(
        "ok: {} (policy {}, {} column groups from {}, {} staff)",
        config.name,
        config.aggregation.policy,
        layout.group_offsets.len(),
        layout.first_column,
        config.write.staff.len(),
    );
    Ok(())
}

fn cmd_config_default() -> Result<(), CliError> {
    let text = ReconConfig::default()
        .to_toml()
        .map_err(recon_err)?;
    print!("{}", text);
    Ok(())
}
