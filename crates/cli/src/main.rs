mod consent;
mod token;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use janus_core::{ContextMessage, ExecutionContext, TenantInfo};
use janus_storage::StorageError;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Janus identity persistence toolchain.
#[derive(Parser)]
#[command(name = "janus", version, about = "Janus identity persistence CLI")]
struct Cli {
    /// Directory holding the JSON store documents
    #[arg(long, global = true, default_value = "./janus-data")]
    data_dir: PathBuf,

    /// Tenant id operations execute for
    #[arg(long, global = true, default_value = "00000000-0000-0000-0000-000000000001")]
    tenant: Uuid,

    /// Tenant display name
    #[arg(long, global = true, default_value = "default")]
    tenant_name: String,

    /// Acting user recorded in the audit trail
    #[arg(long, global = true, default_value = "cli-operator")]
    user: String,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage one-time tokens
    Token {
        #[command(subcommand)]
        command: token::TokenCommands,
    },

    /// Manage user consents
    Consent {
        #[command(subcommand)]
        command: consent::ConsentCommands,
    },
}

/// Everything a command needs besides its own arguments.
pub(crate) struct CliEnv {
    pub data_dir: PathBuf,
    pub tenant: TenantInfo,
    pub user: String,
    pub output: OutputFormat,
}

impl CliEnv {
    /// Fresh context for one command invocation.
    pub fn ctx(&self, business_operation: &str) -> ExecutionContext {
        ExecutionContext::new(
            self.tenant.clone(),
            self.user.clone(),
            "cli",
            business_operation,
        )
    }

    /// Emit a command result in the selected format.
    pub fn emit(&self, json: serde_json::Value, text: &str) {
        match self.output {
            OutputFormat::Text => println!("{text}"),
            OutputFormat::Json => match serde_json::to_string_pretty(&json) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => eprintln!("error: could not render output: {e}"),
            },
        }
    }

    /// Print the diagnostics a failed operation left on the context.
    pub fn report_failure(&self, messages: &[ContextMessage]) {
        match self.output {
            OutputFormat::Text => {
                for m in messages {
                    eprintln!("{} [{}]: {}", m.level, m.code, m.text);
                }
            }
            OutputFormat::Json => match serde_json::to_string_pretty(messages) {
                Ok(rendered) => eprintln!("{rendered}"),
                Err(e) => eprintln!("error: could not render diagnostics: {e}"),
            },
        }
    }

    /// Open one of the JSON store documents, creating the data
    /// directory on first use.
    pub fn open_store<R>(&self, file_name: &str) -> Result<Arc<janus_storage::JsonFileStore<R>>, StorageError>
    where
        R: janus_storage::StoredRow + serde::Serialize + serde::de::DeserializeOwned,
    {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Arc::new(janus_storage::JsonFileStore::open(
            self.data_dir.join(file_name),
        )?))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let env = CliEnv {
        data_dir: cli.data_dir,
        tenant: TenantInfo::new(cli.tenant, cli.tenant_name),
        user: cli.user,
        output: cli.output,
    };

    let result = match cli.command {
        Commands::Token { command } => token::run(&env, command).await,
        Commands::Consent { command } => consent::run(&env, command).await,
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("storage error: {e}");
            process::exit(2);
        }
    }
}
