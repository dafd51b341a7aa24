use std::{collections::BTreeMap, path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use courier_client::{
    ClientConfig, ClientError, CourierClient, FileSessionStore, GetFolderOptions, SessionStore,
    SessionStoreError, TransportError,
};
use courier_core::{Namespace, RequestDescriptor, TransportOptions, UserAgent, default_state_dir};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "courier", about = "Batching groupware API client")]
struct Cli {
    #[arg(long, env = "COURIER_ORIGIN", default_value = courier_client::config::DEFAULT_ORIGIN)]
    origin: String,
    #[arg(long, default_value = courier_client::config::DEFAULT_SOAP_PATH)]
    soap_path: String,
    #[arg(long, env = "COURIER_JWT_TOKEN", hide_env_values = true)]
    jwt_token: Option<String>,
    #[arg(long, env = "COURIER_CSRF_TOKEN", hide_env_values = true)]
    csrf_token: Option<String>,
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[arg(long)]
    max_batch_size: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Waits for server-side changes.
    Noop {
        #[arg(long)]
        wait: bool,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Prints account information.
    Info,
    /// Resolves several names in one batch.
    Autocomplete {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Prints the folder tree.
    Folders {
        #[arg(long)]
        folder_id: Option<String>,
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Sends one raw request.
    Call {
        name: String,
        #[arg(long, default_value = "{}")]
        body: String,
        #[arg(long, value_enum, default_value_t = NamespaceArg::Mail)]
        namespace: NamespaceArg,
        #[arg(long)]
        single: bool,
        #[arg(long)]
        account: Option<String>,
        #[arg(long = "header", value_name = "NAME=VALUE")]
        headers: Vec<String>,
    },
    /// Prints the persisted session id.
    Session,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NamespaceArg {
    Mail,
    Account,
    Admin,
    Sync,
    Voice,
}

impl From<NamespaceArg> for Namespace {
    fn from(value: NamespaceArg) -> Self {
        match value {
            NamespaceArg::Mail => Namespace::Mail,
            NamespaceArg::Account => Namespace::Account,
            NamespaceArg::Admin => Namespace::Admin,
            NamespaceArg::Sync => Namespace::Sync,
            NamespaceArg::Voice => Namespace::Voice,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    SessionStore(#[from] SessionStoreError),
    #[error("invalid json body: {0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error("invalid header '{value}': expected NAME=VALUE")]
    InvalidHeader { value: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let state_dir = cli.state_dir.clone().unwrap_or_else(default_state_dir);
    let store = Arc::new(FileSessionStore::new(&state_dir)?);

    if let Command::Session = cli.command {
        match store.read_session_id() {
            Some(session_id) => println!("{session_id}"),
            None => println!("no session"),
        }
        return Ok(());
    }

    let config = ClientConfig {
        origin: cli.origin,
        soap_path: cli.soap_path,
        jwt_token: cli.jwt_token,
        csrf_token: cli.csrf_token,
        user_agent: Some(UserAgent {
            name: "courier".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
        max_batch_size: cli.max_batch_size,
    };
    info!(
        origin = %config.origin,
        state_dir = %state_dir.display(),
        "starting courier"
    );
    let client = CourierClient::connect(config, Some(store))?;

    match cli.command {
        Command::Noop { wait, timeout_ms } => {
            let options = timeout_ms.map(|ms| TransportOptions {
                timeout: Some(Duration::from_millis(ms)),
            });
            print_json(&client.noop(wait, false, options).await?);
        }
        Command::Info => print_json(&client.account_info().await?),
        Command::Autocomplete { names } => {
            let pending: Vec<_> = names
                .iter()
                .map(|name| {
                    client.submit(RequestDescriptor::new(
                        "AutoComplete",
                        serde_json::json!({ "name": name }),
                    ))
                })
                .collect();
            for (name, response) in names.iter().zip(pending) {
                match response.await {
                    Ok(body) => {
                        println!("{name}:");
                        print_json(&body);
                    }
                    Err(err) => eprintln!("{name}: {err}"),
                }
            }
        }
        Command::Folders { folder_id, depth } => {
            let options = GetFolderOptions {
                folder_id,
                depth,
                ..GetFolderOptions::default()
            };
            print_json(&client.get_folder(&options).await?);
        }
        Command::Call {
            name,
            body,
            namespace,
            single,
            account,
            headers,
        } => {
            let mut descriptor =
                RequestDescriptor::new(name, serde_json::from_str(&body)?).namespace(namespace.into());
            descriptor.headers = parse_header_pairs(headers)?;
            descriptor.single_request = single;
            descriptor.account = account;
            print_json(&client.submit(descriptor).await?);
        }
        Command::Session => {}
    }

    if let Some(sequence) = client.current_sequence() {
        info!(sequence = sequence.0, "last notification sequence");
    }
    Ok(())
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

fn parse_header_pairs(pairs: Vec<String>) -> Result<BTreeMap<String, String>, CliError> {
    let mut headers = BTreeMap::new();

    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(CliError::InvalidHeader { value: pair });
        };

        if name.is_empty() {
            return Err(CliError::InvalidHeader {
                value: format!("={value}"),
            });
        }

        headers.insert(name.to_string(), value.to_string());
    }

    Ok(headers)
}
