mod display;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use qrgate_client::{
    ClientConfig, ReqwestTransport, SessionState, SubscriptionClient, ValidationSession, Validator,
};
use qrgate_core::{Cipher, DecodedPayload, Decoder, Encoding};

#[derive(Parser, Debug)]
#[command(name = "qrgate", version)]
#[command(about = "Decode, validate and delete scanned subscription QR codes")]
struct Cli {
    /// Admin API base URL
    #[arg(
        long,
        env = "QRGATE_API_URL",
        default_value = "http://localhost:3000/api",
        global = true
    )]
    api_url: String,

    /// Service API key sent as `x-api-key`
    #[arg(long, env = "QRGATE_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Pre-shared key for encrypted codes
    #[arg(long, env = "QRGATE_DECRYPTION_KEY", hide_env_values = true, global = true)]
    decryption_key: Option<String>,

    /// Seconds to wait for a validation verdict
    #[arg(long, env = "QRGATE_TIMEOUT_SECS", default_value_t = 10, global = true)]
    timeout_secs: u64,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a code and print it as a card.
    Decode {
        /// The scanned text, or `-` to read it from stdin
        code: String,
        /// Print the payload as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a code, then ask the server whether it is valid.
    Validate {
        /// The scanned text, or `-` to read it from stdin
        code: String,
        /// Extra attempts after a failure or timeout
        #[arg(long, default_value_t = 0)]
        retries: u32,
        /// Print the final session as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the subscription a code refers to.
    Delete {
        /// The scanned text, or `-` to read it from stdin
        code: String,
    },
    /// Read codes from stdin one at a time and validate each.
    Scan,
    /// Encrypt text with the configured decryption key.
    Seal {
        plaintext: String,
        /// Hex output instead of base64
        #[arg(long)]
        hex: bool,
    },
}

impl Cli {
    fn decoder(&self) -> anyhow::Result<Decoder> {
        Ok(Decoder::new(self.cipher()?))
    }

    fn cipher(&self) -> anyhow::Result<Option<Cipher>> {
        self.decryption_key
            .as_deref()
            .map(Cipher::from_passphrase)
            .transpose()
            .context("invalid decryption key")
    }

    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .context("no API key: pass --api-key or set QRGATE_API_KEY")?;
        Ok(ClientConfig::new(&self.api_url, api_key)
            .with_context(|| format!("invalid API URL {}", self.api_url))?
            .with_timeout(Duration::from_secs(self.timeout_secs)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
    debug!("qrgate v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Decode { code, json } => {
            let payload = cli.decoder()?.decode(&read_code(code).await?);
            if *json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                display::print_payload_card(&payload);
                if payload.is_subscription()
                    && let Ok(config) = cli.client_config()
                {
                    show_details(&SubscriptionClient::new(ReqwestTransport::new(), config), &payload)
                        .await;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate {
            code,
            retries,
            json,
        } => {
            let code = read_code(code).await?;
            let config = cli.client_config()?;
            let payload = cli.decoder()?.decode(&code);
            if !*json {
                display::print_payload_card(&payload);
            }

            let mut validator = Validator::new(ReqwestTransport::new(), config);
            let mut session = settle(validator.validate(&code)).await?;
            let mut attempt = 0;
            while session.state() != SessionState::Success && attempt < *retries {
                attempt += 1;
                info!(attempt, state = ?session.state(), "retrying validation");
                let watch = validator.retry().context("no session to retry")?;
                session = settle(watch).await?;
            }

            if *json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                display::print_validation(&session);
            }
            Ok(exit_status(session.state() == SessionState::Success))
        }
        Command::Delete { code } => {
            let code = read_code(code).await?;
            let client = SubscriptionClient::new(ReqwestTransport::new(), cli.client_config()?);
            let session = client.delete_subscription(&code).await;
            display::print_delete(&session);
            Ok(exit_status(session.is_deleted()))
        }
        Command::Scan => {
            scan(&cli).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Seal { plaintext, hex } => {
            let cipher = cli
                .cipher()?
                .context("no key: pass --decryption-key or set QRGATE_DECRYPTION_KEY")?;
            let encoding = if *hex { Encoding::Hex } else { Encoding::Base64 };
            println!("{}", cipher.seal(plaintext, encoding)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Interactive loop: one code per line, then commands until `next`.
async fn scan(cli: &Cli) -> anyhow::Result<()> {
    let decoder = cli.decoder()?;
    let config = cli.client_config()?;
    let client = SubscriptionClient::new(ReqwestTransport::new(), config.clone());
    let mut validator = Validator::new(ReqwestTransport::new(), config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprintln!("Scan a code (or `quit`):");
        let Some(code) = lines.next_line().await? else {
            return Ok(());
        };
        let code = code.trim().to_string();
        if code.is_empty() {
            continue;
        }
        if code == "quit" {
            return Ok(());
        }

        let payload = decoder.decode(&code);
        display::print_payload_card(&payload);
        if payload.is_subscription() {
            show_details(&client, &payload).await;
        }
        let session = settle(validator.validate(&code)).await?;
        display::print_validation(&session);

        loop {
            if payload.is_subscription() {
                eprintln!("[r]etry  [d]elete  [n]ext  [q]uit");
            } else {
                eprintln!("[r]etry  [n]ext  [q]uit");
            }
            let Some(command) = lines.next_line().await? else {
                return Ok(());
            };
            match command.trim() {
                "r" | "retry" => {
                    let watch = validator.retry().context("no session to retry")?;
                    display::print_validation(&settle(watch).await?);
                }
                "d" | "delete" if payload.is_subscription() => {
                    display::print_delete(&client.delete_subscription(&code).await);
                }
                "n" | "next" => {
                    validator.cancel();
                    break;
                }
                "q" | "quit" => return Ok(()),
                other => eprintln!("unknown command: {other}"),
            }
        }
    }
}

async fn settle(mut watch: qrgate_client::SessionWatch) -> anyhow::Result<ValidationSession> {
    match watch.settled().await {
        Some(session) => Ok(session),
        None => bail!("validation session was superseded"),
    }
}

/// Look up the user and subscription behind a subscription token.
async fn show_details<T: qrgate_client::RequestTransport>(
    client: &SubscriptionClient<T>,
    payload: &DecodedPayload,
) {
    let (Some(sub_id), Some(user_id)) = (payload.field("subscriptionId"), payload.field("userId"))
    else {
        return;
    };
    let (user, subscription) = tokio::join!(
        client.fetch_user(user_id),
        client.fetch_subscription(sub_id)
    );
    display::print_user(&user);
    display::print_subscription(&subscription);
}

/// The code argument itself, or stdin when it is `-`.
async fn read_code(arg: &str) -> anyhow::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .context("reading code from stdin")?;
    Ok(buf.trim_end_matches(['\r', '\n']).to_string())
}

fn exit_status(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
