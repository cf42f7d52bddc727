use anyhow::{Context, Result};
use auth_mailer::config::{Config, TelemetryConfig};
use auth_mailer::domain::{Invite, NotificationContent, PasswordReset};
use auth_mailer::{telemetry, ContentComposer, Dispatcher};
use chrono::{Local, NaiveDateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "auth-mailer", version, about = "Compose and send account notifications")]
struct Cli {
    /// Print the composed notification as JSON instead of sending it
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send an invite link to a prospective user
    Invite {
        #[arg(long)]
        to: String,
        #[arg(long)]
        code: String,
        /// Hours until the invite expires
        #[arg(long, default_value_t = 24)]
        valid_hours: i64,
    },
    /// Tell an admin that an invite expired unused
    Expiry {
        #[arg(long)]
        to: String,
        #[arg(long)]
        code: String,
        /// Local expiry time, e.g. 2026-10-19T18:30:00 (defaults to now)
        #[arg(long)]
        expired_at: Option<NaiveDateTime>,
    },
    /// Tell an admin that an invite was used to create an account
    Created {
        #[arg(long)]
        to: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        address: String,
    },
    /// Send a password reset PIN
    Reset {
        #[arg(long)]
        to: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        pin: String,
        /// Minutes until the PIN expires
        #[arg(long, default_value_t = 30)]
        valid_minutes: i64,
    },
    /// Check that the configured transport accepts connections
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    telemetry::init(&TelemetryConfig::from_env());
    let config = Config::from_env()?;

    info!(
        transport = config.transport.transport_type(),
        sender = %config.sender.address,
        "Starting Auth Mailer"
    );

    let composer = ContentComposer::new(config.content.clone());
    let dispatcher = Dispatcher::from_config(&config.transport, &config.sender)?;

    let (recipient, content) = match cli.command {
        Command::Verify => {
            dispatcher.test_connection().await?;
            info!("Transport connection verified");
            return Ok(());
        }
        Command::Invite {
            to,
            code,
            valid_hours,
        } => {
            let now = Local::now().naive_local();
            let valid_till = offset_by(now, TimeDelta::try_hours(valid_hours))
                .context("--valid-hours is out of range")?;
            let invite = Invite {
                code,
                valid_till,
                created: now,
            };
            (to, composer.compose_invite(&invite).await?)
        }
        Command::Expiry {
            to,
            code,
            expired_at,
        } => {
            let expired_at = expired_at.unwrap_or_else(|| Local::now().naive_local());
            let invite = Invite {
                code,
                valid_till: expired_at,
                created: expired_at,
            };
            (to, composer.compose_expiry(&invite).await?)
        }
        Command::Created {
            to,
            code,
            username,
            address,
        } => {
            let now = Local::now().naive_local();
            let invite = Invite {
                code,
                valid_till: now,
                created: now,
            };
            (
                to,
                composer.compose_created(&invite, &username, &address).await?,
            )
        }
        Command::Reset {
            to,
            username,
            pin,
            valid_minutes,
        } => {
            let expiry = offset_by(Utc::now().naive_utc(), TimeDelta::try_minutes(valid_minutes))
                .context("--valid-minutes is out of range")?;
            let reset = PasswordReset {
                username,
                pin,
                expiry,
            };
            (to, composer.compose_reset(&reset).await?)
        }
    };

    if cli.dry_run {
        print_content(&recipient, &content)?;
        return Ok(());
    }

    let receipt = dispatcher.send(&content, &recipient).await?;
    info!(
        transport = receipt.transport,
        message_id = receipt.message_id.as_deref().unwrap_or("-"),
        "Sent notification to {}",
        recipient
    );

    Ok(())
}

/// `start + delta`, or `None` when the delta or the sum is out of range
fn offset_by(start: NaiveDateTime, delta: Option<TimeDelta>) -> Option<NaiveDateTime> {
    delta.and_then(|delta| start.checked_add_signed(delta))
}

fn print_content(recipient: &str, content: &NotificationContent) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&serde_json::json!({
        "to": recipient,
        "content": content,
    }))?;
    println!("{}", rendered);
    Ok(())
}
