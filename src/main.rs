//! Command-line driver for the handshake messenger
//!
//! Every run starts from freshly generated party keys, so commands that send
//! messages perform their own key exchange first.

use clap::{Parser, Subcommand};
use handshake_messenger::{
    protocol::flip_bit, AppConfig, ExchangeResult, KeyStrength, Messenger, MessengerError,
    MessengerResult, PartyId, Transmission,
};
use tracing_subscriber::EnvFilter;

/// Bit offset of the ciphertext, right after the 96-bit nonce
const FIRST_CIPHERTEXT_BIT: usize = 96;

/// Two-party RSA key transport and AES-GCM messaging
#[derive(Parser)]
#[command(name = "handshake-messenger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// RSA key strength: standard, strong or max (overrides MESSENGER_KEY_STRENGTH)
    #[arg(short, long)]
    strength: Option<String>,

    /// Comma-separated party names (overrides MESSENGER_PARTIES)
    #[arg(short, long)]
    parties: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a key exchange and show the session key fingerprint
    Exchange {
        /// Party generating the session key
        initiator: String,

        /// Receiving party (default: the other party of a two-party roster)
        counterpart: Option<String>,
    },

    /// Exchange keys, then encrypt and verify a message
    Send {
        /// Sending party
        sender: String,

        /// Message text
        #[arg(required = true)]
        message: Vec<String>,

        /// Recipient (default: the other party of a two-party roster)
        #[arg(short, long)]
        to: Option<String>,
    },

    /// Send a message, flip one bit of the payload and verify it again
    Tamper {
        /// Sending party
        sender: String,

        /// Message text
        message: String,

        /// Recipient (default: the other party of a two-party roster)
        #[arg(short, long)]
        to: Option<String>,

        /// Bit to invert (default: first ciphertext bit)
        #[arg(short, long, default_value_t = FIRST_CIPHERTEXT_BIT)]
        bit: usize,
    },

    /// First two configured parties: exchange, send both ways, tamper
    Demo,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(cli.command, config) {
        tracing::error!(kind = e.kind(), error = %e, "command failed");
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> MessengerResult<AppConfig> {
    let mut config = AppConfig::from_env()?;

    if let Some(strength) = &cli.strength {
        config.key_strength = KeyStrength::from_str(strength).map_err(MessengerError::Config)?;
    }
    if let Some(parties) = &cli.parties {
        config.parties = parties
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }

    config.validate()?;
    Ok(config)
}

fn run(command: Commands, config: AppConfig) -> MessengerResult<()> {
    println!(
        "Generating {} keys for {} ({}) ...",
        config.key_strength,
        config.parties.join(", "),
        config.key_strength.description()
    );
    let messenger = Messenger::new(config)?;

    match command {
        Commands::Exchange {
            initiator,
            counterpart,
        } => {
            let counterpart = recipient_or_counterpart(&messenger, &initiator, counterpart)?;
            let result = messenger.key_exchange(&initiator, &counterpart)?;
            print_exchange(&result);
        }
        Commands::Send {
            sender,
            message,
            to,
        } => {
            let recipient = recipient_or_counterpart(&messenger, &sender, to)?;
            print_exchange(&messenger.key_exchange(&sender, &recipient)?);

            let sent = messenger.send_message(&sender, &recipient, message.join(" ").as_bytes())?;
            print_transmission(&sent)?;
        }
        Commands::Tamper {
            sender,
            message,
            to,
            bit,
        } => {
            let recipient = recipient_or_counterpart(&messenger, &sender, to)?;
            print_exchange(&messenger.key_exchange(&sender, &recipient)?);
            let sent = messenger.send_message(&sender, &recipient, message.as_bytes())?;
            print_transmission(&sent)?;
            tamper(&messenger, &sent, bit)?;
        }
        Commands::Demo => {
            let (first, second) = demo_pair(messenger.config())?;
            let (first, second) = (first.as_str(), second.as_str());
            print_exchange(&messenger.key_exchange(first, second)?);

            let sent = messenger.send_message(first, second, b"hello")?;
            print_transmission(&sent)?;
            let reply = format!("hi {}", first);
            print_transmission(&messenger.send_message(second, first, reply.as_bytes())?)?;

            tamper(&messenger, &sent, FIRST_CIPHERTEXT_BIT)?;
        }
    }

    Ok(())
}

/// The first two parties of the configured roster, in roster order
fn demo_pair(config: &AppConfig) -> MessengerResult<(PartyId, PartyId)> {
    let mut ids = config.party_ids()?.into_iter();
    match (ids.next(), ids.next()) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(MessengerError::Config(
            "the demo needs at least two parties".to_string(),
        )),
    }
}

fn recipient_or_counterpart(
    messenger: &Messenger,
    sender: &str,
    explicit: Option<String>,
) -> MessengerResult<String> {
    match explicit {
        Some(name) => Ok(name),
        None => Ok(messenger.counterpart_of(sender)?.to_string()),
    }
}

fn tamper(messenger: &Messenger, sent: &Transmission, bit: usize) -> MessengerResult<()> {
    let forged = flip_bit(&sent.message.payload, bit)?;
    let outcome = messenger.submit_tampered(
        sent.message.sender.as_str(),
        sent.message.recipient.as_str(),
        &forged,
    )?;

    println!("\n[Tamper simulation: bit {} flipped]", bit);
    println!("  Forged payload: {}", forged);
    println!("  Result: {}", outcome);
    Ok(())
}

fn print_exchange(result: &ExchangeResult) {
    println!(
        "\nKey exchange {} <-> {}: {:?} (session key {})",
        result.initiator, result.counterpart, result.state, result.key_snippet
    );
}

fn print_transmission(sent: &Transmission) -> MessengerResult<()> {
    println!(
        "\n[{} -> {}] ({})",
        sent.message.sender, sent.message.recipient, sent.message.associated_data
    );
    println!("  Ciphertext (base64): {}", sent.message.payload);
    println!("  Recipient check: {}", sent.outcome);
    println!("  Envelope: {}", sent.message.to_json()?);
    Ok(())
}
