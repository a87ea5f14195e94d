//! CLI entry point for `mailfile`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mailfile::config::Config;
use mailfile::model::{EmailAddress, Message};
use mailfile::search::PasswordExtractor;

#[derive(Parser)]
#[command(
    name = "mailfile",
    version,
    about = "Decode .eml and Outlook .msg files into one message tree"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a decoded message
    Show {
        /// .eml or .msg file
        path: PathBuf,
        /// Print the message tree as JSON
        #[arg(long)]
        json: bool,
        /// Skip the password scan
        #[arg(long)]
        no_passwords: bool,
    },
    /// Extract attachments and embedded resources
    Attachments {
        path: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = mailfile::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Show {
            path,
            json,
            no_passwords,
        } => cmd_show(&path, json, !no_passwords, &config),
        Commands::Attachments { path, output } => cmd_attachments(&path, &output, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_file = mailfile::config::log_file_path(config);
    let log_dir = log_file.parent().map(Path::to_path_buf).unwrap_or_default();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_file.file_name().unwrap_or_default();
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_show(path: &Path, json: bool, passwords: bool, config: &Config) -> anyhow::Result<()> {
    let extractor = (passwords && config.passwords.enabled)
        .then(|| PasswordExtractor::new(&config.passwords))
        .transpose()?;
    let msg =
        mailfile::parser::parse_path_with_passwords(path, &config.decode, extractor.as_ref())?;

    if json {
        println!("{}", mailfile::export::json::to_json(&msg)?);
    } else {
        print_message(&msg, 0);
    }
    Ok(())
}

fn cmd_attachments(path: &Path, output: &Path, config: &Config) -> anyhow::Result<()> {
    let msg = mailfile::parser::parse_path(path, &config.decode)?;
    let paths = mailfile::export::attachment::export_attachments(&msg, output)?;

    if paths.is_empty() {
        println!("  No attachments found.");
    } else {
        println!(
            "  Extracted {} file(s) to {}",
            paths.len(),
            output.display()
        );
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailfile", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn join_addresses(list: &[EmailAddress]) -> String {
    list.iter()
        .map(EmailAddress::display)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print a message and its sub-messages as an indented table.
fn print_message(msg: &Message, level: usize) {
    use humansize::{format_size, BINARY};

    let pad = "  ".repeat(level + 1);
    let row = |label: &str, value: &str| {
        if !value.is_empty() {
            println!("{pad}{label:<14} {value}");
        }
    };

    println!();
    row("Subject:", &msg.subject);
    row("Date:", &msg.date);
    row("Message-ID:", &msg.message_id);
    row("From:", &join_addresses(&msg.from));
    if let Some(sender) = &msg.sender {
        row("Sender:", &sender.display());
    }
    row("Reply-To:", &join_addresses(&msg.reply_to));
    row("To:", &join_addresses(&msg.to));
    row("Cc:", &join_addresses(&msg.cc));
    row("Bcc:", &join_addresses(&msg.bcc));
    row("Sender IP:", msg.sender_address.as_deref().unwrap_or_default());
    row("Content-Type:", &msg.content_type);
    row("Passwords:", &msg.passwords.join(", "));

    for att in &msg.attachments {
        println!(
            "{pad}{:<14} {} ({}, {})",
            "Attachment:",
            att.filename,
            att.content_type,
            format_size(att.size(), BINARY)
        );
    }
    for emb in &msg.embeddeds {
        println!(
            "{pad}{:<14} cid:{} ({}, {})",
            "Embedded:",
            emb.content_id,
            emb.content_type,
            format_size(emb.size(), BINARY)
        );
    }

    if let Some(body) = msg.body_text() {
        println!();
        for line in body.lines() {
            println!("{pad}{line}");
        }
    }

    for sub in &msg.sub_messages {
        println!();
        println!("{pad}--- Sub-message ---");
        print_message(sub, level + 1);
    }
}
