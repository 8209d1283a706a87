//! opcwire - OPC-UA binary frame inspector
//!
//! Decodes captured frames with the opcwire codec and prints them as labeled
//! trees.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{Config, OutputFormat};
use opcwire_spi::{ByteOrder, ReservedPolicy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "opcwire")]
#[command(about = "Inspect OPC-UA binary frames")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "OPCWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Fail on reserved fields that do not hold their expected value
    #[arg(long, global = true)]
    strict: bool,

    /// Byte order of multi-byte fields (big-endian, little-endian)
    #[arg(long, global = true)]
    byte_order: Option<ByteOrder>,

    /// Maximum nesting of field groups while decoding
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a secure-channel PDU
    Decode {
        /// Frame bytes as hex
        hex: String,

        /// Decode as a client request instead of a server response
        #[arg(long)]
        request: bool,

        /// Decode service payloads as extension objects instead of raw bytes
        #[arg(long)]
        extensible: bool,
    },

    /// Decode a standalone extension object
    Extension {
        /// Object bytes as hex
        hex: String,

        /// The object carries an encoding mask after its type id
        #[arg(long)]
        mask: bool,
    },

    /// List registered discriminators per message family
    Registry,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if self.strict {
            config.codec.reserved_policy = ReservedPolicy::Strict;
        }
        if let Some(byte_order) = self.byte_order {
            config.codec.byte_order = byte_order;
        }
        if let Some(max_depth) = self.max_depth {
            config.codec.max_depth = max_depth;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.no_color {
            config.output.color = false;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    cli.apply_to(&mut config);
    colored::control::set_override(config.output.color);
    tracing::debug!(?config, "configuration loaded");

    let result = match &cli.command {
        Commands::Decode {
            hex,
            request,
            extensible,
        } => commands::decode_pdu(hex, *request, *extensible, &config),
        Commands::Extension { hex, mask } => commands::decode_extension(hex, *mask, &config),
        Commands::Registry => commands::list_registries(&config),
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            std::process::exit(1);
        }
    }
}
