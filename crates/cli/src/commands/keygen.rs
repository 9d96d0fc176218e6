//! Key generation command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use powchain_core::KeyPair;
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct KeygenArgs {
    /// Print the key pair as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Also write the key pair to this JSON file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn keypair_json(keypair: &KeyPair) -> serde_json::Value {
    serde_json::json!({
        "public_key": keypair.public_key.to_base64(),
        "private_key": keypair.private_key().to_base64(),
    })
}

pub fn run(args: KeygenArgs) -> Result<()> {
    let keypair = KeyPair::generate().context("Failed to generate key pair")?;
    let key_json = keypair_json(&keypair);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&key_json)?);
    } else {
        println!("{}", "Generated new key pair:".bold().cyan());
        println!();
        println!(
            "  Public Key (SPKI):    {}",
            keypair.public_key.to_base64().bright_yellow()
        );
        println!(
            "  Private Key (PKCS#8): {}",
            keypair.private_key().to_base64().bright_black()
        );
    }

    if let Some(path) = args.out {
        fs::write(&path, serde_json::to_string_pretty(&key_json)?)
            .with_context(|| format!("Failed to write key file: {}", path.display()))?;
        if !args.json {
            println!();
            println!(
                "{}  Saved to: {}",
                "✓".green().bold(),
                path.display().to_string().bright_black()
            );
            println!();
            println!("{}", "Keep your private key safe!".yellow().bold());
        }
    }

    Ok(())
}
