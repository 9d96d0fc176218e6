//! Reference scenario command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use powchain_chain::{Direction, LedgerConfig, Scenario};
use powchain_core::PublicKey;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct DemoArgs {
    /// Leading zero hex digits required of each block hash
    #[arg(short, long)]
    difficulty: Option<u32>,

    /// Mining threads (1 = sequential search)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Give up on a block after this many nonces
    #[arg(long)]
    max_attempts: Option<u64>,

    /// Ledger configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the resulting chain as JSON
    #[arg(long)]
    json: bool,
}

fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    let Some(path) = path else {
        return Ok(LedgerConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}

fn resolve_config(args: &DemoArgs) -> Result<LedgerConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(threads) = args.threads {
        config.mining.threads = threads;
    }
    if args.max_attempts.is_some() {
        config.mining.max_attempts = args.max_attempts;
    }
    Ok(config)
}

fn owner_name<'a>(scenario: &'a Scenario, key: &PublicKey) -> &'a str {
    scenario
        .wallets()
        .iter()
        .find(|wallet| wallet.owns(key))
        .map(|wallet| wallet.name())
        .unwrap_or("InitialUser")
}

pub fn run(args: DemoArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    tracing::info!(
        difficulty = config.difficulty,
        threads = config.mining.threads,
        "running reference scenario"
    );

    let scenario = Scenario::reference(config).context("Scenario failed")?;

    if args.json {
        print_json(&scenario)
    } else {
        print_text(&scenario);
        Ok(())
    }
}

fn print_text(scenario: &Scenario) {
    let ledger = scenario.ledger();

    for block in ledger.blocks() {
        println!("{}", format!("Block #{}", block.index()).bold().cyan());
        println!("  Timestamp:     {}", block.timestamp().to_rfc3339());
        match block.previous_hash() {
            Some(prev) => println!("  Previous Hash: {}", prev.to_hex().bright_black()),
            None => println!("  Previous Hash: {}", "(genesis)".bright_black()),
        }
        println!("  Merkle Root:   {}", block.merkle_root().to_hex().bright_black());
        println!("  Hash:          {}", block.hash().to_hex().bright_yellow());
        println!("  Nonce:         {}", block.nonce());
        println!("  Transactions:  {}", block.tx_count());

        for tx in block.transactions() {
            let status = if tx.validate_signature() {
                "✓".green().bold()
            } else {
                "✗".red().bold()
            };
            println!(
                "    {} {} -> {}: {}",
                status,
                owner_name(scenario, tx.owner_public_key()),
                owner_name(scenario, tx.receiver_public_key()),
                tx.amount().to_string().bright_yellow()
            );
        }
        println!();
    }

    match ledger.verify_chain() {
        Ok(()) => println!("{} Chain is valid", "✓".green().bold()),
        Err(e) => println!("{} Chain is invalid: {}", "✗".red().bold(), e),
    }
    println!();

    println!("{}", "Balances".bold().cyan());
    for wallet in scenario.wallets() {
        println!(
            "  {:<8} {}",
            wallet.name(),
            wallet.balance(ledger).to_string().bright_yellow()
        );
    }
    println!();

    println!("{}", "History".bold().cyan());
    for wallet in scenario.wallets() {
        println!("  {}", wallet.name().bold());
        for entry in wallet.history(ledger) {
            let line = match entry.direction {
                Direction::Sent => format!("-{}", entry.amount).red(),
                Direction::Received => format!("+{}", entry.amount).green(),
            };
            println!("    block {}: {}", entry.block_index, line);
        }
    }
}

fn print_json(scenario: &Scenario) -> Result<()> {
    let ledger = scenario.ledger();

    let wallets: Vec<_> = scenario
        .wallets()
        .iter()
        .map(|wallet| {
            let history: Vec<_> = wallet
                .history(ledger)
                .into_iter()
                .map(|entry| {
                    serde_json::json!({
                        "block_index": entry.block_index,
                        "direction": match entry.direction {
                            Direction::Sent => "sent",
                            Direction::Received => "received",
                        },
                        "amount": entry.amount,
                    })
                })
                .collect();
            serde_json::json!({
                "name": wallet.name(),
                "balance": wallet.balance(ledger),
                "history": history,
            })
        })
        .collect();

    let output = serde_json::json!({
        "difficulty": ledger.difficulty(),
        "valid": ledger.validate_chain(),
        "blocks": ledger.blocks(),
        "wallets": wallets,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
