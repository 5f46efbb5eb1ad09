//! Swap Escrow - command line entry point
//!
//! Thin wrapper over the library: every subcommand loads configuration,
//! builds a [`SwapContext`] and runs one lifecycle call.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::str::FromStr;
use swap_escrow::config::Config;
use swap_escrow::metrics::metrics;
use swap_escrow::swap::lifecycle::{cancel_and_close_swap, claim_and_close_swap, deposit_swap};
use swap_escrow::swap::{derive_identity, require_state, UserSwapDetails};
use swap_escrow::tx_builder::DispatchOptions;
use swap_escrow::wallet::WalletManager;
use swap_escrow::{SwapContext, SwapItem};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "swap.toml", env = "SWAP_CONFIG")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Priority fee in micro-lamports per compute unit
    #[arg(long, global = true)]
    priority_fee: Option<u64>,

    /// Submit without preflight simulation
    #[arg(long, global = true)]
    skip_simulation: bool,

    /// Return once submitted, without waiting for confirmation
    #[arg(long, global = true)]
    skip_confirmation: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the swap address of an item list
    Identity {
        /// JSON file with an array of items
        #[arg(long)]
        items: PathBuf,
        #[arg(long, default_value = "0000")]
        pre_seed: String,
    },
    /// Print the on-ledger state of a swap
    Status {
        address: String,
        /// Also print the per-party view for this user
        #[arg(long)]
        user: Option<String>,
    },
    /// Escrow every pending item owned by the wallet
    Deposit { address: String },
    /// Distribute escrowed items and close the swap
    Claim {
        address: String,
        #[arg(long)]
        skip_finalize: bool,
    },
    /// Return escrowed items and close the swap
    Cancel {
        address: String,
        #[arg(long)]
        skip_finalize: bool,
    },
}

/// Item as written in the `identity` input file
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ItemSpec {
    Token {
        mint: String,
        owner: String,
        destinary: String,
        amount: u64,
    },
    Nft {
        mint: String,
        owner: String,
        destinary: String,
        collection: Option<String>,
    },
    CompressedNft {
        asset_id: String,
        merkle_tree: String,
        index: u64,
        owner: String,
        destinary: String,
        collection: Option<String>,
    },
}

fn parse_key(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("Invalid {field} '{value}'"))
}

impl ItemSpec {
    fn into_item(self) -> Result<SwapItem> {
        let item = match self {
            ItemSpec::Token {
                mint,
                owner,
                destinary,
                amount,
            } => SwapItem::token(
                parse_key("mint", &mint)?,
                parse_key("owner", &owner)?,
                parse_key("destinary", &destinary)?,
                amount,
            ),
            ItemSpec::Nft {
                mint,
                owner,
                destinary,
                collection,
            } => {
                let item = SwapItem::nft(
                    parse_key("mint", &mint)?,
                    parse_key("owner", &owner)?,
                    parse_key("destinary", &destinary)?,
                );
                match collection {
                    Some(c) => item.with_collection(parse_key("collection", &c)?),
                    None => item,
                }
            }
            ItemSpec::CompressedNft {
                asset_id,
                merkle_tree,
                index,
                owner,
                destinary,
                collection,
            } => {
                let item = SwapItem::compressed_nft(
                    parse_key("asset_id", &asset_id)?,
                    parse_key("merkle_tree", &merkle_tree)?,
                    index,
                    parse_key("owner", &owner)?,
                    parse_key("destinary", &destinary)?,
                );
                match collection {
                    Some(c) => item.with_collection(parse_key("collection", &c)?),
                    None => item,
                }
            }
        };
        Ok(item)
    }
}

fn item_json(item: &SwapItem) -> serde_json::Value {
    json!({
        "mint": item.mint.to_string(),
        "owner": item.owner.to_string(),
        "destinary": item.destinary.to_string(),
        "amount": item.amount,
        "is_nft": item.is_nft,
        "is_compressed": item.is_compressed,
        "status": format!("{:?}", item.status),
    })
}

fn details_json(details: &UserSwapDetails) -> serde_json::Value {
    let list = |items: &[SwapItem]| items.iter().map(item_json).collect::<Vec<_>>();
    json!({
        "nft_to_deposit": list(&details.nft_to_deposit),
        "nft_deposited": list(&details.nft_deposited),
        "nft_to_receive": list(&details.nft_to_receive),
        "nft_received": list(&details.nft_received),
        "nft_canceled": list(&details.nft_canceled),
        "sol_to_deposit": list(&details.sol_to_deposit),
        "sol_deposited": list(&details.sol_deposited),
        "sol_to_claim": list(&details.sol_to_claim),
        "sol_claimed": list(&details.sol_claimed),
        "sol_canceled": list(&details.sol_canceled),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json);

    let config = Config::load(Some(args.config.as_path()))
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let mut options = config.dispatch_options();
    if args.priority_fee.is_some() {
        options.priority_fee = args.priority_fee;
    }
    options.skip_simulation |= args.skip_simulation;
    options.skip_confirmation |= args.skip_confirmation;

    run(args.command, &config, &options).await?;

    if config.monitoring.enable_metrics {
        print!("{}", metrics().render()?);
    }
    Ok(())
}

async fn run(command: Command, config: &Config, options: &DispatchOptions) -> Result<()> {
    if let Command::Identity { items, pre_seed } = &command {
        let raw = std::fs::read_to_string(items)
            .with_context(|| format!("Failed to read {}", items.display()))?;
        let specs: Vec<ItemSpec> = serde_json::from_str(&raw).context("Invalid item list")?;
        let items = specs
            .into_iter()
            .map(ItemSpec::into_item)
            .collect::<Result<Vec<_>>>()?;
        let identity = derive_identity(pre_seed, &items, &config.program_id()?)?;
        let seed = String::from_utf8_lossy(&identity.seed).into_owned();
        println!(
            "{}",
            json!({
                "address": identity.address.to_string(),
                "seed": seed,
                "bump": identity.bump,
            })
        );
        return Ok(());
    }

    let ctx = SwapContext::from_config(config)?;

    if let Command::Status { address, user } = &command {
        let address = parse_key("address", address)?;
        let state = require_state(&ctx, &address).await?;
        let mut out = json!({
            "address": address.to_string(),
            "status": state.status().to_string(),
            "initializer": state.data.initializer.to_string(),
            "items": state.items().iter().map(item_json).collect::<Vec<_>>(),
        });
        if let Some(user) = user {
            let user = parse_key("user", user)?;
            out["user"] = details_json(&UserSwapDetails::from_state(&state, &user));
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let wallet = WalletManager::from_file(config.keypair_path()).context("Failed to load wallet")?;
    info!(wallet = %wallet.pubkey(), "Wallet loaded");

    let signatures = match command {
        Command::Deposit { address } => {
            deposit_swap(&ctx, &parse_key("address", &address)?, wallet.signer(), options).await?
        }
        Command::Claim {
            address,
            skip_finalize,
        } => {
            let address = parse_key("address", &address)?;
            claim_and_close_swap(&ctx, &address, wallet.signer(), skip_finalize, options).await?
        }
        Command::Cancel {
            address,
            skip_finalize,
        } => {
            let address = parse_key("address", &address)?;
            cancel_and_close_swap(&ctx, &address, wallet.signer(), skip_finalize, options).await?
        }
        Command::Identity { .. } | Command::Status { .. } => return Ok(()),
    };

    for signature in signatures {
        println!("{signature}");
    }
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "swap_escrow=info,warn".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
