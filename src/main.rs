use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::PathBuf;

use algo_hd_core::crypto::address::decode_address;
use algo_hd_core::crypto::port::DerivationType;
use algo_hd_core::crypto::XhdKeyDerivation;
use algo_hd_core::tx::{AccountState, AlgosTransactionSendDraft, AssetHolding, TransactionAmountCalculator, TransactionParams};
use algo_hd_core::wallet::keygen::{entropy_from_mnemonic, generate_entropy, mnemonic_from_entropy};
use algo_hd_core::wallet::{derivation_path, HdAddressDeriver, HdWalletAddressDetail, Wallet};
use algo_hd_core::CoreConfig;

#[derive(Parser)]
#[command(name = "algo-hd-core", version, about = "Algorand HD wallet key and transaction tools")]
struct Cli {
    /// JSON config file; ALGO_HD_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive an address from a 24-word mnemonic (read from stdin when omitted)
    Derive {
        #[arg(long)]
        mnemonic: Option<String>,
        #[arg(long, default_value_t = 0)]
        account: u32,
        #[arg(long, default_value_t = 0)]
        change: u32,
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// peikert or khovratovich; defaults to the configured type
        #[arg(long)]
        derivation_type: Option<DerivationType>,
    },
    /// Print the BIP-44 path of a coordinate
    Path {
        #[arg(long, default_value_t = 0)]
        account: u32,
        #[arg(long, default_value_t = 0)]
        change: u32,
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
    /// Check an address checksum
    ValidateAddress { address: String },
    /// Generate a fresh 24-word mnemonic
    NewMnemonic,
    /// Amount a payment would move after fees and minimum balance
    Amount {
        #[arg(long)]
        balance: u64,
        /// Requested amount; defaults to the full balance with --max
        #[arg(long)]
        amount: Option<i64>,
        #[arg(long)]
        max: bool,
        /// Number of assets the sender holds
        #[arg(long, default_value_t = 0)]
        assets: u64,
        #[arg(long)]
        rekeyed_to: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<CoreConfig> {
    let base = match path {
        Some(path) => CoreConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CoreConfig::default(),
    };
    let config = base.with_overrides(|key| std::env::var(key).ok())?;
    config.apply_logging();
    Ok(config)
}

fn read_mnemonic(arg: Option<String>) -> Result<String> {
    if let Some(phrase) = arg {
        return Ok(phrase);
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("failed to read mnemonic from stdin")?;
    if line.trim().is_empty() {
        bail!("no mnemonic given");
    }
    Ok(line)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Derive { mnemonic, account, change, index, derivation_type } => {
            let phrase = zeroize::Zeroizing::new(read_mnemonic(mnemonic)?);
            let entropy = entropy_from_mnemonic(&phrase)?;
            let wallet = Wallet::with_id("cli", "cli", entropy);

            let mut detail = HdWalletAddressDetail::new(wallet.id.clone(), account, change, index);
            detail.derivation_type = derivation_type.unwrap_or(config.derivation_type);
            let derived = HdAddressDeriver::new(XhdKeyDerivation::new()).derive_address(&wallet, &detail)?;
            let path = detail.derivation_path()?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "address": derived.address,
                        "public_key": hex::encode(derived.public_key),
                        "path": path,
                    })
                );
            } else {
                println!("Path:       {}", path);
                println!("Address:    {}", derived.address);
                println!("Public key: {}", hex::encode(derived.public_key));
            }
        }
        Command::Path { account, change, index } => {
            let path = derivation_path(account, change, index)?;
            if cli.json {
                println!("{}", serde_json::json!({ "path": path }));
            } else {
                println!("{}", path);
            }
        }
        Command::ValidateAddress { address } => {
            let result = decode_address(address.trim());
            if cli.json {
                let body = match &result {
                    Ok(key) => serde_json::json!({ "valid": true, "public_key": hex::encode(key) }),
                    Err(e) => serde_json::json!({ "valid": false, "reason": e.to_string() }),
                };
                println!("{}", body);
            }
            match result {
                Ok(_) if !cli.json => println!("valid"),
                Ok(_) => {}
                Err(e) => {
                    if !cli.json {
                        eprintln!("invalid address: {}", e);
                    }
                    std::process::exit(1);
                }
            }
        }
        Command::NewMnemonic => {
            let entropy = generate_entropy()?;
            let phrase = mnemonic_from_entropy(&entropy)?;
            if cli.json {
                println!("{}", serde_json::json!({ "mnemonic": phrase.as_str() }));
            } else {
                println!("{}", phrase.as_str());
            }
        }
        Command::Amount { balance, amount, max, assets, rekeyed_to } => {
            let mut from = AccountState::new("", balance);
            from.auth_address = rekeyed_to;
            from.assets = (0..assets)
                .map(|asset_id| AssetHolding { asset_id, amount: 0, is_frozen: false })
                .collect();

            let mut draft = AlgosTransactionSendDraft::new(from);
            draft.is_max_transaction = max;
            draft.amount = amount.or(max.then_some(balance as i64));

            let params = TransactionParams {
                fee: 0,
                min_fee: config.min_fee,
                last_round: 0,
                genesis_id: config.network.genesis_id().to_string(),
                genesis_hash: Vec::new(),
            };
            let calculation = TransactionAmountCalculator::new(&params, None).calculate(&draft);

            if cli.json {
                println!("{}", serde_json::to_string(&calculation)?);
            } else {
                println!("Amount:          {}", calculation.amount);
                println!("Fee:             {}", calculation.fee);
                println!("Minimum balance: {}", calculation.minimum_account_balance);
                println!("Close account:   {}", calculation.is_max_transaction);
            }
        }
    }

    Ok(())
}
