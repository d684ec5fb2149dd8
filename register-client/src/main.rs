// solana-matrix-register — client library registering participants in the
//                          referral matrix program
// © 2024 by Composable Foundation
// © 2025 by Michał Nazarewicz <mina86@mina86.com>
//
// This program is free software; you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation; either version 2 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program; if not, see <https://www.gnu.org/licenses/>.

use core::str::FromStr;
use std::path::PathBuf;
use std::process::ExitCode;

use matrix_register::cache::FileCache;
use matrix_register::lookup_table::{Orchestrator, RpcTableService};
use matrix_register::submit::Submitter;
use matrix_register::{Config, Confirmation, Outcome, Registrar};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::signer::Signer;


/// Deposit used when none is given on the command line.
const DEFAULT_DEPOSIT: u64 = 100_000_000;

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;


type Result<T = (), E = Error> = core::result::Result<T, E>;


/// `usage: register-cli <keypair> <config> <referrer> [<deposit-sol>]`
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}


struct Args {
    keypair: PathBuf,
    config: PathBuf,
    referrer: Pubkey,
    deposit: u64,
}


/// Executes the program.
async fn run() -> Result {
    let args = parse_args()?;
    let keypair = solana_sdk::signer::keypair::read_keypair_file(&args.keypair)?;
    let config = Config::from_file(&args.config)?;
    tracing::info!(
        wallet = %keypair.pubkey(),
        referrer = %args.referrer,
        deposit = args.deposit,
        cluster = ?config.cluster,
        "registering"
    );

    let client = RpcClient::new_with_commitment(
        config.rpc_url.clone(),
        CommitmentConfig::confirmed(),
    );
    let cache = FileCache::new(config.cache_dir.clone());

    #[cfg(feature = "relay")]
    let relay = config.active_relay().map(matrix_register::relay::JitoRelay::new);
    let submitter = Submitter::new(&client);
    #[cfg(feature = "relay")]
    let submitter = match &relay {
        Some(relay) => submitter.with_relay(relay),
        None => submitter,
    };

    let service =
        RpcTableService::new(&submitter, &keypair, config.compute.unit_price);
    let tables = Orchestrator::new(&service, &cache);
    let registrar = Registrar::new(&config, &submitter, tables, &keypair);

    match registrar.register(&args.referrer, args.deposit).await? {
        Outcome::AlreadyRegistered(record) => {
            println!(
                "{} already registered (depth {})",
                record.owner_wallet, record.depth
            );
            Ok(())
        }
        Outcome::Submitted { variant, table, confirmation } => {
            println!("Slot: {variant}");
            println!("Lookup table: {table}");
            println!("Signature: {}", confirmation.signature());
            match confirmation {
                Confirmation::Confirmed { .. } => Ok(()),
                Confirmation::Unconfirmed { signature } => {
                    Err(Error::Unconfirmed(signature.to_string()))
                }
            }
        }
    }
}


/// Parses the command line arguments.
fn parse_args() -> Result<Args> {
    let mut args = std::env::args_os().skip(1);
    let keypair = args.next().ok_or(Error::Usage)?.into();
    let config = args.next().ok_or(Error::Usage)?.into();
    let referrer = args.next().ok_or(Error::Usage)?;
    let referrer = referrer
        .to_str()
        .and_then(|referrer| Pubkey::from_str(referrer).ok())
        .ok_or(Error::Usage)?;
    let deposit = match args.next() {
        None => DEFAULT_DEPOSIT,
        Some(sol) => sol.to_str().and_then(parse_sol).ok_or(Error::Usage)?,
    };
    if args.next().is_some() {
        return Err(Error::Usage);
    }
    Ok(Args { keypair, config, referrer, deposit })
}


/// Parses decimal SOL amount into lamports.
fn parse_sol(sol: &str) -> Option<u64> {
    let (whole, frac) = sol.split_once('.').unwrap_or((sol, ""));
    if frac.len() > 9 || (whole.is_empty() && frac.is_empty()) {
        return None;
    }
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !digits(frac) {
        return None;
    }
    let whole = if whole.is_empty() { 0 } else { u64::from_str(whole).ok()? };
    let frac = if frac.is_empty() {
        0
    } else {
        u64::from_str(frac).ok()? * 10u64.pow(9 - frac.len() as u32)
    };
    whole.checked_mul(LAMPORTS_PER_SOL)?.checked_add(frac)
}


#[derive(derive_more::From, derive_more::Display)]
enum Error {
    #[display(
        "usage: register-cli <keypair> <config> <referrer> [<deposit-sol>]"
    )]
    #[from(ignore)]
    Usage,
    #[display("transaction {_0} not confirmed; check it later")]
    #[from(ignore)]
    Unconfirmed(String),
    Register(matrix_register::Error),
    Box(Box<dyn std::error::Error>),
}


#[test]
fn test_parse_sol() {
    assert_eq!(Some(LAMPORTS_PER_SOL), parse_sol("1"));
    assert_eq!(Some(100_000_000), parse_sol("0.1"));
    assert_eq!(Some(100_000_000), parse_sol(".1"));
    assert_eq!(Some(2_500_000_001), parse_sol("2.500000001"));
    assert_eq!(None, parse_sol("0.0000000001"));
    assert_eq!(None, parse_sol("-1"));
    assert_eq!(None, parse_sol("."));
    assert_eq!(None, parse_sol("1e9"));
}
