//! Ledger demo node
//!
//! Starts the single-writer ledger service on a fresh genesis, makes a
//! payment, mines a few blocks on top of the best fork and reports state.
//!
//! Usage: `ledger-node [config.json]`

use log::{info, warn};
use utxo_ledger::consensus::{Block, BlockChain};
use utxo_ledger::constants::COIN;
use utxo_ledger::crypto::PrivateKey;
use utxo_ledger::mining::BlockAssembler;
use utxo_ledger::service::LedgerService;
use utxo_ledger::storage::TxOutput;
use utxo_ledger::validation::Transaction;
use utxo_ledger::LedgerConfig;

const DEMO_BLOCKS: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => LedgerConfig::from_file(&path)?,
        None => LedgerConfig::default(),
    };
    info!(
        "Config: cut_off_age={} coinbase_reward={}",
        config.cut_off_age, config.coinbase_reward
    );

    let founder = PrivateKey::generate();
    let recipient = PrivateKey::generate();

    let genesis = Block::genesis(Transaction::coinbase(config.coinbase_reward, founder.public_key()));
    let founder_utxo = genesis.coinbase().utxo_ref(0);
    info!("Genesis {}", genesis.hash());

    let (ledger, task) = LedgerService::spawn(BlockChain::with_config(genesis, &config)?);

    // a reward below one coin is paid out whole, with no change output
    let amount = COIN.min(config.coinbase_reward);
    let change = config.coinbase_reward - amount;
    let mut outputs = vec![TxOutput::new(amount, recipient.public_key())];
    if change > 0 {
        outputs.push(TxOutput::new(change, founder.public_key()));
    }
    let payment = Transaction::signed(&[founder_utxo], outputs, &founder);
    let payment_hash = payment.hash();
    ledger.add_transaction(payment).await?;

    let miner = PrivateKey::generate().public_key();
    let assembler = BlockAssembler::new(miner.clone(), config.coinbase_reward);
    for _ in 0..DEMO_BLOCKS {
        let block = ledger.assemble_block(assembler.clone()).await?;
        let hash = block.hash();
        if !ledger.add_block(block).await? {
            warn!("Assembled block {} was rejected", hash);
        }
    }

    let stats = ledger.stats().await?;
    let snapshot = ledger.best_utxo_pool().await?;
    info!(
        "Height {} | tip {} | {} UTXOs | {} forks | {} pending",
        stats.height, stats.tip_hash, stats.utxo_count, stats.fork_count, stats.pending_transactions
    );
    if ledger
        .pending_transactions()
        .await?
        .iter()
        .any(|tx| tx.hash() == payment_hash)
    {
        warn!("Payment {} was never included in a block", payment_hash.short());
    }
    info!(
        "Balances: founder {} | recipient {} | miner {}",
        snapshot.balance_of(&founder.public_key()),
        snapshot.balance_of(&recipient.public_key()),
        snapshot.balance_of(&miner)
    );

    drop(ledger);
    task.await?;
    Ok(())
}
