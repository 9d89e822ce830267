//! Masternode coordinator binary
//!
//! Replays contract join/quit events (JSON lines) through the membership
//! event loop, then reports the local masternode state, the payment winner
//! and the instant-send quorum for each requested block hash.

use clap::Parser;
use masternode_coordinator::events::parse_event_lines;
use masternode_coordinator::{
    BlockHash, ChainEvent, ChannelEventSource, LoggingPeerConnector, MasternodeConfig,
    MasternodeManager,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "masternode-coordinator")]
#[command(about = "Masternode registry, payment and quorum coordinator")]
struct Cli {
    /// Path to masternode.toml
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// JSON lines file of join/quit events (stdin when omitted)
    #[arg(short, long, value_name = "FILE")]
    events: Option<PathBuf>,

    /// Block hash to evaluate payment and quorum for (repeatable)
    #[arg(short, long = "block-hash", value_name = "HEX")]
    block_hashes: Vec<BlockHash>,
}

fn read_events(path: Option<&PathBuf>) -> Result<Vec<ChainEvent>, Box<dyn std::error::Error>> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    Ok(parse_event_lines(&content)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = MasternodeConfig::load_from_file(&cli.config)?;
    let events = read_events(cli.events.as_ref())?;

    log::info!("🚀 Starting masternode coordinator for {}", config.node_id);
    log::info!("   listen: {}  quorum: {}", config.listen_addr, config.quorum_size);

    let manager = MasternodeManager::new(config, Arc::new(LoggingPeerConnector));
    let (source, feed) = ChannelEventSource::new(events.len().max(1));
    let handle = manager.start(Arc::new(source));

    log::info!("📥 Replaying {} membership event(s)", events.len());
    for event in events {
        feed.send(event).await?;
    }
    handle.shutdown().await?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Masternodes: {}", manager.registry().size());
    println!("Local state: {}", manager.active_state());

    for block_hash in &cli.block_hashes {
        println!();
        println!("Block {}", block_hash);
        match manager.next_masternode_for_payment(block_hash) {
            Ok(winner) => println!("  💰 payee: {} ({})", winner.id, winner.endpoint),
            Err(e) => println!("  💰 payee: none ({})", e),
        }

        let auth = manager.can_vote_tx_lock(block_hash);
        match auth.rank {
            Some(rank) => println!("  🗳️  local rank {} (lock vote allowed: {})", rank, auth.authorized),
            None => println!("  🗳️  local node not ranked"),
        }

        for entry in manager
            .masternode_scores(block_hash)
            .iter()
            .take(manager.config().quorum_size)
        {
            println!("  #{:<3} {} {}", entry.rank, entry.record.id.short(), entry.score);
        }
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_events_from_file() {
        let id = "0a".repeat(32);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# membership replay").unwrap();
        writeln!(
            file,
            r#"{{"type":"join","id":"{}","endpoint":"10.0.0.7:30303","join_height":9}}"#,
            id
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"type":"quit","id":"{}"}}"#, id).unwrap();

        let events = read_events(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ChainEvent::Quit(_)));
    }

    #[test]
    fn test_read_events_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let err = read_events(Some(&file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("event line 1"));
    }
}
