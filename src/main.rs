mod cooldown;
mod dlq;
mod domain;
mod engine;
mod games;
mod ingestion;
mod ledger;
mod replies;
mod store;

use std::collections::HashSet;
use std::{env, fs::File, path::Path};

use tracing::Level;

use crate::cooldown::SystemClock;
use crate::dlq::StdErrDLQ;
use crate::engine::Engine;
use crate::games::StdDraws;
use crate::ingestion::CsvReader;
use crate::ledger::Ledger;
use crate::replies::StdOutReplies;
use crate::store::SqliteStore;

#[tokio::main] // using Tokio runtime for async
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    // Set up the components
    let mut args = env::args();

    let script_path = args.nth(1).expect("No command script path was provided");
    let script_path = Path::new(&script_path);
    let script = File::open(script_path)?;

    let db_path = env::var("CHIPS_DB").unwrap_or_else(|_| "chips.sqlite".to_string());
    let owners_raw = env::var("CHIPS_OWNERS").unwrap_or_default();
    let owners: HashSet<String> = owners_raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    let draws = match env::var("CHIPS_SEED") {
        Ok(seed) => StdDraws::seeded(seed.parse()?),
        Err(_) => StdDraws::from_entropy(),
    };

    let store = SqliteStore::open(&db_path)?;
    let ledger = Ledger::new(store, draws, SystemClock);
    let ingestion = CsvReader::new(script)?;

    // Initialize engine with injected components
    let mut engine = Engine::new(
        ingestion,
        StdOutReplies::default(),
        StdErrDLQ::default(),
        ledger,
        owners,
    );

    engine.process().await?;
    engine.flush()?;

    Ok(())
}
