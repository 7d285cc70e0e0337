//! Harvests a handful of AEMET stations into the default data directory.
//!
//! ```sh
//! AEMET_API_KEY=... RUST_LOG=info cargo run --example harvest_stations
//! ```
//!
//! Interrupt with Ctrl-C at any time; running it again picks up where it stopped.

use station_harvest::{AemetSource, HarvestConfig, Harvester};
use std::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const STATIONS: [&str; 5] = ["0061X", "0076", "0200E", "0201D", "0222X"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let harvester = Harvester::builder()
        .source(Arc::new(AemetSource::from_env()?))
        .config(HarvestConfig::builder().workers(2).build())
        .build()
        .await?;
    println!("Data root: {}", harvester.data_root().display());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, finishing in-flight commits...");
            on_interrupt.cancel();
        }
    });

    let report = harvester
        .run()
        .stations(STATIONS.iter().map(|s| s.to_string()).collect())
        .years(2009..=2023)
        .cancel(cancel)
        .call()
        .await?;

    print!("{report}");
    if !report.is_success() {
        println!("Re-run to retry the failed work units.");
    }
    Ok(())
}
