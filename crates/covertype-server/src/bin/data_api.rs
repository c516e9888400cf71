//! Batch data API server
//!
//! Usage: `data-api [config.ron]` (default `config/data_api.ron`).

use covertype_core::{init_logging, Dataset, Distributor, LedgerStore, SampleRng, SystemClock};
use covertype_server::config::load_or_default;
use covertype_server::{data_api, http, DataApiConfig, DataApiState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("covertype_server=info,covertype_core=info,warn");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/data_api.ron".to_string());
    let config: DataApiConfig = load_or_default(&config_path)?;

    let dataset = Dataset::from_csv_path(&config.dataset_path)?;
    info!(path = %config.dataset_path.display(), rows = dataset.len(), "loaded dataset");
    let ledger = LedgerStore::open(&config.ledger_path)?;
    let distributor = Distributor::new(
        dataset,
        ledger,
        SystemClock,
        SampleRng::from_seed(config.seed),
    );
    let state = Arc::new(DataApiState::new(distributor));

    let addr: SocketAddr = config.listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);

    http::serve(listener, move |req| {
        let state = state.clone();
        async move {
            let (parts, _) = req.into_parts();
            data_api::route(&state, &parts.method, &parts.uri).await
        }
    })
    .await;

    Ok(())
}
