//! Feed watcher: connects to the exchange, subscribes to the configured
//! symbols, and logs market-data updates until interrupted.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use kerviel::StreamClient;
use kerviel::config::fetch_config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app_config = fetch_config().expect("Failed to load configuration.");
    let symbols = if app_config.mexc.symbols.is_empty() {
        vec!["BTCUSDT".to_string()]
    } else {
        app_config.mexc.symbols.clone()
    };

    let (client, mut streams) = StreamClient::new(app_config.mexc.client_config());
    let cancel = CancellationToken::new();

    client.connect(&cancel).await.expect("Failed to connect.");
    client
        .subscribe_tickers(&cancel, &symbols)
        .await
        .expect("Failed to subscribe.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            ticker = streams.tickers.recv() => {
                let Some(ticker) = ticker else { break };
                info!(
                    symbol = ticker.symbol,
                    last = ticker.last_price,
                    change_pct = ticker.price_change_pct,
                    high = ticker.high,
                    low = ticker.low,
                    volume = ticker.volume,
                    "Ticker"
                );
            }
            err = streams.errors.recv() => {
                let Some(err) = err else { break };
                error!(error = %err, "Client error");
                break;
            }
        }
    }

    client.close().await;
}
