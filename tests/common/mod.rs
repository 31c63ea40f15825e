//! Shared test utilities: an in-process mock exchange server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tungstenite::Message;

use kerviel::ClientConfig;
use kerviel::config::RateLimitConfig;

/// How long helpers wait before declaring that an expected event never came.
pub const WAIT: Duration = Duration::from_secs(5);

/// One accepted WebSocket connection, remote-controlled by the test.
///
/// Dropping the handle closes the socket, which the client observes as a
/// transport loss.
pub struct MockConnection {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl MockConnection {
    /// Sends a raw text frame to the client.
    pub fn send_text(&self, text: &str) {
        let _ = self.outbound.send(Message::Text(text.to_string().into()));
    }

    /// Waits for the next text frame from the client.
    pub async fn recv_frame(&mut self) -> String {
        tokio::time::timeout(WAIT, self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("connection task ended")
    }

    /// Waits until a frame containing `needle` arrives, skipping others
    /// (e.g. interleaved pings).
    pub async fn expect_frame_containing(&mut self, needle: &str) -> String {
        loop {
            let frame = self.recv_frame().await;
            if frame.contains(needle) {
                return frame;
            }
        }
    }

    /// Asserts that no frame containing `needle` arrives within `window`.
    pub async fn expect_quiet(&mut self, needle: &str, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            match tokio::time::timeout(remaining, self.inbound.recv()).await {
                Ok(Some(frame)) => {
                    assert!(!frame.contains(needle), "unexpected frame: {frame}");
                }
                Ok(None) | Err(_) => return,
            }
        }
    }
}

/// A loopback WebSocket server accepting any number of client connections.
pub struct MockExchange {
    pub url: String,
    conns: mpsc::UnboundedReceiver<MockConnection>,
    accept_task: JoinHandle<()>,
}

impl MockExchange {
    /// Binds a loopback listener and accepts connections until dropped or
    /// [`shutdown`](MockExchange::shutdown).
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind loopback listener");
        let addr = listener.local_addr().expect("listener has no local addr");
        let (conn_tx, conns) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let conn_tx = conn_tx.clone();
                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    let (mut sink, mut read) = ws.split();
                    let (in_tx, inbound) = mpsc::unbounded_channel();
                    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
                    let _ = conn_tx.send(MockConnection {
                        inbound,
                        outbound: out_tx,
                    });
                    loop {
                        tokio::select! {
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = in_tx.send(text.as_str().to_owned());
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                                Some(Ok(_)) => {}
                            },
                            frame = out_rx.recv() => match frame {
                                Some(frame) => {
                                    if sink.send(frame).await.is_err() {
                                        return;
                                    }
                                }
                                // Test dropped its handle: kill the socket.
                                None => return,
                            },
                        }
                    }
                });
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{}", addr.port()),
            conns,
            accept_task,
        }
    }

    /// Waits for the next client connection.
    pub async fn next_conn(&mut self) -> MockConnection {
        tokio::time::timeout(WAIT, self.conns.recv())
            .await
            .expect("timed out waiting for a client connection")
            .expect("accept loop ended")
    }

    /// Asserts that no new connection arrives within `window`.
    pub async fn expect_no_conn(&mut self, window: Duration) {
        if tokio::time::timeout(window, self.conns.recv()).await.is_ok() {
            panic!("unexpected client connection");
        }
    }

    /// Stops accepting; subsequent dials to the old address are refused.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

impl Drop for MockExchange {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Client configuration pointing at the mock server, with timings short
/// enough for tests.
pub fn test_config(url: &str) -> ClientConfig {
    ClientConfig {
        endpoint: url.to_string(),
        reconnect_delay: Duration::from_millis(50),
        max_reconnect_delay: Duration::from_millis(200),
        ..ClientConfig::default()
    }
}

/// A ticker data envelope for `symbol` with the given last price.
pub fn ticker_envelope(symbol: &str, last_price: &str) -> String {
    format!(
        r#"{{"channel":"spot@public.ticker.v3.api.{symbol}",
             "data":{{"s":"{symbol}","c":"{last_price}","p":"150.5","P":"0.33",
                      "h":"45500.0","l":"44100.0","v":"1234.5","q":"55501234.0"}},
             "ts":1718000000000}}"#
    )
}

/// Zero-rate limiter with the given burst, for exhaustion tests.
pub fn burst_only(burst: f64) -> RateLimitConfig {
    RateLimitConfig {
        requests_per_second: 0.0,
        burst_capacity: burst,
    }
}
