//! Serialization tests for wire request types and typed data models.

use kerviel::models::{
    BookTicker, Candle, CandleInterval, ChannelKind, Depth, Envelope, PingRequest,
    SubscribeRequest, Subscription, SubscriptionAck, Ticker, Trade, TradeSide,
    UnsubscribeRequest,
};

#[test]
fn channel_kind_wire_names() {
    assert_eq!(ChannelKind::Ticker.as_str(), "ticker");
    assert_eq!(ChannelKind::Candle.as_str(), "kline");
    assert_eq!(ChannelKind::Trade.as_str(), "deals");
    assert_eq!(ChannelKind::Depth.as_str(), "depth");
    assert_eq!(ChannelKind::BookTicker.as_str(), "bookTicker");
}

#[test]
fn subscribe_request_serializes() {
    let channels = vec![
        Subscription::ticker("BTCUSDT").channel().to_string(),
        Subscription::ticker("ETHUSDT").channel().to_string(),
    ];
    let request = SubscribeRequest::new(&channels);

    let json = serde_json::to_string(&request).expect("Failed to serialize subscribe request");
    let value: serde_json::Value =
        serde_json::from_str(&json).expect("Failed to parse serialized JSON");

    assert_eq!(value["method"], "SUBSCRIPTION");
    assert_eq!(value["params"][0], "spot@public.ticker.v3.api.BTCUSDT");
    assert_eq!(value["params"][1], "spot@public.ticker.v3.api.ETHUSDT");
}

#[test]
fn unsubscribe_request_serializes() {
    let channels = vec![
        Subscription::candle("BTCUSDT", CandleInterval::Hour1)
            .channel()
            .to_string(),
    ];
    let request = UnsubscribeRequest::new(&channels);

    let json = serde_json::to_string(&request).expect("Failed to serialize unsubscribe request");
    let value: serde_json::Value =
        serde_json::from_str(&json).expect("Failed to parse serialized JSON");

    assert_eq!(value["method"], "UNSUBSCRIPTION");
    assert_eq!(value["params"][0], "spot@public.kline.v3.api.BTCUSDT.1h");
}

#[test]
fn ping_request_serializes() {
    let json =
        serde_json::to_string(&PingRequest::new()).expect("Failed to serialize ping request");
    let value: serde_json::Value =
        serde_json::from_str(&json).expect("Failed to parse serialized JSON");

    assert_eq!(value["method"], "PING");
}

#[test]
fn subscription_ack_deserializes() {
    let json = r#"{"e":"sub.success","c":"spot@public.ticker.v3.api.BTCUSDT"}"#;
    let ack: SubscriptionAck = serde_json::from_str(json).expect("Failed to deserialize ack");

    assert_eq!(ack.event, "sub.success");
    assert_eq!(ack.channel, "spot@public.ticker.v3.api.BTCUSDT");
}

#[test]
fn envelope_deserializes() {
    let json = r#"{
        "channel": "spot@public.ticker.v3.api.BTCUSDT",
        "data": {"c": "45000.0"},
        "ts": 1718000000000
    }"#;
    let envelope: Envelope = serde_json::from_str(json).expect("Failed to deserialize envelope");

    assert_eq!(envelope.channel, "spot@public.ticker.v3.api.BTCUSDT");
    assert_eq!(envelope.ts, 1718000000000);
    assert_eq!(envelope.data["c"], "45000.0");
}

#[test]
fn ticker_data_deserializes_string_numerics() {
    let json = r#"{
        "s": "BTCUSDT",
        "c": "45000.0",
        "p": "-150.5",
        "P": "-0.33",
        "h": "45500.0",
        "l": "44100.0",
        "v": "1234.56789",
        "q": "55501234.12"
    }"#;

    let ticker: Ticker = serde_json::from_str(json).expect("Failed to deserialize ticker");

    assert_eq!(ticker.symbol, "BTCUSDT");
    assert_eq!(ticker.last_price, 45000.0);
    assert_eq!(ticker.price_change, -150.5);
    assert_eq!(ticker.price_change_pct, -0.33);
    assert_eq!(ticker.high, 45500.0);
    assert_eq!(ticker.low, 44100.0);
    assert_eq!(ticker.volume, 1234.56789);
    assert_eq!(ticker.quote_volume, 55501234.12);
}

#[test]
fn ticker_data_accepts_bare_numbers() {
    let json = r#"{
        "s": "ETHUSDT",
        "c": 2250.5, "p": 10.0, "P": 0.4,
        "h": 2300.0, "l": 2200.0, "v": 100.0, "q": 225000.0
    }"#;

    let ticker: Ticker = serde_json::from_str(json).expect("Failed to deserialize ticker");
    assert_eq!(ticker.last_price, 2250.5);
}

#[test]
fn ticker_data_rejects_non_numeric_strings() {
    let json = r#"{
        "s": "BTCUSDT",
        "c": "not-a-price", "p": "0", "P": "0",
        "h": "0", "l": "0", "v": "0", "q": "0"
    }"#;

    assert!(serde_json::from_str::<Ticker>(json).is_err());
}

#[test]
fn candle_data_deserializes() {
    let json = r#"{
        "s": "ETHUSDT",
        "o": "2200.0",
        "h": "2300.0",
        "l": "2150.0",
        "c": "2250.5",
        "v": "512.25",
        "q": "1150000.0",
        "t": 1718000000000,
        "i": "1m"
    }"#;

    let candle: Candle = serde_json::from_str(json).expect("Failed to deserialize candle");

    assert_eq!(candle.symbol, "ETHUSDT");
    assert_eq!(candle.open, 2200.0);
    assert_eq!(candle.close, 2250.5);
    assert_eq!(candle.open_time, 1718000000000);
    assert_eq!(candle.interval, CandleInterval::Min1);
}

#[test]
fn trade_data_deserializes_both_sides() {
    let buy = r#"{"s":"BTCUSDT","p":"45000.0","v":"0.5","S":1,"t":1718000000000}"#;
    let sell = r#"{"s":"BTCUSDT","p":"44999.0","v":"1.25","S":2,"t":1718000000001}"#;

    let buy: Trade = serde_json::from_str(buy).expect("Failed to deserialize buy trade");
    let sell: Trade = serde_json::from_str(sell).expect("Failed to deserialize sell trade");

    assert_eq!(buy.side, TradeSide::Buy);
    assert_eq!(buy.price, 45000.0);
    assert_eq!(sell.side, TradeSide::Sell);
    assert_eq!(sell.quantity, 1.25);

    let bad = r#"{"s":"BTCUSDT","p":"1.0","v":"1.0","S":3,"t":0}"#;
    assert!(serde_json::from_str::<Trade>(bad).is_err());
}

#[test]
fn depth_data_deserializes() {
    let json = r#"{
        "s": "BTCUSDT",
        "bids": [{"p": "44999.0", "v": "0.5"}, {"p": "44998.0", "v": "1.0"}],
        "asks": [{"p": "45001.0", "v": "0.25"}],
        "r": "12345"
    }"#;

    let depth: Depth = serde_json::from_str(json).expect("Failed to deserialize depth");

    assert_eq!(depth.bids.len(), 2);
    assert_eq!(depth.asks.len(), 1);
    assert_eq!(depth.bids[0].price, 44999.0);
    assert_eq!(depth.asks[0].quantity, 0.25);
    assert_eq!(depth.version.as_deref(), Some("12345"));
}

#[test]
fn book_ticker_data_deserializes() {
    let json = r#"{"s":"BTCUSDT","b":"44999.5","B":"2.0","a":"45000.5","A":"1.5"}"#;

    let book: BookTicker = serde_json::from_str(json).expect("Failed to deserialize book ticker");

    assert_eq!(book.bid_price, 44999.5);
    assert_eq!(book.bid_quantity, 2.0);
    assert_eq!(book.ask_price, 45000.5);
    assert_eq!(book.ask_quantity, 1.5);
}

#[test]
fn interval_round_trips_through_wire_tokens() {
    let intervals = [
        CandleInterval::Min1,
        CandleInterval::Min5,
        CandleInterval::Min15,
        CandleInterval::Hour1,
        CandleInterval::Hour4,
        CandleInterval::Day1,
        CandleInterval::Week1,
    ];
    for interval in intervals {
        assert_eq!(
            CandleInterval::from_wire(interval.as_str()),
            Some(interval)
        );
    }
    assert_eq!(CandleInterval::from_wire("3m"), None);
}
