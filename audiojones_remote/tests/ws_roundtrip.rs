use audiojones_remote::{ClientConfig, ConnectionStatus, Meter, RemoteClient, StateModel};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const WAIT: Duration = Duration::from_secs(5);

async fn within<F: Future>(what: &str, fut: F) -> F::Output {
    match timeout(WAIT, fut).await {
        Ok(out) => out,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = within("client connection", listener.accept())
        .await
        .expect("accept");
    tokio_tungstenite::accept_async(stream).await.expect("handshake")
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        match within("client frame", ws.next()).await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).expect("client sent json")
            }
            Some(Ok(_)) => continue,
            other => panic!("connection ended before a frame arrived: {other:?}"),
        }
    }
}

async fn push(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send to client");
}

async fn wait_until(
    state: &mut watch::Receiver<StateModel>,
    what: &str,
    pred: impl FnMut(&StateModel) -> bool,
) {
    within(what, state.wait_for(pred))
        .await
        .expect("client dropped its state");
}

#[tokio::test]
async fn sync_session_over_real_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();

    let config = ClientConfig {
        host: "127.0.0.1".to_string(),
        port,
        reconnect_delay: Duration::from_millis(100),
        ..ClientConfig::default()
    };
    let client = RemoteClient::spawn(&config).expect("spawn client");
    let dispatcher = client.dispatcher();
    let mut state = client.subscribe();

    // First connection: bootstrap request, then server pushes.
    let mut ws = accept(&listener).await;
    assert_eq!(next_json(&mut ws).await, json!({"cmd": "presetList"}));
    wait_until(&mut state, "connected", |s| s.status() == ConnectionStatus::Connected).await;

    push(&mut ws, json!({"type": "config", "preset": {"audio": {"channelMode": 2}}})).await;
    push(
        &mut ws,
        json!({"type": "analysis", "beat": 0.5, "bass": 1.5, "mid": 4.0, "treb": -1.0}),
    )
    .await;
    push(&mut ws, json!({"type": "presetStatus", "presets": ["a.json", "b.json"]})).await;

    wait_until(&mut state, "pushed state", |s| {
        s.config().audio.channel_mode == 2
            && s.analysis().is_some()
            && s.presets().entries.len() == 2
    })
    .await;
    {
        let snapshot = state.borrow();
        assert_eq!(snapshot.meter_percent(Meter::Beat), 50.0);
        assert_eq!(snapshot.meter_percent(Meter::Bass), 50.0);
        assert_eq!(snapshot.meter_percent(Meter::Mid), 100.0);
        assert_eq!(snapshot.meter_percent(Meter::Treb), 0.0);
    }

    // Load round trip: selection only sticks after the server confirms.
    dispatcher.load_preset("a.json").await.expect("queue load");
    assert_eq!(
        next_json(&mut ws).await,
        json!({"cmd": "presetLoad", "filename": "a.json"})
    );
    assert_eq!(state.borrow().presets().selected, None);
    push(
        &mut ws,
        json!({"type": "presetStatus", "success": true, "message": "Loaded a.json"}),
    )
    .await;
    wait_until(&mut state, "selection", |s| {
        s.presets().selected.as_deref() == Some("a.json")
    })
    .await;
    assert_eq!(
        state.borrow().presets().status_message.as_deref(),
        Some("Loaded a.json")
    );

    dispatcher.set_audio_channel(4).await.expect("queue channel");
    assert_eq!(
        next_json(&mut ws).await,
        json!({"cmd": "setAudioChannel", "value": 4})
    );

    // Server goes away: client reports it and comes back on its own.
    drop(ws);
    wait_until(&mut state, "disconnect", |s| {
        s.status() == ConnectionStatus::Disconnected
    })
    .await;
    assert!(!state.borrow().controls_enabled());

    let mut ws = accept(&listener).await;
    assert_eq!(next_json(&mut ws).await, json!({"cmd": "presetList"}));
    wait_until(&mut state, "reconnected", |s| s.status() == ConnectionStatus::Connected).await;
    // Data from the previous session survives the reconnect.
    assert_eq!(state.borrow().presets().entries.len(), 2);

    client.shutdown().await;
    match within("socket close", ws.next()).await {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("unexpected frame after shutdown: {other:?}"),
    }
    assert_eq!(state.borrow().status(), ConnectionStatus::Disconnected);
    assert!(dispatcher.refresh_presets().await.is_err());
}

#[tokio::test]
async fn keeps_retrying_until_the_server_appears() {
    // Reserve a port, then release it so the first attempts are refused.
    let reserved = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = reserved.local_addr().expect("local addr");
    drop(reserved);

    let config = ClientConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        reconnect_delay: Duration::from_millis(50),
        ..ClientConfig::default()
    };
    let client = RemoteClient::spawn(&config).expect("spawn client");
    let mut state = client.subscribe();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_ne!(state.borrow().status(), ConnectionStatus::Connected);

    let listener = TcpListener::bind(addr).await.expect("rebind");
    let mut ws = accept(&listener).await;
    assert_eq!(next_json(&mut ws).await, json!({"cmd": "presetList"}));
    wait_until(&mut state, "connected", |s| s.status() == ConnectionStatus::Connected).await;

    client.shutdown().await;
}
