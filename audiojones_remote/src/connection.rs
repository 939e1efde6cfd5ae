use crate::codec;
use crate::state::ConnectionStatus;
use crate::timer::OneShot;
use audiojones_protocol::ClientCommand;
use futures_util::{SinkExt, StreamExt};
use std::future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

/// What a transport instance reports back to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Closed(Option<String>),
    Failed(String),
}

/// A [`TransportEvent`] tagged with the transport instance that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

/// A live transport instance. Dropping it tears the transport down.
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    task: Option<JoinHandle<()>>,
}

impl Link {
    pub fn new(outbound: mpsc::UnboundedSender<String>, task: Option<JoinHandle<()>>) -> Self {
        Self { outbound, task }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Opens transports. Every event of the returned link must be reported on
/// `events` tagged with `generation`.
pub trait Connector: Send + 'static {
    fn open(&self, endpoint: &Url, generation: u64, events: mpsc::UnboundedSender<LinkEvent>) -> Link;
}

/// Websocket transport over tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, endpoint: &Url, generation: u64, events: mpsc::UnboundedSender<LinkEvent>) -> Link {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(endpoint.clone(), generation, rx, events));
        Link::new(tx, Some(task))
    }
}

async fn run_socket(
    endpoint: Url,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let emit = |event| {
        let _ = events.send(LinkEvent { generation, event });
    };

    let socket = match tokio_tungstenite::connect_async(endpoint.as_str()).await {
        Ok((socket, _)) => socket,
        Err(e) => {
            emit(TransportEvent::Failed(e.to_string()));
            return;
        }
    };
    emit(TransportEvent::Opened);

    let (mut write, mut read) = socket.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    emit(TransportEvent::Failed(e.to_string()));
                    return;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => emit(TransportEvent::Frame(text.as_str().to_owned())),
                    Some(Ok(Message::Close(frame))) => {
                        emit(TransportEvent::Closed(frame.map(|f| f.reason.as_str().to_owned())));
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        emit(TransportEvent::Failed(e.to_string()));
                        return;
                    }
                    None => {
                        emit(TransportEvent::Closed(None));
                        return;
                    }
                }
            }
        }
    }

    let _ = write.close().await;
}

/// Outcome of one [`ConnectionManager::next`] step that the owner must act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Transport opened; the bootstrap request has been sent.
    Opened,
    Frame(String),
    /// Transport lost; a reconnect is scheduled.
    Lost,
    /// The reconnect timer fired and a new transport is being opened.
    Reconnecting,
}

/// Owns the transport lifecycle: connect, loss detection, fixed-delay
/// reconnect, bootstrap on every open.
pub struct ConnectionManager {
    endpoint: Url,
    reconnect_delay: Duration,
    connector: Box<dyn Connector>,
    status: ConnectionStatus,
    generation: u64,
    link: Option<Link>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    reconnect: OneShot,
    closed: bool,
}

impl ConnectionManager {
    pub fn new(endpoint: Url, reconnect_delay: Duration, connector: Box<dyn Connector>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            endpoint,
            reconnect_delay,
            connector,
            status: ConnectionStatus::Disconnected,
            generation: 0,
            link: None,
            events_tx,
            events_rx,
            reconnect: OneShot::default(),
            closed: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_pending()
    }

    /// Opens a fresh transport, replacing any current one and cancelling a
    /// scheduled reconnect. No-op after [`shutdown`](Self::shutdown).
    pub fn connect(&mut self) {
        if self.closed {
            return;
        }
        self.reconnect.cancel();
        self.link = None;
        self.generation += 1;
        self.status = ConnectionStatus::Connecting;
        info!(url = %self.endpoint, generation = self.generation, "connecting");
        self.link = Some(
            self.connector
                .open(&self.endpoint, self.generation, self.events_tx.clone()),
        );
    }

    /// Hands a frame to the transport. Dropped unless connected.
    pub fn send(&mut self, frame: String) -> bool {
        if self.status != ConnectionStatus::Connected {
            debug!(status = %self.status, "dropping outbound frame");
            return false;
        }
        let Some(link) = self.link.as_ref() else {
            return false;
        };
        link.outbound.send(frame).is_ok()
    }

    /// Waits for the next transition worth reporting. Cancel safe.
    pub async fn next(&mut self) -> Transition {
        loop {
            tokio::select! {
                ev = self.events_rx.recv() => {
                    let Some(ev) = ev else {
                        return future::pending().await;
                    };
                    if let Some(transition) = self.handle_event(ev) {
                        return transition;
                    }
                }
                () = self.reconnect.fired() => {
                    info!("reconnecting");
                    self.connect();
                    return Transition::Reconnecting;
                }
            }
        }
    }

    pub(crate) fn handle_event(&mut self, ev: LinkEvent) -> Option<Transition> {
        if self.closed || ev.generation != self.generation {
            debug!(generation = ev.generation, "ignoring event from stale transport");
            return None;
        }

        match ev.event {
            TransportEvent::Opened => {
                if self.status != ConnectionStatus::Connecting {
                    return None;
                }
                self.status = ConnectionStatus::Connected;
                info!(url = %self.endpoint, "connected");
                self.bootstrap();
                Some(Transition::Opened)
            }
            TransportEvent::Frame(text) => {
                (self.status == ConnectionStatus::Connected).then_some(Transition::Frame(text))
            }
            TransportEvent::Closed(reason) => {
                info!(reason = reason.as_deref().unwrap_or(""), "connection closed");
                self.lose()
            }
            TransportEvent::Failed(err) => {
                warn!(error = %err, "transport error");
                self.lose()
            }
        }
    }

    /// Tears down the transport and all timers. Nothing reconnects afterwards.
    pub fn shutdown(&mut self) {
        self.closed = true;
        self.reconnect.cancel();
        self.link = None;
        self.status = ConnectionStatus::Disconnected;
        while self.events_rx.try_recv().is_ok() {}
    }

    fn bootstrap(&mut self) {
        match codec::encode_command(&ClientCommand::PresetList) {
            Ok(frame) => {
                self.send(frame);
            }
            Err(e) => warn!(error = %e, "failed to encode bootstrap request"),
        }
    }

    fn lose(&mut self) -> Option<Transition> {
        self.link = None;
        let was = std::mem::replace(&mut self.status, ConnectionStatus::Disconnected);
        self.schedule_reconnect();
        (was != ConnectionStatus::Disconnected).then_some(Transition::Lost)
    }

    fn schedule_reconnect(&mut self) {
        if self.closed || self.reconnect.is_pending() {
            return;
        }
        info!(delay_ms = self.reconnect_delay.as_millis() as u64, "scheduling reconnect");
        self.reconnect.arm(self.reconnect_delay);
    }
}
