//! WebSocket transport to the relay with bounded reconnect.
//!
//! [`Connection::connect`] opens the socket, then hands it to a background
//! task that joins, forwards [`ServerEvent`]s and status changes on an mpsc
//! channel, and reconnects per [`ReconnectPolicy`] when the socket drops.
//! Events queued while reconnecting, or whose write failed, go out after the
//! next join. If the relay never comes back each stranded send is reported
//! as [`ConnectionEvent::SendFailed`] before the terminal `Failed` status.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pairchat_shared::constants::{
    WS_RECONNECT_ATTEMPTS, WS_RECONNECT_BASE_DELAY_MS, WS_RECONNECT_MAX_DELAY_MS,
};
use pairchat_shared::events::{ClientEvent, ServerEvent};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: WS_RECONNECT_ATTEMPTS,
            base_delay: Duration::from_millis(WS_RECONNECT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(WS_RECONNECT_MAX_DELAY_MS),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the 1-based `attempt`, or `None` once attempts run out.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(attempt).min(self.max_delay))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Reconnecting { attempt: u32 },
    /// Terminal. The user has to start a new connection.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Status(ConnectionStatus),
    Server(ServerEvent),
    /// A `send_message` that never reached the relay.
    SendFailed {
        client_message_id: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub display_name: String,
    pub user_id: String,
    pub secret: Option<String>,
}

impl JoinRequest {
    fn event(&self) -> ClientEvent {
        ClientEvent::Join {
            display_name: self.display_name.clone(),
            user_id: self.user_id.clone(),
            secret: self.secret.clone(),
        }
    }
}

pub struct Connection {
    outgoing: mpsc::UnboundedSender<ClientEvent>,
    task: JoinHandle<()>,
}

enum SessionEnd {
    Dropped,
    Shutdown,
}

impl Connection {
    /// Opens the first socket eagerly so a bad URL or a dead relay surfaces
    /// here rather than as a `Failed` status later.
    pub async fn connect(
        url: &str,
        join: JoinRequest,
        policy: ReconnectPolicy,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), ClientError> {
        let ws = open(url).await?;
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(
            url.to_string(),
            join,
            policy,
            ws,
            outgoing_rx,
            events_tx,
        ));

        Ok((Self { outgoing, task }, events_rx))
    }

    pub fn send(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.outgoing.send(event).map_err(|_| ClientError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Closes the socket and stops reconnecting.
    pub async fn close(self) {
        drop(self.outgoing);
        let _ = self.task.await;
    }
}

async fn open(url: &str) -> Result<WsStream, ClientError> {
    let (ws, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| {
            tracing::warn!(url, "relay connect timed out");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::warn!(url, error = %e, "relay connect failed");
            ClientError::WebSocket(e)
        })?;
    Ok(ws)
}

async fn run(
    url: String,
    join: JoinRequest,
    policy: ReconnectPolicy,
    mut ws: WsStream,
    mut outgoing_rx: mpsc::UnboundedReceiver<ClientEvent>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let mut unsent = VecDeque::new();

    loop {
        match session(ws, &join, &mut unsent, &mut outgoing_rx, &events_tx).await {
            SessionEnd::Shutdown => return,
            SessionEnd::Dropped => tracing::info!(%url, "relay connection lost"),
        }

        let mut attempt = 0;
        ws = loop {
            attempt += 1;
            let Some(delay) = policy.delay_for(attempt) else {
                tracing::error!(%url, attempts = policy.max_attempts, "giving up on relay");
                outgoing_rx.close();
                while let Ok(event) = outgoing_rx.try_recv() {
                    unsent.push_back(event);
                }
                for event in unsent.drain(..) {
                    report_unsent(&events_tx, event);
                }
                let _ = events_tx.send(ConnectionEvent::Status(ConnectionStatus::Failed));
                return;
            };
            if events_tx
                .send(ConnectionEvent::Status(ConnectionStatus::Reconnecting { attempt }))
                .is_err()
            {
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = buffer_until_closed(&mut outgoing_rx, &mut unsent) => return,
            }
            let opened = tokio::select! {
                opened = open(&url) => opened,
                _ = buffer_until_closed(&mut outgoing_rx, &mut unsent) => return,
            };
            match opened {
                Ok(ws) => break ws,
                Err(e) => tracing::debug!(attempt, error = %e, "reconnect attempt failed"),
            }
        };
    }
}

/// Holds events sent while no socket is up. Returns once the `Connection`
/// handle is dropped.
async fn buffer_until_closed(
    outgoing_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    unsent: &mut VecDeque<ClientEvent>,
) {
    while let Some(event) = outgoing_rx.recv().await {
        unsent.push_back(event);
    }
}

fn report_unsent(events_tx: &mpsc::UnboundedSender<ConnectionEvent>, event: ClientEvent) {
    if let ClientEvent::SendMessage {
        client_message_id: Some(client_message_id),
        ..
    } = event
    {
        let _ = events_tx.send(ConnectionEvent::SendFailed {
            client_message_id,
            reason: "Could not reach the chat server".into(),
        });
    }
}

async fn session(
    ws: WsStream,
    join: &JoinRequest,
    unsent: &mut VecDeque<ClientEvent>,
    outgoing_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    events_tx: &mpsc::UnboundedSender<ConnectionEvent>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    if let Err(e) = send_event(&mut sink, &join.event()).await {
        tracing::warn!(error = %e, "failed to send join");
        return SessionEnd::Dropped;
    }
    if events_tx
        .send(ConnectionEvent::Status(ConnectionStatus::Connected))
        .is_err()
    {
        return SessionEnd::Shutdown;
    }

    while let Some(event) = unsent.pop_front() {
        if let Err(e) = send_event(&mut sink, &event).await {
            tracing::warn!(error = %e, "resend failed; reconnecting");
            unsent.push_front(event);
            return SessionEnd::Dropped;
        }
    }

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    let text: &str = &text;
                    match serde_json::from_str::<ServerEvent>(text) {
                        Ok(event) => {
                            if events_tx.send(ConnectionEvent::Server(event)).is_err() {
                                let _ = sink.close().await;
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => tracing::debug!(error = %e, "ignoring unparseable frame"),
                    }
                }
                Some(Ok(Frame::Close(_))) | None => return SessionEnd::Dropped,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "relay socket error");
                    return SessionEnd::Dropped;
                }
                Some(Ok(_)) => {}
            },
            out = outgoing_rx.recv() => match out {
                Some(event) => {
                    if let Err(e) = send_event(&mut sink, &event).await {
                        tracing::warn!(error = %e, "send failed; reconnecting");
                        unsent.push_back(event);
                        return SessionEnd::Dropped;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }
            },
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &ClientEvent) -> Result<(), ClientError>
where
    S: futures::Sink<Frame, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(event)?;
    sink.send(Frame::Text(text.into())).await?;
    Ok(())
}
