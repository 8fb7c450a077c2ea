//! Local socket server for IPC
//!
//! Unix domain socket on Unix, named pipe on Windows. Provides
//! request-response communication and pushes overlay events to subscribed
//! clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dispatch::{Stamped, UiCommand};
use crate::events::OverlayEvent;
use crate::hotkey::HotkeyAction;
use crate::hover::{LayoutMetrics, ListSnapshot};

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_MESSAGE_LEN};

/// Channels through which the server reaches the rest of the daemon
pub struct ServerContext {
    pub commands: mpsc::Sender<Stamped<UiCommand>>,
    pub snapshot: watch::Sender<ListSnapshot>,
    pub events: broadcast::Sender<OverlayEvent>,
    pub layout: LayoutMetrics,
}

/// State shared by all client handlers
struct Shared {
    state: RwLock<ServerState>,
    commands: mpsc::Sender<Stamped<UiCommand>>,
    snapshot: watch::Sender<ListSnapshot>,
    events: broadcast::Sender<OverlayEvent>,
    layout: LayoutMetrics,
}

struct ServerState {
    status: DaemonStatus,
    start_time: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    endpoint: PathBuf,
    #[cfg(unix)]
    listener: tokio::net::UnixListener,
    #[cfg(windows)]
    first_pipe: Mutex<Option<tokio::net::windows::named_pipe::NamedPipeServer>>,
    shared: Arc<Shared>,
    /// Events folded into the status view
    status_rx: Mutex<broadcast::Receiver<OverlayEvent>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the endpoint. Fails if another daemon already owns it.
    pub fn new(endpoint: &Path, ctx: ServerContext) -> Result<Self> {
        #[cfg(unix)]
        let listener = bind_socket(endpoint)?;
        #[cfg(windows)]
        let first_pipe = {
            use tokio::net::windows::named_pipe::ServerOptions;
            let pipe = ServerOptions::new()
                .first_pipe_instance(true)
                .create(endpoint)
                .context("failed to create named pipe")?;
            Mutex::new(Some(pipe))
        };

        let (shutdown_tx, _) = broadcast::channel(1);
        let status_rx = Mutex::new(ctx.events.subscribe());

        let shared = Arc::new(Shared {
            state: RwLock::new(ServerState {
                status: DaemonStatus::default(),
                start_time: Instant::now(),
            }),
            commands: ctx.commands,
            snapshot: ctx.snapshot,
            events: ctx.events,
            layout: ctx.layout,
        });

        info!(endpoint = ?endpoint, "IPC server listening");

        Ok(Self {
            endpoint: endpoint.to_owned(),
            #[cfg(unix)]
            listener,
            #[cfg(windows)]
            first_pipe,
            shared,
            status_rx,
            shutdown_tx,
        })
    }

    /// Record which input sources came up at startup.
    pub async fn set_registration(&self, hotkeys: Vec<HotkeyAction>, pointer_hook: bool) {
        let mut state = self.shared.state.write().await;
        state.status.hotkeys = hotkeys;
        state.status.pointer_hook = pointer_hook;
    }

    pub async fn status(&self) -> DaemonStatus {
        current_status(&self.shared).await
    }

    /// Run the server, accepting connections and tracking status
    pub async fn run(&self) -> Result<()> {
        tokio::select! {
            result = self.accept_loop() => result,
            _ = self.track_status() => Ok(()),
        }
    }

    async fn track_status(&self) {
        let mut rx = self.status_rx.lock().await;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    self.shared.state.write().await.status.apply(&event);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "status tracker lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    #[cfg(unix)]
    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    self.spawn_client(stream);
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    #[cfg(windows)]
    async fn accept_loop(&self) -> Result<()> {
        use tokio::net::windows::named_pipe::ServerOptions;

        let mut pipe = self
            .first_pipe
            .lock()
            .await
            .take()
            .context("server already running")?;

        loop {
            pipe.connect().await.context("named pipe connect failed")?;
            debug!("client connected");

            let connected = pipe;
            pipe = ServerOptions::new()
                .create(&self.endpoint)
                .context("failed to create named pipe instance")?;
            self.spawn_client(connected);
        }
    }

    fn spawn_client<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                result = handle_client(stream, shared) => {
                    if let Err(e) = result {
                        warn!(?e, "client handler error");
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("client handler shutting down");
                }
            }
        });
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        #[cfg(unix)]
        {
            if self.endpoint.exists() {
                if let Err(e) = std::fs::remove_file(&self.endpoint) {
                    warn!(?e, "failed to remove socket file");
                }
            }
        }

        info!("IPC server shutdown complete");
    }
}

#[cfg(unix)]
fn bind_socket(socket_path: &Path) -> Result<tokio::net::UnixListener> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create socket directory")?;
    }

    // Remove stale socket if it exists
    if socket_path.exists() {
        std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
    }

    let listener =
        tokio::net::UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

    // Owner-only
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;

    Ok(listener)
}

async fn current_status(shared: &Shared) -> DaemonStatus {
    let state = shared.state.read().await;
    let mut status = state.status.clone();
    status.uptime_secs = state.start_time.elapsed().as_secs();
    status
}

/// Incremental reader of length-prefixed frames
///
/// `next` only awaits a plain `read`, so it can be raced against other
/// futures without losing partially received frames.
struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Next complete frame, or `None` on a clean disconnect.
    async fn next(&mut self) -> Result<Option<Vec<u8>>> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(Some(frame));
            }

            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                bail!("connection closed mid-message");
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn take_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(len_bytes) = self.buf.get(..4) else {
            return Ok(None);
        };
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(len_bytes);

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_LEN {
            bail!("message too large ({len} bytes)");
        }
        if self.buf.len() < 4 + len {
            return Ok(None);
        }

        let frame = self.buf[4..4 + len].to_vec();
        self.buf.drain(..4 + len);
        Ok(Some(frame))
    }
}

/// Handle a single client connection
async fn handle_client<S>(stream: S, shared: Arc<Shared>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut frames = FrameReader::new(reader);
    let mut subscription: Option<broadcast::Receiver<OverlayEvent>> = None;

    loop {
        tokio::select! {
            frame = frames.next() => {
                let Some(frame) = frame? else {
                    debug!("client disconnected");
                    return Ok(());
                };

                let response = match serde_json::from_slice::<Request>(&frame) {
                    Ok(request) => {
                        debug!(?request, "received request");
                        let (response, subscribe) = process_request(request, &shared).await;
                        if subscribe && subscription.is_none() {
                            subscription = Some(shared.events.subscribe());
                            debug!("client subscribed to notifications");
                        }
                        response
                    }
                    Err(e) => {
                        warn!(?e, "failed to parse request");
                        Response::error("bad_request", e.to_string())
                    }
                };

                send_message(&mut writer, &response).await?;
            }

            event = next_event(&mut subscription) => {
                match event {
                    Ok(event) => {
                        send_message(&mut writer, &Notification::Event { event }).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        subscription = None;
                    }
                }
            }
        }
    }
}

async fn next_event(
    subscription: &mut Option<broadcast::Receiver<OverlayEvent>>,
) -> Result<OverlayEvent, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    stream.write_all(&msg_len).await?;
    stream.write_all(&msg_bytes).await?;
    stream.flush().await?;

    Ok(())
}

/// Process a request and return a response
/// Returns (Response, should_subscribe)
async fn process_request(request: Request, shared: &Shared) -> (Response, bool) {
    let command = match request {
        Request::Ping => return (Response::Pong, false),
        Request::GetStatus => return (Response::Status(current_status(shared).await), false),
        Request::GetLayout => return (Response::Layout(shared.layout), false),
        Request::Subscribe => return (Response::Subscribed, true),
        Request::UpdateSnapshot { snapshot } => {
            debug!(visible = snapshot.visible_len(&shared.layout.caps), "list snapshot updated");
            shared.snapshot.send_replace(snapshot);
            return (Response::Ack, false);
        }
        Request::Show => UiCommand::Show,
        Request::Cancel => UiCommand::Cancel,
        Request::DismissKey => UiCommand::DismissKey,
        Request::UserInput => UiCommand::UserInput,
        Request::WindowMoved { rect } => UiCommand::WindowMoved(rect),
    };

    match shared.commands.send(Stamped::new(command)).await {
        Ok(()) => (Response::Ack, false),
        Err(_) => (
            Response::error("unavailable", "dispatcher is not running"),
            false,
        ),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, DuplexStream};

    use super::*;
    use crate::hover::ItemId;
    use crate::state::OverlayMode;
    use crate::window::ScreenRect;

    struct Fixture {
        shared: Arc<Shared>,
        commands: mpsc::Receiver<Stamped<UiCommand>>,
        snapshot: watch::Receiver<ListSnapshot>,
    }

    fn fixture() -> Fixture {
        let (commands_tx, commands) = mpsc::channel(8);
        let (snapshot_tx, snapshot) = watch::channel(ListSnapshot::default());
        let (events, _) = broadcast::channel(16);
        let shared = Arc::new(Shared {
            state: RwLock::new(ServerState {
                status: DaemonStatus::default(),
                start_time: Instant::now(),
            }),
            commands: commands_tx,
            snapshot: snapshot_tx,
            events,
            layout: LayoutMetrics::default(),
        });
        Fixture {
            shared,
            commands,
            snapshot,
        }
    }

    fn frame(request: &Request) -> Vec<u8> {
        let body = serde_json::to_vec(request).unwrap();
        let mut bytes = (body.len() as u32).to_le_bytes().to_vec();
        bytes.extend(body);
        bytes
    }

    async fn roundtrip(client: &mut DuplexStream, request: &Request) -> serde_json::Value {
        client.write_all(&frame(request)).await.unwrap();
        read_value(client).await
    }

    async fn read_value(client: &mut DuplexStream) -> serde_json::Value {
        let mut len = [0u8; 4];
        client.read_exact(&mut len).await.unwrap();
        let mut body = vec![0u8; u32::from_le_bytes(len) as usize];
        client.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_frame_reader_handles_split_frames() {
        let bytes = [frame(&Request::Ping), frame(&Request::GetLayout)].concat();
        let mock = tokio_test::io::Builder::new()
            .read(&bytes[..3])
            .read(&bytes[3..10])
            .read(&bytes[10..])
            .build();
        let mut reader = FrameReader::new(mock);

        let first: Request = serde_json::from_slice(&reader.next().await.unwrap().unwrap()).unwrap();
        let second: Request = serde_json::from_slice(&reader.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(first, Request::Ping);
        assert_eq!(second, Request::GetLayout);
        assert!(reader.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frame_reader_rejects_oversized_message() {
        let len = ((MAX_MESSAGE_LEN + 1) as u32).to_le_bytes();
        let mock = tokio_test::io::Builder::new().read(&len).build();
        let mut reader = FrameReader::new(mock);
        assert!(reader.next().await.is_err());
    }

    #[tokio::test]
    async fn test_commands_are_forwarded() {
        let mut fx = fixture();
        let rect = ScreenRect::new(5, 5, 280, 600);

        let (resp, _) = process_request(Request::Show, &fx.shared).await;
        assert_eq!(resp, Response::Ack);
        let (resp, _) = process_request(Request::WindowMoved { rect }, &fx.shared).await;
        assert_eq!(resp, Response::Ack);

        let show = fx.commands.recv().await.unwrap();
        let moved = fx.commands.recv().await.unwrap();
        assert_eq!(show.value, UiCommand::Show);
        assert_eq!(moved.value, UiCommand::WindowMoved(rect));
        assert!(show.seq < moved.seq);
    }

    #[tokio::test]
    async fn test_command_without_dispatcher_is_an_error() {
        let fx = fixture();
        drop(fx.commands);
        let (resp, _) = process_request(Request::Cancel, &fx.shared).await;
        assert!(matches!(resp, Response::Error { code, .. } if code == "unavailable"));
    }

    #[tokio::test]
    async fn test_snapshot_update_is_published() {
        let fx = fixture();
        let snapshot = ListSnapshot {
            today: vec![ItemId::from("t1")],
            ..ListSnapshot::default()
        };
        let (resp, _) = process_request(
            Request::UpdateSnapshot {
                snapshot: snapshot.clone(),
            },
            &fx.shared,
        )
        .await;
        assert_eq!(resp, Response::Ack);
        assert_eq!(*fx.snapshot.borrow(), snapshot);
    }

    #[tokio::test]
    async fn test_client_session() {
        let fx = fixture();
        let (mut client, server) = duplex(64 * 1024);
        let shared = Arc::clone(&fx.shared);
        tokio::spawn(handle_client(server, shared));

        let pong = roundtrip(&mut client, &Request::Ping).await;
        assert_eq!(pong["type"], "pong");

        let layout = roundtrip(&mut client, &Request::GetLayout).await;
        assert_eq!(layout["type"], "layout");
        assert_eq!(layout["header_height"], 60);
        assert_eq!(layout["caps"]["today"], 5);

        client.write_all(&4u32.to_le_bytes()).await.unwrap();
        client.write_all(b"nope").await.unwrap();
        let error = read_value(&mut client).await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["code"], "bad_request");

        let status = roundtrip(&mut client, &Request::GetStatus).await;
        assert_eq!(status["mode"], "background");
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let fx = fixture();
        let (mut client, server) = duplex(64 * 1024);
        tokio::spawn(handle_client(server, Arc::clone(&fx.shared)));

        let subscribed = roundtrip(&mut client, &Request::Subscribe).await;
        assert_eq!(subscribed["type"], "subscribed");

        fx.shared
            .events
            .send(OverlayEvent::ModeChanged {
                mode: OverlayMode::Interactive,
            })
            .unwrap();

        let note = read_value(&mut client).await;
        assert_eq!(note["type"], "event");
        assert_eq!(note["event"]["type"], "mode_changed");
        assert_eq!(note["event"]["mode"], "interactive");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_status_tracks_events() {
        let (commands, _commands_rx) = mpsc::channel(8);
        let (snapshot, _snapshot_rx) = watch::channel(ListSnapshot::default());
        let (events, _) = broadcast::channel(16);
        let path = std::env::temp_dir().join(format!("overlay-hud-test-{}.sock", std::process::id()));

        let server = Server::new(
            &path,
            ServerContext {
                commands,
                snapshot,
                events: events.clone(),
                layout: LayoutMetrics::default(),
            },
        )
        .unwrap();
        server
            .set_registration(vec![HotkeyAction::ToggleMain], true)
            .await;

        events
            .send(OverlayEvent::ItemHoverEnter {
                item: ItemId::from("c0"),
            })
            .unwrap();

        // Let the tracker fold the queued event, then stop.
        tokio::select! {
            _ = server.run() => {}
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
        }

        let status = server.status().await;
        assert_eq!(status.hovered, Some(ItemId::from("c0")));
        assert_eq!(status.hotkeys, vec![HotkeyAction::ToggleMain]);
        assert!(status.pointer_hook);

        server.shutdown().await;
        assert!(!path.exists());
    }
}
