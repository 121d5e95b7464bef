use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use rosc::OscType;
use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle};

use super::{decode, encode, SysReply};
use crate::{
    GridConnector, GridInfo, GridSink, Notification, Result, SerialOscConfig, WaveGridError,
};

/// Collects `/sys` replies until the grid has told us who it is and how big it
/// is. That pair marks the handshake as complete.
#[derive(Debug, Default, Clone)]
pub struct ReadyTracker {
    id: Option<String>,
    size: Option<(u32, u32)>,
    announced: bool,
}

impl ReadyTracker {
    /// Returns the grid's details exactly once, on the reply that completes
    /// the handshake.
    pub fn observe(&mut self, reply: &SysReply) -> Option<GridInfo> {
        match reply {
            SysReply::Id(id) => self.id = Some(id.clone()),
            SysReply::Size { width, height } => self.size = Some((*width, *height)),
            _ => return None,
        }

        if self.announced {
            return None;
        }
        let (id, (width, height)) = (self.id.clone()?, self.size?);
        self.announced = true;
        Some(GridInfo { id, width, height })
    }
}

/// A connected grid. LED writes are sent without waiting on the socket.
#[derive(Debug)]
pub struct OscGrid {
    socket: Arc<UdpSocket>,
    device: SocketAddr,
    level_all: String,
    level_set: String,
    listener: JoinHandle<()>,
}

impl OscGrid {
    /// Starts the `/sys` handshake with the grid listening at `device`. Replies
    /// are handled in the background; [`Notification::GridReady`] is sent on
    /// `notifications` once the grid has identified itself.
    pub async fn connect(
        device: SocketAddr,
        prefix: &str,
        notifications: mpsc::Sender<Notification>,
    ) -> Result<Self> {
        let local_ip = if device.ip().is_loopback() {
            device.ip()
        } else {
            IpAddr::from([0, 0, 0, 0])
        };
        let socket = UdpSocket::bind(SocketAddr::new(local_ip, 0))
            .await
            .map_err(|err| WaveGridError::connection(format!("cannot bind grid socket: {err}")))?;
        let local = socket.local_addr()?;
        let socket = Arc::new(socket);

        let host = OscType::String(local.ip().to_string());
        let port = OscType::Int(i32::from(local.port()));
        let handshake = [
            ("/sys/port", vec![port.clone()]),
            ("/sys/host", vec![host.clone()]),
            ("/sys/prefix", vec![OscType::String(prefix.to_string())]),
            ("/sys/info", vec![host, port]),
        ];
        for (addr, args) in handshake {
            let packet = encode(addr, args)?;
            socket.send_to(&packet, device).await.map_err(|err| {
                WaveGridError::connection(format!("grid at {device} unreachable: {err}"))
            })?;
        }
        tracing::info!(%device, %local, prefix, "grid handshake sent");

        let listener = tokio::spawn(listen(
            socket.clone(),
            prefix.to_string(),
            notifications,
        ));

        Ok(Self {
            socket,
            device,
            level_all: format!("{prefix}/grid/led/level/all"),
            level_set: format!("{prefix}/grid/led/level/set"),
            listener,
        })
    }

    pub fn device(&self) -> SocketAddr {
        self.device
    }

    fn send(&self, addr: &str, args: Vec<OscType>) -> Result<()> {
        let packet = encode(addr, args)?;
        self.socket.try_send_to(&packet, self.device)?;
        Ok(())
    }
}

impl GridSink for OscGrid {
    fn clear_all(&mut self, level: u8) -> Result<()> {
        self.send(&self.level_all, vec![OscType::Int(i32::from(level))])
    }

    fn set_cell(&mut self, col: usize, row: usize, level: u8) -> Result<()> {
        let (x, y) = match (i32::try_from(col), i32::try_from(row)) {
            (Ok(x), Ok(y)) => (x, y),
            _ => {
                return Err(WaveGridError::render(format!(
                    "cell ({col}, {row}) cannot be addressed"
                )))
            }
        };
        self.send(
            &self.level_set,
            vec![OscType::Int(x), OscType::Int(y), OscType::Int(i32::from(level))],
        )
    }
}

impl Drop for OscGrid {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    socket: Arc<UdpSocket>,
    prefix: String,
    notifications: mpsc::Sender<Notification>,
) {
    let mut tracker = ReadyTracker::default();
    let mut buf = vec![0u8; 65_536];

    loop {
        let size = match socket.recv_from(&mut buf).await {
            Ok((size, _)) => size,
            Err(err) => {
                tracing::warn!(%err, "grid socket closed");
                return;
            }
        };

        let messages = match decode(&buf[..size]) {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(%err, "ignoring undecodable grid datagram");
                continue;
            }
        };

        for message in messages {
            let reply = match SysReply::parse(&message, &prefix) {
                Ok(Some(reply)) => reply,
                Ok(None) => {
                    tracing::debug!(addr = %message.addr, "ignoring grid message");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(%err, "ignoring malformed grid message");
                    continue;
                }
            };

            if let SysReply::Key { x, y, down } = reply {
                tracing::debug!(x, y, down, "key");
                continue;
            }

            if let Some(info) = tracker.observe(&reply) {
                tracing::info!(id = %info.id, width = info.width, height = info.height, "grid ready");
                if notifications.send(Notification::GridReady(info)).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Connects to grids announced by serialosc.
#[derive(Debug, Clone)]
pub struct OscGridConnector {
    prefix: String,
    notifications: mpsc::Sender<Notification>,
}

impl OscGridConnector {
    pub fn new(config: &SerialOscConfig, notifications: mpsc::Sender<Notification>) -> Self {
        let prefix = config.prefix.trim_end_matches('/');
        let prefix = if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        };
        Self {
            prefix,
            notifications,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl GridConnector for OscGridConnector {
    type Grid = OscGrid;

    fn connect(&mut self, host: IpAddr, port: u16) -> impl Future<Output = Result<OscGrid>> {
        let prefix = self.prefix.clone();
        let notifications = self.notifications.clone();
        async move { OscGrid::connect(SocketAddr::new(host, port), &prefix, notifications).await }
    }
}
