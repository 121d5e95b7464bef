use std::net::SocketAddr;

use rosc::OscType;
use tokio::{net::UdpSocket, sync::mpsc};

use super::{decode, encode, DaemonReply};
use crate::{Notification, Result, SerialOscConfig, WaveGridError};

/// Talks to the serialosc daemon and turns its replies into [`Notification`]s.
#[derive(Debug)]
pub struct SerialOscClient {
    socket: UdpSocket,
    daemon: SocketAddr,
}

impl SerialOscClient {
    /// Binds an ephemeral port on the configured host.
    pub async fn bind(config: &SerialOscConfig) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(config.host, 0))
            .await
            .map_err(|err| WaveGridError::connection(format!("cannot bind discovery socket: {err}")))?;
        Ok(Self {
            socket,
            daemon: config.daemon_addr(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Asks the daemon for every connected device.
    pub async fn request_list(&self) -> Result<()> {
        self.send_with_reply_addr("/serialosc/list").await
    }

    /// Asks the daemon to report the next add or remove. serialosc only sends
    /// one notification per request, so this is re-armed after each one.
    pub async fn request_notify(&self) -> Result<()> {
        self.send_with_reply_addr("/serialosc/notify").await
    }

    async fn send_with_reply_addr(&self, addr: &str) -> Result<()> {
        let local = self.local_addr()?;
        let packet = encode(
            addr,
            vec![
                OscType::String(local.ip().to_string()),
                OscType::Int(i32::from(local.port())),
            ],
        )?;
        self.socket
            .send_to(&packet, self.daemon)
            .await
            .map_err(|err| WaveGridError::connection(format!("serialosc unreachable: {err}")))?;
        Ok(())
    }

    /// Lists devices, then forwards daemon notifications until the receiving
    /// side goes away. Malformed daemon messages end discovery with an error.
    pub async fn run(self, notifications: mpsc::Sender<Notification>) -> Result<()> {
        tracing::info!(daemon = %self.daemon, "discovering grids");
        self.request_list().await?;
        self.request_notify().await?;

        let mut buf = vec![0u8; 65_536];
        loop {
            let (size, from) = self.socket.recv_from(&mut buf).await?;
            tracing::debug!(%from, size, "serialosc datagram");

            for message in decode(&buf[..size])? {
                let Some(reply) = DaemonReply::parse(&message)? else {
                    tracing::debug!(addr = %message.addr, "ignoring serialosc message");
                    continue;
                };

                let notification = match reply {
                    DaemonReply::Device(info) => Notification::DeviceAdded(info),
                    DaemonReply::Added(info) => {
                        self.request_notify().await?;
                        Notification::DeviceAdded(info)
                    }
                    DaemonReply::Removed(info) => {
                        self.request_notify().await?;
                        Notification::DeviceRemoved { id: info.id }
                    }
                };

                if notifications.send(notification).await.is_err() {
                    tracing::debug!("notification channel closed, ending discovery");
                    return Ok(());
                }
            }
        }
    }
}
