use std::{future::Future, net::IpAddr};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    AnimationController, AppConfig, GridSink, OutputFactory, Result, StopHandle, ToneQueue,
    TonePlayer, WaveGridError,
};

/// A device announced by the discovery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub kind: String,
    pub port: u16,
}

/// Identity and size reported by a grid once its handshake completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridInfo {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

/// Everything the connection manager reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    DeviceAdded(DeviceInfo),
    DeviceRemoved { id: String },
    GridReady(GridInfo),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Discovering,
    Connected,
    Ready,
    Animating,
}

impl ConnectionState {
    /// Transitions only move forward, except that any live state may drop back
    /// to `Disconnected` on stop or connection loss.
    pub fn permits(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Discovering)
                | (Discovering, Connected)
                | (Connected, Ready)
                | (Ready, Animating)
                | (Discovering | Connected | Ready | Animating, Disconnected)
        )
    }
}

/// Opens grids. Readiness is reported separately, as a
/// [`Notification::GridReady`].
pub trait GridConnector {
    type Grid: GridSink + 'static;

    fn connect(&mut self, host: IpAddr, port: u16) -> impl Future<Output = Result<Self::Grid>>;
}

/// Whether the manager should keep consuming notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

struct Session {
    stop: StopHandle,
    animation: JoinHandle<()>,
    player: Option<TonePlayer>,
}

/// Owns the connection lifecycle: connect on discovery, animate on ready,
/// stop on removal or shutdown. Only one grid is driven at a time.
pub struct ConnectionManager<C: GridConnector> {
    config: AppConfig,
    connector: C,
    audio: Option<OutputFactory>,
    state: ConnectionState,
    device: Option<DeviceInfo>,
    grid: Option<C::Grid>,
    session: Option<Session>,
}

impl<C: GridConnector> ConnectionManager<C> {
    pub fn new(config: AppConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            audio: None,
            state: ConnectionState::Disconnected,
            device: None,
            grid: None,
            session: None,
        }
    }

    /// Plays tones through outputs created by `factory`.
    pub fn with_audio(mut self, factory: OutputFactory) -> Self {
        self.audio = Some(factory);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Consumes notifications until `Shutdown` arrives or every sender is gone,
    /// then stops any running animation. Connection errors end the run.
    pub async fn run(mut self, mut notifications: mpsc::Receiver<Notification>) -> Result<()> {
        self.begin_discovery();

        let result = loop {
            let Some(notification) = notifications.recv().await else {
                break Ok(());
            };
            match self.handle(notification).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        self.disconnect().await;
        result
    }

    pub async fn handle(&mut self, notification: Notification) -> Result<Flow> {
        match notification {
            Notification::DeviceAdded(info) => self.on_device_added(info).await?,
            Notification::GridReady(info) => self.on_grid_ready(info),
            Notification::DeviceRemoved { id } => self.on_device_removed(&id).await,
            Notification::Shutdown => {
                tracing::info!("shutdown requested");
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    fn begin_discovery(&mut self) {
        self.transition(ConnectionState::Discovering);
    }

    async fn on_device_added(&mut self, info: DeviceInfo) -> Result<()> {
        if self.state != ConnectionState::Discovering {
            tracing::info!(id = %info.id, kind = %info.kind, "already driving a grid, ignoring device");
            return Ok(());
        }

        let host = self.config.serialosc.host;
        tracing::info!(id = %info.id, kind = %info.kind, %host, port = info.port, "connecting");
        let grid = self
            .connector
            .connect(host, info.port)
            .await
            .map_err(|err| match err {
                WaveGridError::Connection(_) => err,
                other => WaveGridError::connection(format!("connecting to {}: {other}", info.id)),
            })?;

        self.grid = Some(grid);
        self.device = Some(info);
        self.transition(ConnectionState::Connected);
        Ok(())
    }

    fn on_grid_ready(&mut self, info: GridInfo) {
        if self.state != ConnectionState::Connected {
            tracing::warn!(id = %info.id, state = ?self.state, "unexpected grid ready, ignoring");
            return;
        }
        let Some(grid) = self.grid.take() else {
            tracing::warn!(id = %info.id, "grid ready without a connection, ignoring");
            return;
        };

        let size = self.config.wave.grid_size;
        if info.width as usize != size || info.height as usize != size {
            tracing::warn!(
                width = info.width,
                height = info.height,
                size,
                "grid size differs from the configured bitmap"
            );
        }

        self.transition(ConnectionState::Ready);
        self.session = Some(self.start_animation(grid));
        self.transition(ConnectionState::Animating);
    }

    fn start_animation(&mut self, grid: C::Grid) -> Session {
        let stop = StopHandle::new();
        let player = self.spawn_player(&stop);

        let mut controller: AnimationController<C::Grid, ToneQueue> =
            AnimationController::new(&self.config, grid).with_stop_handle(stop.clone());
        if let Some(player) = &player {
            controller = controller.with_tones(player.queue());
        }

        let animation = tokio::spawn(async move { controller.start().await });
        Session {
            stop,
            animation,
            player,
        }
    }

    fn spawn_player(&mut self, stop: &StopHandle) -> Option<TonePlayer> {
        if !self.config.tone.enabled {
            return None;
        }
        let factory = self.audio.as_mut()?;

        match factory() {
            Ok(output) => Some(TonePlayer::spawn(
                output,
                stop.clone(),
                self.config.tone.queue_capacity,
            )),
            Err(err) => {
                tracing::warn!(%err, "audio unavailable, animating without tones");
                None
            }
        }
    }

    async fn on_device_removed(&mut self, id: &str) {
        if self.device.as_ref().map(|device| device.id.as_str()) != Some(id) {
            tracing::debug!(id, "ignoring removal of an unused device");
            return;
        }

        tracing::info!(id, "grid removed");
        self.disconnect().await;
        self.begin_discovery();
    }

    /// Stops the session, if any, and forgets the current device.
    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop.stop();
            if let Err(err) = session.animation.await {
                tracing::error!(%err, "animation task failed");
            }
            if let Some(player) = session.player {
                player.join().await;
            }
        }

        self.grid = None;
        self.device = None;
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if !self.state.permits(next) {
            tracing::warn!(from = ?self.state, to = ?next, "unexpected connection transition");
        }
        tracing::info!(from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }
}
