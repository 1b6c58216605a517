//! Command surface for the presentation layer.
//! A `SessionHandle` posts commands into the session queue and waits for the
//! processing loop to accept or reject them. Acceptance only means the
//! request was issued to the radio; outcomes show up in the observed state.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::core::bluetooth::bluest_platform::BluestPlatform;
use crate::core::bluetooth::events::{EventSender, PlatformEvent, SessionMessage};
use crate::core::bluetooth::manager::BluetoothManager;
use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::store::{SessionSnapshot, StoreChange};
use crate::core::bluetooth::timer::{RescanTimer, TokioRescanTimer};
use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralId};
use crate::error::BleError;

/// Commands the presentation layer can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    StartScan,
    StopScan,
    Connect(PeripheralId),
    Disconnect,
    ToggleCharacteristic(CharacteristicHandle),
    ReadValue(CharacteristicHandle),
    SetNotify(CharacteristicHandle, bool),
}

/// Operations offered to the presentation layer
#[async_trait]
pub trait LightingSession: Send + Sync {
    async fn start_scan(&self) -> Result<(), BleError>;
    async fn stop_scan(&self) -> Result<(), BleError>;
    async fn connect(&self, peripheral: PeripheralId) -> Result<(), BleError>;
    async fn disconnect(&self) -> Result<(), BleError>;
    async fn toggle_characteristic(&self, characteristic: CharacteristicHandle) -> Result<(), BleError>;
    async fn read_value(&self, characteristic: CharacteristicHandle) -> Result<(), BleError>;
    async fn set_notify(&self, characteristic: CharacteristicHandle, enabled: bool) -> Result<(), BleError>;
}

/// The single queue every input of a session goes through.
pub struct SessionQueue {
    tx: mpsc::UnboundedSender<SessionMessage>,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
}

impl Default for SessionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Sender for the platform and the rescan timer.
    pub fn sender(&self) -> EventSender {
        EventSender::new(self.tx.clone())
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMessage>,
    snapshots: watch::Receiver<SessionSnapshot>,
    changes: broadcast::Sender<StoreChange>,
}

impl SessionHandle {
    async fn execute(&self, command: SessionCommand) -> Result<(), BleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionMessage::Command(command, reply_tx))
            .map_err(|_| BleError::SessionClosed)?;
        reply_rx.await.map_err(|_| BleError::SessionClosed)?
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Granular change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Posts a platform event as if the radio had delivered it.
    pub fn inject(&self, event: PlatformEvent) -> Result<(), BleError> {
        self.tx
            .send(SessionMessage::Platform(event))
            .map_err(|_| BleError::SessionClosed)
    }

    pub fn rescan_tick(&self, generation: u64) -> Result<(), BleError> {
        self.tx
            .send(SessionMessage::RescanTick(generation))
            .map_err(|_| BleError::SessionClosed)
    }

    /// Stops scanning, disconnects, and ends the processing loop.
    pub async fn shutdown(&self) -> Result<(), BleError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(SessionMessage::Shutdown(done_tx))
            .map_err(|_| BleError::SessionClosed)?;
        done_rx.await.map_err(|_| BleError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl LightingSession for SessionHandle {
    async fn start_scan(&self) -> Result<(), BleError> {
        self.execute(SessionCommand::StartScan).await
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.execute(SessionCommand::StopScan).await
    }

    async fn connect(&self, peripheral: PeripheralId) -> Result<(), BleError> {
        self.execute(SessionCommand::Connect(peripheral)).await
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.execute(SessionCommand::Disconnect).await
    }

    async fn toggle_characteristic(&self, characteristic: CharacteristicHandle) -> Result<(), BleError> {
        self.execute(SessionCommand::ToggleCharacteristic(characteristic)).await
    }

    async fn read_value(&self, characteristic: CharacteristicHandle) -> Result<(), BleError> {
        self.execute(SessionCommand::ReadValue(characteristic)).await
    }

    async fn set_notify(&self, characteristic: CharacteristicHandle, enabled: bool) -> Result<(), BleError> {
        self.execute(SessionCommand::SetNotify(characteristic, enabled)).await
    }
}

/// Spawns the processing loop on the current tokio runtime.
pub fn spawn_session(
    config: &AppConfig,
    queue: SessionQueue,
    platform: Arc<dyn BlePlatform>,
    timer: Box<dyn RescanTimer>,
) -> (SessionHandle, JoinHandle<()>) {
    let manager = BluetoothManager::new(config, platform, timer);
    let (snapshot_tx, snapshot_rx) = watch::channel(manager.snapshot());
    let handle = SessionHandle {
        tx: queue.tx,
        snapshots: snapshot_rx,
        changes: manager.change_sender(),
    };
    let task = tokio::spawn(manager.run(queue.rx, snapshot_tx));
    (handle, task)
}

/// Opens the default adapter and runs a session on it.
pub async fn start_bluest_session(config: &AppConfig) -> Result<(SessionHandle, JoinHandle<()>)> {
    let queue = SessionQueue::new();
    let platform = BluestPlatform::open(queue.sender()).await?;
    let timer = TokioRescanTimer::new(queue.sender());

    platform.watch_power_state();
    info!("Initializing Bluetooth session...");
    Ok(spawn_session(config, queue, Arc::new(platform), Box::new(timer)))
}
