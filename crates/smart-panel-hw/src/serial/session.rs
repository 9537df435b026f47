//! Ownership of one serial device and its traffic.
//!
//! An open session runs a link task that owns the OS handle. Reads are
//! published as [`TransportEvent`]s as soon as they arrive; writes and buffer
//! clears are forwarded to the task over a command channel. Dropping the
//! task drops the handle, which closes the device.

use super::backend::{SerialBackend, SerialLink, SystemSerial};
use super::config::PortConfig;
use super::events::{TransportEvent, EVENT_CAPACITY};
use crate::frame::pack_command;
use crate::{Error, Result};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Size of a single read from the device.
const READ_BUFFER_SIZE: usize = 4096;

/// Pending commands per link.
const COMMAND_CAPACITY: usize = 32;

/// Requests handled by the link task.
enum LinkCommand {
    Write {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    Clear {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// State shared between the session and its link task.
#[derive(Debug, Default)]
struct LinkShared {
    bytes_received: AtomicU64,
    hex_mode: AtomicBool,
}

/// A running link task.
struct LinkHandle {
    commands: mpsc::Sender<LinkCommand>,
    task: JoinHandle<()>,
}

/// Session owning at most one open serial device.
pub struct PortSession<B: SerialBackend = SystemSerial> {
    backend: B,
    events: broadcast::Sender<TransportEvent>,
    shared: Arc<LinkShared>,
    link: Option<LinkHandle>,
    device: Option<String>,
    config: PortConfig,
    bytes_sent: u64,
}

impl Default for PortSession<SystemSerial> {
    fn default() -> Self {
        Self::new(SystemSerial)
    }
}

impl<B: SerialBackend> PortSession<B> {
    /// Creates a closed session using `backend` for device access.
    pub fn new(backend: B) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            events,
            shared: Arc::new(LinkShared::default()),
            link: None,
            device: None,
            config: PortConfig::default(),
            bytes_sent: 0,
        }
    }

    /// Subscribes to this session's events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    /// Lists devices the backend can open.
    pub fn available_ports(&self) -> Result<Vec<String>> {
        self.backend.available_ports()
    }

    /// Opens `device` with `config`, closing any device already open.
    ///
    /// Failures are also published as [`TransportEvent::ErrorOccurred`].
    pub async fn open(&mut self, device: &str, config: &PortConfig) -> Result<()> {
        if let Some(link) = self.link.take() {
            debug!("Replacing open device {:?}", self.device);
            Self::stop_link(link).await;
        }

        let link = match self.backend.open(device, config) {
            Ok(link) => link,
            Err(e) => {
                warn!("Failed to open serial port {}: {}", device, e);
                self.emit(TransportEvent::ErrorOccurred(format!(
                    "failed to open {}: {}",
                    device, e
                )));
                return Err(e);
            }
        };

        self.device = Some(device.to_string());
        self.config = config.clone();

        info!("Serial port {} opened ({})", device, config);
        self.emit(TransportEvent::PortOpened {
            device: device.to_string(),
        });
        self.emit(TransportEvent::StatusMessage(format!(
            "serial port opened: {}",
            device
        )));

        // Reads start only after subscribers have seen the open
        self.link = Some(self.spawn_link(link, device));
        Ok(())
    }

    /// Opens `device` with default settings at `baud_rate`.
    pub async fn open_with_baud(&mut self, device: &str, baud_rate: u32) -> Result<()> {
        self.open(device, &PortConfig::with_baud_rate(baud_rate))
            .await
    }

    /// Re-opens the last device with the last configuration.
    ///
    /// Runtime faults never close or reopen the port on their own; consumers
    /// of [`TransportEvent::ErrorOccurred`] call this to recover.
    pub async fn reconnect(&mut self) -> Result<()> {
        let device = self.device.clone().ok_or(Error::NotConfigured)?;
        let config = self.config.clone();
        self.open(&device, &config).await
    }

    /// Closes the device. Does nothing if already closed.
    pub async fn close(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        Self::stop_link(link).await;

        info!("Serial port {:?} closed", self.device);
        self.emit(TransportEvent::PortClosed);
        self.emit(TransportEvent::StatusMessage(
            "serial port closed".to_string(),
        ));
    }

    /// Returns true while a device is open.
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Name of the last device opened successfully.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Configuration of the last successful open.
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Total bytes written since the session was created.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Total bytes read since the session was created.
    pub fn bytes_received(&self) -> u64 {
        self.shared.bytes_received.load(Ordering::Relaxed)
    }

    /// Selects hex or text for the convenience receive event.
    ///
    /// Does not change what goes over the wire.
    pub fn set_hex_mode(&self, enabled: bool) {
        self.shared.hex_mode.store(enabled, Ordering::Relaxed);
    }

    /// Returns the hex mode flag.
    pub fn hex_mode(&self) -> bool {
        self.shared.hex_mode.load(Ordering::Relaxed)
    }

    /// Writes `data` to the device.
    ///
    /// Sending while closed is a silent no-op: nothing is written, counted or
    /// published.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let Some(link) = &self.link else {
            return Ok(());
        };

        let (reply, response) = oneshot::channel();
        let command = LinkCommand::Write {
            data: data.to_vec(),
            reply,
        };
        let result = match link.commands.send(command).await {
            Ok(()) => response.await.unwrap_or(Err(Error::LinkDown)),
            Err(_) => Err(Error::LinkDown),
        };

        if let Err(e) = result {
            warn!("Serial write failed: {}", e);
            self.emit(TransportEvent::ErrorOccurred(e.to_string()));
            return Err(e);
        }

        let count = data.len() as u64;
        self.bytes_sent += count;
        debug!("Sent {} bytes: {:02X?}", count, data);
        self.emit(TransportEvent::BytesSent(count));
        self.emit(TransportEvent::DataSent {
            data: data.to_vec(),
            hex_mode: self.hex_mode(),
        });
        Ok(())
    }

    /// Writes the UTF-8 bytes of `text`.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(text.as_bytes()).await
    }

    /// Packs `command` and `payload` into a frame and writes it.
    pub async fn send_command(&mut self, command: u16, payload: &[u8]) -> Result<()> {
        match pack_command(command, payload) {
            Ok(frame) => self.send(&frame).await,
            Err(e) => {
                self.emit(TransportEvent::ErrorOccurred(e.to_string()));
                Err(e)
            }
        }
    }

    /// Discards pending input and output in the OS buffers. No-op when closed.
    pub async fn clear_buffers(&mut self) -> Result<()> {
        let Some(link) = &self.link else {
            return Ok(());
        };

        let (reply, response) = oneshot::channel();
        let result = match link.commands.send(LinkCommand::Clear { reply }).await {
            Ok(()) => response.await.unwrap_or(Err(Error::LinkDown)),
            Err(_) => Err(Error::LinkDown),
        };

        if let Err(e) = &result {
            warn!("Failed to clear serial buffers: {}", e);
            self.emit(TransportEvent::ErrorOccurred(e.to_string()));
        }
        result
    }

    fn emit(&self, event: TransportEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn spawn_link(&self, link: B::Link, device: &str) -> LinkHandle {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let task = tokio::spawn(run_link(
            link,
            command_rx,
            self.shared.clone(),
            self.events.clone(),
            device.to_string(),
        ));
        LinkHandle { commands, task }
    }

    async fn stop_link(link: LinkHandle) {
        link.task.abort();
        // Cancellation drops the OS handle
        let _ = link.task.await;
    }
}

impl<B: SerialBackend> Drop for PortSession<B> {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
        }
    }
}

async fn run_link<L: SerialLink>(
    mut link: L,
    mut commands: mpsc::Receiver<LinkCommand>,
    shared: Arc<LinkShared>,
    events: broadcast::Sender<TransportEvent>,
    device: String,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = link.read(&mut buf) => match read {
                Ok(0) => {
                    warn!("Serial port {} reported end of stream", device);
                    let _ = events.send(TransportEvent::ErrorOccurred(format!(
                        "{}: device disconnected",
                        device
                    )));
                    break;
                }
                Ok(n) => publish_received(&buf[..n], &shared, &events),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Serial read error on {}: {}", device, e);
                    let _ = events.send(TransportEvent::ErrorOccurred(e.to_string()));
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(LinkCommand::Write { data, reply }) => {
                    let result = write_flush(&mut link, &data).await;
                    let _ = reply.send(result);
                }
                Some(LinkCommand::Clear { reply }) => {
                    let _ = reply.send(link.clear_buffers());
                }
                None => break,
            },
        }
    }

    debug!("Link task for {} stopped", device);
}

async fn write_flush<L: SerialLink>(link: &mut L, data: &[u8]) -> Result<()> {
    link.write_all(data).await?;
    link.flush().await?;
    Ok(())
}

fn publish_received(
    data: &[u8],
    shared: &LinkShared,
    events: &broadcast::Sender<TransportEvent>,
) {
    let count = data.len() as u64;
    shared.bytes_received.fetch_add(count, Ordering::Relaxed);
    debug!("Received {} bytes: {:02X?}", count, data);

    let _ = events.send(TransportEvent::BytesReceived(count));
    let _ = events.send(TransportEvent::DataReceived(data.to_vec()));
    if shared.hex_mode.load(Ordering::Relaxed) {
        let _ = events.send(TransportEvent::DataReceivedHex(data.to_vec()));
    } else {
        let _ = events.send(TransportEvent::DataReceivedText(
            String::from_utf8_lossy(data).into_owned(),
        ));
    }
}
