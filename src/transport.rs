//! Transport trait for device links

use tokio::sync::mpsc;

use crate::Result;

/// Byte-level link to one device
///
/// Transports abstract over the radio stack (BLE UART service, serial
/// bridge, in-memory mock). They deliver inbound notification chunks in
/// arrival order and write outbound command frames; framing and decoding
/// happen above this boundary. Chunk boundaries carry no meaning.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the link to `device_id` and subscribe to notifications.
    ///
    /// Returns the receiving end of a bounded channel of inbound chunks,
    /// created with `capacity`. The transport closes the channel when the
    /// link drops.
    async fn connect(&self, device_id: &str, capacity: usize) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Write one encoded command to the device.
    ///
    /// Failures are reported verbatim and have no effect on receive state.
    async fn send(&self, bytes: &[u8]) -> Result<()>;

    /// Release the link. The default does nothing.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
