//! Serial port communication implementation
//!
//! Provides low-level serial port operations for a direct USB/RS-232 link
//! to the plotter controller.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate, data bit, stop bit and flow control configuration
//! - Short-timeout reads so reader workers stay responsive to close

use plotlink_core::{ConnectionError, PortId, Result};
use plotlink_settings::SerialSettings;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Kind of device backing a serial port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// USB serial adapter or CDC-ACM device
    Usb,
    /// Bluetooth serial profile
    Bluetooth,
    /// PCI/on-board UART
    Pci,
    /// Anything the driver could not classify
    Unknown,
}

/// Information about an available serial port
///
/// Only the name is guaranteed; the rest depends on what the platform
/// driver exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Kind of device
    pub kind: PortKind,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Product name if available
    pub product: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            kind: PortKind::Unknown,
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// The identifier to open this port with
    pub fn port_id(&self) -> PortId {
        PortId::new(&self.port_name)
    }

    /// Check if the port name matches the patterns USB controllers enumerate as
    ///
    /// - Windows: COM* (COM1, COM2, etc.)
    /// - Linux: /dev/ttyUSB*, /dev/ttyACM*
    /// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
    pub fn looks_like_controller(&self) -> bool {
        let name = self.port_name.as_str();

        if let Some(number) = name.strip_prefix("COM") {
            return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
        }

        name.starts_with("/dev/ttyUSB")
            || name.starts_with("/dev/ttyACM")
            || name.starts_with("/dev/cu.usbserial-")
            || name.starts_with("/dev/cu.usbmodem")
    }
}

impl From<serialport::SerialPortInfo> for SerialPortInfo {
    fn from(port: serialport::SerialPortInfo) -> Self {
        let description = describe_port(&port.port_type);
        let mut info = SerialPortInfo::new(port.port_name, description);

        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                info.kind = PortKind::Usb;
                info.vid = Some(usb.vid);
                info.pid = Some(usb.pid);
                info.manufacturer = usb.manufacturer;
                info.product = usb.product;
                info.serial_number = usb.serial_number;
            }
            serialport::SerialPortType::BluetoothPort => info.kind = PortKind::Bluetooth,
            serialport::SerialPortType::PciPort => info.kind = PortKind::Pci,
            serialport::SerialPortType::Unknown => {}
        }

        info
    }
}

/// List serial ports attached to the system
///
/// An empty list is a valid answer; only a failing platform query is an error.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => {
            let infos: Vec<SerialPortInfo> = ports.into_iter().map(SerialPortInfo::from).collect();
            tracing::debug!("Discovered {} serial port(s)", infos.len());
            Ok(infos)
        }
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::Discovery {
                reason: e.to_string(),
            }
            .into())
        }
    }
}

/// Get a user-friendly description for a port
fn describe_port(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        serialport::SerialPortType::Unknown => "Serial Port".to_string(),
    }
}

/// Low-level serial port interface
pub trait SerialPort: Send {
    /// Write data to the port
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read data from the port
    ///
    /// A read that finds no data within the port timeout returns
    /// `ErrorKind::TimedOut` or `ErrorKind::WouldBlock`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the port name
    fn name(&self) -> String;

    /// Close the port
    fn close(&mut self) -> io::Result<()>;

    /// Write the whole buffer
    fn write_all(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            match self.write(data) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "port accepted no bytes",
                    ))
                }
                Ok(n) => data = &data[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Opens transports for the connection manager
///
/// The manager never talks to the OS directly, so tests can substitute
/// an in-memory port.
pub trait PortOpener: Send + Sync {
    /// Open `port` with the given settings
    fn open(&self, port: &PortId, settings: &SerialSettings) -> Result<Box<dyn SerialPort>>;
}

/// Opens real serial ports through the `serialport` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePortOpener;

impl PortOpener for NativePortOpener {
    fn open(&self, port: &PortId, settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
        Ok(Box::new(RealSerialPort::open(port, settings)?))
    }
}

/// Real serial port implementation using serialport crate
pub struct RealSerialPort {
    name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl RealSerialPort {
    /// Open a serial port with the given parameters
    pub fn open(port: &PortId, settings: &SerialSettings) -> Result<Self> {
        let data_bits = match settings.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(ConnectionError::InvalidParameters {
                    reason: format!("invalid data bits: {}", other),
                }
                .into())
            }
        };

        let stop_bits = match settings.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(ConnectionError::InvalidParameters {
                    reason: format!("invalid stop bits: {}", other),
                }
                .into())
            }
        };

        let builder = serialport::new(port.as_str(), settings.baud_rate)
            .timeout(Duration::from_millis(settings.read_timeout_ms))
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(serialport::Parity::None)
            .flow_control(if settings.flow_control {
                serialport::FlowControl::Hardware
            } else {
                serialport::FlowControl::None
            });

        match builder.open() {
            Ok(handle) => Ok(RealSerialPort {
                name: port.to_string(),
                port: Some(handle),
            }),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", port, e);
                Err(ConnectionError::FailedToOpen {
                    port: port.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn handle(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))
    }
}

impl SerialPort for RealSerialPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.handle()?.write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle()?.read(buf)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) -> io::Result<()> {
        // Flush before the handle is dropped; a dead link surfaces here.
        match self.port.take() {
            Some(mut handle) => handle.flush(),
            None => Ok(()),
        }
    }
}
