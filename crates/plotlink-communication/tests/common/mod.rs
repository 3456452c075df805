//! In-memory serial transport shared by the integration tests

#![allow(dead_code)]

use plotlink_communication::{PortOpener, SerialPort};
use plotlink_core::{ConnectionError, LinkEvent, PortId};
use plotlink_settings::SerialSettings;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// One scripted result for a read
pub enum Inbound {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

/// State shared between a test and every port its opener hands out
#[derive(Clone, Default)]
pub struct MockLink {
    pub written: Arc<Mutex<Vec<String>>>,
    pub inbound: Arc<Mutex<VecDeque<Inbound>>>,
    pub fail_write: Arc<AtomicBool>,
    pub fail_close: Arc<AtomicBool>,
}

impl MockLink {
    pub fn push_data(&self, data: &str) {
        self.inbound
            .lock()
            .unwrap()
            .push_back(Inbound::Data(data.as_bytes().to_vec()));
    }

    pub fn push_error(&self, kind: io::ErrorKind) {
        self.inbound.lock().unwrap().push_back(Inbound::Fail(kind));
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

struct MockPort {
    name: String,
    link: MockLink,
}

impl SerialPort for MockPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.link.fail_write.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        self.link
            .written
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(data).to_string());
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.link.inbound.lock().unwrap().pop_front() {
            Some(Inbound::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Inbound::Fail(kind)) => Err(io::Error::new(kind, "scripted read error")),
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) -> io::Result<()> {
        if self.link.fail_close.load(Ordering::SeqCst) {
            return Err(io::Error::other("close failed"));
        }
        Ok(())
    }
}

/// Opener that counts low-level opens
#[derive(Clone, Default)]
pub struct MockOpener {
    pub link: MockLink,
    pub opens: Arc<AtomicUsize>,
    pub fail_open: Arc<AtomicBool>,
}

impl MockOpener {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl PortOpener for MockOpener {
    fn open(
        &self,
        port: &PortId,
        _settings: &SerialSettings,
    ) -> plotlink_core::Result<Box<dyn SerialPort>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ConnectionError::FailedToOpen {
                port: port.to_string(),
                reason: "device busy".to_string(),
            }
            .into());
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPort {
            name: port.to_string(),
            link: self.link.clone(),
        }))
    }
}

/// Wait for the first event matching `matches`, skipping others
pub async fn next_event(
    rx: &mut broadcast::Receiver<LinkEvent>,
    matches: impl Fn(&LinkEvent) -> bool,
) -> LinkEvent {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    };

    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for event")
}

/// Poll `condition` until it holds or five seconds pass
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
