// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted in-memory radio, device and channel used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thermlink_bridge::{BluetoothRadio, RemoteDevice, RfcommChannel};
use thermlink_core::error::{Result, ThermlinkError};
use thermlink_core::types::{DeviceClass, DeviceDescriptor};
use uuid::Uuid;

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockChannel {
    connected: AtomicBool,
    closed: AtomicBool,
    fail_connect: AtomicBool,
    stall_connect: AtomicBool,
    fail_writes: AtomicBool,
    written: Mutex<Vec<u8>>,
    writes: AtomicU32,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        let channel = Self::default();
        channel.fail_connect.store(true, Ordering::SeqCst);
        Arc::new(channel)
    }

    /// A channel whose `connect` blocks until the channel is closed.
    pub fn stalling() -> Arc<Self> {
        let channel = Self::default();
        channel.stall_connect.store(true, Ordering::SeqCst);
        Arc::new(channel)
    }

    /// The remote end went away: the channel reports disconnected but has
    /// not been closed locally.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RfcommChannel for MockChannel {
    fn connect(&self) -> Result<()> {
        if self.stall_connect.load(Ordering::SeqCst) {
            while !self.closed.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(ThermlinkError::Connection("socket closed".into()));
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ThermlinkError::Connection(
                "read failed, socket might closed or timeout, read ret: -1".into(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    fn write_all(&self, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(ThermlinkError::NotConnected);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ThermlinkError::Write("Broken pipe".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// Connect outcomes consumed in order; `default` applies once drained.
struct Script {
    planned: VecDeque<bool>,
    default: bool,
}

impl Script {
    fn always(ok: bool) -> Self {
        Self {
            planned: VecDeque::new(),
            default: ok,
        }
    }

    fn next(&mut self) -> bool {
        self.planned.pop_front().unwrap_or(self.default)
    }
}

pub struct MockDevice {
    descriptor: DeviceDescriptor,
    describe_fails: bool,
    stall_secure: bool,
    secure: Mutex<Script>,
    raw: Mutex<Script>,
    secure_opens: AtomicU32,
    raw_opens: AtomicU32,
    last_service: Mutex<Option<Uuid>>,
    last_raw_channel: Mutex<Option<u8>>,
    channels: Mutex<Vec<Arc<MockChannel>>>,
}

impl MockDevice {
    /// A device that accepts the secure strategy.
    pub fn new(name: Option<&str>, class: DeviceClass) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                address: "00:11:22:33:44:55".into(),
                name: name.map(str::to_owned),
                class,
                service_ids: None,
            },
            describe_fails: false,
            stall_secure: false,
            secure: Mutex::new(Script::always(true)),
            raw: Mutex::new(Script::always(true)),
            secure_opens: AtomicU32::new(0),
            raw_opens: AtomicU32::new(0),
            last_service: Mutex::new(None),
            last_raw_channel: Mutex::new(None),
            channels: Mutex::new(Vec::new()),
        }
    }

    pub fn printer() -> Self {
        Self::new(Some("HP LaserJet"), DeviceClass::printer())
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.descriptor.address = address.into();
        self
    }

    pub fn with_services(mut self, ids: Vec<Uuid>) -> Self {
        self.descriptor.service_ids = Some(ids);
        self
    }

    pub fn failing_describe(mut self) -> Self {
        self.describe_fails = true;
        self
    }

    /// Secure channels never finish connecting on their own.
    pub fn stalling_secure(mut self) -> Self {
        self.stall_secure = true;
        self
    }

    pub fn secure_always(self, ok: bool) -> Self {
        *self.secure.lock().unwrap() = Script::always(ok);
        self
    }

    pub fn secure_script(self, planned: &[bool], default: bool) -> Self {
        *self.secure.lock().unwrap() = Script {
            planned: planned.iter().copied().collect(),
            default,
        };
        self
    }

    pub fn raw_script(self, planned: &[bool], default: bool) -> Self {
        *self.raw.lock().unwrap() = Script {
            planned: planned.iter().copied().collect(),
            default,
        };
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn secure_opens(&self) -> u32 {
        self.secure_opens.load(Ordering::SeqCst)
    }

    pub fn raw_opens(&self) -> u32 {
        self.raw_opens.load(Ordering::SeqCst)
    }

    pub fn last_service(&self) -> Option<Uuid> {
        *self.last_service.lock().unwrap()
    }

    pub fn last_raw_channel(&self) -> Option<u8> {
        *self.last_raw_channel.lock().unwrap()
    }

    /// Every channel handed out, in order.
    pub fn channels(&self) -> Vec<Arc<MockChannel>> {
        self.channels.lock().unwrap().clone()
    }

    fn hand_out(&self, ok: bool, stall: bool) -> Arc<dyn RfcommChannel> {
        let channel = if stall {
            MockChannel::stalling()
        } else if ok {
            MockChannel::new()
        } else {
            MockChannel::refusing()
        };
        self.channels.lock().unwrap().push(Arc::clone(&channel));
        channel
    }
}

impl RemoteDevice for MockDevice {
    fn address(&self) -> &str {
        &self.descriptor.address
    }

    fn describe(&self) -> Result<DeviceDescriptor> {
        if self.describe_fails {
            return Err(ThermlinkError::Bridge(
                "java.lang.SecurityException: Need BLUETOOTH_CONNECT permission".into(),
            ));
        }
        Ok(self.descriptor.clone())
    }

    fn open_secure(&self, service: Uuid) -> Result<Arc<dyn RfcommChannel>> {
        self.secure_opens.fetch_add(1, Ordering::SeqCst);
        *self.last_service.lock().unwrap() = Some(service);
        let ok = self.secure.lock().unwrap().next();
        Ok(self.hand_out(ok, self.stall_secure))
    }

    fn open_raw(&self, channel: u8) -> Result<Arc<dyn RfcommChannel>> {
        self.raw_opens.fetch_add(1, Ordering::SeqCst);
        *self.last_raw_channel.lock().unwrap() = Some(channel);
        let ok = self.raw.lock().unwrap().next();
        Ok(self.hand_out(ok, false))
    }
}

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRadio {
    devices: Vec<Arc<dyn RemoteDevice>>,
    enumeration_fails: bool,
    cancels: AtomicU32,
}

impl MockRadio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_devices(devices: Vec<Arc<dyn RemoteDevice>>) -> Arc<Self> {
        Arc::new(Self {
            devices,
            ..Default::default()
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            enumeration_fails: true,
            ..Default::default()
        })
    }

    pub fn discovery_cancels(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl BluetoothRadio for MockRadio {
    fn platform_name(&self) -> &str {
        "mock"
    }

    fn cancel_discovery(&self) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn bonded_devices(&self) -> Result<Vec<Arc<dyn RemoteDevice>>> {
        if self.enumeration_fails {
            return Err(ThermlinkError::Bridge("adapter turned off".into()));
        }
        Ok(self.devices.clone())
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Records every callback as a short string, in delivery order.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

impl crate::orchestrator::PrintListener for RecordingListener {
    fn on_connecting(&self) {
        self.push("connecting");
    }

    fn on_connected(&self) {
        self.push("connected");
    }

    fn on_printing(&self) {
        self.push("printing");
    }

    fn on_printed(&self) {
        self.push("printed");
    }

    fn on_success(&self) {
        self.push("success");
    }

    fn on_error(&self, message: &str) {
        self.push(format!("error: {message}"));
    }
}
