//! Simulated device for integration tests.
//!
//! Speaks the SLIP-mux protocol over an in-memory duplex stream: JSON settings
//! on 0x11 (with signed writes checked against the installed key), device info
//! on 0x12 and the SMP reset on 0x10, which drops the connection.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::BoxFuture;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use devprov_fwinfo::{Command, ProtoFwInfoCodec};
use devprov_runner::config::DEFAULT_RESTART_COMMAND;
use devprov_runner::{BoxedStream, Connector, HexBytes, ProvisionConfig};
use devprov_settings::{
    Settings, SettingsAuthorizer, CONTROL_KEYS, KEY_ACL_0, KEY_CONTENT, KEY_KEY_0, KEY_LOCK,
    KEY_SERIAL, KEY_SIGNATURE,
};
use slipmux_frame::{encode_frame, FrameExtractor};

pub const SERIAL: &str = "ABC123";
pub const KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];

const SETTINGS_ADDR: u8 = 0x11;
const FWINFO_ADDR: u8 = 0x12;
const SERVICE_ADDR: u8 = 0x10;

/// Provisioning config pointing at the simulated device.
pub fn test_config() -> ProvisionConfig {
    ProvisionConfig {
        auth_key: Some(HexBytes(KEY.to_vec())),
        ..Default::default()
    }
}

/// How the simulated device misbehaves.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Start locked with [`KEY`] installed.
    pub locked: bool,
    /// Accept lock writes but never apply them.
    pub ignore_lock: bool,
    /// Accept ACL writes but never apply them.
    pub ignore_acl: bool,
    /// Serial to report; `None` never answers firmware-info requests.
    pub serial: Option<String>,
    /// Never answer settings reads.
    pub silent: bool,
    /// Never answer settings reads once restarted.
    pub silent_after_restart: bool,
    /// Refuse this many connection attempts after a restart.
    pub refuse_after_restart: u32,
    /// Split settings replies into frames of at most this many bytes.
    pub chunk_size: usize,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            locked: false,
            ignore_lock: false,
            ignore_acl: false,
            serial: Some(SERIAL.to_string()),
            silent: false,
            silent_after_restart: false,
            refuse_after_restart: 0,
            chunk_size: usize::MAX,
        }
    }
}

/// Observable device state.
#[derive(Debug, Default)]
pub struct DeviceState {
    /// Readable settings.
    pub settings: Settings,
    /// Installed signing key (write-only on the wire).
    pub key: Option<Vec<u8>>,
    /// Plain settings writes, in order.
    pub writes: Vec<Settings>,
    /// Signed writes that verified and were applied.
    pub signed_writes: usize,
    /// Writes that were refused.
    pub rejected_writes: usize,
    pub fwinfo_requests: usize,
    pub restarts: usize,
    pub connects: usize,
    pub refused: u32,
}

enum Action {
    Reply(Vec<Vec<u8>>),
    Close,
}

pub struct SimDevice {
    behavior: Behavior,
    state: Mutex<DeviceState>,
}

impl SimDevice {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        let mut state = DeviceState::default();
        state.settings.insert("app/name".into(), json!("sensor"));
        state.settings.insert("app/brightness".into(), json!(50));
        if behavior.locked {
            state.settings.insert(KEY_LOCK.into(), json!(true));
            state.key = Some(KEY.to_vec());
        }
        Arc::new(SimDevice {
            behavior,
            state: Mutex::new(state),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        Arc::new(SimConnector {
            device: self.clone(),
        })
    }

    async fn serve(self: Arc<Self>, mut stream: DuplexStream) {
        let mut extractor = FrameExtractor::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            for frame in extractor.push(&buf[..n]).into_iter().flatten() {
                match self.handle(frame.address, &frame.payload) {
                    Action::Reply(frames) => {
                        for bytes in frames {
                            if stream.write_all(&bytes).await.is_err() {
                                return;
                            }
                        }
                    }
                    Action::Close => return,
                }
            }
        }
    }

    fn handle(&self, address: u8, payload: &[u8]) -> Action {
        match address {
            SETTINGS_ADDR => self.handle_settings(payload),
            FWINFO_ADDR => self.handle_fwinfo(payload),
            SERVICE_ADDR if payload == DEFAULT_RESTART_COMMAND => {
                self.state.lock().restarts += 1;
                Action::Close
            }
            _ => Action::Reply(Vec::new()),
        }
    }

    fn handle_settings(&self, payload: &[u8]) -> Action {
        let Ok(request) = serde_json::from_slice::<Settings>(payload) else {
            return Action::Reply(Vec::new());
        };
        let mut state = self.state.lock();

        if request.is_empty() {
            let silent = self.behavior.silent
                || (self.behavior.silent_after_restart && state.restarts > 0);
            if silent {
                return Action::Reply(Vec::new());
            }
            let json = serde_json::to_vec(&state.settings).unwrap_or_default();
            let frames = json
                .chunks(self.behavior.chunk_size.max(1))
                .map(|chunk| encode_frame(SETTINGS_ADDR, chunk))
                .collect();
            return Action::Reply(frames);
        }

        if request.contains_key(KEY_CONTENT) {
            match self.check_signed(&state, &request) {
                Some(content) => {
                    apply(&mut state, &content, &[]);
                    state.signed_writes += 1;
                }
                None => state.rejected_writes += 1,
            }
            return Action::Reply(Vec::new());
        }

        if devprov_settings::is_locked(&state.settings) {
            state.rejected_writes += 1;
            return Action::Reply(Vec::new());
        }
        let ignored: Vec<&str> = [
            (self.behavior.ignore_lock, KEY_LOCK),
            (self.behavior.ignore_acl, KEY_ACL_0),
        ]
        .into_iter()
        .filter_map(|(ignore, key)| ignore.then_some(key))
        .collect();
        apply(&mut state, &request, &ignored);
        state.writes.push(request);
        Action::Reply(Vec::new())
    }

    /// Verify a signed write and return its settings (serial removed).
    fn check_signed(&self, state: &DeviceState, request: &Settings) -> Option<Settings> {
        let key = state.key.as_ref()?;
        let cnt = request.get(KEY_CONTENT)?.as_str()?;
        let sig = request.get(KEY_SIGNATURE)?.as_str()?;

        let json = BASE64.decode(cnt).ok()?;
        let mut content: Settings = serde_json::from_slice(&json).ok()?;
        let serial = content.remove(KEY_SERIAL)?;
        if serial.as_str() != self.behavior.serial.as_deref() {
            return None;
        }

        // Re-signing the same content must reproduce the envelope exactly.
        let expected = SettingsAuthorizer::new(key)
            .ok()?
            .sign(&content, serial.as_str()?)
            .ok()?;
        (expected.content == cnt && expected.signature == sig).then_some(content)
    }

    fn handle_fwinfo(&self, payload: &[u8]) -> Action {
        if !matches!(
            ProtoFwInfoCodec::decode_command(payload),
            Ok(Some(Command::ReadDeviceInfo))
        ) {
            return Action::Reply(Vec::new());
        }
        self.state.lock().fwinfo_requests += 1;
        match &self.behavior.serial {
            Some(serial) => {
                let reply = ProtoFwInfoCodec::encode_device_info(serial);
                Action::Reply(vec![encode_frame(FWINFO_ADDR, &reply)])
            }
            None => Action::Reply(Vec::new()),
        }
    }
}

/// Store `settings`, skipping control keys and any key in `ignored`.
fn apply(state: &mut DeviceState, settings: &Settings, ignored: &[&str]) {
    for (key, value) in settings {
        if CONTROL_KEYS.contains(&key.as_str()) {
            continue;
        }
        if key == KEY_KEY_0 {
            state.key = value.as_str().and_then(|v| BASE64.decode(v).ok());
            continue;
        }
        if ignored.contains(&key.as_str()) {
            continue;
        }
        state.settings.insert(key.clone(), value.clone());
    }
}

struct SimConnector {
    device: Arc<SimDevice>,
}

impl Connector for SimConnector {
    fn connect(&self) -> BoxFuture<'_, io::Result<BoxedStream>> {
        Box::pin(async move {
            {
                let mut state = self.device.state.lock();
                if state.restarts > 0 && state.refused < self.device.behavior.refuse_after_restart {
                    state.refused += 1;
                    return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
                }
                state.connects += 1;
            }
            let (client, server) = duplex(8192);
            tokio::spawn(self.device.clone().serve(server));
            Ok(Box::new(client) as BoxedStream)
        })
    }

    fn describe(&self) -> String {
        "sim".to_string()
    }
}

/// A connector that never connects.
pub struct RefusingConnector;

impl Connector for RefusingConnector {
    fn connect(&self) -> BoxFuture<'_, io::Result<BoxedStream>> {
        Box::pin(async { Err(io::Error::from(io::ErrorKind::ConnectionRefused)) })
    }

    fn describe(&self) -> String {
        "refusing".to_string()
    }
}

/// Value of a readable setting.
pub fn setting(device: &SimDevice, key: &str) -> Option<Value> {
    device.state().settings.get(key).cloned()
}
