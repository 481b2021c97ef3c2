//! Firmware-info codec.

use prost::Message;

use crate::messages::{CommandMessage, DeviceInfo, Request, Response};
use crate::{Command, FwInfoResult};

/// Encoding of the firmware-info channel as seen by provisioning.
pub trait FwInfoCodec: Send + Sync {
    /// Build the read-device-info request payload.
    fn encode_request(&self) -> Vec<u8>;

    /// Extract the serial number from a response payload.
    ///
    /// Returns `Ok(None)` for a well-formed message that carries no device info.
    fn decode_serial(&self, payload: &[u8]) -> FwInfoResult<Option<String>>;
}

/// Protobuf codec for `CommandMessage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoFwInfoCodec;

impl ProtoFwInfoCodec {
    /// Encode a request carrying `command`.
    pub fn encode_command(command: Command) -> Vec<u8> {
        CommandMessage {
            req: Some(Request {
                cmd: command as i32,
            }),
            res: None,
        }
        .encode_to_vec()
    }

    /// Decode the command of a request message, if it is one.
    ///
    /// Unknown command codes decode to [`Command::Unspecified`].
    pub fn decode_command(payload: &[u8]) -> FwInfoResult<Option<Command>> {
        let message = CommandMessage::decode(payload)?;
        Ok(message.req.map(|req| req.cmd()))
    }

    /// Encode a device-info response, as the firmware sends it.
    pub fn encode_device_info(serial_number: &str) -> Vec<u8> {
        CommandMessage {
            req: None,
            res: Some(Response {
                dev_info: Some(DeviceInfo {
                    serial_number: serial_number.to_string(),
                }),
            }),
        }
        .encode_to_vec()
    }
}

impl FwInfoCodec for ProtoFwInfoCodec {
    fn encode_request(&self) -> Vec<u8> {
        Self::encode_command(Command::ReadDeviceInfo)
    }

    fn decode_serial(&self, payload: &[u8]) -> FwInfoResult<Option<String>> {
        let message = CommandMessage::decode(payload)?;
        Ok(message
            .res
            .and_then(|res| res.dev_info)
            .map(|info| info.serial_number))
    }
}
