//! `CommandMessage` schema of the firmware-info service.
//!
//! Only the fields provisioning touches are declared; prost skips the rest.

/// Top-level message on the firmware-info channel. Requests carry `req`,
/// replies carry `res`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CommandMessage {
    #[prost(message, optional, tag = "1")]
    pub req: Option<Request>,
    #[prost(message, optional, tag = "2")]
    pub res: Option<Response>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Request {
    #[prost(enumeration = "Command", tag = "1")]
    pub cmd: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    #[prost(message, optional, tag = "1")]
    pub dev_info: Option<DeviceInfo>,
}

/// Device identity as reported by the firmware.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceInfo {
    #[prost(string, tag = "1")]
    pub serial_number: String,
}

/// Commands understood by the firmware-info service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Command {
    /// Zero value; also what unknown command codes decode to.
    Unspecified = 0,
    /// Report device identity.
    ReadDeviceInfo = 1,
}
