//! serialosc over OSC/UDP: message codec, typed replies, discovery and grids.
//!
//! Only the subset of the serialosc protocol this application needs is
//! modelled: device listing and add/remove notifications on the daemon side,
//! the `/sys` handshake and varibright LED messages on the grid side.

mod discovery;
mod grid;

pub use discovery::SerialOscClient;
pub use grid::{OscGrid, OscGridConnector, ReadyTracker};

use rosc::{OscMessage, OscPacket, OscType};

use crate::{DeviceInfo, Result, WaveGridError};

/// Encodes a single message.
pub fn encode(addr: &str, args: Vec<OscType>) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(OscMessage {
        addr: addr.to_string(),
        args,
    });
    Ok(rosc::encoder::encode(&packet)?)
}

/// Decodes a datagram, flattening bundles into their messages.
pub fn decode(datagram: &[u8]) -> Result<Vec<OscMessage>> {
    let (_, packet) = rosc::decoder::decode_udp(datagram)?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                flatten(packet, out);
            }
        }
    }
}

/// Replies and notifications sent by the serialosc daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonReply {
    /// Answer to `/serialosc/list`.
    Device(DeviceInfo),
    Added(DeviceInfo),
    Removed(DeviceInfo),
}

impl DaemonReply {
    /// Parses a daemon message. Unknown addresses yield `Ok(None)`; known
    /// addresses with the wrong arguments are protocol errors.
    pub fn parse(message: &OscMessage) -> Result<Option<Self>> {
        let build: fn(DeviceInfo) -> Self = match message.addr.as_str() {
            "/serialosc/device" => DaemonReply::Device,
            "/serialosc/add" => DaemonReply::Added,
            "/serialosc/remove" => DaemonReply::Removed,
            _ => return Ok(None),
        };

        let info = DeviceInfo {
            id: string_arg(message, 0)?.to_string(),
            kind: string_arg(message, 1)?.to_string(),
            port: port_arg(message, 2)?,
        };
        Ok(Some(build(info)))
    }
}

/// Grid replies to `/sys/info`, plus key presses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysReply {
    Id(String),
    Size { width: u32, height: u32 },
    Host(String),
    Port(u16),
    Prefix(String),
    Rotation(i32),
    Key { x: i32, y: i32, down: bool },
}

impl SysReply {
    /// Parses a grid message; `prefix` is the one requested during connect.
    pub fn parse(message: &OscMessage, prefix: &str) -> Result<Option<Self>> {
        let reply = match message.addr.as_str() {
            "/sys/id" => SysReply::Id(string_arg(message, 0)?.to_string()),
            "/sys/size" => SysReply::Size {
                width: dimension_arg(message, 0)?,
                height: dimension_arg(message, 1)?,
            },
            "/sys/host" => SysReply::Host(string_arg(message, 0)?.to_string()),
            "/sys/port" => SysReply::Port(port_arg(message, 0)?),
            "/sys/prefix" => SysReply::Prefix(string_arg(message, 0)?.to_string()),
            "/sys/rotation" => SysReply::Rotation(int_arg(message, 0)?),
            addr if addr.strip_prefix(prefix) == Some("/grid/key") => SysReply::Key {
                x: int_arg(message, 0)?,
                y: int_arg(message, 1)?,
                down: int_arg(message, 2)? != 0,
            },
            _ => return Ok(None),
        };
        Ok(Some(reply))
    }
}

fn string_arg<'a>(message: &'a OscMessage, index: usize) -> Result<&'a str> {
    match message.args.get(index) {
        Some(OscType::String(value)) => Ok(value),
        other => Err(WaveGridError::protocol(format!(
            "{} expects a string at argument {index}, got {other:?}",
            message.addr
        ))),
    }
}

fn int_arg(message: &OscMessage, index: usize) -> Result<i32> {
    match message.args.get(index) {
        Some(OscType::Int(value)) => Ok(*value),
        other => Err(WaveGridError::protocol(format!(
            "{} expects an int at argument {index}, got {other:?}",
            message.addr
        ))),
    }
}

fn port_arg(message: &OscMessage, index: usize) -> Result<u16> {
    let value = int_arg(message, index)?;
    u16::try_from(value).map_err(|_| {
        WaveGridError::protocol(format!("{} carries invalid port {value}", message.addr))
    })
}

fn dimension_arg(message: &OscMessage, index: usize) -> Result<u32> {
    let value = int_arg(message, index)?;
    u32::try_from(value).map_err(|_| {
        WaveGridError::protocol(format!("{} carries invalid size {value}", message.addr))
    })
}

#[cfg(test)]
mod tests {
    use rosc::{OscBundle, OscTime};

    use super::*;

    fn message(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    fn device_args(port: i32) -> Vec<OscType> {
        vec![
            OscType::String("m1000286".to_string()),
            OscType::String("monome 64".to_string()),
            OscType::Int(port),
        ]
    }

    #[test]
    fn parses_daemon_notifications() {
        let added = DaemonReply::parse(&message("/serialosc/add", device_args(14_656)))
            .unwrap()
            .unwrap();
        assert_eq!(
            added,
            DaemonReply::Added(DeviceInfo {
                id: "m1000286".to_string(),
                kind: "monome 64".to_string(),
                port: 14_656,
            })
        );

        let listed = DaemonReply::parse(&message("/serialosc/device", device_args(1)));
        assert!(matches!(listed, Ok(Some(DaemonReply::Device(_)))));

        let removed = DaemonReply::parse(&message("/serialosc/remove", device_args(1)));
        assert!(matches!(removed, Ok(Some(DaemonReply::Removed(_)))));
    }

    #[test]
    fn malformed_daemon_payloads_are_protocol_errors() {
        let missing_port = message(
            "/serialosc/add",
            vec![OscType::String("m1".to_string()), OscType::String("grid".to_string())],
        );
        assert!(matches!(
            DaemonReply::parse(&missing_port),
            Err(WaveGridError::Protocol(_))
        ));

        let bad_port = message("/serialosc/device", device_args(70_000));
        assert!(matches!(
            DaemonReply::parse(&bad_port),
            Err(WaveGridError::Protocol(_))
        ));
    }

    #[test]
    fn ignores_unknown_addresses() {
        assert_eq!(DaemonReply::parse(&message("/other", vec![])).unwrap(), None);
        assert_eq!(SysReply::parse(&message("/other", vec![]), "/wave").unwrap(), None);
    }

    #[test]
    fn parses_sys_replies_and_keys() {
        let size = message("/sys/size", vec![OscType::Int(8), OscType::Int(8)]);
        assert_eq!(
            SysReply::parse(&size, "/wave").unwrap(),
            Some(SysReply::Size {
                width: 8,
                height: 8
            })
        );

        let key = message(
            "/wave/grid/key",
            vec![OscType::Int(3), OscType::Int(4), OscType::Int(1)],
        );
        assert_eq!(
            SysReply::parse(&key, "/wave").unwrap(),
            Some(SysReply::Key {
                x: 3,
                y: 4,
                down: true
            })
        );

        let foreign_key = message(
            "/other/grid/key",
            vec![OscType::Int(3), OscType::Int(4), OscType::Int(1)],
        );
        assert_eq!(SysReply::parse(&foreign_key, "/wave").unwrap(), None);
    }

    #[test]
    fn decode_flattens_bundles() {
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![
                OscPacket::Message(message("/sys/id", vec![OscType::String("m1".to_string())])),
                OscPacket::Message(message("/sys/rotation", vec![OscType::Int(0)])),
            ],
        });
        let bytes = rosc::encoder::encode(&bundle).unwrap();

        let messages = decode(&bytes).unwrap();
        let addrs: Vec<&str> = messages.iter().map(|m| m.addr.as_str()).collect();
        assert_eq!(addrs, vec!["/sys/id", "/sys/rotation"]);
    }

    #[test]
    fn garbage_datagrams_fail_to_decode() {
        assert!(matches!(
            decode(b"not osc"),
            Err(WaveGridError::Protocol(_))
        ));
    }
}
