//! Minimal RFB client: enough of the protocol to authenticate without a
//! password, announce an exclusive session and send key events.

use super::{ConsoleConnector, InputError, KeyEncoding, KeyEvent, KeySink};
use crate::pipeline::BuildState;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const SECURITY_NONE: u8 = 1;
const MSG_KEY_EVENT: u8 = 4;
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REASON_LEN: u32 = 64 * 1024;

#[derive(Debug)]
pub struct VncClient {
    stream: TcpStream,
    desktop_name: String,
    width: u16,
    height: u16,
}

impl VncClient {
    pub fn connect(addr: &str, exclusive: bool, timeout: Duration) -> Result<Self, InputError> {
        let connect_error = |source| InputError::Connect {
            addr: addr.to_string(),
            source,
        };
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(connect_error)?
            .next()
            .ok_or_else(|| {
                connect_error(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "address did not resolve",
                ))
            })?;
        let stream = TcpStream::connect_timeout(&socket_addr, timeout).map_err(connect_error)?;
        stream.set_read_timeout(Some(timeout)).map_err(io_error)?;
        stream.set_write_timeout(Some(timeout)).map_err(io_error)?;
        stream.set_nodelay(true).map_err(io_error)?;
        Self::handshake(stream, exclusive)
    }

    pub fn desktop_name(&self) -> &str {
        &self.desktop_name
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn handshake(mut stream: TcpStream, exclusive: bool) -> Result<Self, InputError> {
        let mut version = [0u8; 12];
        stream.read_exact(&mut version).map_err(io_error)?;
        let minor = parse_protocol_version(&version)?;
        stream
            .write_all(format!("RFB 003.{minor:03}\n").as_bytes())
            .map_err(io_error)?;

        if minor == 3 {
            match read_u32(&mut stream)? {
                0 => return Err(InputError::Handshake(read_reason(&mut stream)?)),
                1 => {}
                other => {
                    return Err(InputError::Handshake(format!(
                        "server requires unsupported security type {other}"
                    )))
                }
            }
        } else {
            let count = read_u8(&mut stream)?;
            if count == 0 {
                return Err(InputError::Handshake(read_reason(&mut stream)?));
            }
            let mut types = vec![0u8; usize::from(count)];
            stream.read_exact(&mut types).map_err(io_error)?;
            if !types.contains(&SECURITY_NONE) {
                return Err(InputError::Handshake(format!(
                    "server offers no password-less security type (offered {types:?})"
                )));
            }
            stream.write_all(&[SECURITY_NONE]).map_err(io_error)?;
            if minor >= 8 && read_u32(&mut stream)? != 0 {
                return Err(InputError::Handshake(read_reason(&mut stream)?));
            }
        }

        let shared_flag = if exclusive { 0 } else { 1 };
        stream.write_all(&[shared_flag]).map_err(io_error)?;

        let width = read_u16(&mut stream)?;
        let height = read_u16(&mut stream)?;
        let mut pixel_format = [0u8; 16];
        stream.read_exact(&mut pixel_format).map_err(io_error)?;
        let desktop_name = read_reason(&mut stream)?;

        Ok(Self {
            stream,
            desktop_name,
            width,
            height,
        })
    }
}

impl KeySink for VncClient {
    fn encoding(&self) -> KeyEncoding {
        KeyEncoding::Keysym
    }

    fn send(&mut self, event: KeyEvent) -> Result<(), InputError> {
        let mut message = [0u8; 8];
        message[0] = MSG_KEY_EVENT;
        message[1] = u8::from(event.pressed);
        message[4..8].copy_from_slice(&event.code.to_be_bytes());
        self.stream.write_all(&message).map_err(io_error)
    }
}

/// Opens a VNC session on `host` at the build's VNC port.
#[derive(Debug, Clone)]
pub struct VncConnector {
    pub host: String,
    pub exclusive: bool,
    pub timeout: Duration,
}

impl Default for VncConnector {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            exclusive: true,
            timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

impl ConsoleConnector for VncConnector {
    fn open(&self, state: &BuildState) -> Result<Box<dyn KeySink>, InputError> {
        let addr = format!("{}:{}", self.host, state.vnc_port);
        let client = VncClient::connect(&addr, self.exclusive, self.timeout)?;
        state.log.info(
            "input.vnc.connected",
            &format!("addr={addr} desktop={}", client.desktop_name()),
        );
        Ok(Box::new(client))
    }
}

fn parse_protocol_version(raw: &[u8; 12]) -> Result<u32, InputError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| InputError::Handshake("protocol version is not ascii".to_string()))?;
    let invalid = || InputError::Handshake(format!("unrecognized protocol version {text:?}"));
    let rest = text.strip_prefix("RFB ").ok_or_else(invalid)?;
    let (major, minor) = rest.trim_end().split_once('.').ok_or_else(invalid)?;
    let major = major.parse::<u32>().map_err(|_| invalid())?;
    let minor = minor.parse::<u32>().map_err(|_| invalid())?;
    match (major, minor) {
        (3, 3..=6) => Ok(3),
        (3, 7) => Ok(7),
        (3, _) if minor >= 8 => Ok(8),
        _ if major > 3 => Ok(8),
        _ => Err(invalid()),
    }
}

fn read_u8(stream: &mut impl Read) -> Result<u8, InputError> {
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).map_err(io_error)?;
    Ok(buf[0])
}

fn read_u16(stream: &mut impl Read) -> Result<u16, InputError> {
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).map_err(io_error)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32(stream: &mut impl Read) -> Result<u32, InputError> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).map_err(io_error)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_reason(stream: &mut impl Read) -> Result<String, InputError> {
    let len = read_u32(stream)?;
    if len > MAX_REASON_LEN {
        return Err(InputError::Handshake(format!(
            "server string of {len} bytes exceeds limit"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).map_err(io_error)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn io_error(source: std::io::Error) -> InputError {
    InputError::Io { source }
}
