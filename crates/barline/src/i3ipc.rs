//! Minimal i3 IPC client: just enough of the protocol for one tree dump
//! and a window-event subscription. Frames are `"i3-ipc"` + little-endian
//! u32 payload length + u32 message type + JSON payload; event replies set
//! the high type bit.

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

const MAGIC: &[u8; 6] = b"i3-ipc";
const HEADER_LEN: usize = 14;
/// Guards against a desynced stream being read as a bogus gigantic frame.
const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

pub const MSG_SUBSCRIBE: u32 = 2;
pub const MSG_GET_TREE: u32 = 4;
pub const EVENT_BIT: u32 = 1 << 31;
pub const EVENT_WINDOW: u32 = 3;

#[derive(Debug, Error)]
pub enum I3Error {
    #[error("i3 socket unavailable: {0}")]
    Socket(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("i3 protocol: {0}")]
    Protocol(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One container in the i3 layout tree. Only window-bearing fields are
/// deserialized; everything else in the dump is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub floating_nodes: Vec<Node>,
    #[serde(default)]
    pub window_properties: Option<WindowProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowProperties {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub instance: String,
}

/// A `window` lifecycle event.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowEvent {
    pub change: String,
    pub container: Node,
}

pub struct I3Connection {
    stream: UnixStream,
}

impl I3Connection {
    pub async fn connect() -> Result<Self, I3Error> {
        let path = socket_path().await?;
        let stream = UnixStream::connect(&path).await?;
        Ok(I3Connection { stream })
    }

    pub async fn get_tree(&mut self) -> Result<Node, I3Error> {
        self.send(MSG_GET_TREE, b"").await?;
        loop {
            let (msg_type, payload) = self.recv().await?;
            if msg_type == MSG_GET_TREE {
                return Ok(serde_json::from_slice(&payload)?);
            }
        }
    }

    pub async fn subscribe_windows(&mut self) -> Result<(), I3Error> {
        self.send(MSG_SUBSCRIBE, br#"["window"]"#).await?;
        loop {
            let (msg_type, payload) = self.recv().await?;
            if msg_type != MSG_SUBSCRIBE {
                continue;
            }
            #[derive(Deserialize)]
            struct SubscribeReply {
                success: bool,
            }
            let reply: SubscribeReply = serde_json::from_slice(&payload)?;
            if reply.success {
                return Ok(());
            }
            return Err(I3Error::Protocol("subscribe rejected".to_string()));
        }
    }

    /// Blocks until the next `window` event; other frames are skipped.
    pub async fn next_window_event(&mut self) -> Result<WindowEvent, I3Error> {
        loop {
            let (msg_type, payload) = self.recv().await?;
            if msg_type == EVENT_BIT | EVENT_WINDOW {
                return Ok(serde_json::from_slice(&payload)?);
            }
        }
    }

    async fn send(&mut self, msg_type: u32, payload: &[u8]) -> Result<(), I3Error> {
        self.stream.write_all(&encode_frame(msg_type, payload)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<(u32, Vec<u8>), I3Error> {
        let mut header = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut header).await?;
        let (msg_type, len) = decode_header(&header)?;
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        Ok((msg_type, payload))
    }
}

async fn socket_path() -> Result<String, I3Error> {
    if let Ok(path) = std::env::var("I3SOCK") {
        if !path.is_empty() {
            return Ok(path);
        }
    }
    let output = tokio::process::Command::new("i3")
        .arg("--get-socketpath")
        .output()
        .await
        .map_err(|err| I3Error::Socket(format!("running i3 --get-socketpath: {err}")))?;
    if !output.status.success() {
        return Err(I3Error::Socket("i3 --get-socketpath failed".to_string()));
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        return Err(I3Error::Socket("empty socket path".to_string()));
    }
    Ok(path)
}

fn encode_frame(msg_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&msg_type.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(u32, usize), I3Error> {
    if &header[..6] != MAGIC {
        return Err(I3Error::Protocol("bad magic".to_string()));
    }
    let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
    if len > MAX_PAYLOAD {
        return Err(I3Error::Protocol(format!("oversized frame: {len} bytes")));
    }
    let msg_type = u32::from_le_bytes([header[10], header[11], header[12], header[13]]);
    Ok((msg_type, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips() {
        let frame = encode_frame(MSG_SUBSCRIBE, br#"["window"]"#);
        let header: [u8; HEADER_LEN] = frame[..HEADER_LEN].try_into().expect("header");
        let (msg_type, len) = decode_header(&header).expect("decode");
        assert_eq!(msg_type, MSG_SUBSCRIBE);
        assert_eq!(len, 10);
        assert_eq!(&frame[HEADER_LEN..], br#"["window"]"#);
    }

    #[test]
    fn event_type_bit_survives_the_round_trip() {
        let frame = encode_frame(EVENT_BIT | EVENT_WINDOW, b"{}");
        let header: [u8; HEADER_LEN] = frame[..HEADER_LEN].try_into().expect("header");
        let (msg_type, _) = decode_header(&header).expect("decode");
        assert_eq!(msg_type & EVENT_BIT, EVENT_BIT);
        assert_eq!(msg_type & !EVENT_BIT, EVENT_WINDOW);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut frame = encode_frame(MSG_GET_TREE, b"");
        frame[0] = b'x';
        let header: [u8; HEADER_LEN] = frame[..HEADER_LEN].try_into().expect("header");
        assert!(decode_header(&header).is_err());
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut frame = encode_frame(MSG_GET_TREE, b"");
        frame[6..10].copy_from_slice(&u32::MAX.to_le_bytes());
        let header: [u8; HEADER_LEN] = frame[..HEADER_LEN].try_into().expect("header");
        assert!(decode_header(&header).is_err());
    }

    #[test]
    fn tree_nodes_parse_with_window_properties() {
        let json = r#"{
            "nodes": [
                {"nodes": [{"window_properties": {"class": "URxvt", "instance": "urxvt"}}]},
                {"floating_nodes": [{"window_properties": {"class": "Pavucontrol", "instance": "pavucontrol"}}]}
            ]
        }"#;
        let tree: Node = serde_json::from_str(json).expect("parse");
        assert!(tree.window_properties.is_none());
        let props = tree.nodes[0].nodes[0]
            .window_properties
            .as_ref()
            .expect("props");
        assert_eq!(props.class, "URxvt");
        assert_eq!(
            tree.nodes[1].floating_nodes[0]
                .window_properties
                .as_ref()
                .expect("props")
                .instance,
            "pavucontrol"
        );
    }

    #[test]
    fn window_event_parses() {
        let json = r#"{"change": "new", "container": {"window_properties": {"class": "Firefox", "instance": "Navigator"}}}"#;
        let event: WindowEvent = serde_json::from_str(json).expect("parse");
        assert_eq!(event.change, "new");
        assert_eq!(
            event.container.window_properties.expect("props").class,
            "Firefox"
        );
    }
}
