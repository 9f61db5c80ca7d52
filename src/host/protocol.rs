use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, Write};

const CONTENT_LENGTH: &str = "Content-Length:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMessage {
    pub seq: u64,
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub content: HostMessageContent,
}

/// Untagged variants are tried in order. A response also carries `command`,
/// so it must come before `Request` or it would read back as a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostMessageContent {
    Response {
        request_seq: u64,
        success: bool,
        command: String,
        message: Option<String>,
        body: Option<Value>,
    },
    Event {
        event: String,
        body: Option<Value>,
    },
    Request {
        command: String,
        arguments: Option<Value>,
    },
}

impl HostMessage {
    pub fn request(seq: u64, command: &str, arguments: Option<Value>) -> Self {
        Self {
            seq,
            msg_type: "request".to_string(),
            content: HostMessageContent::Request {
                command: command.to_string(),
                arguments,
            },
        }
    }
}

/// Read one framed message. `Ok(None)` means the stream ended cleanly
/// before a new header started.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<HostMessage>, ProtocolError> {
    let mut content_length = None;
    let mut started = false;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            if started {
                return Err(ProtocolError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            return Ok(None);
        }
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            if started {
                break;
            }
            continue;
        }
        started = true;
        if let Some(value) = line.strip_prefix(CONTENT_LENGTH) {
            content_length = value.trim().parse::<usize>().ok();
        }
    }

    let length = content_length.ok_or(ProtocolError::MissingContentLength)?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;
    Ok(Some(serde_json::from_slice(&body)?))
}

pub fn write_message<W: Write>(writer: &mut W, msg: &HostMessage) -> Result<(), ProtocolError> {
    let json = serde_json::to_string(msg)?;
    write!(writer, "{} {}\r\n\r\n{}", CONTENT_LENGTH, json.len(), json)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn frame(json: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", json.len(), json)
    }

    #[test]
    fn reads_request_with_arguments() {
        let raw = frame(r#"{"seq":3,"type":"request","command":"open","arguments":{"document":"a.py"}}"#);
        let msg = read_message(&mut Cursor::new(raw)).expect("read").expect("message");
        assert_eq!(msg.seq, 3);
        assert_eq!(
            msg.content,
            HostMessageContent::Request {
                command: "open".to_string(),
                arguments: Some(json!({"document": "a.py"})),
            }
        );
    }

    #[test]
    fn reads_back_to_back_messages() {
        let raw = format!(
            "{}{}",
            frame(r#"{"seq":1,"type":"request","command":"save"}"#),
            frame(r#"{"seq":2,"type":"request","command":"disconnect"}"#)
        );
        let mut cursor = Cursor::new(raw);
        assert_eq!(read_message(&mut cursor).expect("first").map(|m| m.seq), Some(1));
        assert_eq!(read_message(&mut cursor).expect("second").map(|m| m.seq), Some(2));
        assert!(read_message(&mut cursor).expect("eof").is_none());
    }

    #[test]
    fn byte_length_counts_utf8() {
        let mut out = Vec::new();
        let msg = HostMessage {
            seq: 1,
            msg_type: "event".to_string(),
            content: HostMessageContent::Event {
                event: "status".to_string(),
                body: Some(json!({"text": "héllo"})),
            },
        };
        write_message(&mut out, &msg).expect("write");
        let parsed = read_message(&mut Cursor::new(out)).expect("read").expect("message");
        assert_eq!(parsed, msg);
    }

    #[test]
    fn response_frame_reads_back_as_response() {
        let msg = HostMessage {
            seq: 4,
            msg_type: "response".to_string(),
            content: HostMessageContent::Response {
                request_seq: 1,
                success: false,
                command: "frobnicate".to_string(),
                message: Some("unknown command".to_string()),
                body: None,
            },
        };
        let mut out = Vec::new();
        write_message(&mut out, &msg).expect("write");
        let parsed = read_message(&mut Cursor::new(out)).expect("read").expect("message");
        assert_eq!(parsed, msg);
    }

    #[test]
    fn request_without_arguments_stays_a_request() {
        let raw = frame(r#"{"seq":7,"type":"request","command":"disconnect"}"#);
        let msg = read_message(&mut Cursor::new(raw)).expect("read").expect("message");
        assert_eq!(
            msg.content,
            HostMessageContent::Request {
                command: "disconnect".to_string(),
                arguments: None,
            }
        );
    }

    #[test]
    fn header_without_length_is_rejected() {
        let raw = "Content-Type: json\r\n\r\n{}";
        assert!(matches!(
            read_message(&mut Cursor::new(raw)),
            Err(ProtocolError::MissingContentLength)
        ));
    }
}
