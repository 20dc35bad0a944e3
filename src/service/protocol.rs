use crate::common::{GateError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

// Request types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Verify(VerifyRequest),
    Register(RegistrationRequest),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Base64-encoded JPEG or PNG.
    pub image: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRequest {
    pub image: String,
    pub first_name: String,
    pub last_name: String,
    pub cedula: String,
    pub city: String,
}

// Response types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP-equivalent status.
    pub status_code: u16,
    pub body: ResponseBody,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ResponseBody {
    Access(AccessResponse),
    Registration(RegistrationResponse),
}

pub const STATUS_GRANTED: &str = "Access Granted";
pub const STATUS_DENIED: &str = "Access Denied";
pub const STATUS_ERROR: &str = "Error";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cedula: Option<String>,
}

impl Response {
    pub fn access(status_code: u16, status: &str, message: impl Into<String>, employee_id: Option<String>) -> Self {
        Self {
            status_code,
            body: ResponseBody::Access(AccessResponse {
                status: status.to_string(),
                message: message.into(),
                employee_id,
            }),
        }
    }

    pub fn registration(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            body: ResponseBody::Registration(RegistrationResponse {
                message: message.into(),
                face_id: None,
                cedula: None,
            }),
        }
    }

    /// Reply for a frame that does not parse as any request.
    pub fn bad_request() -> Self {
        Self::access(400, STATUS_ERROR, "Invalid request", None)
    }

    pub fn message(&self) -> &str {
        match &self.body {
            ResponseBody::Access(r) => &r.message,
            ResponseBody::Registration(r) => &r.message,
        }
    }
}

// Framing: 4-byte little-endian length, then a JSON body

pub fn write_frame<W: Write>(stream: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| GateError::Serialization(format!("Message too large: {} bytes", payload.len())))?;

    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

pub fn read_frame<R: Read>(stream: &mut R, max_len: usize) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > max_len {
        return Err(GateError::Serialization(format!(
            "Message too large: {} bytes (limit {})", len, max_len
        )));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn send_message<W: Write, T: Serialize>(stream: &mut W, message: &T) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    write_frame(stream, &payload)
}

pub fn read_message<R: Read, T: DeserializeOwned>(stream: &mut R, max_len: usize) -> Result<T> {
    let payload = read_frame(stream, max_len)?;
    Ok(serde_json::from_slice(&payload)?)
}
