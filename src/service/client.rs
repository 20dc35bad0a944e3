use crate::common::{dev_socket_path, system_socket_path, GateError, Result};
use crate::service::protocol::{read_message, send_message, RegistrationRequest, Request, Response, VerifyRequest};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

pub struct ServiceClient {
    socket_path: PathBuf,
}

impl ServiceClient {
    pub fn new(dev_mode: bool) -> Self {
        let socket_path = if dev_mode { dev_socket_path() } else { system_socket_path() };
        Self::with_socket(socket_path)
    }

    pub fn with_socket(socket_path: PathBuf) -> Self {
        ServiceClient { socket_path }
    }

    pub fn verify(&self, image: &[u8]) -> Result<Response> {
        self.call(&Request::Verify(VerifyRequest { image: STANDARD.encode(image) }))
    }

    pub fn register(&self, image: &[u8], first_name: &str, last_name: &str, cedula: &str, city: &str) -> Result<Response> {
        self.call(&Request::Register(RegistrationRequest {
            image: STANDARD.encode(image),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            cedula: cedula.to_string(),
            city: city.to_string(),
        }))
    }

    fn call(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect_with_retry(3)?;
        send_message(&mut stream, request)?;
        read_message(&mut stream, MAX_RESPONSE_BYTES)
    }

    fn connect_with_retry(&self, max_retries: u32) -> Result<UnixStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match UnixStream::connect(&self.socket_path) {
                Ok(stream) => {
                    // Model inference can take a while on the first request
                    stream.set_read_timeout(Some(Duration::from_secs(60)))?;
                    stream.set_write_timeout(Some(Duration::from_secs(10)))?;
                    return Ok(stream);
                }
                Err(e) if attempt < max_retries => {
                    tracing::debug!("Failed to connect (attempt {}): {}", attempt, e);
                    std::thread::sleep(Duration::from_millis(500));
                }
                Err(e) => {
                    return Err(GateError::Other(anyhow::anyhow!(
                        "Failed to connect to service at {}: {}. Is facegate-service running?",
                        self.socket_path.display(),
                        e
                    )));
                }
            }
        }
    }
}
