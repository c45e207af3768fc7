use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted upload body, in bytes.
    pub max_upload_bytes: usize,
    /// Lifetime of presigned upload URLs, in seconds.
    pub presign_expiry_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
            max_upload_bytes: 200 * 1024 * 1024,
            presign_expiry_secs: 3600,
        }
    }
}
