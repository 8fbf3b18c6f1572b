//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default listen port, overridable via the `PORT` environment variable
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (all interfaces by default)
    pub bind_addr: SocketAddr,

    /// Directory of static viewer files, served at `/`
    ///
    /// Skipped with a warning if the directory does not exist.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            static_dir: Some(PathBuf::from("public")),
        }
    }
}

impl ServerConfig {
    /// Create a config taking the listen port from the `PORT` environment
    /// variable when set
    pub fn from_env() -> Self {
        let port = parse_port(std::env::var("PORT").ok());
        Self::default().port(port)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the listen port, keeping the bind interface
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the static file directory
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Disable static file serving
    pub fn no_static_files(mut self) -> Self {
        self.static_dir = None;
        self
    }
}

fn parse_port(var: Option<String>) -> u16 {
    match var {
        Some(raw) => match raw.parse() {
            Ok(port) => port,
            Err(_) => {
                tracing::warn!(value = %raw, "Invalid PORT value, using default");
                DEFAULT_PORT
            }
        },
        None => DEFAULT_PORT,
    }
}
