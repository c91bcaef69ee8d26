use std::fmt;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::ClientError;

/// Address of one endpoint of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    ip: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(ip: String, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Open a TCP connection with a deadline and Nagle disabled, since both
/// directions carry latency-sensitive frames.
pub async fn connect(info: &ConnectionInfo, timeout: Duration) -> Result<TcpStream, ClientError> {
    debug!("connecting to {info}");
    let stream = tokio::time::timeout(timeout, TcpStream::connect((info.ip(), info.port())))
        .await
        .map_err(|_| ClientError::Timeout(timeout))??;
    stream.set_nodelay(true)?;
    info!("connected to {info}");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn display_is_host_port() {
        let info = ConnectionInfo::new("127.0.0.1".into(), 9111);
        assert_eq!(info.to_string(), "127.0.0.1:9111");
        assert_eq!(info.ip(), "127.0.0.1");
        assert_eq!(info.port(), 9111);
    }

    #[tokio::test]
    async fn connects_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());

        let stream = connect(&info, Duration::from_secs(5)).await.unwrap();
        assert!(stream.nodelay().unwrap());
        listener.accept().await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let info = ConnectionInfo::new("127.0.0.1".into(), port);
        let err = connect(&info, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
    }
}
