//! Cache backend connectivity.
//!
//! The guard only needs to know whether the cache answers, so it speaks
//! the smallest slice of RESP: optional `AUTH`, then `PING` → `+PONG`.
//! Each check opens a fresh connection under the configured deadline and
//! runs inside the `"redis"` breaker.

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use url::Url;

use crate::config::{validation::check_cache_url, CacheConfig, ConfigError};
use crate::error::{Error, Result};
use crate::resilience::timeouts::with_timeout;
use crate::resilience::CircuitBreaker;

const DEFAULT_PORT: u16 = 6379;

/// Connection target parsed from a `redis://` URL.
#[derive(Clone, PartialEq, Eq)]
pub struct CacheTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CacheTarget {
    pub fn parse(raw: &str) -> std::result::Result<Self, ConfigError> {
        let url: Url = check_cache_url(raw).map_err(|message| ConfigError::Invalid {
            what: "cache URL",
            message,
        })?;

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(decode_userinfo)
            .transpose()?;
        let password = url.password().map(decode_userinfo).transpose()?;
        Ok(Self {
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            username,
            password,
        })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `Url` keeps userinfo percent-encoded; AUTH needs the raw bytes.
fn decode_userinfo(raw: &str) -> std::result::Result<String, ConfigError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| ConfigError::Invalid {
            what: "cache URL",
            message: format!("credentials are not valid UTF-8: {e}"),
        })
}

impl std::fmt::Debug for CacheTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth", &self.password.is_some())
            .finish()
    }
}

/// Health-check client for the cache backend.
#[derive(Debug, Clone)]
pub struct CacheClient {
    target: CacheTarget,
    timeout: Duration,
    breaker: Arc<CircuitBreaker>,
}

impl CacheClient {
    pub fn new(config: &CacheConfig, url: &str, breaker: Arc<CircuitBreaker>) -> Result<Self> {
        Ok(Self {
            target: CacheTarget::parse(url)?,
            timeout: config.timeout(),
            breaker,
        })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Ping the backend through the cache breaker.
    pub async fn ping(&self) -> Result<()> {
        let name = self.breaker.name();
        self.breaker
            .call(|| async {
                with_timeout(name, self.timeout, self.exchange())
                    .await
                    .map_err(Error::from)?
            })
            .await
            .map_err(Error::from)
    }

    async fn exchange(&self) -> Result<()> {
        let stream = TcpStream::connect(self.target.address()).await?;
        let mut stream = BufReader::new(stream);

        if let Some(password) = &self.target.password {
            let mut args = vec!["AUTH"];
            if let Some(username) = &self.target.username {
                args.push(username);
            }
            args.push(password);
            expect_reply(&mut stream, &args, "+OK").await?;
        }

        expect_reply(&mut stream, &["PING"], "+PONG").await
    }
}

/// Encode a command as a RESP array of bulk strings.
fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

async fn expect_reply(stream: &mut BufReader<TcpStream>, args: &[&str], expected: &str) -> Result<()> {
    stream.get_mut().write_all(&encode_command(args)).await?;

    let mut line = String::new();
    if stream.read_line(&mut line).await? == 0 {
        return Err(Error::Cache("connection closed before reply".to_string()));
    }
    let reply = line.trim_end();

    if reply == expected {
        Ok(())
    } else if let Some(message) = reply.strip_prefix('-') {
        Err(Error::Cache(message.to_string()))
    } else {
        Err(Error::Cache(format!("unexpected reply '{reply}' to {}", args[0])))
    }
}
