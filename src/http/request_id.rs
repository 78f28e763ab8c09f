//! Per-request correlation identifiers.
//!
//! # Layout (12 bytes, big-endian)
//! ```text
//! | 0..4 unix seconds | 4..7 machine | 7..9 pid | 9..12 counter |
//! ```
//!
//! # Design Decisions
//! - Machine fingerprint is the first 3 bytes of SHA-256(hostname),
//!   computed once per process behind a `OnceLock`
//! - Counter is process-wide and wraps at 2^24
//! - Correlation only; never use an id as a secret

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Response header carrying the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

const COUNTER_MASK: u32 = 0x00ff_ffff;

/// Shared by every generator in the process.
static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Fingerprint of this host, or the reason it could not be computed.
static MACHINE_ID: OnceLock<Result<[u8; 3], String>> = OnceLock::new();

/// Error raised when request ids cannot be produced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestIdError {
    #[error("failed to resolve local hostname: {0}")]
    Hostname(String),
    #[error("invalid request id: {0}")]
    Malformed(String),
}

fn machine_id() -> Result<[u8; 3], RequestIdError> {
    MACHINE_ID
        .get_or_init(|| {
            let name = hostname::get().map_err(|e| e.to_string())?;
            let digest = Sha256::digest(name.to_string_lossy().as_bytes());
            Ok([digest[0], digest[1], digest[2]])
        })
        .clone()
        .map_err(RequestIdError::Hostname)
}

/// 96-bit structured request identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId([u8; 12]);

impl RequestId {
    /// Wrap raw bytes.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Seconds since the Unix epoch at generation time.
    pub fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Generation time at second granularity.
    pub fn time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(u64::from(self.timestamp_secs()))
    }

    pub fn machine(&self) -> [u8; 3] {
        [self.0[4], self.0[5], self.0[6]]
    }

    pub fn pid(&self) -> u16 {
        u16::from_be_bytes([self.0[7], self.0[8]])
    }

    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([0, self.0[9], self.0[10], self.0[11]])
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self)
    }
}

impl FromStr for RequestId {
    type Err = RequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.is_ascii() {
            return Err(RequestIdError::Malformed(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| RequestIdError::Malformed(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Produces [`RequestId`]s.
///
/// Construction resolves the machine fingerprint, so a generator that exists
/// can always produce ids. Failure to construct one is fatal for serving.
#[derive(Debug, Clone, Copy)]
pub struct RequestIdGenerator {
    machine: [u8; 3],
    pid: u16,
}

impl RequestIdGenerator {
    pub fn new() -> Result<Self, RequestIdError> {
        Ok(Self {
            machine: machine_id()?,
            pid: std::process::id() as u16,
        })
    }

    /// Generate the next id. Thread-safe.
    pub fn next(&self) -> RequestId {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed).wrapping_add(1) & COUNTER_MASK;

        let mut b = [0u8; 12];
        b[0..4].copy_from_slice(&secs.to_be_bytes());
        b[4..7].copy_from_slice(&self.machine);
        b[7..9].copy_from_slice(&self.pid.to_be_bytes());
        b[9..12].copy_from_slice(&count.to_be_bytes()[1..]);
        RequestId(b)
    }
}
