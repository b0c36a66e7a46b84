//! Marker scanning over the inbound byte stream, shared by both drivers.
//!
//! The matcher is deliberately naive: on a mismatching byte the match
//! counter drops back to zero and the byte itself is not re-examined as the
//! start of a new match. A marker that overlaps itself (`"SS: "` scanned for
//! `"S: "`) can therefore be missed. The labels and echoes used by the HR20
//! firmwares never trigger this.
use crate::{
    transport::Transport,
    Error, Result,
};
use log::*;
use std::time::Duration;

/// Bounded polling: `attempts` polls of the transport, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ScanPolicy {
    pub attempts: u32,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub interval: Duration,
}

impl ScanPolicy {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Upper bound of the time spent waiting.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }
}

/// Streaming state of one marker search.
#[derive(Debug)]
pub struct MarkerScanner<'m> {
    marker: &'m [u8],
    matched: usize,
    seen_data: bool,
}

impl<'m> MarkerScanner<'m> {
    pub fn new(marker: &'m [u8]) -> Self {
        Self {
            marker,
            matched: 0,
            seen_data: false,
        }
    }

    /// Feeds one received byte, returns `true` once the marker is complete.
    pub fn feed(&mut self, byte: u8) -> bool {
        self.seen_data = true;
        if self.marker.get(self.matched) == Some(&byte) {
            self.matched += 1;
        } else {
            self.matched = 0;
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.matched >= self.marker.len()
    }

    /// Reads whatever is available right now, stopping directly after the marker.
    pub fn poll<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<bool> {
        if self.is_complete() {
            return Ok(true);
        }
        if transport.available()? == 0 {
            return Ok(false);
        }
        while let Some(byte) = transport.read_byte()? {
            if self.feed(byte) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The error describing why the scan has not matched (yet).
    pub fn failure(&self) -> Error {
        if self.seen_data {
            Error::ResponseMismatch
        } else {
            Error::ResponseTimeout
        }
    }
}

/// Consumes the inbound stream up to and including the first occurrence of `marker`.
///
/// Fails with [`Error::ResponseMismatch`] if bytes arrived but never formed the
/// marker, or [`Error::ResponseTimeout`] if nothing arrived at all.
pub fn scan_for_marker<T: Transport + ?Sized>(
    transport: &mut T,
    marker: &[u8],
    policy: &ScanPolicy,
) -> Result<()> {
    let mut scanner = MarkerScanner::new(marker);
    for attempt in 0..policy.attempts {
        if scanner.poll(transport)? {
            trace!(
                "Found marker {:?} after {} polls",
                String::from_utf8_lossy(marker),
                attempt + 1
            );
            return Ok(());
        }
        if attempt + 1 < policy.attempts {
            transport.delay(policy.interval);
        }
    }
    let error = scanner.failure();
    debug!(
        "Marker {:?} not found within {} polls: {error}",
        String::from_utf8_lossy(marker),
        policy.attempts
    );
    Err(error)
}

fn read_exact_polling<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    policy: &ScanPolicy,
) -> Result<()> {
    let mut filled = transport.read_array(buf)?;
    let mut attempt = 1;
    while filled < buf.len() {
        if attempt >= policy.attempts {
            debug!("Payload incomplete: {filled} of {} bytes", buf.len());
            return Err(Error::ResponseTimeout);
        }
        transport.delay(policy.interval);
        filled += transport.read_array(&mut buf[filled..])?;
        attempt += 1;
    }
    Ok(())
}

/// Reads the window of `buf.len()` bytes that starts `skip` bytes after the
/// current stream position, waiting for late bytes according to `policy`.
pub fn read_window<T: Transport + ?Sized>(
    transport: &mut T,
    skip: usize,
    buf: &mut [u8],
    policy: &ScanPolicy,
) -> Result<()> {
    let mut discard = [0u8; 8];
    let mut remaining = skip;
    while remaining > 0 {
        let chunk = remaining.min(discard.len());
        read_exact_polling(transport, &mut discard[..chunk], policy)?;
        remaining -= chunk;
    }
    read_exact_polling(transport, buf, policy)
}

/// Fixed capacity buffer holding one extracted protocol field.
#[derive(Debug, Clone)]
pub struct Field<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> Field<N> {
    /// Extracts `len` bytes located `skip` bytes after the current stream position.
    pub fn read<T: Transport + ?Sized>(
        transport: &mut T,
        skip: usize,
        len: usize,
        policy: &ScanPolicy,
    ) -> Result<Self> {
        if len > N {
            return Err(Error::ReadBufferOverflow {
                requested: len,
                capacity: N,
            });
        }
        let mut field = Self {
            bytes: [0; N],
            len,
        };
        read_window(transport, skip, &mut field.bytes[..len], policy)?;
        Ok(field)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}
