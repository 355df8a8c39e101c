//! SPDY/3 flow control
//!
//! Windows are per stream; SPDY/3 has no session-level window and SPDY/2
//! has no flow control at all.

use super::error::{Error, Result};
use super::DEFAULT_INITIAL_WINDOW_SIZE;

/// Largest window a WINDOW_UPDATE may produce (2^31 - 1)
pub const MAX_WINDOW_SIZE: i64 = 0x7FFF_FFFF;

/// Send-side window, reduced by DATA we send and grown by WINDOW_UPDATE
#[derive(Debug, Clone)]
pub struct SendWindow {
    initial_size: u32,
    /// Can go negative after the peer shrinks INITIAL_WINDOW_SIZE
    current_size: i64,
}

impl SendWindow {
    /// Create a window with the given initial size
    pub fn with_initial_size(initial_size: u32) -> Self {
        SendWindow {
            initial_size,
            current_size: i64::from(initial_size),
        }
    }

    /// Get current window size
    pub fn size(&self) -> i64 {
        self.current_size
    }

    /// Grow the window (WINDOW_UPDATE)
    pub fn increase(&mut self, increment: u32) -> Result<i64> {
        if increment == 0 {
            return Err(Error::Protocol(
                "Window update increment must be non-zero".to_string(),
            ));
        }

        let new_size = self.current_size + i64::from(increment);
        if new_size > MAX_WINDOW_SIZE {
            return Err(Error::Protocol(format!(
                "Window size {} exceeds maximum (2^31-1)",
                new_size
            )));
        }

        self.current_size = new_size;
        Ok(self.current_size)
    }

    /// Shrink the window after sending `amount` bytes
    pub fn consume(&mut self, amount: usize) {
        self.current_size -= amount as i64;
    }

    /// Apply a new INITIAL_WINDOW_SIZE from SETTINGS
    pub fn update_initial_size(&mut self, new_initial_size: u32) {
        let diff = i64::from(new_initial_size) - i64::from(self.initial_size);
        self.initial_size = new_initial_size;
        self.current_size = (self.current_size + diff).min(MAX_WINDOW_SIZE);
    }
}

impl Default for SendWindow {
    fn default() -> Self {
        Self::with_initial_size(DEFAULT_INITIAL_WINDOW_SIZE)
    }
}

/// Receive-side window
///
/// Received DATA is credited back to the peer in one WINDOW_UPDATE once at
/// least half of the window has been consumed.
#[derive(Debug, Clone)]
pub struct ReceiveWindow {
    initial_size: u32,
    available: i64,
    unacked: u32,
}

impl ReceiveWindow {
    /// Create a window with the given initial size
    pub fn with_initial_size(initial_size: u32) -> Self {
        ReceiveWindow {
            initial_size,
            available: i64::from(initial_size),
            unacked: 0,
        }
    }

    /// Bytes the peer may still send
    pub fn available(&self) -> i64 {
        self.available
    }

    /// Account for `amount` received bytes
    ///
    /// Returns the WINDOW_UPDATE delta to send, if one is due. Fails when the
    /// peer overran the window.
    pub fn consume(&mut self, amount: usize) -> Result<Option<u32>> {
        let amount = u32::try_from(amount)
            .map_err(|_| Error::Protocol(format!("DATA length {} overflows window", amount)))?;

        if i64::from(amount) > self.available {
            return Err(Error::Protocol(format!(
                "DATA length {} exceeds receive window {}",
                amount, self.available
            )));
        }

        self.available -= i64::from(amount);
        self.unacked += amount;

        if self.unacked >= self.initial_size / 2 && self.unacked > 0 {
            let delta = self.unacked;
            self.unacked = 0;
            self.available += i64::from(delta);
            return Ok(Some(delta));
        }

        Ok(None)
    }
}

impl Default for ReceiveWindow {
    fn default() -> Self {
        Self::with_initial_size(DEFAULT_INITIAL_WINDOW_SIZE)
    }
}
