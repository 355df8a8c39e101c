//! SPDY SETTINGS ids and the peer's settings table

use std::fmt;

/// SPDY settings ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsId {
    UploadBandwidth,
    DownloadBandwidth,
    RoundTripTime,
    MaxConcurrentStreams,
    CurrentCwnd,
    DownloadRetransRate,
    InitialWindowSize,
    /// SPDY/3 only
    ClientCertificateVectorSize,
}

impl SettingsId {
    /// Convert to the 24-bit wire id
    pub fn as_u32(self) -> u32 {
        match self {
            SettingsId::UploadBandwidth => 1,
            SettingsId::DownloadBandwidth => 2,
            SettingsId::RoundTripTime => 3,
            SettingsId::MaxConcurrentStreams => 4,
            SettingsId::CurrentCwnd => 5,
            SettingsId::DownloadRetransRate => 6,
            SettingsId::InitialWindowSize => 7,
            SettingsId::ClientCertificateVectorSize => 8,
        }
    }

    /// Create from the wire id
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(SettingsId::UploadBandwidth),
            2 => Some(SettingsId::DownloadBandwidth),
            3 => Some(SettingsId::RoundTripTime),
            4 => Some(SettingsId::MaxConcurrentStreams),
            5 => Some(SettingsId::CurrentCwnd),
            6 => Some(SettingsId::DownloadRetransRate),
            7 => Some(SettingsId::InitialWindowSize),
            8 => Some(SettingsId::ClientCertificateVectorSize),
            _ => None,
        }
    }

    /// Get setting name
    pub fn name(&self) -> &'static str {
        match self {
            SettingsId::UploadBandwidth => "UPLOAD_BANDWIDTH",
            SettingsId::DownloadBandwidth => "DOWNLOAD_BANDWIDTH",
            SettingsId::RoundTripTime => "ROUND_TRIP_TIME",
            SettingsId::MaxConcurrentStreams => "MAX_CONCURRENT_STREAMS",
            SettingsId::CurrentCwnd => "CURRENT_CWND",
            SettingsId::DownloadRetransRate => "DOWNLOAD_RETRANS_RATE",
            SettingsId::InitialWindowSize => "INITIAL_WINDOW_SIZE",
            SettingsId::ClientCertificateVectorSize => "CLIENT_CERTIFICATE_VECTOR_SIZE",
        }
    }
}

impl fmt::Display for SettingsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// Ask the receiver to persist the value
pub const FLAG_SETTINGS_PERSIST_VALUE: u8 = 0x01;

/// Value was persisted by the receiver earlier
pub const FLAG_SETTINGS_PERSISTED: u8 = 0x02;

/// One SETTINGS entry; `id` is the raw 24-bit id so unknown ids survive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsEntry {
    pub id: u32,
    pub flags: u8,
    pub value: u32,
}

impl SettingsEntry {
    /// Create a new entry
    pub fn new(id: SettingsId, value: u32) -> Self {
        SettingsEntry {
            id: id.as_u32(),
            flags: 0,
            value,
        }
    }

    /// Known id, if any
    pub fn settings_id(&self) -> Option<SettingsId> {
        SettingsId::from_u32(self.id)
    }
}

/// Settings received from the peer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSettings {
    values: [Option<u32>; 9],
}

impl RemoteSettings {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value
    pub fn get(&self, id: SettingsId) -> Option<u32> {
        self.values[id.as_u32() as usize]
    }

    /// Record a value
    pub fn set(&mut self, id: SettingsId, value: u32) {
        self.values[id.as_u32() as usize] = Some(value);
    }

    /// Forget all values (CLEAR_SETTINGS)
    pub fn clear(&mut self) {
        self.values = [None; 9];
    }

    /// Apply entries, returning the new initial window size if it changed
    ///
    /// Unknown ids are ignored.
    pub fn apply(&mut self, entries: &[SettingsEntry]) -> Option<u32> {
        let mut window = None;
        for entry in entries {
            if let Some(id) = entry.settings_id() {
                if id == SettingsId::InitialWindowSize
                    && self.get(id) != Some(entry.value)
                {
                    window = Some(entry.value);
                }
                self.set(id, entry.value);
            }
        }
        window
    }

    /// Peer's stream limit, unlimited when unset
    pub fn max_concurrent_streams(&self) -> u32 {
        self.get(SettingsId::MaxConcurrentStreams).unwrap_or(u32::MAX)
    }

    /// Peer's initial window, if it announced one
    pub fn initial_window_size(&self) -> Option<u32> {
        self.get(SettingsId::InitialWindowSize)
    }
}
