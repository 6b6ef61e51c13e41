//! Integer-backed enumerations carried on the wire
//!
//! Every enumeration keeps an `Unknown(raw)` arm: newer daemons add codes,
//! and an unrecognized ordinal must survive decoding rather than fail it.

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::error::{ProjectionError, ProjectionResult};
use super::fields::{OrdinalTable, WireKind, WireType};
use super::projector::FromWire;

macro_rules! ordinal_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $ordinal:literal => $symbol:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
            /// Ordinal not known to this client
            Unknown(i64),
        }

        impl $name {
            /// Registered ordinal → symbol mapping
            pub const ORDINALS: OrdinalTable = &[$(($ordinal, $symbol)),*];

            /// Decode a raw ordinal, falling back to `Unknown`.
            pub fn from_ordinal(raw: i64) -> Self {
                match raw {
                    $($ordinal => $name::$variant,)*
                    other => $name::Unknown(other),
                }
            }

            /// Raw ordinal of this value
            pub fn ordinal(self) -> i64 {
                match self {
                    $($name::$variant => $ordinal,)*
                    $name::Unknown(raw) => raw,
                }
            }

            /// Symbol name, or `None` for unknown ordinals
            pub fn symbol(self) -> Option<&'static str> {
                match self {
                    $($name::$variant => Some($symbol),)*
                    $name::Unknown(_) => None,
                }
            }
        }

        impl FromWire for $name {
            const WIRE_TYPE: WireType = WireType::Enum;
            const ORDINALS: Option<OrdinalTable> = Some($name::ORDINALS);

            fn from_wire(value: &Value) -> ProjectionResult<Self> {
                value
                    .as_i64()
                    .map($name::from_ordinal)
                    .ok_or_else(|| ProjectionError::mismatch(WireType::Enum, WireKind::of(value)))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.symbol() {
                    Some(symbol) => serializer.serialize_str(symbol),
                    None => serializer.serialize_i64(self.ordinal()),
                }
            }
        }
    };
}

ordinal_enum! {
    /// Activity state of a torrent
    pub enum TorrentStatus {
        /// Torrent is stopped
        Stopped = 0 => "stopped",
        /// Queued to verify local data
        VerifyQueue = 1 => "verify-queue",
        /// Verifying local data
        Verifying = 2 => "verifying",
        /// Queued to download
        DownloadQueue = 3 => "download-queue",
        /// Downloading
        Downloading = 4 => "downloading",
        /// Queued to seed
        SeedQueue = 5 => "seed-queue",
        /// Seeding
        Seeding = 6 => "seeding",
    }
}

ordinal_enum! {
    /// Kind of text found in a torrent's `errorString`
    pub enum TorrentError {
        /// Everything's fine
        Ok = 0 => "ok",
        /// The tracker answered an announce with a warning
        TrackerWarning = 1 => "tracker-warning",
        /// The tracker answered an announce with an error
        TrackerError = 2 => "tracker-error",
        /// Local trouble, such as disk full or permissions
        LocalError = 3 => "local-error",
    }
}

ordinal_enum! {
    /// File and bandwidth priority
    pub enum Priority {
        /// Low priority
        Low = -1 => "low",
        /// Normal priority
        Normal = 0 => "normal",
        /// High priority
        High = 1 => "high",
    }
}

ordinal_enum! {
    /// Announce/scrape state reported in tracker stats
    pub enum TrackerState {
        /// Not announcing or scraping
        Inactive = 0 => "inactive",
        /// Waiting for the next interval
        Waiting = 1 => "waiting",
        /// Queued behind other requests
        Queued = 2 => "queued",
        /// Request in progress
        Active = 3 => "active",
    }
}
