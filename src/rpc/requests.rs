//! Typed request arguments for the torrent methods

use serde_json::{Map, Value};

use super::entity::TorrentInfo;
use super::envelope::Arguments;
use super::projector::Shape;

/// A single torrent reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentRef {
    /// Session-local numeric id
    Id(i64),
    /// Info-hash string
    Hash(String),
}

impl TorrentRef {
    fn into_value(self) -> Value {
        match self {
            TorrentRef::Id(id) => Value::Number(id.into()),
            TorrentRef::Hash(hash) => Value::String(hash),
        }
    }
}

impl From<i64> for TorrentRef {
    fn from(id: i64) -> Self {
        TorrentRef::Id(id)
    }
}

impl From<&str> for TorrentRef {
    fn from(hash: &str) -> Self {
        TorrentRef::Hash(hash.to_string())
    }
}

/// Which torrents a request applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TorrentIds {
    /// Every torrent; `ids` is omitted from the request
    #[default]
    All,
    /// The listed torrents
    List(Vec<TorrentRef>),
    /// Torrents changed recently; responses then carry `removed`
    RecentlyActive,
}

impl TorrentIds {
    /// Parse a CLI-style reference: a number is an id, anything else a hash.
    pub fn parse_list<I, S>(refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let refs: Vec<TorrentRef> = refs
            .into_iter()
            .map(|r| match r.as_ref().parse::<i64>() {
                Ok(id) => TorrentRef::Id(id),
                Err(_) => TorrentRef::Hash(r.as_ref().to_string()),
            })
            .collect();
        if refs.is_empty() {
            TorrentIds::All
        } else {
            TorrentIds::List(refs)
        }
    }

    fn insert_into(self, map: &mut Map<String, Value>) {
        match self {
            TorrentIds::All => {}
            TorrentIds::List(refs) => {
                map.insert(
                    "ids".to_string(),
                    Value::Array(refs.into_iter().map(TorrentRef::into_value).collect()),
                );
            }
            TorrentIds::RecentlyActive => {
                map.insert("ids".to_string(), Value::String("recently-active".to_string()));
            }
        }
    }
}

/// Parameters accepted by `torrent-get`
#[derive(Debug, Clone)]
pub struct TorrentGetRequest {
    /// Torrents to fetch
    pub ids: TorrentIds,
    /// Attributes to fetch
    pub shape: Shape<TorrentInfo>,
}

impl TorrentGetRequest {
    /// Fetch `shape` for every torrent
    pub fn new(shape: Shape<TorrentInfo>) -> Self {
        Self {
            ids: TorrentIds::All,
            shape,
        }
    }
}

impl Arguments for &TorrentGetRequest {
    fn into_arguments(self) -> Option<Map<String, Value>> {
        let mut map = Map::new();
        map.insert(
            "fields".to_string(),
            Value::Array(
                self.shape
                    .wire_keys()
                    .into_iter()
                    .map(|key| Value::String(key.to_string()))
                    .collect(),
            ),
        );
        self.ids.clone().insert_into(&mut map);
        Some(map)
    }
}

/// Torrent lifecycle actions that take only `ids`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentAction {
    /// `torrent-start`
    Start,
    /// `torrent-start-now` (bypasses the queue)
    StartNow,
    /// `torrent-stop`
    Stop,
    /// `torrent-verify`
    Verify,
    /// `torrent-reannounce`
    Reannounce,
}

impl TorrentAction {
    /// RPC method name
    pub fn method(self) -> &'static str {
        match self {
            TorrentAction::Start => "torrent-start",
            TorrentAction::StartNow => "torrent-start-now",
            TorrentAction::Stop => "torrent-stop",
            TorrentAction::Verify => "torrent-verify",
            TorrentAction::Reannounce => "torrent-reannounce",
        }
    }
}

impl Arguments for TorrentIds {
    fn into_arguments(self) -> Option<Map<String, Value>> {
        let mut map = Map::new();
        self.insert_into(&mut map);
        Some(map)
    }
}

/// Parameters accepted by `torrent-remove`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentRemoveRequest {
    /// Torrents to remove
    pub ids: TorrentIds,
    /// Also delete downloaded data; omitted when `None`
    pub delete_local_data: Option<bool>,
}

impl Arguments for TorrentRemoveRequest {
    fn into_arguments(self) -> Option<Map<String, Value>> {
        let mut map = Map::new();
        self.ids.insert_into(&mut map);
        if let Some(delete) = self.delete_local_data {
            map.insert("delete-local-data".to_string(), Value::Bool(delete));
        }
        Some(map)
    }
}

/// Parameters accepted by `torrent-add`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentAddRequest {
    /// Path or URL of a .torrent file, or a magnet link
    pub filename: Option<String>,
    /// Base64-encoded .torrent content
    pub metainfo: Option<String>,
    /// Directory to download into
    pub download_dir: Option<String>,
    /// Add without starting
    pub paused: Option<bool>,
}

impl Arguments for TorrentAddRequest {
    fn into_arguments(self) -> Option<Map<String, Value>> {
        let mut map = Map::new();
        if let Some(filename) = self.filename {
            map.insert("filename".to_string(), Value::String(filename));
        }
        if let Some(metainfo) = self.metainfo {
            map.insert("metainfo".to_string(), Value::String(metainfo));
        }
        if let Some(download_dir) = self.download_dir {
            map.insert("download-dir".to_string(), Value::String(download_dir));
        }
        if let Some(paused) = self.paused {
            map.insert("paused".to_string(), Value::Bool(paused));
        }
        Some(map)
    }
}
