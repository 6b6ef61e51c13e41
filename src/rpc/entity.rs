//! Projected daemon entities
//!
//! Each entity is declared once with its attributes and wire keys; the
//! declaration produces both the Rust struct and its field-registry table.
//! Entities are immutable snapshots and hold no reference to the client.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::enums::{Priority, TorrentError, TorrentStatus, TrackerState};
use super::error::{ProjectionError, ProjectionResult};
use super::fields::{EntityKind, WireKind, WireType};
use super::projector::{Field, FromWire, Shape, project, project_many, projectable};

projectable! {
    /// A torrent as reported by `torrent-get`
    pub struct TorrentInfo: EntityKind::Torrent {
        /// Unique id for the lifetime of the daemon session
        id: i32 = "id",
        /// Last time piece data was transferred (unix seconds)
        activity_date: i64 = "activityDate",
        /// When the torrent was added (unix seconds)
        added_date: i64 = "addedDate",
        comment: String = "comment",
        /// Bytes of corrupt data ever downloaded
        corrupt_ever: i64 = "corruptEver",
        creator: String = "creator",
        date_created: i64 = "dateCreated",
        /// Bytes wanted and not yet held that a connected peer has
        desired_available: i64 = "desiredAvailable",
        /// When the download finished (unix seconds)
        done_date: i64 = "doneDate",
        download_dir: String = "downloadDir",
        downloaded_ever: i64 = "downloadedEver",
        /// Last time a rarely-changing field changed
        edit_date: i64 = "editDate",
        /// Kind of text in `error_string`
        error: TorrentError = "error",
        error_string: String = "errorString",
        /// Seconds until done (downloading) or until the seed ratio is hit
        eta: i64 = "eta",
        /// Seconds until the idle limit is reached while seeding
        eta_idle: i64 = "etaIdle",
        file_count: i32 = "file-count",
        files: Vec<TorrentFile> = "files",
        file_stats: Vec<FileStats> = "fileStats",
        hash_string: String = "hashString",
        have_unchecked: i64 = "haveUnchecked",
        have_valid: i64 = "haveValid",
        is_finished: bool = "isFinished",
        is_private: bool = "isPrivate",
        is_stalled: bool = "isStalled",
        left_until_done: i64 = "leftUntilDone",
        magnet_link: String = "magnetLink",
        manual_announce_time: i64 = "manualAnnounceTime",
        max_connected_peers: i32 = "maxConnectedPeers",
        metadata_percent_complete: f64 = "metadataPercentComplete",
        name: String = "name",
        peers: Vec<Peer> = "peers",
        peers_connected: i32 = "peersConnected",
        peers_from: PeersFrom = "peersFrom",
        peers_getting_from_us: i32 = "peersGettingFromUs",
        peers_sending_to_us: i32 = "peersSendingToUs",
        percent_complete: f64 = "percentComplete",
        /// Fraction of wanted data held, in [0, 1]
        percent_done: f64 = "percentDone",
        /// Base64 bitfield of held pieces
        pieces: String = "pieces",
        piece_count: i32 = "pieceCount",
        piece_size: i64 = "pieceSize",
        priorities: Vec<Priority> = "priorities",
        primary_mime_type: String = "primary-mime-type",
        rate_download: i64 = "rateDownload",
        rate_upload: i64 = "rateUpload",
        recheck_progress: f64 = "recheckProgress",
        seconds_downloading: i64 = "secondsDownloading",
        seconds_seeding: i64 = "secondsSeeding",
        size_when_done: i64 = "sizeWhenDone",
        start_date: i64 = "startDate",
        status: TorrentStatus = "status",
        trackers: Vec<Tracker> = "trackers",
        tracker_stats: Vec<TrackerStats> = "trackerStats",
        total_size: i64 = "totalSize",
        torrent_file: String = "torrentFile",
        uploaded_ever: i64 = "uploadedEver",
        upload_ratio: f64 = "uploadRatio",
        wanted: Vec<bool> = "wanted",
        webseeds: Vec<String> = "webseeds",
        webseeds_sending_to_us: i32 = "webseedsSendingToUs",
    }
}

impl TorrentInfo {
    /// When the torrent was added, if requested and known
    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        timestamp(&self.added_date)
    }

    /// Last transfer activity, if requested and known
    pub fn activity_at(&self) -> Option<DateTime<Utc>> {
        timestamp(&self.activity_date)
    }

    /// When the download finished, if requested and known
    pub fn done_at(&self) -> Option<DateTime<Utc>> {
        timestamp(&self.done_date)
    }
}

// The daemon reports "never" as 0.
fn timestamp(field: &Field<i64>) -> Option<DateTime<Utc>> {
    field
        .value()
        .filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

projectable! {
    /// A file inside a torrent
    pub struct TorrentFile: EntityKind::File {
        bytes_completed: i64 = "bytesCompleted",
        length: i64 = "length",
        name: String = "name",
    }
}

projectable! {
    /// Per-file download settings and progress
    pub struct FileStats: EntityKind::FileStats {
        bytes_completed: i64 = "bytesCompleted",
        wanted: bool = "wanted",
        priority: Priority = "priority",
    }
}

projectable! {
    /// A connected peer
    pub struct Peer: EntityKind::Peer {
        address: String = "address",
        client_name: String = "clientName",
        client_is_choked: bool = "clientIsChoked",
        client_is_interested: bool = "clientIsInterested",
        flag_str: String = "flagStr",
        is_downloading_from: bool = "isDownloadingFrom",
        is_encrypted: bool = "isEncrypted",
        is_uploading_to: bool = "isUploadingTo",
        is_utp: bool = "isUTP",
        peer_is_choked: bool = "peerIsChoked",
        peer_is_interested: bool = "peerIsInterested",
        port: i32 = "port",
        progress: f64 = "progress",
        rate_to_client: i64 = "rateToClient",
        rate_to_peer: i64 = "rateToPeer",
    }
}

projectable! {
    /// How connected peers were discovered
    pub struct PeersFrom: EntityKind::PeersFrom {
        from_dht: i32 = "fromDht",
        from_incoming: i32 = "fromIncoming",
        from_lpd: i32 = "fromLpd",
        from_ltep: i32 = "fromLtep",
        from_pex: i32 = "fromPex",
        from_tracker: i32 = "fromTracker",
    }
}

projectable! {
    /// A tracker announce URL
    pub struct Tracker: EntityKind::Tracker {
        id: i32 = "id",
        announce: String = "announce",
        scrape: String = "scrape",
        tier: i32 = "tier",
    }
}

projectable! {
    /// Announce and scrape statistics for one tracker
    pub struct TrackerStats: EntityKind::TrackerStats {
        id: i32 = "id",
        announce: String = "announce",
        announce_state: TrackerState = "announceState",
        host: String = "host",
        last_announce_result: String = "lastAnnounceResult",
        last_announce_succeeded: bool = "lastAnnounceSucceeded",
        last_announce_peer_count: i32 = "lastAnnouncePeerCount",
        scrape_state: TrackerState = "scrapeState",
        seeder_count: i32 = "seederCount",
        leecher_count: i32 = "leecherCount",
        download_count: i32 = "downloadCount",
        tier: i32 = "tier",
    }
}

/// Result of `torrent-get`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TorrentsResult {
    /// Torrents in the order the daemon listed them
    pub torrents: Vec<TorrentInfo>,
    /// Torrents removed since the last `recently-active` request
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub removed: Field<Vec<TorrentInfo>>,
}

impl TorrentsResult {
    /// Project a `torrent-get` arguments map.
    ///
    /// `removed` entries may be bare ids; those project to an entity with only
    /// `id` set. `torrents` is not a requestable attribute: the daemon always
    /// answers `torrent-get` with the list, so an absent key reads as no
    /// matching torrents. `removed` only appears for `recently-active`
    /// requests and keeps its presence.
    pub fn project(arguments: &Map<String, Value>, shape: &Shape<TorrentInfo>) -> ProjectionResult<Self> {
        let torrents = match arguments.get("torrents") {
            Some(value) => project_torrent_list(value, shape).map_err(|err| err.at("torrents"))?,
            None => Vec::new(),
        };

        let removed = match arguments.get("removed") {
            Some(value) => {
                Field::Set(project_removed(value, shape).map_err(|err| err.at("removed"))?)
            }
            None => Field::Unset,
        };

        Ok(Self { torrents, removed })
    }
}

fn project_torrent_list(value: &Value, shape: &Shape<TorrentInfo>) -> ProjectionResult<Vec<TorrentInfo>> {
    let items = value.as_array().ok_or_else(|| {
        ProjectionError::mismatch(WireType::Array, WireKind::of(value))
    })?;
    project_many(items, shape)
}

fn project_removed(value: &Value, shape: &Shape<TorrentInfo>) -> ProjectionResult<Vec<TorrentInfo>> {
    let items = value.as_array().ok_or_else(|| {
        ProjectionError::mismatch(WireType::Array, WireKind::of(value))
    })?;
    let id_only = Shape::<TorrentInfo>::new(["id"])?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let segment = format!("[{index}]");
            match item {
                Value::Object(map) => project(map, shape).map_err(|err| err.at(&segment)),
                Value::Number(_) => {
                    let mut wrapped = Map::new();
                    wrapped.insert("id".to_string(), item.clone());
                    project(&wrapped, &id_only).map_err(|err| err.at(&segment))
                }
                other => Err(ProjectionError::mismatch(WireType::Object, WireKind::of(other)).at(&segment)),
            }
        })
        .collect()
}

/// Result of `torrent-add`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TorrentAdded {
    /// The added (or already present) torrent
    pub torrent: TorrentInfo,
    /// True when the daemon already had this torrent
    pub duplicate: bool,
}

impl TorrentAdded {
    /// Project a `torrent-add` arguments map.
    ///
    /// Returns `None` when neither `torrent-added` nor `torrent-duplicate` is
    /// present.
    pub fn project(arguments: &Map<String, Value>) -> ProjectionResult<Option<Self>> {
        let (value, duplicate, key) = match (
            arguments.get("torrent-added"),
            arguments.get("torrent-duplicate"),
        ) {
            (Some(value), _) => (value, false, "torrent-added"),
            (None, Some(value)) => (value, true, "torrent-duplicate"),
            (None, None) => return Ok(None),
        };
        let torrent = TorrentInfo::from_wire(value)
            .map_err(|err| err.at(key))?;
        Ok(Some(Self { torrent, duplicate }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_torrents_and_removed_stay_separate() {
        let shape = Shape::<TorrentInfo>::new(["id", "name"]).unwrap();
        let arguments = map(json!({
            "torrents": [{"id": 3, "name": "c"}, {"id": 1, "name": "a"}],
            "removed": [{"id": 9}, 8]
        }));
        let result = TorrentsResult::project(&arguments, &shape).unwrap();
        let ids: Vec<i32> = result.torrents.iter().filter_map(|t| t.id.value()).collect();
        assert_eq!(ids, vec![3, 1]);

        let removed = result.removed.get().unwrap();
        let removed_ids: Vec<i32> = removed.iter().filter_map(|t| t.id.value()).collect();
        assert_eq!(removed_ids, vec![9, 8]);
        assert_eq!(removed[1].name, Field::Unset);
    }

    #[test]
    fn test_removed_absent_is_unset() {
        let shape = Shape::<TorrentInfo>::new(["id"]).unwrap();
        let result = TorrentsResult::project(&map(json!({"torrents": []})), &shape).unwrap();
        assert!(result.torrents.is_empty());
        assert_eq!(result.removed, Field::Unset);

        let result = TorrentsResult::project(&map(json!({"torrents": [], "removed": []})), &shape).unwrap();
        assert_eq!(result.removed, Field::Set(vec![]));
    }

    #[test]
    fn test_missing_torrents_key_reads_as_no_matches() {
        let shape = Shape::<TorrentInfo>::new(["id"]).unwrap();
        let result = TorrentsResult::project(&Map::new(), &shape).unwrap();
        assert!(result.torrents.is_empty());
        assert_eq!(result.removed, Field::Unset);
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"torrents": []}));
    }

    #[test]
    fn test_removed_ids_ignore_requested_shape() {
        let shape = Shape::<TorrentInfo>::new(["name", "status"]).unwrap();
        let result = TorrentsResult::project(&map(json!({"removed": [4]})), &shape).unwrap();
        let removed = result.removed.get().unwrap();
        assert_eq!(
            serde_json::to_value(&removed[0]).unwrap(),
            json!({"id": 4})
        );
    }

    #[test]
    fn test_torrent_list_mismatch_path() {
        let shape = Shape::<TorrentInfo>::new(["id"]).unwrap();
        let err = TorrentsResult::project(&map(json!({"torrents": [{"id": 1}, {"id": true}]})), &shape)
            .unwrap_err();
        assert_eq!(err.to_string(), "field 'torrents[1].id' expected int but the daemon sent bool");
    }

    #[test]
    fn test_timestamps() {
        let torrent = TorrentInfo {
            added_date: Field::Set(1_700_000_000),
            done_date: Field::Set(0),
            ..Default::default()
        };
        assert_eq!(
            torrent.added_at().map(|dt| dt.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(torrent.done_at(), None);
        assert_eq!(torrent.activity_at(), None);
    }

    #[test]
    fn test_torrent_added_and_duplicate() {
        let added = TorrentAdded::project(&map(json!({
            "torrent-added": {"id": 5, "name": "n", "hashString": "abc"}
        })))
        .unwrap()
        .unwrap();
        assert!(!added.duplicate);
        assert_eq!(added.torrent.id, Field::Set(5));
        assert_eq!(added.torrent.hash_string, Field::Set("abc".to_string()));

        let duplicate = TorrentAdded::project(&map(json!({
            "torrent-duplicate": {"id": 5}
        })))
        .unwrap()
        .unwrap();
        assert!(duplicate.duplicate);

        assert_eq!(TorrentAdded::project(&Map::new()).unwrap(), None);
    }

    #[test]
    fn test_peers_from_object() {
        let shape = Shape::<TorrentInfo>::new(["peers_from"]).unwrap();
        let torrent = project(
            &map(json!({"peersFrom": {"fromDht": 2, "fromPex": 1}})),
            &shape,
        )
        .unwrap();
        let from = torrent.peers_from.get().unwrap();
        assert_eq!(from.from_dht, Field::Set(2));
        assert_eq!(from.from_pex, Field::Set(1));
        assert_eq!(from.from_tracker, Field::Unset);
    }
}
