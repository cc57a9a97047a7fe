//! Station filtering, deduplication and ranking.
//!
//! Mirrors return whatever the directory holds: plain-HTTP streams, codecs
//! browsers cannot play, and the same station listed several times under
//! one name. This module turns a raw payload into the list the UI shows.

use std::collections::HashMap;

use reqwest::Url;
use serde_json::Value;

use crate::station::StationRecord;

/// Normalize a raw mirror payload.
///
/// A payload that is not a JSON array is treated as empty.
pub fn normalize(payload: Value) -> Vec<StationRecord> {
    match payload {
        Value::Array(items) => normalize_records(items),
        _ => Vec::new(),
    }
}

/// Filter, deduplicate and rank raw station values.
///
/// Keeps secure, browser-playable streams, collapses records sharing a
/// display name to the highest-voted one, and returns them sorted by votes
/// descending. Elements that do not decode as a station are skipped.
pub fn normalize_records(items: impl IntoIterator<Item = Value>) -> Vec<StationRecord> {
    let mut unique: Vec<StationRecord> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for item in items {
        let Ok(station) = serde_json::from_value::<StationRecord>(item) else {
            continue;
        };
        if !is_candidate(&station) {
            continue;
        }

        match by_name.get(station.display_name()) {
            Some(&idx) => {
                if station.vote_count() > unique[idx].vote_count() {
                    unique[idx] = station;
                }
            }
            None => {
                by_name.insert(station.display_name().to_string(), unique.len());
                unique.push(station);
            }
        }
    }

    rank_by_votes(unique)
}

/// Sort stations by votes, most popular first.
///
/// The sort is stable: equal scores keep their incoming order.
pub fn rank_by_votes(mut stations: Vec<StationRecord>) -> Vec<StationRecord> {
    stations.sort_by_key(|s| std::cmp::Reverse(s.vote_count()));
    stations
}

fn is_candidate(station: &StationRecord) -> bool {
    station
        .stream_url()
        .and_then(secure_stream_url)
        .is_some_and(|url| is_browser_playable(station.codec(), &url))
}

/// Parse a stream URL, keeping it only if it uses TLS transport.
pub fn secure_stream_url(url: &str) -> Option<Url> {
    Url::parse(url).ok().filter(|u| u.scheme() == "https")
}

/// Whether a browser audio element can be expected to play this stream.
///
/// An unknown codec is given the benefit of the doubt.
pub fn is_browser_playable(codec: Option<&str>, url: &Url) -> bool {
    let codec = codec.unwrap_or("").trim().to_ascii_lowercase();
    if codec.is_empty() || codec.contains("mp3") || codec.contains("aac") {
        return true;
    }

    let path = url.path().to_ascii_lowercase();
    path.ends_with(".mp3") || path.ends_with(".aac")
}
