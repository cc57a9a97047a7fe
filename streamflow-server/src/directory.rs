//! Station queries for the UI.
//!
//! Composes cache lookup, mirror race, normalization and cache write. The
//! public operations always return a list: any failure degrades to an empty
//! result, so callers cannot tell "no stations" from "mirrors down". The
//! `try_` variants keep the error for diagnostics and tests.

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{
    Clock, Fingerprint, KeyValueStore, StationCache, SystemClock, canonical_uuids,
};
use crate::mirror::{MirrorRace, MirrorRequest, MirrorTransport, RaceError, is_path_segment};
use crate::normalize::{normalize, normalize_records};
use crate::station::StationRecord;

/// Result count used when the caller does not ask for one.
pub const DEFAULT_TAG_LIMIT: usize = 30;

/// Most ids resolved per favourites batch. Extra ids are ignored.
pub const MAX_UUID_BATCH: usize = 15;

/// Smallest batch requested from a mirror for a tag query.
const MIN_OVER_FETCH: usize = 80;

/// Errors from a station query.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Tag lookup exhausted the mirrors
    #[error("tag {tag}: {source}")]
    Tag {
        tag: String,
        #[source]
        source: RaceError,
    },

    /// One id in a batch exhausted the mirrors
    #[error("station {uuid}: {source}")]
    Uuid {
        uuid: String,
        #[source]
        source: RaceError,
    },

    /// Tag cannot be sent as a path segment
    #[error("invalid tag {tag:?}")]
    InvalidTag { tag: String },

    /// Id cannot be sent as a path segment
    #[error("invalid station id {uuid:?}")]
    InvalidUuid { uuid: String },
}

/// How many raw records to request so that `limit` survive filtering.
///
/// At least 1.6x the limit, and never fewer than 80.
pub fn over_fetch(limit: usize) -> usize {
    limit.saturating_mul(8).div_ceil(5).max(MIN_OVER_FETCH)
}

/// Mirror request for a tag query.
pub fn tag_request(tag: &str, limit: usize) -> MirrorRequest {
    MirrorRequest::new(["bytag", tag])
        .param("limit", over_fetch(limit))
        .param("order", "votes")
        .param("reverse", "true")
        .param("hidebroken", "true")
}

/// Station lookups backed by mirrors and a cache.
pub struct StationDirectory<T, S, C = SystemClock> {
    mirrors: MirrorRace<T>,
    cache: StationCache<S, C>,
}

impl<T, S, C> StationDirectory<T, S, C>
where
    T: MirrorTransport,
    S: KeyValueStore,
    C: Clock,
{
    /// Create a directory.
    pub fn new(mirrors: MirrorRace<T>, cache: StationCache<S, C>) -> Self {
        Self { mirrors, cache }
    }

    /// Top stations for a tag, at most `limit` of them.
    ///
    /// Never fails; returns an empty list if the mirrors cannot be reached.
    pub async fn fetch_stations_by_tag(&self, tag: &str, limit: usize) -> Vec<StationRecord> {
        self.try_fetch_stations_by_tag(tag, limit)
            .await
            .unwrap_or_else(|e| {
                warn!(tag, limit, error = %e, "Tag lookup failed, returning no stations");
                Vec::new()
            })
    }

    /// Top stations for a tag, reporting mirror exhaustion.
    pub async fn try_fetch_stations_by_tag(
        &self,
        tag: &str,
        limit: usize,
    ) -> Result<Vec<StationRecord>, DirectoryError> {
        if !is_path_segment(tag) {
            return Err(DirectoryError::InvalidTag {
                tag: tag.to_string(),
            });
        }

        let fingerprint = Fingerprint::tag(tag, limit);
        if let Some(cached) = self.cache.get(&fingerprint).await {
            debug!(%fingerprint, count = cached.len(), "Cache hit");
            return Ok(cached);
        }

        let payload = self
            .mirrors
            .race_fetch(&tag_request(tag, limit))
            .await
            .map_err(|source| DirectoryError::Tag {
                tag: tag.to_string(),
                source,
            })?;

        let mut stations = normalize(payload);
        stations.truncate(limit);

        self.cache.put(&fingerprint, &stations).await;
        Ok(stations)
    }

    /// Stations for a set of ids, e.g. a user's favourites.
    ///
    /// Never fails; returns an empty list if any id cannot be resolved.
    pub async fn fetch_stations_by_uuids<U: AsRef<str>>(
        &self,
        uuids: &[U],
    ) -> Vec<StationRecord> {
        self.try_fetch_stations_by_uuids(uuids)
            .await
            .unwrap_or_else(|e| {
                warn!(
                    count = uuids.len(),
                    error = %e,
                    "Station batch failed, returning no stations"
                );
                Vec::new()
            })
    }

    /// Stations for a set of ids, reporting the first id that failed.
    ///
    /// A batch holding an id that cannot be sent as a path segment (empty,
    /// `.` or `..`) fails without contacting any mirror.
    ///
    /// Ids are sorted and de-duplicated; only the first [`MAX_UUID_BATCH`]
    /// are looked up. All lookups run concurrently and the batch succeeds
    /// only if every one of them does.
    pub async fn try_fetch_stations_by_uuids<U: AsRef<str>>(
        &self,
        uuids: &[U],
    ) -> Result<Vec<StationRecord>, DirectoryError> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = uuids.iter().map(|u| u.as_ref()).find(|u| !is_path_segment(u)) {
            return Err(DirectoryError::InvalidUuid {
                uuid: bad.to_string(),
            });
        }

        let fingerprint = Fingerprint::uuids(uuids);
        if let Some(cached) = self.cache.get(&fingerprint).await {
            debug!(%fingerprint, count = cached.len(), "Cache hit");
            return Ok(cached);
        }

        let ids = canonical_uuids(uuids);
        if ids.len() > MAX_UUID_BATCH {
            debug!(
                requested = ids.len(),
                kept = MAX_UUID_BATCH,
                "Truncating station batch"
            );
        }

        let lookups = ids.iter().take(MAX_UUID_BATCH).map(|uuid| async move {
            self.mirrors
                .race_fetch(&MirrorRequest::new(["byuuid", uuid.as_str()]))
                .await
                .map_err(|source| DirectoryError::Uuid {
                    uuid: uuid.clone(),
                    source,
                })
        });
        let payloads = try_join_all(lookups).await?;

        let records = payloads.into_iter().flat_map(|payload| match payload {
            Value::Array(items) => items,
            _ => Vec::new(),
        });
        let stations = normalize_records(records);

        self.cache.put(&fingerprint, &stations).await;
        Ok(stations)
    }

    /// The mirror race used for lookups.
    pub fn mirrors(&self) -> &MirrorRace<T> {
        &self.mirrors
    }

    /// The station cache.
    pub fn cache(&self) -> &StationCache<S, C> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::cache::testing::ManualClock;
    use crate::cache::{CacheConfig, MemoryStore};
    use crate::mirror::MirrorConfig;
    use crate::mirror::mock::{Reply, ScriptedTransport};

    const M1: &str = "https://m1.example/json";
    const M2: &str = "https://m2.example/json";

    type TestDirectory = StationDirectory<ScriptedTransport, MemoryStore, ManualClock>;

    fn directory(transport: ScriptedTransport, clock: &ManualClock) -> TestDirectory {
        StationDirectory::new(
            MirrorRace::new(transport, MirrorConfig::new([M1, M2])),
            StationCache::with_clock(MemoryStore::default(), CacheConfig::default(), clock.clone()),
        )
    }

    fn station(uuid: &str, name: &str, votes: i64) -> Value {
        json!({
            "stationuuid": uuid,
            "name": name,
            "url_resolved": format!("https://streams.example/{uuid}"),
            "codec": "MP3",
            "votes": votes,
        })
    }

    fn calls(directory: &TestDirectory) -> usize {
        directory.mirrors().transport().calls().len()
    }

    #[test]
    fn over_fetch_ratio() {
        assert_eq!(over_fetch(10), 80);
        assert_eq!(over_fetch(30), 80);
        assert_eq!(over_fetch(50), 80);
        assert_eq!(over_fetch(51), 82);
        assert_eq!(over_fetch(100), 160);
    }

    #[test]
    fn tag_request_params() {
        let url = tag_request("jazz", 50).url_for(M1).unwrap();
        assert_eq!(
            url.as_str(),
            "https://m1.example/json/bytag/jazz?limit=80&order=votes&reverse=true&hidebroken=true"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tag_query_hits_cache_second_time() {
        let transport = ScriptedTransport::new()
            .on_mirror(M1, Reply::Json(json!([station("a", "A", 3), station("b", "B", 9)])))
            .on_mirror(M2, Reply::Hang);
        let clock = ManualClock::at(0);
        let dir = directory(transport, &clock);

        let first = dir.fetch_stations_by_tag("jazz", 10).await;
        let after_first = calls(&dir);
        let second = dir.fetch_stations_by_tag("jazz", 10).await;

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].display_name(), "B");
        assert_eq!(first, second);
        assert_eq!(calls(&dir), after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn tag_query_refetches_after_ttl() {
        let transport = ScriptedTransport::new()
            .on_mirror(M1, Reply::Json(json!([station("a", "A", 3)])))
            .on_mirror(M2, Reply::Status(500));
        let clock = ManualClock::at(0);
        let dir = directory(transport, &clock);

        dir.fetch_stations_by_tag("jazz", 10).await;
        let after_first = calls(&dir);

        clock.advance(Duration::from_secs(30 * 60 + 1));
        dir.fetch_stations_by_tag("jazz", 10).await;
        assert!(calls(&dir) > after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn tag_query_truncates_to_limit() {
        let raw: Vec<Value> = (0..20)
            .map(|i| station(&format!("u{i}"), &format!("S{i}"), i))
            .collect();
        let transport = ScriptedTransport::new()
            .on_mirror(M1, Reply::Json(Value::Array(raw)))
            .on_mirror(M2, Reply::Hang);
        let dir = directory(transport, &ManualClock::at(0));

        let out = dir.fetch_stations_by_tag("pop", 5).await;
        let votes: Vec<i64> = out.iter().map(|s| s.vote_count()).collect();
        assert_eq!(votes, vec![19, 18, 17, 16, 15]);
    }

    #[tokio::test(start_paused = true)]
    async fn tag_query_degrades_to_empty_and_does_not_cache() {
        let transport = ScriptedTransport::new()
            .on_mirror(M1, Reply::Status(503))
            .on_mirror(M2, Reply::Hang);
        let dir = directory(transport, &ManualClock::at(0));

        assert!(matches!(
            dir.try_fetch_stations_by_tag("jazz", 10).await,
            Err(DirectoryError::Tag {
                source: RaceError::AllMirrorsFailed { .. },
                ..
            })
        ));
        assert!(dir.fetch_stations_by_tag("jazz", 10).await.is_empty());
        assert!(dir.cache().get(&Fingerprint::tag("jazz", 10)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn tag_query_with_no_mirrors_is_empty() {
        let dir = StationDirectory::new(
            MirrorRace::new(ScriptedTransport::new(), MirrorConfig::new(Vec::<String>::new())),
            StationCache::new(MemoryStore::default(), CacheConfig::default()),
        );

        assert!(matches!(
            dir.try_fetch_stations_by_tag("jazz", 10).await,
            Err(DirectoryError::Tag {
                source: RaceError::NoMirrorsConfigured,
                ..
            })
        ));
        assert!(dir.fetch_stations_by_tag("jazz", 10).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn jazz_scenario_with_one_mirror_timing_out() {
        let mut raw = Vec::new();
        for i in 0..5 {
            let mut s = station(&format!("insecure{i}"), &format!("Insecure {i}"), 1000 + i);
            s["url_resolved"] = json!(format!("http://plain.example/{i}"));
            raw.push(s);
        }
        for i in 0..3 {
            let mut s = station(&format!("flac{i}"), &format!("Lossless {i}"), 900 + i);
            s["codec"] = json!("flac");
            raw.push(s);
        }
        for i in 0..10 {
            raw.push(station(&format!("dup{i}a"), &format!("Twin {i}"), 400 + i));
            raw.push(station(&format!("dup{i}b"), &format!("Twin {i}"), 500 + i));
        }
        for i in 0..52 {
            raw.push(station(&format!("solo{i}"), &format!("Solo {i}"), (i * 7) % 97));
        }
        assert_eq!(raw.len(), 80);

        let transport = ScriptedTransport::new()
            .on_mirror(M1, Reply::Hang)
            .on_mirror(M2, Reply::Json(Value::Array(raw)));
        let dir = directory(transport, &ManualClock::at(0));

        let out = dir.fetch_stations_by_tag("jazz", 10).await;

        assert_eq!(out.len(), 10);
        let names: HashSet<_> = out.iter().map(|s| s.display_name()).collect();
        assert_eq!(names.len(), out.len());
        for s in &out {
            assert!(s.stream_url().unwrap().starts_with("https://"));
            assert_ne!(s.codec(), Some("flac"));
        }
        for pair in out.windows(2) {
            assert!(pair[0].vote_count() >= pair[1].vote_count());
        }
        // Twins keep their higher-voted copy.
        assert_eq!(out[0].stationuuid(), Some("dup9b"));
        assert_eq!(out[0].vote_count(), 509);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_uuid_list_makes_no_request() {
        let dir = directory(ScriptedTransport::new(), &ManualClock::at(0));
        let none: [&str; 0] = [];

        assert!(dir.fetch_stations_by_uuids(&none).await.is_empty());
        assert_eq!(calls(&dir), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn uuid_batch_is_ranked_and_cached_order_independently() {
        let transport = ScriptedTransport::new()
            .on(
                &format!("{M1}/byuuid/a"),
                Reply::Json(json!([station("a", "Alpha", 2)])),
            )
            .on(
                &format!("{M1}/byuuid/b"),
                Reply::Json(json!([station("b", "Bravo", 8)])),
            )
            .on_mirror(M2, Reply::Hang);
        let dir = directory(transport, &ManualClock::at(0));

        let first = dir.fetch_stations_by_uuids(&["b", "a"]).await;
        let after_first = calls(&dir);
        let second = dir.fetch_stations_by_uuids(&["a", "b"]).await;

        let names: Vec<_> = first.iter().map(|s| s.display_name()).collect();
        assert_eq!(names, vec!["Bravo", "Alpha"]);
        assert_eq!(first, second);
        assert_eq!(calls(&dir), after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn uuid_batch_is_capped() {
        let transport = ScriptedTransport::new()
            .on_mirror(M1, Reply::Json(json!([])))
            .on_mirror(M2, Reply::Json(json!([])));
        let dir = directory(transport, &ManualClock::at(0));
        let ids: Vec<String> = (0..20).map(|i| format!("id{i:02}")).collect();

        dir.fetch_stations_by_uuids(&ids).await;

        let mut requested: Vec<String> = dir
            .mirrors()
            .transport()
            .calls()
            .into_iter()
            .filter_map(|url| url.rsplit('/').next().map(str::to_string))
            .collect();
        requested.sort();
        requested.dedup();
        assert_eq!(requested.len(), MAX_UUID_BATCH);
        assert_eq!(requested.first().map(String::as_str), Some("id00"));
        assert_eq!(requested.last().map(String::as_str), Some("id14"));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failed_uuid_fails_the_batch() {
        let transport = ScriptedTransport::new()
            .on(
                &format!("{M1}/byuuid/good"),
                Reply::Json(json!([station("good", "Good", 1)])),
            )
            .on(&format!("{M1}/byuuid/gone"), Reply::Status(404))
            .on_mirror(M2, Reply::Status(502));
        let dir = directory(transport, &ManualClock::at(0));

        let err = dir
            .try_fetch_stations_by_uuids(&["good", "gone"])
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Uuid { ref uuid, .. } if uuid == "gone"));

        assert!(dir.fetch_stations_by_uuids(&["good", "gone"]).await.is_empty());
        assert!(
            dir.cache()
                .get(&Fingerprint::uuids(&["good", "gone"]))
                .await
                .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dot_tag_is_rejected_without_mirror_calls() {
        let dir = directory(ScriptedTransport::new(), &ManualClock::at(0));

        for tag in ["..", "."] {
            assert!(matches!(
                dir.try_fetch_stations_by_tag(tag, 10).await,
                Err(DirectoryError::InvalidTag { .. })
            ));
            assert!(dir.fetch_stations_by_tag(tag, 10).await.is_empty());
        }
        assert_eq!(calls(&dir), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dot_uuid_fails_batch_without_mirror_calls() {
        let transport = ScriptedTransport::new()
            .on_mirror(M1, Reply::Json(json!([station("good", "Good", 1)])));
        let dir = directory(transport, &ManualClock::at(0));

        let err = dir
            .try_fetch_stations_by_uuids(&["good", ".."])
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidUuid { ref uuid } if uuid == ".."));

        assert!(dir.fetch_stations_by_uuids(&["good", "."]).await.is_empty());
        assert_eq!(calls(&dir), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn uuid_batch_drops_duplicates_and_bad_payloads() {
        let transport = ScriptedTransport::new()
            .on(
                &format!("{M1}/byuuid/x"),
                Reply::Json(json!([station("x", "Same Name", 1)])),
            )
            .on(
                &format!("{M1}/byuuid/y"),
                Reply::Json(json!([station("y", "Same Name", 5)])),
            )
            .on(&format!("{M1}/byuuid/z"), Reply::Json(json!({"unexpected": true})))
            .on_mirror(M2, Reply::Hang);
        let dir = directory(transport, &ManualClock::at(0));

        let out = dir.fetch_stations_by_uuids(&["x", "y", "z", "x"]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].stationuuid(), Some("y"));
    }
}
