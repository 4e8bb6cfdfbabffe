//! In-memory geo index.
//!
//! Mirrors every write into the storage backend, so a value set through the
//! geo path is also readable with `GET`, and keeps a point table beside it for
//! spatial queries. Searches are a linear scan with great-circle distances;
//! there is no cell decomposition.

use crate::geo::latlng::{distance_meters, LatLng, LatLngExtractor};
use crate::geo::{GeoMatch, GeoService, RadialQuery, SearchCenter, SortType};
use crate::storage::{
    epoch_now, generate_key, BackendError, BackendResult, Expiring, StorageBackend,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct IndexedPoint {
    hash_key: Bytes,
    sort_key: Bytes,
    value: Bytes,
    latlng: LatLng,
    /// UNIX seconds; 0 = never expires
    expire_ts: u64,
}

impl IndexedPoint {
    fn is_live(&self, now: u64) -> bool {
        self.expire_ts == 0 || self.expire_ts > now
    }
}

/// A [`GeoService`] backed by a point table and a [`StorageBackend`].
pub struct GeoIndex {
    storage: Arc<dyn StorageBackend>,
    extractor: LatLngExtractor,
    /// Keyed by storage key.
    points: RwLock<HashMap<Bytes, IndexedPoint>>,
}

impl std::fmt::Debug for GeoIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoIndex")
            .field("extractor", &self.extractor)
            .field("points", &self.points.read().len())
            .finish()
    }
}

impl GeoIndex {
    pub fn new(storage: Arc<dyn StorageBackend>, extractor: LatLngExtractor) -> Self {
        Self {
            storage,
            extractor,
            points: RwLock::new(HashMap::new()),
        }
    }

    /// Number of indexed points, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn storage_key(hash_key: &[u8], sort_key: &[u8]) -> BackendResult<Bytes> {
        generate_key(hash_key, sort_key).ok_or(BackendError::Status(4))
    }

    fn locate(&self, hash_key: &[u8], sort_key: &[u8], now: u64) -> BackendResult<LatLng> {
        let key = Self::storage_key(hash_key, sort_key)?;
        self.points
            .read()
            .get(&key)
            .filter(|p| p.is_live(now))
            .map(|p| p.latlng)
            .ok_or(BackendError::NotFound)
    }
}

impl Expiring for GeoIndex {
    fn name(&self) -> &'static str {
        "geo"
    }

    fn purge_expired(&self, now: u64) -> u64 {
        let mut points = self.points.write();
        let before = points.len();
        points.retain(|_, p| p.is_live(now));
        (before - points.len()) as u64
    }
}

#[async_trait]
impl GeoService for GeoIndex {
    async fn set(
        &self,
        hash_key: Bytes,
        sort_key: Bytes,
        value: Bytes,
        ttl_seconds: u64,
    ) -> BackendResult<()> {
        let key = Self::storage_key(&hash_key, &sort_key)?;
        let expire_ts = if ttl_seconds > 0 {
            epoch_now().saturating_add(ttl_seconds)
        } else {
            0
        };

        self.storage
            .put(key.clone(), value.clone(), expire_ts)
            .await?;

        match self.extractor.extract(&value) {
            Some(latlng) => {
                self.points.write().insert(
                    key,
                    IndexedPoint {
                        hash_key,
                        sort_key,
                        value,
                        latlng,
                        expire_ts,
                    },
                );
            }
            None => {
                // Stored, but no coordinates to index; drop any stale point
                debug!(key = ?hash_key, "value carries no coordinates, not indexed");
                self.points.write().remove(&key);
            }
        }
        Ok(())
    }

    async fn del(&self, hash_key: Bytes, sort_key: Bytes) -> BackendResult<()> {
        let key = Self::storage_key(&hash_key, &sort_key)?;
        self.storage.remove(key.clone()).await?;
        self.points.write().remove(&key);
        Ok(())
    }

    async fn search_radial(&self, query: RadialQuery) -> BackendResult<Vec<GeoMatch>> {
        let now = epoch_now();
        let center = match &query.center {
            SearchCenter::LatLng(latlng) => *latlng,
            SearchCenter::Member { hash_key, sort_key } => self.locate(hash_key, sort_key, now)?,
        };

        let mut matches: Vec<GeoMatch> = self
            .points
            .read()
            .values()
            .filter(|p| p.is_live(now))
            .filter_map(|p| {
                let distance_m = distance_meters(center, p.latlng);
                (distance_m <= query.radius_m).then(|| GeoMatch {
                    hash_key: p.hash_key.clone(),
                    sort_key: p.sort_key.clone(),
                    distance_m,
                    lat_degrees: p.latlng.lat_degrees,
                    lng_degrees: p.latlng.lng_degrees,
                    value: p.value.clone(),
                })
            })
            .collect();

        match query.sort {
            SortType::Asc => matches.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m)),
            SortType::Desc => matches.sort_by(|a, b| b.distance_m.total_cmp(&a.distance_m)),
            SortType::Random => {}
        }
        if let Some(count) = query.count {
            matches.truncate(count);
        }
        Ok(matches)
    }

    async fn distance(
        &self,
        hash_key1: Bytes,
        sort_key1: Bytes,
        hash_key2: Bytes,
        sort_key2: Bytes,
    ) -> BackendResult<f64> {
        let now = epoch_now();
        let a = self.locate(&hash_key1, &sort_key1, now)?;
        let b = self.locate(&hash_key2, &sort_key2, now)?;
        Ok(distance_meters(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;

    fn point(lat: f64, lng: f64) -> Bytes {
        Bytes::from(format!("id|name|city|zone|{}|{}", lng, lat))
    }

    fn index() -> (Arc<StorageEngine>, GeoIndex) {
        let engine = Arc::new(StorageEngine::new());
        let geo = GeoIndex::new(engine.clone(), LatLngExtractor::default());
        (engine, geo)
    }

    async fn seed(geo: &GeoIndex) {
        // Roughly 111 m per 0.001 degree of latitude
        for (name, lat) in [("a", 0.0), ("b", 0.001), ("c", 0.002), ("far", 1.0)] {
            geo.set(Bytes::from(name), Bytes::new(), point(lat, 0.0), 0)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_sweep_purges_expired_points() {
        let (engine, geo) = index();
        geo.set(Bytes::from("short"), Bytes::new(), point(0.0, 0.0), 1)
            .await
            .unwrap();
        geo.set(Bytes::from("forever"), Bytes::new(), point(0.0, 0.0), 0)
            .await
            .unwrap();
        assert_eq!(geo.len(), 2);

        let now = epoch_now();
        assert_eq!(geo.purge_expired(now), 0);

        let geo = Arc::new(geo);
        let stores: Vec<Arc<dyn Expiring>> = vec![engine.clone() as Arc<dyn Expiring>, geo.clone()];
        assert_eq!(crate::storage::sweep_once(&stores, now + 5), 2);
        assert_eq!(geo.len(), 1);
        assert_eq!(engine.len(), 1);
    }

    fn names(matches: &[GeoMatch]) -> Vec<String> {
        matches
            .iter()
            .map(|m| String::from_utf8_lossy(&m.hash_key).into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_set_mirrors_into_storage() {
        let (engine, geo) = index();
        geo.set(Bytes::from("shop"), Bytes::new(), point(1.0, 2.0), 0)
            .await
            .unwrap();
        let key = generate_key(b"shop", b"").unwrap();
        assert_eq!(engine.get_at(&key, epoch_now()), Some(point(1.0, 2.0)));
        assert_eq!(geo.len(), 1);
    }

    #[tokio::test]
    async fn test_set_without_coordinates_is_stored_not_indexed() {
        let (engine, geo) = index();
        geo.set(Bytes::from("k"), Bytes::new(), Bytes::from("plain"), 0)
            .await
            .unwrap();
        assert!(geo.is_empty());
        assert_eq!(engine.len(), 1);
    }

    #[tokio::test]
    async fn test_search_sorted_and_counted() {
        let (_, geo) = index();
        seed(&geo).await;

        let query = RadialQuery {
            center: SearchCenter::LatLng(LatLng::new(0.0, 0.0)),
            radius_m: 500.0,
            count: None,
            sort: SortType::Asc,
        };
        let found = geo.search_radial(query.clone()).await.unwrap();
        assert_eq!(names(&found), vec!["a", "b", "c"]);

        let desc = RadialQuery {
            sort: SortType::Desc,
            count: Some(2),
            ..query
        };
        let found = geo.search_radial(desc).await.unwrap();
        assert_eq!(names(&found), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_search_by_member() {
        let (_, geo) = index();
        seed(&geo).await;

        let query = RadialQuery {
            center: SearchCenter::Member {
                hash_key: Bytes::from("c"),
                sort_key: Bytes::new(),
            },
            radius_m: 150.0,
            count: None,
            sort: SortType::Asc,
        };
        let found = geo.search_radial(query).await.unwrap();
        assert_eq!(names(&found), vec!["c", "b"]);
        assert_eq!(found[0].distance_m, 0.0);
    }

    #[tokio::test]
    async fn test_search_by_missing_member() {
        let (_, geo) = index();
        let query = RadialQuery {
            center: SearchCenter::Member {
                hash_key: Bytes::from("ghost"),
                sort_key: Bytes::new(),
            },
            radius_m: 150.0,
            count: None,
            sort: SortType::Random,
        };
        assert_eq!(geo.search_radial(query).await, Err(BackendError::NotFound));
    }

    #[tokio::test]
    async fn test_del_removes_point() {
        let (engine, geo) = index();
        seed(&geo).await;
        geo.del(Bytes::from("a"), Bytes::new()).await.unwrap();
        assert_eq!(geo.len(), 3);
        assert_eq!(engine.len(), 3);
    }

    #[tokio::test]
    async fn test_distance() {
        let (_, geo) = index();
        seed(&geo).await;
        let d = geo
            .distance(Bytes::from("a"), Bytes::new(), Bytes::from("far"), Bytes::new())
            .await
            .unwrap();
        assert!((d - 111_195.0).abs() < 100.0, "{}", d);

        let missing = geo
            .distance(Bytes::from("a"), Bytes::new(), Bytes::from("x"), Bytes::new())
            .await;
        assert_eq!(missing, Err(BackendError::NotFound));
    }
}
