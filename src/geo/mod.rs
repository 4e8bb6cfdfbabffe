//! Geo Collaborator
//!
//! Spatial commands are answered by a [`GeoService`]: something that keeps a
//! spherical index over stored values and can run radial searches and
//! point-to-point distances. The proxy only composes parameters and replies
//! around it (see `commands::geo`).
//!
//! Geo data is written with plain `SET`: the value carries the coordinates
//! and the service extracts them (see [`LatLngExtractor`]). Members are the
//! hash keys of those values.

pub mod index;
pub mod latlng;

use crate::storage::BackendResult;
use async_trait::async_trait;
use bytes::Bytes;

pub use index::GeoIndex;
pub use latlng::{distance_meters, LatLng, LatLngExtractor, EARTH_RADIUS_METERS};

/// Result ordering for radial searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortType {
    /// Whatever order the index produces.
    #[default]
    Random,
    Asc,
    Desc,
}

/// Distance units accepted by the GEO commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Feet,
    Miles,
}

impl DistanceUnit {
    /// Parses `m`, `km`, `ft` or `mi` (any case).
    pub fn parse(token: &[u8]) -> Option<Self> {
        if token.eq_ignore_ascii_case(b"m") {
            Some(DistanceUnit::Meters)
        } else if token.eq_ignore_ascii_case(b"km") {
            Some(DistanceUnit::Kilometers)
        } else if token.eq_ignore_ascii_case(b"ft") {
            Some(DistanceUnit::Feet)
        } else if token.eq_ignore_ascii_case(b"mi") {
            Some(DistanceUnit::Miles)
        } else {
            None
        }
    }

    pub fn meters_per_unit(self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Feet => 0.3048,
            DistanceUnit::Miles => 1609.344,
        }
    }

    pub fn to_meters(self, value: f64) -> f64 {
        value * self.meters_per_unit()
    }

    pub fn from_meters(self, meters: f64) -> f64 {
        meters / self.meters_per_unit()
    }
}

/// One hit of a radial search.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoMatch {
    pub hash_key: Bytes,
    pub sort_key: Bytes,
    /// Distance from the search center, in meters.
    pub distance_m: f64,
    pub lat_degrees: f64,
    pub lng_degrees: f64,
    /// The value exactly as stored.
    pub value: Bytes,
}

/// Where a radial search is centered.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchCenter {
    LatLng(LatLng),
    /// The location of an already stored member.
    Member { hash_key: Bytes, sort_key: Bytes },
}

/// Parameters of a radial search.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialQuery {
    pub center: SearchCenter,
    pub radius_m: f64,
    /// `None` = unlimited
    pub count: Option<usize>,
    pub sort: SortType,
}

/// Asynchronous spherical-geometry index.
#[async_trait]
pub trait GeoService: Send + Sync + 'static {
    /// Stores a value and indexes its coordinates. `ttl_seconds` 0 = no expiry.
    async fn set(
        &self,
        hash_key: Bytes,
        sort_key: Bytes,
        value: Bytes,
        ttl_seconds: u64,
    ) -> BackendResult<()>;

    /// Removes a value and its index entry.
    async fn del(&self, hash_key: Bytes, sort_key: Bytes) -> BackendResult<()>;

    /// Finds indexed values within `query.radius_m` of the center.
    async fn search_radial(&self, query: RadialQuery) -> BackendResult<Vec<GeoMatch>>;

    /// Great-circle distance between two members, in meters.
    async fn distance(
        &self,
        hash_key1: Bytes,
        sort_key1: Bytes,
        hash_key2: Bytes,
        sort_key2: Bytes,
    ) -> BackendResult<f64>;
}
