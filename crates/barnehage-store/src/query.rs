//! Read-side filters over a registry snapshot.
//!
//! A kindergarten matches a region, age-group or availability filter when any
//! record in its history does, independently per filter. The radius filter
//! uses great-circle distance over `koordinat_lat_lng`; entries without
//! coordinates never match it.

use barnehage_core::{AgeGroup, Kindergarten};
use serde::Serialize;

/// Sphere radius used for distances, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Near {
    pub lat: f64,
    pub lng: f64,
    pub max_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub region: Option<String>,
    pub age_group: Option<AgeGroup>,
    pub available_only: bool,
    pub near: Option<Near>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            region: None,
            age_group: None,
            available_only: false,
            near: None,
            offset: 0,
            limit: 20,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListingPage {
    pub data: Vec<Kindergarten>,
    /// Matches before `offset` and `limit` were applied.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl ListingFilter {
    pub fn matches(&self, kindergarten: &Kindergarten) -> bool {
        let history = &kindergarten.spot_history;
        if let Some(region) = &self.region
            && !history.iter().any(|r| &r.region == region)
        {
            return false;
        }
        if let Some(age_group) = self.age_group
            && !history.iter().any(|r| r.age_group == age_group)
        {
            return false;
        }
        if self.available_only && !kindergarten.has_availability() {
            return false;
        }
        match (self.near, kindergarten.koordinat_lat_lng) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(near), Some([lat, lng])) => distance_km(near.lat, near.lng, lat, lng) <= near.max_km,
        }
    }

    /// Filter `kindergartens`, keeping their order, and cut one page.
    pub fn apply(&self, kindergartens: Vec<Kindergarten>) -> ListingPage {
        let matching: Vec<Kindergarten> =
            kindergartens.into_iter().filter(|k| self.matches(k)).collect();
        let total = matching.len();
        ListingPage {
            data: matching.into_iter().skip(self.offset).take(self.limit).collect(),
            total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// Haversine distance between two points given in degrees.
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
