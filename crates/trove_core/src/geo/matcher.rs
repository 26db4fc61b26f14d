//! Haversine nearest-neighbor matcher over Place entities.
//!
//! # Responsibility
//! - Decide whether a candidate coordinate belongs to an existing Place
//!   or warrants a new one.
//!
//! # Invariants
//! - A candidate matches only when its distance to the nearest Place is
//!   strictly below the tolerance radius.
//! - With zero stored Places a new Place is always created.
//! - Equidistant minima resolve to the first row encountered; callers
//!   must not depend on which one wins.
//! - Callers own transactional wrapping; the read-then-insert sequence
//!   is only race-free inside the caller's transaction.

use crate::model::entity::{Entity, EntityDraft, EntityKind, EntityRef};
use crate::repo::entity_repo::{insert_entity, load_required};
use crate::repo::{StoreError, StoreResult};
use log::info;
use rusqlite::Connection;
use uuid::Uuid;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance below which a candidate is "the same place" (50 meters).
pub const PLACE_MATCH_TOLERANCE_KM: f64 = 0.05;

/// Great-circle distance between two WGS84 coordinates, in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Outcome of one match-or-create decision.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoMatch {
    pub place: Entity,
    /// `true` when no Place was within tolerance and a new row was made.
    pub created: bool,
}

/// Nearest-neighbor matcher with a configurable tolerance radius.
#[derive(Debug, Clone, Copy)]
pub struct GeoMatcher {
    tolerance_km: f64,
}

impl Default for GeoMatcher {
    fn default() -> Self {
        Self {
            tolerance_km: PLACE_MATCH_TOLERANCE_KM,
        }
    }
}

impl GeoMatcher {
    pub fn new(tolerance_km: f64) -> Self {
        Self { tolerance_km }
    }

    /// Attaches the candidate coordinate to the nearest Place within
    /// tolerance, or creates a new Place titled `fallback_title` at the
    /// exact candidate coordinates.
    ///
    /// # Contract
    /// - Must run on the caller's transaction connection when invoked
    ///   from a multi-step sequence, so the scan and the insert cannot
    ///   interleave with concurrent ingests.
    pub fn match_or_create(
        &self,
        conn: &Connection,
        lat: f64,
        lng: f64,
        fallback_title: &str,
    ) -> StoreResult<GeoMatch> {
        if let Some((id, distance_km)) = nearest_place(conn, lat, lng)? {
            if distance_km < self.tolerance_km {
                let entity = EntityRef::new(EntityKind::Place, id);
                let place = load_required(conn, entity)?;
                info!(
                    "event=geo_match module=geo status=ok outcome=attached place_id={} distance_m={:.1}",
                    id,
                    distance_km * 1000.0
                );
                return Ok(GeoMatch {
                    place,
                    created: false,
                });
            }
        }

        let draft = EntityDraft::Place {
            title: fallback_title.to_string(),
            lat,
            lng,
        };
        draft.validate().map_err(StoreError::Validation)?;
        let id = Uuid::new_v4();
        insert_entity(conn, id, &draft)?;
        let place = load_required(conn, EntityRef::new(EntityKind::Place, id))?;
        info!(
            "event=geo_match module=geo status=ok outcome=created place_id={}",
            id
        );
        Ok(GeoMatch {
            place,
            created: true,
        })
    }
}

/// Scans all places and returns the id and distance of the closest one.
fn nearest_place(conn: &Connection, lat: f64, lng: f64) -> StoreResult<Option<(Uuid, f64)>> {
    let mut stmt = conn.prepare("SELECT id, lat, lng FROM places;")?;
    let mut rows = stmt.query([])?;

    let mut closest: Option<(Uuid, f64)> = None;
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        let id = Uuid::parse_str(&id_text).map_err(|_| {
            StoreError::InvalidData(format!("invalid uuid value `{id_text}` in places.id"))
        })?;
        let distance = haversine_km(lat, lng, row.get("lat")?, row.get("lng")?);
        // Strict less-than keeps the first row on equidistant minima.
        if closest.map_or(true, |(_, best)| distance < best) {
            closest = Some((id, distance));
        }
    }
    Ok(closest)
}
