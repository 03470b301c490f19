//! Serde-deserializable types matching the city list endpoint.
//!
//! The endpoint returns a single JSON array:
//! `[{"_id": 707860, "name": "Hurzuf", "country": "UA", "coord": {"lat": 44.54, "lon": 34.28}}]`

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CoordRecord {
  pub lat: f64,
  pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityRecord {
  #[serde(rename = "_id")]
  pub id: i64,
  pub name: String,
  pub country: String,
  pub coord: CoordRecord,
}
