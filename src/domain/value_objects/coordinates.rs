use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 地球の平均半径（メートル）。
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// GPS座標。緯度経度は常に有効範囲内であることが保証される。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("Latitude out of range: {latitude}"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("Longitude out of range: {longitude}"));
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy: None,
            captured_at: None,
        })
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    /// 小数点以下 `precision` 桁に丸めた座標を返す。
    pub fn rounded(&self, precision: u32) -> Self {
        let factor = 10f64.powi(precision as i32);
        Self {
            latitude: (self.latitude * factor).round() / factor,
            longitude: (self.longitude * factor).round() / factor,
            accuracy: self.accuracy,
            captured_at: self.captured_at,
        }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    pub fn format(&self, precision: usize) -> String {
        format!(
            "{:.prec$}, {:.prec$}",
            self.latitude,
            self.longitude,
            prec = precision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(-91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, 181.0).is_err());
        assert!(Coordinates::new(0.0, -181.0).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_new_accepts_boundary_values() {
        assert!(Coordinates::new(90.0, -180.0).is_ok());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_for_same_point() {
        let tokyo = Coordinates::new(35.6762, 139.6503).unwrap();
        let osaka = Coordinates::new(34.6937, 135.5023).unwrap();

        let forward = tokyo.distance_to(&osaka);
        let back = osaka.distance_to(&tokyo);
        assert!((forward - back).abs() < 1e-6);
        assert!(tokyo.distance_to(&tokyo).abs() < 1e-6);

        // 東京-大阪はおよそ400km
        assert!(forward > 390_000.0 && forward < 410_000.0);
    }

    #[test]
    fn test_rounded_truncates_precision() {
        let coords = Coordinates::new(35.123456789, 139.987654321).unwrap();
        let rounded = coords.rounded(6);
        assert_eq!(rounded.latitude, 35.123457);
        assert_eq!(rounded.longitude, 139.987654);
    }

    #[test]
    fn test_format_renders_lat_lon_pair() {
        let coords = Coordinates::new(35.6762, 139.6503).unwrap();
        assert_eq!(coords.format(2), "35.68, 139.65");
    }
}
