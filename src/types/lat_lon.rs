/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are represented as `f64`.
///
/// # Examples
///
/// ```
/// use openweather_archive::LatLon;
///
/// let amsterdam = LatLon(52.3676, 4.9041);
/// assert_eq!(amsterdam.0, 52.3676); // Latitude
/// assert_eq!(amsterdam.1, 4.9041); // Longitude
/// assert!(amsterdam.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    /// Returns `true` when latitude lies in `[-90, 90]` and longitude in `[-180, 180]`.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.0) && (-180.0..=180.0).contains(&self.1)
    }
}
