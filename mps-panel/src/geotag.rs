//! Location sharing settings shown beneath the composer.
use mps_social::item::fields;
use mps_social::StatusFields;
use serde::{Deserialize, Serialize};

/// What the user picked in the geotag pane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationChoice {
    pub enabled: bool,
    pub guess_location: bool,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeotagPane {
    enabled: bool,
    guess_location: bool,
    latitude: f64,
    longitude: f64,
    reverse_location: Option<String>,
}

impl Default for GeotagPane {
    fn default() -> Self {
        Self {
            enabled: false,
            guess_location: true,
            latitude: 0.0,
            longitude: 0.0,
            reverse_location: None,
        }
    }
}

impl GeotagPane {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    pub fn reverse_location(&self) -> Option<&str> {
        self.reverse_location.as_deref()
    }

    /// Apply a user choice. A new position invalidates the reverse lookup.
    pub fn choose(&mut self, choice: LocationChoice) {
        if (choice.latitude, choice.longitude) != (self.latitude, self.longitude) {
            self.reverse_location = None;
        }
        self.enabled = choice.enabled;
        self.guess_location = choice.guess_location;
        self.latitude = choice.latitude;
        self.longitude = choice.longitude;
    }

    pub fn set_reverse_location(&mut self, name: Option<String>) {
        self.reverse_location = name.filter(|n| !n.is_empty());
    }

    /// Extra fields for a status update; empty unless sharing is enabled.
    pub fn status_fields(&self) -> StatusFields {
        let mut extra = StatusFields::new();
        if self.enabled {
            extra.insert(fields::LATITUDE.into(), format!("{:.6}", self.latitude));
            extra.insert(fields::LONGITUDE.into(), format!("{:.6}", self.longitude));
        }
        extra
    }

    pub fn location_label(&self) -> String {
        if !self.enabled {
            return "Your location isn't currently shared".to_string();
        }
        let (lat, lon) = (self.latitude, self.longitude);
        if lat == 0.0 && lon == 0.0 && self.guess_location {
            return "We were unable to guess your location".to_string();
        }
        let prefix = if self.guess_location {
            "We think your location is:"
        } else {
            "Your location is currently shared as:"
        };
        match &self.reverse_location {
            Some(place) => format!("{prefix} {place} ({lat:.6}, {lon:.6})"),
            None => format!("{prefix} {lat:.6} {lon:.6}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chosen(enabled: bool, guess: bool, lat: f64, lon: f64) -> GeotagPane {
        let mut pane = GeotagPane::default();
        pane.choose(LocationChoice {
            enabled,
            guess_location: guess,
            latitude: lat,
            longitude: lon,
        });
        pane
    }

    #[test]
    fn labels_follow_sharing_state() {
        assert_eq!(
            GeotagPane::default().location_label(),
            "Your location isn't currently shared"
        );
        assert_eq!(
            chosen(true, true, 0.0, 0.0).location_label(),
            "We were unable to guess your location"
        );
        assert_eq!(
            chosen(true, false, 51.5, -0.125).location_label(),
            "Your location is currently shared as: 51.500000 -0.125000"
        );

        let mut pane = chosen(true, true, 51.5, -0.125);
        pane.set_reverse_location(Some("London".into()));
        assert_eq!(
            pane.location_label(),
            "We think your location is: London (51.500000, -0.125000)"
        );
    }

    #[test]
    fn fields_only_when_enabled() {
        assert!(chosen(false, false, 1.0, 2.0).status_fields().is_empty());

        let extra = chosen(true, false, 1.0, 2.5).status_fields();
        assert_eq!(extra.get("latitude").map(String::as_str), Some("1.000000"));
        assert_eq!(extra.get("longitude").map(String::as_str), Some("2.500000"));
    }

    #[test]
    fn moving_clears_reverse_location() {
        let mut pane = chosen(true, false, 1.0, 1.0);
        pane.set_reverse_location(Some("Somewhere".into()));
        pane.choose(LocationChoice {
            enabled: true,
            guess_location: false,
            latitude: 2.0,
            longitude: 1.0,
        });
        assert_eq!(pane.reverse_location(), None);
    }
}
