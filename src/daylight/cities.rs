// Embedded gazetteer for daylight lookups
//
// A deliberately small table of single-point places plus the continent-level
// group names callers sometimes try. Groups resolve on purpose so the caller
// can tell "unknown name" apart from "a region, which has no sunrise".

use chrono_tz::Tz;

/// A single place the sun rises and sets over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CityInfo {
    pub name: &'static str,
    pub country: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Tz,
}

/// Result of a gazetteer lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Place {
    City(CityInfo),
    /// A group/region identifier. Sunrise/sunset is undefined for these.
    Region(&'static str),
}

const CITIES: &[CityInfo] = &[
    CityInfo { name: "Sofia", country: "Bulgaria", latitude: 42.6977, longitude: 23.3219, timezone: Tz::Europe__Sofia },
    CityInfo { name: "Plovdiv", country: "Bulgaria", latitude: 42.1354, longitude: 24.7453, timezone: Tz::Europe__Sofia },
    CityInfo { name: "Varna", country: "Bulgaria", latitude: 43.2141, longitude: 27.9147, timezone: Tz::Europe__Sofia },
    CityInfo { name: "Athens", country: "Greece", latitude: 37.9838, longitude: 23.7275, timezone: Tz::Europe__Athens },
    CityInfo { name: "Bucharest", country: "Romania", latitude: 44.4268, longitude: 26.1025, timezone: Tz::Europe__Bucharest },
    CityInfo { name: "Belgrade", country: "Serbia", latitude: 44.7866, longitude: 20.4489, timezone: Tz::Europe__Belgrade },
    CityInfo { name: "Vienna", country: "Austria", latitude: 48.2082, longitude: 16.3738, timezone: Tz::Europe__Vienna },
    CityInfo { name: "Prague", country: "Czechia", latitude: 50.0755, longitude: 14.4378, timezone: Tz::Europe__Prague },
    CityInfo { name: "Berlin", country: "Germany", latitude: 52.5200, longitude: 13.4050, timezone: Tz::Europe__Berlin },
    CityInfo { name: "Munich", country: "Germany", latitude: 48.1351, longitude: 11.5820, timezone: Tz::Europe__Berlin },
    CityInfo { name: "Zurich", country: "Switzerland", latitude: 47.3769, longitude: 8.5417, timezone: Tz::Europe__Zurich },
    CityInfo { name: "Paris", country: "France", latitude: 48.8566, longitude: 2.3522, timezone: Tz::Europe__Paris },
    CityInfo { name: "London", country: "United Kingdom", latitude: 51.5074, longitude: -0.1278, timezone: Tz::Europe__London },
    CityInfo { name: "Madrid", country: "Spain", latitude: 40.4168, longitude: -3.7038, timezone: Tz::Europe__Madrid },
    CityInfo { name: "Rome", country: "Italy", latitude: 41.9028, longitude: 12.4964, timezone: Tz::Europe__Rome },
    CityInfo { name: "Amsterdam", country: "Netherlands", latitude: 52.3676, longitude: 4.9041, timezone: Tz::Europe__Amsterdam },
    CityInfo { name: "Stockholm", country: "Sweden", latitude: 59.3293, longitude: 18.0686, timezone: Tz::Europe__Stockholm },
    CityInfo { name: "Oslo", country: "Norway", latitude: 59.9139, longitude: 10.7522, timezone: Tz::Europe__Oslo },
    CityInfo { name: "Helsinki", country: "Finland", latitude: 60.1699, longitude: 24.9384, timezone: Tz::Europe__Helsinki },
    CityInfo { name: "New York", country: "USA", latitude: 40.7128, longitude: -74.0060, timezone: Tz::America__New_York },
    CityInfo { name: "Chicago", country: "USA", latitude: 41.8781, longitude: -87.6298, timezone: Tz::America__Chicago },
    CityInfo { name: "Denver", country: "USA", latitude: 39.7392, longitude: -104.9903, timezone: Tz::America__Denver },
    CityInfo { name: "Los Angeles", country: "USA", latitude: 34.0522, longitude: -118.2437, timezone: Tz::America__Los_Angeles },
    CityInfo { name: "Toronto", country: "Canada", latitude: 43.6532, longitude: -79.3832, timezone: Tz::America__Toronto },
    CityInfo { name: "Vancouver", country: "Canada", latitude: 49.2827, longitude: -123.1207, timezone: Tz::America__Vancouver },
    CityInfo { name: "Tokyo", country: "Japan", latitude: 35.6762, longitude: 139.6503, timezone: Tz::Asia__Tokyo },
    CityInfo { name: "Singapore", country: "Singapore", latitude: 1.3521, longitude: 103.8198, timezone: Tz::Asia__Singapore },
    CityInfo { name: "Delhi", country: "India", latitude: 28.7041, longitude: 77.1025, timezone: Tz::Asia__Kolkata },
    CityInfo { name: "Dubai", country: "UAE", latitude: 25.2048, longitude: 55.2708, timezone: Tz::Asia__Dubai },
    CityInfo { name: "Sydney", country: "Australia", latitude: -33.8688, longitude: 151.2093, timezone: Tz::Australia__Sydney },
    CityInfo { name: "Auckland", country: "New Zealand", latitude: -36.8509, longitude: 174.7645, timezone: Tz::Pacific__Auckland },
    CityInfo { name: "Cape Town", country: "South Africa", latitude: -33.9249, longitude: 18.4241, timezone: Tz::Africa__Johannesburg },
    CityInfo { name: "Nairobi", country: "Kenya", latitude: -1.2921, longitude: 36.8219, timezone: Tz::Africa__Nairobi },
];

const REGIONS: &[&str] = &["Europe", "Asia", "Africa", "America", "Oceania"];

/// Look a name up, case-insensitively.
pub fn lookup(name: &str) -> Option<Place> {
    let needle = name.trim();
    if let Some(city) = CITIES
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(needle))
    {
        return Some(Place::City(*city));
    }
    REGIONS
        .iter()
        .find(|r| r.eq_ignore_ascii_case(needle))
        .map(|r| Place::Region(*r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(matches!(lookup("sofia"), Some(Place::City(c)) if c.name == "Sofia"));
        assert!(matches!(lookup("  LONDON "), Some(Place::City(c)) if c.name == "London"));
    }

    #[test]
    fn test_lookup_region() {
        assert_eq!(lookup("europe"), Some(Place::Region("Europe")));
    }

    #[test]
    fn test_lookup_unknown() {
        assert_eq!(lookup("Atlantis"), None);
    }
}
