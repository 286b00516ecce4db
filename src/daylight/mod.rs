// Daylight window calculation
//
// The capture window for a day is [sunrise + offset, sunset + offset], both
// offsets signed minute deltas validated at configuration time. Instants are
// UTC; the calendar day is always reckoned in the city's own zone.

pub mod cities;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::constants::MAX_SUN_OFFSET_MINUTES;
use crate::error::{Result, SkylapseError};
use cities::{CityInfo, Place};

/// One day's capture interval. Boundary-exclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaylightWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DaylightWindow {
    /// `start < now < end`, strictly.
    pub fn is_daylight(&self, now: DateTime<Utc>) -> bool {
        self.start < now && now < self.end
    }

    /// The window has fully elapsed.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end
    }
}

/// Reject offsets outside the allowed range. Never clamps.
pub fn validate_offset(minutes: i64) -> Result<()> {
    if minutes.abs() > MAX_SUN_OFFSET_MINUTES {
        return Err(SkylapseError::OffsetOutOfRange {
            minutes,
            max: MAX_SUN_OFFSET_MINUTES,
        });
    }
    Ok(())
}

/// Computes daylight windows for one configured city.
#[derive(Debug, Clone)]
pub struct DaylightCalculator {
    city: CityInfo,
    sunrise_offset: Duration,
    sunset_offset: Duration,
}

impl DaylightCalculator {
    /// Fails fast on unknown names, region names and out-of-range offsets -
    /// all of these are configuration mistakes, not runtime conditions.
    pub fn new(
        city_name: &str,
        sunrise_offset_minutes: i64,
        sunset_offset_minutes: i64,
    ) -> Result<Self> {
        validate_offset(sunrise_offset_minutes)?;
        validate_offset(sunset_offset_minutes)?;

        let city = match cities::lookup(city_name) {
            Some(Place::City(city)) => city,
            Some(Place::Region(region)) => {
                return Err(SkylapseError::UnsupportedLocationKind(region.to_string()))
            }
            None => return Err(SkylapseError::LocationNotFound(city_name.to_string())),
        };

        Ok(Self {
            city,
            sunrise_offset: Duration::minutes(sunrise_offset_minutes),
            sunset_offset: Duration::minutes(sunset_offset_minutes),
        })
    }

    pub fn city(&self) -> &CityInfo {
        &self.city
    }

    /// Wall clock in the city's zone.
    pub fn local_now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.city.timezone)
    }

    /// Today's calendar date, reckoned in the city's zone.
    pub fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }

    /// The capture window for `date`.
    pub fn window_for(&self, date: NaiveDate) -> Result<DaylightWindow> {
        let (rise, set) = sunrise::sunrise_sunset(
            self.city.latitude,
            self.city.longitude,
            date.year(),
            date.month(),
            date.day(),
        );

        let start = DateTime::<Utc>::from_timestamp(rise, 0)
            .ok_or_else(|| SkylapseError::Other(format!("bad sunrise timestamp {rise}")))?;
        let end = DateTime::<Utc>::from_timestamp(set, 0)
            .ok_or_else(|| SkylapseError::Other(format!("bad sunset timestamp {set}")))?;

        Ok(DaylightWindow {
            start: start + self.sunrise_offset,
            end: end + self.sunset_offset,
        })
    }

    /// The capture window for today.
    pub fn window_today(&self) -> Result<DaylightWindow> {
        self.window_for(self.today())
    }
}
