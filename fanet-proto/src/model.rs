//! Shared data model: record kinds, aircraft/ground classes and the
//! invariant checks from the specification's data model section.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 24-bit FANET source address, serialized as a 6 hex digit uppercase key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub u32);

impl Address {
    pub fn new(raw: u32) -> Self {
        Address(raw & 0x00FF_FFFF)
    }

    pub fn as_key(&self) -> String {
        format!("{:06X}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl std::str::FromStr for Address {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u32::from_str_radix(s, 16).map(Address::new)
    }
}

/// The kind of a tracked object, used as the first component of a record key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    AirObject,
    GroundObject,
    Thermal,
    WeatherStation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftClass {
    Other,
    Paraglider,
    Hangglider,
    Balloon,
    Glider,
    Powered,
    Helicopter,
    Uav,
}

impl AircraftClass {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => AircraftClass::Other,
            1 => AircraftClass::Paraglider,
            2 => AircraftClass::Hangglider,
            3 => AircraftClass::Balloon,
            4 => AircraftClass::Glider,
            5 => AircraftClass::Powered,
            6 => AircraftClass::Helicopter,
            _ => AircraftClass::Uav,
        }
    }

    /// Plausible ground-speed ceiling in km/h, used by the validator (§4.2).
    pub fn speed_ceiling_kmh(&self) -> f64 {
        match self {
            AircraftClass::Other => 400.0,
            AircraftClass::Paraglider => 80.0,
            AircraftClass::Hangglider => 120.0,
            AircraftClass::Glider => 300.0,
            AircraftClass::Powered => 400.0,
            AircraftClass::Helicopter => 350.0,
            AircraftClass::Balloon => 50.0,
            AircraftClass::Uav => 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundClass {
    Other,
    Walking,
    Vehicle,
    Bike,
    Boat,
    NeedRide,
    LandedWell,
    NeedTechnical,
    NeedMedical,
    Distress,
    DistressAuto,
}

impl GroundClass {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0 => GroundClass::Other,
            1 => GroundClass::Walking,
            2 => GroundClass::Vehicle,
            3 => GroundClass::Bike,
            4 => GroundClass::Boat,
            5 => GroundClass::NeedRide,
            6 => GroundClass::LandedWell,
            7 => GroundClass::NeedTechnical,
            8 => GroundClass::NeedMedical,
            9 => GroundClass::Distress,
            _ => GroundClass::DistressAuto,
        }
    }

    /// Distress classes are sticky and broadcast at elevated priority (§3, §4.7).
    pub fn is_distress(&self) -> bool {
        matches!(self, GroundClass::Distress | GroundClass::DistressAuto)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Position {
    /// §3 invariants: |lat|<=90, |lon|<=180, -1000<=alt<=15000.
    pub fn in_geographic_range(&self) -> bool {
        self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
            && self.altitude >= -1000.0
            && self.altitude <= 15000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalQuality {
    pub rssi_dbm: i16,
    pub snr_db: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirObject {
    pub address: Address,
    pub position: Position,
    pub last_update: f64,
    pub signal: SignalQuality,
    pub sequence: u64,
    pub class: AircraftClass,
    pub ground_speed_kmh: f64,
    pub vertical_speed_ms: f64,
    pub heading_deg: f64,
    pub online_tracking: bool,
    pub name: Option<String>,
}

impl AirObject {
    /// §3 invariants for an AirObject.
    pub fn invariants_hold(&self) -> bool {
        self.position.in_geographic_range()
            && self.ground_speed_kmh.abs() <= 400.0
            && self.vertical_speed_ms.abs() <= 20.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundObject {
    pub address: Address,
    pub position: Position,
    pub last_update: f64,
    pub signal: SignalQuality,
    pub sequence: u64,
    pub class: GroundClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thermal {
    pub address: Address,
    pub discovered_at: f64,
    pub position: Position,
    pub last_update: f64,
    pub signal: SignalQuality,
    pub sequence: u64,
    pub quality: u8,
    pub average_climb_ms: f64,
    pub wind_speed_ms: f64,
    pub wind_direction_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStation {
    pub address: Address,
    pub position: Position,
    pub last_update: f64,
    pub signal: SignalQuality,
    pub sequence: u64,
    pub temperature_c: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_gusts_ms: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub battery_pct: Option<f64>,
}

/// A record key, as used throughout HotStore/SpatialIndex/Broadcaster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    AirObject(Address),
    GroundObject(Address),
    /// Thermals are additionally keyed by discovery timestamp: a device can
    /// report multiple concurrent thermals (§3).
    Thermal(Address, u64),
    WeatherStation(Address),
}

impl RecordKey {
    pub fn kind(&self) -> Kind {
        match self {
            RecordKey::AirObject(_) => Kind::AirObject,
            RecordKey::GroundObject(_) => Kind::GroundObject,
            RecordKey::Thermal(..) => Kind::Thermal,
            RecordKey::WeatherStation(_) => Kind::WeatherStation,
        }
    }

    pub fn address(&self) -> Address {
        match self {
            RecordKey::AirObject(a)
            | RecordKey::GroundObject(a)
            | RecordKey::WeatherStation(a)
            | RecordKey::Thermal(a, _) => *a,
        }
    }
}

/// A tagged variant over the concrete record types, used by the HotStore
/// and the Broadcaster — a sum type, not a runtime type test (§9).
///
/// Deliberately the default externally-tagged `serde` representation
/// rather than `#[serde(tag = "kind")]`: the HTTP layer's binary content
/// negotiation round-trips this type through `bincode`, which cannot
/// represent internally-tagged enums since it isn't a self-describing
/// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    AirObject(AirObject),
    GroundObject(GroundObject),
    Thermal(Thermal),
    WeatherStation(WeatherStation),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::AirObject(r) => RecordKey::AirObject(r.address),
            Record::GroundObject(r) => RecordKey::GroundObject(r.address),
            Record::Thermal(r) => {
                RecordKey::Thermal(r.address, r.discovered_at as u64)
            }
            Record::WeatherStation(r) => RecordKey::WeatherStation(r.address),
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Record::AirObject(r) => r.position,
            Record::GroundObject(r) => r.position,
            Record::Thermal(r) => r.position,
            Record::WeatherStation(r) => r.position,
        }
    }

    pub fn last_update(&self) -> f64 {
        match self {
            Record::AirObject(r) => r.last_update,
            Record::GroundObject(r) => r.last_update,
            Record::Thermal(r) => r.last_update,
            Record::WeatherStation(r) => r.last_update,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            Record::AirObject(r) => r.sequence,
            Record::GroundObject(r) => r.sequence,
            Record::Thermal(r) => r.sequence,
            Record::WeatherStation(r) => r.sequence,
        }
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        match self {
            Record::AirObject(r) => r.sequence = sequence,
            Record::GroundObject(r) => r.sequence = sequence,
            Record::Thermal(r) => r.sequence = sequence,
            Record::WeatherStation(r) => r.sequence = sequence,
        }
    }

    /// Distress ground classes are delivered at elevated priority and
    /// bypass broadcast batching (§4.7).
    pub fn is_critical(&self) -> bool {
        matches!(self, Record::GroundObject(r) if r.class.is_distress())
    }
}

/// TTL policy (§3): absolute expiry per record kind.
pub fn ttl_seconds(kind: Kind) -> u64 {
    match kind {
        Kind::AirObject => 12 * 3600,
        Kind::GroundObject => 12 * 3600,
        Kind::Thermal => 6 * 3600,
        Kind::WeatherStation => 24 * 3600,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_formats_as_six_hex_digits() {
        let a = Address::new(0x674523);
        assert_eq!(a.as_key(), "674523");
        let a = Address::new(0xFF_FFFFFF);
        assert_eq!(a.as_key(), "FFFFFF");
    }

    #[test]
    fn air_object_invariants() {
        let mut obj = AirObject {
            address: Address::new(1),
            position: Position { latitude: 46.5, longitude: 8.5, altitude: 1000.0 },
            last_update: 0.0,
            signal: SignalQuality { rssi_dbm: -80, snr_db: 10 },
            sequence: 0,
            class: AircraftClass::Paraglider,
            ground_speed_kmh: 40.0,
            vertical_speed_ms: 2.0,
            heading_deg: 180.0,
            online_tracking: true,
            name: None,
        };
        assert!(obj.invariants_hold());
        obj.ground_speed_kmh = 500.0;
        assert!(!obj.invariants_hold());
    }

    #[test]
    fn ground_class_distress_is_sticky_priority() {
        assert!(GroundClass::Distress.is_distress());
        assert!(GroundClass::DistressAuto.is_distress());
        assert!(!GroundClass::NeedRide.is_distress());
    }
}
