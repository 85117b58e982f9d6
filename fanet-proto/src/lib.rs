//! FANET wire codec, data model and geospatial primitives shared by the
//! rest of the tracking core, analogous to how `rs1090` decodes ADS-B and
//! hands typed records to `jet1090`.

pub mod codec;
pub mod geo;
pub mod geohash;
pub mod model;

pub mod prelude {
    pub use crate::codec::{decode, CodecError, DecodedFrame, Header, PacketType, Wrapper};
    pub use crate::geo::{distance_m, haversine_m, Bounds};
    pub use crate::model::{
        Address, AircraftClass, AirObject, GroundClass, GroundObject, Kind, Record, RecordKey,
        SignalQuality, Thermal, WeatherStation,
    };
}
