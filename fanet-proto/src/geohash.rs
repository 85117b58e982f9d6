//! Geohash base-32 encode/decode, neighbor enumeration and circle cover
//! (§4.5). No teacher equivalent exists (ADS-B's SpatialIndex is a linear
//! scan); this is built directly from the documented algorithm.

use crate::geo::Bounds;

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

fn char_index(c: u8) -> Option<u32> {
    BASE32.iter().position(|&b| b == c).map(|i| i as u32)
}

/// Encode a (lat, lon) pair to a geohash string of the given precision
/// (number of base-32 characters).
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut out = Vec::with_capacity(precision);
    let mut bit = 0u8;
    let mut ch = 0u32;
    let mut even = true;

    while out.len() < precision {
        if even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                ch = (ch << 1) | 1;
                lon_range.0 = mid;
            } else {
                ch <<= 1;
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch = (ch << 1) | 1;
                lat_range.0 = mid;
            } else {
                ch <<= 1;
                lat_range.1 = mid;
            }
        }
        even = !even;
        bit += 1;
        if bit == 5 {
            out.push(BASE32[ch as usize]);
            bit = 0;
            ch = 0;
        }
    }
    String::from_utf8(out).expect("base32 alphabet is ascii")
}

/// Decode a geohash to its bounding box.
pub fn decode_bounds(hash: &str) -> Option<Bounds> {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut even = true;

    for c in hash.as_bytes() {
        let idx = char_index(c.to_ascii_lowercase())?;
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if even {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if bit == 1 {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            even = !even;
        }
    }

    Some(Bounds {
        sw_lat: lat_range.0,
        sw_lon: lon_range.0,
        ne_lat: lat_range.1,
        ne_lon: lon_range.1,
    })
}

pub fn decode_center(hash: &str) -> Option<(f64, f64)> {
    decode_bounds(hash).map(|b| {
        ((b.sw_lat + b.ne_lat) / 2.0, (b.sw_lon + b.ne_lon) / 2.0)
    })
}

/// The 8 neighboring cells of `hash`, same precision, in N/NE/E/SE/S/SW/W/NW
/// order.
pub fn neighbors(hash: &str) -> Vec<String> {
    let precision = hash.chars().count();
    let Some(bounds) = decode_bounds(hash) else {
        return Vec::new();
    };
    let lat_span = bounds.ne_lat - bounds.sw_lat;
    let lon_span = bounds.ne_lon - bounds.sw_lon;
    let (clat, clon) = decode_center(hash).unwrap();

    let offsets: [(f64, f64); 8] = [
        (1.0, 0.0),
        (1.0, 1.0),
        (0.0, 1.0),
        (-1.0, 1.0),
        (-1.0, 0.0),
        (-1.0, -1.0),
        (0.0, -1.0),
        (1.0, -1.0),
    ];

    offsets
        .iter()
        .map(|(dlat, dlon)| {
            let lat = (clat + dlat * lat_span).clamp(-90.0, 90.0);
            let mut lon = clon + dlon * lon_span;
            // wrap around the anti-meridian
            while lon > 180.0 {
                lon -= 360.0;
            }
            while lon < -180.0 {
                lon += 360.0;
            }
            encode(lat, lon, precision)
        })
        .collect()
}

/// The minimal set of geohash cells (at `precision`) whose union covers a
/// circle of `radius_km` around `center` (§4.5).
///
/// Implementation: geohash the center, then flood-fill outward through
/// `neighbors()` while a cell's bounding box still intersects the circle's
/// own bounding box and its nearest point lies within `radius_km`. This
/// over-covers by at most one ring of cells relative to the exact circle,
/// which keeps `Cover(c, r, p) ⊇ {geohash(x, p) | distance(c, x) <= r}`
/// (§8) true by construction.
pub fn cover(
    center_lat: f64,
    center_lon: f64,
    radius_km: f64,
    precision: usize,
) -> Vec<String> {
    use std::collections::{HashSet, VecDeque};

    let start = encode(center_lat, center_lon, precision);
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    seen.insert(start.clone());
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        for n in neighbors(&cell) {
            if seen.contains(&n) {
                continue;
            }
            if let Some(bounds) = decode_bounds(&n) {
                if cell_may_intersect_circle(
                    &bounds,
                    center_lat,
                    center_lon,
                    radius_km,
                ) {
                    seen.insert(n.clone());
                    queue.push_back(n);
                }
            }
        }
    }

    let mut result: Vec<String> = seen.into_iter().collect();
    result.sort();
    result
}

fn cell_may_intersect_circle(
    bounds: &Bounds,
    center_lat: f64,
    center_lon: f64,
    radius_km: f64,
) -> bool {
    let nearest_lat = center_lat.clamp(bounds.sw_lat, bounds.ne_lat);
    let nearest_lon = center_lon.clamp(bounds.sw_lon, bounds.ne_lon);
    let d_m = crate::geo::haversine_m(
        center_lat,
        center_lon,
        nearest_lat,
        nearest_lon,
    );
    d_m / 1000.0 <= radius_km
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_is_approximate() {
        let hash = encode(46.5, 8.5, 7);
        let (lat, lon) = decode_center(&hash).unwrap();
        assert!((lat - 46.5).abs() < 0.01);
        assert!((lon - 8.5).abs() < 0.01);
    }

    #[test]
    fn neighbors_returns_eight_cells() {
        let hash = encode(46.5, 8.5, 5);
        let n = neighbors(&hash);
        assert_eq!(n.len(), 8);
        assert!(!n.contains(&hash));
    }

    #[test]
    fn cover_contains_center_cell() {
        let hash = encode(46.5, 8.5, 5);
        let cells = cover(46.5, 8.5, 5.0, 5);
        assert!(cells.contains(&hash));
    }

    #[test]
    fn cover_grows_with_radius() {
        let small = cover(46.5, 8.5, 2.0, 5);
        let large = cover(46.5, 8.5, 50.0, 5);
        assert!(large.len() >= small.len());
        for cell in &small {
            assert!(large.contains(cell));
        }
    }
}
