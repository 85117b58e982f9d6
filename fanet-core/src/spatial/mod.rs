//! SpatialIndex (C5): a quadtree over admitted addresses, fronted by a
//! counting bloom filter and a short-lived query cache. §5 splits the
//! quadtree's lock from the cache's: mutations take an exclusive lock on
//! the tree, reads take a shared one, and the LRU cache has its own mutex
//! — the same shard-local discipline HotStore uses for its own map.

pub mod bloom;
pub mod cache;
pub mod quadtree;

use std::sync::{Mutex, RwLock};

use fanet_proto::geo::Bounds;
use fanet_proto::model::{Address, Position};

use bloom::CountingBloomFilter;
use cache::QueryCache;
use quadtree::QuadTree;

struct Tree {
    quadtree: QuadTree,
    bloom: CountingBloomFilter,
}

pub struct SpatialIndex {
    tree: RwLock<Tree>,
    cache: Mutex<QueryCache>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        SpatialIndex {
            tree: RwLock::new(Tree { quadtree: QuadTree::new(), bloom: CountingBloomFilter::new() }),
            cache: Mutex::new(QueryCache::new()),
        }
    }

    pub fn insert(&self, address: Address, position: Position, now: f64) {
        let mut tree = self.tree.write().unwrap();
        tree.quadtree.insert(address, position, now);
        tree.bloom.insert(address);
        drop(tree);
        self.cache.lock().unwrap().invalidate_all();
    }

    pub fn update(&self, address: Address, position: Position, now: f64) {
        self.insert(address, position, now);
    }

    pub fn remove(&self, address: Address) {
        let mut tree = self.tree.write().unwrap();
        if tree.quadtree.remove(address) {
            tree.bloom.remove(address);
        }
        drop(tree);
        self.cache.lock().unwrap().invalidate_all();
    }

    pub fn contains(&self, address: Address) -> bool {
        self.tree.read().unwrap().bloom.might_contain(address)
    }

    pub fn query_radius(&self, center: Position, radius_km: f64, now: f64) -> Vec<Address> {
        if let Some(hits) = self.cache.lock().unwrap().get_radius(center, radius_km, now) {
            return hits;
        }
        let hits = self.tree.read().unwrap().quadtree.query_radius(center, radius_km);
        self.cache.lock().unwrap().put_radius(center, radius_km, hits.clone(), now);
        hits
    }

    pub fn query_bounds(&self, bounds: Bounds, now: f64) -> Vec<Address> {
        if let Some(hits) = self.cache.lock().unwrap().get_bounds(bounds, now) {
            return hits;
        }
        let hits = self.tree.read().unwrap().quadtree.query_bounds(bounds);
        self.cache.lock().unwrap().put_bounds(bounds, hits.clone(), now);
        hits
    }

    pub fn len(&self) -> usize {
        self.tree.read().unwrap().quadtree.len()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        SpatialIndex::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64) -> Position {
        Position { latitude: lat, longitude: lon, altitude: 0.0 }
    }

    #[test]
    fn insert_then_query_radius_finds_point() {
        let index = SpatialIndex::new();
        index.insert(Address::new(1), pos(46.5, 8.5), 0.0);
        assert!(index.contains(Address::new(1)));
        let hits = index.query_radius(pos(46.5, 8.5), 10.0, 0.0);
        assert_eq!(hits, vec![Address::new(1)]);
    }

    #[test]
    fn cached_query_result_is_reused_within_ttl() {
        let index = SpatialIndex::new();
        index.insert(Address::new(1), pos(46.5, 8.5), 0.0);
        let first = index.query_radius(pos(46.5, 8.5), 10.0, 1.0);
        let second = index.query_radius(pos(46.5, 8.5), 10.0, 2.0);
        assert_eq!(first, second);
    }

    #[test]
    fn write_invalidates_cached_results() {
        let index = SpatialIndex::new();
        index.insert(Address::new(1), pos(46.5, 8.5), 0.0);
        let _ = index.query_radius(pos(46.5, 8.5), 10.0, 0.0);
        index.insert(Address::new(2), pos(46.5, 8.5), 1.0);
        let hits = index.query_radius(pos(46.5, 8.5), 10.0, 1.0);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn remove_drops_from_future_queries() {
        let index = SpatialIndex::new();
        index.insert(Address::new(1), pos(46.5, 8.5), 0.0);
        index.remove(Address::new(1));
        let hits = index.query_radius(pos(46.5, 8.5), 10.0, 1.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn e4_radius_query_matches_a_brute_force_haversine_scan() {
        use fanet_proto::geo::distance_m;

        let index = SpatialIndex::new();
        let mut positions = Vec::with_capacity(300);
        // 20x15 grid over a 2x2 degree box around (46.5, 8.5), 300 points.
        for i in 0..20 {
            for j in 0..15 {
                let lat = 45.5 + (i as f64) * (2.0 / 19.0);
                let lon = 7.5 + (j as f64) * (2.0 / 14.0);
                let addr = Address::new((i * 15 + j) as u32 + 1);
                let p = pos(lat, lon);
                index.insert(addr, p, 0.0);
                positions.push((addr, p));
            }
        }

        let center = pos(46.5, 8.5);
        let radius_km = 50.0;
        let mut expected: Vec<Address> = positions
            .iter()
            .filter(|(_, p)| distance_m(&center, p) <= radius_km * 1000.0)
            .map(|(a, _)| *a)
            .collect();
        expected.sort();

        let mut actual = index.query_radius(center, radius_km, 1.0);
        actual.sort();

        assert_eq!(actual, expected);
    }
}
