//! A region quadtree over the whole lat/lon plane (§4.5): node capacity 16,
//! max depth 20. Leaves carry just enough to re-check distance exactly
//! against the haversine formula after a cheap bounding-box cull.

use std::collections::HashMap;

use fanet_proto::geo::{distance_m, Bounds};
use fanet_proto::model::{Address, Position};

const NODE_CAPACITY: usize = 16;
const MAX_DEPTH: usize = 20;

#[derive(Clone, Copy)]
struct Leaf {
    address: Address,
    latitude: f64,
    longitude: f64,
    inserted_at: f64,
}

struct Node {
    bounds: Bounds,
    depth: usize,
    leaves: Vec<Leaf>,
    children: Option<Box<[Node; 4]>>,
}

impl Node {
    fn new(bounds: Bounds, depth: usize) -> Self {
        Node { bounds, depth, leaves: Vec::new(), children: None }
    }

    fn split(&mut self) {
        let mid_lat = (self.bounds.sw_lat + self.bounds.ne_lat) / 2.0;
        let mid_lon = (self.bounds.sw_lon + self.bounds.ne_lon) / 2.0;
        let next_depth = self.depth + 1;
        let sw = Node::new(
            Bounds { sw_lat: self.bounds.sw_lat, sw_lon: self.bounds.sw_lon, ne_lat: mid_lat, ne_lon: mid_lon },
            next_depth,
        );
        let se = Node::new(
            Bounds { sw_lat: self.bounds.sw_lat, sw_lon: mid_lon, ne_lat: mid_lat, ne_lon: self.bounds.ne_lon },
            next_depth,
        );
        let nw = Node::new(
            Bounds { sw_lat: mid_lat, sw_lon: self.bounds.sw_lon, ne_lat: self.bounds.ne_lat, ne_lon: mid_lon },
            next_depth,
        );
        let ne = Node::new(
            Bounds { sw_lat: mid_lat, sw_lon: mid_lon, ne_lat: self.bounds.ne_lat, ne_lon: self.bounds.ne_lon },
            next_depth,
        );
        let mut children = Box::new([sw, se, nw, ne]);
        for leaf in self.leaves.drain(..) {
            children[child_index(&children, leaf.latitude, leaf.longitude)].insert_leaf(leaf);
        }
        self.children = Some(children);
    }

    fn insert_leaf(&mut self, leaf: Leaf) {
        if let Some(children) = &mut self.children {
            let idx = child_index(children, leaf.latitude, leaf.longitude);
            children[idx].insert_leaf(leaf);
            return;
        }
        self.leaves.push(leaf);
        if self.leaves.len() > NODE_CAPACITY && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    fn remove_leaf(&mut self, address: Address, latitude: f64, longitude: f64) -> bool {
        if let Some(children) = &mut self.children {
            let idx = child_index(children, latitude, longitude);
            return children[idx].remove_leaf(address, latitude, longitude);
        }
        if let Some(pos) = self.leaves.iter().position(|l| l.address == address) {
            self.leaves.remove(pos);
            true
        } else {
            false
        }
    }

    fn query_bounds(&self, query: &Bounds, out: &mut Vec<(Address, f64, f64, f64)>) {
        if !self.bounds.intersects(query) {
            return;
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_bounds(query, out);
            }
            return;
        }
        for leaf in &self.leaves {
            if query.contains(leaf.latitude, leaf.longitude) {
                out.push((leaf.address, leaf.latitude, leaf.longitude, leaf.inserted_at));
            }
        }
    }
}

fn child_index(children: &[Node; 4], latitude: f64, longitude: f64) -> usize {
    let mid_lat = (children[0].bounds.sw_lat + children[2].bounds.ne_lat) / 2.0;
    let mid_lon = (children[0].bounds.sw_lon + children[1].bounds.ne_lon) / 2.0;
    match (latitude >= mid_lat, longitude >= mid_lon) {
        (false, false) => 0, // sw
        (false, true) => 1,  // se
        (true, false) => 2,  // nw
        (true, true) => 3,   // ne
    }
}

pub struct QuadTree {
    root: Node,
    positions: HashMap<Address, (f64, f64)>,
}

impl QuadTree {
    pub fn new() -> Self {
        QuadTree {
            root: Node::new(Bounds { sw_lat: -90.0, sw_lon: -180.0, ne_lat: 90.0, ne_lon: 180.0 }, 0),
            positions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, address: Address, position: Position, now: f64) {
        if let Some((lat, lon)) = self.positions.get(&address).copied() {
            self.root.remove_leaf(address, lat, lon);
        }
        self.root.insert_leaf(Leaf {
            address,
            latitude: position.latitude,
            longitude: position.longitude,
            inserted_at: now,
        });
        self.positions.insert(address, (position.latitude, position.longitude));
    }

    pub fn update(&mut self, address: Address, position: Position, now: f64) {
        self.insert(address, position, now);
    }

    pub fn remove(&mut self, address: Address) -> bool {
        if let Some((lat, lon)) = self.positions.remove(&address) {
            self.root.remove_leaf(address, lat, lon)
        } else {
            false
        }
    }

    pub fn query_bounds(&self, bounds: Bounds) -> Vec<Address> {
        let mut out = Vec::new();
        self.root.query_bounds(&bounds, &mut out);
        out.into_iter().map(|(a, _, _, _)| a).collect()
    }

    pub fn query_radius(&self, center: Position, radius_km: f64) -> Vec<Address> {
        let bounds = Bounds::around(center.latitude, center.longitude, radius_km);
        let mut out = Vec::new();
        self.root.query_bounds(&bounds, &mut out);
        out.into_iter()
            .filter(|(_, lat, lon, _)| {
                let other = Position { latitude: *lat, longitude: *lon, altitude: 0.0 };
                distance_m(&center, &other) <= radius_km * 1000.0
            })
            .map(|(a, _, _, _)| a)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }
}

impl Default for QuadTree {
    fn default() -> Self {
        QuadTree::new()
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
        let mut tree = QuadTree::new();
        tree.insert(Address::new(1), pos(46.5, 8.5), 0.0);
        let hits = tree.query_radius(pos(46.5, 8.5), 10.0);
        assert_eq!(hits, vec![Address::new(1)]);
    }

    #[test]
    fn query_radius_excludes_far_points() {
        let mut tree = QuadTree::new();
        tree.insert(Address::new(1), pos(46.5, 8.5), 0.0);
        let hits = tree.query_radius(pos(0.0, 0.0), 10.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn remove_drops_point_from_queries() {
        let mut tree = QuadTree::new();
        tree.insert(Address::new(1), pos(46.5, 8.5), 0.0);
        assert!(tree.remove(Address::new(1)));
        let hits = tree.query_radius(pos(46.5, 8.5), 10.0);
        assert!(hits.is_empty());
    }

    #[test]
    fn update_moves_point_to_new_location() {
        let mut tree = QuadTree::new();
        let addr = Address::new(1);
        tree.insert(addr, pos(46.5, 8.5), 0.0);
        tree.update(addr, pos(0.0, 0.0), 1.0);
        assert!(tree.query_radius(pos(46.5, 8.5), 10.0).is_empty());
        assert_eq!(tree.query_radius(pos(0.0, 0.0), 10.0), vec![addr]);
    }

    #[test]
    fn splits_past_node_capacity() {
        let mut tree = QuadTree::new();
        for i in 0..64 {
            // Spread points across a wide area so a single leaf node overflows.
            let lat = -80.0 + (i as f64) * 2.0;
            tree.insert(Address::new(i), pos(lat, 8.5), 0.0);
        }
        assert_eq!(tree.len(), 64);
        let hits = tree.query_bounds(Bounds { sw_lat: -90.0, sw_lon: -180.0, ne_lat: 90.0, ne_lon: 180.0 });
        assert_eq!(hits.len(), 64);
    }
}
