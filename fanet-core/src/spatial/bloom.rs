//! Counting bloom filter (§4.5), sized for 100k items at a 1% false
//! positive rate, used as a cheap existence pre-check before a full
//! quadtree descent. Counters (not plain bits) so `remove` stays correct
//! when two addresses happen to collide on every slot.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use fanet_proto::model::Address;

const EXPECTED_ITEMS: f64 = 100_000.0;
const FALSE_POSITIVE_RATE: f64 = 0.01;

fn optimal_bits(n: f64, p: f64) -> usize {
    (-(n * p.ln()) / (std::f64::consts::LN_2 * std::f64::consts::LN_2)).ceil() as usize
}

fn optimal_hashes(m: usize, n: f64) -> usize {
    (((m as f64) / n) * std::f64::consts::LN_2).round().max(1.0) as usize
}

pub struct CountingBloomFilter {
    counters: Vec<u8>,
    hash_count: usize,
}

impl CountingBloomFilter {
    pub fn new() -> Self {
        let bits = optimal_bits(EXPECTED_ITEMS, FALSE_POSITIVE_RATE);
        let hashes = optimal_hashes(bits, EXPECTED_ITEMS);
        CountingBloomFilter { counters: vec![0u8; bits], hash_count: hashes }
    }

    fn slot(&self, address: Address, i: usize) -> usize {
        let mut h1 = DefaultHasher::new();
        address.0.hash(&mut h1);
        let a = h1.finish();

        let mut h2 = DefaultHasher::new();
        address.0.hash(&mut h2);
        0xabcdu64.hash(&mut h2);
        let b = h2.finish();

        let combined = a.wrapping_add((i as u64).wrapping_mul(b));
        (combined % self.counters.len() as u64) as usize
    }

    pub fn insert(&mut self, address: Address) {
        for i in 0..self.hash_count {
            let slot = self.slot(address, i);
            self.counters[slot] = self.counters[slot].saturating_add(1);
        }
    }

    pub fn remove(&mut self, address: Address) {
        for i in 0..self.hash_count {
            let slot = self.slot(address, i);
            self.counters[slot] = self.counters[slot].saturating_sub(1);
        }
    }

    pub fn might_contain(&self, address: Address) -> bool {
        (0..self.hash_count).all(|i| self.counters[self.slot(address, i)] > 0)
    }
}

impl Default for CountingBloomFilter {
    fn default() -> Self {
        CountingBloomFilter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_address_is_reported_present() {
        let mut filter = CountingBloomFilter::new();
        filter.insert(Address::new(0x1234));
        assert!(filter.might_contain(Address::new(0x1234)));
    }

    #[test]
    fn never_inserted_address_is_usually_absent() {
        let filter = CountingBloomFilter::new();
        assert!(!filter.might_contain(Address::new(0xABCDEF)));
    }

    #[test]
    fn removed_address_is_no_longer_reported() {
        let mut filter = CountingBloomFilter::new();
        filter.insert(Address::new(1));
        filter.remove(Address::new(1));
        assert!(!filter.might_contain(Address::new(1)));
    }

    #[test]
    fn shared_slots_with_another_entry_still_clear_on_remove() {
        let mut filter = CountingBloomFilter::new();
        filter.insert(Address::new(1));
        filter.insert(Address::new(2));
        filter.remove(Address::new(1));
        assert!(filter.might_contain(Address::new(2)));
    }
}
