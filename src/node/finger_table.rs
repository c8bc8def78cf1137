use crate::utils::crypto::{hash, is_between};
use crate::utils::types::{Address, HashPos};

/// A resolved routing shortcut: the node found responsible for ring
/// position `start`. The peer's own position is fixed by its address, so it
/// is computed once here and table scans stay hash-free.
#[derive(Debug, Clone)]
pub struct FingerEntry {
    pub(crate) start: HashPos,
    pub(crate) address: Address,
    pub(crate) node_pos: HashPos,
}

impl FingerEntry {
    pub fn resolve(start: HashPos, address: Address) -> Self {
        let node_pos = hash(address.as_bytes());
        FingerEntry {
            start,
            address,
            node_pos,
        }
    }
}

/// Routing shortcuts across the ring. Rebuilt from scratch by every
/// fix_fingers round, so anywhere between zero and RING_BITS entries may be
/// present at a given moment; lookups fall back to the direct successor
/// while the table is sparse.
#[derive(Debug, Clone, Default)]
pub struct FingerTable {
    pub fingers: Vec<FingerEntry>,
}

impl FingerTable {
    pub fn clear(&mut self) {
        self.fingers.clear();
    }

    pub fn push(&mut self, entry: FingerEntry) {
        self.fingers.push(entry);
    }

    /// The finger closest before `target`, scanning highest index first so
    /// each hop covers as much of the ring as possible. Fingers pointing at
    /// this node itself never qualify.
    pub fn closest_preceding(&self, self_id: HashPos, target: HashPos) -> Option<Address> {
        for finger in self.fingers.iter().rev() {
            if is_between(self_id, finger.node_pos, target, false) {
                return Some(finger.address.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::finger_start;

    /// Loopback addresses whose ring positions are pairwise distinct.
    fn distinct_addresses(count: usize) -> Vec<Address> {
        let mut addresses: Vec<Address> = Vec::new();
        for port in 4600..u16::MAX {
            let candidate = format!("127.0.0.1:{}", port);
            let pos = hash(candidate.as_bytes());
            if addresses.iter().all(|a| hash(a.as_bytes()) != pos) {
                addresses.push(candidate);
                if addresses.len() == count {
                    break;
                }
            }
        }
        addresses
    }

    #[test]
    fn resolving_caches_the_ring_position() {
        let addresses = distinct_addresses(1);
        let entry = FingerEntry::resolve(42, addresses[0].clone());
        assert_eq!(entry.node_pos, hash(addresses[0].as_bytes()));
        assert_eq!(entry.start, 42);
    }

    #[test]
    fn fingers_at_self_never_qualify() {
        let addresses = distinct_addresses(1);
        let own = &addresses[0];
        let own_id = hash(own.as_bytes());

        let mut table = FingerTable::default();
        for index in 0..4 {
            table.push(FingerEntry::resolve(finger_start(own_id, index), own.clone()));
        }
        assert_eq!(table.closest_preceding(own_id, own_id), None);
    }

    #[test]
    fn highest_qualifying_finger_wins() {
        let addresses = distinct_addresses(3);
        let own_id = hash(addresses[0].as_bytes());

        let mut table = FingerTable::default();
        table.push(FingerEntry::resolve(
            finger_start(own_id, 0),
            addresses[1].clone(),
        ));
        table.push(FingerEntry::resolve(
            finger_start(own_id, 1),
            addresses[2].clone(),
        ));

        // target == own id spans the whole ring, so both remote fingers
        // qualify and the scan must return the later one
        assert_eq!(
            table.closest_preceding(own_id, own_id),
            Some(addresses[2].clone())
        );
    }

    #[test]
    fn empty_table_yields_nothing() {
        let table = FingerTable::default();
        assert_eq!(table.closest_preceding(3, 700), None);
    }
}
