use crate::utils::types::Address;

/// The ordered list of the next `capacity` nodes on the ring. Index 0 is the
/// primary successor; the tail exists so stabilize can fall back when the
/// primary dies.
#[derive(Debug, Clone)]
pub struct SuccessorList {
    capacity: usize,
    successors: Vec<Address>,
}

impl SuccessorList {
    pub fn new(capacity: usize) -> Self {
        SuccessorList {
            capacity: capacity.max(1),
            successors: Vec::new(),
        }
    }

    pub fn primary(&self) -> Option<&Address> {
        self.successors.first()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.successors
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.successors.clone()
    }

    /// Collapse the list to a single entry. Used by create and join.
    pub fn set_only(&mut self, address: Address) {
        self.successors = vec![address];
    }

    /// Replace the primary, keeping the tail.
    pub fn set_primary(&mut self, address: Address) {
        if self.successors.is_empty() {
            self.successors.push(address);
        } else {
            self.successors[0] = address;
        }
    }

    /// Drop an unreachable primary. An emptied list falls back to the node
    /// itself, a ring of one, until stabilize re-integrates it.
    pub fn drop_primary(&mut self, own_address: &Address) {
        if !self.successors.is_empty() {
            self.successors.remove(0);
        }
        if self.successors.is_empty() {
            self.successors.push(own_address.clone());
        }
    }

    /// Adopt the successor's own list: primary first, then its entries,
    /// consecutive duplicates collapsed, truncated to capacity.
    pub fn refresh(&mut self, primary: Address, tail: Vec<Address>) {
        let mut successors = Vec::with_capacity(self.capacity);
        successors.push(primary);
        successors.extend(tail);
        successors.dedup();
        successors.truncate(self.capacity);
        self.successors = successors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_prepends_dedups_and_truncates() {
        let mut list = SuccessorList::new(3);
        list.set_only("a:1".to_string());
        list.refresh(
            "b:1".to_string(),
            vec!["b:1".into(), "c:1".into(), "d:1".into(), "e:1".into()],
        );
        assert_eq!(list.as_slice(), ["b:1", "c:1", "d:1"]);
    }

    #[test]
    fn dropping_the_last_entry_falls_back_to_self() {
        let own = "self:1".to_string();
        let mut list = SuccessorList::new(3);
        list.set_only("peer:1".to_string());
        list.drop_primary(&own);
        assert_eq!(list.as_slice(), [own.clone()]);
        // dropping again keeps the ring-of-one fallback
        list.drop_primary(&own);
        assert_eq!(list.as_slice(), [own]);
    }

    #[test]
    fn set_primary_keeps_the_tail() {
        let mut list = SuccessorList::new(3);
        list.refresh("a:1".to_string(), vec!["b:1".into(), "c:1".into()]);
        list.set_primary("x:1".to_string());
        assert_eq!(list.as_slice(), ["x:1", "b:1", "c:1"]);
    }

    #[test]
    fn capacity_is_at_least_one() {
        let mut list = SuccessorList::new(0);
        list.refresh("a:1".to_string(), vec!["b:1".into()]);
        assert_eq!(list.as_slice(), ["a:1"]);
    }
}
