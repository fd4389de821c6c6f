//! Per-layer hash tables: `L` independent bucket → neuron-id maps. No
//! vector storage, no on-disk backend, no hasher (de)serialization:
//! a layer already owns its hasher and its neurons hold their own
//! weights, so the table only ever has to remember which neuron ids
//! live in which bucket.
use crate::hash::HashKey;
use fnv::FnvHashMap as HashMap;

/// Bucket contents: neuron ids colliding on one key. Duplicates are not
/// filtered, but `insert` only ever inserts a given id once per
/// (table, key) pair since `rebuild` clears before repopulating.
pub type Bucket = Vec<u32>;

/// `L` independent maps from bucket key to neuron ids, one per hash
/// table of the owning layer.
#[derive(Clone)]
pub struct HashTable {
    tables: Vec<HashMap<HashKey, Bucket>>,
}

impl HashTable {
    pub fn new(l: usize) -> Self {
        HashTable {
            tables: vec![HashMap::default(); l],
        }
    }

    pub fn l(&self) -> usize {
        self.tables.len()
    }

    /// Insert `neuron_id` into table `table_idx`'s bucket for `key`.
    pub fn insert(&mut self, table_idx: usize, key: HashKey, neuron_id: u32) {
        self.tables[table_idx]
            .entry(key)
            .or_insert_with(Vec::new)
            .push(neuron_id);
    }

    /// Look up the bucket for `key` in table `table_idx`. Empty if
    /// nothing has hashed there.
    pub fn bucket(&self, table_idx: usize, key: HashKey) -> &[u32] {
        self.tables[table_idx]
            .get(&key)
            .map(|b| b.as_slice())
            .unwrap_or(&[])
    }

    /// Clear all `L` tables, then reinsert every `(neuron_id, weight)`
    /// pair under `hash_of(weight)` for each table. Restores the
    /// invariant that `tables[l][hash_l(w_n)]` contains `n` for every
    /// neuron `n` and table `l`.
    pub fn rebuild<H: crate::hash::VecHash>(
        &mut self,
        hasher: &H,
        neurons: impl Iterator<Item = (u32, Vec<f32>)>,
    ) -> crate::error::Result<()> {
        for table in self.tables.iter_mut() {
            table.clear();
        }
        for (id, weight) in neurons {
            let keys = hasher.hash(&weight)?;
            for (table_idx, key) in keys.into_iter().enumerate() {
                self.tables[table_idx].entry(key).or_insert_with(Vec::new).push(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insert_and_bucket() {
        let mut t = HashTable::new(2);
        t.insert(0, 5, 10);
        t.insert(0, 5, 11);
        t.insert(1, 7, 10);
        assert_eq!(t.bucket(0, 5), &[10, 11]);
        assert_eq!(t.bucket(1, 7), &[10]);
        assert_eq!(t.bucket(0, 999), &[] as &[u32]);
    }

    #[test]
    fn test_rebuild_idempotent() {
        use crate::hash::WTA;
        let hasher = WTA::new(4, 3, 6, 1).unwrap();
        let neurons = vec![
            (0u32, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            (1u32, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
        ];
        let mut t = HashTable::new(3);
        t.rebuild(&hasher, neurons.clone().into_iter()).unwrap();
        let snapshot: Vec<Vec<u32>> = (0..3).map(|l| t.bucket(l, hasher.hash(&neurons[0].1).unwrap()[l]).to_vec()).collect();
        t.rebuild(&hasher, neurons.clone().into_iter()).unwrap();
        let snapshot2: Vec<Vec<u32>> = (0..3).map(|l| t.bucket(l, hasher.hash(&neurons[0].1).unwrap()[l]).to_vec()).collect();
        assert_eq!(snapshot, snapshot2);
    }
}
