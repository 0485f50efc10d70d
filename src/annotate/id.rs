use sha2::{Digest, Sha256};

const ID_DOMAIN: &[u8] = b"sweep-annotate:sample:v1";

/// Derives sample ids from the run seed and the state index.
///
/// Ids are `<index:06>-<16 hex>`; the index prefix keeps them unique within a
/// run and sortable, the digest keeps runs with different seeds apart.
#[derive(Clone, Debug)]
pub struct SampleIdGenerator {
    seed: u64,
}

impl SampleIdGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn id_for(&self, index: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(ID_DOMAIN);
        hasher.update(self.seed.to_le_bytes());
        hasher.update(index.to_le_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        format!("{:06}-{}", index, hex::encode(&digest[..8]))
    }
}
