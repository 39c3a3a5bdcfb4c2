//! Merkle root over a block's transaction hashes

use super::{hash_pair, Hash};

/// Compute the merkle root of a list of hashes.
///
/// An empty list yields the zero hash; an odd level duplicates its last element.
pub fn compute_merkle_root(hashes: &[Hash]) -> Hash {
    let mut level: Vec<Hash> = match hashes {
        [] => return Hash::zero(),
        [single] => return *single,
        _ => hashes.to_vec(),
    };

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1];
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    level[0]
}
