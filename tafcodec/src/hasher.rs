//! Integrity hasher (C6): incremental SHA-1 over the payload region.

use sha1::{Digest, Sha1};

/// Accumulates a SHA-1 digest over every byte written to the payload region
/// (everything after the header). Fed by the page writer as pages are
/// emitted; consumed once, by the header builder, at close.
#[derive(Default)]
pub struct IntegrityHasher {
    hasher: Sha1,
}

impl IntegrityHasher {
    pub fn new() -> Self {
        Self { hasher: Sha1::new() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Consumes the hasher and returns the 20-byte digest.
    pub fn finalize(self) -> [u8; 20] {
        let digest = self.hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_one_shot_sha1() {
        let mut incremental = IntegrityHasher::new();
        incremental.update(b"hello ");
        incremental.update(b"world");
        let got = incremental.finalize();

        let mut oneshot = Sha1::new();
        oneshot.update(b"hello world");
        let want = oneshot.finalize();

        assert_eq!(&got[..], &want[..]);
    }
}
