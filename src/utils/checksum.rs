//! Deterministic state checksums.
//!
//! Fields are fed in a fixed order as little-endian bytes so two states
//! hash equal exactly when every persisted field is bit-for-bit equal.

/// Incremental checksum over numeric state.
#[derive(Debug, Clone)]
pub struct Checksum {
    hasher: blake3::Hasher,
}

impl Checksum {
    /// Start a checksum from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"anofox-seasonal-v1:");
        hasher.update(&seed.to_le_bytes());
        Self { hasher }
    }

    /// Add a float by its bit pattern.
    pub fn add_f64(&mut self, value: f64) -> &mut Self {
        self.hasher.update(&value.to_bits().to_le_bytes());
        self
    }

    /// Add each float of `values`, prefixed by their count.
    pub fn add_f64s(&mut self, values: &[f64]) -> &mut Self {
        self.add_u64(values.len() as u64);
        for &value in values {
            self.add_f64(value);
        }
        self
    }

    /// Add an integer.
    pub fn add_u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    /// Add a signed integer.
    pub fn add_i64(&mut self, value: i64) -> &mut Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    /// Add a section label.
    pub fn add_tag(&mut self, tag: &str) -> &mut Self {
        self.hasher.update(tag.as_bytes());
        self
    }

    /// The first eight bytes of the digest.
    pub fn finish(&self) -> u64 {
        let digest = self.hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}
