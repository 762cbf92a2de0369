//! Fixed-width integer storage packed into `u64` words.
//!
//! Backing store for the dense tera array encodings. Every element occupies
//! exactly `bits` bits (4, 8 or 16). Since 64 is a multiple of every supported
//! width, an element never straddles a word boundary.

/// A compact array where each element uses a fixed number of bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitPackedArray {
    /// Raw storage. Elements are packed little-end first into 64-bit words.
    data: Vec<u64>,
    /// Bits per element (4, 8 or 16).
    bits: u8,
    /// Total number of logical elements.
    len: usize,
}

impl BitPackedArray {
    /// Creates a new array with `len` elements, all zero.
    pub fn new(bits: u8, len: usize) -> Self {
        debug_assert!(matches!(bits, 4 | 8 | 16), "bits must be 4, 8 or 16");
        Self {
            data: vec![0u64; Self::word_count(bits, len)],
            bits,
            len,
        }
    }

    fn word_count(bits: u8, len: usize) -> usize {
        (len as u64 * u64::from(bits)).div_ceil(64) as usize
    }

    /// Byte length of the packed form, or `None` on overflow.
    fn checked_byte_len(bits: u8, len: usize) -> Option<usize> {
        let words = (len as u64).checked_mul(u64::from(bits))?.div_ceil(64);
        usize::try_from(words).ok()?.checked_mul(8)
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    /// Largest value one element can hold.
    pub fn max_storable(&self) -> u16 {
        self.mask() as u16
    }

    /// Returns the value at `index`.
    pub fn get(&self, index: usize) -> u16 {
        debug_assert!(index < self.len, "index out of bounds");
        let bit_index = index as u64 * u64::from(self.bits);
        let word = (bit_index / 64) as usize;
        let offset = (bit_index % 64) as u32;
        ((self.data[word] >> offset) & self.mask()) as u16
    }

    /// Stores `value` at `index`, truncated to the element width, and returns
    /// the previous value.
    pub fn set(&mut self, index: usize, value: u16) -> u16 {
        debug_assert!(index < self.len, "index out of bounds");
        let mask = self.mask();
        let bit_index = index as u64 * u64::from(self.bits);
        let word = (bit_index / 64) as usize;
        let offset = (bit_index % 64) as u32;
        let old = ((self.data[word] >> offset) & mask) as u16;
        self.data[word] &= !(mask << offset);
        self.data[word] |= (u64::from(value) & mask) << offset;
        old
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: u16) {
        let element = u64::from(value) & self.mask();
        let per_word = 64 / u32::from(self.bits);
        let mut pattern = 0u64;
        for i in 0..per_word {
            pattern |= element << (i * u32::from(self.bits));
        }
        self.data.fill(pattern);
    }

    /// Largest stored value.
    pub fn max_value(&self) -> u16 {
        (0..self.len).map(|i| self.get(i)).max().unwrap_or(0)
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the backing storage in bytes (not counting struct overhead).
    pub fn storage_bytes(&self) -> usize {
        self.data.len() * 8
    }

    /// Appends the backing words as little-endian bytes.
    pub fn write_le_bytes(&self, out: &mut Vec<u8>) {
        out.reserve(self.storage_bytes());
        for word in &self.data {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }

    /// Rebuilds an array from bytes produced by [`write_le_bytes`](Self::write_le_bytes).
    ///
    /// Returns `None` if the byte count does not match `bits * len`.
    pub fn from_le_bytes(bits: u8, len: usize, bytes: &[u8]) -> Option<Self> {
        if !matches!(bits, 4 | 8 | 16) || Self::checked_byte_len(bits, len)? != bytes.len() {
            return None;
        }
        let data = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        Some(Self { data, bits, len })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
