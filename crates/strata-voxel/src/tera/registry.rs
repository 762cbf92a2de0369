//! Encoding registry and self-describing array payloads.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::dense::DenseTeraArray;
use super::null::TeraNullArray;
use super::sparse::SparseTeraArray8;
use super::{ArraySize, DENSE4, DENSE8, DENSE16, NULL, SPARSE8, TeraArray, TeraArrayError};

type Factory = fn(ArraySize) -> Box<dyn TeraArray>;
type Decoder = fn(ArraySize, &[u8]) -> Result<Box<dyn TeraArray>, TeraArrayError>;
type Estimator = fn(&dyn TeraArray) -> usize;

/// One registered encoding.
#[derive(Clone, Debug)]
pub struct TeraArrayEntry {
    pub id: &'static str,
    pub bits: u8,
    pub sparse: bool,
    pub factory: Factory,
    pub decoder: Decoder,
    /// Estimates the memory this encoding would need for a given array's values.
    pub estimator: Estimator,
}

impl TeraArrayEntry {
    /// Allocates a zeroed array of this encoding.
    pub fn create(&self, size: ArraySize) -> Box<dyn TeraArray> {
        (self.factory)(size)
    }

    pub fn decode(
        &self,
        size: ArraySize,
        bytes: &[u8],
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        (self.decoder)(size, bytes)
    }

    pub fn estimate(&self, source: &dyn TeraArray) -> usize {
        (self.estimator)(source)
    }

    /// Returns `true` if `value` fits in this encoding's element width.
    pub fn can_hold(&self, value: u16) -> bool {
        match self.bits {
            0 => value == 0,
            16.. => true,
            bits => u32::from(value) < (1u32 << bits),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TeraPayload {
    encoding: String,
    size: [u32; 3],
    data: Vec<u8>,
}

/// Maps encoding ids to their factories.
///
/// Built once at startup and shared through the chunk context.
#[derive(Clone, Debug, Default)]
pub struct TeraArrayRegistry {
    entries: Vec<TeraArrayEntry>,
    by_id: FxHashMap<&'static str, usize>,
}

impl TeraArrayRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in encoding.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for entry in builtin_entries() {
            // Built-in ids are distinct.
            let _ = registry.register(entry);
        }
        registry
    }

    pub fn register(&mut self, entry: TeraArrayEntry) -> Result<(), TeraArrayError> {
        if self.by_id.contains_key(entry.id) {
            return Err(TeraArrayError::DuplicateEncoding(entry.id.to_string()));
        }
        self.by_id.insert(entry.id, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TeraArrayEntry> {
        self.by_id.get(id).map(|&index| &self.entries[index])
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> &[TeraArrayEntry] {
        &self.entries
    }

    /// Allocates a zeroed array of the named encoding.
    pub fn create(&self, id: &str, size: ArraySize) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        self.get(id)
            .map(|entry| entry.create(size))
            .ok_or_else(|| TeraArrayError::UnknownEncoding(id.to_string()))
    }

    /// Serializes an array into a self-describing payload.
    pub fn encode(&self, array: &dyn TeraArray) -> Result<Vec<u8>, TeraArrayError> {
        let mut data = Vec::new();
        array.write_data(&mut data);
        let payload = TeraPayload {
            encoding: array.encoding().to_string(),
            size: array.size().to_wire(),
            data,
        };
        Ok(postcard::to_allocvec(&payload)?)
    }

    /// Decodes a payload produced by [`encode`](Self::encode).
    pub fn decode(&self, bytes: &[u8]) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        let payload: TeraPayload = postcard::from_bytes(bytes)?;
        self.decode_payload(payload, None)
    }

    /// Decodes a payload that must have exactly `expected` dimensions.
    ///
    /// The size is compared before the encoding allocates anything.
    pub fn decode_sized(
        &self,
        bytes: &[u8],
        expected: ArraySize,
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        let payload: TeraPayload = postcard::from_bytes(bytes)?;
        self.decode_payload(payload, Some(expected))
    }

    fn decode_payload(
        &self,
        payload: TeraPayload,
        expected: Option<ArraySize>,
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        let entry = self
            .get(&payload.encoding)
            .ok_or_else(|| TeraArrayError::UnknownEncoding(payload.encoding.clone()))?;
        let size = ArraySize::from_wire(payload.size);
        if let Some(expected) = expected.filter(|&expected| expected != size) {
            return Err(TeraArrayError::SizeMismatch {
                expected,
                actual: size,
            });
        }
        if size.checked_volume().is_none() {
            return Err(TeraArrayError::MalformedPayload {
                encoding: payload.encoding,
                reason: format!("size {size} overflows"),
            });
        }
        entry.decode(size, &payload.data)
    }
}

/// The `dense8` entry, used when a configured encoding is unknown.
pub(crate) fn dense8_entry() -> TeraArrayEntry {
    let [_, dense8, ..] = builtin_entries();
    dense8
}

fn builtin_entries() -> [TeraArrayEntry; 5] {
    [
        TeraArrayEntry {
            id: DENSE4,
            bits: 4,
            sparse: false,
            factory: DenseTeraArray::create4,
            decoder: DenseTeraArray::decode4,
            estimator: DenseTeraArray::estimate4,
        },
        TeraArrayEntry {
            id: DENSE8,
            bits: 8,
            sparse: false,
            factory: DenseTeraArray::create8,
            decoder: DenseTeraArray::decode8,
            estimator: DenseTeraArray::estimate8,
        },
        TeraArrayEntry {
            id: DENSE16,
            bits: 16,
            sparse: false,
            factory: DenseTeraArray::create16,
            decoder: DenseTeraArray::decode16,
            estimator: DenseTeraArray::estimate16,
        },
        TeraArrayEntry {
            id: SPARSE8,
            bits: 8,
            sparse: true,
            factory: SparseTeraArray8::create,
            decoder: SparseTeraArray8::decode,
            estimator: SparseTeraArray8::estimate,
        },
        TeraArrayEntry {
            id: NULL,
            bits: 0,
            sparse: false,
            factory: TeraNullArray::create,
            decoder: TeraNullArray::decode,
            estimator: TeraNullArray::estimate,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = TeraArrayRegistry::with_defaults();
        let ids: Vec<_> = registry.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![DENSE4, DENSE8, DENSE16, SPARSE8, NULL]);
        assert!(registry.get(SPARSE8).unwrap().sparse);
        assert!(registry.get("dense32").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = TeraArrayRegistry::with_defaults();
        let entry = registry.get(DENSE8).unwrap().clone();
        assert!(matches!(
            registry.register(entry),
            Err(TeraArrayError::DuplicateEncoding(_))
        ));
    }

    #[test]
    fn test_can_hold() {
        let registry = TeraArrayRegistry::with_defaults();
        let dense4 = registry.get(DENSE4).unwrap();
        assert!(dense4.can_hold(15));
        assert!(!dense4.can_hold(16));
        assert!(registry.get(DENSE16).unwrap().can_hold(u16::MAX));
        assert!(!registry.get(NULL).unwrap().can_hold(1));
    }

    #[test]
    fn test_encode_decode_each_encoding() {
        let registry = TeraArrayRegistry::with_defaults();
        let size = ArraySize::new(16, 16, 16);
        for entry in registry.entries() {
            let mut array = entry.create(size);
            array.set(1, 2, 3, 7);
            array.set(15, 15, 15, 2);
            let bytes = registry.encode(array.as_ref()).unwrap();
            let decoded = registry.decode(&bytes).unwrap();
            assert_eq!(decoded.encoding(), entry.id);
            assert_eq!(decoded.size(), size);
            assert_eq!(decoded.get(1, 2, 3), array.get(1, 2, 3));
            assert_eq!(decoded.get(15, 15, 15), array.get(15, 15, 15));
        }
    }

    #[test]
    fn test_decode_unknown_encoding() {
        let registry = TeraArrayRegistry::with_defaults();
        let bytes = postcard::to_allocvec(&TeraPayload {
            encoding: "rle12".to_string(),
            size: [1, 1, 1],
            data: vec![],
        })
        .unwrap();
        assert!(matches!(
            registry.decode(&bytes),
            Err(TeraArrayError::UnknownEncoding(id)) if id == "rle12"
        ));
        assert!(registry.decode(&[0xff]).is_err());
    }

    fn payload(encoding: &str, size: [u32; 3], data: Vec<u8>) -> Vec<u8> {
        postcard::to_allocvec(&TeraPayload {
            encoding: encoding.to_string(),
            size,
            data,
        })
        .unwrap()
    }

    #[test]
    fn test_decode_rejects_huge_sizes() {
        let registry = TeraArrayRegistry::with_defaults();

        let tall = payload(SPARSE8, [1, u32::MAX, 1], vec![0, 0]);
        assert!(matches!(
            registry.decode(&tall),
            Err(TeraArrayError::MalformedPayload { encoding, .. }) if encoding == SPARSE8
        ));

        let cube = payload(DENSE16, [u32::MAX; 3], vec![0; 8]);
        assert!(matches!(
            registry.decode(&cube),
            Err(TeraArrayError::MalformedPayload { encoding, .. }) if encoding == DENSE16
        ));
    }

    #[test]
    fn test_decode_sized_checks_size_first() {
        let registry = TeraArrayRegistry::with_defaults();
        let expected = ArraySize::new(16, 256, 16);

        let tall = payload(SPARSE8, [1, u32::MAX, 1], vec![0, 0]);
        assert!(matches!(
            registry.decode_sized(&tall, expected),
            Err(TeraArrayError::SizeMismatch { actual, .. }) if actual.y == u32::MAX as usize
        ));

        let cube = payload(DENSE16, [u32::MAX; 3], vec![]);
        assert!(matches!(
            registry.decode_sized(&cube, expected),
            Err(TeraArrayError::SizeMismatch { expected: e, .. }) if e == expected
        ));

        let array = registry.create(DENSE8, expected).unwrap();
        let bytes = registry.encode(array.as_ref()).unwrap();
        assert_eq!(registry.decode_sized(&bytes, expected).unwrap().size(), expected);
    }
}
