use super::{ArraySize, DENSE4, DENSE8, DENSE16, TeraArray, TeraArrayError};
use crate::bit_packed::BitPackedArray;

/// Dense bit-packed array; every cell costs exactly `bits` bits.
#[derive(Clone, Debug)]
pub struct DenseTeraArray {
    encoding: &'static str,
    size: ArraySize,
    data: BitPackedArray,
}

impl DenseTeraArray {
    pub fn new(encoding: &'static str, bits: u8, size: ArraySize) -> Self {
        Self {
            encoding,
            size,
            data: BitPackedArray::new(bits, size.volume()),
        }
    }

    pub(crate) fn create4(size: ArraySize) -> Box<dyn TeraArray> {
        Box::new(Self::new(DENSE4, 4, size))
    }

    pub(crate) fn create8(size: ArraySize) -> Box<dyn TeraArray> {
        Box::new(Self::new(DENSE8, 8, size))
    }

    pub(crate) fn create16(size: ArraySize) -> Box<dyn TeraArray> {
        Box::new(Self::new(DENSE16, 16, size))
    }

    fn decode(
        encoding: &'static str,
        bits: u8,
        size: ArraySize,
        bytes: &[u8],
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        let malformed = || TeraArrayError::MalformedPayload {
            encoding: encoding.to_string(),
            reason: format!("{} bytes do not hold {size} cells", bytes.len()),
        };
        let volume = size.checked_volume().ok_or_else(malformed)?;
        let data = BitPackedArray::from_le_bytes(bits, volume, bytes).ok_or_else(malformed)?;
        Ok(Box::new(Self {
            encoding,
            size,
            data,
        }))
    }

    pub(crate) fn decode4(
        size: ArraySize,
        bytes: &[u8],
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        Self::decode(DENSE4, 4, size, bytes)
    }

    pub(crate) fn decode8(
        size: ArraySize,
        bytes: &[u8],
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        Self::decode(DENSE8, 8, size, bytes)
    }

    pub(crate) fn decode16(
        size: ArraySize,
        bytes: &[u8],
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        Self::decode(DENSE16, 16, size, bytes)
    }

    fn estimate(bits: u8, source: &dyn TeraArray) -> usize {
        (source.size().volume() * bits as usize).div_ceil(64) * 8
    }

    pub(crate) fn estimate4(source: &dyn TeraArray) -> usize {
        Self::estimate(4, source)
    }

    pub(crate) fn estimate8(source: &dyn TeraArray) -> usize {
        Self::estimate(8, source)
    }

    pub(crate) fn estimate16(source: &dyn TeraArray) -> usize {
        Self::estimate(16, source)
    }
}

impl TeraArray for DenseTeraArray {
    fn encoding(&self) -> &'static str {
        self.encoding
    }

    fn size(&self) -> ArraySize {
        self.size
    }

    fn element_bits(&self) -> u8 {
        self.data.bits()
    }

    fn is_sparse(&self) -> bool {
        false
    }

    fn get(&self, x: usize, y: usize, z: usize) -> u16 {
        self.data.get(self.size.index(x, y, z))
    }

    fn set(&mut self, x: usize, y: usize, z: usize, value: u16) -> u16 {
        self.data.set(self.size.index(x, y, z), value)
    }

    fn fill(&mut self, value: u16) {
        self.data.fill(value);
    }

    fn estimated_memory(&self) -> usize {
        self.data.storage_bytes()
    }

    fn copy(&self) -> Box<dyn TeraArray> {
        Box::new(self.clone())
    }

    fn max_value(&self) -> u16 {
        self.data.max_value()
    }

    fn write_data(&self, out: &mut Vec<u8>) {
        self.data.write_le_bytes(out);
    }
}
