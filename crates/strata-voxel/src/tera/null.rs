use super::{ArraySize, NULL, TeraArray, TeraArrayError};

/// Array that stores nothing: reads are always 0 and writes are discarded.
#[derive(Clone, Debug)]
pub struct TeraNullArray {
    size: ArraySize,
}

impl TeraNullArray {
    pub fn new(size: ArraySize) -> Self {
        Self { size }
    }

    pub(crate) fn create(size: ArraySize) -> Box<dyn TeraArray> {
        Box::new(Self::new(size))
    }

    pub(crate) fn decode(
        size: ArraySize,
        bytes: &[u8],
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        if !bytes.is_empty() {
            return Err(TeraArrayError::MalformedPayload {
                encoding: NULL.to_string(),
                reason: format!("expected no data, got {} bytes", bytes.len()),
            });
        }
        Ok(Self::create(size))
    }

    pub(crate) fn estimate(_source: &dyn TeraArray) -> usize {
        0
    }
}

impl TeraArray for TeraNullArray {
    fn encoding(&self) -> &'static str {
        NULL
    }

    fn size(&self) -> ArraySize {
        self.size
    }

    fn element_bits(&self) -> u8 {
        0
    }

    fn is_sparse(&self) -> bool {
        false
    }

    fn get(&self, _x: usize, _y: usize, _z: usize) -> u16 {
        0
    }

    fn set(&mut self, _x: usize, _y: usize, _z: usize, _value: u16) -> u16 {
        0
    }

    fn set_if(&mut self, _x: usize, _y: usize, _z: usize, _value: u16, _expected: u16) -> bool {
        false
    }

    fn fill(&mut self, _value: u16) {}

    fn estimated_memory(&self) -> usize {
        0
    }

    fn copy(&self) -> Box<dyn TeraArray> {
        Box::new(self.clone())
    }

    fn max_value(&self) -> u16 {
        0
    }

    fn write_data(&self, _out: &mut Vec<u8>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_array_discards_everything() {
        let mut array = TeraNullArray::new(ArraySize::new(16, 16, 16));
        assert_eq!(array.set(1, 2, 3, 9), 0);
        assert_eq!(array.get(1, 2, 3), 0);
        assert!(!array.set_if(1, 2, 3, 9, 0));
        array.fill(4);
        assert_eq!(array.get(0, 0, 0), 0);
        assert_eq!(array.estimated_memory(), 0);
        assert_eq!(array.element_bits(), 0);
    }
}
