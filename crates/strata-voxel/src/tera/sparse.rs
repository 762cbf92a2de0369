use super::{ArraySize, SPARSE8, TeraArray, TeraArrayError};

const LAYER_UNIFORM: u8 = 0;
const LAYER_DENSE: u8 = 1;

/// Per-layer overhead charged by the memory estimate.
const LAYER_OVERHEAD: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Layer {
    Uniform(u8),
    Dense(Box<[u8]>),
}

/// Byte array stored one horizontal layer at a time.
///
/// A layer whose cells all hold the same value costs one byte; a layer is
/// expanded to a dense `x * z` block the first time a differing value is
/// written. Terrain is strongly layered (air above, stone below), so most
/// layers of a generated chunk stay uniform.
#[derive(Clone, Debug)]
pub struct SparseTeraArray8 {
    size: ArraySize,
    layers: Vec<Layer>,
}

impl SparseTeraArray8 {
    pub fn new(size: ArraySize) -> Self {
        Self {
            size,
            layers: vec![Layer::Uniform(0); size.y],
        }
    }

    pub(crate) fn create(size: ArraySize) -> Box<dyn TeraArray> {
        Box::new(Self::new(size))
    }

    /// Number of layers currently stored densely.
    pub fn dense_layers(&self) -> usize {
        self.layers
            .iter()
            .filter(|layer| matches!(layer, Layer::Dense(_)))
            .count()
    }

    fn layer_index(&self, x: usize, z: usize) -> usize {
        z * self.size.x + x
    }

    pub(crate) fn decode(
        size: ArraySize,
        bytes: &[u8],
    ) -> Result<Box<dyn TeraArray>, TeraArrayError> {
        let malformed = |reason: String| TeraArrayError::MalformedPayload {
            encoding: SPARSE8.to_string(),
            reason,
        };
        if size.checked_volume().is_none() {
            return Err(malformed(format!("size {size} overflows")));
        }
        // Every layer starts with a tag byte.
        if size.y > bytes.len() {
            return Err(malformed(format!("{} bytes cannot hold {} layers", bytes.len(), size.y)));
        }
        let area = size.layer_area();
        let mut layers = Vec::with_capacity(size.y);
        let mut rest = bytes;
        for y in 0..size.y {
            let (&tag, tail) = rest
                .split_first()
                .ok_or_else(|| malformed(format!("truncated at layer {y}")))?;
            match tag {
                LAYER_UNIFORM => {
                    let (&value, tail) = tail
                        .split_first()
                        .ok_or_else(|| malformed(format!("truncated at layer {y}")))?;
                    layers.push(Layer::Uniform(value));
                    rest = tail;
                }
                LAYER_DENSE => {
                    if tail.len() < area {
                        return Err(malformed(format!("truncated at layer {y}")));
                    }
                    let (cells, tail) = tail.split_at(area);
                    layers.push(Layer::Dense(cells.into()));
                    rest = tail;
                }
                other => return Err(malformed(format!("unknown layer tag {other}"))),
            }
        }
        if !rest.is_empty() {
            return Err(malformed(format!("{} trailing bytes", rest.len())));
        }
        Ok(Box::new(Self { size, layers }))
    }

    /// Memory this encoding would need for the values of `source`.
    pub(crate) fn estimate(source: &dyn TeraArray) -> usize {
        let size = source.size();
        let mut total = 0;
        for y in 0..size.y {
            let first = source.get(0, y, 0);
            let uniform = (0..size.z)
                .all(|z| (0..size.x).all(|x| source.get(x, y, z) == first));
            total += LAYER_OVERHEAD + if uniform { 1 } else { size.layer_area() };
        }
        total
    }
}

impl TeraArray for SparseTeraArray8 {
    fn encoding(&self) -> &'static str {
        SPARSE8
    }

    fn size(&self) -> ArraySize {
        self.size
    }

    fn element_bits(&self) -> u8 {
        8
    }

    fn is_sparse(&self) -> bool {
        true
    }

    fn get(&self, x: usize, y: usize, z: usize) -> u16 {
        match &self.layers[y] {
            Layer::Uniform(value) => u16::from(*value),
            Layer::Dense(cells) => u16::from(cells[self.layer_index(x, z)]),
        }
    }

    fn set(&mut self, x: usize, y: usize, z: usize, value: u16) -> u16 {
        let value = value as u8;
        let index = self.layer_index(x, z);
        if let Layer::Uniform(current) = self.layers[y] {
            if current != value {
                let mut cells = vec![current; self.size.layer_area()].into_boxed_slice();
                cells[index] = value;
                self.layers[y] = Layer::Dense(cells);
            }
            return u16::from(current);
        }
        match &mut self.layers[y] {
            Layer::Dense(cells) => u16::from(std::mem::replace(&mut cells[index], value)),
            Layer::Uniform(current) => u16::from(*current),
        }
    }

    fn fill(&mut self, value: u16) {
        self.layers.fill(Layer::Uniform(value as u8));
    }

    fn estimated_memory(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| {
                LAYER_OVERHEAD
                    + match layer {
                        Layer::Uniform(_) => 1,
                        Layer::Dense(cells) => cells.len(),
                    }
            })
            .sum()
    }

    fn copy(&self) -> Box<dyn TeraArray> {
        Box::new(self.clone())
    }

    fn max_value(&self) -> u16 {
        self.layers
            .iter()
            .map(|layer| match layer {
                Layer::Uniform(value) => *value,
                Layer::Dense(cells) => cells.iter().copied().max().unwrap_or(0),
            })
            .max()
            .map_or(0, u16::from)
    }

    fn write_data(&self, out: &mut Vec<u8>) {
        for layer in &self.layers {
            match layer {
                Layer::Uniform(value) => {
                    out.push(LAYER_UNIFORM);
                    out.push(*value);
                }
                Layer::Dense(cells) => {
                    out.push(LAYER_DENSE);
                    out.extend_from_slice(cells);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size() -> ArraySize {
        ArraySize::new(16, 16, 16)
    }

    #[test]
    fn test_layer_expands_on_differing_write() {
        let mut array = SparseTeraArray8::new(size());
        array.fill(3);
        assert_eq!(array.dense_layers(), 0);
        assert_eq!(array.set(2, 5, 7, 3), 3);
        assert_eq!(array.dense_layers(), 0);
        assert_eq!(array.set(2, 5, 7, 9), 3);
        assert_eq!(array.dense_layers(), 1);
        assert_eq!(array.get(2, 5, 7), 9);
        assert_eq!(array.get(3, 5, 7), 3);
        assert_eq!(array.get(2, 6, 7), 3);
    }

    #[test]
    fn test_uniform_array_is_small() {
        let array = SparseTeraArray8::new(size());
        assert_eq!(array.estimated_memory(), 16 * (LAYER_OVERHEAD + 1));
        assert_eq!(SparseTeraArray8::estimate(&array), array.estimated_memory());
    }

    #[test]
    fn test_payload_restores_layers() {
        let mut array = SparseTeraArray8::new(size());
        array.set(0, 0, 0, 200);
        array.set(15, 15, 15, 1);
        let mut bytes = Vec::new();
        array.write_data(&mut bytes);
        let restored = SparseTeraArray8::decode(size(), &bytes).unwrap();
        assert_eq!(restored.get(0, 0, 0), 200);
        assert_eq!(restored.get(15, 15, 15), 1);
        assert_eq!(restored.max_value(), 200);
    }

    #[test]
    fn test_decode_rejects_bad_tag_and_trailing_bytes() {
        let small = ArraySize::new(2, 1, 2);
        assert!(SparseTeraArray8::decode(small, &[7, 0]).is_err());
        assert!(SparseTeraArray8::decode(small, &[LAYER_UNIFORM, 0, 1]).is_err());
        assert!(SparseTeraArray8::decode(small, &[LAYER_DENSE, 1, 2]).is_err());
    }

    #[test]
    fn test_decode_rejects_more_layers_than_bytes() {
        let tall = ArraySize::new(1, u32::MAX as usize, 1);
        assert!(matches!(
            SparseTeraArray8::decode(tall, &[LAYER_UNIFORM, 0]),
            Err(TeraArrayError::MalformedPayload { .. })
        ));
        let overflowing = ArraySize::new(usize::MAX, 2, usize::MAX);
        assert!(SparseTeraArray8::decode(overflowing, &[LAYER_UNIFORM, 0]).is_err());
    }
}
