use super::{TeraArray, TeraArrayRegistry, copy_values};

/// Re-encodes arrays into the smallest registered encoding that holds their values.
///
/// The source is never modified; the result reads back the same value at every
/// coordinate.
pub struct TeraDeflator<'a> {
    registry: &'a TeraArrayRegistry,
}

impl<'a> TeraDeflator<'a> {
    pub fn new(registry: &'a TeraArrayRegistry) -> Self {
        Self { registry }
    }

    pub fn deflate(&self, source: &dyn TeraArray) -> Box<dyn TeraArray> {
        let max = source.max_value();
        let best = self
            .registry
            .entries()
            .iter()
            .filter(|entry| entry.bits > 0 && entry.can_hold(max))
            .min_by_key(|entry| entry.estimate(source));

        match best {
            Some(entry) if entry.id == source.encoding() => source.copy(),
            Some(entry) => {
                let mut target = entry.create(source.size());
                copy_values(source, target.as_mut());
                target
            }
            None => source.copy(),
        }
    }
}
