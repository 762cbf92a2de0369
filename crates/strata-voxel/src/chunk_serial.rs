//! Persistence message for chunks.
//!
//! A [`ChunkMessage`] is a postcard-encoded record whose fields are all
//! optional on the wire. Decoding is strict: every required field must be
//! present and every array payload must match the chunk type's size.
//!
//! | Field | Content |
//! |-------|---------|
//! | `x`, `y`, `z` | chunk position |
//! | `chunk_type_id` | [`ChunkType::id`] |
//! | `state_id` | [`ChunkState::id`] |
//! | `block_data` .. `extra_data` | tera array payloads |
//! | `mod_data` | `(id, payload)` per allocated extension |

use std::sync::Arc;

use glam::IVec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkData, ChunkRecord};
use crate::chunk_state::ChunkState;
use crate::chunk_type::ChunkType;
use crate::context::ChunkContext;
use crate::tera::{ArraySize, TeraArray, TeraArrayError};

/// Errors that can occur while encoding or decoding a chunk message.
#[derive(Debug, thiserror::Error)]
pub enum ChunkSerError {
    #[error("chunk message is missing {0}")]
    MissingField(&'static str),
    #[error("unknown chunk type id: {0}")]
    UnknownChunkType(i32),
    #[error("unknown chunk state id: {0}")]
    UnknownState(i32),
    #[error("mod data entry without id")]
    MissingModDataId,
    #[error("mod data entry {0} has no data")]
    MissingModData(String),
    #[error("mod data id {0} appears twice")]
    DuplicateModData(String),
    #[error("{field}: {source}")]
    Array {
        field: String,
        #[source]
        source: TeraArrayError,
    },
    #[error("{field} has size {actual}, chunk type needs {expected}")]
    SizeMismatch {
        field: String,
        expected: ArraySize,
        actual: ArraySize,
    },
    #[error("chunk message encoding: {0}")]
    Message(#[from] postcard::Error),
}

/// One extension array on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModDataMessage {
    pub id: Option<String>,
    pub data: Option<Vec<u8>>,
}

/// Wire form of a chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMessage {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub z: Option<i32>,
    pub chunk_type_id: Option<i32>,
    pub state_id: Option<i32>,
    pub block_data: Option<Vec<u8>>,
    pub sunlight_data: Option<Vec<u8>>,
    pub light_data: Option<Vec<u8>>,
    pub extra_data: Option<Vec<u8>>,
    pub mod_data: Vec<ModDataMessage>,
}

fn encode_array(
    context: &ChunkContext,
    field: &str,
    array: &dyn TeraArray,
) -> Result<Vec<u8>, ChunkSerError> {
    context
        .arrays
        .encode(array)
        .map_err(|source| ChunkSerError::Array {
            field: field.to_string(),
            source,
        })
}

fn decode_array(
    context: &ChunkContext,
    field: &str,
    bytes: &[u8],
    expected: ArraySize,
) -> Result<Box<dyn TeraArray>, ChunkSerError> {
    context
        .arrays
        .decode_sized(bytes, expected)
        .map_err(|source| match source {
            TeraArrayError::SizeMismatch { expected, actual } => ChunkSerError::SizeMismatch {
                field: field.to_string(),
                expected,
                actual,
            },
            source => ChunkSerError::Array {
                field: field.to_string(),
                source,
            },
        })
}

const PRIMARY_FIELDS: [&str; 4] = ["block_data", "sunlight_data", "light_data", "extra_data"];

impl ChunkMessage {
    /// Builds the wire form of a record.
    pub fn from_record(record: &ChunkRecord) -> Result<Self, ChunkSerError> {
        let context = record.data.context();
        let [blocks, sunlight, light, extra] = record.data.arrays();
        let mut mod_data = Vec::new();
        for (id, array) in record.data.extensions() {
            mod_data.push(ModDataMessage {
                id: Some(id.to_string()),
                data: Some(encode_array(context, id, array)?),
            });
        }
        Ok(Self {
            x: Some(record.pos.x),
            y: Some(record.pos.y),
            z: Some(record.pos.z),
            chunk_type_id: Some(record.chunk_type.id()),
            state_id: Some(i32::from(record.state.id())),
            block_data: Some(encode_array(context, PRIMARY_FIELDS[0], blocks)?),
            sunlight_data: Some(encode_array(context, PRIMARY_FIELDS[1], sunlight)?),
            light_data: Some(encode_array(context, PRIMARY_FIELDS[2], light)?),
            extra_data: Some(encode_array(context, PRIMARY_FIELDS[3], extra)?),
            mod_data,
        })
    }

    /// Validates the message and rebuilds the record.
    pub fn into_record(self, context: &Arc<ChunkContext>) -> Result<ChunkRecord, ChunkSerError> {
        let x = self.x.ok_or(ChunkSerError::MissingField("x"))?;
        let y = self.y.ok_or(ChunkSerError::MissingField("y"))?;
        let z = self.z.ok_or(ChunkSerError::MissingField("z"))?;
        let type_id = self
            .chunk_type_id
            .ok_or(ChunkSerError::MissingField("chunk_type_id"))?;
        let chunk_type =
            ChunkType::by_id(type_id).ok_or(ChunkSerError::UnknownChunkType(type_id))?;
        let state_id = self.state_id.ok_or(ChunkSerError::MissingField("state_id"))?;
        let state = ChunkState::by_id(state_id).ok_or(ChunkSerError::UnknownState(state_id))?;

        let size = chunk_type.array_size();
        let decode_primary =
            |index: usize, payload: Option<Vec<u8>>| -> Result<Box<dyn TeraArray>, ChunkSerError> {
                let field = PRIMARY_FIELDS[index];
                let bytes = payload.ok_or(ChunkSerError::MissingField(field))?;
                decode_array(context, field, &bytes, size)
            };
        let arrays = [
            decode_primary(0, self.block_data)?,
            decode_primary(1, self.sunlight_data)?,
            decode_primary(2, self.light_data)?,
            decode_primary(3, self.extra_data)?,
        ];

        let mut extensions = FxHashMap::default();
        for entry in self.mod_data {
            let id = entry
                .id
                .filter(|id| !id.trim().is_empty())
                .ok_or(ChunkSerError::MissingModDataId)?;
            let Some(bytes) = entry.data else {
                return Err(ChunkSerError::MissingModData(id));
            };
            let array = decode_array(context, &id, &bytes, size)?;
            if extensions.insert(id.clone(), array).is_some() {
                return Err(ChunkSerError::DuplicateModData(id));
            }
        }

        let pos = IVec3::new(x, y, z);
        Ok(ChunkRecord {
            pos,
            chunk_type,
            state,
            data: ChunkData::from_arrays(pos, arrays, extensions, Arc::clone(context)),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChunkSerError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChunkSerError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

impl ChunkRecord {
    /// Serializes the record into message bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ChunkSerError> {
        ChunkMessage::from_record(self)?.to_bytes()
    }

    /// Decodes message bytes produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8], context: &Arc<ChunkContext>) -> Result<Self, ChunkSerError> {
        ChunkMessage::from_bytes(bytes)?.into_record(context)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockRegistry;
    use crate::chunk::Chunk;
    use crate::extensions::ExtensionRegistry;
    use crate::tera::{DENSE4, TeraArrayRegistry};
    use strata_config::BlockDataConfig;

    fn context_with_extension() -> Arc<ChunkContext> {
        let arrays = TeraArrayRegistry::with_defaults();
        let mut extensions = ExtensionRegistry::new();
        extensions.register("growth", DENSE4, None, &arrays).unwrap();
        Arc::new(ChunkContext::new(
            BlockRegistry::with_defaults(),
            arrays,
            extensions,
            &BlockDataConfig::default(),
        ))
    }

    fn sample_message(context: &Arc<ChunkContext>) -> ChunkMessage {
        let chunk = Chunk::new(IVec3::new(2, -1, 5), ChunkType::Stackable, Arc::clone(context));
        chunk.set_state(ChunkState::LightPropagationPending);
        {
            let mut data = chunk.lock();
            data.set_block(IVec3::new(1, 2, 3), context.blocks.id_or_air("dirt"));
            data.set_sunlight(IVec3::new(0, 15, 0), 15).unwrap();
            data.extension_data("growth").unwrap().set(4, 4, 4, 9);
        }
        ChunkMessage::from_record(&ChunkRecord::snapshot(&chunk)).unwrap()
    }

    #[test]
    fn test_record_survives_bytes() {
        let context = context_with_extension();
        let bytes = sample_message(&context).to_bytes().unwrap();
        let record = ChunkRecord::decode(&bytes, &context).unwrap();

        assert_eq!(record.pos, IVec3::new(2, -1, 5));
        assert_eq!(record.chunk_type, ChunkType::Stackable);
        assert_eq!(record.state, ChunkState::LightPropagationPending);
        assert_eq!(
            record.data.get_block(IVec3::new(1, 2, 3)),
            context.blocks.id_or_air("dirt")
        );
        assert_eq!(record.data.get_sunlight(IVec3::new(0, 15, 0)), 15);
        let (id, growth) = record.data.extensions().next().unwrap();
        assert_eq!(id, "growth");
        assert_eq!(growth.get(4, 4, 4), 9);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let context = context_with_extension();
        let mut message = sample_message(&context);
        message.y = None;
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::MissingField("y"))
        ));

        let mut message = sample_message(&context);
        message.light_data = None;
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::MissingField("light_data"))
        ));
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let context = context_with_extension();
        let mut message = sample_message(&context);
        message.chunk_type_id = Some(5);
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::UnknownChunkType(5))
        ));

        let mut message = sample_message(&context);
        message.state_id = Some(9);
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::UnknownState(9))
        ));
    }

    #[test]
    fn test_bad_mod_data_rejected() {
        let context = context_with_extension();
        let mut message = sample_message(&context);
        message.mod_data[0].id = Some("   ".to_string());
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::MissingModDataId)
        ));

        let mut message = sample_message(&context);
        message.mod_data[0].data = None;
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::MissingModData(id)) if id == "growth"
        ));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let context = context_with_extension();
        let mut message = sample_message(&context);
        message.chunk_type_id = Some(ChunkType::Classic.id());
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::SizeMismatch { .. })
        ));
    }

    /// Same field layout as a tera array payload, with any size.
    #[derive(Serialize)]
    struct RawArrayPayload {
        encoding: &'static str,
        size: [u32; 3],
        data: Vec<u8>,
    }

    #[test]
    fn test_oversized_payload_rejected_before_decoding() {
        let context = context_with_extension();
        let tall = postcard::to_allocvec(&RawArrayPayload {
            encoding: "sparse8",
            size: [1, u32::MAX, 1],
            data: vec![0, 0],
        })
        .unwrap();
        let mut message = sample_message(&context);
        message.light_data = Some(tall);
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::SizeMismatch { field, actual, .. })
                if field == "light_data" && actual.y == u32::MAX as usize
        ));

        let cube = postcard::to_allocvec(&RawArrayPayload {
            encoding: "dense16",
            size: [u32::MAX; 3],
            data: vec![],
        })
        .unwrap();
        let mut message = sample_message(&context);
        message.block_data = Some(cube);
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::SizeMismatch { field, .. }) if field == "block_data"
        ));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let context = context_with_extension();
        let mut message = sample_message(&context);
        message.block_data = Some(vec![0xff, 0x01]);
        assert!(matches!(
            message.into_record(&context),
            Err(ChunkSerError::Array { .. })
        ));
        assert!(ChunkMessage::from_bytes(&[0xff; 3]).is_err());
    }
}
