//! Dictionary-encoded column codec: wire format and session state machines
//! for serializing a dictionary-encoded column as a keys stream (distinct
//! values) plus an indexes stream (per-row references).

pub mod binary;
pub mod data_type;
pub mod deserialize;
pub mod index_type;
pub mod serialize;
pub mod stream;

pub use data_type::{DataType, DictionaryDataType};
pub use deserialize::DeserializeState;
pub use index_type::{IndexType, KeysVersion};
pub use serialize::SerializeState;
pub use stream::{
    DeserializeSettings, ReadStream, ReadStreamSource, SerializeSettings, Substream,
    SubstreamPath, WriteStreamSource,
};

#[cfg(test)]
mod tests;
