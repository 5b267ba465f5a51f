pub mod config;
pub mod db;
pub mod handle;
pub mod memdb;
pub mod prefixed;
pub mod serializer;
pub mod staged;
pub mod vm;

pub use config::StateConfig;
pub use db::{BatchOp, Database, SledDb};
pub use handle::VertexHandle;
pub use memdb::MemoryDb;
pub use prefixed::{VertexBatch, VertexState};
pub use serializer::{Context, Serializer};
pub use staged::{StagedStore, WriteBatch};
pub use vm::{DagVm, RawTx, RawVm, Tx};
