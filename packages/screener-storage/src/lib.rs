pub mod cache;
pub mod memory;
pub mod pg;
pub mod pipeline;
pub mod schema;
pub mod store;

mod error;

pub use cache::{ConnectionCache, Connector, FixedConnector, PgConnector};
pub use error::Error;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use pipeline::{Emit, Filter, Pipeline, Stage};
pub use store::{BoxFuture, DocumentStore, bounded};

pub type Result<T, E = Error> = std::result::Result<T, E>;
