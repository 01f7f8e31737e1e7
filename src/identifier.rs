mod durable_id;
mod resolver;

pub use durable_id::{ContainerGuid, DurableId, IdentifierKind};
pub use resolver::Resolver;
