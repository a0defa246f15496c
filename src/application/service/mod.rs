//! Generic entity services.
//!
//! [`BaseService`] provides validated CRUD, listing and search over one table.
//! [`CacheableService`] wraps it with a read-through cache and the generic
//! junction-table relation resolver. Concrete services are type aliases over
//! an [`EntityDefinition`].

mod base;
mod cacheable;
mod definition;

pub use base::BaseService;
pub use cacheable::CacheableService;
pub use definition::EntityDefinition;
