//! Request extractors.

mod caller;
pub use caller::{Caller, ACTOR_ID_HEADER, TENANT_ID_HEADER, TENANT_SCOPE_KEY};
