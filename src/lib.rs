// src/lib.rs
pub use cedar::CedarDocument;
pub use cel::CelMapper;
pub use error::PolicyError;
pub use filter::Expression;
pub use mapper::{CedarMapperOptions, CedarPolicyMapper, GcpBindingMapper};
pub use names::{AttributeNameMapper, NameMapperBuilder};
pub use provider::{CedarProvider, GcpProvider};
pub use store::{InMemoryPolicyStore, PolicyStore};
pub use traits::PolicyMapper;
pub use types::{
    Binding, BindingCondition, ConditionAction, ConditionInfo, GcpBindAssignment, MetaInfo,
    Policies, PolicyInfo,
};

pub mod cedar;
pub mod cel;
mod error;
pub mod filter;
pub mod mapper;
mod names;
mod provider;
mod store;
mod traits;
pub mod types;

#[cfg(test)]
mod tests;
