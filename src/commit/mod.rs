pub mod apply;
pub mod queue;

pub use apply::{ApplyLimits, apply_mutation, apply_mutations};
pub use queue::{Batch, Mutation, MutationQueue, Predicate, Target, Transform};
