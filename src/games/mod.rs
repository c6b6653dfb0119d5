pub mod multiplier;
pub mod policy;
pub mod random;
pub mod round;
pub mod types;

pub use multiplier::MultiplierPolicy;
pub use policy::{minimum_moves, TerminationPolicy};
pub use random::{OsRandom, RandomSource, SeededRandom};
pub use round::Round;
pub use types::*;
