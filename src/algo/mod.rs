pub mod tabular;

pub use tabular::{DynaQAgent, QLearningAgent, RMaxAgent, SarsaAgent};
