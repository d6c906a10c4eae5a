pub mod dyna_q;
pub mod q_learning;
pub mod rmax;
pub mod sarsa;

pub use dyna_q::DynaQAgent;
pub use q_learning::QLearningAgent;
pub use rmax::RMaxAgent;
pub use sarsa::SarsaAgent;

/// A trait for state and action types that can be used as keys in a [`HashMap`](std::collections::HashMap)
pub trait Hashable: Copy + Eq + std::hash::Hash {}

impl<T> Hashable for T where T: Copy + Eq + std::hash::Hash {}
