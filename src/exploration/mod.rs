use std::{collections::HashMap, hash::Hash};

use rand::{seq::SliceRandom, thread_rng};

use crate::decay::Decay;

/// Exploration policy result
pub enum Choice {
    Explore,
    Exploit,
}

mod epsilon_greedy;
mod softmax;

pub use epsilon_greedy::EpsilonGreedy;
pub use softmax::Softmax;

/// A configured exploration strategy for a tabular agent
pub enum Strategy<D: Decay> {
    EpsilonGreedy(EpsilonGreedy<D>),
    Softmax(Softmax<D>),
}

impl<D: Decay> Strategy<D> {
    /// The exploration rate reported in episode records; softmax has none
    pub fn epsilon(&self, episode: u32) -> f64 {
        match self {
            Self::EpsilonGreedy(eg) => eg.epsilon(episode),
            Self::Softmax(_) => 0.0,
        }
    }

    /// Select an action from `actions` for `state`, consulting the Q-table
    pub fn select<S, A>(
        &self,
        q_table: &HashMap<(S, A), f64>,
        episode: u32,
        state: S,
        actions: &[A],
    ) -> A
    where
        S: Copy + Eq + Hash,
        A: Copy + Eq + Hash,
    {
        match self {
            Self::EpsilonGreedy(eg) => match eg.choose(episode) {
                Choice::Explore => *actions
                    .choose(&mut thread_rng())
                    .expect("There is always at least one action available"),
                Choice::Exploit => greedy(q_table, state, actions),
            },
            Self::Softmax(sm) => {
                let q_values = actions
                    .iter()
                    .map(|&a| q_table.get(&(state, a)).copied().unwrap_or(0.0))
                    .collect::<Vec<_>>();
                actions[sm.choose(episode, &q_values)]
            }
        }
    }
}

/// The action with the highest Q-value for `state`, first on ties
pub fn greedy<S, A>(q_table: &HashMap<(S, A), f64>, state: S, actions: &[A]) -> A
where
    S: Copy + Eq + Hash,
    A: Copy + Eq + Hash,
{
    *actions
        .iter()
        .max_by(|&&a, &&b| {
            let a_value = q_table.get(&(state, a)).copied().unwrap_or(0.0);
            let b_value = q_table.get(&(state, b)).copied().unwrap_or(0.0);
            a_value.partial_cmp(&b_value).unwrap()
        })
        .expect("There is always at least one action available")
}

#[cfg(test)]
mod tests {
    use crate::decay;

    use super::*;

    #[test]
    fn greedy_picks_max_and_breaks_ties_first() {
        let mut q = HashMap::new();
        q.insert((0, 'a'), 1.0);
        q.insert((0, 'b'), 2.0);
        assert_eq!(greedy(&q, 0, &['a', 'b', 'c']), 'b');
        assert_eq!(greedy(&q, 1, &['a', 'b', 'c']), 'a', "all zero, first wins");
    }

    #[test]
    fn strategy_exploits_when_epsilon_zero() {
        let mut q = HashMap::new();
        q.insert((0, 'a'), -1.0);
        q.insert((0, 'b'), 3.0);
        let strategy = Strategy::EpsilonGreedy(EpsilonGreedy::new(decay::Constant::new(0.0)));
        for episode in 0..10 {
            assert_eq!(strategy.select(&q, episode, 0, &['a', 'b']), 'b');
        }
    }

    #[test]
    fn softmax_strategy_selects_legal_action() {
        let q = HashMap::from([((0, 'a'), 0.5), ((0, 'b'), 0.1)]);
        let strategy = Strategy::Softmax(Softmax::new(decay::Constant::new(1.0)));
        let action = strategy.select(&q, 0, 0, &['a', 'b']);
        assert!(['a', 'b'].contains(&action));
    }
}
