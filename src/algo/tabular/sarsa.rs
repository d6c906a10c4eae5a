use std::collections::HashMap;

use crate::{
    agent::{Actor, Hyperparams, TabularAgent},
    assert_interval, decay,
    decay::Decay,
    exploration::{greedy, EpsilonGreedy, Strategy},
    snapshot::{AgentSnapshot, AlgoState, SNAPSHOT_VERSION},
};

use super::Hashable;

/// Configuration for the [`SarsaAgent`]
pub struct SarsaConfig<D: Decay = decay::Exponential> {
    pub name: String,
    pub exploration: Strategy<D>,
    pub alpha: f64,
    pub gamma: f64,
}

impl Default for SarsaConfig {
    fn default() -> Self {
        Self {
            name: "Sarsa".into(),
            exploration: Strategy::EpsilonGreedy(EpsilonGreedy::new(
                decay::Exponential::new(1e-3, 1.0, 0.01).unwrap(),
            )),
            alpha: 0.5,
            gamma: 0.9,
        }
    }
}

/// An on-policy temporal-difference agent
///
/// Unlike [`QLearningAgent`](super::QLearningAgent), the update target uses
/// the Q-value of the action the agent actually chose next, not the maximum.
pub struct SarsaAgent<S, A, D = decay::Exponential>
where
    S: Hashable,
    A: Hashable,
    D: Decay,
{
    name: String,
    actions: Vec<A>,
    q_table: HashMap<(S, A), f64>,
    exploration: Strategy<D>,
    alpha: f64,
    gamma: f64,
    prev: Option<(S, A)>,
    episode: u32,
    step_number: u32,
}

impl<S, A, D> SarsaAgent<S, A, D>
where
    S: Hashable,
    A: Hashable,
    D: Decay,
{
    /// **Panics** if `alpha` or `gamma` is not in the interval `[0,1]`
    pub fn new(actions: Vec<A>, config: SarsaConfig<D>) -> Self {
        assert_interval!(config.alpha, 0.0, 1.0);
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            name: config.name,
            actions,
            q_table: HashMap::new(),
            exploration: config.exploration,
            alpha: config.alpha,
            gamma: config.gamma,
            prev: None,
            episode: 0,
            step_number: 0,
        }
    }
}

impl<S, A> SarsaAgent<S, A, decay::Constant>
where
    S: Hashable,
    A: Hashable,
{
    /// Rebuild an agent from snapshot parts, with a constant exploration rate
    pub(crate) fn from_parts(
        name: String,
        actions: Vec<A>,
        hp: Hyperparams,
        q: Vec<(S, A, f64)>,
    ) -> Self {
        let mut agent = Self::new(
            actions,
            SarsaConfig {
                name,
                exploration: Strategy::EpsilonGreedy(EpsilonGreedy::new(decay::Constant::new(
                    hp.epsilon,
                ))),
                alpha: hp.alpha,
                gamma: hp.gamma,
            },
        );
        agent.q_table = q.into_iter().map(|(s, a, v)| ((s, a), v)).collect();
        agent
    }
}

impl<S, A, D> Actor<S, A> for SarsaAgent<S, A, D>
where
    S: Hashable,
    A: Hashable,
    D: Decay,
{
    fn act(&mut self, state: S, actions: &[A]) -> A {
        self.exploration
            .select(&self.q_table, self.episode, state, actions)
    }
}

impl<S, A, D> TabularAgent<S, A> for SarsaAgent<S, A, D>
where
    S: Hashable,
    A: Hashable,
    D: Decay,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn hyperparams(&self) -> Hyperparams {
        Hyperparams {
            alpha: self.alpha,
            gamma: self.gamma,
            epsilon: self.exploration.epsilon(self.episode),
            ..Default::default()
        }
    }

    fn steps(&self) -> u32 {
        self.step_number
    }

    fn update(&mut self, state: S, action: A, reward: f64) {
        if let Some((prev_state, prev_action)) = self.prev {
            let q_value = self
                .q_table
                .get(&(prev_state, prev_action))
                .copied()
                .unwrap_or(0.0);
            let next_q_value = self.q_table.get(&(state, action)).copied().unwrap_or(0.0);
            let update = q_value + self.alpha * (reward + self.gamma * next_q_value - q_value);
            self.q_table.insert((prev_state, prev_action), update);
            self.step_number += 1;
        }
        self.prev = Some((state, action));
    }

    fn reset(&mut self) {
        self.q_table.clear();
        self.prev = None;
        self.episode = 0;
        self.step_number = 0;
    }

    fn reset_episode(&mut self) {
        self.prev = None;
        self.step_number = 0;
        self.episode += 1;
    }

    fn value(&self, state: S) -> f64 {
        self.actions
            .iter()
            .map(|&a| self.q_value(state, a))
            .max_by(|a, b| a.partial_cmp(b).unwrap())
            .unwrap_or(0.0)
    }

    fn policy(&self, state: S) -> A {
        greedy(&self.q_table, state, &self.actions)
    }

    fn q_value(&self, state: S, action: A) -> f64 {
        self.q_table.get(&(state, action)).copied().unwrap_or(0.0)
    }

    fn q_entries(&self) -> Vec<(S, A, f64)> {
        self.q_table
            .iter()
            .map(|(&(s, a), &v)| (s, a, v))
            .collect()
    }

    fn snapshot(&self) -> AgentSnapshot<S, A> {
        AgentSnapshot {
            version: SNAPSHOT_VERSION,
            name: self.name.clone(),
            actions: self.actions.clone(),
            hyperparams: self.hyperparams(),
            algo: AlgoState::Sarsa {
                q: self.q_entries(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greedy_agent() -> SarsaAgent<u8, u8, decay::Constant> {
        SarsaAgent::new(
            vec![0, 1],
            SarsaConfig {
                name: "Sarsa".into(),
                exploration: Strategy::EpsilonGreedy(EpsilonGreedy::new(decay::Constant::new(0.0))),
                alpha: 0.5,
                gamma: 1.0,
            },
        )
    }

    #[test]
    fn update_targets_chosen_action() {
        let mut agent = greedy_agent();
        // seed q(1,1) = 2 so the max and the chosen action disagree
        agent.update(1, 1, 0.0);
        agent.update(2, 0, 4.0);
        agent.reset_episode();

        agent.update(0, 1, 0.0);
        agent.update(1, 0, 1.0);
        // q(0,1) <- 0 + 0.5 * (1 + q(1,0) - 0) = 0.5; q-learning would use
        // max_a q(1,a) = 2 and produce 1.5
        assert_eq!(agent.q_value(0, 1), 0.5);
    }

    #[test]
    fn snapshot_round_trip_preserves_queries() {
        let mut agent = greedy_agent();
        agent.update(0, 0, 0.0);
        agent.update(1, 1, 3.0);

        let json = serde_json::to_string(&agent.snapshot()).unwrap();
        let snapshot: AgentSnapshot<u8, u8> = serde_json::from_str(&json).unwrap();
        let restored = snapshot.restore().unwrap();

        for state in [0, 1] {
            assert_eq!(restored.value(state), agent.value(state));
            assert_eq!(restored.policy(state), agent.policy(state));
            for action in [0, 1] {
                assert_eq!(restored.q_value(state, action), agent.q_value(state, action));
            }
        }
    }
}
