use std::collections::HashMap;

use rand::{seq::IteratorRandom, thread_rng};

use crate::{
    agent::{Actor, Hyperparams, TabularAgent},
    assert_interval, decay,
    decay::Decay,
    exploration::{greedy, EpsilonGreedy, Strategy},
    snapshot::{AgentSnapshot, AlgoState, SNAPSHOT_VERSION},
};

use super::Hashable;

/// Configuration for the [`DynaQAgent`]
pub struct DynaQConfig<D: Decay = decay::Exponential> {
    pub name: String,
    pub exploration: Strategy<D>,
    pub alpha: f64,
    pub gamma: f64,
    /// Simulated updates replayed from the model after each real update
    pub lookahead: u32,
}

impl Default for DynaQConfig {
    fn default() -> Self {
        Self {
            name: "DynaQ".into(),
            exploration: Strategy::EpsilonGreedy(EpsilonGreedy::new(
                decay::Exponential::new(1e-3, 1.0, 0.01).unwrap(),
            )),
            alpha: 0.5,
            gamma: 0.9,
            lookahead: 10,
        }
    }
}

/// A Q-learning agent that also learns a deterministic model of the
/// environment and replays simulated experience from it
///
/// After every real update, `lookahead` previously observed state-action
/// pairs are sampled uniformly from the model and given ordinary Q-learning
/// backups, which spreads credit far faster than real steps alone.
pub struct DynaQAgent<S, A, D = decay::Exponential>
where
    S: Hashable,
    A: Hashable,
    D: Decay,
{
    name: String,
    actions: Vec<A>,
    q_table: HashMap<(S, A), f64>,
    model: HashMap<(S, A), (f64, S)>,
    exploration: Strategy<D>,
    alpha: f64,
    gamma: f64,
    lookahead: u32,
    prev: Option<(S, A)>,
    episode: u32,
    step_number: u32,
}

impl<S, A, D> DynaQAgent<S, A, D>
where
    S: Hashable,
    A: Hashable,
    D: Decay,
{
    /// **Panics** if `alpha` or `gamma` is not in the interval `[0,1]`
    pub fn new(actions: Vec<A>, config: DynaQConfig<D>) -> Self {
        assert_interval!(config.alpha, 0.0, 1.0);
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            name: config.name,
            actions,
            q_table: HashMap::new(),
            model: HashMap::new(),
            exploration: config.exploration,
            alpha: config.alpha,
            gamma: config.gamma,
            lookahead: config.lookahead,
            prev: None,
            episode: 0,
            step_number: 0,
        }
    }

    fn max_q(&self, state: S) -> f64 {
        self.actions
            .iter()
            .map(|&a| self.q_table.get(&(state, a)).copied().unwrap_or(0.0))
            .max_by(|a, b| a.partial_cmp(b).unwrap())
            .unwrap_or(0.0)
    }

    fn backup(&mut self, state: S, action: A, reward: f64, next_state: S) {
        let q_value = self.q_table.get(&(state, action)).copied().unwrap_or(0.0);
        let update =
            q_value + self.alpha * (reward + self.gamma * self.max_q(next_state) - q_value);
        self.q_table.insert((state, action), update);
    }

    /// Replay `lookahead` simulated transitions from the model
    fn plan(&mut self) {
        for _ in 0..self.lookahead {
            let Some(&key) = self.model.keys().choose(&mut thread_rng()) else {
                return;
            };
            let (reward, next_state) = self.model[&key];
            self.backup(key.0, key.1, reward, next_state);
        }
    }
}

impl<S, A> DynaQAgent<S, A, decay::Constant>
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
        model: Vec<(S, A, f64, S)>,
    ) -> Self {
        let mut agent = Self::new(
            actions,
            DynaQConfig {
                name,
                exploration: Strategy::EpsilonGreedy(EpsilonGreedy::new(decay::Constant::new(
                    hp.epsilon,
                ))),
                alpha: hp.alpha,
                gamma: hp.gamma,
                lookahead: hp.lookahead,
            },
        );
        agent.q_table = q.into_iter().map(|(s, a, v)| ((s, a), v)).collect();
        agent.model = model
            .into_iter()
            .map(|(s, a, r, s2)| ((s, a), (r, s2)))
            .collect();
        agent
    }
}

impl<S, A, D> Actor<S, A> for DynaQAgent<S, A, D>
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

impl<S, A, D> TabularAgent<S, A> for DynaQAgent<S, A, D>
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
            lookahead: self.lookahead,
            ..Default::default()
        }
    }

    fn steps(&self) -> u32 {
        self.step_number
    }

    fn update(&mut self, state: S, action: A, reward: f64) {
        if let Some((prev_state, prev_action)) = self.prev {
            self.backup(prev_state, prev_action, reward, state);
            self.model.insert((prev_state, prev_action), (reward, state));
            self.step_number += 1;
            self.plan();
        }
        self.prev = Some((state, action));
    }

    fn reset(&mut self) {
        self.q_table.clear();
        self.model.clear();
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
        self.max_q(state)
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
            algo: AlgoState::DynaQ {
                q: self.q_entries(),
                model: self
                    .model
                    .iter()
                    .map(|(&(s, a), &(r, s2))| (s, a, r, s2))
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(lookahead: u32) -> DynaQAgent<u8, u8, decay::Constant> {
        DynaQAgent::new(
            vec![0, 1],
            DynaQConfig {
                name: "DynaQ".into(),
                exploration: Strategy::EpsilonGreedy(EpsilonGreedy::new(decay::Constant::new(0.0))),
                alpha: 0.5,
                gamma: 1.0,
                lookahead,
            },
        )
    }

    #[test]
    fn planning_replays_observed_transitions() {
        let mut agent = agent(100);
        agent.update(0, 0, 0.0);
        agent.update(1, 0, 1.0);
        // the single modeled transition (0,0) -> (1.0, 1) is replayed 100
        // times with alpha 0.5, driving q(0,0) toward 1
        assert!(agent.q_value(0, 0) > 0.9);
    }

    #[test]
    fn zero_lookahead_matches_plain_q_learning() {
        let mut agent = agent(0);
        agent.update(0, 1, 0.0);
        agent.update(1, 0, 2.0);
        assert_eq!(agent.q_value(0, 1), 1.0);
    }

    #[test]
    fn snapshot_round_trip_preserves_queries() {
        let mut agent = agent(5);
        agent.update(0, 0, 0.0);
        agent.update(1, 1, 2.0);
        agent.update(0, 1, -1.0);

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
