use serde::{Deserialize, Serialize};

use crate::{algo::tabular::Hashable, snapshot::AgentSnapshot};

/// Anything that can choose an action for a state: a learning agent or a
/// human at the keyboard. The episodic runner is generic over this contract,
/// so decision sources are freely substitutable.
pub trait Actor<S, A> {
    /// Choose one of the legal `actions` for `state`
    fn act(&mut self, state: S, actions: &[A]) -> A;
}

/// Hyperparameters reported by every agent, one column each in the episode
/// record. Agents leave the fields they do not use at their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hyperparams {
    /// Learning rate
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Exploration rate
    pub epsilon: f64,
    /// Optimistic reward bound (R-MAX)
    pub rmax: f64,
    /// Known-ness visit threshold (R-MAX)
    pub u_count: u32,
    /// Planning depth (R-MAX, Dyna-Q)
    pub lookahead: u32,
}

/// A tabular agent: learns from `(state, action, reward)` observations and
/// answers value/policy/Q queries over its tables.
///
/// ### Update contract
/// The runner calls [`update`](TabularAgent::update) with the state it just
/// observed, the action it chose *in* that state, and the reward produced by
/// the transition *into* that state. Agents track the previous state-action
/// pair internally; the first call of an episode only primes that pair.
pub trait TabularAgent<S, A>: Actor<S, A>
where
    S: Hashable,
    A: Hashable,
{
    /// The agent's identifier, used in log lines and output filenames
    fn name(&self) -> &str;

    /// The hyperparameters to record with each episode
    fn hyperparams(&self) -> Hyperparams;

    /// Learning updates applied so far in the current episode
    fn steps(&self) -> u32;

    /// Observe a transition; see the trait docs for the call contract
    fn update(&mut self, state: S, action: A, reward: f64);

    /// Discard all learned state, for a fresh run
    fn reset(&mut self);

    /// Start a new episode: clear the previous state-action pair and advance
    /// the episode counter used by exploration schedules
    fn reset_episode(&mut self);

    /// The value of `state` under the greedy policy
    fn value(&self, state: S) -> f64;

    /// The greedy action for `state`, first action on ties
    fn policy(&self, state: S) -> A;

    /// The learned Q-value for `(state, action)`
    fn q_value(&self, state: S, action: A) -> f64;

    /// The full Q-table as `(state, action, value)` entries, for dumps
    fn q_entries(&self) -> Vec<(S, A, f64)>;

    /// A versioned, structured snapshot of everything the agent has learned
    fn snapshot(&self) -> AgentSnapshot<S, A>;
}
