/// The result of advancing an environment by one action
///
/// Carries the state observed after the transition so that terminal states
/// remain addressable by the caller (for a final agent update or a render).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step<S> {
    /// The state of the environment after the action was taken
    pub state: S,
    /// The reward received for the transition
    pub reward: f64,
    /// Whether the transition ended the episode
    pub done: bool,
}

/// Represents a Markov decision process, defining the dynamics of an environment
/// in which an agent can operate.
///
/// This base trait represents the common case of a discrete-time MDP with one agent
/// and a finite state space and action space.
pub trait Environment {
    /// A representation of the state of the environment to be passed to an agent
    type State;

    /// A representation of an action that an agent can take to affect the environment
    type Action;

    /// A short identifier used in log lines and output filenames
    fn name(&self) -> &str;

    /// Get the current state without advancing the environment
    fn state(&self) -> Self::State;

    /// Determine if the current state is active or terminal
    fn is_active(&self) -> bool;

    /// Update the environment in response to an action taken by an agent,
    /// producing a new state and associated reward
    fn step(&mut self, action: Self::Action) -> Step<Self::State>;

    /// Reset the environment to an initial state
    ///
    /// **Returns** the state
    fn reset(&mut self) -> Self::State;

    /// Sample a random action legal in the current state
    fn random_action(&self) -> Self::Action;
}

/// An environment with a finite action space
pub trait DiscreteActionSpace: Environment {
    /// Get the available actions for the current state
    ///
    /// The returned vector is never empty, instead an action that represents
    /// doing nothing is specified if necessary.
    fn actions(&self) -> Vec<Self::Action>;
}

/// An environment with a finite, enumerable state space
pub trait DiscreteStateSpace: Environment {
    /// Enumerate every reachable state, for displays and dumps
    fn states(&self) -> Vec<Self::State>;
}
