use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    agent::{Hyperparams, TabularAgent},
    algo::tabular::{DynaQAgent, Hashable, QLearningAgent, RMaxAgent, SarsaAgent},
};

/// Current version of the snapshot schema
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {found}, expected {SNAPSHOT_VERSION}")]
    Version { found: u32 },
}

fn check_version(found: u32) -> Result<(), SnapshotError> {
    (found == SNAPSHOT_VERSION)
        .then_some(())
        .ok_or(SnapshotError::Version { found })
}

/// Everything an agent has learned, in a structured, versioned form.
///
/// Q-tables and models are stored as entry lists because JSON objects
/// cannot key on composite `(state, action)` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot<S, A> {
    pub version: u32,
    pub name: String,
    pub actions: Vec<A>,
    pub hyperparams: Hyperparams,
    pub algo: AlgoState<S, A>,
}

/// The algorithm-specific tables of an [`AgentSnapshot`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AlgoState<S, A> {
    QLearning {
        q: Vec<(S, A, f64)>,
    },
    Sarsa {
        q: Vec<(S, A, f64)>,
    },
    RMax {
        q: Vec<(S, A, f64)>,
        counts: Vec<(S, A, u32)>,
        reward_sums: Vec<(S, A, f64)>,
        transitions: Vec<(S, A, S, u32)>,
    },
    DynaQ {
        q: Vec<(S, A, f64)>,
        model: Vec<(S, A, f64, S)>,
    },
}

impl<S, A> AgentSnapshot<S, A>
where
    S: Hashable + 'static,
    A: Hashable + 'static,
{
    /// Rebuild a live agent from the snapshot
    pub fn restore(self) -> Result<Box<dyn TabularAgent<S, A>>, SnapshotError> {
        check_version(self.version)?;
        let Self {
            name,
            actions,
            hyperparams,
            algo,
            ..
        } = self;
        Ok(match algo {
            AlgoState::QLearning { q } => {
                Box::new(QLearningAgent::from_parts(name, actions, hyperparams, q))
            }
            AlgoState::Sarsa { q } => {
                Box::new(SarsaAgent::from_parts(name, actions, hyperparams, q))
            }
            AlgoState::RMax {
                q,
                counts,
                reward_sums,
                transitions,
            } => Box::new(RMaxAgent::from_parts(
                name,
                actions,
                hyperparams,
                q,
                counts,
                reward_sums,
                transitions,
            )),
            AlgoState::DynaQ { q, model } => {
                Box::new(DynaQAgent::from_parts(name, actions, hyperparams, q, model))
            }
        })
    }
}

/// A versioned wrapper around a serialized environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSnapshot<E> {
    pub version: u32,
    pub env: E,
}

impl<E> EnvSnapshot<E> {
    pub fn of(env: &E) -> Self
    where
        E: Clone,
    {
        Self {
            version: SNAPSHOT_VERSION,
            env: env.clone(),
        }
    }

    /// Unwrap the environment, verifying the schema version
    pub fn into_env(self) -> Result<E, SnapshotError> {
        check_version(self.version)?;
        Ok(self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_is_rejected() {
        let snapshot = EnvSnapshot {
            version: SNAPSHOT_VERSION + 1,
            env: 0u8,
        };
        assert_eq!(
            snapshot.into_env(),
            Err(SnapshotError::Version {
                found: SNAPSHOT_VERSION + 1
            })
        );
    }

    #[test]
    fn env_snapshot_json_round_trip() {
        let snapshot = EnvSnapshot::of(&(3i32, 4i32));
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: EnvSnapshot<(i32, i32)> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_env().unwrap(), (3, 4));
    }
}
