use std::{
    fmt::{Debug, Display},
    fs,
    path::PathBuf,
};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::{
    agent::{Actor, TabularAgent},
    algo::tabular::Hashable,
    env::{DiscreteActionSpace, Environment},
    snapshot::EnvSnapshot,
};

/// Configuration for a run of episodes
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Per-episode timestep limit
    pub steps: u32,
    /// Episodes per run
    pub episodes: u32,
    /// Runs; each gets a fresh agent and its own output files, and the run
    /// index is recorded as the `seed` column
    pub seeds: u32,
    /// Wait for a key press after every rendered step
    pub pause: bool,
    /// Where tables and snapshots are written
    pub out_dir: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            steps: 50,
            episodes: 100,
            seeds: 1,
            pause: false,
            out_dir: "out".into(),
        }
    }
}

/// One row of the persisted episode table
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeRecord {
    pub episode: u32,
    pub timestep: u32,
    pub cumulative_reward: f64,
    pub seed: u32,
    pub agent: String,
    pub env: String,
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    pub rmax: f64,
    pub u_count: u32,
    pub lookahead: u32,
}

/// Where actions come from during a run
pub enum Decision<'a, S, A> {
    /// The learning agent chooses its own actions
    Agent,
    /// Another actor chooses (e.g. a human); the agent still learns
    Manual(&'a mut dyn Actor<S, A>),
}

impl<S: Hashable, A: Hashable> Decision<'_, S, A> {
    fn act(&mut self, agent: &mut dyn TabularAgent<S, A>, state: S, actions: &[A]) -> A {
        match self {
            Decision::Agent => agent.act(state, actions),
            Decision::Manual(actor) => actor.act(state, actions),
        }
    }
}

/// Per-step observer of a run: a renderer, or nothing
pub trait Monitor<E>
where
    E: Environment,
    E::State: Hashable,
    E::Action: Hashable,
{
    /// Called with the state just observed, before the next action is chosen
    fn on_step(
        &mut self,
        env: &E,
        agent: &dyn TabularAgent<E::State, E::Action>,
        state: E::State,
    ) -> Result<()>;

    /// Block until the user confirms continuing; only called when
    /// [`ExperimentConfig::pause`] is set
    fn pause(&mut self) -> Result<()>;
}

/// A monitor that does nothing, for quiet batch runs
pub struct NullMonitor;

impl<E> Monitor<E> for NullMonitor
where
    E: Environment,
    E::State: Hashable,
    E::Action: Hashable,
{
    fn on_step(
        &mut self,
        _env: &E,
        _agent: &dyn TabularAgent<E::State, E::Action>,
        _state: E::State,
    ) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Run `cfg.episodes` episodes of `agent` in `env` and persist the results.
///
/// Each episode: reset the environment and the agent's per-episode state,
/// choose an initial action and prime the agent with it, then step until the
/// limit or a terminal transition. A terminal transition gets exactly one
/// additional agent update before the episode ends.
///
/// Returns the episode records that were also written to disk.
pub fn run_episodes<E>(
    env: &mut E,
    agent: &mut dyn TabularAgent<E::State, E::Action>,
    decision: &mut Decision<E::State, E::Action>,
    monitor: &mut dyn Monitor<E>,
    cfg: &ExperimentConfig,
    seed: u32,
) -> Result<Vec<EpisodeRecord>>
where
    E: Environment + DiscreteActionSpace + Serialize + Clone,
    E::State: Hashable + Debug + Serialize,
    E::Action: Hashable + Display + Serialize,
{
    let mut records = Vec::with_capacity(cfg.episodes as usize);
    for episode in 0..cfg.episodes {
        env.reset();
        agent.reset_episode();
        let mut cumulative_reward = 0.0;

        let mut state = env.state();
        let mut action = decision.act(agent, state, &env.actions());
        agent.update(state, action, 0.0);
        monitor.on_step(env, &*agent, state)?;
        if cfg.pause {
            monitor.pause()?;
        }

        for _t in 1..cfg.steps {
            let step = env.step(action);
            cumulative_reward += step.reward;
            state = step.state;

            monitor.on_step(env, &*agent, state)?;
            if cfg.pause {
                monitor.pause()?;
            }

            action = decision.act(agent, state, &env.actions());
            agent.update(state, action, step.reward);

            if step.done {
                agent.update(state, action, step.reward);
                break;
            }
        }

        debug!(
            "episode {episode:04}: {} steps, cumulative reward {cumulative_reward}",
            agent.steps()
        );
        let hp = agent.hyperparams();
        records.push(EpisodeRecord {
            episode,
            timestep: agent.steps(),
            cumulative_reward,
            seed,
            agent: agent.name().to_owned(),
            env: env.name().to_owned(),
            alpha: hp.alpha,
            gamma: hp.gamma,
            epsilon: hp.epsilon,
            rmax: hp.rmax,
            u_count: hp.u_count,
            lookahead: hp.lookahead,
        });
    }

    persist(env, &*agent, &records, cfg, seed)?;
    Ok(records)
}

/// Run [`run_episodes`] once per seed, resetting the agent's long-term
/// state in between
pub fn run_seeds<E>(
    env: &mut E,
    agent: &mut dyn TabularAgent<E::State, E::Action>,
    decision: &mut Decision<E::State, E::Action>,
    monitor: &mut dyn Monitor<E>,
    cfg: &ExperimentConfig,
) -> Result<()>
where
    E: Environment + DiscreteActionSpace + Serialize + Clone,
    E::State: Hashable + Debug + Serialize,
    E::Action: Hashable + Display + Serialize,
{
    info!("Running experiment: {} in {}", agent.name(), env.name());
    for seed in 0..cfg.seeds {
        agent.reset();
        info!("-------- new seed: {seed:02} starts --------");
        run_episodes(env, agent, decision, monitor, cfg, seed)?;
    }
    Ok(())
}

/// Write the episode table, a Q-table dump, and agent/environment snapshots
fn persist<E>(
    env: &E,
    agent: &dyn TabularAgent<E::State, E::Action>,
    records: &[EpisodeRecord],
    cfg: &ExperimentConfig,
    seed: u32,
) -> Result<()>
where
    E: Environment + Serialize + Clone,
    E::State: Hashable + Debug + Serialize,
    E::Action: Hashable + Display + Serialize,
{
    fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("creating {}", cfg.out_dir.display()))?;
    let stem = format!("{}_{}_{}_fin", agent.name(), env.name(), seed);

    let table_path = cfg.out_dir.join(format!("{stem}.csv"));
    let mut wtr = csv::Writer::from_path(&table_path)
        .with_context(|| format!("writing {}", table_path.display()))?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;

    let mut q_wtr = csv::Writer::from_path(cfg.out_dir.join(format!("q_{stem}.csv")))?;
    q_wtr.write_record(["state", "action", "q"])?;
    for (state, action, q) in agent.q_entries() {
        q_wtr.write_record([format!("{state:?}"), action.to_string(), q.to_string()])?;
    }
    q_wtr.flush()?;

    let agent_path = cfg.out_dir.join(format!("{stem}.json"));
    serde_json::to_writer_pretty(fs::File::create(&agent_path)?, &agent.snapshot())?;

    let env_path = cfg.out_dir.join(format!("mdp_{stem}.json"));
    serde_json::to_writer_pretty(fs::File::create(&env_path)?, &EnvSnapshot::of(env))?;

    info!("run {seed} persisted under {}", cfg.out_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use tempdir::TempDir;

    use crate::{
        agent::Hyperparams,
        algo::tabular::q_learning::{QLearningAgent, QLearningConfig},
        decay,
        env::Step,
        exploration::{EpsilonGreedy, Strategy},
        snapshot::{AgentSnapshot, AlgoState, SNAPSHOT_VERSION},
    };

    use super::*;

    /// Two states, deterministic toggle transitions, rewards 1, 2, 3, ...
    #[derive(Clone, Serialize)]
    struct TwoState {
        pos: u8,
        step_count: u32,
        terminal_at: Option<u32>,
    }

    impl TwoState {
        fn new(terminal_at: Option<u32>) -> Self {
            Self {
                pos: 0,
                step_count: 0,
                terminal_at,
            }
        }
    }

    impl Environment for TwoState {
        type State = u8;
        type Action = u8;

        fn name(&self) -> &str {
            "twostate"
        }

        fn state(&self) -> u8 {
            self.pos
        }

        fn is_active(&self) -> bool {
            self.terminal_at != Some(self.step_count)
        }

        fn step(&mut self, _action: u8) -> Step<u8> {
            self.step_count += 1;
            self.pos ^= 1;
            Step {
                state: self.pos,
                reward: self.step_count as f64,
                done: self.terminal_at == Some(self.step_count),
            }
        }

        fn reset(&mut self) -> u8 {
            self.pos = 0;
            self.step_count = 0;
            self.pos
        }

        fn random_action(&self) -> u8 {
            0
        }
    }

    impl DiscreteActionSpace for TwoState {
        fn actions(&self) -> Vec<u8> {
            vec![0, 1]
        }
    }

    /// Counts calls instead of learning
    struct CountingAgent {
        updates: u32,
    }

    impl Actor<u8, u8> for CountingAgent {
        fn act(&mut self, _state: u8, _actions: &[u8]) -> u8 {
            0
        }
    }

    impl TabularAgent<u8, u8> for CountingAgent {
        fn name(&self) -> &str {
            "counting"
        }

        fn hyperparams(&self) -> Hyperparams {
            Hyperparams::default()
        }

        fn steps(&self) -> u32 {
            self.updates
        }

        fn update(&mut self, _state: u8, _action: u8, _reward: f64) {
            self.updates += 1;
        }

        fn reset(&mut self) {
            self.updates = 0;
        }

        fn reset_episode(&mut self) {}

        fn value(&self, _state: u8) -> f64 {
            0.0
        }

        fn policy(&self, _state: u8) -> u8 {
            0
        }

        fn q_value(&self, _state: u8, _action: u8) -> f64 {
            0.0
        }

        fn q_entries(&self) -> Vec<(u8, u8, f64)> {
            vec![]
        }

        fn snapshot(&self) -> AgentSnapshot<u8, u8> {
            AgentSnapshot {
                version: SNAPSHOT_VERSION,
                name: "counting".into(),
                actions: vec![0],
                hyperparams: Hyperparams::default(),
                algo: AlgoState::QLearning { q: vec![] },
            }
        }
    }

    fn greedy_q_agent() -> QLearningAgent<u8, u8, decay::Constant> {
        QLearningAgent::new(
            vec![0, 1],
            QLearningConfig {
                name: "QLearning".into(),
                exploration: Strategy::EpsilonGreedy(EpsilonGreedy::new(decay::Constant::new(0.0))),
                alpha: 0.5,
                gamma: 0.9,
            },
        )
    }

    #[test]
    fn step_limit_bounds_episode() {
        let out = TempDir::new("experiment").unwrap();
        let mut env = TwoState::new(None);
        let mut agent = greedy_q_agent();
        let cfg = ExperimentConfig {
            steps: 5,
            episodes: 1,
            seeds: 1,
            pause: false,
            out_dir: out.path().into(),
        };

        let records = run_episodes(
            &mut env,
            &mut agent,
            &mut Decision::Agent,
            &mut NullMonitor,
            &cfg,
            0,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.timestep <= 5);
        // 4 steps with rewards 1 + 2 + 3 + 4
        assert_eq!(record.cumulative_reward, 10.0);
        assert_eq!(record.seed, 0);
        assert_eq!(record.agent, "QLearning");
        assert_eq!(record.env, "twostate");
    }

    #[test]
    fn terminal_transition_gets_one_extra_update() {
        let out = TempDir::new("experiment").unwrap();
        let mut env = TwoState::new(Some(2));
        let mut agent = CountingAgent { updates: 0 };
        let cfg = ExperimentConfig {
            steps: 10,
            episodes: 1,
            seeds: 1,
            pause: false,
            out_dir: out.path().into(),
        };

        run_episodes(
            &mut env,
            &mut agent,
            &mut Decision::Agent,
            &mut NullMonitor,
            &cfg,
            0,
        )
        .unwrap();

        assert_eq!(env.step_count, 2, "no timesteps after the terminal one");
        // prime + one per step + one extra for the terminal transition
        assert_eq!(agent.updates, 1 + 2 + 1);
    }

    #[test]
    fn run_persists_table_and_snapshots() {
        let out = TempDir::new("experiment").unwrap();
        let mut env = TwoState::new(None);
        let mut agent = greedy_q_agent();
        let cfg = ExperimentConfig {
            steps: 5,
            episodes: 3,
            seeds: 2,
            pause: false,
            out_dir: out.path().into(),
        };

        run_seeds(
            &mut env,
            &mut agent,
            &mut Decision::Agent,
            &mut NullMonitor,
            &cfg,
        )
        .unwrap();

        for seed in 0..2 {
            let stem = format!("QLearning_twostate_{seed}_fin");
            let mut rdr = csv::Reader::from_path(out.path().join(format!("{stem}.csv"))).unwrap();
            #[derive(Deserialize)]
            struct Row {
                episode: u32,
                seed: u32,
            }
            let rows: Vec<Row> = rdr.deserialize().collect::<Result<_, _>>().unwrap();
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[2].episode, 2);
            assert_eq!(rows[0].seed, seed);

            assert!(out.path().join(format!("q_{stem}.csv")).exists());

            let json = fs::read_to_string(out.path().join(format!("{stem}.json"))).unwrap();
            let snapshot: AgentSnapshot<u8, u8> = serde_json::from_str(&json).unwrap();
            let restored = snapshot.restore().unwrap();
            if seed == 1 {
                // the last run's snapshot matches the live agent
                for state in [0, 1] {
                    assert_eq!(restored.value(state), agent.value(state));
                }
            }

            let json = fs::read_to_string(out.path().join(format!("mdp_{stem}.json"))).unwrap();
            let env_snapshot: crate::snapshot::EnvSnapshot<serde_json::Value> =
                serde_json::from_str(&json).unwrap();
            assert_eq!(env_snapshot.version, SNAPSHOT_VERSION);
        }
    }
}
