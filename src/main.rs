use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::warn;
use strum::VariantArray;

use blockworld::{
    agent::TabularAgent,
    algo::tabular::{
        dyna_q::{DynaQAgent, DynaQConfig},
        q_learning::{QLearningAgent, QLearningConfig},
        rmax::{RMaxAgent, RMaxConfig},
        sarsa::{SarsaAgent, SarsaConfig},
    },
    decay,
    experiment::{run_seeds, Decision, ExperimentConfig, NullMonitor},
    exploration::{EpsilonGreedy, Strategy},
    gym::{Action, GridWorld, GridWorldConfig, Pos},
    viz::{GridDisplay, User},
};

const CELL_SIZE: u16 = 5;

/// Run tabular RL agents in a gridworld MDP
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Discount on future rewards
    #[arg(short, long, default_value_t = 0.9)]
    discount: f64,

    /// Chance of taking a random action
    #[arg(short, long, default_value_t = 0.1)]
    epsilon: f64,

    /// TD learning rate
    #[arg(short, long, default_value_t = 0.5)]
    learning_rate: f64,

    /// Timestep limit per episode
    #[arg(short, long, default_value_t = 50)]
    iterations: u32,

    /// Number of episodes to run
    #[arg(short = 'k', long, default_value_t = 100)]
    episodes: u32,

    /// Planning lookahead depth
    #[arg(short = 't', long, default_value_t = 10)]
    lookahead: u32,

    /// Agent type
    #[arg(short, long, value_enum, default_value = "q-learning")]
    agent: AgentKind,

    /// Runs to repeat, labelled as seeds in the output table
    #[arg(short, long, default_value_t = 1)]
    seeds: u32,

    /// Wait for a key press after each time step
    #[arg(short, long)]
    pause: bool,

    /// Skip rendering of the learning episodes
    #[arg(short, long)]
    quiet: bool,

    /// Animation speed multiplier; above 1.0 is faster
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Control the agent manually with the arrow keys
    #[arg(short, long)]
    manual: bool,

    /// Directory for tables and snapshots
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentKind {
    QLearning,
    Sarsa,
    Rmax,
    #[value(name = "dynaq")]
    DynaQ,
}

fn build_agent(args: &Args) -> Box<dyn TabularAgent<Pos, Action>> {
    let actions = Action::VARIANTS.to_vec();
    let exploration =
        || Strategy::EpsilonGreedy(EpsilonGreedy::new(decay::Constant::new(args.epsilon)));
    match args.agent {
        AgentKind::QLearning => Box::new(QLearningAgent::new(
            actions,
            QLearningConfig {
                name: "QLearning".into(),
                exploration: exploration(),
                alpha: args.learning_rate,
                gamma: args.discount,
            },
        )),
        AgentKind::Sarsa => Box::new(SarsaAgent::new(
            actions,
            SarsaConfig {
                name: "Sarsa".into(),
                exploration: exploration(),
                alpha: args.learning_rate,
                gamma: args.discount,
            },
        )),
        AgentKind::Rmax => Box::new(RMaxAgent::new(
            actions,
            RMaxConfig {
                name: "RMAX".into(),
                rmax: 1.0,
                u_count: 2,
                gamma: args.discount,
                epsilon: args.epsilon,
                lookahead: args.lookahead,
            },
        )),
        AgentKind::DynaQ => Box::new(DynaQAgent::new(
            actions,
            DynaQConfig {
                name: "DynaQ".into(),
                exploration: exploration(),
                alpha: args.learning_rate,
                gamma: args.discount,
                lookahead: args.lookahead,
            },
        )),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut env = GridWorld::new(GridWorldConfig::default());
    let mut agent = build_agent(&args);

    let cfg = ExperimentConfig {
        steps: args.iterations,
        episodes: args.episodes,
        seeds: args.seeds,
        pause: args.pause || args.manual,
        out_dir: args.out_dir.clone(),
    };

    if args.quiet {
        if args.manual {
            warn!("manual mode needs the display; running the agent instead");
        }
        run_seeds(
            &mut env,
            agent.as_mut(),
            &mut Decision::Agent,
            &mut NullMonitor,
            &cfg,
        )?;
        return Ok(());
    }

    let mut display = GridDisplay::new(&env, CELL_SIZE, args.speed, "Blockworld");
    display.start()?;

    let mut user = User;
    let mut decision = if args.manual {
        Decision::Manual(&mut user)
    } else {
        Decision::Agent
    };

    run_seeds(&mut env, agent.as_mut(), &mut decision, &mut display, &cfg)?;

    // post-learning summary renders, each held until a key press
    if !args.manual {
        let caption = format!("Q-VALUES AFTER {} EPISODES", args.episodes);
        display.render_q_values(&env, agent.as_ref(), None, &caption)?;
        display.pause()?;
        let caption = format!("VALUES AFTER {} EPISODES", args.episodes);
        display.render_values(&env, agent.as_ref(), None, &caption)?;
        display.pause()?;
    }

    Ok(())
}
