use std::collections::HashSet;

use rand::{seq::SliceRandom, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use strum::VariantArray;

use crate::{
    assert_interval,
    env::{DiscreteActionSpace, DiscreteStateSpace, Environment, Step},
};

/// Grid coordinates `(x, y)`, origin at the bottom-left corner
pub type Pos = (i32, i32);

/// What occupies a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Open,
    Wall,
    Hole,
    Goal,
}

impl Cell {
    pub fn is_terminal(self) -> bool {
        matches!(self, Cell::Hole | Cell::Goal)
    }
}

/// The closed action set
///
/// Terminal cells offer only [`Exit`](Action::Exit), which collects the
/// cell's payoff and ends the episode.
#[derive(
    VariantArray,
    strum::Display,
    Clone,
    Copy,
    Debug,
    Hash,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Exit,
}

impl Action {
    /// The four movement actions, in display order
    pub const MOVES: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    fn delta(self) -> (i32, i32) {
        match self {
            Action::Up => (0, 1),
            Action::Down => (0, -1),
            Action::Left => (-1, 0),
            Action::Right => (1, 0),
            Action::Exit => (0, 0),
        }
    }

    /// The two moves perpendicular to this one, which slips divert to
    fn perpendicular(self) -> [Action; 2] {
        match self {
            Action::Up | Action::Down => [Action::Left, Action::Right],
            Action::Left | Action::Right => [Action::Up, Action::Down],
            Action::Exit => [Action::Exit, Action::Exit],
        }
    }
}

/// Configuration for a [`GridWorld`]
///
/// The default is a 5x5 grid with a wall segment splitting off the goal
/// corner, two start cells, and a 0.3 slip probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridWorldConfig {
    pub name: String,
    pub width: i32,
    pub height: i32,
    /// Start cell used when `rand_init` is false
    pub init_loc: Pos,
    /// Start cells drawn from when `rand_init` is true
    pub starts: Vec<Pos>,
    /// Goal cells; the first is used unless `rand_goal` is true
    pub goals: Vec<Pos>,
    pub walls: Vec<Pos>,
    pub holes: Vec<Pos>,
    pub rand_init: bool,
    pub rand_goal: bool,
    /// Chance that a move slips to one of its perpendicular neighbors
    pub slip_prob: f64,
    /// Cost charged for every non-exit step, as a positive number
    pub step_cost: f64,
    /// Cost collected when exiting a hole, as a positive number
    pub hole_cost: f64,
    pub goal_reward: f64,
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        Self {
            name: "blockworld".into(),
            width: 5,
            height: 5,
            init_loc: (1, 0),
            starts: vec![(1, 0), (0, 4)],
            goals: vec![(4, 4)],
            walls: vec![(3, 1), (3, 2), (3, 3)],
            holes: vec![],
            rand_init: true,
            rand_goal: true,
            slip_prob: 0.3,
            step_cost: 0.0,
            hole_cost: 1.0,
            goal_reward: 1.0,
        }
    }
}

/// A gridworld MDP: move around open cells under slip noise, then exit a
/// goal or hole cell for its payoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridWorld {
    name: String,
    width: i32,
    height: i32,
    init_loc: Pos,
    starts: Vec<Pos>,
    goals: Vec<Pos>,
    walls: HashSet<Pos>,
    holes: HashSet<Pos>,
    rand_init: bool,
    rand_goal: bool,
    slip_prob: f64,
    step_cost: f64,
    hole_cost: f64,
    goal_reward: f64,
    goal: Pos,
    pos: Pos,
    exited: bool,
}

impl GridWorld {
    /// **Panics** if `slip_prob` is not in `[0,1]`, no goal is configured,
    /// or any configured cell lies out of bounds
    pub fn new(config: GridWorldConfig) -> Self {
        assert_interval!(config.slip_prob, 0.0, 1.0);
        assert!(
            !config.goals.is_empty(),
            "a gridworld needs at least one goal"
        );
        let in_bounds = |(x, y): &Pos| *x >= 0 && *x < config.width && *y >= 0 && *y < config.height;
        for cells in [&config.starts, &config.goals, &config.walls, &config.holes] {
            assert!(cells.iter().all(in_bounds), "configured cell out of bounds");
        }

        let goal = config.goals[0];
        let pos = config.init_loc;
        Self {
            name: config.name,
            width: config.width,
            height: config.height,
            init_loc: config.init_loc,
            starts: config.starts,
            goals: config.goals,
            walls: config.walls.into_iter().collect(),
            holes: config.holes.into_iter().collect(),
            rand_init: config.rand_init,
            rand_goal: config.rand_goal,
            slip_prob: config.slip_prob,
            step_cost: config.step_cost,
            hole_cost: config.hole_cost,
            goal_reward: config.goal_reward,
            goal,
            pos,
            exited: false,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn goal_reward(&self) -> f64 {
        self.goal_reward
    }

    pub fn hole_cost(&self) -> f64 {
        self.hole_cost
    }

    pub fn step_cost(&self) -> f64 {
        self.step_cost
    }

    pub fn cell(&self, pos: Pos) -> Cell {
        if self.walls.contains(&pos) {
            Cell::Wall
        } else if self.holes.contains(&pos) {
            Cell::Hole
        } else if pos == self.goal {
            Cell::Goal
        } else {
            Cell::Open
        }
    }

    /// The payoff collected by exiting `pos`, if it is terminal
    pub fn exit_payoff(&self, pos: Pos) -> Option<f64> {
        match self.cell(pos) {
            Cell::Goal => Some(self.goal_reward),
            Cell::Hole => Some(-self.hole_cost),
            _ => None,
        }
    }

    fn in_bounds(&self, (x, y): Pos) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    fn actions_at(&self, pos: Pos) -> Vec<Action> {
        if self.cell(pos).is_terminal() {
            vec![Action::Exit]
        } else {
            Action::MOVES.to_vec()
        }
    }
}

impl Environment for GridWorld {
    type State = Pos;
    type Action = Action;

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> Pos {
        self.pos
    }

    fn is_active(&self) -> bool {
        !self.exited
    }

    fn step(&mut self, action: Action) -> Step<Pos> {
        match action {
            Action::Exit => match self.exit_payoff(self.pos) {
                Some(reward) => {
                    self.exited = true;
                    Step {
                        state: self.pos,
                        reward,
                        done: true,
                    }
                }
                // exiting an open cell goes nowhere and still costs a step
                None => Step {
                    state: self.pos,
                    reward: -self.step_cost,
                    done: false,
                },
            },
            _ => {
                let moved = if self.slip_prob > 0.0 && thread_rng().gen::<f64>() < self.slip_prob {
                    *action
                        .perpendicular()
                        .choose(&mut thread_rng())
                        .expect("two perpendicular moves")
                } else {
                    action
                };
                let (dx, dy) = moved.delta();
                let next = (self.pos.0 + dx, self.pos.1 + dy);
                if self.in_bounds(next) && self.cell(next) != Cell::Wall {
                    self.pos = next;
                }
                Step {
                    state: self.pos,
                    reward: -self.step_cost,
                    done: false,
                }
            }
        }
    }

    fn reset(&mut self) -> Pos {
        self.exited = false;
        self.goal = if self.rand_goal {
            *self
                .goals
                .choose(&mut thread_rng())
                .expect("at least one goal is configured")
        } else {
            self.goals[0]
        };
        self.pos = if self.rand_init {
            *self
                .starts
                .choose(&mut thread_rng())
                .expect("at least one start is configured")
        } else {
            self.init_loc
        };
        self.pos
    }

    fn random_action(&self) -> Action {
        *self
            .actions_at(self.pos)
            .choose(&mut thread_rng())
            .expect("There is always at least one action available")
    }
}

impl DiscreteActionSpace for GridWorld {
    fn actions(&self) -> Vec<Action> {
        self.actions_at(self.pos)
    }
}

impl DiscreteStateSpace for GridWorld {
    fn states(&self) -> Vec<Pos> {
        (0..self.width)
            .flat_map(|x| (0..self.height).map(move |y| (x, y)))
            .filter(|&pos| self.cell(pos) != Cell::Wall)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic() -> GridWorld {
        GridWorld::new(GridWorldConfig {
            rand_init: false,
            rand_goal: false,
            slip_prob: 0.0,
            step_cost: 0.1,
            holes: vec![(2, 2)],
            ..Default::default()
        })
    }

    #[test]
    fn moves_walls_and_bounds() {
        let mut env = deterministic();
        assert_eq!(env.reset(), (1, 0));

        assert_eq!(env.step(Action::Down).state, (1, 0), "edge blocks");
        assert_eq!(env.step(Action::Right).state, (2, 0));
        assert_eq!(env.step(Action::Right).state, (3, 0));
        let step = env.step(Action::Right);
        assert_eq!(step.state, (4, 0));
        assert_eq!(step.reward, -0.1);
        assert!(!step.done);
        assert_eq!(env.step(Action::Up).state, (4, 1));
        assert_eq!(env.step(Action::Left).state, (4, 1), "wall blocks");
    }

    #[test]
    fn exit_collects_goal_reward() {
        let mut env = deterministic();
        env.reset();
        for action in [Action::Up; 4] {
            env.step(action);
        }
        for action in [Action::Right, Action::Right, Action::Right] {
            env.step(action);
        }
        assert_eq!(env.state(), (4, 4));
        assert_eq!(env.actions(), vec![Action::Exit]);
        let step = env.step(Action::Exit);
        assert_eq!(step.reward, 1.0);
        assert!(step.done);
        assert!(!env.is_active());
    }

    #[test]
    fn exit_collects_hole_cost() {
        let mut env = deterministic();
        env.reset();
        env.step(Action::Up);
        env.step(Action::Up);
        env.step(Action::Right);
        assert_eq!(env.state(), (2, 2));
        let step = env.step(Action::Exit);
        assert_eq!(step.reward, -1.0);
        assert!(step.done);
    }

    #[test]
    fn exit_on_open_cell_is_a_costly_noop() {
        let mut env = deterministic();
        env.reset();
        let step = env.step(Action::Exit);
        assert_eq!(step.state, (1, 0));
        assert_eq!(step.reward, -0.1);
        assert!(!step.done);
    }

    #[test]
    fn states_exclude_walls() {
        let env = deterministic();
        let states = env.states();
        assert_eq!(states.len(), 25 - 3);
        assert!(!states.contains(&(3, 2)));
        assert!(states.contains(&(2, 2)), "holes are states");
    }

    #[test]
    fn snapshot_round_trip_preserves_grid() {
        use crate::snapshot::EnvSnapshot;

        let env = deterministic();
        let json = serde_json::to_string(&EnvSnapshot::of(&env)).unwrap();
        let back: EnvSnapshot<GridWorld> = serde_json::from_str(&json).unwrap();
        let restored = back.into_env().unwrap();

        assert_eq!(restored.name(), env.name());
        assert_eq!(restored.state(), env.state());
        for pos in env.states() {
            assert_eq!(restored.cell(pos), env.cell(pos));
            assert_eq!(restored.exit_payoff(pos), env.exit_payoff(pos));
        }
    }

    #[test]
    fn reset_after_exit_reactivates() {
        let mut env = deterministic();
        env.reset();
        for action in [Action::Up; 4] {
            env.step(action);
        }
        for action in [Action::Right; 3] {
            env.step(action);
        }
        env.step(Action::Exit);
        assert!(!env.is_active());
        assert_eq!(env.reset(), (1, 0));
        assert!(env.is_active());
    }
}
