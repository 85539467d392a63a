//! Deterministic stand-in for the emulated game.
//!
//! The player runs right along a course of pits and pipes towards a flag. The
//! observable interface mirrors the emulator's: [`GameInfo`] after every step, a
//! reward of `progress + clock penalty + death penalty` clipped to `[-15, 15]`, and a
//! coarse tile [`Frame`] around the player.
//!
//! Lives: the game starts with [`START_LIFE`] spare lives. Falling into a pit or
//! running out of time costs one and restarts the stage; dying with no spare life
//! ends the episode.

use crate::{
    Action, ActionSpace, Button, EnvError, Environment, EnvironmentFactory, Frame, GameInfo,
    PlayerStatus, SIMPLE_MOVEMENT, Scenario, Step,
    info::{START_LIFE, START_TIME, START_X},
};

use self::course::{Course, TILE, ground};

mod course;

const WALK_SPEED: i32 = 3;
const RUN_SPEED: i32 = 5;
const JUMP_VELOCITY: i32 = 10;
const GRAVITY: i32 = 1;
/// Falling below this height is a death.
const PIT_BOTTOM: i32 = -32;
/// Steps per clock decrement.
const STEPS_PER_TICK: u32 = 8;
const COIN_SCORE: u32 = 200;
const FLAG_SCORE: u32 = 1000;
const TIME_BONUS_PER_UNIT: u32 = 50;
const DEATH_PENALTY: f64 = -15.0;
const REWARD_CLIP: f64 = 15.0;

const FRAME_WIDTH: usize = 16;
const FRAME_HEIGHT: usize = 13;
/// Columns shown behind the player.
const FRAME_BEHIND: i32 = 4;

/// Cell values in rendered frames.
pub mod cell {
    pub const EMPTY: u8 = 0;
    pub const SOLID: u8 = 1;
    pub const COIN: u8 = 2;
    pub const FLAG: u8 = 3;
    pub const PLAYER: u8 = 4;
}

/// Simulated side-scrolling platformer.
#[derive(Debug, Clone)]
pub struct SideScroller {
    scenario: Scenario,
    world: u8,
    stage: u8,
    course: Course,
    collected: Vec<bool>,
    x: i32,
    y: i32,
    vy: i32,
    on_ground: bool,
    coins: u32,
    score: u32,
    life: u8,
    time: u32,
    steps: u32,
    flag_get: bool,
    started: bool,
    finished: bool,
}

impl SideScroller {
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        let (world, stage) = scenario.start();
        let course = Course::generate(world, stage);
        let collected = vec![false; course.coins().len()];
        Self {
            scenario,
            world,
            stage,
            course,
            collected,
            x: start_x(),
            y: ground(),
            vy: 0,
            on_ground: true,
            coins: 0,
            score: 0,
            life: START_LIFE,
            time: START_TIME,
            steps: 0,
            flag_get: false,
            started: false,
            finished: false,
        }
    }

    #[must_use]
    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// X position of the current stage's flag.
    #[must_use]
    pub fn flag_x(&self) -> u32 {
        u32::try_from(self.course.length()).unwrap_or(0)
    }

    #[must_use]
    pub fn info(&self) -> GameInfo {
        GameInfo {
            coins: self.coins,
            flag_get: self.flag_get,
            life: self.life,
            score: self.score,
            stage: self.stage,
            status: PlayerStatus::Small,
            time: self.time,
            world: self.world,
            x_pos: u32::try_from(self.x).unwrap_or(0),
            y_pos: u32::try_from(self.y).unwrap_or(0),
        }
    }

    fn respawn(&mut self) {
        self.x = start_x();
        self.y = ground();
        self.vy = 0;
        self.on_ground = true;
        self.time = START_TIME;
        self.steps = 0;
    }

    fn load_stage(&mut self, world: u8, stage: u8) {
        self.world = world;
        self.stage = stage;
        self.course = Course::generate(world, stage);
        self.collected = vec![false; self.course.coins().len()];
        self.respawn();
    }

    fn apply_movement(&mut self, buttons: &[Button]) {
        let speed = if buttons.contains(&Button::B) {
            RUN_SPEED
        } else {
            WALK_SPEED
        };
        let dx = if buttons.contains(&Button::Right) {
            speed
        } else if buttons.contains(&Button::Left) {
            -WALK_SPEED
        } else {
            0
        };
        if dx != 0 {
            let nx = (self.x + dx).max(0);
            if !self.course.is_solid(nx, self.y) {
                self.x = nx;
            }
        }

        if buttons.contains(&Button::A) && self.on_ground {
            self.vy = JUMP_VELOCITY;
            self.on_ground = false;
        }

        if self.on_ground {
            // walked off a ledge or over a pit
            if self.course.floor_at(self.x) != Some(self.y) {
                self.on_ground = false;
            }
            return;
        }

        self.vy -= GRAVITY;
        let ny = self.y + self.vy;
        match self.course.floor_at(self.x) {
            Some(floor) if self.vy <= 0 && self.y >= floor && ny <= floor => {
                self.y = floor;
                self.vy = 0;
                self.on_ground = true;
            }
            _ => self.y = ny,
        }
    }

    fn collect_coins(&mut self) {
        for (coin, collected) in self.course.coins().iter().zip(&mut self.collected) {
            if !*collected && (coin.x - self.x).abs() <= TILE / 2 && (coin.y - self.y).abs() <= TILE
            {
                *collected = true;
                self.coins += 1;
                self.score += COIN_SCORE;
            }
        }
    }

    /// Handles a death; returns whether the episode is over.
    fn lose_life(&mut self) -> bool {
        if self.life == 0 {
            return true;
        }
        self.life -= 1;
        self.respawn();
        false
    }

    /// Handles reaching the flag; returns whether the episode is over.
    fn reach_flag(&mut self) -> bool {
        self.flag_get = true;
        self.score += FLAG_SCORE + self.time * TIME_BONUS_PER_UNIT;
        match self.scenario {
            Scenario::Stage { .. } => true,
            Scenario::AllStages => {
                if self.world == Scenario::WORLDS && self.stage == Scenario::STAGES_PER_WORLD {
                    return true;
                }
                let (world, stage) = if self.stage == Scenario::STAGES_PER_WORLD {
                    (self.world + 1, 1)
                } else {
                    (self.world, self.stage + 1)
                };
                self.load_stage(world, stage);
                false
            }
        }
    }

    #[must_use]
    pub fn render(&self) -> Frame {
        let left = self.x - FRAME_BEHIND * TILE;
        let mut cells = Vec::with_capacity(FRAME_WIDTH * FRAME_HEIGHT);
        for row in 0..FRAME_HEIGHT {
            let bottom = tile_offset(FRAME_HEIGHT - 1 - row);
            for col in 0..FRAME_WIDTH {
                let x0 = left + tile_offset(col);
                let (cx, cy) = (x0 + TILE / 2, bottom + TILE / 2);
                let contains = |x: i32, y: i32| {
                    (x0..x0 + TILE).contains(&x) && (bottom..bottom + TILE).contains(&y)
                };
                let value = if contains(self.x, self.y) {
                    cell::PLAYER
                } else if (x0..x0 + TILE).contains(&self.course.length()) {
                    cell::FLAG
                } else if self
                    .course
                    .coins()
                    .iter()
                    .zip(&self.collected)
                    .any(|(coin, collected)| !*collected && contains(coin.x, coin.y))
                {
                    cell::COIN
                } else if self.course.is_solid(cx, cy) {
                    cell::SOLID
                } else {
                    cell::EMPTY
                };
                cells.push(value);
            }
        }
        Frame::new(FRAME_WIDTH, FRAME_HEIGHT, cells)
    }
}

impl Environment for SideScroller {
    fn action_space(&self) -> ActionSpace {
        ActionSpace::SIMPLE
    }

    fn reset(&mut self) -> Result<Frame, EnvError> {
        *self = Self::new(self.scenario);
        self.started = true;
        Ok(self.render())
    }

    fn step(&mut self, action: Action) -> Result<Step, EnvError> {
        let action = self.action_space().check(action)?;
        if !self.started {
            return Err(EnvError::NotReset);
        }
        if self.finished {
            return Err(EnvError::EpisodeFinished);
        }

        let (x_before, time_before) = (self.x, self.time);
        self.flag_get = false;
        self.apply_movement(SIMPLE_MOVEMENT[action.index()]);
        self.collect_coins();
        self.steps += 1;
        if self.steps % STEPS_PER_TICK == 0 {
            self.time = self.time.saturating_sub(1);
        }

        let died = self.y < PIT_BOTTOM || self.time == 0;
        let progress = f64::from(self.x - x_before);
        let clock = -f64::from(time_before - self.time);
        let death = if died { DEATH_PENALTY } else { 0.0 };
        let reward = (progress + clock + death).clamp(-REWARD_CLIP, REWARD_CLIP);

        let done = if died {
            self.lose_life()
        } else if self.x >= self.course.length() {
            self.reach_flag()
        } else {
            false
        };
        self.finished = done;

        Ok(Step {
            observation: self.render(),
            reward,
            done,
            info: self.info(),
        })
    }
}

/// Creates [`SideScroller`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct SideScrollerFactory;

impl EnvironmentFactory for SideScrollerFactory {
    type Env = SideScroller;

    fn create(&self, scenario: Scenario) -> Result<Self::Env, EnvError> {
        Ok(SideScroller::new(scenario))
    }
}

fn start_x() -> i32 {
    i32::try_from(START_X).unwrap_or(40)
}

fn tile_offset(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(0) * TILE
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOOP: Action = Action::new(0);
    const RIGHT: Action = Action::new(1);
    const RUN_JUMP: Action = Action::new(4);

    fn single_stage() -> SideScroller {
        let mut env = SideScroller::new(Scenario::stage(1, 1).unwrap());
        env.reset().unwrap();
        env
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = SideScroller::new(Scenario::AllStages);
        assert!(matches!(env.step(NOOP), Err(EnvError::NotReset)));
    }

    #[test]
    fn test_invalid_action_rejected() {
        let mut env = single_stage();
        assert!(matches!(
            env.step(Action::new(7)),
            Err(EnvError::InvalidAction { size: 7, .. })
        ));
    }

    #[test]
    fn test_moving_right_is_rewarded() {
        let mut env = single_stage();
        let step = env.step(RIGHT).unwrap();
        assert_eq!(step.info.x_pos, START_X + 3);
        assert!((step.reward - 3.0).abs() < f64::EPSILON);
        assert!(!step.done);
    }

    #[test]
    fn test_clock_runs_out() {
        let mut env = single_stage();
        let mut last = None;
        for _ in 0..(START_TIME * STEPS_PER_TICK) {
            let step = env.step(NOOP).unwrap();
            if step.info.life < START_LIFE {
                last = Some(step);
                break;
            }
        }
        let step = last.expect("time should run out");
        assert_eq!(step.info.time, START_TIME);
        assert_eq!(step.info.x_pos, START_X);
        assert!(step.reward < 0.0);
    }

    #[test]
    fn test_holding_right_eventually_dies_or_finishes() {
        let mut env = single_stage();
        let mut finished = false;
        for _ in 0..100_000 {
            let step = env.step(RIGHT).unwrap();
            if step.done {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert!(matches!(env.step(RIGHT), Err(EnvError::EpisodeFinished)));
    }

    #[test]
    fn test_reset_restores_initial_info() {
        let mut env = single_stage();
        for _ in 0..50 {
            env.step(RUN_JUMP).unwrap();
        }
        env.reset().unwrap();
        assert_eq!(
            env.info(),
            GameInfo::initial(Scenario::stage(1, 1).unwrap())
        );
    }

    #[test]
    fn test_frame_shows_player() {
        let env = single_stage();
        let frame = env.render();
        assert_eq!(frame.width(), FRAME_WIDTH);
        assert_eq!(frame.height(), FRAME_HEIGHT);
        assert_eq!(
            frame.cells().iter().filter(|c| **c == cell::PLAYER).count(),
            1
        );
    }

    #[test]
    fn test_identical_runs_give_identical_results() {
        let run = || {
            let mut env = single_stage();
            (0..500)
                .map(|i| env.step(Action::new(i % 7)).map(|s| s.info))
                .take_while(Result::is_ok)
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        };
        assert_eq!(run(), run());
    }
}
