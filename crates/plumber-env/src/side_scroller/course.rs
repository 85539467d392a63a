use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg64Mcg;

use crate::info::{GROUND_Y, START_X};

/// Tile size in pixels, used for obstacle spacing and rendering.
pub(crate) const TILE: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Obstacle {
    /// No floor in `[start, end)`.
    Pit { start: i32, end: i32 },
    /// Solid column in `[start, end)` rising `height` pixels above the ground.
    Pipe { start: i32, end: i32, height: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Coin {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

/// Static layout of one stage.
///
/// Layouts are derived from the world/stage pair only, so every instance of the same
/// stage is identical and runs are reproducible.
#[derive(Debug, Clone)]
pub(crate) struct Course {
    length: i32,
    obstacles: Vec<Obstacle>,
    coins: Vec<Coin>,
}

impl Course {
    pub(crate) fn generate(world: u8, stage: u8) -> Self {
        let mut rng = Pcg64Mcg::seed_from_u64(u64::from(world) * 16 + u64::from(stage));
        let difficulty = i32::from(world - 1) * 4 + i32::from(stage - 1);
        let length = 2400 + difficulty * 96;
        let max_pit = (32 + difficulty * 2).min(72);

        let mut obstacles = vec![];
        let mut coins = vec![];
        let mut x = i32::try_from(START_X).unwrap_or(40) + 12 * TILE;
        while x < length - 12 * TILE {
            if rng.random_bool(0.5) {
                let width = rng.random_range(24..=max_pit);
                obstacles.push(Obstacle::Pit {
                    start: x,
                    end: x + width,
                });
                coins.push(Coin {
                    x: x + width / 2,
                    y: ground() + 32,
                });
                x += width;
            } else {
                let height = rng.random_range(1..=2) * TILE;
                obstacles.push(Obstacle::Pipe {
                    start: x,
                    end: x + 2 * TILE,
                    height,
                });
                coins.push(Coin {
                    x: x + TILE,
                    y: ground() + height + 24,
                });
                x += 2 * TILE;
            }
            x += rng.random_range(10..=20) * TILE;
        }

        Self {
            length,
            obstacles,
            coins,
        }
    }

    /// X position of the flag pole.
    pub(crate) fn length(&self) -> i32 {
        self.length
    }

    pub(crate) fn coins(&self) -> &[Coin] {
        &self.coins
    }

    /// Height of the walkable surface at `x`, or `None` above a pit.
    pub(crate) fn floor_at(&self, x: i32) -> Option<i32> {
        let mut floor = ground();
        for obstacle in &self.obstacles {
            match *obstacle {
                Obstacle::Pit { start, end } if (start..end).contains(&x) => return None,
                Obstacle::Pipe { start, end, height } if (start..end).contains(&x) => {
                    floor = ground() + height;
                }
                _ => {}
            }
        }
        Some(floor)
    }

    /// Whether a body at `(x, y)` would be inside solid ground or a pipe.
    pub(crate) fn is_solid(&self, x: i32, y: i32) -> bool {
        self.floor_at(x).is_some_and(|floor| y < floor)
    }
}

pub(crate) fn ground() -> i32 {
    i32::try_from(GROUND_Y).unwrap_or(79)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = Course::generate(1, 1);
        let b = Course::generate(1, 1);
        assert_eq!(a.obstacles, b.obstacles);
        assert_eq!(a.coins, b.coins);
    }

    #[test]
    fn test_later_stages_are_longer() {
        assert!(Course::generate(2, 1).length() > Course::generate(1, 1).length());
    }

    #[test]
    fn test_spawn_area_is_clear() {
        let course = Course::generate(3, 2);
        for x in 0..200 {
            assert_eq!(course.floor_at(x), Some(ground()));
            assert!(!course.is_solid(x, ground()));
        }
    }

    #[test]
    fn test_pipe_is_solid_below_its_top() {
        let course = Course::generate(1, 1);
        let pipe = course
            .obstacles
            .iter()
            .find_map(|o| match *o {
                Obstacle::Pipe { start, height, .. } => Some((start, height)),
                Obstacle::Pit { .. } => None,
            });
        if let Some((start, height)) = pipe {
            assert!(course.is_solid(start, ground()));
            assert!(!course.is_solid(start, ground() + height));
            assert_eq!(course.floor_at(start), Some(ground() + height));
        }
    }
}
