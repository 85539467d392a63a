use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EnvError;

/// Lives at the start of a game.
pub const START_LIFE: u8 = 2;
/// Clock value at the start of a stage.
pub const START_TIME: u32 = 400;
/// Horizontal spawn position.
pub const START_X: u32 = 40;
/// Vertical position while standing on the ground.
pub const GROUND_Y: u32 = 79;

/// Power-up state of the player.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    #[default]
    Small,
    Tall,
    Fireball,
}

impl PlayerStatus {
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            PlayerStatus::Small => 0,
            PlayerStatus::Tall => 1,
            PlayerStatus::Fireball => 2,
        }
    }
}

/// Game variables reported after every step.
///
/// This is a fixed-schema record: deserializing from an adapter's JSON fails as soon
/// as one of the fields is missing, instead of failing later at the first lookup.
/// Being `Hash + Eq`, the record itself can serve as a discrete state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameInfo {
    pub coins: u32,
    pub flag_get: bool,
    pub life: u8,
    pub score: u32,
    pub stage: u8,
    pub status: PlayerStatus,
    pub time: u32,
    pub world: u8,
    pub x_pos: u32,
    pub y_pos: u32,
}

impl GameInfo {
    /// Names of the numeric fields, in [`GameInfo::feature_values`] order.
    pub const FEATURE_NAMES: [&'static str; 10] = [
        "coins", "flag_get", "life", "score", "stage", "status", "time", "world", "x_pos",
        "y_pos",
    ];

    /// The info reported right after a reset at the start of `scenario`.
    #[must_use]
    pub fn initial(scenario: Scenario) -> Self {
        let (world, stage) = scenario.start();
        Self {
            coins: 0,
            flag_get: false,
            life: START_LIFE,
            score: 0,
            stage,
            status: PlayerStatus::Small,
            time: START_TIME,
            world,
            x_pos: START_X,
            y_pos: GROUND_Y,
        }
    }

    /// Parses an info record produced by an external adapter.
    pub fn from_json(json: &str) -> Result<Self, EnvError> {
        serde_json::from_str(json).map_err(EnvError::MalformedInfo)
    }

    /// All fields as numbers, in [`GameInfo::FEATURE_NAMES`] order.
    #[must_use]
    pub fn feature_values(&self) -> [f64; 10] {
        [
            f64::from(self.coins),
            f64::from(u8::from(self.flag_get)),
            f64::from(self.life),
            f64::from(self.score),
            f64::from(self.stage),
            f64::from(self.status.level()),
            f64::from(self.time),
            f64::from(self.world),
            f64::from(self.x_pos),
            f64::from(self.y_pos),
        ]
    }
}

/// Which part of the game an environment plays.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Start at 1-1 and keep going through every stage until game over.
    #[default]
    AllStages,
    /// A single stage; reaching the flag ends the episode.
    Stage { world: u8, stage: u8 },
}

impl Scenario {
    pub const WORLDS: u8 = 8;
    pub const STAGES_PER_WORLD: u8 = 4;

    pub fn stage(world: u8, stage: u8) -> Result<Self, EnvError> {
        if !(1..=Self::WORLDS).contains(&world) || !(1..=Self::STAGES_PER_WORLD).contains(&stage)
        {
            return Err(EnvError::InvalidStage { world, stage });
        }
        Ok(Self::Stage { world, stage })
    }

    /// Builds a scenario from optional CLI selectors; both must be given for a
    /// single stage.
    pub fn from_selectors(world: Option<u8>, stage: Option<u8>) -> Result<Self, EnvError> {
        match (world, stage) {
            (Some(world), Some(stage)) => Self::stage(world, stage),
            (None, None) => Ok(Self::AllStages),
            (world, stage) => Err(EnvError::InvalidStage {
                world: world.unwrap_or(0),
                stage: stage.unwrap_or(0),
            }),
        }
    }

    /// World and stage the episode starts in.
    #[must_use]
    pub const fn start(self) -> (u8, u8) {
        match self {
            Scenario::AllStages => (1, 1),
            Scenario::Stage { world, stage } => (world, stage),
        }
    }

    #[must_use]
    pub const fn is_single_stage(self) -> bool {
        matches!(self, Scenario::Stage { .. })
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::AllStages => write!(f, "SuperMarioBros-v3"),
            Scenario::Stage { world, stage } => write!(f, "SuperMarioBros-{world}-{stage}-v3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_INFO: &str = r#"{
        "coins": 3, "flag_get": false, "life": 2, "score": 400, "stage": 1,
        "status": "small", "time": 380, "world": 1, "x_pos": 594, "y_pos": 79
    }"#;

    #[test]
    fn test_parse_full_record() {
        let info = GameInfo::from_json(FULL_INFO).unwrap();
        assert_eq!(info.coins, 3);
        assert_eq!(info.x_pos, 594);
        assert_eq!(info.status, PlayerStatus::Small);
    }

    #[test]
    fn test_missing_key_fails_immediately() {
        let json = FULL_INFO.replace(r#""x_pos": 594, "#, "");
        let err = GameInfo::from_json(&json).unwrap_err();
        assert!(matches!(err, EnvError::MalformedInfo(_)));
        assert!(err.to_string().contains("x_pos"));
    }

    #[test]
    fn test_feature_values_follow_names() {
        let info = GameInfo::from_json(FULL_INFO).unwrap();
        let values = info.feature_values();
        let x_index = GameInfo::FEATURE_NAMES
            .iter()
            .position(|n| *n == "x_pos")
            .unwrap();
        assert_eq!(values[x_index], 594.0);
        assert_eq!(values.len(), GameInfo::FEATURE_NAMES.len());
    }

    #[test]
    fn test_scenario_validation() {
        assert!(Scenario::stage(1, 1).is_ok());
        assert!(Scenario::stage(8, 4).is_ok());
        assert!(Scenario::stage(0, 1).is_err());
        assert!(Scenario::stage(1, 5).is_err());
        assert!(Scenario::from_selectors(Some(1), None).is_err());
        assert_eq!(
            Scenario::from_selectors(None, None).unwrap(),
            Scenario::AllStages
        );
    }

    #[test]
    fn test_scenario_names() {
        assert_eq!(
            Scenario::stage(2, 3).unwrap().to_string(),
            "SuperMarioBros-2-3-v3"
        );
        assert_eq!(Scenario::AllStages.to_string(), "SuperMarioBros-v3");
    }
}
