//! Turning observations into agent states.

use plumber_env::{Frame, GameInfo, cell};

/// Maps what an environment reports after a step to the state an agent learns on.
pub trait StateEncoder {
    type State;

    fn encode(&self, observation: &Frame, info: &GameInfo) -> Self::State;
}

/// The raw frame, used as an exact lookup key.
#[derive(Debug, Default, Clone, Copy)]
pub struct PixelStates;

impl StateEncoder for PixelStates {
    type State = Frame;

    fn encode(&self, observation: &Frame, _info: &GameInfo) -> Frame {
        observation.clone()
    }
}

/// The discrete game-info tuple.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfoStates;

impl StateEncoder for InfoStates {
    type State = GameInfo;

    fn encode(&self, _observation: &Frame, info: &GameInfo) -> GameInfo {
        *info
    }
}

/// Frame cells scaled into `[0, 1]`, as network inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameInputs;

impl StateEncoder for FrameInputs {
    type State = Vec<f64>;

    fn encode(&self, observation: &Frame, _info: &GameInfo) -> Vec<f64> {
        let max = f64::from(cell::PLAYER);
        observation
            .cells()
            .iter()
            .map(|&c| f64::from(c) / max)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use plumber_env::Scenario;

    use super::*;

    #[test]
    fn test_frame_inputs_in_unit_range() {
        let frame = Frame::new(2, 2, vec![cell::EMPTY, cell::SOLID, cell::COIN, cell::PLAYER]);
        let info = GameInfo::initial(Scenario::AllStages);
        let inputs = FrameInputs.encode(&frame, &info);
        assert_eq!(inputs, vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_equal_frames_are_equal_states() {
        let info = GameInfo::initial(Scenario::AllStages);
        let a = PixelStates.encode(&Frame::new(1, 2, vec![1, 0]), &info);
        let b = PixelStates.encode(&Frame::new(1, 2, vec![1, 0]), &info);
        assert_eq!(a, b);
        assert_eq!(InfoStates.encode(&a, &info), info);
    }
}
