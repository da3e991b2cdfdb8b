use crate::strategy::{Decision, PositionState};

/// Map entry/exit conditions onto a decision for the current position state
pub fn transition(position: PositionState, open_condition: bool, close_condition: bool) -> Decision {
    match position {
        PositionState::Flat if open_condition => Decision::Open,
        PositionState::Long if close_condition => Decision::Close,
        _ => Decision::Hold,
    }
}

/// Check if a moving-average value is still at its warm-up placeholder
pub fn is_warming_up(value: f64) -> bool {
    value == 0.0 || !value.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_respect_position_state() {
        assert_eq!(transition(PositionState::Flat, true, true), Decision::Open);
        assert_eq!(transition(PositionState::Long, true, true), Decision::Close);
        assert_eq!(transition(PositionState::Flat, false, true), Decision::Hold);
        assert_eq!(transition(PositionState::Long, true, false), Decision::Hold);
    }
}
