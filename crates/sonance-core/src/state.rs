use serde::Serialize;

/// Engine lifecycle states (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Processing,
    Paused,
    Degraded,
    Destroying,
    Destroyed,
    Error,
}

/// The complete set of legal (from, to) transitions, expressed as a flat
/// table rather than scattered across call sites, so the Mealy machine in
/// spec §3 stays auditable in one place.
const TRANSITIONS: &[(EngineState, EngineState)] = &[
    (EngineState::Uninitialized, EngineState::Initializing),
    (EngineState::Initializing, EngineState::Ready),
    (EngineState::Initializing, EngineState::Degraded),
    (EngineState::Initializing, EngineState::Error),
    (EngineState::Ready, EngineState::Processing),
    (EngineState::Processing, EngineState::Ready),
    (EngineState::Processing, EngineState::Paused),
    (EngineState::Paused, EngineState::Processing),
    // `process_stream` is explicitly permitted from Degraded (spec §4.1) and
    // drives the engine into Processing; the reverse happens once the last
    // stream in a degraded engine stops. See DESIGN.md for this resolved
    // ambiguity in the abstract transition enumeration.
    (EngineState::Degraded, EngineState::Processing),
    (EngineState::Processing, EngineState::Degraded),
    (EngineState::Ready, EngineState::Destroying),
    (EngineState::Processing, EngineState::Destroying),
    (EngineState::Paused, EngineState::Destroying),
    (EngineState::Degraded, EngineState::Destroying),
    (EngineState::Error, EngineState::Destroying),
    (EngineState::Destroying, EngineState::Destroyed),
];

impl EngineState {
    /// Whether transitioning from `self` to `next` is legal per spec §3.
    pub fn can_transition_to(self, next: EngineState) -> bool {
        TRANSITIONS.iter().any(|&(from, to)| from == self && to == next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_can_only_go_to_initializing() {
        assert!(EngineState::Uninitialized.can_transition_to(EngineState::Initializing));
        assert!(!EngineState::Uninitialized.can_transition_to(EngineState::Ready));
        assert!(!EngineState::Uninitialized.can_transition_to(EngineState::Processing));
    }

    #[test]
    fn ready_and_processing_toggle() {
        assert!(EngineState::Ready.can_transition_to(EngineState::Processing));
        assert!(EngineState::Processing.can_transition_to(EngineState::Ready));
    }

    #[test]
    fn processing_and_paused_toggle() {
        assert!(EngineState::Processing.can_transition_to(EngineState::Paused));
        assert!(EngineState::Paused.can_transition_to(EngineState::Processing));
        assert!(!EngineState::Ready.can_transition_to(EngineState::Paused));
    }

    #[test]
    fn terminal_states_all_reach_destroying() {
        for from in [
            EngineState::Ready,
            EngineState::Processing,
            EngineState::Paused,
            EngineState::Degraded,
            EngineState::Error,
        ] {
            assert!(from.can_transition_to(EngineState::Destroying));
        }
    }

    #[test]
    fn destroyed_is_terminal() {
        assert!(!EngineState::Destroyed.can_transition_to(EngineState::Uninitialized));
        assert!(!EngineState::Destroyed.can_transition_to(EngineState::Ready));
    }

    #[test]
    fn no_illegal_skips() {
        assert!(!EngineState::Uninitialized.can_transition_to(EngineState::Destroyed));
        assert!(!EngineState::Ready.can_transition_to(EngineState::Degraded));
    }

    #[test]
    fn degraded_can_enter_and_leave_processing() {
        assert!(EngineState::Degraded.can_transition_to(EngineState::Processing));
        assert!(EngineState::Processing.can_transition_to(EngineState::Degraded));
    }
}
