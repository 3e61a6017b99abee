use crate::snapshot::LocalState;

/// Drives one locally owned entity: reads input, integrates physics, and
/// reports the resulting state. Supplied by the embedding game.
pub trait LocalSimulator {
    fn step(&mut self, delta_time: f32) -> LocalState;

    fn state(&self) -> LocalState;
}

#[derive(Debug, Clone, Default)]
pub struct StaticSimulator {
    state: LocalState,
}

impl StaticSimulator {
    pub fn new(state: LocalState) -> Self {
        Self { state }
    }

    pub fn set_state(&mut self, state: LocalState) {
        self.state = state;
    }
}

impl LocalSimulator for StaticSimulator {
    fn step(&mut self, _delta_time: f32) -> LocalState {
        self.state
    }

    fn state(&self) -> LocalState {
        self.state
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinearSimulator {
    state: LocalState,
}

impl LinearSimulator {
    pub fn new(start: LocalState) -> Self {
        Self { state: start }
    }
}

impl LocalSimulator for LinearSimulator {
    fn step(&mut self, delta_time: f32) -> LocalState {
        self.state.position += self.state.velocity * delta_time;
        self.state
    }

    fn state(&self) -> LocalState {
        self.state
    }
}
