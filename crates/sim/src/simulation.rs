use glam::Vec3;

use replica::{LocalSimulator, LocalState};

const WALK_SPEED: f32 = 5.0;
const SPRINT_SPEED: f32 = 10.0;
const JUMP_VELOCITY: f32 = 5.0;
const GRAVITY: f32 = 9.8;

/// Canned input for a walker: keeps moving forward while turning, toggles
/// sprint and jumps on a fixed schedule.
#[derive(Debug, Clone)]
pub struct WalkerScript {
    pub turn_rate: f32,
    pub sprint_period: f32,
    pub jump_period: f32,
}

impl WalkerScript {
    pub fn for_seed(seed: u32) -> Self {
        let turn = 0.3 + (seed % 5) as f32 * 0.15;
        Self {
            turn_rate: if seed % 2 == 0 { turn } else { -turn },
            sprint_period: 2.0 + (seed % 3) as f32,
            jump_period: 1.5 + (seed % 4) as f32 * 0.5,
        }
    }
}

/// Stand-in for a player controller: integrates the script into a pose.
#[derive(Debug, Clone)]
pub struct ScriptedWalker {
    state: LocalState,
    yaw: f32,
    elapsed: f32,
    next_jump: f32,
    script: WalkerScript,
}

impl ScriptedWalker {
    pub fn new(start: Vec3, script: WalkerScript) -> Self {
        Self {
            state: LocalState {
                position: start,
                grounded: true,
                ..LocalState::default()
            },
            yaw: 0.0,
            elapsed: 0.0,
            next_jump: script.jump_period,
            script,
        }
    }

    fn sprinting(&self) -> bool {
        (self.elapsed / self.script.sprint_period) as u32 % 2 == 1
    }
}

impl LocalSimulator for ScriptedWalker {
    fn step(&mut self, dt: f32) -> LocalState {
        self.elapsed += dt;
        self.yaw += self.script.turn_rate * dt;

        let speed = if self.sprinting() {
            SPRINT_SPEED
        } else {
            WALK_SPEED
        };
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let horizontal = Vec3::new(sin_yaw, 0.0, cos_yaw) * speed;

        let state = &mut self.state;
        if state.grounded && self.elapsed >= self.next_jump {
            state.velocity.y = JUMP_VELOCITY;
            state.grounded = false;
            state.jumping = true;
            self.next_jump += self.script.jump_period;
        }

        state.velocity.x = horizontal.x;
        state.velocity.z = horizontal.z;
        if !state.grounded {
            state.velocity.y -= GRAVITY * dt;
        }
        state.position += state.velocity * dt;

        if state.position.y < 0.0 {
            state.position.y = 0.0;
            state.velocity.y = 0.0;
            state.grounded = true;
            state.jumping = false;
        }

        state.rotation = self.yaw.to_degrees();
        *state
    }

    fn state(&self) -> LocalState {
        self.state
    }
}
