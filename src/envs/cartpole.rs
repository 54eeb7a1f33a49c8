//! Cart-pole environment
use super::{EnvStructure, Environment, Successor};
use crate::spaces::{BoxSpace, Indexed, IndexedTypeSpace};
use crate::Prng;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Configuration for the [`CartPole`] environment.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    /// Physics configuration
    pub physics: PhysicalConstants,
    /// Episode and reward parameters
    pub params: EnvironmentParams,
}

impl CartPoleConfig {
    pub fn build(&self) -> CartPole {
        CartPole::new(self.physics, self.params)
    }
}

/// Cart-Pole environment
///
/// A cart on a track carries a pole attached by a hinge.
/// The agent pushes the cart left or right to keep the pole upright
/// and receives a reward of 1 for every step before the pole falls or the cart leaves
/// the track.
///
/// Dynamics follow [Barto et al. (1983)][barto1983] with the friction correction of
/// [Florian (2005)][florian2005]; defaults match the
/// [OpenAI Gym CartPole environment][gym_cartpole].
///
/// Observations are `[cart_position, cart_velocity, pole_angle, pole_angular_velocity]`.
///
/// [barto1983]: https://ieeexplore.ieee.org/document/6313077
/// [florian2005]: https://coneural.org/florian/papers/05_cart_pole.pdf
/// [gym_cartpole]: https://github.com/openai/gym/blob/master/gym/envs/classic_control/cartpole.py
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct CartPole {
    phys: DerivedConstants,
    params: EnvironmentParams,
}

impl CartPole {
    pub fn new(phys: PhysicalConstants, params: EnvironmentParams) -> Self {
        Self {
            phys: phys.into(),
            params,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Push {
    Left,
    Right,
}

impl Indexed for Push {
    const SIZE: usize = 2;

    fn as_index(&self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

impl EnvStructure for CartPole {
    type ObservationSpace = BoxSpace<4>;
    type ActionSpace = IndexedTypeSpace<Push>;

    fn observation_space(&self) -> Self::ObservationSpace {
        let max_pos = self.params.max_pos;
        let max_angle = self.params.max_angle;
        BoxSpace::new(
            [-max_pos, f64::NEG_INFINITY, -max_angle, f64::NEG_INFINITY],
            [max_pos, f64::INFINITY, max_angle, f64::INFINITY],
        )
    }

    fn action_space(&self) -> Self::ActionSpace {
        IndexedTypeSpace::new()
    }

    fn reward_range(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn discount_factor(&self) -> f64 {
        self.params.discount_factor
    }
}

impl Environment for CartPole {
    type State = CartPoleState;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        let dist = Uniform::new_inclusive(-0.05, 0.05);
        CartPoleState {
            cart_position: dist.sample(rng),
            cart_velocity: dist.sample(rng),
            pole_angle: dist.sample(rng),
            pole_angular_velocity: dist.sample(rng),
            normal_velocity_positive: true,
        }
    }

    fn observe(&self, state: &Self::State, _: &mut Prng) -> [f64; 4] {
        [
            state.cart_position,
            state.cart_velocity,
            state.pole_angle,
            state.pole_angular_velocity,
        ]
    }

    fn step(
        &self,
        state: Self::State,
        action: &Push,
        _: &mut Prng,
    ) -> (Successor<Self::State>, f64) {
        let applied_force = match action {
            Push::Left => -self.params.action_force,
            Push::Right => self.params.action_force,
        };
        let next = self.phys.next_state(&state, applied_force);
        let fallen = next.cart_position.abs() > self.params.max_pos
            || next.pole_angle.abs() > self.params.max_angle;
        // The step that ends the episode still earns its reward
        if fallen {
            (Successor::Terminate, 1.0)
        } else {
            (Successor::Continue(next), 1.0)
        }
    }
}

/// Physical constants for the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    /// Downward acceleration of gravity (m/s^2)
    pub gravity: f64,
    /// Mass of the cart (kg)
    pub mass_cart: f64,
    /// Mass of the pole (kg)
    pub mass_pole: f64,
    /// Half the length of the pole (m)
    pub length_half_pole: f64,
    /// Coefficient of friction between the cart and the track (unitless).
    pub friction_cart: f64,
    /// Coefficient of friction between the pole and the cart at the hinge (unitless).
    pub friction_pole: f64,
    /// Simulation time step (s)
    pub time_step: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole: 0.1,
            length_half_pole: 0.5,
            friction_cart: 0.01,
            friction_pole: 0.01,
            time_step: 0.02,
        }
    }
}

/// Parameters for [`CartPole`] as a reinforcement learning environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentParams {
    /// Magnitude of the force (N) applied by actions.
    pub action_force: f64,
    /// Maximum absolute cart position (m) before the episode ends.
    pub max_pos: f64,
    /// Maximum absolute pole angle from vertical (radians) before the episode ends.
    pub max_angle: f64,
    pub discount_factor: f64,
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        Self {
            action_force: 10.0,
            max_pos: 2.4,
            max_angle: 12.0f64.to_radians(),
            discount_factor: 0.99,
        }
    }
}

/// Physical constants together with frequently used derived quantities.
#[derive(Debug, Copy, Clone, PartialEq)]
struct DerivedConstants {
    c: PhysicalConstants,
    /// `gravity * (mass_cart + mass_pole)`
    total_weight: f64,
    /// `1 / (mass_cart + mass_pole)`
    inv_total_mass: f64,
    /// `mass_pole * length_half_pole`
    pole_moment: f64,
}

impl Default for DerivedConstants {
    fn default() -> Self {
        PhysicalConstants::default().into()
    }
}

impl From<PhysicalConstants> for DerivedConstants {
    fn from(c: PhysicalConstants) -> Self {
        let total_mass = c.mass_cart + c.mass_pole;
        Self {
            c,
            total_weight: c.gravity * total_mass,
            inv_total_mass: total_mass.recip(),
            pole_moment: c.mass_pole * c.length_half_pole,
        }
    }
}

/// State of the [`CartPole`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPoleState {
    /// Cart position from the track midpoint (m).
    pub cart_position: f64,
    /// Cart velocity (m/s).
    pub cart_velocity: f64,
    /// Angle of the pole from vertical (radians).
    pub pole_angle: f64,
    /// Pole angular velocity about the hinge (radians / s).
    pub pole_angular_velocity: f64,
    /// Sign of `normal_force * cart_velocity` at the previous step.
    ///
    /// The friction term depends on this sign, which in turn depends on the friction.
    /// The previous sign is tried first and flipped if the result is inconsistent.
    normal_velocity_positive: bool,
}

/// Trigonometric and velocity terms shared by the dynamics equations.
#[derive(Debug, Copy, Clone)]
struct Terms {
    sin: f64,
    cos: f64,
    angular_velocity_sq: f64,
}

impl DerivedConstants {
    /// Semi-implicit Euler step with `applied_force` (N) on the cart.
    ///
    /// Equations from "Correct equations for the dynamics of the cart-pole system",
    /// Florian (2005).
    fn next_state(&self, state: &CartPoleState, applied_force: f64) -> CartPoleState {
        let (sin, cos) = state.pole_angle.sin_cos();
        let terms = Terms {
            sin,
            cos,
            angular_velocity_sq: state.pole_angular_velocity * state.pole_angular_velocity,
        };

        let mut friction = if state.normal_velocity_positive {
            self.c.friction_cart
        } else {
            -self.c.friction_cart
        };
        let mut angular_acc = self.angular_acceleration(state, applied_force, friction, terms);
        let mut normal = self.normal_force(angular_acc, terms);
        let normal_velocity_positive = (normal * state.cart_velocity).is_sign_positive();
        if normal_velocity_positive != state.normal_velocity_positive {
            friction = -friction;
            angular_acc = self.angular_acceleration(state, applied_force, friction, terms);
            normal = self.normal_force(angular_acc, terms);
        }

        let pole_force =
            self.pole_moment * (terms.angular_velocity_sq * sin + angular_acc * cos);
        let friction_force = -friction * normal;
        let cart_acc = (applied_force + pole_force + friction_force) * self.inv_total_mass;

        let dt = self.c.time_step;
        let cart_velocity = state.cart_velocity + dt * cart_acc;
        let pole_angular_velocity = state.pole_angular_velocity + dt * angular_acc;
        CartPoleState {
            cart_position: state.cart_position + dt * cart_velocity,
            cart_velocity,
            pole_angle: state.pole_angle + dt * state.pole_angular_velocity,
            pole_angular_velocity,
            normal_velocity_positive,
        }
    }

    /// Pole angular acceleration (radians / s^2); Florian (2005) equation 21.
    fn angular_acceleration(
        &self,
        state: &CartPoleState,
        applied_force: f64,
        signed_friction: f64,
        t: Terms,
    ) -> f64 {
        let alpha = (-applied_force
            - self.pole_moment * t.angular_velocity_sq * (t.sin + signed_friction * t.cos))
            * self.inv_total_mass;
        let beta = self.c.friction_pole * state.pole_angular_velocity / self.pole_moment;
        let numerator = self.c.gravity * t.sin
            + t.cos * (alpha + self.c.gravity * signed_friction)
            - beta;
        let denominator = self.c.length_half_pole
            * (4.0 / 3.0
                - self.c.mass_pole * t.cos * self.inv_total_mass * (t.cos - signed_friction));
        numerator / denominator
    }

    /// Normal force of the cart on the track (N); positive is downward.
    fn normal_force(&self, angular_acc: f64, t: Terms) -> f64 {
        self.total_weight
            - self.pole_moment * (angular_acc * t.sin + t.angular_velocity_sq * t.cos)
    }
}
