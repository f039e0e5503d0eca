//! Embedded Runge-Kutta integration, the per-carrier-group stepping engine the
//! propagator advances through the sensor.
//!
//! Carries a Butcher tableau (weights, nodes, and — for the embedded methods — a second
//! weight row used to estimate truncation error), evaluates a caller-supplied right-hand
//! side `v(t, y)`, and exposes the handful of operations the propagator's per-step
//! procedure needs: `step`, `set_value`, `set_time_step`, `advance_time`.

use glam::DVec3;

/// A Butcher tableau: `nodes[i]` are the time fractions, `matrix[i][j]` the stage
/// coefficients (`j < i`), `weights` the solution weight row, and `error_weights` an
/// optional second weight row for embedded error estimation (`None` for non-adaptive
/// tableaus such as classic RK4).
pub struct Tableau {
    pub stages: usize,
    pub nodes: Vec<f64>,
    pub matrix: Vec<Vec<f64>>,
    pub weights: Vec<f64>,
    pub error_weights: Option<Vec<f64>>,
}

impl Tableau {
    /// Classic non-adaptive 4th-order Runge-Kutta.
    pub fn rk4() -> Self {
        Self {
            stages: 4,
            nodes: vec![0.0, 0.5, 0.5, 1.0],
            matrix: vec![vec![], vec![0.5], vec![0.0, 0.5], vec![0.0, 0.0, 1.0]],
            weights: vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
            error_weights: None,
        }
    }

    /// Runge-Kutta-Fehlberg 5(4): a 6-stage tableau carrying a 5th-order solution and a
    /// 4th-order embedded estimate for step-size control.
    pub fn rkf5() -> Self {
        Self {
            stages: 6,
            nodes: vec![0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0],
            matrix: vec![
                vec![],
                vec![1.0 / 4.0],
                vec![3.0 / 32.0, 9.0 / 32.0],
                vec![1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0],
                vec![439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0],
                vec![-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
            ],
            weights: vec![16.0 / 135.0, 0.0, 6656.0 / 12825.0, 28561.0 / 56430.0, -9.0 / 50.0, 2.0 / 55.0],
            error_weights: Some(vec![25.0 / 216.0, 0.0, 1408.0 / 2565.0, 2197.0 / 4104.0, -1.0 / 5.0, 0.0]),
        }
    }
}

/// The outcome of one [`RungeKutta::step`]: the value delta applied and, for embedded
/// tableaus, the local error estimate.
pub struct StepResult {
    pub delta: DVec3,
    pub error: DVec3,
}

/// A stateful embedded RK driver for a single carrier group's trajectory. `D` is fixed
/// to 3 (position in mm); the velocity functor returns mm/ns.
pub struct RungeKutta<F>
where
    F: Fn(f64, DVec3) -> DVec3,
{
    tableau: Tableau,
    velocity: F,
    t: f64,
    y: DVec3,
    h: f64,
    accumulated_error: DVec3,
}

impl<F> RungeKutta<F>
where
    F: Fn(f64, DVec3) -> DVec3,
{
    pub fn new(tableau: Tableau, velocity: F, step_size: f64, initial_y: DVec3, initial_t: f64) -> Self {
        Self { tableau, velocity, t: initial_t, y: initial_y, h: step_size, accumulated_error: DVec3::ZERO }
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn value(&self) -> DVec3 {
        self.y
    }

    pub fn time_step(&self) -> f64 {
        self.h
    }

    pub fn error(&self) -> DVec3 {
        self.accumulated_error
    }

    /// Substitutes the state vector without changing time: used to inject diffusion
    /// kicks and boundary reflections mid-integration.
    pub fn set_value(&mut self, y: DVec3) {
        self.y = y;
    }

    pub fn set_time_step(&mut self, h: f64) {
        self.h = h;
    }

    /// Fast-forwards time without evaluating the right-hand side, used to resume a
    /// trapped carrier at `t + detrap_time`.
    pub fn advance_time(&mut self, dt: f64) {
        self.t += dt;
    }

    /// Performs one tableau-weighted step, updating `y` and `t`, and returns the value
    /// delta together with the embedded error estimate (zero if the tableau is
    /// non-adaptive).
    pub fn step(&mut self) -> StepResult {
        let h = self.h;
        let mut k: Vec<DVec3> = Vec::with_capacity(self.tableau.stages);
        for i in 0..self.tableau.stages {
            let mut yi = self.y;
            for (j, kj) in k.iter().enumerate() {
                yi += h * self.tableau.matrix[i][j] * *kj;
            }
            let ti = self.t + self.tableau.nodes[i] * h;
            k.push((self.velocity)(ti, yi));
        }

        let mut delta = DVec3::ZERO;
        for (b, ki) in self.tableau.weights.iter().zip(&k) {
            delta += h * *b * *ki;
        }

        let error = match &self.tableau.error_weights {
            Some(bstar) => {
                let mut alt = DVec3::ZERO;
                for (b, ki) in bstar.iter().zip(&k) {
                    alt += h * *b * *ki;
                }
                delta - alt
            }
            None => DVec3::ZERO,
        };

        self.y += delta;
        self.t += h;
        self.accumulated_error += error;
        StepResult { delta, error }
    }

    /// Repeats `step()` until `amount` of integration time has elapsed.
    pub fn step_for(&mut self, amount: f64) {
        let target = self.t + amount;
        while self.t < target {
            if self.t + self.h > target {
                self.h = target - self.t;
            }
            self.step();
        }
    }
}

/// Adaptive step-size control for RKF5: scale `h` by the target-precision test, clamp to
/// `[h_min, h_max]`, and force a shrink near the sensor z-edge when the projected
/// z-overshoot exceeds 20% of the step.
pub struct AdaptiveStepControl {
    pub target_precision: f64,
    pub h_min: f64,
    pub h_max: f64,
}

impl AdaptiveStepControl {
    /// Returns the next step size given the last step's error estimate.
    pub fn next_step(&self, current_h: f64, error: DVec3) -> f64 {
        let norm = error.length();
        let scaled = if norm > self.target_precision {
            current_h * 0.7
        } else if norm < self.target_precision / 2.0 {
            current_h * 2.0
        } else {
            current_h
        };
        scaled.clamp(self.h_min, self.h_max)
    }

    /// Shrinks `h` when the projected z motion would overshoot the sensor edge by more
    /// than 20% of the step.
    pub fn clamp_for_z_edge(&self, h: f64, z: f64, vz: f64, z_edge: f64) -> f64 {
        if vz == 0.0 {
            return h;
        }
        let distance = (z_edge - z) / vz;
        if distance > 0.0 && h > distance * 1.2 {
            0.7 * h
        } else {
            h
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rk4_integrates_constant_velocity_exactly() {
        let v = DVec3::new(1.0, 0.0, 0.0);
        let mut rk = RungeKutta::new(Tableau::rk4(), move |_t, _y| v, 0.1, DVec3::ZERO, 0.0);
        rk.step_for(1.0);
        assert!((rk.value() - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-9);
        assert!((rk.time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rkf5_error_is_zero_for_constant_velocity() {
        let v = DVec3::new(0.0, 0.0, -1.0);
        let mut rk = RungeKutta::new(Tableau::rkf5(), move |_t, _y| v, 0.05, DVec3::ZERO, 0.0);
        let result = rk.step();
        assert!(result.error.length() < 1e-9);
    }

    #[test]
    fn set_value_does_not_change_time() {
        let mut rk = RungeKutta::new(Tableau::rk4(), |_t, _y| DVec3::ZERO, 0.1, DVec3::ZERO, 2.0);
        rk.set_value(DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(rk.time(), 2.0);
        assert_eq!(rk.value(), DVec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn advance_time_skips_rhs_evaluation() {
        let mut rk = RungeKutta::new(Tableau::rk4(), |_t, _y| DVec3::new(99.0, 0.0, 0.0), 0.1, DVec3::ZERO, 0.0);
        rk.advance_time(5.0);
        assert_eq!(rk.time(), 5.0);
        assert_eq!(rk.value(), DVec3::ZERO);
    }

    #[test]
    fn adaptive_control_shrinks_on_large_error() {
        let control = AdaptiveStepControl { target_precision: 1e-6, h_min: 1e-4, h_max: 1.0 };
        let h = control.next_step(0.1, DVec3::new(1e-3, 0.0, 0.0));
        assert!(h < 0.1);
    }

    #[test]
    fn z_edge_clamp_shrinks_when_overshoot_is_large() {
        let control = AdaptiveStepControl { target_precision: 1e-6, h_min: 1e-4, h_max: 1.0 };
        let h = control.clamp_for_z_edge(0.1, 0.149, -1.0, 0.15);
        assert!(h < 0.1);
    }
}
