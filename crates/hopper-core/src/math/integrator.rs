//! Numerical integration
//!
//! The trajectory model discretizes every second-order channel with the
//! trapezoidal rule written through a midpoint velocity:
//!
//! ```text
//! v_mid  = v_t + dt/2 · a_t
//! x_t+1  = x_t + dt · v_mid
//! v_t+1  = v_mid + dt/2 · a_t+1
//! ```
//!
//! Eliminating `v_mid` gives `x_t+1 = x_t + dt v_t + dt²/2 a_t` and
//! `v_t+1 = v_t + dt/2 (a_t + a_t+1)`. Keeping `v_mid` as a variable leaves
//! every product in the model bilinear.

/// One trapezoidal step of a scalar channel; returns `(x_t+1, v_t+1)`
pub fn trapezoidal_step(x: f64, v: f64, a0: f64, a1: f64, dt: f64) -> (f64, f64) {
    let v_mid = midpoint_velocity(v, a0, dt);
    (x + dt * v_mid, v_mid + 0.5 * dt * a1)
}

/// Midpoint velocity `v + dt/2 · a`
pub fn midpoint_velocity(v: f64, a: f64, dt: f64) -> f64 {
    v + 0.5 * dt * a
}

/// Roll a scalar channel forward through a sequence of accelerations
///
/// `accelerations` has one entry per knot and `durations` one entry per
/// interval (at least `accelerations.len() - 1`). Returns the positions and
/// velocities at every knot.
pub fn integrate_channel(
    x0: f64,
    v0: f64,
    accelerations: &[f64],
    durations: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let mut positions = vec![x0];
    let mut velocities = vec![v0];
    for (window, &dt) in accelerations.windows(2).zip(durations) {
        let (x, v) = trapezoidal_step(
            positions[positions.len() - 1],
            velocities[velocities.len() - 1],
            window[0],
            window[1],
            dt,
        );
        positions.push(x);
        velocities.push(v);
    }
    (positions, velocities)
}

/// Rates that carry `positions` forward under `x_t+1 = x_t + dt · ẋ_t`
///
/// The rate at the last knot does not move anything and is taken from
/// `final_rate`. Intervals of zero duration keep the previous rate.
pub fn explicit_rates(positions: &[f64], durations: &[f64], final_rate: f64) -> Vec<f64> {
    let mut rates: Vec<f64> = Vec::with_capacity(positions.len());
    for (window, &dt) in positions.windows(2).zip(durations) {
        let rate = if dt > 0.0 {
            (window[1] - window[0]) / dt
        } else {
            rates.last().copied().unwrap_or(0.0)
        };
        rates.push(rate);
    }
    if !positions.is_empty() {
        rates.push(final_rate);
    }
    rates
}

/// Accelerations that carry `rates` forward under the trapezoidal rule
///
/// Inverts `ẋ_t+1 = ẋ_t + dt/2 (a_t + a_t+1)` knot by knot starting from `a0`.
pub fn trapezoidal_accelerations(rates: &[f64], a0: f64, durations: &[f64]) -> Vec<f64> {
    let mut accelerations = vec![a0];
    for (window, &dt) in rates.windows(2).zip(durations) {
        let previous = accelerations[accelerations.len() - 1];
        let next = if dt > 0.0 {
            2.0 * (window[1] - window[0]) / dt - previous
        } else {
            previous
        };
        accelerations.push(next);
    }
    accelerations
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_acceleration_is_exact() {
        // x(t) = 1 + 2t - t²/2
        let (x, v) = trapezoidal_step(1.0, 2.0, -1.0, -1.0, 0.5);
        assert_relative_eq!(x, 1.0 + 2.0 * 0.5 - 0.5 * 0.25, epsilon = 1e-12);
        assert_relative_eq!(v, 2.0 - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_duration_is_identity() {
        let (x, v) = trapezoidal_step(0.3, -1.2, 4.0, -7.0, 0.0);
        assert_relative_eq!(x, 0.3);
        assert_relative_eq!(v, -1.2);
    }

    #[test]
    fn test_integrate_channel_free_fall() {
        let acc = [-1.0; 5];
        let dts = [0.2; 4];
        let (x, v) = integrate_channel(0.75, 0.4, &acc, &dts);
        assert_eq!(x.len(), 5);
        assert_relative_eq!(x[2], 0.83, epsilon = 1e-12);
        assert_relative_eq!(x[4], 0.75, epsilon = 1e-12);
        assert_relative_eq!(v[4], -0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_rates_reproduce_foot_track() {
        let positions = [0.6, 0.6, 0.68, 0.76, 0.84];
        let dts = [0.2; 4];
        let rates = explicit_rates(&positions, &dts, 0.0);
        assert_eq!(rates.len(), 5);
        assert_relative_eq!(rates[1], 0.4, epsilon = 1e-12);

        let acc = trapezoidal_accelerations(&rates, 0.0, &dts);
        assert_relative_eq!(acc[1], 4.0, epsilon = 1e-12);
        assert_relative_eq!(acc[2], -4.0, epsilon = 1e-12);
        assert_relative_eq!(acc[4], -8.0, epsilon = 1e-12);

        let mut x = positions[0];
        for t in 0..4 {
            x += dts[t] * rates[t];
            assert_relative_eq!(x, positions[t + 1], epsilon = 1e-12);
            let rate = rates[t] + 0.5 * dts[t] * (acc[t] + acc[t + 1]);
            assert_relative_eq!(rate, rates[t + 1], epsilon = 1e-12);
        }
    }
}
