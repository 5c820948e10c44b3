use crate::{Config, Puck};

/// Advance the puck by one fixed step and apply table friction
pub fn move_puck(puck: &mut Puck, config: &Config) {
    puck.pos += puck.vel;
    puck.vel *= config.puck_friction;
}

/// Drop a puck that has left the finite domain back on the center spot.
///
/// Returns true if the puck had to be reset.
pub fn guard_finite(puck: &mut Puck, config: &Config) -> bool {
    if puck.is_finite() {
        return false;
    }
    puck.reset(config.center());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_move_puck_integrates_then_damps() {
        let config = Config::new();
        let mut puck = Puck::new(Vec2::new(100.0, 100.0), Vec2::new(10.0, -20.0));

        move_puck(&mut puck, &config);

        assert_eq!(puck.pos, Vec2::new(110.0, 80.0), "Position uses pre-friction velocity");
        assert!((puck.vel.x - 9.9).abs() < 1e-5);
        assert!((puck.vel.y + 19.8).abs() < 1e-5);
    }

    #[test]
    fn test_friction_never_reaches_zero() {
        let config = Config::new();
        let mut puck = Puck::new(Vec2::new(200.0, 350.0), Vec2::new(1.0, 0.0));
        for _ in 0..1000 {
            move_puck(&mut puck, &config);
        }
        assert!(puck.vel.x > 0.0, "Friction damps asymptotically");
        assert!(puck.vel.x < 1e-3);
    }

    #[test]
    fn test_guard_finite_resets_nan_puck() {
        let config = Config::new();
        let mut puck = Puck::new(Vec2::new(f32::NAN, 10.0), Vec2::new(1.0, f32::INFINITY));

        assert!(guard_finite(&mut puck, &config));
        assert_eq!(puck, Puck::at_rest(config.center()));

        assert!(!guard_finite(&mut puck, &config), "Finite puck is left alone");
    }
}
