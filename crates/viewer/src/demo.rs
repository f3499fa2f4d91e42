//! Procedural particle source standing in for a simulation.
//!
//! Particles fill the lower half of the bounds and bob on a travelling wave
//! so the surface has something to smooth.

use fluid_surface::SimulationState;
use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};

const WAVE_AMPLITUDE: f32 = 0.15;
const WAVE_NUMBER: f32 = 2.5;
const WAVE_SPEED: f32 = 1.8;

pub struct DemoParticles {
    bounds_size: Vec3,
    origin: Vec3,
    rest: Vec<Vec3>,
    positions: Vec<Vec3>,
    time: f32,
    rng: StdRng,
}

impl DemoParticles {
    pub fn new(count: u32, bounds_size: Vec3, seed: u64) -> Self {
        let mut demo = Self {
            bounds_size,
            origin: Vec3::ZERO,
            rest: Vec::new(),
            positions: Vec::new(),
            time: 0.0,
            rng: StdRng::seed_from_u64(seed),
        };
        demo.set_count(count);
        demo
    }

    pub fn count(&self) -> u32 {
        self.rest.len() as u32
    }

    /// Grows or shrinks the particle set. Existing particles keep their
    /// rest positions.
    pub fn set_count(&mut self, count: u32) {
        let half = self.bounds_size * 0.5;
        let count = count as usize;
        while self.rest.len() < count {
            let p = Vec3::new(
                self.rng.gen_range(-half.x..half.x),
                self.rng.gen_range(-half.y..0.0),
                self.rng.gen_range(-half.z..half.z),
            );
            self.rest.push(self.origin + p);
        }
        self.rest.truncate(count);
        self.animate();
    }

    pub fn update(&mut self, dt: f32) {
        self.time += dt;
        self.animate();
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Positions in the GPU layout, one `vec4` per particle.
    pub fn gpu_positions(&self) -> Vec<[f32; 4]> {
        self.positions.iter().map(|p| p.extend(1.0).to_array()).collect()
    }

    pub fn simulation_state(&self) -> SimulationState {
        SimulationState {
            particle_count: self.count(),
            bounds_size: self.bounds_size,
            origin: self.origin,
        }
    }

    fn animate(&mut self) {
        let half = self.bounds_size * 0.5;
        let floor = self.origin.y - half.y;
        let depth = half.y.max(f32::EPSILON);
        self.positions.clear();
        self.positions.extend(self.rest.iter().map(|&rest| {
            // Deeper particles move less.
            let lift = (rest.y - floor) / depth;
            let phase = WAVE_NUMBER * rest.x - WAVE_SPEED * self.time;
            let y = rest.y + WAVE_AMPLITUDE * half.y * lift * phase.sin();
            Vec3::new(rest.x, y.clamp(floor, self.origin.y + half.y), rest.z)
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside(bounds: Vec3, p: Vec3) -> bool {
        let half = bounds * 0.5;
        p.abs().cmple(half + Vec3::splat(1e-5)).all()
    }

    #[test]
    fn test_particles_stay_in_bounds() {
        let bounds = Vec3::new(4.0, 2.0, 3.0);
        let mut demo = DemoParticles::new(500, bounds, 7);
        for _ in 0..100 {
            demo.update(1.0 / 60.0);
            assert!(demo.positions().iter().all(|&p| inside(bounds, p)));
        }
        assert_eq!(demo.positions().len(), 500);
    }

    #[test]
    fn test_set_count_keeps_existing_particles() {
        let mut demo = DemoParticles::new(10, Vec3::splat(2.0), 1);
        let before = demo.positions().to_vec();
        demo.set_count(20);
        assert_eq!(demo.count(), 20);
        assert_eq!(&demo.positions()[..10], &before[..]);

        demo.set_count(5);
        assert_eq!(demo.simulation_state().particle_count, 5);
        assert_eq!(demo.gpu_positions().len(), 5);
    }

    #[test]
    fn test_wave_moves_particles() {
        let mut demo = DemoParticles::new(50, Vec3::splat(2.0), 3);
        let before = demo.positions().to_vec();
        demo.update(0.5);
        assert_ne!(before, demo.positions());
    }
}
