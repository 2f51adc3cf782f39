//! Force-directed layout.
//!
//! Edges act as springs toward a preferred length, every pair of nodes repels,
//! and a weak pull toward the origin keeps disconnected parts on screen.
//! Velocities are integrated with damping, a bounded number of steps at a time,
//! so the caller decides how much simulation runs per frame.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    /// Preferred edge length
    pub spring_length: f64,
    pub spring_constant: f64,
    /// Pairwise repulsion strength (inverse-square)
    pub repulsion: f64,
    pub central_gravity: f64,
    pub damping: f64,
    pub timestep: f64,
    pub max_velocity: f64,
    /// Below this speed every node counts as at rest
    pub min_velocity: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            spring_length: 200.0,
            spring_constant: 0.04,
            repulsion: 80_000.0,
            central_gravity: 0.01,
            damping: 0.09,
            timestep: 0.5,
            max_velocity: 50.0,
            min_velocity: 0.75,
        }
    }
}

/// Iterations run after a rebuild or physics change before the layout may rest.
pub const STABILIZATION_ITERATIONS: u32 = 100;

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

#[derive(Debug, Clone)]
pub struct ForceLayout {
    positions: Vec<Point>,
    velocities: Vec<Point>,
    /// Index pairs; edges with unknown endpoints are left out by the caller
    springs: Vec<(usize, usize)>,
    params: PhysicsParams,
    enabled: bool,
    remaining: u32,
    settled: bool,
}

impl ForceLayout {
    pub fn new(node_count: usize, springs: Vec<(usize, usize)>, params: PhysicsParams) -> Self {
        // Sunflower seeding: deterministic and evenly spread.
        let positions = (0..node_count)
            .map(|i| {
                let radius = 60.0 * ((i as f64) + 0.5).sqrt();
                let angle = (i as f64) * GOLDEN_ANGLE;
                Point::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect();

        Self {
            positions,
            velocities: vec![Point::default(); node_count],
            springs,
            params,
            enabled: true,
            remaining: STABILIZATION_ITERATIONS,
            settled: false,
        }
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn position(&self, index: usize) -> Option<Point> {
        self.positions.get(index).copied()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_settled(&self) -> bool {
        !self.enabled || self.settled
    }

    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    /// Switch the simulation on or off and re-arm stabilization.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            for v in &mut self.velocities {
                *v = Point::default();
            }
        }
        self.restart();
    }

    pub fn restart(&mut self) {
        self.remaining = STABILIZATION_ITERATIONS;
        self.settled = false;
    }

    /// Pin a node somewhere (e.g. while dragging) and let the rest react.
    pub fn move_node(&mut self, index: usize, to: Point) {
        if let Some(p) = self.positions.get_mut(index) {
            *p = to;
            self.velocities[index] = Point::default();
            self.restart();
        }
    }

    /// Run up to `steps` iterations. Returns true if anything moved.
    pub fn advance(&mut self, steps: u32) -> bool {
        let mut moved = false;
        for _ in 0..steps {
            if self.is_settled() {
                break;
            }
            let max_speed = self.step();
            moved = true;
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 && max_speed < self.params.min_velocity {
                self.settled = true;
            }
        }
        moved
    }

    /// Bounding box of all nodes as `(min, max)`.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    fn step(&mut self) -> f64 {
        let n = self.positions.len();
        let p = self.params;
        let mut forces = vec![Point::default(); n];

        // Springs: attract when stretched, push apart when compressed.
        for &(a, b) in &self.springs {
            if a == b || a >= n || b >= n {
                continue;
            }
            let dx = self.positions[b].x - self.positions[a].x;
            let dy = self.positions[b].y - self.positions[a].y;
            let dist = (dx * dx + dy * dy).sqrt().max(0.01);
            let f = p.spring_constant * (dist - p.spring_length);
            let (fx, fy) = (f * dx / dist, f * dy / dist);
            forces[a].x += fx;
            forces[a].y += fy;
            forces[b].x -= fx;
            forces[b].y -= fy;
        }

        // Pairwise repulsion, O(n^2) is fine at the sizes we render.
        for a in 0..n {
            for b in (a + 1)..n {
                let mut dx = self.positions[b].x - self.positions[a].x;
                let mut dy = self.positions[b].y - self.positions[a].y;
                let mut dist2 = dx * dx + dy * dy;
                if dist2 < 1e-4 {
                    // Coincident nodes: nudge apart along a fixed direction.
                    dx = 0.1 * ((a + 1) as f64);
                    dy = 0.1;
                    dist2 = dx * dx + dy * dy;
                }
                let dist = dist2.sqrt();
                let f = p.repulsion / dist2;
                let (fx, fy) = (f * dx / dist, f * dy / dist);
                forces[a].x -= fx;
                forces[a].y -= fy;
                forces[b].x += fx;
                forces[b].y += fy;
            }
        }

        let mut max_speed: f64 = 0.0;
        for i in 0..n {
            let pos = self.positions[i];
            let fx = forces[i].x - p.central_gravity * pos.x;
            let fy = forces[i].y - p.central_gravity * pos.y;

            let v = &mut self.velocities[i];
            v.x += (fx - p.damping * v.x) * p.timestep;
            v.y += (fy - p.damping * v.y) * p.timestep;

            let speed = (v.x * v.x + v.y * v.y).sqrt();
            if speed > p.max_velocity {
                v.x *= p.max_velocity / speed;
                v.y *= p.max_velocity / speed;
            }
            max_speed = max_speed.max(speed.min(p.max_velocity));

            self.positions[i].x += v.x * p.timestep;
            self.positions[i].y += v.y * p.timestep;
        }
        max_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeding_is_deterministic_and_distinct() {
        let a = ForceLayout::new(10, vec![], PhysicsParams::default());
        let b = ForceLayout::new(10, vec![], PhysicsParams::default());
        assert_eq!(a.positions(), b.positions());

        for i in 0..10 {
            for j in (i + 1)..10 {
                assert!(a.positions()[i].distance(&a.positions()[j]) > 1.0);
            }
        }
    }

    #[test]
    fn test_connected_pair_approaches_spring_length() {
        let mut layout = ForceLayout::new(2, vec![(0, 1)], PhysicsParams::default());
        for _ in 0..50 {
            layout.advance(100);
        }
        let d = layout.positions()[0].distance(&layout.positions()[1]);
        assert!(d > 150.0 && d < 400.0, "distance {}", d);
    }

    #[test]
    fn test_disabled_layout_does_not_move() {
        let mut layout = ForceLayout::new(3, vec![(0, 1), (1, 2)], PhysicsParams::default());
        layout.set_enabled(false);
        let before = layout.positions().to_vec();
        assert!(!layout.advance(50));
        assert_eq!(layout.positions(), &before[..]);
        assert!(layout.is_settled());
    }

    #[test]
    fn test_reenabling_restarts_simulation() {
        let mut layout = ForceLayout::new(3, vec![(0, 1)], PhysicsParams::default());
        layout.set_enabled(false);
        layout.set_enabled(true);
        assert!(!layout.is_settled());
        assert!(layout.advance(1));
    }

    #[test]
    fn test_eventually_settles() {
        let mut layout = ForceLayout::new(4, vec![(0, 1), (1, 2), (2, 3)], PhysicsParams::default());
        for _ in 0..200 {
            layout.advance(50);
        }
        assert!(layout.is_settled());
    }

    #[test]
    fn test_move_node_pins_position() {
        let mut layout = ForceLayout::new(2, vec![], PhysicsParams::default());
        layout.move_node(1, Point::new(500.0, -500.0));
        assert_eq!(layout.position(1), Some(Point::new(500.0, -500.0)));
        assert!(!layout.is_settled());
    }

    #[test]
    fn test_bounds() {
        assert!(ForceLayout::new(0, vec![], PhysicsParams::default()).bounds().is_none());
        let mut layout = ForceLayout::new(2, vec![], PhysicsParams::default());
        layout.move_node(0, Point::new(-10.0, 5.0));
        layout.move_node(1, Point::new(20.0, -5.0));
        let (lo, hi) = layout.bounds().unwrap();
        assert_eq!(lo, Point::new(-10.0, -5.0));
        assert_eq!(hi, Point::new(20.0, 5.0));
    }
}
