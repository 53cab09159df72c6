use ts_core::{AgentId, MAX_SIGHT_RADIUS, Position};

use crate::registry::AgentRegistry;

/// Uniform-grid index over agent positions.
///
/// A derived, disposable view of the registry: buckets hold ids and
/// positions, never agents. Rebuilt once per tick before the Sense phase and
/// read-only afterwards. With a bucket size equal to the largest possible
/// sight radius, a query touches at most a 3x3 block of buckets, and results
/// are exact.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    width: f64,
    height: f64,
    bucket_size: f64,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<(AgentId, Position)>>,
}

impl SpatialIndex {
    /// Create an empty index covering a `width x height` world.
    pub fn new(width: u32, height: u32) -> Self {
        let bucket_size = MAX_SIGHT_RADIUS;
        let cols = (f64::from(width) / bucket_size).ceil().max(1.0) as usize;
        let rows = (f64::from(height) / bucket_size).ceil().max(1.0) as usize;
        Self {
            width: f64::from(width),
            height: f64::from(height),
            bucket_size,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
        }
    }

    /// Replace the contents with the registry's current positions.
    pub fn rebuild(&mut self, registry: &AgentRegistry) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for agent in registry.iter_alive() {
            if let Some(index) = self.bucket_of(agent.position) {
                self.buckets[index].push((agent.id, agent.position));
            }
        }
    }

    /// Ids of indexed agents within `radius` of `position`, ascending.
    ///
    /// A query centred outside the world, or with a negative or non-finite
    /// radius, returns nothing.
    pub fn nearby(&self, position: Position, radius: f64) -> Vec<AgentId> {
        let valid_radius = radius.is_finite() && radius >= 0.0;
        if !valid_radius || !self.contains(position) {
            return Vec::new();
        }
        let (min_col, max_col) = self.span(position.x - radius, position.x + radius, self.cols);
        let (min_row, max_row) = self.span(position.y - radius, position.y + radius, self.rows);
        let radius_sq = radius * radius;

        let mut found = Vec::new();
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                for (id, pos) in &self.buckets[row * self.cols + col] {
                    if pos.distance_sq(position) <= radius_sq {
                        found.push(*id);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// Number of indexed agents.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Return `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    fn contains(&self, position: Position) -> bool {
        position.is_finite()
            && (0.0..self.width).contains(&position.x)
            && (0.0..self.height).contains(&position.y)
    }

    fn bucket_of(&self, position: Position) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }
        let col = ((position.x / self.bucket_size) as usize).min(self.cols - 1);
        let row = ((position.y / self.bucket_size) as usize).min(self.rows - 1);
        Some(row * self.cols + col)
    }

    fn span(&self, low: f64, high: f64, count: usize) -> (usize, usize) {
        let first = (low / self.bucket_size).floor().max(0.0) as usize;
        let last = (high / self.bucket_size).floor().max(0.0) as usize;
        (first.min(count - 1), last.min(count - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventLog;
    use crate::registry::NewAgent;
    use ts_core::Genome;

    fn registry_with(points: &[(f64, f64)]) -> AgentRegistry {
        let mut registry = AgentRegistry::new(100);
        let mut log = EventLog::new(0);
        for &(x, y) in points {
            registry
                .spawn(
                    NewAgent::seeded(Position::new(x, y), Genome::baseline(), 10.0),
                    0,
                    &mut log,
                )
                .unwrap();
        }
        registry
    }

    #[test]
    fn nearby_is_exact_across_buckets() {
        let registry = registry_with(&[(9.5, 9.5), (10.5, 10.5), (15.0, 15.0), (30.0, 30.0)]);
        let mut index = SpatialIndex::new(40, 40);
        index.rebuild(&registry);
        assert_eq!(index.len(), 4);

        let found = index.nearby(Position::new(10.0, 10.0), 1.0);
        assert_eq!(found, vec![AgentId(1), AgentId(2)]);

        let wide = index.nearby(Position::new(10.0, 10.0), 10.0);
        assert_eq!(wide, vec![AgentId(1), AgentId(2), AgentId(3)]);
    }

    #[test]
    fn nearby_matches_brute_force() {
        let points: Vec<(f64, f64)> = (0..50)
            .map(|i| ((i * 7 % 23) as f64 + 0.3, (i * 11 % 19) as f64 + 0.6))
            .collect();
        let registry = registry_with(&points);
        let mut index = SpatialIndex::new(25, 20);
        index.rebuild(&registry);

        let centre = Position::new(12.0, 9.0);
        for radius in [0.5, 3.0, 7.5, 10.0] {
            let expected: Vec<AgentId> = registry
                .iter_alive()
                .filter(|a| a.position.distance(centre) <= radius)
                .map(|a| a.id)
                .collect();
            assert_eq!(index.nearby(centre, radius), expected);
        }
    }

    #[test]
    fn out_of_bounds_query_is_empty() {
        let registry = registry_with(&[(1.0, 1.0)]);
        let mut index = SpatialIndex::new(10, 10);
        index.rebuild(&registry);
        assert!(index.nearby(Position::new(-1.0, 1.0), 5.0).is_empty());
        assert!(index.nearby(Position::new(1.0, 10.0), 5.0).is_empty());
        assert!(index.nearby(Position::new(f64::NAN, 1.0), 5.0).is_empty());
        assert!(index.nearby(Position::new(1.0, 1.0), -1.0).is_empty());
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let mut index = SpatialIndex::new(10, 10);
        index.rebuild(&registry_with(&[(1.0, 1.0), (2.0, 2.0)]));
        index.rebuild(&registry_with(&[(5.0, 5.0)]));
        assert_eq!(index.len(), 1);
        assert!(index.nearby(Position::new(1.0, 1.0), 1.0).is_empty());
    }
}
