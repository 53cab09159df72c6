//! Heritable traits and the operators that recombine and perturb them.
//!
//! A [`Genome`] is a fixed, ordered vector of bounded genes, one per
//! [`TraitKind`]. Every operator here is a pure function of its inputs and the
//! caller's RNG stream, so identical seeds breed identical lineages. Bounds are
//! enforced by clamping: a gene pushed past its range lands on the boundary.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::grid::WorldGrid;

/// Number of genes in every genome.
pub const TRAIT_COUNT: usize = 5;

/// Upper bound of the sight-radius trait, in world units.
pub const MAX_SIGHT_RADIUS: f64 = 10.0;

/// A heritable characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    /// Fraction of the configured maximum step moved per tick.
    Speed,
    /// Sensing radius in world units.
    SightRadius,
    /// Scales the per-tick energy cost.
    Metabolism,
    /// Shortens the reproduction cooldown.
    Fertility,
    /// Age in ticks at which the agent dies of old age.
    Longevity,
}

impl TraitKind {
    /// All traits in genome order.
    pub const ALL: [TraitKind; TRAIT_COUNT] = [
        TraitKind::Speed,
        TraitKind::SightRadius,
        TraitKind::Metabolism,
        TraitKind::Fertility,
        TraitKind::Longevity,
    ];

    /// Position of this trait's gene in the genome.
    pub fn index(self) -> usize {
        match self {
            Self::Speed => 0,
            Self::SightRadius => 1,
            Self::Metabolism => 2,
            Self::Fertility => 3,
            Self::Longevity => 4,
        }
    }

    /// Declared legal range of this trait.
    pub fn bounds(self) -> TraitBounds {
        match self {
            Self::Speed => TraitBounds::new(0.0, 1.0),
            Self::SightRadius => TraitBounds::new(1.0, MAX_SIGHT_RADIUS),
            Self::Metabolism => TraitBounds::new(0.05, 1.0),
            Self::Fertility => TraitBounds::new(0.0, 1.0),
            Self::Longevity => TraitBounds::new(20.0, 1000.0),
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Speed => write!(f, "speed"),
            Self::SightRadius => write!(f, "sight"),
            Self::Metabolism => write!(f, "metabolism"),
            Self::Fertility => write!(f, "fertility"),
            Self::Longevity => write!(f, "longevity"),
        }
    }
}

/// Inclusive `[min, max]` range of a trait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraitBounds {
    /// Smallest legal value.
    pub min: f64,
    /// Largest legal value.
    pub max: f64,
}

impl TraitBounds {
    /// Create a range. `min` must not exceed `max`.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Width of the range.
    pub fn span(self) -> f64 {
        self.max - self.min
    }

    /// Clamp `value` into the range.
    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Whether `value` lies within the range.
    pub fn contains(self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Map a fraction in `[0, 1]` onto the range.
    pub fn lerp(self, fraction: f64) -> f64 {
        self.clamp(self.min + fraction * self.span())
    }
}

/// Parameters of the mutation operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationParams {
    /// Per-gene probability of mutating.
    pub rate: f64,
    /// Standard deviation of a mutation as a fraction of the trait span.
    pub magnitude: f64,
    /// Probability that a mutation uses the widened deviation.
    pub big_mutation_chance: f64,
    /// Multiplier applied to the deviation of a big mutation.
    pub big_mutation_factor: f64,
}

impl Default for MutationParams {
    fn default() -> Self {
        Self {
            rate: 0.05,
            magnitude: 0.05,
            big_mutation_chance: 0.1,
            big_mutation_factor: 3.0,
        }
    }
}

impl MutationParams {
    /// Largest absolute change a single mutation can apply to `kind`.
    pub fn max_delta(&self, kind: TraitKind) -> f64 {
        3.0 * self.magnitude.abs() * self.big_mutation_factor.max(1.0) * kind.bounds().span()
    }
}

/// Parameters of the inheritance operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InheritanceParams {
    /// Probability that a gene is taken from the first parent.
    pub crossover_bias: f64,
    /// Mutation applied after crossover.
    pub mutation: MutationParams,
}

impl Default for InheritanceParams {
    fn default() -> Self {
        Self {
            crossover_bias: 0.5,
            mutation: MutationParams::default(),
        }
    }
}

/// A single gene changed by mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneMutation {
    /// Which trait changed.
    pub gene: TraitKind,
    /// Value before mutation.
    pub before: f64,
    /// Value after mutation and clamping.
    pub after: f64,
}

/// Output of a mutating operator: the new genome and what changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutated {
    /// The resulting genome.
    pub genome: Genome,
    /// Genes whose value changed, in genome order.
    pub mutations: Vec<GeneMutation>,
}

/// Environmental context for [`Genome::fitness_proxy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// Mean resource fill ratio of the world, in `[0, 1]`.
    pub resource_density: f64,
}

impl Environment {
    /// Derive the environment from the current state of a grid.
    pub fn from_grid(grid: &WorldGrid) -> Self {
        Self {
            resource_density: grid.mean_resource_density(),
        }
    }
}

/// The heritable trait vector of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; TRAIT_COUNT]", into = "[f64; TRAIT_COUNT]")]
pub struct Genome {
    genes: [f64; TRAIT_COUNT],
}

impl Genome {
    /// Build a genome from raw gene values in [`TraitKind::ALL`] order.
    ///
    /// Out-of-range values are clamped; non-finite values are rejected.
    pub fn new(genes: [f64; TRAIT_COUNT]) -> CoreResult<Self> {
        let mut clamped = [0.0; TRAIT_COUNT];
        for kind in TraitKind::ALL {
            let value = genes[kind.index()];
            if !value.is_finite() {
                return Err(CoreError::InvalidGenome(format!(
                    "{kind} gene is not finite: {value}"
                )));
            }
            clamped[kind.index()] = kind.bounds().clamp(value);
        }
        Ok(Self { genes: clamped })
    }

    /// A middle-of-the-road genome, useful as a seed and in tests.
    pub fn baseline() -> Self {
        Self {
            genes: [0.5, 3.0, 0.5, 0.5, 300.0],
        }
    }

    /// A genome with every gene drawn uniformly from its range.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut genes = [0.0; TRAIT_COUNT];
        for kind in TraitKind::ALL {
            genes[kind.index()] = kind.bounds().lerp(rng.random::<f64>());
        }
        Self { genes }
    }

    /// Return a copy with one gene replaced (clamped). Non-finite values are ignored.
    pub fn with(mut self, kind: TraitKind, value: f64) -> Self {
        if value.is_finite() {
            self.genes[kind.index()] = kind.bounds().clamp(value);
        }
        self
    }

    /// Value of one gene.
    pub fn get(&self, kind: TraitKind) -> f64 {
        self.genes[kind.index()]
    }

    /// All gene values in genome order.
    pub fn genes(&self) -> &[f64; TRAIT_COUNT] {
        &self.genes
    }

    /// Iterate `(trait, value)` pairs in genome order.
    pub fn iter(&self) -> impl Iterator<Item = (TraitKind, f64)> + '_ {
        TraitKind::ALL.iter().map(|&k| (k, self.get(k)))
    }

    /// Speed gene.
    pub fn speed(&self) -> f64 {
        self.get(TraitKind::Speed)
    }

    /// Sight-radius gene.
    pub fn sight_radius(&self) -> f64 {
        self.get(TraitKind::SightRadius)
    }

    /// Metabolism gene.
    pub fn metabolism(&self) -> f64 {
        self.get(TraitKind::Metabolism)
    }

    /// Fertility gene.
    pub fn fertility(&self) -> f64 {
        self.get(TraitKind::Fertility)
    }

    /// Longevity gene.
    pub fn longevity(&self) -> f64 {
        self.get(TraitKind::Longevity)
    }

    /// Whether every gene lies within its declared bounds.
    pub fn in_bounds(&self) -> bool {
        self.iter().all(|(k, v)| k.bounds().contains(v))
    }

    /// Mean span-normalized absolute difference to `other`, in `[0, 1]`.
    pub fn distance(&self, other: &Genome) -> f64 {
        let total: f64 = TraitKind::ALL
            .iter()
            .map(|&k| (self.get(k) - other.get(k)).abs() / k.bounds().span())
            .sum();
        total / TRAIT_COUNT as f64
    }

    /// Per-gene crossover: each gene comes from `self` with probability
    /// `bias`, otherwise from `other`.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &Genome, bias: f64, rng: &mut R) -> Genome {
        let mut genes = [0.0; TRAIT_COUNT];
        for (i, gene) in genes.iter_mut().enumerate() {
            *gene = if rng.random::<f64>() < bias {
                self.genes[i]
            } else {
                other.genes[i]
            };
        }
        Genome { genes }
    }

    /// Perturb each gene with probability `params.rate` by a truncated
    /// Gaussian delta, clamping the result to the trait's bounds.
    pub fn mutate<R: Rng + ?Sized>(&self, params: &MutationParams, rng: &mut R) -> Mutated {
        let mut genes = self.genes;
        let mut mutations = Vec::new();
        for kind in TraitKind::ALL {
            if rng.random::<f64>() >= params.rate {
                continue;
            }
            let bounds = kind.bounds();
            let mut sigma = params.magnitude.abs() * bounds.span();
            if rng.random::<f64>() < params.big_mutation_chance {
                sigma *= params.big_mutation_factor.max(1.0);
            }
            let delta = standard_normal(rng).clamp(-3.0, 3.0) * sigma;
            let before = genes[kind.index()];
            let after = bounds.clamp(before + delta);
            if after != before {
                genes[kind.index()] = after;
                mutations.push(GeneMutation {
                    gene: kind,
                    before,
                    after,
                });
            }
        }
        Mutated {
            genome: Genome { genes },
            mutations,
        }
    }

    /// Breed a child genome: crossover of both parents followed by mutation.
    pub fn inherit<R: Rng + ?Sized>(
        parent_a: &Genome,
        parent_b: &Genome,
        params: &InheritanceParams,
        rng: &mut R,
    ) -> Mutated {
        parent_a
            .crossover(parent_b, params.crossover_bias, rng)
            .mutate(&params.mutation, rng)
    }

    /// Analytics-only scalar estimating how well this genome forages in
    /// `env`. Higher is better. Never used for selection.
    pub fn fitness_proxy(&self, env: &Environment) -> f64 {
        let reach = (self.sight_radius() / MAX_SIGHT_RADIUS) * (0.5 + 0.5 * self.speed());
        reach * env.resource_density.clamp(0.0, 1.0) / self.metabolism()
    }
}

impl Default for Genome {
    fn default() -> Self {
        Self::baseline()
    }
}

impl TryFrom<[f64; TRAIT_COUNT]> for Genome {
    type Error = CoreError;

    fn try_from(genes: [f64; TRAIT_COUNT]) -> CoreResult<Self> {
        Self::new(genes)
    }
}

impl From<Genome> for [f64; TRAIT_COUNT] {
    fn from(genome: Genome) -> Self {
        genome.genes
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v:.2}")).collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// One draw from the standard normal distribution (Box-Muller).
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn arb_genome() -> impl Strategy<Value = Genome> {
        proptest::array::uniform5(0.0f64..=1.0).prop_map(|fractions| {
            let mut genes = [0.0; TRAIT_COUNT];
            for kind in TraitKind::ALL {
                genes[kind.index()] = kind.bounds().lerp(fractions[kind.index()]);
            }
            Genome::new(genes).unwrap()
        })
    }

    #[test]
    fn new_clamps_out_of_range_genes() {
        let genome = Genome::new([2.0, 0.0, 5.0, -1.0, 10_000.0]).unwrap();
        assert_eq!(genome.speed(), 1.0);
        assert_eq!(genome.sight_radius(), 1.0);
        assert_eq!(genome.metabolism(), 1.0);
        assert_eq!(genome.fertility(), 0.0);
        assert_eq!(genome.longevity(), 1000.0);
    }

    #[test]
    fn new_rejects_non_finite() {
        assert!(Genome::new([f64::NAN, 1.0, 0.5, 0.5, 100.0]).is_err());
    }

    #[test]
    fn with_ignores_non_finite() {
        let genome = Genome::baseline().with(TraitKind::Speed, f64::INFINITY);
        assert_eq!(genome.speed(), 0.5);
    }

    #[test]
    fn distance_of_identical_genomes_is_zero() {
        let g = Genome::baseline();
        assert_eq!(g.distance(&g), 0.0);
    }

    #[test]
    fn distance_of_extremes_is_one() {
        let low = Genome::new([0.0, 1.0, 0.05, 0.0, 20.0]).unwrap();
        let high = Genome::new([1.0, 10.0, 1.0, 1.0, 1000.0]).unwrap();
        assert!((low.distance(&high) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn crossover_bias_one_copies_first_parent() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Genome::baseline();
        let b = Genome::random(&mut rng);
        assert_eq!(a.crossover(&b, 1.0, &mut rng), a);
        assert_eq!(a.crossover(&b, 0.0, &mut rng), b);
    }

    #[test]
    fn zero_rate_never_mutates() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = MutationParams {
            rate: 0.0,
            ..MutationParams::default()
        };
        let out = Genome::baseline().mutate(&params, &mut rng);
        assert!(out.mutations.is_empty());
        assert_eq!(out.genome, Genome::baseline());
    }

    #[test]
    fn full_rate_reports_every_change() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = MutationParams {
            rate: 1.0,
            ..MutationParams::default()
        };
        let original = Genome::baseline();
        let out = original.mutate(&params, &mut rng);
        for m in &out.mutations {
            assert_eq!(m.before, original.get(m.gene));
            assert_eq!(m.after, out.genome.get(m.gene));
            assert!((m.after - m.before).abs() <= params.max_delta(m.gene) + 1e-9);
        }
        for kind in TraitKind::ALL {
            let changed = out.mutations.iter().any(|m| m.gene == kind);
            assert_eq!(changed, out.genome.get(kind) != original.get(kind));
        }
    }

    #[test]
    fn fitness_proxy_prefers_lean_metabolism() {
        let env = Environment {
            resource_density: 0.8,
        };
        let lean = Genome::baseline().with(TraitKind::Metabolism, 0.1);
        let hungry = Genome::baseline().with(TraitKind::Metabolism, 0.9);
        assert!(lean.fitness_proxy(&env) > hungry.fitness_proxy(&env));
        let barren = Environment {
            resource_density: 0.0,
        };
        assert_eq!(lean.fitness_proxy(&barren), 0.0);
    }

    #[test]
    fn deserialization_clamps_and_rejects() {
        let genome: Genome = serde_json::from_str("[2.0, 3.0, 0.5, 0.5, 300.0]").unwrap();
        assert_eq!(genome.speed(), 1.0);
        assert!(serde_json::from_str::<Genome>("[0.5, 3.0]").is_err());
    }

    proptest! {
        #[test]
        fn inherit_stays_within_bounds(
            a in arb_genome(),
            b in arb_genome(),
            seed in any::<u64>(),
            rate in 0.0f64..=1.0,
            magnitude in 0.0f64..=2.0,
            bias in 0.0f64..=1.0,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let params = InheritanceParams {
                crossover_bias: bias,
                mutation: MutationParams { rate, magnitude, ..MutationParams::default() },
            };
            let child = Genome::inherit(&a, &b, &params, &mut rng);
            prop_assert!(child.genome.in_bounds());
        }

        #[test]
        fn inherit_is_reproducible(a in arb_genome(), b in arb_genome(), seed in any::<u64>()) {
            let params = InheritanceParams::default();
            let first = Genome::inherit(&a, &b, &params, &mut StdRng::seed_from_u64(seed));
            let second = Genome::inherit(&a, &b, &params, &mut StdRng::seed_from_u64(seed));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn unmutated_genes_come_from_a_parent(a in arb_genome(), b in arb_genome(), seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let child = Genome::inherit(&a, &b, &InheritanceParams::default(), &mut rng);
            for kind in TraitKind::ALL {
                if child.mutations.iter().all(|m| m.gene != kind) {
                    let v = child.genome.get(kind);
                    prop_assert!(v == a.get(kind) || v == b.get(kind));
                }
            }
        }
    }
}
