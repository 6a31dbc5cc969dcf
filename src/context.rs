use std::fmt;
use std::str::FromStr;

use crate::algorithms::Error;
use crate::Weight;

/// Which partitioning scheme drives the overall run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    RecursiveBipartitioning,
    Direct,
    DeepMultilevel,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self, Error> {
        match mode {
            "rb" => Ok(Mode::RecursiveBipartitioning),
            "direct" => Ok(Mode::Direct),
            "deep" => Ok(Mode::DeepMultilevel),
            _ => Err(Error::UnknownOption {
                option: mode.to_string(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::RecursiveBipartitioning => write!(f, "recursive_bipartitioning"),
            Mode::Direct => write!(f, "direct_kway"),
            Mode::DeepMultilevel => write!(f, "deep_multilevel"),
        }
    }
}

/// The cut-like quantity the partitioner minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Cut,
    Km1,
    Soed,
    ProcessMapping,
}

impl FromStr for Objective {
    type Err = Error;

    fn from_str(objective: &str) -> Result<Self, Error> {
        match objective {
            "cut" => Ok(Objective::Cut),
            "km1" => Ok(Objective::Km1),
            "soed" => Ok(Objective::Soed),
            "process_mapping" => Ok(Objective::ProcessMapping),
            _ => Err(Error::UnknownOption {
                option: objective.to_string(),
            }),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Cut => write!(f, "cut"),
            Objective::Km1 => write!(f, "km1"),
            Objective::Soed => write!(f, "soed"),
            Objective::ProcessMapping => write!(f, "process_mapping"),
        }
    }
}

/// Whether a context belongs to the top-level run or to a nested
/// initial-partitioning call. Nested contexts keep quiet in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextType {
    Main,
    InitialPartitioning,
}

impl FromStr for ContextType {
    type Err = Error;

    fn from_str(context_type: &str) -> Result<Self, Error> {
        match context_type {
            "main" => Ok(ContextType::Main),
            "ip" => Ok(ContextType::InitialPartitioning),
            _ => Err(Error::UnknownOption {
                option: context_type.to_string(),
            }),
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextType::Main => write!(f, "main"),
            ContextType::InitialPartitioning => write!(f, "ip"),
        }
    }
}

/// Acceptance criterion used by the coarsening rater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptancePolicy {
    BestPreferUnmatched,
}

impl FromStr for AcceptancePolicy {
    type Err = Error;

    fn from_str(policy: &str) -> Result<Self, Error> {
        match policy {
            "best_prefer_unmatched" => Ok(AcceptancePolicy::BestPreferUnmatched),
            _ => Err(Error::UnknownOption {
                option: policy.to_string(),
            }),
        }
    }
}

impl fmt::Display for AcceptancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptancePolicy::BestPreferUnmatched => write!(f, "best_prefer_unmatched"),
        }
    }
}

/// Knobs read by the external refinement engines. The driver only carries
/// them through to sub-contexts.
#[derive(Debug, Clone, Copy)]
pub struct RefinementParameters {
    /// Rounds without improvement before the refiner terminates.
    pub iterations: u32,

    /// Ratio in [0, 1] deciding which slightly negative gain moves stay
    /// eligible in the refiner's first filter.
    pub filter_ratio: f64,

    /// Factor in [0, 1]; improvements below it do not reset the refiner's
    /// iteration counter.
    pub tolerance_factor: f64,

    /// Acceptance criterion used by the coarsening rater.
    pub acceptance_policy: AcceptancePolicy,
}

impl Default for RefinementParameters {
    fn default() -> Self {
        RefinementParameters {
            iterations: 12,
            filter_ratio: 0.75,
            tolerance_factor: 0.99,
            acceptance_policy: AcceptancePolicy::BestPreferUnmatched,
        }
    }
}

/// Passive record describing a partitioning run.
#[derive(Debug, Clone)]
pub struct Context {
    /// Final number of blocks.
    pub k: usize,

    /// Balance tolerance; ignored when individual part weights are used.
    pub epsilon: f64,

    pub objective: Objective,
    pub mode: Mode,
    pub context_type: ContextType,

    /// Scheduler sizing.
    pub num_threads: usize,
    pub degree_of_parallelism: f64,

    /// Per-block targets. Filled by `setup_part_weights` unless
    /// `use_individual_part_weights` is set, in which case the caller
    /// provides `max_part_weights` explicitly.
    pub perfect_balance_part_weights: Vec<Weight>,
    pub max_part_weights: Vec<Weight>,
    pub use_individual_part_weights: bool,

    /// Keep the relative order of hyperedges when extracting a block.
    pub stable_construction_of_incident_edges: bool,

    pub refinement: RefinementParameters,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            k: 2,
            epsilon: 0.03,
            objective: Objective::Km1,
            mode: Mode::Direct,
            context_type: ContextType::Main,
            num_threads: 1,
            degree_of_parallelism: 1.0,
            perfect_balance_part_weights: Vec::new(),
            max_part_weights: Vec::new(),
            use_individual_part_weights: false,
            stable_construction_of_incident_edges: false,
            refinement: RefinementParameters::default(),
        }
    }
}

impl Context {
    /// Fill the per-block weight targets for the given total weight.
    ///
    /// With individual part weights the caller-provided maxima are kept and
    /// serve as the perfect weights as well. Otherwise every block gets the
    /// perfect weight `ceil(total / k)` and the maximum `(1 + epsilon)` times
    /// that.
    ///
    /// Panics when individual part weights are requested but
    /// `max_part_weights` does not have `k` entries.
    pub fn setup_part_weights(&mut self, total_weight: Weight) {
        if self.use_individual_part_weights {
            if self.max_part_weights.len() != self.k {
                panic!(
                    "expected {} individual part weights, got {}",
                    self.k,
                    self.max_part_weights.len()
                );
            }
            if self.perfect_balance_part_weights.len() != self.k {
                self.perfect_balance_part_weights = self.max_part_weights.clone();
            }
        } else {
            let perfect = (total_weight as f64 / self.k as f64).ceil() as Weight;
            let max = ((1.0 + self.epsilon) * perfect as f64) as Weight;
            self.perfect_balance_part_weights = vec![perfect; self.k];
            self.max_part_weights = vec![max; self.k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_string() {
        // Arrange and Act
        let rb: Mode = "rb".parse().unwrap();
        let direct: Mode = "direct".parse().unwrap();
        let deep: Mode = "deep".parse().unwrap();

        // Assert
        assert_eq!(rb, Mode::RecursiveBipartitioning);
        assert_eq!(direct, Mode::Direct);
        assert_eq!(deep, Mode::DeepMultilevel);
    }

    #[test]
    fn test_unknown_mode_fails_loudly() {
        // Act
        let result = "recursive".parse::<Mode>();

        // Assert
        assert!(matches!(
            result,
            Err(Error::UnknownOption { option }) if option == "recursive"
        ));
    }

    #[test]
    fn test_objective_round_trip() {
        // Arrange
        let objectives = [
            Objective::Cut,
            Objective::Km1,
            Objective::Soed,
            Objective::ProcessMapping,
        ];

        // Act and Assert
        for objective in objectives {
            assert_eq!(objective.to_string().parse::<Objective>().unwrap(), objective);
        }
    }

    #[test]
    fn test_unknown_acceptance_policy_is_an_error() {
        // Act
        let result = "best".parse::<AcceptancePolicy>();

        // Assert
        assert!(matches!(result, Err(Error::UnknownOption { .. })));
    }

    #[test]
    fn test_mode_display_uses_long_names() {
        assert_eq!(Mode::RecursiveBipartitioning.to_string(), "recursive_bipartitioning");
        assert_eq!(Mode::Direct.to_string(), "direct_kway");
        assert_eq!(ContextType::InitialPartitioning.to_string(), "ip");
    }

    #[test]
    fn test_setup_part_weights() {
        // Arrange
        let mut context = Context {
            k: 4,
            epsilon: 0.03,
            ..Context::default()
        };

        // Act
        context.setup_part_weights(100);

        // Assert
        assert_eq!(context.perfect_balance_part_weights, vec![25, 25, 25, 25]);
        assert_eq!(context.max_part_weights, vec![25, 25, 25, 25]);
    }

    #[test]
    fn test_setup_part_weights_individual() {
        // Arrange
        let mut context = Context {
            k: 2,
            use_individual_part_weights: true,
            max_part_weights: vec![30, 70],
            ..Context::default()
        };

        // Act
        context.setup_part_weights(100);

        // Assert
        assert_eq!(context.max_part_weights, vec![30, 70]);
        assert_eq!(context.perfect_balance_part_weights, vec![30, 70]);
    }
}
