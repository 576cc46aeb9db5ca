use serde::{Deserialize, Serialize};

/// Configuration for the simulated-annealing floorplanner.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SAConfig {
    /// Starting temperature of the annealing schedule.
    pub initial_temperature: f64,
    /// Temperature at which the schedule stops.
    pub final_temperature: f64,
    /// Geometric cooling factor applied after every temperature step.
    pub cooling_rate: f64,
    /// Number of proposed moves per temperature step.
    pub iterations_per_temperature: usize,
    /// Stop after this many consecutive proposals without a new best.
    pub no_improvement_limit: usize,
    /// Probability of a module rotation per proposal.
    pub prob_rotate: f64,
    /// Probability of a node move per proposal.
    pub prob_move: f64,
    /// Probability of a node swap per proposal.
    pub prob_swap: f64,
    /// Probability of changing a pair representative per proposal.
    pub prob_change_representative: f64,
    /// Probability of converting a group's symmetry type per proposal.
    pub prob_convert_symmetry: f64,
    /// Weight of the bounding-box area in the cost function.
    pub area_weight: f64,
    /// Weight of the HPWL wirelength in the cost function.
    pub wirelength_weight: f64,
    /// Seed for the PRNG. If undefined, the optimizer seeds from entropy.
    pub prng_seed: Option<u64>,
    /// Wall-clock budget in seconds enforced by the watchdog.
    pub time_limit_secs: u64,
}

impl Default for SAConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            final_temperature: 0.1,
            cooling_rate: 0.95,
            iterations_per_temperature: 100,
            no_improvement_limit: 1000,
            prob_rotate: 0.3,
            prob_move: 0.3,
            prob_swap: 0.3,
            prob_change_representative: 0.05,
            prob_convert_symmetry: 0.05,
            area_weight: 1.0,
            wirelength_weight: 0.0,
            prng_seed: Some(0),
            time_limit_secs: 290,
        }
    }
}

impl SAConfig {
    /// The five perturbation probabilities, renormalized to sum to 1.
    /// Falls back to the default mix when they sum to zero or less.
    pub fn normalized_probabilities(&self) -> [f64; 5] {
        let probs = [
            self.prob_rotate,
            self.prob_move,
            self.prob_swap,
            self.prob_change_representative,
            self.prob_convert_symmetry,
        ];
        let sum: f64 = probs.iter().sum();
        if sum <= 0.0 {
            return [0.3, 0.3, 0.3, 0.05, 0.05];
        }
        probs.map(|p| p / sum)
    }
}
