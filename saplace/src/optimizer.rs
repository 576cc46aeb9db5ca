//! Simulated-annealing search over the HB*-tree engine.
//!
//! Starting from the initial packed tree, repeatedly proposes one of the five
//! perturbation operators and accepts or rejects each move using the
//! Metropolis criterion. The temperature decreases geometrically. Rejected
//! moves roll back to a pre-move clone; the best state seen is kept as a
//! clean-packed clone.

use std::collections::HashSet;

use anaplace::floorplan::HBTree;
use anaplace::util::assertions;
use anyhow::Result;
use log::{debug, info};
use rand::Rng;
use rand::rngs::SmallRng;

use crate::config::SAConfig;
use crate::watchdog::Watchdog;

/// Minimum acceptance rate per temperature step before the schedule aborts.
const MIN_ACCEPTANCE_RATE: f64 = 0.001;

/// Outcome counters of an annealing run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SAStats {
    pub total_iterations: usize,
    pub accepted_moves: usize,
    pub rejected_moves: usize,
    pub no_improvement_count: usize,
}

/// Simulated-annealing driver over the HB*-tree engine.
pub struct SAOptimizer {
    pub tree: HBTree,
    pub config: SAConfig,
    /// SmallRng is a fast, non-cryptographic PRNG <https://rust-random.github.io/book/guide-rngs.html>
    pub rng: SmallRng,
    best: HBTree,
    best_cost: f64,
    stats: SAStats,
}

impl SAOptimizer {
    /// Builds the initial tree, packs it and records it as the incumbent best.
    ///
    /// Fails when a symmetry group cannot reach symmetric feasibility.
    pub fn new(mut tree: HBTree, config: SAConfig, rng: SmallRng) -> Result<Self> {
        tree.construct_initial_tree()?;
        tree.pack();
        info!("initial area: {}", tree.area());

        let best_cost = cost(&tree, &config);
        let best = tree.clone();
        Ok(Self {
            tree,
            config,
            rng,
            best,
            best_cost,
            stats: SAStats::default(),
        })
    }

    /// Runs the annealing schedule and returns the best tree found.
    ///
    /// Cost is evaluated on the incrementally repacked state during the
    /// search; candidates for the incumbent best are clean-packed first so
    /// the returned placement is always fully accurate. The watchdog flag is
    /// polled between perturbations only.
    pub fn run(&mut self, watchdog: &Watchdog) -> &HBTree {
        let probs = self.config.normalized_probabilities();
        let mut temperature = self.config.initial_temperature;
        let mut current_cost = cost(&self.tree, &self.config);
        let mut no_improvement = 0usize;

        'cooling: while temperature > self.config.final_temperature {
            let mut accepted = 0usize;
            for _ in 0..self.config.iterations_per_temperature {
                if watchdog.has_timed_out() {
                    info!("time budget exhausted, keeping the best state found so far");
                    break 'cooling;
                }
                if no_improvement >= self.config.no_improvement_limit {
                    debug!("no improvement within {no_improvement} proposals, stopping");
                    break 'cooling;
                }

                self.stats.total_iterations += 1;
                no_improvement += 1;
                let backup = self.tree.clone();
                if !self.random_perturbation(probs) {
                    continue;
                }

                let new_cost = cost(&self.tree, &self.config);
                let delta = new_cost - current_cost;
                if delta < 0.0 || self.rng.gen::<f64>() < (-delta / temperature).exp() {
                    current_cost = new_cost;
                    accepted += 1;
                    self.stats.accepted_moves += 1;

                    if new_cost < self.best_cost {
                        // full-accuracy repack before taking the snapshot
                        self.tree.pack();
                        current_cost = cost(&self.tree, &self.config);
                        if current_cost < self.best_cost {
                            self.best_cost = current_cost;
                            self.best = self.tree.clone();
                            no_improvement = 0;
                        }
                    }
                } else {
                    self.tree = backup;
                    self.stats.rejected_moves += 1;
                }
            }

            temperature *= self.config.cooling_rate;
            let acceptance_rate =
                accepted as f64 / self.config.iterations_per_temperature.max(1) as f64;
            if acceptance_rate < MIN_ACCEPTANCE_RATE {
                debug!("acceptance rate {acceptance_rate:.4} below cutoff, stopping");
                break;
            }
        }

        self.stats.no_improvement_count = no_improvement;
        info!(
            "annealing finished: best cost {:.1} after {} iterations ({} accepted, {} rejected)",
            self.best_cost,
            self.stats.total_iterations,
            self.stats.accepted_moves,
            self.stats.rejected_moves
        );
        debug_assert!(assertions::no_module_overlap(&self.best));
        debug_assert!(assertions::symmetry_equations_hold(&self.best));
        &self.best
    }

    pub fn best(&self) -> &HBTree {
        &self.best
    }

    pub fn statistics(&self) -> SAStats {
        self.stats
    }

    /// Applies one randomly chosen perturbation. Returns false when the
    /// engine rejected the pick (which leaves the tree unchanged).
    fn random_perturbation(&mut self, probs: [f64; 5]) -> bool {
        let roll: f64 = self.rng.gen();
        if roll < probs[0] {
            self.random_rotate()
        } else if roll < probs[0] + probs[1] {
            self.random_move()
        } else if roll < probs[0] + probs[1] + probs[2] {
            self.random_swap()
        } else if roll < probs[0] + probs[1] + probs[2] + probs[3] {
            self.random_change_representative()
        } else {
            self.random_convert_symmetry()
        }
    }

    fn random_rotate(&mut self) -> bool {
        let names: Vec<String> = self.tree.modules().keys().cloned().collect();
        if names.is_empty() {
            return false;
        }
        let pick = &names[self.rng.gen_range(0..names.len())];
        self.tree.rotate_module(pick)
    }

    fn random_move(&mut self) -> bool {
        let names = self.movable_names();
        if names.len() < 2 {
            return false;
        }
        let node = &names[self.rng.gen_range(0..names.len())];
        let parent = &names[self.rng.gen_range(0..names.len())];
        let as_left_child = self.rng.gen();
        self.tree.move_node(node, parent, as_left_child)
    }

    fn random_swap(&mut self) -> bool {
        let names = self.movable_names();
        if names.len() < 2 {
            return false;
        }
        let a = &names[self.rng.gen_range(0..names.len())];
        let b = &names[self.rng.gen_range(0..names.len())];
        self.tree.swap_nodes(a, b)
    }

    fn random_change_representative(&mut self) -> bool {
        let paired: Vec<(String, String)> = self
            .tree
            .symmetry_groups()
            .iter()
            .flat_map(|g| {
                g.pairs()
                    .iter()
                    .flat_map(move |(a, b)| [(g.name.clone(), a.clone()), (g.name.clone(), b.clone())])
            })
            .collect();
        if paired.is_empty() {
            return false;
        }
        let (group, module) = &paired[self.rng.gen_range(0..paired.len())];
        self.tree.change_representative(group, module)
    }

    fn random_convert_symmetry(&mut self) -> bool {
        let groups: Vec<String> = self
            .tree
            .symmetry_groups()
            .iter()
            .map(|g| g.name.clone())
            .collect();
        if groups.is_empty() {
            return false;
        }
        let pick = &groups[self.rng.gen_range(0..groups.len())];
        self.tree.convert_symmetry_type(pick)
    }

    /// Names the structural operators may target: free-module nodes and
    /// hierarchy nodes, in deterministic order.
    fn movable_names(&self) -> Vec<String> {
        let in_group: HashSet<&str> = self
            .tree
            .symmetry_groups()
            .iter()
            .flat_map(|g| g.members())
            .collect();
        self.tree
            .modules()
            .keys()
            .filter(|name| !in_group.contains(name.as_str()))
            .cloned()
            .chain(
                self.tree
                    .symmetry_groups()
                    .iter()
                    .map(|g| g.name.clone()),
            )
            .collect()
    }
}

fn cost(tree: &HBTree, config: &SAConfig) -> f64 {
    config.area_weight * tree.area() + config.wirelength_weight * tree.wirelength()
}
