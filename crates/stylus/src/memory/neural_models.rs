// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
/// Scale of the random step applied to every parameter, relative to the learning rate.
const PERTURBATION_SCALE: f64 = 0.1;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkShape {
    pub input: usize,
    pub hidden: usize,
    pub output: usize,
}
impl NetworkShape {
    pub const fn new(input: usize, hidden: usize, output: usize) -> Self {
        Self {
            input,
            hidden,
            output,
        }
    }
    pub const fn input_weights(&self) -> usize {
        self.hidden * self.input
    }
    pub const fn output_weights(&self) -> usize {
        self.output * self.hidden
    }
    pub const fn biases(&self) -> usize {
        self.hidden + self.output
    }
}
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateSummary {
    pub output_error: f64,
    pub hidden_error: f64,
}
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
/// Derivative expressed on the activated value `y = sigmoid(x)`.
pub fn sigmoid_derivative(y: f64) -> f64 {
    y * (1.0 - y)
}
fn dense(input: &[f64], weights: &[f64], biases: &[f64]) -> Vec<f64> {
    let cols = input.len();
    biases
        .iter()
        .enumerate()
        .map(|(i, bias)| {
            let row = &weights[i * cols..(i + 1) * cols];
            let sum = bias + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
            sigmoid(sum)
        })
        .collect()
}
fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
}
/// Two-layer sigmoid network. Weights are stored row-major: `weights_in`
/// is `[hidden][input]`, `weights_out` is `[output][hidden]`, and `biases`
/// holds the hidden biases followed by the output biases.
#[derive(Debug, Clone)]
pub struct ScoringNetwork {
    shape: NetworkShape,
    weights_in: Vec<f64>,
    weights_out: Vec<f64>,
    biases: Vec<f64>,
    rng: StdRng,
}
impl ScoringNetwork {
    pub fn new(shape: NetworkShape, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let mut network = Self {
            shape,
            weights_in: Vec::new(),
            weights_out: Vec::new(),
            biases: Vec::new(),
            rng,
        };
        network.initialize(shape);
        network
    }
    /// Reallocates every parameter for `shape`, discarding previous weights.
    pub fn initialize(&mut self, shape: NetworkShape) {
        self.shape = shape;
        let rng = &mut self.rng;
        self.weights_in = (0..shape.input_weights())
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect();
        self.weights_out = (0..shape.output_weights())
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect();
        self.biases = (0..shape.biases())
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect();
    }
    pub const fn shape(&self) -> NetworkShape {
        self.shape
    }
    pub fn weights_in(&self) -> &[f64] {
        &self.weights_in
    }
    pub fn weights_out(&self) -> &[f64] {
        &self.weights_out
    }
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }
    fn activations(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let (hidden_biases, output_biases) = self.biases.split_at(self.shape.hidden);
        let hidden = dense(input, &self.weights_in, hidden_biases);
        let output = dense(&hidden, &self.weights_out, output_biases);
        (hidden, output)
    }
    /// Scores `input`; a wrongly sized input yields a zero vector of the output size.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        if input.len() != self.shape.input {
            return vec![0.0; self.shape.output];
        }
        self.activations(input).1
    }
    /// Computes the layer errors for `target`, then nudges every weight and
    /// bias by uniform noise in `[-0.5, 0.5) * learning_rate * 0.1`. The
    /// errors are reported but do not steer the step, so outputs are not
    /// guaranteed to approach `target`.
    pub fn update(
        &mut self,
        input: &[f64],
        target: &[f64],
        learning_rate: f64,
    ) -> Option<UpdateSummary> {
        if input.len() != self.shape.input || target.len() != self.shape.output {
            return None;
        }
        let (hidden, output) = self.activations(input);
        let output_errors: Vec<f64> = output
            .iter()
            .zip(target)
            .map(|(o, t)| (t - o) * sigmoid_derivative(*o))
            .collect();
        let hidden_errors: Vec<f64> = hidden
            .iter()
            .enumerate()
            .map(|(j, h)| {
                let propagated: f64 = output_errors
                    .iter()
                    .enumerate()
                    .map(|(i, e)| e * self.weights_out[i * self.shape.hidden + j])
                    .sum();
                propagated * sigmoid_derivative(*h)
            })
            .collect();
        let step = learning_rate * PERTURBATION_SCALE;
        let rng = &mut self.rng;
        for param in self
            .weights_in
            .iter_mut()
            .chain(self.weights_out.iter_mut())
            .chain(self.biases.iter_mut())
        {
            *param += (rng.gen::<f64>() - 0.5) * step;
        }
        Some(UpdateSummary {
            output_error: mean_abs(&output_errors),
            hidden_error: mean_abs(&hidden_errors),
        })
    }
    /// Applies one update per well-shaped pair and returns how many were applied.
    pub fn train_batch(
        &mut self,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        learning_rate: f64,
    ) -> usize {
        inputs
            .iter()
            .zip(targets)
            .filter_map(|(input, target)| self.update(input, target, learning_rate))
            .count()
    }
    /// Replaces both weight layers when their lengths fit the current shape.
    pub fn restore_weights(&mut self, weights_in: &[f64], weights_out: &[f64]) -> bool {
        if weights_in.len() != self.shape.input_weights()
            || weights_out.len() != self.shape.output_weights()
        {
            return false;
        }
        self.weights_in = weights_in.to_vec();
        self.weights_out = weights_out.to_vec();
        true
    }
    pub fn restore_biases(&mut self, biases: &[f64]) -> bool {
        if biases.len() != self.shape.biases() {
            return false;
        }
        self.biases = biases.to_vec();
        true
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn small() -> ScoringNetwork {
        ScoringNetwork::new(NetworkShape::new(4, 3, 2), Some(11))
    }
    #[test]
    fn parameters_start_inside_unit_range() {
        let network = small();
        assert_eq!(network.weights_in().len(), 12);
        assert_eq!(network.weights_out().len(), 6);
        assert_eq!(network.biases().len(), 5);
        assert!(network
            .weights_in()
            .iter()
            .chain(network.weights_out())
            .chain(network.biases())
            .all(|w| (-1.0..=1.0).contains(w)));
    }
    #[test]
    fn forward_with_wrong_length_returns_zeros() {
        let network = small();
        assert_eq!(network.forward(&[0.1, 0.2]), vec![0.0, 0.0]);
        assert_eq!(network.forward(&[]), vec![0.0, 0.0]);
    }
    #[test]
    fn forward_matches_manual_evaluation() {
        let mut network = ScoringNetwork::new(NetworkShape::new(2, 1, 1), Some(1));
        assert!(network.restore_weights(&[0.5, -0.25], &[2.0]));
        assert!(network.restore_biases(&[0.1, -0.3]));
        let hidden = sigmoid(0.1 + 0.5 * 1.0 - 0.25 * 2.0);
        let expected = sigmoid(-0.3 + 2.0 * hidden);
        let output = network.forward(&[1.0, 2.0]);
        assert!((output[0] - expected).abs() < 1e-15);
    }
    #[test]
    fn same_seed_same_trajectory() {
        let mut a = small();
        let mut b = small();
        let input = [0.1, 0.2, 0.3, 0.4];
        a.update(&input, &[1.0, 0.0], 0.05);
        b.update(&input, &[1.0, 0.0], 0.05);
        assert_eq!(a.weights_in(), b.weights_in());
        assert_eq!(a.biases(), b.biases());
        assert_eq!(a.forward(&input), b.forward(&input));
    }
    #[test]
    fn update_step_is_bounded_by_learning_rate() {
        let mut network = small();
        let before: Vec<f64> = network.weights_in().to_vec();
        let summary = network.update(&[0.4, 0.3, 0.0, 0.0], &[0.5, 0.5], 0.02).unwrap();
        assert!(summary.output_error >= 0.0);
        for (old, new) in before.iter().zip(network.weights_in()) {
            assert!((new - old).abs() <= 0.02 * PERTURBATION_SCALE * 0.5 + 1e-15);
        }
    }
    #[test]
    fn zero_learning_rate_leaves_parameters_untouched() {
        let mut network = small();
        let before = network.clone();
        network.update(&[0.1; 4], &[0.0, 1.0], 0.0);
        assert_eq!(before.weights_in(), network.weights_in());
        assert_eq!(before.weights_out(), network.weights_out());
        assert_eq!(before.biases(), network.biases());
    }
    #[test]
    fn mismatched_shapes_are_ignored() {
        let mut network = small();
        let before = network.clone();
        assert!(network.update(&[0.1; 3], &[0.0, 1.0], 0.1).is_none());
        assert!(network.update(&[0.1; 4], &[0.0], 0.1).is_none());
        assert_eq!(before.weights_in(), network.weights_in());
        let applied = network.train_batch(
            &[vec![0.1; 4], vec![0.1; 2], vec![0.2; 4]],
            &[vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0]],
            0.1,
        );
        assert_eq!(applied, 1);
    }
    #[test]
    fn reinitialize_replaces_dimensions() {
        let mut network = small();
        network.initialize(NetworkShape::new(5, 2, 3));
        assert_eq!(network.forward(&[0.0; 5]).len(), 3);
        assert_eq!(network.biases().len(), 5);
        assert!(!network.restore_biases(&[0.0; 4]));
    }
}
