use rand::{
    distributions::{Distribution, WeightedIndex},
    thread_rng,
};

use crate::decay::Decay;

/// Softmax exploration policy (also known as Boltzmann exploration) with time-decaying temperature
pub struct Softmax<D: Decay> {
    temperature: D,
}

impl<D: Decay> Softmax<D> {
    pub fn new(decay: D) -> Self {
        Self { temperature: decay }
    }

    /// Sample an index into `q_values`, weighted by the Boltzmann distribution
    pub fn choose(&self, episode: u32, q_values: &[f64]) -> usize {
        let tau = self.temperature.evaluate(episode as f64);
        let exponentials = q_values.iter().map(|x| (x / tau).exp());
        let sum: f64 = exponentials.clone().sum();
        let weights = exponentials.map(|x| x / sum);
        let dist = WeightedIndex::new(weights).expect("`q_values` is not empty");
        dist.sample(&mut thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use crate::decay;

    use super::*;

    #[test]
    fn choose_returns_valid_index() {
        let softmax = Softmax::new(decay::Constant::new(0.5));
        let q_values = [0.0, 1.0, -1.0];
        for episode in 0..20 {
            assert!(softmax.choose(episode, &q_values) < q_values.len());
        }
    }
}
