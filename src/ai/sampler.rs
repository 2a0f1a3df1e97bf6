// Next-token sampling chain
//
// The classic chain in fixed order: top-k filter, nucleus (top-p) filter,
// temperature scaling, then one weighted draw. Operates on raw logits as
// handed out by the inference session; token ids are logit indices.

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct SamplerChain {
    pub top_k: usize,
    pub top_p: f32,
    pub temperature: f32,
}

impl Default for SamplerChain {
    fn default() -> Self {
        Self {
            top_k: 40,
            top_p: 0.95,
            temperature: 0.7,
        }
    }
}

impl SamplerChain {
    /// Sample one token id from `logits`. A temperature of zero (or below)
    /// short-circuits to greedy argmax.
    pub fn sample(&self, logits: &[f32], rng: &mut impl Rng) -> usize {
        debug_assert!(!logits.is_empty());

        // Candidates sorted by logit, best first.
        let mut candidates: Vec<(usize, f32)> = logits
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, logit)| logit.is_finite())
            .collect();
        if candidates.is_empty() {
            return 0;
        }
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        // Top-k.
        if self.top_k > 0 && self.top_k < candidates.len() {
            candidates.truncate(self.top_k);
        }

        // Nucleus: keep the smallest prefix whose probability mass
        // reaches top_p, judged on the un-tempered distribution.
        if self.top_p < 1.0 {
            let probs = softmax(candidates.iter().map(|&(_, l)| l));
            let mut cumulative = 0.0;
            let mut keep = candidates.len();
            for (i, p) in probs.iter().enumerate() {
                cumulative += p;
                if cumulative >= self.top_p {
                    keep = i + 1;
                    break;
                }
            }
            candidates.truncate(keep.max(1));
        }

        if self.temperature <= 0.0 || candidates.len() == 1 {
            return candidates[0].0;
        }

        // Temperature, then the final draw.
        let probs = softmax(candidates.iter().map(|&(_, l)| l / self.temperature));
        let roll: f32 = rng.gen_range(0.0..1.0);
        let mut cumulative = 0.0;
        for (i, p) in probs.iter().enumerate() {
            cumulative += p;
            if roll < cumulative {
                return candidates[i].0;
            }
        }
        // Rounding left us past the end; take the last candidate.
        candidates[candidates.len() - 1].0
    }
}

fn softmax(logits: impl Iterator<Item = f32> + Clone) -> Vec<f32> {
    let max = logits
        .clone()
        .fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn one_hot_logits_always_pick_that_token() {
        let mut logits = vec![0.0; 32];
        logits[17] = 50.0;
        let chain = SamplerChain::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(chain.sample(&logits, &mut rng), 17);
        }
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let logits = vec![0.1, 0.9, 0.5, 0.89];
        let chain = SamplerChain {
            temperature: 0.0,
            ..SamplerChain::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(chain.sample(&logits, &mut rng), 1);
    }

    #[test]
    fn top_k_one_is_greedy_regardless_of_temperature() {
        let logits = vec![1.0, 3.0, 2.0];
        let chain = SamplerChain {
            top_k: 1,
            top_p: 1.0,
            temperature: 2.0,
        };
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..10 {
            assert_eq!(chain.sample(&logits, &mut rng), 1);
        }
    }

    #[test]
    fn tight_nucleus_collapses_to_the_dominant_token() {
        // Token 0 holds almost all the probability mass.
        let logits = vec![10.0, 0.0, 0.0, 0.0];
        let chain = SamplerChain {
            top_k: 0,
            top_p: 0.5,
            temperature: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10 {
            assert_eq!(chain.sample(&logits, &mut rng), 0);
        }
    }

    #[test]
    fn sampling_stays_within_the_top_k_set() {
        let logits: Vec<f32> = (0..100).map(|i| i as f32 / 10.0).collect();
        let chain = SamplerChain {
            top_k: 5,
            top_p: 1.0,
            temperature: 1.5,
        };
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            let token = chain.sample(&logits, &mut rng);
            // The five highest logits sit at indices 95..100.
            assert!(token >= 95);
        }
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let logits: Vec<f32> = (0..50).map(|i| (i % 7) as f32).collect();
        let chain = SamplerChain::default();
        let a: Vec<usize> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..10).map(|_| chain.sample(&logits, &mut rng)).collect()
        };
        let b: Vec<usize> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..10).map(|_| chain.sample(&logits, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn non_finite_logits_are_ignored() {
        let logits = vec![f32::NAN, 1.0, f32::NEG_INFINITY, 5.0];
        let chain = SamplerChain {
            temperature: 0.0,
            ..SamplerChain::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(chain.sample(&logits, &mut rng), 3);
    }
}
