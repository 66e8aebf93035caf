use std::collections::HashMap;

use crate::core::codec::Signature;
use crate::core::population::EvaluationResult;

/// Memo of evaluation results keyed by design signature.
///
/// Append-only for the duration of a run: the first result stored for a signature is kept.
/// Bounded by the number of distinct designs proposed (population size x generations).
#[derive(Debug, Clone, Default)]
pub struct FitnessCache {
    entries: HashMap<Signature, EvaluationResult>,
}

impl FitnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signature: &Signature) -> Option<&EvaluationResult> {
        self.entries.get(signature)
    }

    pub fn put(&mut self, signature: Signature, result: EvaluationResult) {
        self.entries.entry(signature).or_insert(result);
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.entries.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Signature, &EvaluationResult)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Seeds the cache from already evaluated results (e.g. a restored population).
    pub fn seed_from<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = (Signature, EvaluationResult)>,
    {
        for (signature, result) in results {
            self.put(signature, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::DesignCodec;
    use crate::core::domain::{Design, Metrics, ParameterSpec};

    #[test]
    fn first_result_wins() {
        let codec = DesignCodec::new(vec![ParameterSpec::discrete("material", ["wood", "metal"])])
            .unwrap();
        let mut design = Design::new();
        design.insert("material".into(), "wood".into());
        let sig = codec.signature(&design);

        let mut first = Metrics::new();
        first.insert("sda".into(), 70.0);
        let mut second = Metrics::new();
        second.insert("sda".into(), 10.0);

        let mut cache = FitnessCache::new();
        cache.put(sig.clone(), EvaluationResult::from_metrics(first));
        cache.put(sig.clone(), EvaluationResult::from_metrics(second));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&sig).unwrap().metrics["sda"], 70.0);
    }
}
