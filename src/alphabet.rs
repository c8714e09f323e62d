//! Translation layer between source symbols and Marlin symbols.
//!
//! The Marlin alphabet groups source values that agree in their high
//! `8 - S` bits, sorts the groups by descending probability and folds the
//! improbable tail into a single escape mass. A Marlin symbol is then just
//! an index into the kept, sorted list.

use std::cmp::Ordering;

use itertools::Itertools;

use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::SourceSymbol;

/// One kept alphabet entry: the representative source symbol of a high-bit
/// bucket (low `shift` bits zero) and the bucket's total probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlphabetEntry {
    pub symbol: SourceSymbol,
    pub p: f64,
}

/// The trained Marlin alphabet for one source distribution and shift.
#[derive(Clone, Debug)]
pub struct Alphabet {
    entries: Vec<AlphabetEntry>,
    shift: usize,
    rare_prob: f64,
    source_entropy: f64,
}

impl Alphabet {
    /// Groups, sorts and purges the source distribution.
    ///
    /// `pmf[s]` is the probability of source symbol `s`; the vector is
    /// normalized here, so counts work as well as probabilities.
    pub fn build(pmf: &[f64], shift: usize, config: &CodecConfig) -> Result<Self, CodecError> {
        let pmf = validate_pmf(pmf)?;
        let source_entropy = entropy(&pmf);

        // Group source symbols by their high bits.
        let mut buckets = vec![0.0f64; pmf.len().div_ceil(1 << shift)];
        for (symbol, &p) in pmf.iter().enumerate() {
            buckets[symbol >> shift] += p;
        }

        let mut entries = buckets
            .iter()
            .enumerate()
            .map(|(bucket, &p)| AlphabetEntry {
                symbol: (bucket << shift) as SourceSymbol,
                p,
            })
            .sorted_by(compare_entries)
            .collect_vec();

        // Trim the tail: the least probable groups are folded into the
        // rare-symbol escape as long as enough symbols remain.
        let min_marlin = config.min_marlin_symbols();
        let max_marlin = config.max_marlin_symbols();
        let mut rare_prob = 0.0;
        while entries.len() > min_marlin
            && (entries.len() > max_marlin
                || entries.last().is_some_and(|e| e.p < config.purge_threshold))
        {
            rare_prob += entries.pop().map_or(0.0, |e| e.p);
        }

        let kept = entries.iter().filter(|e| e.p > 0.0).count();
        if kept < 2 {
            return Err(CodecError::AlphabetTooSmall { kept });
        }

        Ok(Self {
            entries,
            shift,
            rare_prob,
            source_entropy,
        })
    }

    /// The kept entries, most probable first.
    pub fn entries(&self) -> &[AlphabetEntry] {
        &self.entries
    }

    /// Number of kept entries (`A`). The sentinel Marlin symbol equals this.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Low bits per source byte carried by the residual plane.
    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Total probability mass folded off the tail.
    pub fn rare_prob(&self) -> f64 {
        self.rare_prob
    }

    /// Entropy of the source distribution in bits per symbol.
    pub fn source_entropy(&self) -> f64 {
        self.source_entropy
    }

    /// The most probable source symbol, seeded into the decoder output
    /// before any codeword is read.
    pub fn most_probable(&self) -> SourceSymbol {
        self.entries[0].symbol
    }

    /// Source-to-Marlin translation table, indexed by `source >> shift`.
    /// Buckets outside the kept alphabet map to the sentinel `A`.
    pub(crate) fn source_to_marlin(&self) -> [u8; 256] {
        let sentinel = self.entries.len() as u8;
        let mut table = [sentinel; 256];
        for (ms, entry) in self.entries.iter().enumerate() {
            table[(entry.symbol >> self.shift) as usize] = ms as u8;
        }
        table
    }
}

fn compare_entries(a: &AlphabetEntry, b: &AlphabetEntry) -> Ordering {
    // Descending in probability, ascending in symbol.
    b.p.partial_cmp(&a.p)
        .unwrap_or(Ordering::Equal)
        .then(a.symbol.cmp(&b.symbol))
}

fn validate_pmf(pmf: &[f64]) -> Result<Vec<f64>, CodecError> {
    if pmf.is_empty() || pmf.len() > 256 {
        return Err(CodecError::InvalidDistribution(format!(
            "distribution must cover 1..=256 source symbols, got {}",
            pmf.len()
        )));
    }
    if pmf.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(CodecError::InvalidDistribution(
            "probabilities must be finite and non-negative".into(),
        ));
    }
    let total: f64 = pmf.iter().sum();
    if total <= 0.0 {
        return Err(CodecError::InvalidDistribution(
            "probabilities sum to zero".into(),
        ));
    }
    Ok(pmf.iter().map(|p| p / total).collect())
}

/// Shannon entropy of a normalized distribution, in bits.
pub(crate) fn entropy(pmf: &[f64]) -> f64 {
    pmf.iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed_pmf() -> Vec<f64> {
        let mut pmf = vec![0.0; 256];
        for (k, p) in pmf.iter_mut().enumerate() {
            *p = 0.5f64.powi(k as i32 + 1);
        }
        pmf
    }

    #[test]
    fn most_probable_symbol_is_first() {
        let alphabet = Alphabet::build(&skewed_pmf(), 0, &CodecConfig::default()).unwrap();
        assert_eq!(alphabet.most_probable(), 0);
        assert!(alphabet.entries()[0].p > alphabet.entries()[1].p);
    }

    #[test]
    fn grouping_zeroes_low_bits() {
        let alphabet = Alphabet::build(&skewed_pmf(), 2, &CodecConfig::default()).unwrap();
        assert!(alphabet.entries().iter().all(|e| e.symbol % 4 == 0));
    }

    #[test]
    fn purge_folds_tail_mass() {
        let config = CodecConfig {
            purge_threshold: 1e-3,
            ..CodecConfig::default()
        };
        let alphabet = Alphabet::build(&skewed_pmf(), 0, &config).unwrap();
        let kept: f64 = alphabet.entries().iter().map(|e| e.p).sum();
        assert!((kept + alphabet.rare_prob() - 1.0).abs() < 1e-9);
        assert!(alphabet.rare_prob() > 0.0);
    }

    #[test]
    fn sentinel_marks_unrepresented_buckets() {
        let config = CodecConfig {
            purge_threshold: 1e-3,
            ..CodecConfig::default()
        };
        let alphabet = Alphabet::build(&skewed_pmf(), 0, &config).unwrap();
        let table = alphabet.source_to_marlin();
        assert_eq!(table[0], 0);
        assert_eq!(table[255], alphabet.len() as u8);
    }

    #[test]
    fn constant_source_is_rejected() {
        let mut pmf = vec![0.0; 256];
        pmf[7] = 1.0;
        let err = Alphabet::build(&pmf, 0, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::AlphabetTooSmall { kept: 1 }));
    }
}
