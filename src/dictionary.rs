//! Construction of the state-partitioned V2F dictionary.
//!
//! The dictionary is `2^O` chapters of `2^K` words. Each chapter is grown as
//! a tree of Marlin symbols rooted at the empty word: the most probable leaf
//! is repeatedly split until the chapter is full, so probable runs of input
//! symbols earn long words. Chapters are then packed so that the low `O`
//! bits of a word's codeword name the chapter holding the words that may
//! follow it, and the per-chapter state probabilities are re-estimated from
//! the packed layout until a fixed point (a fixed number of passes in
//! practice).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;

use crate::alphabet::Alphabet;
use crate::MarlinSymbol;

/// A dictionary word: a run of Marlin symbols, the probability that an
/// encoding step emits it, and its terminal state (the out-degree of the
/// tree node it was extracted from, which routes the next word).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Word {
    pub symbols: Vec<MarlinSymbol>,
    pub p: f64,
    pub state: u8,
}

/// A fully built dictionary, immutable once constructed.
pub struct Dictionary {
    alphabet: Alphabet,
    words: Vec<Word>,
    key_size: usize,
    overlap: usize,
    max_word_size: usize,
    efficiency: f64,
}

impl Dictionary {
    pub(crate) fn build(
        alphabet: Alphabet,
        key_size: usize,
        overlap: usize,
        max_word_size: usize,
        iterations: usize,
    ) -> Self {
        let chapters = 1usize << overlap;
        let states = alphabet.len() + 1;

        // Chapter state probabilities start with all mass on state 0.
        let mut pstates = vec![vec![0.0f64; states]; chapters];
        for chapter in pstates.iter_mut() {
            chapter[0] = 1.0 / chapters as f64;
        }

        let mut words = grow_all_chapters(&alphabet, &pstates, key_size, overlap, max_word_size);

        for pass in 0..iterations {
            for chapter in pstates.iter_mut() {
                chapter.iter_mut().for_each(|p| *p = 0.0);
            }
            // Word `i` routes the machine into chapter `i mod 2^O`, so that
            // chapter's next-state distribution collects its mass.
            for (i, word) in words.iter().enumerate() {
                pstates[i % chapters][word.state as usize] += word.p;
            }

            words = grow_all_chapters(&alphabet, &pstates, key_size, overlap, max_word_size);
            debug!(
                "dictionary pass {}: efficiency {:.4}",
                pass + 1,
                estimate_efficiency(&alphabet, &words, key_size)
            );
        }

        let efficiency = estimate_efficiency(&alphabet, &words, key_size);
        Self {
            alphabet,
            words,
            key_size,
            overlap,
            max_word_size,
            efficiency,
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// All `2^(K+O)` words; chapter `c` occupies `c * 2^K .. (c + 1) * 2^K`.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn max_word_size(&self) -> usize {
        self.max_word_size
    }

    /// Estimated fraction of the Shannon bound this dictionary reaches.
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }
}

/// Tree node in the chapter-growing arena. The word a node stands for is the
/// symbol path from the root; only the edge label is stored.
struct TreeNode {
    parent: usize,
    symbol: MarlinSymbol,
    p: f64,
    len: u8,
    degree: u8,
}

const NO_PARENT: usize = usize::MAX;

/// Max-heap candidate. Probabilities are snapshots taken at push time; a
/// node is re-pushed with its reduced mass after each split.
struct Candidate {
    p: f64,
    node: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.p
            .partial_cmp(&other.p)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn grow_all_chapters(
    alphabet: &Alphabet,
    pstates: &[Vec<f64>],
    key_size: usize,
    overlap: usize,
    max_word_size: usize,
) -> Vec<Word> {
    let mut words = Vec::with_capacity(1 << (key_size + overlap));
    for chapter_states in pstates {
        let arena = grow_chapter(alphabet, chapter_states, key_size, max_word_size);
        let sorted = sort_chapter(extract_words(&arena));
        words.extend(pack_chapter(sorted, key_size, overlap));
    }
    words
}

/// Grows one chapter tree from its incoming state distribution.
fn grow_chapter(
    alphabet: &Alphabet,
    pstates: &[f64],
    key_size: usize,
    max_word_size: usize,
) -> Vec<TreeNode> {
    let n_symbols = alphabet.len();

    // Normalizing the state probabilities keeps the split order stable for
    // chapters carrying very little mass.
    let mut pstates = pstates.to_vec();
    let factor = 1e-10 + pstates.iter().sum::<f64>();
    for p in pstates.iter_mut() {
        *p /= factor;
        if (*p - 1.0).abs() < 1e-4 {
            *p = 1.0;
        } else if p.abs() < 1e-4 {
            *p = 0.0;
        }
    }

    // PN[s] is the probability that an encoding step in state s continues,
    // with the rare mass folded into the least probable kept symbol.
    let mut pn: Vec<f64> = alphabet.entries().iter().map(|e| e.p).collect();
    if let Some(last) = pn.last_mut() {
        *last += alphabet.rare_prob();
    }
    for i in (1..pn.len()).rev() {
        pn[i - 1] += pn[i];
    }
    let pchild: Vec<f64> = alphabet
        .entries()
        .iter()
        .zip(&pn)
        .map(|(e, &pn)| if pn > 0.0 { e.p / pn } else { 0.0 })
        .collect();

    let mut arena: Vec<TreeNode> = Vec::with_capacity(1 << key_size);
    let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(1 << key_size);

    // Seed the root (the empty word) with one child per alphabet symbol.
    arena.push(TreeNode {
        parent: NO_PARENT,
        symbol: 0,
        p: 1.0,
        len: 0,
        degree: 0,
    });
    let mut prefix = 0.0;
    for (c, entry) in alphabet.entries().iter().enumerate() {
        if pn[c] > 0.0 {
            prefix += pstates[c] / pn[c];
        }
        let p = prefix * entry.p;
        arena.push(TreeNode {
            parent: 0,
            symbol: c as MarlinSymbol,
            p,
            len: 1,
            degree: 0,
        });
        arena[0].degree += 1;
        arena[0].p -= p;
        heap.push(Candidate { p, node: c + 1 });
    }
    heap.push(Candidate {
        p: arena[0].p,
        node: 0,
    });

    // Grow by splitting the most probable leaf until the chapter is full.
    let mut retired = 0usize;
    while !heap.is_empty() && heap.len() + retired < (1 << key_size) {
        let node = heap.pop().map(|c| c.node).unwrap_or_default();
        let (len, degree) = (arena[node].len, arena[node].degree as usize);

        if (len as usize >= max_word_size && len > 0) || len == 255 || degree == n_symbols {
            retired += 1;
            continue;
        }

        let p = arena[node].p * pchild[degree];
        let child = arena.len();
        arena.push(TreeNode {
            parent: node,
            symbol: degree as MarlinSymbol,
            p,
            len: len + 1,
            degree: 0,
        });
        arena[node].degree += 1;
        arena[node].p -= p;
        heap.push(Candidate { p, node: child });
        heap.push(Candidate {
            p: arena[node].p,
            node,
        });
    }

    // Undo the normalization.
    for node in arena.iter_mut() {
        node.p *= factor;
    }
    arena
}

fn extract_words(arena: &[TreeNode]) -> Vec<Word> {
    arena
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let mut symbols = Vec::with_capacity(node.len as usize);
            let mut at = i;
            while arena[at].parent != NO_PARENT {
                symbols.push(arena[at].symbol);
                at = arena[at].parent;
            }
            symbols.reverse();
            Word {
                symbols,
                p: node.p,
                // The root is the empty word and always keeps state 0.
                state: if i == 0 { 0 } else { node.degree },
            }
        })
        .collect()
}

/// Orders a chapter by ascending state, then descending probability, then
/// lexicographic word. The empty word stays at position 0.
fn sort_chapter(mut words: Vec<Word>) -> Vec<Word> {
    words[1..].sort_by(|lhs, rhs| {
        lhs.state
            .cmp(&rhs.state)
            .then_with(|| {
                if (lhs.p - rhs.p).abs() / (lhs.p + rhs.p) > 1e-10 {
                    rhs.p.partial_cmp(&lhs.p).unwrap_or(Ordering::Equal)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| lhs.symbols.cmp(&rhs.symbols))
    });
    words
}

/// Fills the `2^K` chapter slots column-major by residue mod `2^O`, so that
/// a word's position (and hence its codeword's low `O` bits) encodes the
/// chapter the machine moves to next.
fn pack_chapter(sorted: Vec<Word>, key_size: usize, overlap: usize) -> Vec<Word> {
    let mut slots = vec![Word::default(); 1 << key_size];
    let stride = 1usize << overlap;
    let (mut j, mut k) = (0usize, 0usize);
    for word in sorted {
        if j >= slots.len() {
            k += 1;
            j = k;
        }
        slots[j] = word;
        j += stride;
    }
    slots
}

/// Estimated bits per source symbol, and from it the dictionary efficiency.
///
/// Decoding costs `K / L̄` bits per represented symbol, `S` raw bits per
/// symbol for the residual plane, and `2K` bits per rare symbol for its
/// escape entry.
fn estimate_efficiency(alphabet: &Alphabet, words: &[Word], key_size: usize) -> f64 {
    let mean_length: f64 = words.iter().map(|w| w.p * w.symbols.len() as f64).sum();
    if mean_length <= 0.0 {
        return 0.0;
    }
    let rare = alphabet.rare_prob();
    let bits_per_symbol = (key_size as f64 / mean_length) * (1.0 - rare)
        + alphabet.shift() as f64
        + 2.0 * key_size as f64 * rare;
    alphabet.source_entropy() / bits_per_symbol
}
