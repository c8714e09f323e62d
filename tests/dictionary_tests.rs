mod common;

use common::*;
use marlin_codec::{distribution, CodecConfig, MarlinCodec};

fn built() -> MarlinCodec {
    geometric_codec(CodecConfig {
        shift: Some(0),
        max_word_size: Some(7),
        ..CodecConfig::default()
    })
}

#[test]
fn dictionary_covers_all_chapters() {
    let codec = built();
    let dict = codec.dictionary();
    assert_eq!(
        dict.words().len(),
        1 << (dict.key_size() + dict.overlap())
    );
}

#[test]
fn every_long_word_has_its_prefix_in_the_same_chapter() {
    let codec = built();
    let dict = codec.dictionary();
    let chapter_size = 1usize << dict.key_size();
    for (i, word) in dict.words().iter().enumerate() {
        if word.symbols.len() < 2 {
            continue;
        }
        let prefix = &word.symbols[..word.symbols.len() - 1];
        let base = i / chapter_size * chapter_size;
        assert!(
            dict.words()[base..base + chapter_size]
                .iter()
                .any(|w| w.symbols == prefix),
            "word at {i} has no parent in its chapter"
        );
    }
}

#[test]
fn word_probabilities_sum_to_one() {
    let codec = built();
    let total: f64 = codec.dictionary().words().iter().map(|w| w.p).sum();
    assert!((total - 1.0).abs() < 1e-6, "dictionary mass {total}");
}

#[test]
fn chapter_mass_matches_routed_state_mass() {
    // The words routing into a chapter carry exactly the mass that chapter
    // is entered with, so each residue class sums to its steady-state
    // probability and the classes together cover everything.
    let codec = built();
    let dict = codec.dictionary();
    let chapters = 1usize << dict.overlap();
    let mut per_chapter = vec![0.0f64; chapters];
    for (i, word) in dict.words().iter().enumerate() {
        per_chapter[i % chapters] += word.p;
    }
    let total: f64 = per_chapter.iter().sum();
    assert!((total - 1.0).abs() < 1e-6);
    for (c, mass) in per_chapter.iter().enumerate() {
        assert!(*mass > 0.0, "chapter {c} is unreachable");
    }
}

#[test]
fn no_word_exceeds_the_configured_maximum() {
    for max_word_size in [3usize, 7, 15] {
        let codec = geometric_codec(CodecConfig {
            shift: Some(0),
            max_word_size: Some(max_word_size),
            ..CodecConfig::default()
        });
        assert!(codec
            .dictionary()
            .words()
            .iter()
            .all(|w| w.symbols.len() <= max_word_size));
    }
}

#[test]
fn most_probable_symbol_heads_the_alphabet() {
    let codec = built();
    let entries = codec.dictionary().alphabet().entries();
    assert!(entries.windows(2).all(|w| w[0].p >= w[1].p));
    assert_eq!(codec.dictionary().alphabet().most_probable(), 0);
}

#[test]
fn reported_efficiency_is_plausible() {
    let pmf = distribution::laplacian_pmf_for_entropy(4.0);
    let codec = MarlinCodec::new(&pmf, CodecConfig::default()).unwrap();
    let efficiency = codec.efficiency();
    assert!(
        (0.5..=1.01).contains(&efficiency),
        "efficiency {efficiency}"
    );
}

#[test]
fn auto_swept_shift_beats_or_matches_no_shift() {
    let pmf = distribution::laplacian_pmf_for_entropy(6.0);
    let swept = MarlinCodec::new(&pmf, CodecConfig::default()).unwrap();
    let fixed = MarlinCodec::new(
        &pmf,
        CodecConfig {
            shift: Some(0),
            ..CodecConfig::default()
        },
    )
    .unwrap();
    assert!(swept.efficiency() >= fixed.efficiency() - 1e-9);
    assert!(swept.shift() > 0, "a 6-bit source should shed low bits");
}
