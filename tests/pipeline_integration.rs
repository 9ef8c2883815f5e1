//! End-to-end flow: open a session, count a batch, extract sections, score
//! MI, build cosine similarity, substitute classes, and rebuild — mirroring
//! the batch-command sequence a host program would issue (spec §6).

use assoc_engine::{BuildOptions, Session};

fn test_options() -> BuildOptions {
    BuildOptions {
        word_table_capacity: 256,
        word_pool_capacity: 128,
        pair_table_capacity: 256,
        pair_pool_capacity: 128,
        section_table_capacity: 256,
        section_pool_capacity: 128,
        disjunct_index_capacity: 256,
        candidate_table_capacity: 256,
        candidate_pool_capacity: 128,
        probe_limit: 32,
        ..BuildOptions::default()
    }
}

#[test]
fn full_pipeline_round_trip() {
    let session = Session::open(test_options()).expect("valid options");

    // Two sentences: "the cat sat" / "the dog ran", sharing word "the".
    let hashes = [
        0xA1u64, // the
        0xA2,    // cat
        0xA3,    // sat
        0xA4,    // dog
        0xA5,    // ran
    ];
    let word_idx = session.find_or_create_words(&hashes);
    let the = word_idx[0];
    let cat = word_idx[1];
    let sat = word_idx[2];
    let dog = word_idx[3];
    let ran = word_idx[4];

    let flat = [the, cat, sat, the, dog, ran];
    let offsets = [0u32, 3];
    let lengths = [3u32, 3];

    let counting = session.count_sentences(&flat, &offsets, &lengths, 2).unwrap();
    assert_eq!(counting.new_pairs, 6); // 3 pairs per 3-token sentence, two sentences

    let edge_p1 = [0u32, 1, 3u32, 4];
    let edge_p2 = [1u32, 2, 4u32, 5];
    let edge_offsets = [0u32, 2];
    let edge_counts = [2u32, 2];
    let extraction = session
        .extract_sections(&flat, &offsets, &lengths, &edge_p1, &edge_p2, &edge_offsets, &edge_counts)
        .unwrap();
    assert!(extraction.new_sections > 0);
    assert_eq!(extraction.dropped_connectors, 0);

    session.compute_mi_all(100.0);
    let stats = session.mi_stats(f64::NEG_INFINITY);
    assert_eq!(stats.pairs_with_count, 6);

    session.build_similarity();
    let candidates = session.filter_candidates(-2.0, 100);
    // "cat" and "dog" never share a disjunct in this toy parse, so no
    // assertion on exact count beyond "the pipeline ran without sentinels".
    assert!(candidates.len() <= 100);

    // Merge "cat" and "dog" into one class: class id 900 stands in directly
    // as the synthetic replacement word index (spec §4.8), chosen well above
    // this session's word pool capacity of 128 so it can't collide with a
    // real word index.
    session.assign_classes(&[cat, dog], &[900, 900]);
    let (substitution, rebuild) = session.substitute_and_rebuild();
    assert_eq!(substitution.eliminated_self_pairs, 0);
    let _ = rebuild.merged;

    let snap = session.diagnostics();
    assert!(snap.pairs_created >= 6);
    assert!(snap.sections_created >= extraction.new_sections);

    let (a, b, count, _mi) = session.read_pair(session.pairs().find_or_create_one(the, sat)).unwrap();
    assert_eq!((a, b), (the.min(sat), the.max(sat)));
    assert!(count > 0.0);

    let out_of_range = session.words().capacity();
    assert!(session.read_word(out_of_range).is_err());

    session.reset();
    assert_eq!(session.words().len(), 0);
    assert_eq!(session.pairs().len(), 0);
    assert_eq!(session.sections().len(), 0);
}

#[test]
fn malformed_batch_is_rejected_before_touching_pools() {
    let session = Session::open(test_options()).expect("valid options");
    let flat = [0u32, 1, 2];
    // offsets/lengths mismatched in length -> InputMalformed.
    let offsets = [0u32, 5];
    let lengths = [3u32];
    let err = session.count_sentences(&flat, &offsets, &lengths, 2).unwrap_err();
    assert!(matches!(err, assoc_engine::EngineError::InputMalformed(_)));
    assert_eq!(session.pairs().len(), 0);
}
