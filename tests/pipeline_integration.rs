use ontomatch::{
    BucketStore, DocSet, IndexConfig, LshConfig, LshIndex, MatchTask, NGramShingler, Ontology,
    OntomatchConfig, ShingleMode, Shingler, TaskPool, exact_jaccard, jaccard_estimate,
    read_lines, render_matches,
};
use std::io::Write;

fn random_doc(rng: &mut fastrand::Rng, prefix: &str, vocab: usize) -> Vec<String> {
    let len = rng.usize(5..15);
    (0..len)
        .map(|_| format!("{prefix}{}", rng.usize(0..vocab)))
        .collect()
}

#[test]
fn disjoint_vocabularies_never_collide() {
    let cfg = LshConfig::default().with_num_hashes(100).with_num_bands(25);
    assert_eq!(cfg.band_size(), 4);
    let index = LshIndex::new(IndexConfig::default().with_lsh(cfg)).unwrap();

    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for i in 0..300 {
        index
            .insert(&random_doc(&mut rng, "left-", 500), &format!("left-doc-{i}"))
            .unwrap();
    }

    for _ in 0..100 {
        let needle = random_doc(&mut rng, "right-", 500);
        assert!(index.candidates(&needle).unwrap().is_empty());
    }
}

#[test]
fn every_document_finds_itself() {
    let index = LshIndex::new(IndexConfig::default()).unwrap();
    let mut rng = fastrand::Rng::with_seed(42);
    let docs: Vec<(String, Vec<String>)> = (0..300)
        .map(|i| (format!("doc-{i}"), random_doc(&mut rng, "tok", 2000)))
        .collect();
    index.insert_batch(&docs).unwrap();

    for (doc_id, shingles) in &docs {
        let hits = index.query(shingles, 0.99).unwrap();
        assert!(hits.contains(doc_id), "{doc_id} missing from its own query");
    }
}

#[test]
fn estimate_tracks_exact_jaccard() {
    let index = LshIndex::new(
        IndexConfig::default().with_lsh(LshConfig::default().with_num_hashes(200).with_num_bands(40)),
    )
    .unwrap();
    let shingler = NGramShingler::new(2, ShingleMode::Chars).unwrap();
    let pairs = [
        ("extra virgin olive oil", "virgin olive oil"),
        ("unsalted butter", "salted butter"),
        ("dark brown sugar", "light brown sugar"),
    ];
    for (a, b) in pairs {
        let sa = shingler.shingles(a);
        let sb = shingler.shingles(b);
        let estimate = jaccard_estimate(&index.signature(&sa), &index.signature(&sb)).unwrap();
        let exact = exact_jaccard(&sa, &sb);
        assert!(
            (estimate - exact).abs() < 0.2,
            "{a} / {b}: estimate {estimate} vs exact {exact}"
        );
    }
}

#[test]
fn bucket_membership_is_idempotent() {
    let index = LshIndex::new(IndexConfig::default()).unwrap();
    let store = index.store();
    store.add_to_bucket(3, "abc123", "basil").unwrap();
    store.add_to_bucket(3, "abc123", "basil").unwrap();
    store.add_to_bucket(3, "abc123", "thyme").unwrap();

    let expected: DocSet = ["basil", "thyme"].into_iter().map(String::from).collect();
    assert_eq!(store.members_of(3, "abc123").unwrap(), expected);
    assert!(store.members_of(4, "abc123").unwrap().is_empty());
}

#[test]
fn scored_query_ranks_closest_first() {
    let shingler = NGramShingler::default();
    let index = LshIndex::new(IndexConfig::default()).unwrap();
    for term in ["chicken stock", "chicken broth", "beef stock", "vegetable stock"] {
        index.insert(&shingler.shingles(term), term).unwrap();
    }

    let hits = index
        .query_scored(&shingler.shingles("chicken stock"), 0.0)
        .unwrap();
    assert_eq!(hits.first().map(|h| h.doc_id.as_str()), Some("chicken stock"));
    assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
}

#[test]
fn phrase_file_to_json_lines() {
    let mut terms = tempfile::NamedTempFile::new().unwrap();
    writeln!(terms, "all-purpose flour\ngranulated sugar\nbaking soda\n\nvanilla extract").unwrap();
    let mut phrases = tempfile::NamedTempFile::new().unwrap();
    writeln!(phrases, "all-purpose flour\nbaking soda\nunsweetened cocoa").unwrap();

    let onto = Ontology::from_config(&OntomatchConfig::default()).unwrap();
    assert_eq!(onto.add_terms(read_lines(terms.path()).unwrap()).unwrap(), 4);

    let pool = TaskPool::new(2).unwrap();
    let outcome = onto
        .match_phrases(&pool, read_lines(phrases.path()).unwrap())
        .unwrap();
    assert!(outcome.is_complete());
    let lines = render_matches(&outcome.into_result().unwrap()).unwrap();

    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        r#"{"key":"all-purpose flour","matches":["all-purpose flour"]}"#
    );
    assert_eq!(lines[1], r#"{"key":"baking soda","matches":["baking soda"]}"#);
    assert!(lines[2].starts_with(r#"{"key":"unsweetened cocoa""#));
}

#[test]
fn aux_text_drives_the_match() {
    let onto = Ontology::from_config(&OntomatchConfig::default()).unwrap();
    onto.add_terms(["heavy cream", "sour cream"]).unwrap();

    let matcher = onto.matcher().unwrap();
    let tasks = vec![
        MatchTask::with_aux("recipe-1:line-4", vec!["heavy cream".into()]),
        MatchTask::with_aux("recipe-2:line-9", vec!["sour cream".into()]),
    ];
    let matches = matcher.run(&tasks).into_result().unwrap();
    assert!(matches["recipe-1:line-4"].contains("heavy cream"));
    assert!(matches["recipe-2:line-9"].contains("sour cream"));
    assert!(!matches.contains_key("heavy cream"));
}
