use ranking::tokenizer::normalize;

#[test]
fn it_lowercases_and_splits_on_punctuation() {
    let words = normalize("Running, RUNNER's run! The café's menu.");
    assert_eq!(words, vec!["running", "runner", "s", "run", "the", "café", "s", "menu"]);
}

#[test]
fn it_keeps_stopwords_and_does_not_stem() {
    let words = normalize("The quick brown fox and the lazy dogs");
    assert!(words.contains(&"the".to_string()));
    assert!(words.contains(&"and".to_string()));
    assert!(words.contains(&"dogs".to_string()));
}

#[test]
fn it_is_idempotent() {
    let once = normalize("Hello, World! 2024 -- tabs\tand\nnewlines");
    let twice = normalize(&once.join(" "));
    assert_eq!(once, twice);
}
