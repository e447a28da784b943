use posting_core::{KeywordRanker, RankerConfig, Tier};
use pretty_assertions::assert_eq;

const TEXT: &str = "We use Python daily. Python powers our ETL jobs and most Python services. \
SQL is used for reporting, and SQL reviews are part of onboarding. Tableau dashboards exist too.";

#[test]
fn terms_are_bucketed_by_frequency() {
    let ranker = KeywordRanker::default();
    let ranked = ranker.rank(TEXT, &["Python", "SQL", "Tableau", "Kubernetes"]);

    let python = ranked.get("python").unwrap();
    assert_eq!((python.frequency, python.tier), (3, Tier::High));
    let sql = ranked.get("SQL").unwrap();
    assert_eq!((sql.frequency, sql.tier), (2, Tier::Medium));
    let tableau = ranked.get("tableau").unwrap();
    assert_eq!((tableau.frequency, tableau.tier), (1, Tier::Other));
    let kubernetes = ranked.get("kubernetes").unwrap();
    assert_eq!((kubernetes.frequency, kubernetes.tier), (0, Tier::Other));
}

#[test]
fn higher_frequency_never_gets_a_lower_tier() {
    let ranker = KeywordRanker::default();
    let mut previous = Tier::Other;
    for frequency in 0..10 {
        let tier = ranker.tier_for(frequency);
        assert!(tier >= previous, "frequency {frequency}");
        previous = tier;
    }

    let ranked = ranker.rank(TEXT, &["Tableau", "SQL", "Python"]);
    for a in ranked.entries() {
        for b in ranked.entries() {
            if a.frequency > b.frequency {
                assert!(a.tier >= b.tier, "{} vs {}", a.term, b.term);
            }
        }
    }
}

#[test]
fn entries_are_ordered_by_tier_then_candidate_order() {
    let ranker = KeywordRanker::default();
    let ranked = ranker.rank(
        "go rust go rust go rust sql",
        &["sql", "Rust", "Go", "docker"],
    );
    let order: Vec<&str> = ranked
        .entries()
        .iter()
        .map(|entry| entry.display.as_str())
        .collect();
    assert_eq!(order, vec!["Rust", "Go", "sql", "docker"]);
}

#[test]
fn duplicate_candidates_are_merged() {
    let ranker = KeywordRanker::default();
    let ranked = ranker.rank(TEXT, &["Python", "python", "  PYTHON "]);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked.entries()[0].display, "Python");
}

#[test]
fn stop_words_are_dropped() {
    let ranker = KeywordRanker::new(RankerConfig {
        stop_words: vec!["Dashboards".to_string()],
        ..RankerConfig::default()
    });
    let ranked = ranker.rank(TEXT, &["the", "Team", "dashboards", "SQL"]);
    let terms: Vec<&str> = ranked.entries().iter().map(|entry| entry.term.as_str()).collect();
    assert_eq!(terms, vec!["sql"]);
}

#[test]
fn multi_word_phrases_span_line_breaks() {
    let ranker = KeywordRanker::default();
    let ranked = ranker.rank(
        "Machine\nlearning models. machine   learning at scale. MACHINE LEARNING.",
        &["machine learning"],
    );
    assert_eq!(ranked.in_tier(Tier::High).count(), 1);
}

#[test]
fn custom_thresholds_are_respected() {
    let ranker = KeywordRanker::new(RankerConfig {
        high_threshold: 5,
        medium_threshold: 3,
        ..RankerConfig::default()
    });
    let ranked = ranker.rank(TEXT, &["python"]);
    assert_eq!(ranked.entries()[0].tier, Tier::Medium);
}
