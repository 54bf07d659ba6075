use super::*;
use crate::detect::{DetectOptions, analyze};

struct Fixture {
    store: PagedLineStore,
    desc: TableDescriptor,
    order: OrderIndex,
    interrupt: AtomicBool,
}

impl Fixture {
    fn new(lines: &[&str]) -> Self {
        let mut store = PagedLineStore::new();
        for line in lines {
            store.append(*line);
        }
        let desc = analyze(&mut store, &DetectOptions::default()).unwrap();
        let order = OrderIndex::build_identity(store.row_count());
        Self {
            store,
            desc,
            order,
            interrupt: AtomicBool::new(false),
        }
    }

    fn cx(&mut self) -> SearchContext<'_> {
        SearchContext {
            store: &mut self.store,
            desc: &self.desc,
            order: &self.order,
            interrupt: &self.interrupt,
        }
    }

    fn found_rows(&self) -> Vec<usize> {
        (0..self.store.row_count())
            .filter(|&row| self.store.get(row).unwrap().1.is_found())
            .collect()
    }
}

const PEOPLE: &[&str] = &[
    " id | name  ",
    "----+-------",
    "  1 | alice ",
    "  2 | bob   ",
    "  3 | alicia",
    "(3 rows)",
];

#[test]
fn test_case_insensitive_search_for_alice() {
    let mut fx = Fixture::new(&["id | name", "----+------", "1 | alice", "2 | bob"]);
    let mut engine = SearchEngine::new(CaseMode::Ignore);
    let found = engine
        .search(&mut fx.cx(), &SearchQuery::new("ALICE"))
        .unwrap()
        .unwrap();
    assert_eq!(found.lineno, 2);
    assert_eq!(found.start_byte, "1 | ".len());
    assert_eq!(found.end_byte, "1 | alice".len());
    assert!(!found.wrapped);
    let info = fx.store.get(2).unwrap().1;
    assert!(info.is_found());
    assert_eq!(info.match_start(), Some(4));
}

#[test]
fn test_smart_case_upper_pattern_is_sensitive() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    assert_eq!(
        engine.search(&mut fx.cx(), &SearchQuery::new("ALICE")).unwrap(),
        None
    );
    assert!(
        engine
            .search(&mut fx.cx(), &SearchQuery::new("alice"))
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_sensitive_mode_lower_pattern() {
    let mut fx = Fixture::new(&[" n ", "---", " Bob", " bob"]);
    let mut engine = SearchEngine::new(CaseMode::Sensitive);
    let found = engine
        .search(&mut fx.cx(), &SearchQuery::new("bob"))
        .unwrap()
        .unwrap();
    assert_eq!(found.lineno, 3);
}

#[test]
fn test_repeat_moves_found_flag_and_wraps_once() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    let first = engine
        .search(&mut fx.cx(), &SearchQuery::new("ali"))
        .unwrap()
        .unwrap();
    assert_eq!(first.lineno, 2);

    let second = engine
        .search_next(&mut fx.cx(), SearchDirection::Forward)
        .unwrap()
        .unwrap();
    assert_eq!(second.lineno, 4);
    assert_eq!(fx.found_rows(), vec![4]);

    let third = engine
        .search_next(&mut fx.cx(), SearchDirection::Forward)
        .unwrap()
        .unwrap();
    assert_eq!(third.lineno, 2);
    assert!(third.wrapped);
    assert_eq!(fx.found_rows(), vec![2]);
}

#[test]
fn test_single_match_reports_not_found_on_return() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    engine.search(&mut fx.cx(), &SearchQuery::new("bob")).unwrap();
    assert_eq!(fx.found_rows(), vec![3]);

    let back = engine
        .search_next(&mut fx.cx(), SearchDirection::Forward)
        .unwrap();
    assert_eq!(back, None);
    assert!(engine.last_found().is_none());
    assert!(fx.found_rows().is_empty());

    let again = engine
        .search_next(&mut fx.cx(), SearchDirection::Forward)
        .unwrap()
        .unwrap();
    assert_eq!(again.lineno, 3);
    assert!(!again.wrapped);
    assert_eq!(fx.found_rows(), vec![3]);
}

#[test]
fn test_fresh_search_still_tests_the_current_line() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    engine.search(&mut fx.cx(), &SearchQuery::new("bob")).unwrap();
    let found = engine
        .search(&mut fx.cx(), &SearchQuery::new("bo"))
        .unwrap()
        .unwrap();
    assert_eq!(found.lineno, 3);
    assert!(found.wrapped);
}

#[test]
fn test_backward_search_starts_from_bottom() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    let query = SearchQuery::new("ali").direction(SearchDirection::Backward);
    let found = engine.search(&mut fx.cx(), &query).unwrap().unwrap();
    assert_eq!(found.lineno, 4);
    let next = engine
        .search_next(&mut fx.cx(), SearchDirection::Backward)
        .unwrap()
        .unwrap();
    assert_eq!(next.lineno, 2);
}

#[test]
fn test_header_and_footer_are_not_searched() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    assert_eq!(
        engine.search(&mut fx.cx(), &SearchQuery::new("rows")).unwrap(),
        None
    );
    assert_eq!(
        engine.search(&mut fx.cx(), &SearchQuery::new("name")).unwrap(),
        None
    );
}

#[test]
fn test_search_follows_display_order() {
    let mut fx = Fixture::new(PEOPLE);
    let request = crate::order::SortRequest {
        column: 0,
        direction: crate::order::SortDirection::Descending,
        numeric: None,
    };
    fx.order =
        crate::order::sort_by_column(&fx.store, &fx.desc, &fx.order, &request, &fx.interrupt)
            .unwrap();
    let mut engine = SearchEngine::default();
    let found = engine
        .search(&mut fx.cx(), &SearchQuery::new("ali"))
        .unwrap()
        .unwrap();
    assert_eq!(found.lineno, 4);
    assert_eq!(found.position, 2);
}

#[test]
fn test_empty_pattern_is_an_error() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    assert!(matches!(
        engine.search(&mut fx.cx(), &SearchQuery::new("")),
        Err(EngineError::EmptyPattern)
    ));
    assert!(engine.last_query().is_none());
}

#[test]
fn test_region_limits_rows_and_columns() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    let region = SelectedRegion {
        rows: 3..5,
        columns: 5..12,
    };
    let query = SearchQuery::new("ali").scope(SearchScope::Region(region));
    let found = engine.search(&mut fx.cx(), &query).unwrap().unwrap();
    assert_eq!(found.lineno, 4);

    let digits = SelectedRegion {
        rows: 0..6,
        columns: 5..12,
    };
    let query = SearchQuery::new("2").scope(SearchScope::Region(digits));
    assert_eq!(engine.search(&mut fx.cx(), &query).unwrap(), None);
}

#[test]
fn test_invalid_region_keeps_previous_state() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    engine.search(&mut fx.cx(), &SearchQuery::new("bob")).unwrap();

    for region in [
        SelectedRegion {
            rows: 2..2,
            columns: 0..5,
        },
        SelectedRegion {
            rows: 40..50,
            columns: 0..5,
        },
        SelectedRegion {
            rows: 0..3,
            columns: 100..120,
        },
    ] {
        let query = SearchQuery::new("alice").scope(SearchScope::Region(region));
        assert!(matches!(
            engine.search(&mut fx.cx(), &query),
            Err(EngineError::InvalidRegion)
        ));
    }
    assert_eq!(fx.found_rows(), vec![3]);
    assert_eq!(engine.last_query().unwrap().pattern, "bob");
}

#[test]
fn test_search_in_column_remembers_term() {
    let mut fx = Fixture::new(&[
        " a   | b   ",
        "-----+-----",
        " x   | foo ",
        " foo | y   ",
    ]);
    let mut engine = SearchEngine::default();
    let found = engine
        .search_in_column(&mut fx.cx(), "foo", 0, SearchDirection::Forward)
        .unwrap()
        .unwrap();
    assert_eq!(found.lineno, 3);
    assert_eq!(engine.column_term(), Some(("foo", 0)));

    assert_eq!(
        engine
            .search_next(&mut fx.cx(), SearchDirection::Forward)
            .unwrap(),
        None
    );
    let again = engine
        .search_next(&mut fx.cx(), SearchDirection::Forward)
        .unwrap()
        .unwrap();
    assert_eq!(again.lineno, 3);
    assert_eq!(engine.column_term(), Some(("foo", 0)));
}

#[test]
fn test_column_scope_out_of_range() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    assert!(matches!(
        engine.search_in_column(&mut fx.cx(), "a", 9, SearchDirection::Forward),
        Err(EngineError::ColumnOutOfRange { column: 9, .. })
    ));
}

#[test]
fn test_match_start_counts_characters() {
    let mut fx = Fixture::new(&["größe straße"]);
    let mut engine = SearchEngine::default();
    let found = engine
        .search(&mut fx.cx(), &SearchQuery::new("straße"))
        .unwrap()
        .unwrap();
    assert_eq!(found.start_char, 6);
    assert_eq!(found.start_byte, "größe ".len());
}

#[test]
fn test_multi_segment_hit() {
    let mut fx = Fixture::new(&[
        " id | note  ",
        "----+-------",
        "  1 | one  +",
        "    | two   ",
        "  2 | three ",
    ]);
    let mut engine = SearchEngine::default();
    let across = engine
        .search(&mut fx.cx(), &SearchQuery::new("etw"))
        .unwrap()
        .unwrap();
    assert_eq!(across.lineno, 2);
    assert!(across.multi_segment);
    assert_eq!((across.start_byte, across.end_byte), (8, 9));
    assert_eq!(across.start_char, 8);
    assert!(fx.store.get(2).unwrap().1.is_found_multi_segment());

    let two = engine
        .search(&mut fx.cx(), &SearchQuery::new("two"))
        .unwrap()
        .unwrap();
    assert_eq!(two.lineno, 3);
    assert!(!two.multi_segment);
    assert!(!fx.store.get(3).unwrap().1.is_found_multi_segment());
    let three = engine
        .search(&mut fx.cx(), &SearchQuery::new("three"))
        .unwrap()
        .unwrap();
    assert!(!three.multi_segment);
}

#[test]
fn test_straddling_match_needs_a_continued_cell() {
    let mut fx = Fixture::new(&[
        " id | note  ",
        "----+-------",
        "  1 | one  +",
        "    | two   ",
        "  2 | three ",
    ]);
    let mut engine = SearchEngine::default();
    // "three" follows a line that does not continue
    assert_eq!(
        engine.search(&mut fx.cx(), &SearchQuery::new("wothr")).unwrap(),
        None
    );
    let in_column = engine
        .search_in_column(&mut fx.cx(), "net", 1, SearchDirection::Forward)
        .unwrap()
        .unwrap();
    assert!(in_column.multi_segment);
    assert_eq!(
        engine
            .search_in_column(&mut fx.cx(), "net", 0, SearchDirection::Forward)
            .unwrap(),
        None
    );
    assert_eq!(engine.mark_all_matches(&mut fx.cx(), "onet").unwrap(), 1);
    assert!(fx.store.get(2).unwrap().1.is_found_multi_segment());
}

#[test]
fn test_mark_all_matches() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    engine.search(&mut fx.cx(), &SearchQuery::new("bob")).unwrap();
    let count = engine.mark_all_matches(&mut fx.cx(), "ali").unwrap();
    assert_eq!(count, 2);
    assert_eq!(fx.found_rows(), vec![2, 4]);
    assert_eq!(fx.store.get(4).unwrap().1.match_start(), Some(6));
    assert!(engine.last_found().is_none());
}

#[test]
fn test_interrupted_search_changes_nothing() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    fx.interrupt.store(true, atomic::Ordering::Relaxed);
    assert!(matches!(
        engine.search(&mut fx.cx(), &SearchQuery::new("bob")),
        Err(EngineError::Interrupted)
    ));
    assert!(matches!(
        engine.mark_all_matches(&mut fx.cx(), "bob"),
        Err(EngineError::Interrupted)
    ));
    assert!(fx.found_rows().is_empty());
}

#[test]
fn test_stale_previous_hit_after_reload() {
    let mut fx = Fixture::new(PEOPLE);
    let mut engine = SearchEngine::default();
    engine.search(&mut fx.cx(), &SearchQuery::new("bob")).unwrap();

    fx.store.free_all();
    for line in PEOPLE {
        fx.store.append(*line);
    }
    fx.desc = analyze(&mut fx.store, &DetectOptions::default()).unwrap();
    fx.order = OrderIndex::build_identity(fx.store.row_count());
    let found = engine
        .search(&mut fx.cx(), &SearchQuery::new("ali"))
        .unwrap()
        .unwrap();
    assert_eq!(found.lineno, 2);
    assert!(!found.wrapped);
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn table_with_hits(flags: &[bool]) -> Fixture {
        let mut lines = vec![" v ".to_string(), "---".to_string()];
        lines.extend(flags.iter().map(|hit| if *hit { " hit".to_string() } else { " miss".to_string() }));
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        Fixture::new(&refs)
    }

    proptest! {
        #[test]
        fn repeated_search_cycles_through_matches(flags in proptest::collection::vec(any::<bool>(), 1..40)) {
            let hits: Vec<usize> = flags.iter().enumerate().filter(|(_, hit)| **hit).map(|(i, _)| i + 2).collect();
            prop_assume!(hits.len() > 1);
            let mut fx = table_with_hits(&flags);
            let mut engine = SearchEngine::default();

            let first = engine.search(&mut fx.cx(), &SearchQuery::new("hit")).unwrap();
            prop_assert_eq!(first.map(|f| f.lineno), hits.first().copied());
            let mut wraps = 0;
            for step in 1..=hits.len() * 2 {
                let found = engine.search_next(&mut fx.cx(), SearchDirection::Forward).unwrap();
                prop_assert!(found.is_some());
                let found = found.unwrap();
                prop_assert_eq!(found.lineno, hits[step % hits.len()]);
                wraps += usize::from(found.wrapped);
            }
            prop_assert_eq!(wraps, 2);
        }

        #[test]
        fn single_match_reports_not_found_once_per_cycle(rows in 1usize..30, at in any::<prop::sample::Index>()) {
            let hit = at.index(rows);
            let flags: Vec<bool> = (0..rows).map(|row| row == hit).collect();
            let mut fx = table_with_hits(&flags);
            let mut engine = SearchEngine::default();

            let first = engine.search(&mut fx.cx(), &SearchQuery::new("hit")).unwrap();
            prop_assert_eq!(first.map(|f| f.lineno), Some(hit + 2));
            let outcomes: Vec<Option<usize>> = (0..=rows)
                .map(|_| {
                    engine
                        .search_next(&mut fx.cx(), SearchDirection::Forward)
                        .unwrap()
                        .map(|found| found.lineno)
                })
                .collect();
            // a miss always follows a hit and is always followed by one
            for pair in outcomes.windows(2) {
                prop_assert!(pair[0].is_some() != pair[1].is_some());
            }
            prop_assert_eq!(outcomes[0], None);
            prop_assert!(outcomes.iter().flatten().all(|lineno| *lineno == hit + 2));
        }
    }
}
