use super::*;

fn store_of(lines: &[&str]) -> PagedLineStore {
    let mut store = PagedLineStore::new();
    for line in lines {
        store.append(*line);
    }
    store
}

fn detect(lines: &[&str]) -> (PagedLineStore, TableDescriptor) {
    let mut store = store_of(lines);
    let desc = analyze(&mut store, &DetectOptions::default()).unwrap();
    (store, desc)
}

const PSQL_BORDER_1: &[&str] = &[
    " id | name  | score ",
    "----+-------+-------",
    "  1 | alice |  10.5",
    "  2 | bob   |   7",
    "(2 rows)",
    "",
];

#[test]
fn test_id_name_table() {
    let (_, desc) = detect(&["id | name", "----+------", "1 | alice", "2 | bob"]);
    assert_eq!(desc.columns, 2);
    assert_eq!(desc.border_type.level(), 2);
    assert_eq!(desc.cranges[0].name, "id");
    assert_eq!((desc.cranges[0].xmin, desc.cranges[0].xmax), (0, 4));
    assert_eq!(desc.cranges[1].name, "name");
    assert_eq!((desc.cranges[1].xmin, desc.cranges[1].xmax), (5, 11));
    assert_eq!(desc.first_data_row, 2);
    assert_eq!(desc.last_data_row, Some(3));
    assert_eq!(desc.data_rows, 2);
}

#[test]
fn test_plain_text_fallback() {
    let (_, desc) = detect(&["hello world", "second line", "third"]);
    assert!(desc.is_plain());
    assert_eq!(desc.columns, 1);
    assert_eq!(desc.border_type.level(), 0);
    assert_eq!(desc.first_data_row, 0);
    assert_eq!(desc.last_data_row, Some(2));
    assert_eq!(desc.cranges[0].dmax, "second line".len());
}

#[test]
fn test_empty_input_is_plain() {
    let (_, desc) = detect(&[]);
    assert!(desc.is_plain());
    assert_eq!(desc.data_range(), None);
    assert!(desc.initialized);
}

#[test]
fn test_forced_plain_format_skips_detection() {
    let mut store = store_of(PSQL_BORDER_1);
    let options = DetectOptions {
        format: InputFormat::Plain,
        ..DetectOptions::default()
    };
    let desc = analyze(&mut store, &options).unwrap();
    assert!(desc.is_plain());
}

#[test]
fn test_psql_default_output() {
    let (store, desc) = detect(PSQL_BORDER_1);
    assert_eq!(desc.columns, 3);
    assert_eq!(desc.border_head_row, Some(1));
    assert_eq!(desc.border_top_row, None);
    assert_eq!(desc.first_data_row, 2);
    assert_eq!(desc.last_data_row, Some(3));
    assert_eq!(desc.footer_row, Some(4));
    assert_eq!(desc.fixed_rows, 2);
    assert_eq!(desc.last_row, Some(4));
    assert_eq!(desc.cranges[2].name, "score");
    assert_eq!(desc.footer_char_size, 8);
    assert!(!desc.is_pgcli_fmt);
    assert!(store.get(4).unwrap().1.is_unknown());
    assert!(!store.get(2).unwrap().1.is_unknown());
}

#[test]
fn test_full_frame_table_with_title() {
    let (store, desc) = detect(&[
        "List of users",
        "+----+-------+",
        "| id | name  |",
        "+----+-------+",
        "|  1 | alice |",
        "|  2 | bob   |",
        "+----+-------+",
        "(2 rows)",
    ]);
    assert_eq!(desc.title.as_deref(), Some("List of users"));
    assert_eq!(desc.title_rows, 1);
    assert_eq!(desc.border_top_row, Some(1));
    assert_eq!(desc.border_head_row, Some(3));
    assert_eq!(desc.border_bottom_row, Some(6));
    assert_eq!(desc.footer_row, Some(7));
    assert_eq!(desc.border_type, BorderType::Full);
    assert_eq!(desc.data_range(), Some(4..=5));
    assert_eq!(desc.fixed_rows, 3);
    assert_eq!(desc.cranges[1].name, "name");
    assert!(!desc.is_pgcli_fmt);
    assert!(store.get(0).unwrap().1.is_unknown());
}

#[test]
fn test_pgcli_table() {
    let (_, desc) = detect(&[
        "+----+-------+",
        "| id | name  |",
        "|----+-------|",
        "| 1  | alice |",
        "+----+-------+",
        "SELECT 1",
    ]);
    assert!(desc.is_pgcli_fmt);
    assert_eq!(desc.border_type, BorderType::Full);
    assert_eq!(desc.data_range(), Some(3..=3));
    assert_eq!(desc.footer_row, Some(5));
    assert_eq!(desc.footer_char_size, 8);
}

#[test]
fn test_unicode_table() {
    let (_, desc) = detect(&[
        "┌────┬───────┐",
        "│ id │ name  │",
        "├────┼───────┤",
        "│  1 │ alice │",
        "└────┴───────┘",
    ]);
    assert_eq!(desc.linestyle, LineStyle::Unicode);
    assert_eq!(desc.border_type, BorderType::Full);
    assert_eq!(desc.columns, 2);
    assert_eq!(desc.data_range(), Some(3..=3));
    assert_eq!(desc.border_bottom_row, Some(4));
    assert_eq!(desc.cranges[0].name, "id");
    assert_eq!((desc.cranges[1].dmin, desc.cranges[1].dmax), (6, 13));
}

#[test]
fn test_gap_separated_columns() {
    let (_, desc) = detect(&[
        "id name ",
        "-- -----",
        " 1 alice",
        " 2 bob  ",
        "",
        "2 rows in set (0.00 sec)",
    ]);
    assert_eq!(desc.border_type, BorderType::None);
    assert_eq!(desc.columns, 2);
    assert_eq!(desc.data_range(), Some(2..=3));
    assert_eq!(desc.footer_row, Some(5));
}

#[test]
fn test_title_is_truncated() {
    let long_title = "t".repeat(80);
    let separator = "-".repeat(90);
    let (_, desc) = detect(&[long_title.as_str(), "name", separator.as_str(), "x"]);
    assert_eq!(desc.title.as_deref().map(str::len), Some(MAX_TITLE_CHARS));
}

#[test]
fn test_table_without_data_rows() {
    let (_, desc) = detect(&[" id | name ", "----+------", "(0 rows)"]);
    assert_eq!(desc.columns, 2);
    assert_eq!(desc.data_range(), None);
    assert_eq!(desc.data_rows, 0);
    assert_eq!(desc.footer_row, Some(2));
}

#[test]
fn test_oid_column_freezes_two_columns() {
    let (_, desc) = detect(&[
        " oid | relname | relkind ",
        "-----+---------+---------",
        " 1   | pg_x    | r",
    ]);
    assert!(desc.freeze_two_cols);
    assert_eq!(desc.fixed_columns, 2);
}

const OUTER_WITH_INNER_FOOTER: &[&str] = &[
    "+-------------+",
    "| name        |",
    "|-------------|",
    "| alice       |",
    "| (1 row)     |",
    "+-------------+",
    "Time: 1 ms",
];

#[test]
fn test_footer_policy_bordered_prefers_text_after_border() {
    let mut store = store_of(OUTER_WITH_INNER_FOOTER);
    let desc = analyze(&mut store, &DetectOptions::default()).unwrap();
    assert_eq!(desc.border_type, BorderType::Outer);
    assert_eq!(desc.footer_row, Some(6));
    assert_eq!(desc.alt_footer_row, Some(4));
    assert_eq!(desc.data_range(), Some(3..=4));
    assert_eq!(desc.footer_char_size, 10);
}

#[test]
fn test_footer_policy_borderless_uses_framed_summary() {
    let mut store = store_of(OUTER_WITH_INNER_FOOTER);
    let options = DetectOptions {
        footer_policy: FooterPolicy::Borderless,
        ..DetectOptions::default()
    };
    let desc = analyze(&mut store, &options).unwrap();
    assert_eq!(desc.footer_row, Some(4));
    assert_eq!(desc.alt_footer_row, Some(6));
    assert_eq!(desc.data_range(), Some(3..=3));
    // the framed summary and the timing line, without the bottom border
    assert_eq!(desc.footer_char_size, 15);
}

#[test]
fn test_expanded_mode_records() {
    let (store, desc) = detect(&[
        "-[ RECORD 1 ]-----",
        "id   | 1",
        "name | alice",
        "-[ RECORD 2 ]-----",
        "id   | 2",
        "name | bob",
        "",
        "(2 rows)",
    ]);
    assert!(desc.is_expanded_mode);
    assert_eq!(desc.expanded_info_minx, Some(1));
    assert_eq!(desc.columns, 1);
    assert_eq!(desc.footer_row, Some(7));
    assert_eq!(desc.data_range(), Some(0..=5));
    assert_eq!(store.get(2).unwrap().1.recno_offset(), -2);
    assert_eq!(desc.record_number(&store, 2), Some(1));
    assert_eq!(desc.record_number(&store, 5), Some(2));
    assert_eq!(desc.record_number(&store, 3), Some(2));
}

#[test]
fn test_framed_expanded_mode_bottom_border() {
    let (_, desc) = detect(&[
        "+-[ RECORD 1 ]-+-------+",
        "| id           | 1     |",
        "+--------------+-------+",
    ]);
    assert!(desc.is_expanded_mode);
    assert_eq!(desc.border_type, BorderType::Full);
    assert_eq!(desc.border_bottom_row, Some(2));
    assert_eq!(desc.data_range(), Some(0..=1));
}

#[test]
fn test_multiline_rows_are_flagged() {
    let (store, desc) = detect(&[
        " id | note  ",
        "----+-------",
        "  1 | one  +",
        "    | two   ",
        "  2 | three ",
    ]);
    assert!(desc.has_multilines);
    assert!(desc.multilines_already_tested);
    let info = |row| store.get(row).unwrap().1;
    assert!(!info(2).is_continuation());
    assert!(!info(2).has_no_continuation());
    assert!(info(3).is_continuation());
    assert!(info(3).has_no_continuation());
    assert!(!info(4).is_continuation());
    assert!(info(4).has_no_continuation());
}

#[test]
fn test_cell_extraction() {
    let (store, desc) = detect(PSQL_BORDER_1);
    let line = store.get(2).unwrap().0;
    assert_eq!(desc.cell(line, 1).trim(), "alice");
    assert_eq!(desc.cell(line, 2).trim(), "10.5");
    assert_eq!(desc.cell(line, 3), "");
}

#[test]
fn test_cell_extraction_with_drifted_rules() {
    let (store, desc) = detect(&["id | name", "----+------", "1 | alice", "2 | bob"]);
    let line = store.get(3).unwrap().0;
    assert_eq!(desc.cell(line, 0).trim(), "2");
    assert_eq!(desc.cell(line, 1).trim(), "bob");
}

#[test]
fn test_column_at_display_position() {
    let (_, desc) = detect(PSQL_BORDER_1);
    assert_eq!(desc.column_at(0), Some(0));
    assert_eq!(desc.column_at(6), Some(1));
    assert_eq!(desc.column_at(4), None);
}

#[test]
fn test_observe_appended_extends_data_then_footer() {
    let mut store = store_of(&[" id | name ", "----+------", "  1 | a"]);
    let mut desc = analyze(&mut store, &DetectOptions::default()).unwrap();
    assert_eq!(desc.data_range(), Some(2..=2));

    let from = store.row_count();
    store.append("  2 | b");
    store.append("  3 | c");
    store.append("(3 rows)");
    desc.observe_appended(&mut store, from).unwrap();
    assert_eq!(desc.data_range(), Some(2..=4));
    assert_eq!(desc.data_rows, 3);
    assert_eq!(desc.footer_row, Some(5));
    assert_eq!(desc.total_rows, 6);
    assert_eq!(desc.footer_char_size, 8);
    assert!(store.get(5).unwrap().1.is_unknown());

    // rows after the footer never rejoin the data region
    let from = store.row_count();
    store.append("  4 | d");
    desc.observe_appended(&mut store, from).unwrap();
    assert_eq!(desc.data_range(), Some(2..=4));
}

#[test]
fn test_observe_appended_marks_continuations() {
    let mut store = store_of(&[" id | note ", "----+------", "  1 | a   +"]);
    let mut desc = analyze(&mut store, &DetectOptions::default()).unwrap();
    let from = store.row_count();
    store.append("    | b    ");
    desc.observe_appended(&mut store, from).unwrap();
    assert!(store.get(3).unwrap().1.is_continuation());
    assert!(desc.has_multilines);
}

#[test]
fn test_observe_appended_in_plain_mode() {
    let mut store = store_of(&["a"]);
    let mut desc = analyze(&mut store, &DetectOptions::default()).unwrap();
    store.append("a much longer line");
    desc.observe_appended(&mut store, 1).unwrap();
    assert_eq!(desc.data_range(), Some(0..=1));
    assert_eq!(desc.cranges[0].dmax, "a much longer line".len());
}

#[test]
fn test_observe_appended_expanded_records() {
    let mut store = store_of(&["-[ RECORD 1 ]---", "id | 1"]);
    let mut desc = analyze(&mut store, &DetectOptions::default()).unwrap();
    store.append("-[ RECORD 2 ]---");
    store.append("id | 2");
    desc.observe_appended(&mut store, 2).unwrap();
    assert_eq!(desc.record_number(&store, 3), Some(2));
    assert_eq!(desc.data_range(), Some(0..=3));
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn column_ranges_stay_inside_separator(widths in proptest::collection::vec(1..12usize, 1..8)) {
            let separator = widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("+");
            let names = widths
                .iter()
                .enumerate()
                .map(|(i, &w)| format!("{:<w$}", format!("c{i}").chars().take(w).collect::<String>()))
                .collect::<Vec<_>>()
                .join("|");
            let (_, desc) = detect(&[names.as_str(), separator.as_str(), "x"]);
            prop_assert_eq!(desc.columns, widths.len());
            let mut previous_end = 0;
            for range in &desc.cranges {
                prop_assert!(range.xmin < range.xmax);
                prop_assert!(range.xmin >= previous_end);
                prop_assert!(range.xmax <= separator.len());
                previous_end = range.xmax;
            }
        }

        #[test]
        fn detection_never_panics(lines in proptest::collection::vec("[ a-z|+\\-()0-9]{0,20}", 0..30)) {
            let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
            let (_, desc) = detect(&refs);
            prop_assert!(desc.columns >= 1);
            prop_assert_eq!(desc.columns, desc.cranges.len());
        }
    }
}
