use test_each_file::test_each_file;

test_each_file! { for ["alias", "kql"] in "./crates/kql/tables" => test_augmented_query }

/// Every known table gets rewritten inside a full augmented query
fn test_augmented_query([alias, expected]: [&str; 2]) {
    let alias = alias.trim();
    let query = format!("{} | take 10", alias);
    let augmented = kql::add_converted_rc_kql_tables(Some(&query));

    assert!(augmented.ends_with(&query));
    let expected = expected.trim_end();
    if !expected.is_empty() {
        assert!(
            augmented.contains(expected),
            "Augmented query is missing the {} let-statement",
            alias
        );
    }
}
