//! Property tests for identifier validation and pagination arithmetic.

use proptest::prelude::*;
use rusqlite::Connection;
use serde_json::json;

use crud_gateway::core::{builder, executor, limits::Limits, types::SelectRequest};

fn table_with_rows(rows: u64) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, n INTEGER)")
        .unwrap();
    for i in 0..rows {
        conn.execute("INSERT INTO items (n) VALUES (?1)", [i as i64])
            .unwrap();
    }
    conn
}

proptest! {
    #[test]
    fn allow_listed_identifiers_pass_unchanged(name in "[a-z_][a-z0-9_]{0,20}") {
        let req = SelectRequest {
            table_name: format!("t_{name}"),
            columns: Some(vec![format!("c_{name}")]),
            ..Default::default()
        };
        let plan = builder::build_select(&req, &Limits::default()).unwrap();
        prop_assert_eq!(plan.query.sql, format!("SELECT c_{name} FROM t_{name}"));
    }

    #[test]
    fn identifiers_with_separators_are_rejected(
        head in "[a-z]{1,8}",
        sep in prop::sample::select(vec![" ", ";", "--", "'", "\"", "(", ")", ",", "*", "\t"]),
        tail in "[a-z ]{0,8}",
    ) {
        let bad = format!("{head}{sep}{tail}");
        let req = SelectRequest { table_name: bad.clone(), ..Default::default() };
        prop_assert!(builder::build_select(&req, &Limits::default()).is_err());

        let req = SelectRequest {
            table_name: "items".into(),
            columns: Some(vec![bad]),
            ..Default::default()
        };
        prop_assert!(builder::build_select(&req, &Limits::default()).is_err());
    }

    #[test]
    fn page_sizes_follow_ceiling_division(rows in 0u64..40, size in 1u64..12, number in 1u64..8) {
        let mut conn = table_with_rows(rows);
        let req = SelectRequest {
            table_name: "items".into(),
            order_by: vec!["id".to_string().try_into().unwrap()],
            page_size: Some(size),
            page_number: Some(number),
            ..Default::default()
        };
        let plan = builder::build_select(&req, &Limits::default()).unwrap();
        let page = executor::run_select(&mut conn, &plan, false).unwrap();

        let expected_len = size.min(rows.saturating_sub((number - 1) * size));
        prop_assert_eq!(page.total_rows, Some(rows));
        prop_assert_eq!(page.total_pages, Some(rows.div_ceil(size)));
        prop_assert_eq!(page.rows.len() as u64, expected_len);
        if let Some(first) = page.rows.first() {
            prop_assert_eq!(&first["n"], &json!((number - 1) * size));
        }
    }
}
