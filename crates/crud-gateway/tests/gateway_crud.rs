//! End-to-end CRUD tests through the async gateway on a file database.

use serde_json::{json, Value};
use tempfile::TempDir;

use crud_gateway::{
    adapters::bridge, DeleteRequest, Gateway, GatewayConfig, InsertRequest, SelectRequest,
    UpdateRequest,
};

fn setup(sql: &str) -> (TempDir, GatewayConfig) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(sql).unwrap();
    (dir, GatewayConfig::new(path))
}

const USERS: &str = "
    CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, age INTEGER);
    INSERT INTO users (name, age) VALUES
        ('ada', 36), ('alan', 41), ('grace', 85), ('edsger', 72), ('barbara', 30),
        ('kid', 12), ('toddler', 2);
";

fn adults_page(page_number: u64) -> SelectRequest {
    SelectRequest {
        table_name: "users".into(),
        columns: Some(vec!["id".into(), "name".into()]),
        condition: Some("age > %s".into()),
        params: vec![json!(18)],
        page_size: Some(2),
        page_number: Some(page_number),
        ..Default::default()
    }
}

#[tokio::test]
async fn paged_select_reports_totals() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();

    let page = gw.select(adults_page(1)).await.unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.total_rows, Some(5));
    assert_eq!(page.total_pages, Some(3));

    let last = gw.select(adults_page(3)).await.unwrap();
    assert_eq!(last.rows.len(), 1);
}

#[tokio::test]
async fn consistent_pagination_gives_same_answer() {
    let (_dir, mut cfg) = setup(USERS);
    cfg.consistent_pagination = true;
    let gw = Gateway::new(cfg).unwrap();
    let page = gw.select(adults_page(2)).await.unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.total_pages, Some(3));
}

#[tokio::test]
async fn repeated_selects_are_identical() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();
    let a = gw.select(adults_page(2)).await.unwrap();
    let b = gw.select(adults_page(2)).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn inserted_rows_read_back_by_id() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();

    let values = vec![
        vec![json!("linus"), json!(54)],
        vec![json!("ken"), json!(81)],
        vec![json!("dennis"), Value::Null],
    ];
    let ids = gw
        .insert(InsertRequest {
            table_name: "users".into(),
            columns: vec!["name".into(), "age".into()],
            values: values.clone(),
            returning: None,
        })
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    for (id, row) in ids.iter().zip(&values) {
        let page = gw
            .select(SelectRequest {
                table_name: "users".into(),
                columns: Some(vec!["name".into(), "age".into()]),
                condition: Some("id = %s".into()),
                params: vec![id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0]["name"], row[0]);
        assert_eq!(page.rows[0]["age"], row[1]);
    }
}

#[tokio::test]
async fn duplicate_in_batch_rolls_back_everything() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();

    let err = gw
        .insert(InsertRequest {
            table_name: "users".into(),
            columns: vec!["name".into()],
            values: vec![vec![json!("new_one")], vec![json!("ada")]],
            returning: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DB_CONSTRAINT");
    assert_eq!(err.http_status(), 409);

    let page = gw
        .select(SelectRequest {
            table_name: "users".into(),
            condition: Some("name = %s".into()),
            params: vec![json!("new_one")],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(page.rows.is_empty());
}

#[tokio::test]
async fn insert_can_return_another_column() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();

    let names = gw
        .insert(InsertRequest {
            table_name: "users".into(),
            columns: vec!["name".into(), "age".into()],
            values: vec![
                vec![json!("linus"), json!(54)],
                vec![json!("ken"), json!(81)],
            ],
            returning: Some("name".into()),
        })
        .await
        .unwrap();
    assert_eq!(names, vec![json!("linus"), json!("ken")]);
}

#[tokio::test]
async fn booleans_survive_insert_and_select() {
    let (_dir, cfg) = setup("CREATE TABLE flags (id INTEGER PRIMARY KEY, active BOOLEAN);");
    let gw = Gateway::new(cfg).unwrap();

    let ids = gw
        .insert(InsertRequest {
            table_name: "flags".into(),
            columns: vec!["active".into()],
            values: vec![vec![json!(true)], vec![json!(false)]],
            returning: None,
        })
        .await
        .unwrap();

    for (id, expected) in ids.iter().zip([json!(true), json!(false)]) {
        let page = gw
            .select(SelectRequest {
                table_name: "flags".into(),
                columns: Some(vec!["active".into()]),
                condition: Some("id = %s".into()),
                params: vec![id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.rows[0]["active"], expected);
    }

    let described = gw.columns("flags".into()).await.unwrap();
    assert_eq!(described[1].json_type, "boolean");
}

#[tokio::test]
async fn statement_errors_do_not_echo_the_query() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();

    let err = gw
        .select(SelectRequest {
            table_name: "users".into(),
            columns: Some(vec!["secret_col".into()]),
            condition: Some("name = %s".into()),
            params: vec![json!("ada")],
            ..Default::default()
        })
        .await
        .unwrap_err();
    let body = err.body();
    assert_eq!(body.code, "DB_STATEMENT");
    assert!(body.message.contains("no such column: secret_col"), "{}", body.message);
    assert!(!body.message.contains("SELECT"), "{}", body.message);
    assert!(!body.message.contains("offset"), "{}", body.message);

    let err = gw
        .select(SelectRequest {
            table_name: "users".into(),
            condition: Some("nosuch = %s AND name <> 'top-secret'".into()),
            params: vec![json!(1)],
            ..Default::default()
        })
        .await
        .unwrap_err();
    let body = err.body();
    assert!(body.message.contains("no such column: nosuch"), "{}", body.message);
    assert!(!body.message.contains("top-secret"), "{}", body.message);
    assert!(!body.message.contains("WHERE"), "{}", body.message);
}

#[tokio::test]
async fn update_and_delete_counts() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();

    let mut set_values = serde_json::Map::new();
    set_values.insert("age".into(), json!(37));
    let affected = gw
        .update(UpdateRequest {
            table_name: "users".into(),
            set_values: set_values.clone(),
            condition: Some("name = %s".into()),
            params: vec![json!("ada")],
            all_rows: false,
        })
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let none = gw
        .update(UpdateRequest {
            table_name: "users".into(),
            set_values,
            condition: Some("name = %s".into()),
            params: vec![json!("nobody")],
            all_rows: false,
        })
        .await
        .unwrap();
    assert_eq!(none, 0);

    let removed = gw
        .delete(DeleteRequest {
            table_name: "users".into(),
            condition: Some("age < %s".into()),
            params: vec![json!(18)],
            all_rows: false,
        })
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let left = gw
        .select(SelectRequest {
            table_name: "users".into(),
            condition: Some("age < %s".into()),
            params: vec![json!(18)],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(left.rows.is_empty());
}

#[tokio::test]
async fn validation_happens_before_the_database() {
    // The table does not exist; validation must fail first regardless.
    let (_dir, cfg) = setup("CREATE TABLE other (id INTEGER PRIMARY KEY);");
    let gw = Gateway::new(cfg).unwrap();

    let err = gw
        .select(SelectRequest {
            table_name: "users where 1=1".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(err.http_status(), 400);

    let err = gw
        .select(SelectRequest {
            table_name: "users".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DB_STATEMENT");
}

#[tokio::test]
async fn concurrent_requests_share_a_bounded_pool() {
    let (_dir, mut cfg) = setup(USERS);
    cfg.pool_size = 2;
    let gw = Gateway::new(cfg).unwrap();

    let mut tasks = Vec::new();
    for n in 1..=6u64 {
        let gw = gw.clone();
        tasks.push(tokio::spawn(async move { gw.select(adults_page(n % 3 + 1)).await }));
    }
    for t in tasks {
        let page = t.await.unwrap().unwrap();
        assert_eq!(page.total_rows, Some(5));
    }
}

#[tokio::test]
async fn bridge_speaks_ndjson() {
    let (_dir, cfg) = setup(USERS);
    let gw = Gateway::new(cfg).unwrap();

    let input = [
        r#"{"v":1,"id":"a","cmd":"get","table":"users","payload":{"query":{"columns":"[\"name\"]","condition":"age > %s","params":"[80]","page_size":"10","page_number":"1"}}}"#,
        "",
        r#"{"v":1,"id":"b","cmd":"insert","table":"users","payload":{"columns":["name","age"],"values":[["linus",54]]}}"#,
        r#"{"v":1,"id":"c","cmd":"update","table":"users","payload":{"set_values":{"age":55},"condition":"name = %s","params":["linus"]}}"#,
        r#"{"v":1,"id":"d","cmd":"delete","table":"users; DROP TABLE users","payload":{"condition":"id = %s","params":[1]}}"#,
        r#"not json"#,
        r#"{"v":1,"id":"e","cmd":"columns","table":"users"}"#,
    ]
    .join("\n");

    let mut out = Vec::new();
    bridge::serve(gw, input.as_bytes(), &mut out).await.unwrap();
    let lines: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 6);

    assert_eq!(lines[0]["id"], "a");
    assert_eq!(lines[0]["data"]["datas"], json!([{ "name": "grace" }]));
    assert_eq!(lines[0]["data"]["total_rows"], 1);
    assert_eq!(lines[0]["data"]["total_pages"], 1);

    assert_eq!(lines[1]["data"]["datas"], json!([8]));
    assert_eq!(lines[2]["data"]["datas"], 1);

    assert_eq!(lines[3]["status"], "error");
    assert_eq!(lines[3]["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(lines[3]["http_status"], 400);

    assert_eq!(lines[4]["status"], "error");
    assert_eq!(lines[4]["id"], "");

    assert_eq!(lines[5]["data"]["datas"][1]["name"], "name");
    assert_eq!(lines[5]["data"]["datas"][1]["json_type"], "string");
}
