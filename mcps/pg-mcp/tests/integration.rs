//! Integration tests for pg-mcp against a live PostgreSQL server
//!
//! Connection settings come from the usual `pg_*` / `PG_*` environment
//! variables (defaults: postgres:123456@localhost:5432/test_db). Each test
//! works on its own uniquely named table and drops it afterwards.
//!
//! # Running tests
//!
//! ```bash
//! PG_PASSWORD=secret PG_DB=scratch cargo test -p pg-mcp --test integration -- --ignored
//! ```

use pg_mcp::{Envelope, PgClient, PgConfig, QueryResult};
use serde_json::{json, Value};

fn test_client() -> PgClient {
    PgClient::new(PgConfig::from_env().expect("invalid pg_* environment"))
}

fn unique_table() -> String {
    format!("pg_mcp_test_{}", uuid::Uuid::new_v4().simple())
}

async fn create_table(client: &PgClient, table: &str) {
    let created = client
        .execute(
            &format!("CREATE TABLE {} (id INT PRIMARY KEY, name TEXT NOT NULL)", table),
            &[],
        )
        .await
        .unwrap();
    assert!(created.is_success(), "create failed: {:?}", created);
}

async fn drop_table(client: &PgClient, table: &str) {
    let _ = client
        .execute(&format!("DROP TABLE IF EXISTS {}", table), &[])
        .await;
}

fn success(envelope: Envelope<QueryResult>) -> QueryResult {
    match envelope {
        Envelope::Success(result) => result,
        Envelope::Error { message } => panic!("unexpected error envelope: {}", message),
    }
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn select_row_count_matches_data() {
    let client = test_client();
    let result = success(
        client
            .execute("SELECT generate_series(1, $1) AS n", &[json!(5)])
            .await
            .unwrap(),
    );

    let data = result.data.unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(result.row_count, 5);
    assert_eq!(data[0]["n"], json!(1));
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn writes_report_affected_rows_and_commit() {
    let client = test_client();
    let table = unique_table();
    create_table(&client, &table).await;

    let inserted = success(
        client
            .execute(
                &format!("INSERT INTO {} (id, name) VALUES ($1, $2), ($3, $4)", table),
                &[json!(1), json!("ada"), json!(2), json!("grace")],
            )
            .await
            .unwrap(),
    );
    assert!(inserted.data.is_none());
    assert_eq!(inserted.row_count, 2);

    // a fresh session only sees committed data
    let other = test_client();
    let rows = success(
        other
            .execute(&format!("SELECT id, name FROM {} ORDER BY id", table), &[])
            .await
            .unwrap(),
    );
    assert_eq!(
        rows.data.unwrap(),
        vec![
            json!({ "id": 1, "name": "ada" }).as_object().unwrap().clone(),
            json!({ "id": 2, "name": "grace" }).as_object().unwrap().clone(),
        ]
    );

    drop_table(&client, &table).await;
    client.close().await;
    other.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn failed_statement_rolls_back() {
    let client = test_client();
    let table = unique_table();
    create_table(&client, &table).await;
    client
        .execute(&format!("INSERT INTO {} VALUES (1, 'ada')", table), &[])
        .await
        .unwrap();

    // the second row violates the primary key, so neither row may land
    let failed = client
        .execute(
            &format!("INSERT INTO {} VALUES (2, 'grace'), (1, 'dup')", table),
            &[],
        )
        .await
        .unwrap();
    match failed {
        Envelope::Error { message } => assert!(message.starts_with("SQL error:"), "{}", message),
        other => panic!("expected error envelope, got {:?}", other),
    }

    let syntax = client.execute("SELEC oops", &[]).await.unwrap();
    match syntax {
        Envelope::Error { message } => assert!(message.contains("syntax error"), "{}", message),
        other => panic!("expected error envelope, got {:?}", other),
    }

    let count = client.get_row_count(&table).await.unwrap();
    match count {
        Envelope::Success(count) => assert_eq!(count.row_count, 1),
        other => panic!("expected row count, got {:?}", other),
    }

    drop_table(&client, &table).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn bad_parameters_are_statement_errors() {
    let client = test_client();
    let envelope = client
        .execute("SELECT $1::int AS n", &[json!("not a number")])
        .await
        .unwrap();
    assert!(matches!(envelope, Envelope::Error { .. }));

    let envelope = client.execute("SELECT $1::int AS n", &[]).await.unwrap();
    assert!(matches!(envelope, Envelope::Error { .. }));

    // the session is still usable afterwards
    let ok = success(client.execute("SELECT 1 AS one", &[]).await.unwrap());
    assert_eq!(ok.row_count, 1);
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn empty_table_has_zero_rows() {
    let client = test_client();
    let table = unique_table();
    create_table(&client, &table).await;

    let value = serde_json::to_value(client.get_row_count(&table).await.unwrap()).unwrap();
    assert_eq!(
        value,
        json!({ "status": "success", "table_name": table, "row_count": 0 })
    );

    drop_table(&client, &table).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn unknown_table_row_count_is_error_envelope() {
    let client = test_client();
    let envelope = client
        .get_row_count("no_such_table; DROP TABLE users")
        .await
        .unwrap();
    match envelope {
        Envelope::Error { message } => assert!(message.contains("does not exist"), "{}", message),
        other => panic!("expected error envelope, got {:?}", other),
    }
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn schema_of_missing_table_is_empty() {
    let client = test_client();
    let value = serde_json::to_value(
        client
            .get_table_schema("nonexistent_table")
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(value["status"], json!("success"));
    assert_eq!(value["data"], json!([]));
    assert_eq!(value["row_count"], json!(0));
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn schema_lists_columns_in_order() {
    let client = test_client();
    let table = unique_table();
    create_table(&client, &table).await;

    let result = success(client.get_table_schema(&table).await.unwrap());
    let data = result.data.unwrap();
    let names: Vec<&Value> = data.iter().map(|row| &row["column_name"]).collect();
    assert_eq!(names, vec![&json!("id"), &json!("name")]);
    assert_eq!(data[1]["is_nullable"], json!("NO"));

    drop_table(&client, &table).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn list_tables_includes_new_table() {
    let client = test_client();
    let table = unique_table();
    create_table(&client, &table).await;

    match client.list_tables().await.unwrap() {
        Envelope::Success(list) => {
            assert_eq!(list.table_count, list.tables.len());
            assert!(list.tables.iter().any(|t| t.table_name == table));
            assert_eq!(list.message, format!("found {} user tables", list.table_count));
        }
        other => panic!("expected table list, got {:?}", other),
    }

    drop_table(&client, &table).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn connect_is_idempotent_and_reconnects_after_close() {
    let client = test_client();
    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(client.sessions_opened(), 1);
    assert!(client.is_connected().await);

    client.close().await;
    assert!(!client.is_connected().await);

    success(client.execute("SELECT 1 AS one", &[]).await.unwrap());
    assert_eq!(client.sessions_opened(), 2);
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn statements_are_classified_by_result_columns() {
    let client = test_client();
    let table = unique_table();

    let ddl = success(
        client
            .execute(&format!("CREATE TABLE {} (id SERIAL PRIMARY KEY, name TEXT)", table), &[])
            .await
            .unwrap(),
    );
    assert!(ddl.data.is_none());
    assert_eq!(ddl.row_count, 0);

    let returning = success(
        client
            .execute(
                &format!("INSERT INTO {} (name) VALUES ($1), ($2) RETURNING id, name", table),
                &[json!("ada"), json!("grace")],
            )
            .await
            .unwrap(),
    );
    assert_eq!(returning.row_count, 2);
    assert_eq!(returning.data.unwrap()[1]["name"], json!("grace"));

    let cte = success(
        client
            .execute(
                &format!("WITH named AS (SELECT name FROM {}) SELECT count(*) AS n FROM named", table),
                &[],
            )
            .await
            .unwrap(),
    );
    assert_eq!(cte.data.unwrap()[0]["n"], json!(2));

    let show = success(client.execute("SHOW server_version", &[]).await.unwrap());
    assert_eq!(show.row_count, 1);
    assert!(show.data.unwrap()[0]["server_version"].is_string());

    let update = success(
        client
            .execute(&format!("UPDATE {} SET name = upper(name)", table), &[])
            .await
            .unwrap(),
    );
    assert!(update.data.is_none());
    assert_eq!(update.row_count, 2);

    drop_table(&client, &table).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn column_types_decode_to_json() {
    let client = test_client();
    let mood = format!("pg_mcp_mood_{}", uuid::Uuid::new_v4().simple());
    success(
        client
            .execute(&format!("CREATE TYPE {} AS ENUM ('happy', 'sad')", mood), &[])
            .await
            .unwrap(),
    );

    let sql = format!(
        r#"SELECT
            true AS flag,
            1.5::float8 AS ratio,
            'NaN'::float8 AS not_a_number,
            12.50::numeric(10, 2) AS price,
            123456789012345678901234567890::numeric AS big,
            'NaN'::numeric AS nan_numeric,
            '2024-02-29 12:34:56'::timestamp AS stamped,
            '2024-02-29 12:34:56+00'::timestamptz AS stamped_tz,
            '2024-02-29'::date AS day,
            '12:34:56'::time AS at,
            '\x0aff'::bytea AS raw,
            ARRAY['a', NULL]::text[] AS tags,
            ARRAY[1, 2]::int4[] AS nums,
            '{{"k": [1, 2]}}'::jsonb AS doc,
            'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11'::uuid AS id,
            'happy'::{} AS mood,
            '1 day'::interval AS span,
            NULL::text AS nothing"#,
        mood
    );
    let result = success(client.execute(&sql, &[]).await.unwrap());
    let row = Value::Object(result.data.unwrap().remove(0));

    assert_eq!(
        row,
        json!({
            "flag": true,
            "ratio": 1.5,
            "not_a_number": "NaN",
            "price": "12.50",
            "big": "123456789012345678901234567890",
            "nan_numeric": "NaN",
            "stamped": "2024-02-29T12:34:56",
            "stamped_tz": "2024-02-29T12:34:56+00:00",
            "day": "2024-02-29",
            "at": "12:34:56",
            "raw": "\\x0aff",
            "tags": ["a", null],
            "nums": [1, 2],
            "doc": { "k": [1, 2] },
            "id": "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11",
            "mood": "happy",
            "span": "<unsupported type interval>",
            "nothing": null
        })
    );

    client
        .execute(&format!("DROP TYPE IF EXISTS {}", mood), &[])
        .await
        .unwrap();
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn row_count_folds_unquoted_names() {
    let client = test_client();
    let table = unique_table();
    create_table(&client, &table).await;

    match client.get_row_count(&table.to_uppercase()).await.unwrap() {
        Envelope::Success(count) => {
            assert_eq!(count.table_name, table.to_uppercase());
            assert_eq!(count.row_count, 0);
        }
        other => panic!("expected row count, got {:?}", other),
    }

    drop_table(&client, &table).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn reconnects_after_backend_is_terminated() {
    let client = test_client();
    let pid = success(
        client
            .execute("SELECT pg_backend_pid() AS pid", &[])
            .await
            .unwrap(),
    )
    .data
    .unwrap()[0]["pid"]
        .clone();

    let admin = test_client();
    let killed = success(
        admin
            .execute("SELECT pg_terminate_backend($1) AS terminated", &[pid])
            .await
            .unwrap(),
    );
    assert_eq!(killed.data.unwrap()[0]["terminated"], json!(true));
    admin.close().await;

    // give the driver task time to notice the closed socket
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // the first call may still observe the dead session; the next one must not
    let first = client.execute("SELECT 1 AS one", &[]).await;
    if first.is_err() {
        success(client.execute("SELECT 1 AS one", &[]).await.unwrap());
    }
    assert_eq!(client.sessions_opened(), 2);
    assert!(client.is_connected().await);
    client.close().await;
}

#[tokio::test]
#[ignore = "integration test - requires PostgreSQL"]
async fn concurrent_calls_share_one_session() {
    let client = std::sync::Arc::new(test_client());

    let calls: Vec<_> = (0..8)
        .map(|n| {
            let client = std::sync::Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .execute("SELECT pg_backend_pid() AS pid, $1::int AS n", &[json!(n)])
                    .await
            })
        })
        .collect();

    let mut pids = Vec::new();
    for call in calls {
        let result = success(call.await.unwrap().unwrap());
        pids.push(result.data.unwrap()[0]["pid"].clone());
    }

    assert_eq!(client.sessions_opened(), 1);
    assert!(pids.windows(2).all(|w| w[0] == w[1]));
    client.close().await;
}
