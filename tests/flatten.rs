use kobo_extract::ExtractOptions;
use kobo_extract::error::ExtractError;
use kobo_extract::flatten::{
    INDEX_COLUMN, PARENT_INDEX_COLUMN, PARENT_TABLE_COLUMN, assemble,
};
use kobo_extract::model::{Scalar, TableSet};

fn assemble_all(submissions: &[serde_json::Value]) -> TableSet {
    assemble(submissions, &ExtractOptions::default())
        .expect("flattening succeeds")
        .expect("batch is not empty")
}

#[test]
fn nested_groups_become_linked_child_tables() {
    let submission = serde_json::json!({
        "age": 30,
        "children": [{"name": "Ana"}, {"name": "Leo"}]
    });

    let tables = assemble_all(&[submission]);
    assert_eq!(tables.names(), vec!["root", "root_children"]);

    let root = tables.get("root").expect("root table");
    assert_eq!(root.columns, vec![INDEX_COLUMN, "age"]);
    assert_eq!(root.rows.len(), 1);
    assert_eq!(root.cell(0, INDEX_COLUMN), Some(&Scalar::Number(0.0)));
    assert_eq!(root.cell(0, "age"), Some(&Scalar::Number(30.0)));

    let children = tables.get("root_children").expect("children table");
    assert_eq!(
        children.columns,
        vec![INDEX_COLUMN, PARENT_TABLE_COLUMN, PARENT_INDEX_COLUMN, "name"]
    );
    assert_eq!(children.rows.len(), 2);
    for (row, expected_name) in [(0usize, "Ana"), (1, "Leo")] {
        assert_eq!(
            children.cell(row, INDEX_COLUMN),
            Some(&Scalar::Number(row as f64))
        );
        assert_eq!(
            children.cell(row, PARENT_TABLE_COLUMN),
            Some(&Scalar::String("root".to_string()))
        );
        assert_eq!(
            children.cell(row, PARENT_INDEX_COLUMN),
            Some(&Scalar::Number(0.0))
        );
        assert_eq!(
            children.cell(row, "name"),
            Some(&Scalar::String(expected_name.to_string()))
        );
    }
}

#[test]
fn flat_submission_yields_single_table_without_linkage_columns() {
    let submission = serde_json::json!({"age": 30, "name": "Ana"});

    let tables = assemble_all(&[submission]);
    assert_eq!(tables.names(), vec!["root"]);

    let root = tables.get("root").expect("root table");
    assert_eq!(root.columns, vec![INDEX_COLUMN, "age", "name"]);
    assert!(!root.columns.iter().any(|c| c == PARENT_INDEX_COLUMN));
    assert!(!root.columns.iter().any(|c| c == PARENT_TABLE_COLUMN));
}

#[test]
fn empty_batch_yields_no_data_sentinel() {
    let result = assemble(&[], &ExtractOptions::default()).expect("flattening succeeds");
    assert!(result.is_none());
}

#[test]
fn root_row_count_matches_batch_length_and_indices_stay_monotonic() {
    let submissions = vec![
        serde_json::json!({"name": "a", "children": [{"n": 1}, {"n": 2}]}),
        serde_json::json!({"name": "b", "children": [{"n": 3}, {"n": 4}]}),
    ];

    let tables = assemble_all(&submissions);

    let root = tables.get("root").expect("root table");
    assert_eq!(root.rows.len(), submissions.len());
    assert_eq!(root.cell(0, INDEX_COLUMN), Some(&Scalar::Number(0.0)));
    assert_eq!(root.cell(1, INDEX_COLUMN), Some(&Scalar::Number(1.0)));

    // Child counters are shared across the batch, not reset per submission.
    let children = tables.get("root_children").expect("children table");
    assert_eq!(children.rows.len(), 4);
    for row in 0..4 {
        assert_eq!(
            children.cell(row, INDEX_COLUMN),
            Some(&Scalar::Number(row as f64))
        );
        assert_eq!(
            children.cell(row, PARENT_INDEX_COLUMN),
            Some(&Scalar::Number((row / 2) as f64))
        );
    }
}

#[test]
fn flattening_is_deterministic() {
    let submissions = vec![serde_json::json!({
        "age": 30,
        "pets": [{"kind": "cat"}],
        "children": [{"name": "Ana", "toys": [{"label": "ball"}]}]
    })];

    let first = assemble_all(&submissions);
    let second = assemble_all(&submissions);
    assert_eq!(first, second);
}

#[test]
fn every_child_row_references_an_existing_parent_row() {
    let submissions = vec![
        serde_json::json!({
            "household": [
                {"members": [{"expenses": [{"amount": 5}, {"amount": 7}]}]},
                {"members": [{"expenses": [{"amount": 9}]}]}
            ]
        }),
        serde_json::json!({
            "household": [{"members": [{"expenses": [{"amount": 11}]}]}]
        }),
    ];

    let tables = assemble_all(&submissions);

    for table in &tables.tables {
        let Some(parent_table_col) = table.column_index(PARENT_TABLE_COLUMN) else {
            continue;
        };
        let parent_index_col = table
            .column_index(PARENT_INDEX_COLUMN)
            .expect("linked tables carry both linkage columns");

        for row in &table.rows {
            let Scalar::String(parent_name) = &row[parent_table_col] else {
                panic!("missing parent table name in {}", table.name);
            };
            let Scalar::Number(parent_index) = &row[parent_index_col] else {
                panic!("missing parent index in {}", table.name);
            };
            let parent = tables.get(parent_name).expect("parent table exists");
            let index_col = parent
                .column_index(INDEX_COLUMN)
                .expect("every table has an index column");
            assert_eq!(
                parent
                    .rows
                    .iter()
                    .filter(|parent_row| parent_row[index_col] == Scalar::Number(*parent_index))
                    .count(),
                1,
                "exactly one parent row for each child of {}",
                table.name
            );
        }
    }
}

#[test]
fn scalar_lists_are_serialized_not_recursed() {
    let submission = serde_json::json!({"tags": ["alpha", "beta"], "scores": [1, 2, 3]});

    let tables = assemble_all(&[submission]);
    assert_eq!(tables.names(), vec!["root"]);

    let root = tables.get("root").expect("root table");
    assert_eq!(
        root.cell(0, "tags"),
        Some(&Scalar::String(r#"["alpha","beta"]"#.to_string()))
    );
    assert_eq!(
        root.cell(0, "scores"),
        Some(&Scalar::String("[1,2,3]".to_string()))
    );
}

#[test]
fn empty_repeating_groups_emit_nothing() {
    let submissions = vec![
        serde_json::json!({"name": "a", "children": []}),
        serde_json::json!({"name": "b", "children": [{"n": 1}]}),
    ];

    let tables = assemble_all(&submissions);

    let root = tables.get("root").expect("root table");
    assert!(!root.columns.iter().any(|c| c == "children"));

    // The table exists because one submission has an occurrence, and only
    // that occurrence contributes a row.
    let children = tables.get("root_children").expect("children table");
    assert_eq!(children.rows.len(), 1);
    assert_eq!(
        children.cell(0, PARENT_INDEX_COLUMN),
        Some(&Scalar::Number(1.0))
    );
}

#[test]
fn null_fields_are_preserved_as_empty_cells() {
    let submissions = vec![
        serde_json::json!({"age": null}),
        serde_json::json!({"age": 41}),
    ];

    let tables = assemble_all(&submissions);
    let root = tables.get("root").expect("root table");
    assert_eq!(root.cell(0, "age"), Some(&Scalar::Null));
    assert_eq!(root.cell(1, "age"), Some(&Scalar::Number(41.0)));
}

#[test]
fn lone_sub_objects_become_single_row_child_tables() {
    let submission = serde_json::json!({"location": {"lat": 1.5, "lon": 2.5}});

    let tables = assemble_all(&[submission]);
    let location = tables.get("root_location").expect("location table");
    assert_eq!(location.rows.len(), 1);
    assert_eq!(location.cell(0, "lat"), Some(&Scalar::Number(1.5)));
    assert_eq!(
        location.cell(0, PARENT_TABLE_COLUMN),
        Some(&Scalar::String("root".to_string()))
    );
}

#[test]
fn excluded_fields_are_dropped() {
    let submission = serde_json::json!({
        "age": 30,
        "_xform_id_string": "aForm",
        "meta/instanceID": "uuid:123"
    });

    let tables = assemble_all(&[submission]);
    let root = tables.get("root").expect("root table");
    assert_eq!(root.columns, vec![INDEX_COLUMN, "age"]);
}

#[test]
fn group_prefixes_are_stripped_from_column_names() {
    let submission = serde_json::json!({"household/head/age": 52});

    let tables = assemble_all(&[submission]);
    let root = tables.get("root").expect("root table");
    assert_eq!(root.columns, vec![INDEX_COLUMN, "age"]);
    assert_eq!(root.cell(0, "age"), Some(&Scalar::Number(52.0)));
}

#[test]
fn group_and_column_roles_must_not_collide() {
    let submissions = vec![
        serde_json::json!({"members": "three"}),
        serde_json::json!({"members": [{"name": "Ana"}]}),
    ];

    let error = assemble(&submissions, &ExtractOptions::default())
        .expect_err("conflicting field roles are a configuration error");
    assert!(matches!(
        error,
        ExtractError::NameCollision { table, field } if table == "root" && field == "members"
    ));
}

#[test]
fn non_object_submissions_are_coerced_to_a_single_cell() {
    let submission = serde_json::Value::String("not a record".to_string());

    let tables = assemble_all(&[submission]);
    let root = tables.get("root").expect("root table");
    assert_eq!(root.rows.len(), 1);
    assert_eq!(
        root.cell(0, "value"),
        Some(&Scalar::String("not a record".to_string()))
    );
}

#[test]
fn custom_separator_and_root_name_flow_through() {
    let options = ExtractOptions {
        separator: ".".to_string(),
        root_table: "submissions".to_string(),
        ..ExtractOptions::default()
    };
    let submission = serde_json::json!({"children": [{"name": "Ana"}]});

    let tables = assemble(&[submission], &options)
        .expect("flattening succeeds")
        .expect("batch is not empty");

    assert_eq!(tables.names(), vec!["submissions", "submissions.children"]);
    let children = tables.get("submissions.children").expect("children table");
    assert_eq!(
        children.cell(0, PARENT_TABLE_COLUMN),
        Some(&Scalar::String("submissions".to_string()))
    );
}

#[test]
fn column_union_fills_missing_cells_with_null() {
    let submissions = vec![
        serde_json::json!({"age": 30}),
        serde_json::json!({"name": "Leo"}),
    ];

    let tables = assemble_all(&submissions);
    let root = tables.get("root").expect("root table");
    assert_eq!(root.columns, vec![INDEX_COLUMN, "age", "name"]);
    assert_eq!(root.cell(0, "name"), Some(&Scalar::Null));
    assert_eq!(root.cell(1, "age"), Some(&Scalar::Null));
}
