use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tabcore::{Cell, Compute, ComputeContext, ComputeError, FilterOp, Frame, JoinHow};
use tabnodes::{CsvReadNode, FilterNode, JoinNode};

/// Write a CSV fixture into a per-test scratch directory.
fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tabnodes-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

fn ctx(inputs: Vec<(&str, Frame)>) -> ComputeContext {
    let map: HashMap<String, Arc<Frame>> = inputs
        .into_iter()
        .map(|(name, frame)| (name.to_string(), Arc::new(frame)))
        .collect();
    ComputeContext::new(map)
}

fn sales_frame() -> Frame {
    let mut frame = Frame::new(vec!["Store".into(), "Date".into(), "Weekly_Sales".into()]);
    frame.push_row(vec![
        Cell::Int(1),
        Cell::Str("2010-02-05".into()),
        Cell::Float(24924.5),
    ]);
    frame.push_row(vec![
        Cell::Int(2),
        Cell::Str("2010-02-05".into()),
        Cell::Float(41595.55),
    ]);
    frame.push_row(vec![
        Cell::Int(3),
        Cell::Str("2010-02-05".into()),
        Cell::Float(19403.54),
    ]);
    frame
}

fn stores_frame() -> Frame {
    let mut frame = Frame::new(vec!["Store".into(), "Type".into(), "Size".into()]);
    frame.push_row(vec![Cell::Int(1), Cell::Str("A".into()), Cell::Int(151315)]);
    frame.push_row(vec![Cell::Int(2), Cell::Str("A".into()), Cell::Int(202307)]);
    frame
}

#[tokio::test]
async fn csv_read_infers_cell_types() {
    let path = write_fixture(
        "sales.csv",
        "Store,Date,Weekly_Sales,IsHoliday\n\
         1,2010-02-05,24924.50,FALSE\n\
         2,2010-02-12,46039.49,TRUE\n\
         3,2010-02-19,,FALSE\n",
    );

    let node = CsvReadNode::new(path.to_string_lossy());
    let frame = node.compute(ctx(vec![])).await.expect("read succeeds");

    assert_eq!(
        frame.columns(),
        &["Store", "Date", "Weekly_Sales", "IsHoliday"]
    );
    assert_eq!(frame.n_rows(), 3);
    assert_eq!(frame.rows()[0][0], Cell::Int(1));
    assert_eq!(frame.rows()[0][1], Cell::Str("2010-02-05".into()));
    assert_eq!(frame.rows()[0][2], Cell::Float(24924.50));
    assert_eq!(frame.rows()[1][3], Cell::Bool(true));
    assert_eq!(frame.rows()[2][2], Cell::Null);
}

#[tokio::test]
async fn csv_missing_file_is_io_error() {
    let node = CsvReadNode::new("testdataset/definitely_missing.csv");
    let err = node.compute(ctx(vec![])).await.unwrap_err();
    assert!(matches!(err, ComputeError::Io(_)), "got {:?}", err);
}

#[tokio::test]
async fn csv_ragged_row_is_parse_error() {
    let path = write_fixture("ragged.csv", "a,b,c\n1,2,3\n4,5\n");
    let node = CsvReadNode::new(path.to_string_lossy());
    let err = node.compute(ctx(vec![])).await.unwrap_err();
    assert!(matches!(err, ComputeError::Parse(_)), "got {:?}", err);
}

#[tokio::test]
async fn inner_join_matches_on_key() {
    let node = JoinNode::new("sales", "stores", vec!["Store".into()], JoinHow::Inner);
    let frame = node
        .compute(ctx(vec![("sales", sales_frame()), ("stores", stores_frame())]))
        .await
        .expect("join succeeds");

    // Store 3 has no match in stores and is dropped by the inner join.
    assert_eq!(frame.n_rows(), 2);
    assert_eq!(
        frame.columns(),
        &["Store", "Date", "Weekly_Sales", "Type", "Size"]
    );
    assert_eq!(frame.rows()[0][3], Cell::Str("A".into()));
    assert_eq!(frame.rows()[1][4], Cell::Int(202307));
}

#[tokio::test]
async fn left_join_fills_nulls_for_unmatched_rows() {
    let node = JoinNode::new("sales", "stores", vec!["Store".into()], JoinHow::Left);
    let frame = node
        .compute(ctx(vec![("sales", sales_frame()), ("stores", stores_frame())]))
        .await
        .expect("join succeeds");

    assert_eq!(frame.n_rows(), 3);
    let unmatched = &frame.rows()[2];
    assert_eq!(unmatched[0], Cell::Int(3));
    assert_eq!(unmatched[3], Cell::Null);
    assert_eq!(unmatched[4], Cell::Null);
}

#[tokio::test]
async fn overlapping_right_columns_are_suffixed() {
    let mut left = Frame::new(vec!["Store".into(), "IsHoliday".into()]);
    left.push_row(vec![Cell::Int(1), Cell::Bool(false)]);
    let mut right = Frame::new(vec!["Store".into(), "IsHoliday".into()]);
    right.push_row(vec![Cell::Int(1), Cell::Bool(true)]);

    let node = JoinNode::new("l", "r", vec!["Store".into()], JoinHow::Inner);
    let frame = node
        .compute(ctx(vec![("l", left), ("r", right)]))
        .await
        .expect("join succeeds");

    assert_eq!(frame.columns(), &["Store", "IsHoliday", "IsHoliday_right"]);
    assert_eq!(frame.rows()[0][1], Cell::Bool(false));
    assert_eq!(frame.rows()[0][2], Cell::Bool(true));
}

#[tokio::test]
async fn missing_join_key_is_schema_error() {
    let node = JoinNode::new("sales", "stores", vec!["Dept".into()], JoinHow::Inner);
    let err = node
        .compute(ctx(vec![("sales", sales_frame()), ("stores", stores_frame())]))
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::Schema(_)), "got {:?}", err);
    assert!(err.to_string().contains("Dept"));
}

#[tokio::test]
async fn duplicate_right_key_is_join_conflict() {
    let mut right = stores_frame();
    right.push_row(vec![Cell::Int(1), Cell::Str("B".into()), Cell::Int(999)]);

    let node = JoinNode::new("sales", "stores", vec!["Store".into()], JoinHow::Inner);
    let err = node
        .compute(ctx(vec![("sales", sales_frame()), ("stores", right)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::JoinConflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn filter_keeps_matching_rows_only() {
    let node = FilterNode::new("sales", "Weekly_Sales", FilterOp::Gt, Cell::Int(20000));
    let frame = node
        .compute(ctx(vec![("sales", sales_frame())]))
        .await
        .expect("filter succeeds");

    assert_eq!(frame.n_rows(), 2);
    assert_eq!(frame.columns(), &["Store", "Date", "Weekly_Sales"]);
    assert_eq!(frame.rows()[0][0], Cell::Int(1));
    assert_eq!(frame.rows()[1][0], Cell::Int(2));
}

#[tokio::test]
async fn filter_matches_strings_by_equality() {
    let node = FilterNode::new(
        "sales",
        "Date",
        FilterOp::Eq,
        Cell::Str("2010-02-05".into()),
    );
    let frame = node
        .compute(ctx(vec![("sales", sales_frame())]))
        .await
        .expect("filter succeeds");
    assert_eq!(frame.n_rows(), 3);

    let node = FilterNode::new(
        "sales",
        "Date",
        FilterOp::Eq,
        Cell::Str("1999-01-01".into()),
    );
    let frame = node
        .compute(ctx(vec![("sales", sales_frame())]))
        .await
        .expect("filter succeeds");
    assert!(frame.is_empty());
}

#[tokio::test]
async fn filter_excludes_null_and_incomparable_cells() {
    let mut input = Frame::new(vec!["Store".into(), "Size".into()]);
    input.push_row(vec![Cell::Int(1), Cell::Int(100)]);
    input.push_row(vec![Cell::Int(2), Cell::Null]);
    input.push_row(vec![Cell::Int(3), Cell::Str("n/a".into())]);

    let node = FilterNode::new("stores", "Size", FilterOp::Gte, Cell::Int(50));
    let frame = node
        .compute(ctx(vec![("stores", input)]))
        .await
        .expect("filter succeeds");

    assert_eq!(frame.n_rows(), 1);
    assert_eq!(frame.rows()[0][0], Cell::Int(1));
}

#[tokio::test]
async fn filter_missing_column_is_schema_error() {
    let node = FilterNode::new("sales", "Dept", FilterOp::Eq, Cell::Int(1));
    let err = node
        .compute(ctx(vec![("sales", sales_frame())]))
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::Schema(_)), "got {:?}", err);
    assert!(err.to_string().contains("Dept"));
}

#[tokio::test]
async fn multi_key_join_requires_all_keys_to_match() {
    let mut left = Frame::new(vec!["Store".into(), "Date".into(), "Sales".into()]);
    left.push_row(vec![Cell::Int(1), Cell::Str("d1".into()), Cell::Int(10)]);
    left.push_row(vec![Cell::Int(1), Cell::Str("d2".into()), Cell::Int(20)]);

    let mut right = Frame::new(vec!["Store".into(), "Date".into(), "Temp".into()]);
    right.push_row(vec![Cell::Int(1), Cell::Str("d1".into()), Cell::Float(42.3)]);

    let node = JoinNode::new(
        "l",
        "r",
        vec!["Store".into(), "Date".into()],
        JoinHow::Inner,
    );
    let frame = node
        .compute(ctx(vec![("l", left), ("r", right)]))
        .await
        .expect("join succeeds");

    assert_eq!(frame.n_rows(), 1);
    assert_eq!(frame.columns(), &["Store", "Date", "Sales", "Temp"]);
    assert_eq!(frame.rows()[0][3], Cell::Float(42.3));
}
