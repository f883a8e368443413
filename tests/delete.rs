#[path = "common/mod.rs"]
mod common;

use common::*;
use std::cell::RefCell;
use tetl::{read_delete_ids, CancelToken, LookupError, RemoveFn, Tetl, TetlOptions};

#[test]
fn deletes_listed_ids_and_counts_failures() {
    let (_dir, etl) = workspace();
    let ids_path = etl.options().delete_ids_path.clone();
    write_text(&ids_path, "id\n11\n12\n\n13\n");

    let seen = RefCell::new(Vec::new());
    let remover = RemoveFn(|id: &str| {
        seen.borrow_mut().push(id.to_string());
        if id == "12" {
            Err(LookupError::Http { id: id.to_string(), status: 500 })
        } else {
            Ok(())
        }
    });

    let summary = etl.delete_progress_every(1).delete_posts(&remover, &CancelToken::new()).unwrap();
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.cancelled);
    assert_eq!(*seen.borrow(), vec!["11", "12", "13"]);
}

#[test]
fn id_table_must_have_a_single_id_column() {
    let dir = tempfile::tempdir().unwrap();
    let two_cols = dir.path().join("two.tsv");
    write_text(&two_cols, "id\ttext\n1\tx\n");
    assert!(read_delete_ids(&two_cols, 8 * 1024).is_err());

    let wrong_name = dir.path().join("wrong.tsv");
    write_text(&wrong_name, "tweet_id\n1\n");
    assert!(read_delete_ids(&wrong_name, 8 * 1024).is_err());

    let ok = dir.path().join("ok.tsv");
    write_text(&ok, "id\n1\n2\n");
    assert_eq!(read_delete_ids(&ok, 8 * 1024).unwrap(), vec!["1", "2"]);
}

#[test]
fn cancellation_stops_deleting() {
    let (_dir, etl) = workspace();
    write_text(&etl.options().delete_ids_path, "id\n1\n2\n3\n");
    let cancel = CancelToken::new();
    let remover = RemoveFn(|_: &str| {
        cancel.cancel();
        Ok::<(), LookupError>(())
    });

    let summary = etl.delete_posts(&remover, &cancel).unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.deleted, 1);
}

#[test]
fn zero_progress_cadence_is_tolerated() {
    let (_dir, etl) = workspace();
    write_text(&etl.options().delete_ids_path, "id\n1\n2\n");
    let etl = Tetl::with_options(TetlOptions { delete_progress_every: 0, ..etl.options().clone() });
    let summary = etl.delete_posts(&RemoveFn(|_: &str| Ok::<(), LookupError>(())), &CancelToken::new()).unwrap();
    assert_eq!(summary.deleted, 2);
}
