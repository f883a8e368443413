#[path = "common/mod.rs"]
mod common;

use common::*;
use tetl::{overlapping_ids, reconstruct_threads, write_table_atomic, BranchPolicy, CancelToken, Post};

fn ids(posts: &[Post]) -> Vec<&str> {
    posts.iter().map(|p| p.id.as_str()).collect()
}

/// A <- B <- C chain plus an unrelated root D: one thread of three, D pruned as a singleton.
#[test]
fn chain_folds_into_one_thread() {
    let posts = vec![
        post("A", "", "a", 3),
        post("B", "A", "b", 10),
        post("C", "B", "c", 1),
        post("D", "", "d", 0),
    ];
    let report = reconstruct_threads(&posts, " | ", BranchPolicy::FirstWins, None);

    assert_eq!(report.threads.len(), 1);
    let t = &report.threads[0];
    assert_eq!(t.root_id, "A");
    assert_eq!(t.last_id, "C");
    assert_eq!(t.length, 3);
    assert_eq!(t.text, "a | b | c");
    assert_eq!(t.max_likes, 10);
    assert_eq!(t.members, vec!["A", "B", "C"]);
    assert_eq!(report.singletons, vec!["D"]);
    assert!(report.orphans.is_empty());
    assert!(overlapping_ids(&report).is_empty());
}

/// Children listed before their parents need extra passes but end up in the same thread.
#[test]
fn out_of_order_replies_join_over_several_passes() {
    let posts = vec![post("A", "", "a", 0), post("C", "B", "c", 0), post("B", "A", "b", 0)];
    let report = reconstruct_threads(&posts, " | ", BranchPolicy::FirstWins, None);

    assert_eq!(report.threads.len(), 1);
    assert_eq!(report.threads[0].text, "a | b | c");
    assert!(report.passes >= 3, "passes = {}", report.passes);
}

/// A root replying to a post outside the table keeps that reference.
#[test]
fn external_parent_is_kept_on_the_root() {
    let posts = vec![post("A", "999", "a", 0), post("B", "A", "b", 0)];
    let report = reconstruct_threads(&posts, " | ", BranchPolicy::FirstWins, None);
    assert_eq!(report.threads[0].root_id, "A");
    assert_eq!(report.threads[0].parent_id, "999");
}

#[test]
fn sibling_replies_first_wins() {
    let posts = vec![
        post("A", "", "a", 0),
        post("B", "A", "b", 0),
        post("C", "A", "c", 0),
        post("D", "C", "d", 0),
    ];
    let report = reconstruct_threads(&posts, " | ", BranchPolicy::FirstWins, None);

    assert_eq!(report.threads.len(), 1);
    assert_eq!(report.threads[0].members, vec!["A", "B"]);
    assert_eq!(ids(&report.orphans), vec!["C", "D"]);
    assert!(overlapping_ids(&report).is_empty());
}

#[test]
fn sibling_replies_split_into_branches() {
    let posts = vec![
        post("A", "", "a", 0),
        post("B", "A", "b", 0),
        post("C", "A", "c", 0),
        post("D", "C", "d", 0),
    ];
    let report = reconstruct_threads(&posts, " | ", BranchPolicy::SplitBranches, None);

    let members: Vec<Vec<String>> = report.threads.iter().map(|t| t.members.clone()).collect();
    assert_eq!(members, vec![vec!["A", "B"], vec!["C", "D"]]);
    assert!(report.orphans.is_empty());
    assert!(overlapping_ids(&report).is_empty());
}

/// Every distinct post lands in exactly one place; duplicate ids are counted and dropped.
#[test]
fn every_post_is_accounted_for_once() {
    let mut posts = vec![
        post("1", "", "r1", 0),
        post("2", "1", "x", 0),
        post("3", "2", "x", 0),
        post("4", "1", "sibling", 0),
        post("5", "", "lonely", 0),
        post("6", "777", "reply elsewhere", 0),
        post("7", "6", "x", 0),
    ];
    posts.push(post("3", "2", "dup", 0));

    for policy in [BranchPolicy::FirstWins, BranchPolicy::SplitBranches] {
        let report = reconstruct_threads(&posts, " | ", policy, None);
        assert_eq!(report.duplicates, 1);
        let placed = report.threads.iter().map(|t| t.members.len()).sum::<usize>()
            + report.singletons.len()
            + report.orphans.len();
        assert_eq!(placed, 7, "{policy:?}");
        assert!(overlapping_ids(&report).is_empty(), "{policy:?}");
        assert!(report.threads.iter().all(|t| t.length >= 2 && t.length == t.members.len()));
    }
}

#[test]
fn build_threads_writes_threads_and_orphans() {
    let (_dir, etl) = workspace();
    let opts = etl.options().clone();
    std::fs::create_dir_all(&opts.output_dir).unwrap();
    let posts = vec![
        post("A", "", "a", 1),
        post("B", "A", "b", 2),
        post("C", "A", "c", 0),
        post("D", "", "d", 0),
    ];
    write_table_atomic(&opts.posts_path, &posts, 64 * 1024).unwrap();

    let report = etl.build_threads(&CancelToken::new()).unwrap();
    assert_eq!(report.threads.len(), 1);

    let lines = read_lines(&opts.threads_path);
    assert_eq!(
        lines[0],
        "root_id\tparent_id\tcreated_at\tlast_id\tlength\tmax_likes\tmax_shares\turls\ttext"
    );
    let rows = read_rows(&opts.threads_path);
    assert_eq!(rows, vec![vec!["A", "", CREATED_ISO, "B", "2", "2", "0", "", "a | b"]]);

    let orphans = read_rows(&opts.orphans_path);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0][1], "C");
}

#[test]
fn cancelled_reconstruction_writes_nothing() {
    let (_dir, etl) = workspace();
    let opts = etl.options().clone();
    std::fs::create_dir_all(&opts.output_dir).unwrap();
    write_table_atomic(&opts.posts_path, &[post("A", "", "a", 0), post("B", "A", "b", 0)], 64 * 1024).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let report = etl.build_threads(&cancel).unwrap();
    assert!(report.cancelled);
    assert!(!opts.threads_path.exists());
}
