// SPDX-License-Identifier: MIT

use super::*;

fn passage(rank: usize, file_id: &str, course: &str) -> RankedPassage {
    RankedPassage {
        passage_id: format!("p{rank}"),
        file_id: file_id.to_string(),
        text: format!("passage {rank}"),
        rank,
        course: if course.is_empty() {
            None
        } else {
            Some(course.to_string())
        },
        difficulty: None,
    }
}

#[test]
fn short_input_passes_through() {
    let ranked = vec![passage(0, "f1", "logic"), passage(1, "f2", "ethics")];
    let out = diversify(&ranked, 10, 2);
    assert_eq!(out.len(), 2);
}

#[test]
fn caps_passages_per_file() {
    // Six chunks from one file, two from another.
    let mut ranked = Vec::new();
    for i in 0..6 {
        ranked.push(passage(i, "f1", "logic"));
    }
    ranked.push(passage(6, "f2", "ethics"));
    ranked.push(passage(7, "f3", "ethics"));

    let out = diversify(&ranked, 4, 2);
    let from_f1 = out.iter().filter(|p| p.file_id == "f1").count();
    assert_eq!(from_f1, 2);
    assert_eq!(out.len(), 4);
}

#[test]
fn rank_one_is_always_kept() {
    let mut ranked = Vec::new();
    for i in 0..12 {
        ranked.push(passage(i, "f1", "logic"));
    }
    let out = diversify(&ranked, 4, 1);
    assert_eq!(out[0].rank, 0);
}

#[test]
fn prefers_unseen_courses() {
    let ranked = vec![
        passage(0, "f1", "logic"),
        passage(1, "f2", "logic"),
        passage(2, "f3", "ethics"),
        passage(3, "f4", "epistemology"),
        passage(4, "f5", "logic"),
        passage(5, "f6", "logic"),
    ];
    let out = diversify(&ranked, 3, 2);
    let courses: Vec<&str> = out.iter().map(|p| p.course.as_deref().unwrap_or("")).collect();
    assert!(courses.contains(&"logic"));
    assert!(courses.contains(&"ethics"));
    assert!(courses.contains(&"epistemology"));
}

#[test]
fn relaxes_caps_rather_than_under_filling() {
    // Only one file available; the per-file cap must give way.
    let mut ranked = Vec::new();
    for i in 0..8 {
        ranked.push(passage(i, "f1", "logic"));
    }
    let out = diversify(&ranked, 5, 2);
    assert_eq!(out.len(), 5);
}

#[test]
fn output_is_in_rank_order() {
    let ranked = vec![
        passage(0, "f1", "logic"),
        passage(1, "f1", "logic"),
        passage(2, "f1", "logic"),
        passage(3, "f2", "ethics"),
        passage(4, "f3", "politics"),
        passage(5, "f4", "art"),
    ];
    let out = diversify(&ranked, 4, 2);
    let ranks: Vec<usize> = out.iter().map(|p| p.rank).collect();
    let mut sorted = ranks.clone();
    sorted.sort_unstable();
    assert_eq!(ranks, sorted);
}
