// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn json_round_trip_preserves_fields() {
    let meta = CorpusMeta {
        category: Some("courses".into()),
        course: Some("history-of-philosophy".into()),
        series: Some("Ancient Greece".into()),
        episode: Some(7),
        difficulty: Some(2),
    };
    let parsed = CorpusMeta::from_json(&meta.to_json());
    assert_eq!(parsed, meta);
}

#[test]
fn from_json_tolerates_garbage() {
    assert_eq!(CorpusMeta::from_json("not json"), CorpusMeta::default());
    assert_eq!(CorpusMeta::from_json("{}"), CorpusMeta::default());
}

#[test]
fn unknown_category_lands_mid_scale() {
    assert_eq!(difficulty_bucket("introductions"), 0);
    assert_eq!(difficulty_bucket("seminars"), 3);
    assert_eq!(difficulty_bucket("miscellany"), 2);
}
