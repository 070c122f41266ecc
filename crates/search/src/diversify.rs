// SPDX-License-Identifier: MIT

//! Source diversification.
//!
//! Caps how many passages a single file may contribute to the result
//! window, preferring spread across courses, so ten near-duplicate chunks
//! from one lecture don't crowd out the rest of the corpus. The #1 ranked
//! passage is always preserved. When the caps would leave the window short,
//! they are relaxed rather than returning fewer results.

use crate::pipeline::RankedPassage;
use std::collections::HashMap;

pub const DEFAULT_MAX_PER_FILE: usize = 2;

fn course_key(passage: &RankedPassage) -> String {
    passage.course.clone().unwrap_or_default()
}

/// Select up to `window` passages from `ranked` (already in rank order).
pub fn diversify(
    ranked: &[RankedPassage],
    window: usize,
    max_per_file: usize,
) -> Vec<RankedPassage> {
    if ranked.len() <= window {
        return ranked.to_vec();
    }

    let mut per_file: HashMap<String, usize> = HashMap::new();
    let mut per_course: HashMap<String, usize> = HashMap::new();
    let mut selected: Vec<RankedPassage> = Vec::with_capacity(window);
    let mut passed_over: Vec<RankedPassage> = Vec::new();

    let mut take = |selected: &mut Vec<RankedPassage>,
                    per_file: &mut HashMap<String, usize>,
                    per_course: &mut HashMap<String, usize>,
                    passage: &RankedPassage| {
        *per_file.entry(passage.file_id.clone()).or_insert(0) += 1;
        *per_course.entry(course_key(passage)).or_insert(0) += 1;
        selected.push(passage.clone());
    };

    for (index, passage) in ranked.iter().enumerate() {
        if selected.len() == window {
            break;
        }
        // Rank 1 is non-negotiable.
        if index == 0 {
            take(&mut selected, &mut per_file, &mut per_course, passage);
            continue;
        }
        let file_count = per_file.get(&passage.file_id).copied().unwrap_or(0);
        if file_count >= max_per_file {
            passed_over.push(passage.clone());
            continue;
        }
        // Within the cap, still prefer unseen courses: defer a repeat
        // course while unseen material remains further down the ranking.
        let course_count = per_course.get(&course_key(passage)).copied().unwrap_or(0);
        if course_count > 0 && remaining_has_new_course(&ranked[index + 1..], &per_course) {
            passed_over.push(passage.clone());
            continue;
        }
        take(&mut selected, &mut per_file, &mut per_course, passage);
    }

    // Relax constraints: refill from the passed-over, best rank first.
    for passage in &passed_over {
        if selected.len() == window {
            break;
        }
        take(&mut selected, &mut per_file, &mut per_course, passage);
    }
    selected.sort_by_key(|p| p.rank);
    selected
}

fn remaining_has_new_course(rest: &[RankedPassage], seen: &HashMap<String, usize>) -> bool {
    rest.iter().any(|p| !seen.contains_key(&course_key(p)))
}

#[cfg(test)]
#[path = "diversify_tests.rs"]
mod tests;
