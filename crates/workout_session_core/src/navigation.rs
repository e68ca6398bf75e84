//! crates/workout_session_core/src/navigation.rs
//!
//! Pure navigation over a session's exercise/set tree: the active-exercise
//! list, superset grouping, the round-major resume scan, and rest durations.
//! Nothing here holds state; the engine calls these on every query.

use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::{Position, Screen, Session, SessionExercise};

/// Rest between sets (and superset rounds) when nothing is configured.
pub const DEFAULT_REST_SECONDS: u32 = 90;
/// Rest after an exercise or superset, before the next one, when nothing is configured.
pub const DEFAULT_TRANSITION_SECONDS: u32 = 120;

//=========================================================================================
// Active List & Superset Grouping
//=========================================================================================

/// The session's exercises without skipped or substituted rows, in order.
/// All index-based navigation is relative to this list.
pub fn active_exercises(session: &Session) -> Vec<&SessionExercise> {
    session.exercises.iter().filter(|e| e.is_active()).collect()
}

/// Ids of every active exercise sharing the superset item of `active[index]`,
/// in list order. Empty unless at least two active members exist.
pub fn superset_ids(active: &[&SessionExercise], index: usize) -> Vec<Uuid> {
    let Some(item_id) = active.get(index).and_then(|e| e.superset_item_id()) else {
        return Vec::new();
    };
    let ids: Vec<Uuid> = active
        .iter()
        .filter(|e| e.superset_item_id() == Some(item_id))
        .map(|e| e.id)
        .collect();
    if ids.len() < 2 {
        Vec::new()
    } else {
        ids
    }
}

pub fn is_in_superset(active: &[&SessionExercise], index: usize) -> bool {
    !superset_ids(active, index).is_empty()
}

pub fn index_of(active: &[&SessionExercise], exercise_id: Uuid) -> Option<usize> {
    active.iter().position(|e| e.id == exercise_id)
}

/// Groups the active list into execution blocks: a superset's members form
/// one block (placed where its first member appears), every other exercise
/// is a block of its own. Each block holds indices into `active`.
pub fn blocks(active: &[&SessionExercise]) -> Vec<Vec<usize>> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut out = Vec::new();
    for (index, exercise) in active.iter().enumerate() {
        if seen.contains(&exercise.id) {
            continue;
        }
        let siblings = superset_ids(active, index);
        if siblings.is_empty() {
            seen.insert(exercise.id);
            out.push(vec![index]);
        } else {
            let block: Vec<usize> = siblings
                .iter()
                .filter_map(|id| index_of(active, *id))
                .collect();
            seen.extend(siblings);
            out.push(block);
        }
    }
    out
}

/// The block containing `active[index]`.
pub fn block_of(active: &[&SessionExercise], index: usize) -> Vec<usize> {
    blocks(active)
        .into_iter()
        .find(|block| block.contains(&index))
        .unwrap_or_default()
}

//=========================================================================================
// Resume Scan
//=========================================================================================

/// The first incomplete set, scanning blocks in order. Within a superset the
/// scan is round-major: round 0 across every member, then round 1, and so on.
pub fn next_position(active: &[&SessionExercise]) -> Option<Position> {
    for block in blocks(active) {
        if let [index] = block.as_slice() {
            let exercise = active[*index];
            if let Some(set_index) = exercise.first_incomplete_set() {
                return Some(Position {
                    screen: Screen::Exercise,
                    exercise_index: *index,
                    set_index,
                    superset_round: 0,
                    superset_position: 0,
                    superset_exercise_ids: Vec::new(),
                });
            }
            continue;
        }

        let ids: Vec<Uuid> = block.iter().map(|i| active[*i].id).collect();
        let rounds = block.iter().map(|i| active[*i].sets.len()).max().unwrap_or(0);
        for round in 0..rounds {
            for (member, index) in block.iter().enumerate() {
                let pending = active[*index]
                    .sets
                    .get(round)
                    .is_some_and(|set| !set.is_completed());
                if pending {
                    return Some(Position {
                        screen: Screen::SupersetExercise,
                        exercise_index: *index,
                        set_index: round,
                        superset_round: round,
                        superset_position: member,
                        superset_exercise_ids: ids,
                    });
                }
            }
        }
    }
    None
}

/// Recomputes where a persisted session should resume.
///
/// Lands on `Overview` when nothing has been performed yet, on `Summary` when
/// nothing is left, and otherwise on the first incomplete set.
pub fn resume_position(active: &[&SessionExercise]) -> Position {
    let any_completed = active
        .iter()
        .any(|e| e.sets.iter().any(|s| s.is_completed()));
    match next_position(active) {
        Some(_) if !any_completed => Position::at(Screen::Overview),
        Some(position) => position,
        None => Position::at(Screen::Summary),
    }
}

/// Where the next member of the current superset round is, if any remains.
pub fn next_in_round(
    active: &[&SessionExercise],
    ids: &[Uuid],
    round: usize,
    after_member: usize,
) -> Option<(usize, usize)> {
    ids.iter()
        .enumerate()
        .skip(after_member + 1)
        .filter_map(|(member, id)| index_of(active, *id).map(|index| (member, index)))
        .find(|(_, index)| {
            active[*index]
                .sets
                .get(round)
                .is_some_and(|set| !set.is_completed())
        })
}

/// The first later round of the superset with any incomplete set, and the
/// member/index that opens it.
pub fn next_round(
    active: &[&SessionExercise],
    ids: &[Uuid],
    round: usize,
) -> Option<(usize, usize, usize)> {
    let members: Vec<usize> = ids.iter().filter_map(|id| index_of(active, *id)).collect();
    let rounds = members.iter().map(|i| active[*i].sets.len()).max().unwrap_or(0);
    (round + 1..rounds).find_map(|next| {
        members.iter().enumerate().find_map(|(member, index)| {
            active[*index]
                .sets
                .get(next)
                .is_some_and(|set| !set.is_completed())
                .then_some((next, member, *index))
        })
    })
}

//=========================================================================================
// Reordering
//=========================================================================================

/// The active ids with the block containing `index` moved to the end.
pub fn postponed_order(active: &[&SessionExercise], index: usize) -> Vec<Uuid> {
    let mut staying = Vec::new();
    let mut moved = Vec::new();
    for block in blocks(active) {
        let ids = block.iter().map(|i| active[*i].id);
        if block.contains(&index) {
            moved.extend(ids);
        } else {
            staying.extend(ids);
        }
    }
    staying.extend(moved);
    staying
}

/// Checks that `ids` is a permutation of the active ids that keeps every
/// superset as one contiguous block.
pub fn validate_order(active: &[&SessionExercise], ids: &[Uuid]) -> Result<(), String> {
    let expected: HashSet<Uuid> = active.iter().map(|e| e.id).collect();
    let given: HashSet<Uuid> = ids.iter().copied().collect();
    if given.len() != ids.len() {
        return Err("exercise ids contain duplicates".to_string());
    }
    if let Some(unknown) = given.difference(&expected).next() {
        return Err(format!("exercise {} is not an active exercise of this session", unknown));
    }
    if given.len() != expected.len() {
        return Err("every active exercise must be listed".to_string());
    }

    for block in blocks(active).into_iter().filter(|b| b.len() > 1) {
        let members: HashSet<Uuid> = block.iter().map(|i| active[*i].id).collect();
        let positions: Vec<usize> = ids
            .iter()
            .enumerate()
            .filter(|(_, id)| members.contains(id))
            .map(|(pos, _)| pos)
            .collect();
        let contiguous = positions.windows(2).all(|w| w[1] == w[0] + 1);
        if !contiguous {
            return Err("superset members must stay contiguous".to_string());
        }
    }
    Ok(())
}

//=========================================================================================
// Rest Durations
//=========================================================================================

pub fn rest_between_sets(exercise: &SessionExercise) -> u32 {
    exercise.rest_seconds.unwrap_or(DEFAULT_REST_SECONDS)
}

pub fn rest_between_rounds(exercise: &SessionExercise) -> u32 {
    exercise
        .workout_item
        .as_ref()
        .and_then(|item| item.rest_seconds)
        .unwrap_or(DEFAULT_REST_SECONDS)
}

pub fn rest_after_item(exercise: &SessionExercise) -> u32 {
    exercise
        .workout_item
        .as_ref()
        .and_then(|item| item.rest_after_seconds)
        .unwrap_or(DEFAULT_TRANSITION_SECONDS)
}
