// Configuration search for the traditional pipeline.
//
// The level scrolls at a constant speed and every note block sits in the
// column the screen reaches on that note's beat. A configuration pairs a
// scroll speed with a tiles-per-beat spacing; it is admissible when every note
// lands on a whole column (tiles-per-beat is a multiple of the lcm of the
// reduced beat denominators), the spacing is within `max_tiles_per_beat`, the
// speed is allowed by the scroll preference, and the level fits the width
// budget.
//
// Candidates are ranked by how far the heard tempo is from the requested one,
// then by speed index in the catalog, then by spacing. The optimizer tries at
// most `max_configurations` of them.

use crate::config::GameData;
use crate::physics::ScrollSpeed;
use crate::types::{LevelBounds, NoteTarget, ScrollPreference, lcm};
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    /// Index into `GameData::scroll_speeds`.
    pub speed_index: usize,
    pub speed: ScrollSpeed,
    pub tiles_per_beat: u32,
    pub effective_bpm: f64,
    /// Columns the level needs: last note column plus the tail.
    pub width: i32,
}

impl Configuration {
    pub fn deviation(&self, tempo_bpm: f64) -> f64 {
        (self.effective_bpm - tempo_bpm).abs()
    }
}

/// Lcm of the reduced denominators of every note's beat.
pub fn beat_denominator_lcm(notes: &[NoteTarget]) -> u64 {
    notes.iter().fold(1, |acc, n| lcm(acc, n.time.den() as u64))
}

/// Column of a note under a spacing, if it lands on a whole column.
pub fn note_column(data: &GameData, note: &NoteTarget, tiles_per_beat: u32) -> Option<i32> {
    let offset = note.time.scaled_exact(tiles_per_beat)?;
    i32::try_from(offset)
        .ok()
        .map(|o| data.traditional.lead_in_columns + o)
}

/// Every admissible configuration, best first, capped.
pub fn rank_configurations(
    data: &GameData,
    notes: &[NoteTarget],
    tempo_bpm: f64,
    level: LevelBounds,
    preference: ScrollPreference,
) -> Vec<Configuration> {
    let step = beat_denominator_lcm(notes);
    let max_tpb = data.traditional.max_tiles_per_beat as u64;
    let mut found = Vec::new();

    for (speed_index, speed) in data.scroll_speeds.iter().enumerate() {
        if !preference.permits(speed.autoscroll) {
            continue;
        }
        let mut tpb = step;
        while tpb <= max_tpb {
            let tiles_per_beat = tpb as u32;
            let last = notes
                .iter()
                .map(|n| note_column(data, n, tiles_per_beat))
                .try_fold(data.traditional.lead_in_columns, |acc, c| c.map(|c| acc.max(c)));
            if let Some(last) = last {
                let width = last + data.traditional.tail_columns;
                if width <= level.width {
                    found.push(Configuration {
                        speed_index,
                        speed: speed.clone(),
                        tiles_per_beat,
                        effective_bpm: speed.effective_bpm(tiles_per_beat),
                        width,
                    });
                }
            }
            tpb += step;
        }
    }

    found.sort_by(|a, b| rank_cmp(a, b, tempo_bpm));
    found.truncate(data.limits.max_configurations);
    found
}

/// Closer tempo first, then catalog speed order, then tighter spacing.
pub fn rank_cmp(a: &Configuration, b: &Configuration, tempo_bpm: f64) -> Ordering {
    a.deviation(tempo_bpm)
        .total_cmp(&b.deviation(tempo_bpm))
        .then(a.speed_index.cmp(&b.speed_index))
        .then(a.tiles_per_beat.cmp(&b.tiles_per_beat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BeatTime, EntityKind};

    fn quarter_notes() -> Vec<NoteTarget> {
        (0..4)
            .map(|i| NoteTarget::new(i, 8, BeatTime::whole(i), EntityKind::Goomba))
            .collect()
    }

    #[test]
    fn exact_tempo_ranks_first() {
        let data = GameData::default();
        let ranked = rank_configurations(
            &data,
            &quarter_notes(),
            120.0,
            LevelBounds::new(80, 27),
            ScrollPreference::Any,
        );
        assert_eq!(ranked.len(), 12);
        let best = &ranked[0];
        assert_eq!(best.speed.name, "autoscroll-fast");
        assert_eq!(best.tiles_per_beat, 15);
        assert_eq!(best.effective_bpm, 120.0);
        assert_eq!(best.width, 59);
        for pair in ranked.windows(2) {
            assert_ne!(rank_cmp(&pair[0], &pair[1], 120.0), Ordering::Greater);
        }
    }

    #[test]
    fn fractional_beats_force_spacing_multiples() {
        let data = GameData::default();
        let notes = vec![
            NoteTarget::new(0, 8, BeatTime::new(1, 3), EntityKind::Goomba),
            NoteTarget::new(1, 8, BeatTime::new(1, 2), EntityKind::Goomba),
        ];
        assert_eq!(beat_denominator_lcm(&notes), 6);
        let ranked = rank_configurations(&data, &notes, 120.0, LevelBounds::new(80, 27), ScrollPreference::Any);
        assert!(ranked.iter().all(|c| c.tiles_per_beat % 6 == 0));
        assert!(!ranked.is_empty());
    }

    #[test]
    fn preference_filters_speeds() {
        let data = GameData::default();
        let ranked = rank_configurations(
            &data,
            &quarter_notes(),
            120.0,
            LevelBounds::new(80, 27),
            ScrollPreference::NonAutoscroll,
        );
        assert!(ranked.iter().all(|c| !c.speed.autoscroll));
    }

    #[test]
    fn nothing_fits_a_tiny_level() {
        let data = GameData::default();
        let ranked = rank_configurations(
            &data,
            &quarter_notes(),
            120.0,
            LevelBounds::new(12, 27),
            ScrollPreference::Any,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn columns_follow_lead_in() {
        let data = GameData::default();
        let note = NoteTarget::new(0, 8, BeatTime::new(3, 2), EntityKind::Goomba);
        assert_eq!(note_column(&data, &note, 4), Some(16));
        assert_eq!(note_column(&data, &note, 3), None);
    }
}
