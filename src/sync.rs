//! Subtitle timing correction against the media it belongs to.
//!
//! Both strategies are pure: they take a track and return a new one.

use tracing::debug;

use crate::error::{AmareloError, Result};
use crate::media::MediaDescriptor;
use crate::subtitle::{SubtitleEntry, SubtitleTrack};
use crate::transcribe::Segment;

/// Keep the wording of `existing` but take timing from a fresh transcription.
///
/// Entries and segments are paired by position. Entries left over once the
/// segments run out are laid end to end after the last known end, keeping
/// their own durations; surplus segments are dropped.
pub fn realign(existing: &SubtitleTrack, fresh_segments: &[Segment]) -> Result<SubtitleTrack> {
    if fresh_segments.is_empty() {
        return Err(AmareloError::Synchronization(
            "Fresh transcription produced no timing to align with".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(existing.len());
    let mut last_end = 0.0_f64;

    for (i, entry) in existing.iter().enumerate() {
        let (start, end) = match fresh_segments.get(i) {
            Some(segment) => (segment.start, segment.end),
            None => (last_end, last_end + entry.duration()),
        };
        last_end = end;
        entries.push(entry.with_timing(start, end));
    }

    debug!(
        "Realigned {} entries against {} fresh segments",
        existing.len(),
        fresh_segments.len()
    );
    checked_track(entries)
}

/// Shift the whole track so its first entry lands on the first scene mark.
///
/// Timing is clamped to `[0, duration]` and every entry is kept on screen for
/// at least `min_duration` seconds where the media length allows it. Without
/// scene marks or a known duration the track is returned unchanged.
pub fn offset_by_anchor(existing: &SubtitleTrack, media: &MediaDescriptor, min_duration: f64) -> Result<SubtitleTrack> {
    let (Some(first_mark), Some(first_entry)) = (media.scene_marks.first(), existing.first()) else {
        return Ok(existing.clone());
    };
    if !media.has_known_duration() {
        return Ok(existing.clone());
    }

    let duration = media.duration;
    let min_duration = min_duration.max(0.0);
    let latest_start = (duration - min_duration).max(0.0);
    let offset = first_mark - first_entry.start;
    debug!("Shifting {} entries by {:.3}s", existing.len(), offset);

    let entries = existing
        .iter()
        .map(|entry| {
            let start = (entry.start + offset).clamp(0.0, latest_start);
            let mut end = (entry.end + offset).clamp(0.0, duration);
            if end - start < min_duration {
                end = (start + min_duration).min(duration);
            }
            entry.with_timing(start, end)
        })
        .collect();

    checked_track(entries)
}

fn checked_track(entries: Vec<SubtitleEntry>) -> Result<SubtitleTrack> {
    if let Some(bad) = entries.iter().find(|e| !(e.end > e.start)) {
        return Err(AmareloError::Synchronization(format!(
            "Entry {} would end at {:.3}s before it starts at {:.3}s",
            bad.index, bad.end, bad.start
        )));
    }
    Ok(SubtitleTrack::from(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(spans: &[(f64, f64, &str)]) -> SubtitleTrack {
        SubtitleTrack::from(
            spans
                .iter()
                .enumerate()
                .map(|(i, (s, e, t))| SubtitleEntry::new(i + 1, *s, *e, *t).unwrap())
                .collect::<Vec<_>>(),
        )
    }

    fn media(duration: f64, marks: Vec<f64>) -> MediaDescriptor {
        MediaDescriptor::new("movie.mp4", duration).with_scene_marks(marks)
    }

    #[test]
    fn test_realign_takes_new_timing_old_words() {
        let old = track(&[(0.0, 1.0, "one"), (2.0, 3.0, "two")]);
        let fresh = vec![
            Segment::new(0.5, 1.7, "uno"),
            Segment::new(2.4, 3.9, "dos"),
            Segment::new(5.0, 6.0, "tres"),
        ];
        let aligned = realign(&old, &fresh).unwrap();

        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned.entries()[0].text, "one");
        assert_eq!((aligned.entries()[0].start, aligned.entries()[0].end), (0.5, 1.7));
        assert_eq!((aligned.entries()[1].start, aligned.entries()[1].end), (2.4, 3.9));
    }

    #[test]
    fn test_realign_appends_leftover_entries() {
        let old = track(&[(0.0, 1.0, "one"), (2.0, 4.0, "two"), (5.0, 5.5, "three")]);
        let aligned = realign(&old, &[Segment::new(10.0, 11.0, "x")]).unwrap();

        let spans: Vec<_> = aligned.iter().map(|e| (e.start, e.end)).collect();
        assert_eq!(spans, vec![(10.0, 11.0), (11.0, 13.0), (13.0, 13.5)]);
        assert_eq!(aligned.entries()[2].text, "three");
    }

    #[test]
    fn test_realign_rejects_empty_or_broken_timing() {
        let old = track(&[(0.0, 1.0, "one")]);
        assert!(matches!(realign(&old, &[]), Err(AmareloError::Synchronization(_))));
        assert!(matches!(
            realign(&old, &[Segment::new(3.0, 3.0, "zero")]),
            Err(AmareloError::Synchronization(_))
        ));
    }

    #[test]
    fn test_offset_shifts_to_first_mark() {
        let old = track(&[(1.0, 2.0, "a"), (3.0, 4.5, "b")]);
        let shifted = offset_by_anchor(&old, &media(60.0, vec![3.0, 20.0]), 0.5).unwrap();

        let spans: Vec<_> = shifted.iter().map(|e| (e.start, e.end)).collect();
        assert_eq!(spans, vec![(3.0, 4.0), (5.0, 6.5)]);
    }

    #[test]
    fn test_offset_clamps_to_media_and_keeps_min_duration() {
        let old = track(&[(10.0, 10.2, "early"), (18.0, 25.0, "late")]);
        // offset +1: second entry would run to 26s in a 20s video
        let shifted = offset_by_anchor(&old, &media(20.0, vec![11.0]), 0.5).unwrap();

        assert_eq!((shifted.entries()[0].start, shifted.entries()[0].end), (11.0, 11.5));
        assert_eq!((shifted.entries()[1].start, shifted.entries()[1].end), (19.0, 20.0));
    }

    #[test]
    fn test_offset_negative_shift_clamps_at_zero() {
        let old = track(&[(5.0, 6.0, "a"), (7.0, 9.0, "b")]);
        let shifted = offset_by_anchor(&old, &media(30.0, vec![1.0]), 0.5).unwrap();
        assert_eq!((shifted.entries()[0].start, shifted.entries()[0].end), (1.0, 2.0));

        let shifted = offset_by_anchor(&track(&[(5.0, 5.2, "a"), (5.4, 6.0, "b")]), &media(30.0, vec![0.0]), 0.5).unwrap();
        assert!(shifted.iter().all(|e| e.start >= 0.0 && e.end - e.start >= 0.5));
    }

    #[test]
    fn test_offset_without_marks_or_duration_is_identity() {
        let old = track(&[(1.0, 2.0, "a")]);
        assert_eq!(offset_by_anchor(&old, &media(60.0, vec![]), 0.5).unwrap(), old);
        assert_eq!(offset_by_anchor(&old, &media(0.0, vec![5.0]), 0.5).unwrap(), old);
        assert!(offset_by_anchor(&SubtitleTrack::new(), &media(60.0, vec![5.0]), 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_offset_preserves_text_and_original() {
        let mut entry = SubtitleEntry::new(1, 1.0, 2.0, "Olá").unwrap();
        entry.original_text = Some("Hello".to_string());
        let old = SubtitleTrack::from(vec![entry]);

        let shifted = offset_by_anchor(&old, &media(10.0, vec![2.0]), 0.5).unwrap();
        assert_eq!(shifted.entries()[0].text, "Olá");
        assert_eq!(shifted.entries()[0].original_text.as_deref(), Some("Hello"));
    }
}
