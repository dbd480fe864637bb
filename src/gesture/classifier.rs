use crate::{
    sample_store::SampleStore,
    types::{FeatureVector, GestureLabel},
};

/// Default acceptance threshold, in normalized feature units.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Classification {
    Match { label: GestureLabel, distance: f32 },
    NoMatch,
}

impl Classification {
    pub fn label(&self) -> Option<GestureLabel> {
        match self {
            Classification::Match { label, .. } => Some(*label),
            Classification::NoMatch => None,
        }
    }
}

/// Finds the stored sample nearest to `vector` across every label.
///
/// Labels are visited in [`GestureLabel::ALL`] order and the running minimum
/// only moves on a strictly smaller distance, so equal distances resolve to
/// the earlier label. Returns `NoMatch` for an empty store or when the
/// nearest sample is further than `threshold`.
pub fn classify(vector: &FeatureVector, store: &SampleStore, threshold: f32) -> Classification {
    let mut best: Option<(GestureLabel, f32)> = None;

    for label in GestureLabel::ALL {
        for sample in store.samples(label) {
            let distance = vector.distance(sample);
            match best {
                Some((_, min)) if distance >= min => {}
                _ => best = Some((label, distance)),
            }
        }
    }

    match best {
        Some((label, distance)) if distance <= threshold => {
            Classification::Match { label, distance }
        }
        Some((label, distance)) => {
            log::trace!("nearest sample is {label} at {distance:.3}, above threshold {threshold}");
            Classification::NoMatch
        }
        None => Classification::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FEATURE_LEN;

    fn vector_with(first: f32) -> FeatureVector {
        let mut values = [0.0; FEATURE_LEN];
        values[0] = first;
        FeatureVector::from(values)
    }

    fn store(entries: Vec<(GestureLabel, Vec<FeatureVector>)>) -> SampleStore {
        SampleStore::from_samples(entries)
    }

    #[test]
    fn exact_sample_matches_with_zero_distance() {
        let sample = vector_with(0.7);
        let store = store(vec![
            (GestureLabel::Fist, vec![vector_with(-0.7)]),
            (GestureLabel::Peace, vec![sample.clone()]),
        ]);

        for threshold in [0.0, 0.5, 10.0] {
            assert_eq!(
                classify(&sample, &store, threshold),
                Classification::Match {
                    label: GestureLabel::Peace,
                    distance: 0.0
                }
            );
        }
    }

    #[test]
    fn empty_store_never_matches() {
        let store = SampleStore::default();
        assert_eq!(
            classify(&vector_with(0.0), &store, f32::MAX),
            Classification::NoMatch
        );
    }

    #[test]
    fn distance_above_threshold_is_no_match() {
        let store = store(vec![(GestureLabel::Palm, vec![vector_with(1.0)])]);
        assert_eq!(
            classify(&vector_with(0.4), &store, 0.5),
            Classification::NoMatch
        );
        assert_eq!(
            classify(&vector_with(0.6), &store, 0.5).label(),
            Some(GestureLabel::Palm)
        );
    }

    #[test]
    fn picks_global_minimum_across_labels() {
        let store = store(vec![
            (GestureLabel::Palm, vec![vector_with(0.3), vector_with(0.9)]),
            (GestureLabel::Fist, vec![vector_with(0.15)]),
            (GestureLabel::ThumbsUp, vec![vector_with(-0.2)]),
        ]);
        let result = classify(&vector_with(0.1), &store, 0.5);
        assert_eq!(result.label(), Some(GestureLabel::Fist));
    }

    #[test]
    fn ties_go_to_first_label_in_enumeration_order() {
        // Inserted in reverse order to make sure insertion order is irrelevant.
        let store = store(vec![
            (GestureLabel::ThumbsUp, vec![vector_with(0.2)]),
            (GestureLabel::Fist, vec![vector_with(-0.2)]),
        ]);
        let result = classify(&vector_with(0.0), &store, 0.5);
        assert_eq!(result.label(), Some(GestureLabel::Fist));
    }
}
