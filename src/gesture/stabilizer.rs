use std::collections::VecDeque;

use crate::types::GestureLabel;

pub const DEFAULT_WINDOW_SIZE: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stabilized {
    /// The window has not filled up yet; take no action.
    Pending,
    /// No label holds a strict majority of the window.
    NoMatch,
    Gesture(GestureLabel),
}

impl Stabilized {
    pub fn label(&self) -> Option<GestureLabel> {
        match self {
            Stabilized::Gesture(label) => Some(*label),
            _ => None,
        }
    }
}

/// Majority vote over the last `capacity` per-frame classifications.
/// `None` votes ("no match" or no hand) occupy a slot but never win.
#[derive(Debug)]
pub struct Stabilizer {
    window: VecDeque<Option<GestureLabel>>,
    capacity: usize,
}

impl Stabilizer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn observe(&mut self, vote: Option<GestureLabel>) -> Stabilized {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(vote);

        if self.window.len() < self.capacity {
            return Stabilized::Pending;
        }

        let mut counts = [0usize; GestureLabel::ALL.len()];
        for label in self.window.iter().flatten() {
            counts[label.index()] += 1;
        }

        GestureLabel::ALL
            .into_iter()
            .find(|label| counts[label.index()] * 2 > self.capacity)
            .map(Stabilized::Gesture)
            .unwrap_or(Stabilized::NoMatch)
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GestureLabel::*;

    fn feed(stabilizer: &mut Stabilizer, votes: &[Option<GestureLabel>]) -> Vec<Stabilized> {
        votes.iter().map(|v| stabilizer.observe(*v)).collect()
    }

    #[test]
    fn pending_until_window_is_full() {
        let mut stabilizer = Stabilizer::default();
        let outputs = feed(&mut stabilizer, &[Some(Palm); 5]);
        assert!(outputs[..4].iter().all(|o| *o == Stabilized::Pending));
        assert_eq!(outputs[4], Stabilized::Gesture(Palm));
    }

    #[test]
    fn three_of_five_is_a_majority() {
        let mut stabilizer = Stabilizer::default();
        let outputs = feed(
            &mut stabilizer,
            &[Some(Palm), Some(Palm), Some(Palm), Some(Fist), None],
        );
        assert_eq!(outputs[4], Stabilized::Gesture(Palm));
    }

    #[test]
    fn split_window_has_no_majority() {
        let mut stabilizer = Stabilizer::default();
        let outputs = feed(
            &mut stabilizer,
            &[Some(Palm), Some(Palm), Some(Fist), Some(Fist), None],
        );
        assert_eq!(outputs[4], Stabilized::NoMatch);
    }

    #[test]
    fn no_match_majority_wins_nothing() {
        let mut stabilizer = Stabilizer::default();
        let outputs = feed(
            &mut stabilizer,
            &[Some(Peace), None, None, None, Some(Peace)],
        );
        assert_eq!(outputs[4], Stabilized::NoMatch);
    }

    #[test]
    fn window_slides_and_evicts_oldest() {
        let mut stabilizer = Stabilizer::default();
        feed(&mut stabilizer, &[Some(Fist), Some(Fist), Some(Fist), None, None]);
        // [F, F, N, N, T]: the first Fist vote is gone.
        assert_eq!(stabilizer.observe(Some(ThumbsUp)), Stabilized::NoMatch);
        // [F, N, N, T, T]
        assert_eq!(stabilizer.observe(Some(ThumbsUp)), Stabilized::NoMatch);
        // [N, N, T, T, T]
        assert_eq!(
            stabilizer.observe(Some(ThumbsUp)),
            Stabilized::Gesture(ThumbsUp)
        );
    }

    #[test]
    fn reset_returns_to_pending() {
        let mut stabilizer = Stabilizer::new(3);
        feed(&mut stabilizer, &[Some(Palm); 3]);
        stabilizer.reset();
        assert_eq!(stabilizer.observe(Some(Palm)), Stabilized::Pending);
    }
}
