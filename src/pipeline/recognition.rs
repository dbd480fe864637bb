use std::time::Instant;

use crate::{
    config::Config,
    dispatch::{ActionSink, DispatchOutcome, Dispatcher},
    gesture::{self, Classification, NormalizeError, Stabilized, Stabilizer},
    sample_store::SampleStore,
    types::{GestureLabel, Landmark},
};

/// What the recognizer made of a single frame before stabilization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    NoHand,
    /// Landmarks were present but could not be normalized.
    Rejected(NormalizeError),
    Classified(Classification),
}

impl Observation {
    pub fn vote(&self) -> Option<GestureLabel> {
        match self {
            Observation::Classified(classification) => classification.label(),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub observation: Observation,
    pub stabilized: Stabilized,
    pub outcome: DispatchOutcome,
}

/// Normalizer, classifier, stabilizer and dispatcher for one hand, driven
/// one frame at a time from a single thread.
pub struct GesturePipeline<S> {
    store: SampleStore,
    threshold: f32,
    stabilizer: Stabilizer,
    dispatcher: Dispatcher<S>,
}

impl<S: ActionSink> GesturePipeline<S> {
    pub fn new(
        store: SampleStore,
        threshold: f32,
        stabilizer: Stabilizer,
        dispatcher: Dispatcher<S>,
    ) -> Self {
        Self {
            store,
            threshold,
            stabilizer,
            dispatcher,
        }
    }

    pub fn from_config(store: SampleStore, config: &Config, sink: S) -> Self {
        let dispatcher = Dispatcher::new(
            sink,
            config.dispatch.actions.clone(),
            config.dispatch.scroll_magnitude,
            config.dispatch.cooldown(),
        );
        Self::new(
            store,
            config.recognition.threshold,
            Stabilizer::new(config.recognition.window_size),
            dispatcher,
        )
    }

    pub fn process(&mut self, landmarks: Option<&[Landmark]>, now: Instant) -> FrameReport {
        let observation = match landmarks {
            None => Observation::NoHand,
            Some(points) => match gesture::normalize(points) {
                Ok(vector) => Observation::Classified(gesture::classify(
                    &vector,
                    &self.store,
                    self.threshold,
                )),
                Err(err) => {
                    log::debug!("treating frame as no hand: {err}");
                    Observation::Rejected(err)
                }
            },
        };

        let stabilized = self.stabilizer.observe(observation.vote());
        let outcome = match stabilized {
            Stabilized::Pending => DispatchOutcome::NoAction,
            other => self.dispatcher.dispatch(other.label(), now),
        };

        if let DispatchOutcome::Dispatched(action) = outcome {
            if let Some(label) = stabilized.label() {
                log::info!("{}{} -> {action}", label.emoji(), label.display_name());
            }
        }

        FrameReport {
            observation,
            stabilized,
            outcome,
        }
    }

    pub fn failsafe_triggered(&mut self) -> bool {
        self.dispatcher.failsafe_triggered()
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }
}
