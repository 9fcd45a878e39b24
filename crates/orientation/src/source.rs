//! Gravity sample sources.

use std::collections::VecDeque;

use altimeter_common::error::AltimeterResult;
use altimeter_media_model::GravityVector;

/// A motion sensor that reports the current gravity vector.
pub trait GravitySource: Send {
    /// Read the latest gravity sample. Returns `None` if no sample is ready.
    fn sample(&mut self) -> AltimeterResult<Option<GravityVector>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Replays a fixed sequence of samples, one per call.
///
/// Once the script is exhausted the source either starts over (when
/// looping) or reports no new samples.
#[derive(Debug, Clone)]
pub struct ScriptedGravity {
    script: Vec<GravityVector>,
    pending: VecDeque<GravityVector>,
    looping: bool,
}

impl ScriptedGravity {
    pub fn new(script: impl IntoIterator<Item = GravityVector>) -> Self {
        let script: Vec<_> = script.into_iter().collect();
        Self {
            pending: script.iter().copied().collect(),
            script,
            looping: false,
        }
    }

    /// Repeat the script forever.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// A source that always reports the same vector.
    pub fn constant(gravity: GravityVector) -> Self {
        Self::new([gravity]).looping()
    }
}

impl GravitySource for ScriptedGravity {
    fn sample(&mut self) -> AltimeterResult<Option<GravityVector>> {
        if self.pending.is_empty() && self.looping {
            self.pending.extend(self.script.iter().copied());
        }
        Ok(self.pending.pop_front())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
