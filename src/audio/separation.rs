// Drum stem separation
// Collaborator trait plus a caller-owned, lazily loaded handle

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeparationError {
    #[error("Separation model failed to load: {0}")]
    LoadFailed(String),

    #[error("Separation failed: {0}")]
    Failed(String),
}

/// Isolates a mono drum track from a mono mix.
///
/// Returns the separated samples and their sample rate, which may differ
/// from the input rate.
pub trait DrumSeparator {
    fn name(&self) -> &str;

    fn separate(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(Vec<f32>, u32), SeparationError>;
}

/// First-order high-pass filter that strips rumble and DC before onset detection.
/// Stands in for a real separation model.
#[derive(Debug, Clone)]
pub struct HighPassSeparator {
    cutoff_hz: f32,
}

impl HighPassSeparator {
    pub fn new(cutoff_hz: f32) -> Self {
        HighPassSeparator { cutoff_hz }
    }
}

impl Default for HighPassSeparator {
    fn default() -> Self {
        Self::new(40.0)
    }
}

impl DrumSeparator for HighPassSeparator {
    fn name(&self) -> &str {
        "high_pass"
    }

    fn separate(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(Vec<f32>, u32), SeparationError> {
        if sample_rate == 0 {
            return Err(SeparationError::Failed("sample rate is zero".to_string()));
        }
        if !self.cutoff_hz.is_finite() || self.cutoff_hz <= 0.0 {
            return Err(SeparationError::Failed(format!(
                "invalid cutoff {} Hz",
                self.cutoff_hz
            )));
        }

        let dt = 1.0 / sample_rate as f32;
        let rc = 1.0 / (2.0 * std::f32::consts::PI * self.cutoff_hz);
        let alpha = rc / (rc + dt);

        let mut out = Vec::with_capacity(samples.len());
        let mut prev_in = 0.0f32;
        let mut prev_out = 0.0f32;
        for &x in samples {
            let y = alpha * (prev_out + x - prev_in);
            out.push(y);
            prev_in = x;
            prev_out = y;
        }

        Ok((out, sample_rate))
    }
}

type SeparatorFactory = Box<dyn FnMut() -> Result<Box<dyn DrumSeparator>, SeparationError>>;

/// Caller-owned separation resource.
///
/// The separator is built on first use and then reused across runs. Every
/// operation takes `&mut self`: one handle serves one pipeline run at a time,
/// so concurrent workers need one handle each or a lock around a shared one.
pub struct SeparationHandle {
    factory: SeparatorFactory,
    separator: Option<Box<dyn DrumSeparator>>,
}

impl SeparationHandle {
    /// Create a handle that builds its separator lazily with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: FnMut() -> Result<Box<dyn DrumSeparator>, SeparationError> + 'static,
    {
        SeparationHandle {
            factory: Box::new(factory),
            separator: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.separator.is_some()
    }

    /// Separate a drum track, loading the separator first if needed.
    /// A failed load leaves the handle unloaded so the next call retries.
    pub fn separate(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(Vec<f32>, u32), SeparationError> {
        if self.separator.is_none() {
            let separator = (self.factory)()?;
            log::info!("Loaded drum separator '{}'", separator.name());
            self.separator = Some(separator);
        }

        match self.separator.as_mut() {
            Some(separator) => separator.separate(samples, sample_rate),
            None => Err(SeparationError::LoadFailed(
                "separator unavailable".to_string(),
            )),
        }
    }
}

impl Default for SeparationHandle {
    fn default() -> Self {
        SeparationHandle::new(|| Ok(Box::new(HighPassSeparator::default()) as Box<dyn DrumSeparator>))
    }
}
