use crate::detect::output::RegionOutputs;
use crate::error::Result;
use crate::frames::Frame;

/// Detector backend trait.
///
/// A backend is the opaque inference capability: given one frame it yields the
/// per-region class scores, per-class box regressions and pooled feature vectors.
/// How those are produced (network, cached outputs, synthetic data) is not the
/// pipeline's concern.
///
/// Errors for which [`crate::PipelineError::is_recoverable`] is true (missing or
/// unreadable frame data) cause the pipeline to skip the frame. Any other error
/// aborts the run.
pub trait Detector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on a frame.
    fn infer(&mut self, frame: &Frame) -> Result<RegionOutputs>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&mut self, frame: &Frame) -> Result<RegionOutputs> {
        (**self).infer(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
