use crate::DetectError;

/// Consumer of detection results, usually a renderer.
///
/// The sink is owned by the pipeline's dispatcher task, so every call for a
/// pipeline happens on one execution context and never interleaves. For each
/// delivered frame the sequence is exactly
/// `begin_frame -> (on_result | on_error) -> end_frame`.
pub trait ResultSink<T>: Send + 'static {
    /// Reset render state before results for a frame arrive
    fn begin_frame(&mut self);

    fn on_result(&mut self, result: T);

    fn on_error(&mut self, error: DetectError);

    /// Results for the frame are complete; safe to present
    fn end_frame(&mut self);
}

impl<T, S> ResultSink<T> for Box<S>
where
    S: ResultSink<T> + ?Sized,
{
    fn begin_frame(&mut self) {
        (**self).begin_frame()
    }

    fn on_result(&mut self, result: T) {
        (**self).on_result(result)
    }

    fn on_error(&mut self, error: DetectError) {
        (**self).on_error(error)
    }

    fn end_frame(&mut self) {
        (**self).end_frame()
    }
}
