//! External capture session hook.

/// The platform audio session behind the pipeline.
///
/// Activated once per `start()` and deactivated on `stop()` / `release()`.
/// The pipeline never calls it while holding its frame lock, so an
/// implementation may block until its audio callbacks have finished.
pub trait CaptureSession: Send {
    fn activate(&mut self) -> anyhow::Result<()>;

    fn deactivate(&mut self);
}
