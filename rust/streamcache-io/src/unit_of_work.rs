use std::sync::Arc;

/// How the surrounding logical operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// A callback invoked once when a unit of work completes.
pub type CompletionCallback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// The surrounding logical operation (typically the end-to-end processing of a
/// single message) that owns resources created on its behalf.
///
/// The stream caching engine only needs to be told when the operation is over;
/// it does not care why.
pub trait UnitOfWork: Send + Sync + 'static {
    /// Registers `callback` to run exactly once when the unit of work completes,
    /// whether it succeeded or failed.
    ///
    /// Implementations that have already completed should run the callback
    /// immediately.
    fn on_completion(&self, callback: CompletionCallback);
}

impl<T> UnitOfWork for Arc<T>
where
    T: UnitOfWork + ?Sized,
{
    fn on_completion(&self, callback: CompletionCallback) {
        self.as_ref().on_completion(callback)
    }
}
