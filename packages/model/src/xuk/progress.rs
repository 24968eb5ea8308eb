/// Answer of a progress observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Cancel,
}

/// Polled once per XML element during XUK reads and writes.
///
/// Returning [`Progress::Cancel`] aborts the operation with
/// [`ModelError::Cancelled`](crate::ModelError::Cancelled).
pub trait ProgressObserver {
    fn element(&mut self, local_name: &str, count: usize) -> Progress;
}

impl<F> ProgressObserver for F
where
    F: FnMut(&str, usize) -> Progress,
{
    fn element(&mut self, local_name: &str, count: usize) -> Progress {
        self(local_name, count)
    }
}

/// Observer that never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn element(&mut self, _local_name: &str, _count: usize) -> Progress {
        Progress::Continue
    }
}
