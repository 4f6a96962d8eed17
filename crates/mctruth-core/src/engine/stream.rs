use crate::core::models::reference::Batch;

/// Positioned read access to the entries of a legacy reference stream.
pub trait ReferenceStream {
    fn batch_count(&self) -> usize;
    fn batch(&self, position: usize) -> Option<&Batch>;

    fn is_empty(&self) -> bool {
        self.batch_count() == 0
    }
}

impl ReferenceStream for [Batch] {
    fn batch_count(&self) -> usize {
        self.len()
    }

    fn batch(&self, position: usize) -> Option<&Batch> {
        self.get(position)
    }
}

impl ReferenceStream for Vec<Batch> {
    fn batch_count(&self) -> usize {
        self.len()
    }

    fn batch(&self, position: usize) -> Option<&Batch> {
        self.get(position)
    }
}

impl<const N: usize> ReferenceStream for [Batch; N] {
    fn batch_count(&self) -> usize {
        N
    }

    fn batch(&self, position: usize) -> Option<&Batch> {
        self.get(position)
    }
}
