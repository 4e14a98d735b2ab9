//! Tensor batching for training and evaluation.

use burn::prelude::*;

use super::LeafImageItem;

/// A batch of images `[batch, 3, size, size]` with integer targets `[batch]`.
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

/// Builds device tensors from decoded items.
#[derive(Clone, Debug)]
pub struct LeafBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> LeafBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }

    pub fn batch(&self, items: Vec<LeafImageItem>) -> LeafBatch<B> {
        let batch_size = items.len();
        let plane = 3 * self.image_size * self.image_size;

        let mut image_data = Vec::with_capacity(batch_size * plane);
        let mut target_data = Vec::with_capacity(batch_size);
        for item in items {
            image_data.extend_from_slice(&item.image);
            target_data.push(item.label as i64);
        }

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(
                image_data,
                [batch_size, 3, self.image_size, self.image_size],
            ),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(target_data, [batch_size]),
            &self.device,
        );

        LeafBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes() {
        let size = 4;
        let items = vec![
            LeafImageItem {
                image: vec![0.5; 3 * size * size],
                label: 0,
            },
            LeafImageItem {
                image: vec![0.25; 3 * size * size],
                label: 1,
            },
        ];
        let batcher = LeafBatcher::<TestBackend>::new(Default::default(), size);
        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [2, 3, size, size]);
        assert_eq!(batch.targets.dims(), [2]);
    }
}
