use burn::{
    prelude::*,
    tensor::{backend::Backend, BasicOps, Element, TensorData},
};

use crate::wrappers::ObservationFrame;

/// Conversion of host-side values into burn tensors
///
/// Observations convert by rank: one frame is `[C, H, W]`, a batch across episode
/// instances is `[B, C, H, W]` and a time-major rollout is `[T, B, C, H, W]`.
/// Every frame in a batch must share one shape, which a single
/// [`ObservationTransformer`](crate::wrappers::ObservationTransformer) guarantees.
pub trait ToTensor<B: Backend, const D: usize, K: BasicOps<B>> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, D, K>;
}

impl<B, E, K> ToTensor<B, 1, K> for Vec<E>
where
    B: Backend,
    E: Element,
    K: BasicOps<B, Elem = E>,
{
    #[inline]
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 1, K> {
        let len = self.len();
        Tensor::from_data(TensorData::new(self, [len]), device)
    }
}

impl<B: Backend> ToTensor<B, 3, Float> for &ObservationFrame {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 3> {
        Tensor::from_data(TensorData::new(self.data.clone(), self.shape), device)
    }
}

impl<B: Backend> ToTensor<B, 3, Float> for ObservationFrame {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 3> {
        Tensor::from_data(TensorData::new(self.data, self.shape), device)
    }
}

fn stacked(frames: &[ObservationFrame], leading: &[usize]) -> TensorData {
    let [c, h, w] = frames.first().map(|f| f.shape).unwrap_or([0, 0, 0]);
    debug_assert!(frames.iter().all(|f| f.shape == [c, h, w]), "mixed observation shapes");

    let mut flat = Vec::with_capacity(frames.len() * c * h * w);
    for frame in frames {
        flat.extend_from_slice(&frame.data);
    }

    let mut shape = leading.to_vec();
    shape.extend_from_slice(&[c, h, w]);
    TensorData::new(flat, shape)
}

impl<B: Backend> ToTensor<B, 4, Float> for &[ObservationFrame] {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 4> {
        Tensor::from_data(stacked(self, &[self.len()]), device)
    }
}

impl<B: Backend> ToTensor<B, 4, Float> for Vec<ObservationFrame> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 4> {
        self.as_slice().to_tensor(device)
    }
}

/// `steps[t][b]` is the frame of episode instance `b` at time `t`
impl<B: Backend> ToTensor<B, 5, Float> for Vec<Vec<ObservationFrame>> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 5> {
        let time = self.len();
        let batch = self.first().map(Vec::len).unwrap_or(0);
        debug_assert!(self.iter().all(|row| row.len() == batch), "ragged rollout");

        let frames: Vec<ObservationFrame> = self.into_iter().flatten().collect();
        Tensor::from_data(stacked(&frames, &[time, batch]), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    fn frame(fill: f32) -> ObservationFrame {
        ObservationFrame {
            data: vec![fill; 2 * 3 * 4],
            shape: [2, 3, 4],
        }
    }

    #[test]
    fn test_vec_f32_to_tensor_1d() {
        let device = NdArrayDevice::default();
        let data = vec![1.0_f32, 2.0, 3.0, 4.0];
        let tensor: Tensor<NdArray, 1> = data.to_tensor(&device);

        assert_eq!(tensor.shape().dims, [4]);
        assert_eq!(tensor.to_data().as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_vec_i64_to_int_tensor() {
        let device = NdArrayDevice::default();
        // NdArray uses i64 for Int
        let tensor: Tensor<NdArray, 1, Int> = vec![3_i64, 0, 2].to_tensor(&device);
        assert_eq!(tensor.to_data().as_slice::<i64>().unwrap(), &[3, 0, 2]);
    }

    #[test]
    fn test_single_frame_is_chw() {
        let device = NdArrayDevice::default();
        let tensor: Tensor<NdArray, 3> = (&frame(0.5)).to_tensor(&device);
        assert_eq!(tensor.shape().dims, [2, 3, 4]);
    }

    #[test]
    fn test_frame_batch_is_bchw() {
        let device = NdArrayDevice::default();
        let tensor: Tensor<NdArray, 4> = vec![frame(0.0), frame(1.0)].to_tensor(&device);

        assert_eq!(tensor.shape().dims, [2, 2, 3, 4]);
        let second: Tensor<NdArray, 4> = tensor.slice([1..2, 0..2, 0..3, 0..4]);
        assert_eq!(second.sum().into_scalar(), 24.0);
    }

    #[test]
    fn test_rollout_is_time_major() {
        let device = NdArrayDevice::default();
        let rollout = vec![
            vec![frame(0.0), frame(0.1), frame(0.2)],
            vec![frame(1.0), frame(1.1), frame(1.2)],
        ];
        let tensor: Tensor<NdArray, 5> = rollout.to_tensor(&device);

        assert_eq!(tensor.shape().dims, [2, 3, 2, 3, 4]);
        let t1_b0 = tensor.slice([1..2, 0..1, 0..1, 0..1, 0..1]).into_scalar();
        assert_eq!(t1_b0, 1.0);
    }
}
