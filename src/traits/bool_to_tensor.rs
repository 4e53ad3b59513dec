use burn::{
    prelude::*,
    tensor::{backend::Backend, TensorData},
};

/// Per-row flags (e.g. "episode ended") as burn tensors
pub trait BoolToTensor<B: Backend> {
    fn to_bool_tensor(self, device: &B::Device) -> Tensor<B, 1, Bool>;

    /// 1.0 where the flag is set, 0.0 elsewhere
    fn to_float_mask(self, device: &B::Device) -> Tensor<B, 1>
    where
        Self: Sized,
    {
        self.to_bool_tensor(device).float()
    }
}

impl<B: Backend> BoolToTensor<B> for &[bool] {
    fn to_bool_tensor(self, device: &B::Device) -> Tensor<B, 1, Bool> {
        let flags: Vec<i32> = self.iter().map(|&b| b as i32).collect();
        let ints: Tensor<B, 1, Int> =
            Tensor::from_data(TensorData::new(flags, [self.len()]).convert::<B::IntElem>(), device);
        ints.greater_elem(0)
    }
}

impl<B: Backend> BoolToTensor<B> for Vec<bool> {
    fn to_bool_tensor(self, device: &B::Device) -> Tensor<B, 1, Bool> {
        self.as_slice().to_bool_tensor(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn float_mask_marks_set_flags() {
        let device = NdArrayDevice::default();
        let mask: Tensor<NdArray, 1> = vec![true, false, true].to_float_mask(&device);
        assert_eq!(mask.to_data().as_slice::<f32>().unwrap(), &[1.0, 0.0, 1.0]);
    }
}
