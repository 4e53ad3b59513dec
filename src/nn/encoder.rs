//! Convolutional observation encoder

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::relu, backend::Backend},
};

use crate::error::{self, Error};

/// (out_channels, kernel, stride) of each convolution
const CONV_STACK: [(usize, usize, usize); 3] = [(32, 8, 4), (64, 4, 2), (64, 3, 1)];

fn conv_out(size: usize, kernel: usize, stride: usize) -> Option<usize> {
    size.checked_sub(kernel).map(|rest| rest / stride + 1)
}

#[derive(Config, Debug)]
pub struct EncoderConfig {
    /// `[channels, height, width]` of one observation
    pub input_shape: [usize; 3],
    /// Width of the projected feature vector
    #[config(default = 512)]
    pub feature_dim: usize,
}

impl EncoderConfig {
    /// Size of the flattened convolution output
    pub fn flattened_dim(&self) -> error::Result<usize> {
        let [channels, height, width] = self.input_shape;
        if channels == 0 {
            return Err(Error::InvalidConfig("encoder input has zero channels".to_string()));
        }

        let (mut h, mut w) = (height, width);
        for (_, kernel, stride) in CONV_STACK {
            match (conv_out(h, kernel, stride), conv_out(w, kernel, stride)) {
                (Some(nh), Some(nw)) => (h, w) = (nh, nw),
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "observation {height}x{width} is too small for the encoder; \
                         raise the observation resolution to at least 36x36"
                    )))
                }
            }
        }
        Ok(CONV_STACK[2].0 * h * w)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<Encoder<B>> {
        let flattened = self.flattened_dim()?;
        let conv = |input: usize, (output, kernel, stride): (usize, usize, usize)| -> Conv2d<B> {
            Conv2dConfig::new([input, output], [kernel, kernel])
                .with_stride([stride, stride])
                .init(device)
        };

        Ok(Encoder {
            conv1: conv(self.input_shape[0], CONV_STACK[0]),
            conv2: conv(CONV_STACK[0].0, CONV_STACK[1]),
            conv3: conv(CONV_STACK[1].0, CONV_STACK[2]),
            projection: LinearConfig::new(flattened, self.feature_dim).init(device),
        })
    }
}

/// Three strided convolutions, flatten, then a linear projection; ReLU after each
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub conv3: Conv2d<B>,
    pub projection: Linear<B>,
}

impl<B: Backend> Encoder<B> {
    /// `[batch, C, H, W]` to `[batch, feature]`
    pub fn forward(&self, obs: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(obs));
        let x = relu(self.conv2.forward(x));
        let x = relu(self.conv3.forward(x));
        let x: Tensor<B, 2> = x.flatten(1, 3);
        relu(self.projection.forward(x))
    }

    /// `[C, H, W]` to `[feature]`
    pub fn forward_single(&self, obs: Tensor<B, 3>) -> Tensor<B, 1> {
        self.forward(obs.unsqueeze::<4>()).squeeze(0)
    }

    /// `[T, batch, C, H, W]` to `[T, batch, feature]`
    pub fn forward_sequence(&self, obs: Tensor<B, 5>) -> Tensor<B, 3> {
        let [time, batch, c, h, w] = obs.dims();
        let features = self.forward(obs.reshape([time * batch, c, h, w]));
        let feature_dim = features.dims()[1];
        features.reshape([time, batch, feature_dim])
    }

    pub fn feature_dim(&self) -> usize {
        self.projection.weight.dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::Distribution;

    #[test]
    fn flattened_dim_follows_conv_arithmetic() {
        // 96x128: 23x31 -> 10x14 -> 8x12
        let config = EncoderConfig::new([3, 96, 128]);
        assert_eq!(config.flattened_dim().unwrap(), 64 * 8 * 12);
    }

    #[test]
    fn too_small_observation_is_a_configuration_error() {
        let config = EncoderConfig::new([3, 20, 20]);
        assert!(matches!(config.flattened_dim(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn forward_keeps_rank_for_single_batch_and_sequence() {
        let device = NdArrayDevice::default();
        let encoder = EncoderConfig::new([3, 48, 64])
            .with_feature_dim(32)
            .init::<NdArray>(&device)
            .unwrap();

        let single = Tensor::<NdArray, 3>::random([3, 48, 64], Distribution::Default, &device);
        assert_eq!(encoder.forward_single(single).dims(), [32]);

        let batch = Tensor::<NdArray, 4>::random([4, 3, 48, 64], Distribution::Default, &device);
        assert_eq!(encoder.forward(batch).dims(), [4, 32]);

        let sequence =
            Tensor::<NdArray, 5>::random([2, 3, 3, 48, 64], Distribution::Default, &device);
        assert_eq!(encoder.forward_sequence(sequence).dims(), [2, 3, 32]);
        assert_eq!(encoder.feature_dim(), 32);
    }

    #[test]
    fn config_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoder.json");
        EncoderConfig::new([3, 48, 64]).with_feature_dim(64).save(&path).unwrap();

        let loaded = EncoderConfig::load(&path).unwrap();
        assert_eq!(loaded.input_shape, [3, 48, 64]);
        assert_eq!(loaded.feature_dim, 64);
    }
}
