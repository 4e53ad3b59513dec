/// Multi-Layer Perceptron (MLP) used as the policy decoder
///
/// Maps the recurrent core output to the latent shared by the action and value heads.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{activation::relu, backend::Backend},
};

/// Configuration for Multi-Layer Perceptron
#[derive(Config, Debug)]
pub struct MLPConfig {
    /// Input dimension
    pub input_dim: usize,
    /// Hidden layer dimensions (e.g., [256] for one hidden layer of 256 units)
    pub hidden_layers: Vec<usize>,
    /// Output dimension
    pub output_dim: usize,
    /// Use ReLU activation for hidden layers (default: true)
    #[config(default = "true")]
    pub use_relu: bool,
    /// Apply ReLU to the output layer too (default: false)
    #[config(default = "false")]
    pub relu_output: bool,
}

/// Multi-Layer Perceptron implementation
#[derive(Module, Debug)]
pub struct MLP<B: Backend> {
    layers: Vec<Linear<B>>,
    hidden_relu: bool,
    output_relu: bool,
}

impl MLPConfig {
    /// Initialize the MLP with the given configuration
    pub fn init<B: Backend>(&self, device: &B::Device) -> MLP<B> {
        let dims: Vec<usize> = std::iter::once(self.input_dim)
            .chain(self.hidden_layers.iter().copied())
            .chain(std::iter::once(self.output_dim))
            .collect();

        let layers = dims
            .windows(2)
            .map(|pair| LinearConfig::new(pair[0], pair[1]).init(device))
            .collect();

        MLP {
            layers,
            hidden_relu: self.use_relu,
            output_relu: self.relu_output,
        }
    }
}

impl<B: Backend> MLP<B> {
    /// Forward pass over the last dimension; works with any tensor rank
    ///
    /// - D=1: single example `[features]`
    /// - D=2: batch `[batch, features]`
    /// - D=3: sequences `[time, batch, features]`
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let last = self.layers.len().saturating_sub(1);
        let mut x = input;

        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            let activate = if i == last { self.output_relu } else { self.hidden_relu };
            if activate {
                x = relu(x);
            }
        }

        x
    }

    pub fn output_dim(&self) -> usize {
        self.layers
            .last()
            .map(|layer| layer.weight.dims()[1])
            .unwrap_or(0)
    }

    pub(crate) fn layers(&self) -> &[Linear<B>] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Linear<B>] {
        &mut self.layers
    }
}
