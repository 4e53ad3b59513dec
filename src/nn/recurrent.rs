//! Single-layer GRU recurrent core
//!
//! ```text
//! r  = σ(W_ir x + b_ir + W_hr h + b_hr)
//! z  = σ(W_iz x + b_iz + W_hz h + b_hz)
//! n  = tanh(W_in x + b_in + r ⊙ (W_hn h + b_hn))
//! h' = (1 - z) ⊙ n + z ⊙ h
//! ```
//!
//! The core never stores `h`; callers pass it in and keep what comes back.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{activation::sigmoid, backend::Backend},
};

#[derive(Config, Debug)]
pub struct GruCoreConfig {
    pub input_dim: usize,
    #[config(default = 512)]
    pub hidden_dim: usize,
}

impl GruCoreConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GruCore<B> {
        GruCore {
            input_gates: LinearConfig::new(self.input_dim, 3 * self.hidden_dim).init(device),
            hidden_gates: LinearConfig::new(self.hidden_dim, 3 * self.hidden_dim).init(device),
        }
    }
}

/// Gate weights stacked as `[reset | update | new]` along the output dimension
#[derive(Module, Debug)]
pub struct GruCore<B: Backend> {
    pub input_gates: Linear<B>,
    pub hidden_gates: Linear<B>,
}

impl<B: Backend> GruCore<B> {
    pub fn hidden_dim(&self) -> usize {
        self.hidden_gates.weight.dims()[0]
    }

    /// One transition: `x` is `[batch, input]`, `h` is `[batch, hidden]`
    pub fn step(&self, x: Tensor<B, 2>, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let hd = self.hidden_dim();
        let gi = self.input_gates.forward(x);
        let gh = self.hidden_gates.forward(h.clone());

        let r = sigmoid(gi.clone().narrow(1, 0, hd) + gh.clone().narrow(1, 0, hd));
        let z = sigmoid(gi.clone().narrow(1, hd, hd) + gh.clone().narrow(1, hd, hd));
        let n = (gi.narrow(1, 2 * hd, hd) + r * gh.narrow(1, 2 * hd, hd)).tanh();

        z.clone().neg().add_scalar(1.0) * n + z * h
    }

    /// Run over `[T, batch, input]`; returns every step's hidden state and the last one
    pub fn forward_sequence(&self, x: Tensor<B, 3>, h: Tensor<B, 2>) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let [time, batch, input] = x.dims();
        let mut h = h;
        let mut outputs = Vec::with_capacity(time);

        for t in 0..time {
            let xt: Tensor<B, 2> = x.clone().slice([t..t + 1, 0..batch, 0..input]).squeeze(0);
            h = self.step(xt, h);
            outputs.push(h.clone());
        }

        (Tensor::stack(outputs, 0), h)
    }
}
