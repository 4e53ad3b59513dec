//! Named-parameter persistence for [`PolicyModel`]
//!
//! Parameters are keyed `<component>.<layer>.<param>`, e.g. `encoder.conv1.weight`
//! or `decoder.layers.0.bias`. Loading matches keys one by one, so a file written by
//! a differently shaped model still restores whatever lines up.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use burn::{
    module::Param,
    nn::{conv::Conv2d, Linear},
    prelude::*,
    tensor::{backend::Backend, TensorData},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

use super::policy::PolicyModel;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamStore {
    pub version: u32,
    pub params: BTreeMap<String, StoredTensor>,
}

impl Default for ParamStore {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            params: BTreeMap::new(),
        }
    }
}

impl ParamStore {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MissingAsset {
                asset: path.display().to_string(),
                remediation: "point to a checkpoint written by `PolicyModel::save_params`"
                    .to_string(),
            });
        }
        let store: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        if store.version != CHECKPOINT_VERSION {
            return Err(Error::Checkpoint(format!(
                "checkpoint version {} is not supported (expected {CHECKPOINT_VERSION})",
                store.version
            )));
        }
        Ok(store)
    }

    /// Keep only parameters of the named components (`"encoder"`, `"core"`, ...)
    pub fn retain_components(&mut self, components: &[&str]) {
        self.params.retain(|name, _| {
            let component = name.split('.').next().unwrap_or_default();
            components.contains(&component)
        });
    }
}

/// Outcome of a partial load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// Model parameters the file does not contain; they keep their values
    pub missing: Vec<String>,
    /// File entries the model has no parameter for
    pub unexpected: Vec<String>,
    /// Present on both sides with different shapes; the model keeps its values
    pub shape_mismatch: Vec<String>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.shape_mismatch.is_empty()
    }
}

trait ParamVisitor<B: Backend> {
    fn visit<const D: usize>(&mut self, name: &str, param: &mut Param<Tensor<B, D>>);
}

struct Exporter {
    store: ParamStore,
}

impl<B: Backend> ParamVisitor<B> for Exporter {
    fn visit<const D: usize>(&mut self, name: &str, param: &mut Param<Tensor<B, D>>) {
        let data = param.val().into_data();
        self.store.params.insert(
            name.to_string(),
            StoredTensor {
                shape: data.shape.clone(),
                values: data.iter::<f32>().collect(),
            },
        );
    }
}

struct Importer<'a> {
    store: &'a ParamStore,
    seen: BTreeSet<String>,
    report: LoadReport,
}

impl<B: Backend> ParamVisitor<B> for Importer<'_> {
    fn visit<const D: usize>(&mut self, name: &str, param: &mut Param<Tensor<B, D>>) {
        let Some(stored) = self.store.params.get(name) else {
            self.report.missing.push(name.to_string());
            return;
        };
        self.seen.insert(name.to_string());

        let expected = param.dims().to_vec();
        if stored.shape != expected || stored.values.len() != expected.iter().product::<usize>() {
            self.report.shape_mismatch.push(name.to_string());
            return;
        }

        let device = param.device();
        let require_grad = param.is_require_grad();
        let tensor: Tensor<B, D> = Tensor::from_data(
            TensorData::new(stored.values.clone(), stored.shape.clone()),
            &device,
        )
        .set_require_grad(require_grad);
        *param = param.clone().map(|_| tensor);
        self.report.loaded.push(name.to_string());
    }
}

fn visit_linear<B: Backend, V: ParamVisitor<B>>(visitor: &mut V, prefix: &str, layer: &mut Linear<B>) {
    visitor.visit(&format!("{prefix}.weight"), &mut layer.weight);
    if let Some(bias) = layer.bias.as_mut() {
        visitor.visit(&format!("{prefix}.bias"), bias);
    }
}

fn visit_conv<B: Backend, V: ParamVisitor<B>>(visitor: &mut V, prefix: &str, layer: &mut Conv2d<B>) {
    visitor.visit(&format!("{prefix}.weight"), &mut layer.weight);
    if let Some(bias) = layer.bias.as_mut() {
        visitor.visit(&format!("{prefix}.bias"), bias);
    }
}

fn visit_policy<B: Backend, V: ParamVisitor<B>>(visitor: &mut V, model: &mut PolicyModel<B>) {
    visit_conv(visitor, "encoder.conv1", &mut model.encoder.conv1);
    visit_conv(visitor, "encoder.conv2", &mut model.encoder.conv2);
    visit_conv(visitor, "encoder.conv3", &mut model.encoder.conv3);
    visit_linear(visitor, "encoder.projection", &mut model.encoder.projection);

    visit_linear(visitor, "core.input_gates", &mut model.core.input_gates);
    visit_linear(visitor, "core.hidden_gates", &mut model.core.hidden_gates);

    for (i, layer) in model.decoder.layers_mut().iter_mut().enumerate() {
        visit_linear(visitor, &format!("decoder.layers.{i}"), layer);
    }

    visit_linear(visitor, "action_head", &mut model.action_head);
    visit_linear(visitor, "value_head", &mut model.value_head);
}

impl<B: Backend> PolicyModel<B> {
    /// Snapshot of every learned parameter
    pub fn param_store(&self) -> ParamStore {
        let mut exporter = Exporter {
            store: ParamStore::default(),
        };
        let mut model = self.clone();
        visit_policy(&mut exporter, &mut model);
        exporter.store
    }

    pub fn save_params(&self, path: impl AsRef<Path>) -> Result<()> {
        let store = self.param_store();
        store.save(path.as_ref())?;
        info!(path = %path.as_ref().display(), params = store.params.len(), "saved policy parameters");
        Ok(())
    }

    /// Copy every matching parameter out of `store`; the rest keep their values
    pub fn load_param_store(&mut self, store: &ParamStore) -> LoadReport {
        let mut importer = Importer {
            store,
            seen: BTreeSet::new(),
            report: LoadReport::default(),
        };
        visit_policy(&mut importer, self);

        let Importer {
            seen, mut report, ..
        } = importer;
        report.unexpected = store
            .params
            .keys()
            .filter(|name| !seen.contains(*name))
            .cloned()
            .collect();

        if report.is_complete() {
            info!(loaded = report.loaded.len(), "loaded policy parameters");
        } else {
            warn!(
                loaded = report.loaded.len(),
                missing = ?report.missing,
                unexpected = ?report.unexpected,
                shape_mismatch = ?report.shape_mismatch,
                "partial policy checkpoint match"
            );
        }
        report
    }

    pub fn load_params(&mut self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let store = ParamStore::load(path)?;
        Ok(self.load_param_store(&store))
    }
}
