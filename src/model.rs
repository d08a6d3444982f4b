//! Model base: declared parameter shapes and their values.

use std::collections::BTreeMap;
use std::str::FromStr;

use rand::Rng;
use tracing::debug;

use crate::array::{ArrayFactory, NdArray};
use crate::dtype::DType;
use crate::error::{HybridError, Result};

/// How a parameter's initial values are drawn
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InitRule {
    /// Uniform in ±sqrt(6 / (fan_in + fan_out)) for (out, in) weights;
    /// 1-d parameters start at zero.
    #[default]
    Xavier,
    Gaussian { std: f32 },
    Constant { value: f32 },
}

impl FromStr for InitRule {
    type Err = HybridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xavier" => Ok(InitRule::Xavier),
            "gaussian" => Ok(InitRule::Gaussian { std: 0.01 }),
            "constant" => Ok(InitRule::Constant { value: 0.0 }),
            other => Err(HybridError::InvalidParameter(format!(
                "unknown init rule '{other}'"
            ))),
        }
    }
}

impl InitRule {
    fn create<R: Rng + ?Sized>(
        self,
        factory: &ArrayFactory,
        shape: &[usize],
        dtype: DType,
        rng: &mut R,
    ) -> Result<NdArray> {
        match self {
            InitRule::Xavier if shape.len() == 2 => factory.xavier_uniform(shape, dtype, rng),
            InitRule::Xavier if shape.len() == 1 => factory.zeros(shape, dtype),
            InitRule::Xavier => Err(HybridError::InvalidParameter(format!(
                "xavier init needs a 1-d or 2-d shape, got {shape:?}"
            ))),
            InitRule::Gaussian { std } => factory.randn(shape, std, dtype, rng),
            InitRule::Constant { value } => factory.full(shape, value, dtype),
        }
    }
}

/// Declared shape of one parameter, optionally with its own init rule
#[derive(Debug, Clone, PartialEq)]
pub struct ParamConfig {
    pub shape: Vec<usize>,
    pub init: Option<InitRule>,
}

/// Parameter declarations and values shared by every model
#[derive(Debug, Clone, Default)]
pub struct ModelBase {
    param_configs: BTreeMap<String, ParamConfig>,
    params: BTreeMap<String, NdArray>,
}

impl ModelBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter
    pub fn add_param(&mut self, name: impl Into<String>, shape: &[usize]) -> &mut Self {
        self.param_configs.insert(
            name.into(),
            ParamConfig {
                shape: shape.to_vec(),
                init: None,
            },
        );
        self
    }

    /// Declare a parameter with its own init rule
    pub fn add_param_with_init(
        &mut self,
        name: impl Into<String>,
        shape: &[usize],
        init: InitRule,
    ) -> &mut Self {
        self.param_configs.insert(
            name.into(),
            ParamConfig {
                shape: shape.to_vec(),
                init: Some(init),
            },
        );
        self
    }

    pub fn param_configs(&self) -> &BTreeMap<String, ParamConfig> {
        &self.param_configs
    }

    /// Create every declared parameter; a per-parameter rule wins over `default_rule`.
    pub fn init_params<R: Rng + ?Sized>(
        &mut self,
        factory: &ArrayFactory,
        default_rule: InitRule,
        dtype: DType,
        rng: &mut R,
    ) -> Result<()> {
        let mut params = BTreeMap::new();
        for (name, config) in &self.param_configs {
            let rule = config.init.unwrap_or(default_rule);
            debug!(param = %name, shape = ?config.shape, ?rule, "init param");
            params.insert(name.clone(), rule.create(factory, &config.shape, dtype, rng)?);
        }
        self.params = params;
        Ok(())
    }

    pub fn param(&self, name: &str) -> Result<&NdArray> {
        self.params
            .get(name)
            .ok_or_else(|| HybridError::MissingParameter(name.to_string()))
    }

    /// Replace a parameter's value; the shape must match its declaration
    pub fn set_param(&mut self, name: &str, value: NdArray) -> Result<()> {
        let config = self
            .param_configs
            .get(name)
            .ok_or_else(|| HybridError::MissingParameter(name.to_string()))?;
        if value.shape() != config.shape.as_slice() {
            return Err(HybridError::ShapeMismatch {
                name: name.to_string(),
                expected: config.shape.clone(),
                actual: value.shape().to_vec(),
            });
        }
        self.params.insert(name.to_string(), value);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.param_configs
            .keys()
            .all(|name| self.params.contains_key(name))
    }
}

/// A model with declared parameters, a forward computation and a loss
pub trait Model {
    fn base(&self) -> &ModelBase;
    fn base_mut(&mut self) -> &mut ModelBase;

    fn forward(&self, x: &NdArray) -> Result<NdArray>;
    fn loss(&self, predict: &NdArray, labels: &[usize]) -> Result<f32>;
}
