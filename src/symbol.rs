//! Symbolic computation graphs
//!
//! A [`Symbol`] describes a computation without running it. [`Function::compile`]
//! fixes the shape of every argument up front (input shapes, including the
//! batch dimension, cannot change afterwards) and [`Function::call`] binds named
//! arrays to those arguments and evaluates the graph.
//!
//! Parameters of a fully-connected layer named `fc1` are the arguments
//! `fc1_weight` with shape (num_hidden, in) and `fc1_bias` with shape
//! (num_hidden).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::array::NdArray;
use crate::backends;
use crate::dtype::DType;
use crate::error::{HybridError, Result};
use crate::registry::Registry;
use crate::variant::FunctionType;

/// Elementwise activation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActType {
    Relu,
    Sigmoid,
    Tanh,
    SoftRelu,
}

impl ActType {
    fn apply(self, x: &NdArray) -> NdArray {
        match self {
            ActType::Relu => x.relu(),
            ActType::Sigmoid => x.sigmoid(),
            ActType::Tanh => x.tanh(),
            ActType::SoftRelu => x.softrelu(),
        }
    }
}

#[derive(Debug)]
enum Node {
    Variable {
        name: String,
    },
    FullyConnected {
        name: String,
        data: Symbol,
        num_hidden: usize,
    },
    Activation {
        data: Symbol,
        act_type: ActType,
    },
}

/// Handle to a node of a computation graph
#[derive(Debug, Clone)]
pub struct Symbol(Rc<Node>);

impl Symbol {
    pub fn variable(name: impl Into<String>) -> Symbol {
        Symbol(Rc::new(Node::Variable { name: name.into() }))
    }

    pub fn fully_connected(name: impl Into<String>, data: &Symbol, num_hidden: usize) -> Symbol {
        Symbol(Rc::new(Node::FullyConnected {
            name: name.into(),
            data: data.clone(),
            num_hidden,
        }))
    }

    pub fn activation(data: &Symbol, act_type: ActType) -> Symbol {
        Symbol(Rc::new(Node::Activation {
            data: data.clone(),
            act_type,
        }))
    }

    /// Argument names in graph order, each listed once
    pub fn list_arguments(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_arguments(&mut out);
        out
    }

    fn collect_arguments(&self, out: &mut Vec<String>) {
        match &*self.0 {
            Node::Variable { name } => push_unique(out, name.clone()),
            Node::FullyConnected { name, data, .. } => {
                data.collect_arguments(out);
                push_unique(out, format!("{name}_weight"));
                push_unique(out, format!("{name}_bias"));
            }
            Node::Activation { data, .. } => data.collect_arguments(out),
        }
    }

    /// Derive every argument shape and the output shape from the shapes of
    /// the data variables.
    ///
    /// # Errors
    /// `ShapeInference` if a variable has no known shape or two uses of an
    /// argument disagree.
    pub fn infer_shapes(&self, known: &HashMap<String, Vec<usize>>) -> Result<ShapeInference> {
        let mut args = BTreeMap::new();
        let output = self.infer_into(known, &mut args)?;
        Ok(ShapeInference { args, output })
    }

    fn infer_into(
        &self,
        known: &HashMap<String, Vec<usize>>,
        args: &mut BTreeMap<String, Vec<usize>>,
    ) -> Result<Vec<usize>> {
        match &*self.0 {
            Node::Variable { name } => {
                let shape = known.get(name).ok_or_else(|| {
                    HybridError::ShapeInference(format!("no shape given for variable '{name}'"))
                })?;
                record(args, name, shape.clone())?;
                Ok(shape.clone())
            }
            Node::FullyConnected {
                name,
                data,
                num_hidden,
            } => {
                let input = data.infer_into(known, args)?;
                let Some((&batch, rest)) = input.split_first() else {
                    return Err(HybridError::ShapeInference(format!(
                        "'{name}' needs at least 1-d input"
                    )));
                };
                let in_dim = rest.iter().product();
                record(args, &format!("{name}_weight"), vec![*num_hidden, in_dim])?;
                record(args, &format!("{name}_bias"), vec![*num_hidden])?;
                Ok(vec![batch, *num_hidden])
            }
            Node::Activation { data, .. } => data.infer_into(known, args),
        }
    }

    fn eval(&self, args: &HashMap<&str, &NdArray>) -> Result<NdArray> {
        match &*self.0 {
            Node::Variable { name } => args
                .get(name.as_str())
                .map(|a| (*a).clone())
                .ok_or_else(|| HybridError::MissingArgument(name.clone())),
            Node::FullyConnected { name, data, .. } => {
                let x = data.eval(args)?;
                let weight = lookup(args, &format!("{name}_weight"))?;
                let bias = lookup(args, &format!("{name}_bias"))?;
                trace!(layer = %name, "fully_connected");
                NdArray::fully_connected(&x, weight, bias)
            }
            Node::Activation { data, act_type } => Ok(act_type.apply(&data.eval(args)?)),
        }
    }
}

fn push_unique(out: &mut Vec<String>, name: String) {
    if !out.contains(&name) {
        out.push(name);
    }
}

fn record(args: &mut BTreeMap<String, Vec<usize>>, name: &str, shape: Vec<usize>) -> Result<()> {
    match args.get(name) {
        Some(existing) if *existing != shape => Err(HybridError::ShapeInference(format!(
            "argument '{name}' used with shapes {existing:?} and {shape:?}"
        ))),
        Some(_) => Ok(()),
        None => {
            args.insert(name.to_string(), shape);
            Ok(())
        }
    }
}

fn lookup<'a>(args: &HashMap<&str, &'a NdArray>, name: &str) -> Result<&'a NdArray> {
    args.get(name)
        .copied()
        .ok_or_else(|| HybridError::MissingArgument(name.to_string()))
}

/// Result of shape inference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeInference {
    pub args: BTreeMap<String, Vec<usize>>,
    pub output: Vec<usize>,
}

/// A symbol compiled against fixed argument shapes
#[derive(Debug, Clone)]
pub struct Function {
    symbol: Symbol,
    arg_shapes: BTreeMap<String, Vec<usize>>,
    output_shape: Vec<usize>,
    allowed: BTreeSet<DType>,
}

impl Function {
    /// Compile `symbol` with the given data-variable shapes.
    ///
    /// Argument dtypes are checked against the `symbolic-graph` entry of the
    /// registry, which only needs to be known, not active.
    pub fn compile(
        symbol: &Symbol,
        input_shapes: &[(&str, &[usize])],
        registry: &Registry,
    ) -> Result<Function> {
        let known: HashMap<String, Vec<usize>> = input_shapes
            .iter()
            .map(|(name, shape)| (name.to_string(), shape.to_vec()))
            .collect();
        let inference = symbol.infer_shapes(&known)?;
        for name in known.keys() {
            if !inference.args.contains_key(name) {
                return Err(HybridError::UnexpectedArgument(name.clone()));
            }
        }
        let allowed = registry
            .lookup_allowed_types(backends::symbolic::NAME)?
            .clone();
        debug!(
            args = inference.args.len(),
            output = ?inference.output,
            "compiled symbolic function"
        );
        Ok(Function {
            symbol: symbol.clone(),
            arg_shapes: inference.args,
            output_shape: inference.output,
            allowed,
        })
    }

    pub fn function_type(&self) -> FunctionType {
        FunctionType::SymbolicGraph
    }

    pub fn arg_shapes(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.arg_shapes
    }

    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// Evaluate with every argument bound by name.
    ///
    /// # Errors
    /// `MissingArgument` / `UnexpectedArgument` unless the names match the
    /// compiled arguments exactly, `ShapeMismatch` if a shape differs from the
    /// compiled one, `DTypeNotAllowed` for element types the graph backend
    /// does not accept.
    pub fn call(&self, args: &[(&str, &NdArray)]) -> Result<NdArray> {
        let mut bound: HashMap<&str, &NdArray> = HashMap::with_capacity(args.len());
        for &(name, array) in args {
            let expected = self
                .arg_shapes
                .get(name)
                .ok_or_else(|| HybridError::UnexpectedArgument(name.to_string()))?;
            if bound.insert(name, array).is_some() {
                return Err(HybridError::InvalidParameter(format!(
                    "argument '{name}' bound twice"
                )));
            }
            if array.shape() != expected.as_slice() {
                return Err(HybridError::ShapeMismatch {
                    name: name.to_string(),
                    expected: expected.clone(),
                    actual: array.shape().to_vec(),
                });
            }
            if !self.allowed.contains(&array.dtype()) {
                return Err(HybridError::DTypeNotAllowed {
                    backend: backends::symbolic::NAME.to_string(),
                    dtype: array.dtype(),
                    allowed: self.allowed.iter().copied().collect(),
                });
            }
        }
        if let Some(missing) = self.arg_shapes.keys().find(|k| !bound.contains_key(k.as_str())) {
            return Err(HybridError::MissingArgument(missing.clone()));
        }
        self.symbol.eval(&bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer() -> Symbol {
        let data = Symbol::variable("X");
        let fc1 = Symbol::fully_connected("fc1", &data, 4);
        let act = Symbol::activation(&fc1, ActType::Relu);
        Symbol::fully_connected("fc2", &act, 3)
    }

    #[test]
    fn test_list_arguments_order() {
        assert_eq!(
            two_layer().list_arguments(),
            vec!["X", "fc1_weight", "fc1_bias", "fc2_weight", "fc2_bias"]
        );
    }

    #[test]
    fn test_infer_shapes() {
        let known = HashMap::from([("X".to_string(), vec![5, 2, 3])]);
        let inf = two_layer().infer_shapes(&known).unwrap();
        assert_eq!(inf.output, vec![5, 3]);
        assert_eq!(inf.args["fc1_weight"], vec![4, 6]);
        assert_eq!(inf.args["fc1_bias"], vec![4]);
        assert_eq!(inf.args["fc2_weight"], vec![3, 4]);
    }

    #[test]
    fn test_infer_shapes_requires_inputs() {
        let err = two_layer().infer_shapes(&HashMap::new()).unwrap_err();
        assert!(matches!(err, HybridError::ShapeInference(_)));
    }

    #[test]
    fn test_compile_rejects_unknown_input() {
        let registry = Registry::standard().unwrap();
        let inputs: [(&str, &[usize]); 2] = [("X", &[2, 6]), ("Y", &[2])];
        let err = Function::compile(&two_layer(), &inputs, &registry).unwrap_err();
        assert!(matches!(err, HybridError::UnexpectedArgument(name) if name == "Y"));
    }

    #[test]
    fn test_reused_layer_name_must_agree() {
        let data = Symbol::variable("X");
        let a = Symbol::fully_connected("fc", &data, 4);
        let b = Symbol::fully_connected("fc", &a, 4);
        let known = HashMap::from([("X".to_string(), vec![1, 3])]);
        assert!(matches!(
            b.infer_shapes(&known),
            Err(HybridError::ShapeInference(_))
        ));
    }
}
