//! Array backends selected by name, with symbolic functions and a small
//! model/solver layer on top.
//!
//! A [`Registry`] maps backend names to their `(ArrayType, FunctionType)`
//! variant and native element types. It is built once and then only read:
//!
//! ```
//! use hybrid_nd::{ArrayType, DType, Registry};
//!
//! let registry = Registry::standard().unwrap();
//! let (array_type, _) = registry.lookup_variant("plain-array").unwrap();
//! assert_eq!(array_type, ArrayType::PlainArray);
//! assert!(registry.lookup_variant("symbolic-graph").is_err());
//! assert!(
//!     registry
//!         .lookup_allowed_types("symbolic-graph")
//!         .unwrap()
//!         .contains(&DType::F32)
//! );
//! ```

pub mod variant;

pub mod array;
pub mod backends;
pub mod config;
pub mod data;
pub mod dtype;
pub mod error;
pub mod layers;
pub mod logging;
pub mod model;
pub mod registry;
pub mod solver;
pub mod symbol;

pub use array::{ArrayFactory, NdArray};
pub use config::RuntimeConfig;
pub use dtype::DType;
pub use error::{HybridError, Result};
pub use model::{InitRule, Model, ModelBase};
pub use registry::{BackendEntry, Registry, RegistryBuilder};
pub use solver::{EvalReport, Solver, SolverConfig, Split};
pub use symbol::{ActType, Function, Symbol};
pub use variant::{ArrayType, AutoNumber, FunctionType};
