use hybrid_nd::data::{BatchIter, LastBatch};
use hybrid_nd::layers::softmax_loss;
use hybrid_nd::{
    ActType, ArrayFactory, DType, Function, FunctionType, HybridError, InitRule, Model, ModelBase,
    NdArray, Registry, Result, Solver, SolverConfig, Split, Symbol,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn factory(registry: &Registry) -> ArrayFactory {
    registry.factory("plain-array").unwrap()
}

fn mlp(hidden: usize, classes: usize) -> Symbol {
    let x = Symbol::variable("X");
    let fc1 = Symbol::fully_connected("fc1", &x, hidden);
    let act = Symbol::activation(&fc1, ActType::Relu);
    Symbol::fully_connected("fc2", &act, classes)
}

struct TinyNet {
    base: ModelBase,
    function: Function,
}

impl TinyNet {
    fn new(registry: &Registry, batch: usize, input: usize, hidden: usize, classes: usize) -> Self {
        let mut base = ModelBase::new();
        base.add_param("w1", &[hidden, input])
            .add_param("b1", &[hidden])
            .add_param("w2", &[classes, hidden])
            .add_param("b2", &[classes]);
        let shape = [batch, input];
        let function = Function::compile(&mlp(hidden, classes), &[("X", &shape[..])], registry)
            .unwrap();
        TinyNet { base, function }
    }
}

impl Model for TinyNet {
    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn forward(&self, x: &NdArray) -> Result<NdArray> {
        self.function.call(&[
            ("X", x),
            ("fc1_weight", self.base.param("w1")?),
            ("fc1_bias", self.base.param("b1")?),
            ("fc2_weight", self.base.param("w2")?),
            ("fc2_bias", self.base.param("b2")?),
        ])
    }

    fn loss(&self, predict: &NdArray, labels: &[usize]) -> Result<f32> {
        softmax_loss(predict, labels)
    }
}

#[test]
fn test_compiled_function_shapes() {
    let registry = Registry::standard().unwrap();
    let shape = [4usize, 3, 2];
    let function = Function::compile(&mlp(5, 2), &[("X", &shape[..])], &registry).unwrap();
    assert_eq!(function.function_type(), FunctionType::SymbolicGraph);
    assert_eq!(function.output_shape(), &[4, 2]);
    assert_eq!(function.arg_shapes()["fc1_weight"], vec![5, 6]);
    assert_eq!(function.arg_shapes()["fc2_bias"], vec![2]);
    assert_eq!(function.arg_shapes().len(), 5);
}

#[test]
fn test_forward_values() {
    let registry = Registry::standard().unwrap();
    let f = factory(&registry);
    let mut net = TinyNet::new(&registry, 2, 3, 2, 2);
    let base = net.base_mut();
    base.set_param(
        "w1",
        f.array(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[2, 3], DType::F32)
            .unwrap(),
    )
    .unwrap();
    base.set_param("b1", f.array(vec![0.0, 1.0], &[2], DType::F32).unwrap())
        .unwrap();
    base.set_param(
        "w2",
        f.array(vec![1.0, 1.0, 1.0, -1.0], &[2, 2], DType::F32)
            .unwrap(),
    )
    .unwrap();
    base.set_param("b2", f.array(vec![0.5, 0.0], &[2], DType::F32).unwrap())
        .unwrap();

    let x = f
        .array(vec![1.0, 2.0, 3.0, -1.0, -2.0, -3.0], &[2, 3], DType::F32)
        .unwrap();
    let scores = net.forward(&x).unwrap();
    assert_eq!(scores.shape(), &[2, 2]);
    assert_eq!(scores.data(), &[4.5, -2.0, 0.5, 0.0]);
    assert_eq!(scores.argmax_rows().unwrap(), vec![0, 0]);
}

#[test]
fn test_call_validates_arguments() {
    let registry = Registry::standard().unwrap();
    let f = factory(&registry);
    let mut net = TinyNet::new(&registry, 2, 3, 4, 2);
    let mut rng = StdRng::seed_from_u64(7);
    net.base_mut()
        .init_params(&f, InitRule::Xavier, DType::F32, &mut rng)
        .unwrap();

    let wrong_batch = f.zeros(&[3, 3], DType::F32).unwrap();
    assert!(matches!(
        net.forward(&wrong_batch),
        Err(HybridError::ShapeMismatch { ref name, .. }) if name == "X"
    ));

    // i64 is a plain-array type but not a graph type
    let wide = f.zeros(&[2, 3], DType::I64).unwrap();
    assert!(matches!(
        net.forward(&wide),
        Err(HybridError::DTypeNotAllowed { ref backend, .. }) if backend == "symbolic-graph"
    ));

    let x = f.zeros(&[2, 3], DType::F32).unwrap();
    let w1 = net.base().param("w1").unwrap();
    assert!(matches!(
        net.function.call(&[("X", &x), ("fc1_weight", w1)]),
        Err(HybridError::MissingArgument(_))
    ));
    assert!(matches!(
        net.function.call(&[("X", &x), ("Y", &x)]),
        Err(HybridError::UnexpectedArgument(ref name)) if name == "Y"
    ));
    assert!(net.forward(&x).is_ok());
}

#[test]
fn test_forward_before_init_is_an_error() {
    let registry = Registry::standard().unwrap();
    let net = TinyNet::new(&registry, 1, 2, 2, 2);
    let x = factory(&registry).zeros(&[1, 2], DType::F32).unwrap();
    assert!(matches!(
        net.forward(&x),
        Err(HybridError::MissingParameter(_))
    ));
}

#[test]
fn test_solver_evaluate_skips_padding() {
    let registry = Registry::standard().unwrap();
    let f = factory(&registry);
    let data = f
        .array(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2], DType::F32)
        .unwrap();
    let train = BatchIter::new(data.clone(), vec![0, 1, 0], 2, true, LastBatch::Pad).unwrap();
    let test = BatchIter::new(data, vec![0, 1, 0], 2, false, LastBatch::Pad).unwrap();

    let net = TinyNet::new(&registry, 2, 2, 3, 2);
    let config = SolverConfig::new()
        .with_init_rule(InitRule::Constant { value: 0.0 })
        .with_print_every(1);
    let mut solver = Solver::new(net, train, test, config);
    let mut rng = StdRng::seed_from_u64(0);
    solver.init(&f, &mut rng).unwrap();
    assert!(solver.model().base().is_initialized());

    // all-zero weights: uniform scores, argmax picks class 0
    let report = solver.evaluate(Split::Test, &mut rng).unwrap();
    assert_eq!(report.samples, 3);
    assert_eq!(report.batches, 2);
    assert!((report.loss - 2.0_f32.ln()).abs() < 1e-6);
    assert!((report.accuracy - 2.0 / 3.0).abs() < 1e-6);

    let again = solver.evaluate(Split::Train, &mut rng).unwrap();
    assert_eq!(again.samples, 3);
    assert!((again.loss - report.loss).abs() < 1e-6);
}

#[test]
fn test_solver_rejects_dtype_outside_backend() {
    let registry = Registry::standard().unwrap();
    let f = factory(&registry);
    let data = f.zeros(&[2, 2], DType::F32).unwrap();
    let train = BatchIter::new(data.clone(), vec![0, 1], 2, false, LastBatch::Discard).unwrap();
    let test = BatchIter::new(data, vec![0, 1], 2, false, LastBatch::Discard).unwrap();
    let net = TinyNet::new(&registry, 2, 2, 2, 2);
    let config = SolverConfig::new().with_dtype(DType::BF16).with_verbose(false);
    let mut solver = Solver::new(net, train, test, config);
    let mut rng = StdRng::seed_from_u64(0);
    assert!(matches!(
        solver.init(&f, &mut rng),
        Err(HybridError::DTypeNotAllowed { .. })
    ));
}

#[test]
fn test_solver_rejects_integer_dtype() {
    let registry = Registry::standard().unwrap();
    let f = factory(&registry);
    // integer casts would zero every centered pixel
    assert_eq!(
        f.array(vec![0.4, -0.3, 0.9], &[3], DType::U8).unwrap().data(),
        &[0.0, 0.0, 0.0]
    );

    let data = f.zeros(&[2, 2], DType::F32).unwrap();
    let train = BatchIter::new(data.clone(), vec![0, 1], 2, false, LastBatch::Pad).unwrap();
    let test = BatchIter::new(data, vec![0, 1], 2, false, LastBatch::Pad).unwrap();
    let net = TinyNet::new(&registry, 2, 2, 2, 2);
    let config = SolverConfig::new().with_dtype(DType::U8);
    let mut solver = Solver::new(net, train, test, config);
    let mut rng = StdRng::seed_from_u64(0);
    assert!(matches!(
        solver.init(&f, &mut rng),
        Err(HybridError::InvalidParameter(_))
    ));
    assert!(!solver.model().base().is_initialized());
}
