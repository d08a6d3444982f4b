//! Two-layer perceptron on CIFAR-10, declared as a symbolic graph
//!
//! X -> fc1 -> relu -> fc2, compiled for a fixed (batch, 3072) input and fed
//! plain arrays from the configured backend.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info};

use hybrid_nd::data::cifar::{IMAGE_BYTES, NUM_CLASSES};
use hybrid_nd::data::{BatchIter, Cifar10Split, LastBatch, Samples, load_cifar10};
use hybrid_nd::layers::softmax_loss;
use hybrid_nd::logging;
use hybrid_nd::{
    ActType, ArrayFactory, DType, Function, InitRule, Model, ModelBase, NdArray, Registry, Result,
    RuntimeConfig, Solver, SolverConfig, Split, Symbol,
};

#[derive(Parser, Debug)]
#[command(name = "mlp_sym", version)]
#[command(about = "Evaluate a symbolic two-layer MLP on CIFAR-10", long_about = None)]
struct Cli {
    /// Directory with the CIFAR-10 binary batches
    #[arg(long)]
    data_dir: PathBuf,

    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    #[arg(long, default_value_t = 512)]
    hidden_size: usize,

    /// Backend name (overrides the config file and HYBRID_ND_BACKEND)
    #[arg(long)]
    backend: Option<String>,

    /// JSON runtime config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parameter init rule: xavier, gaussian or constant
    #[arg(long, default_value = "xavier")]
    init: InitRule,

    #[arg(long, default_value_t = 20)]
    print_every: usize,

    /// Seed for initialization and shuffling; random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

struct TwoLayerNet {
    base: ModelBase,
    function: Function,
}

impl TwoLayerNet {
    fn new(
        registry: &Registry,
        batch_size: usize,
        input_size: usize,
        hidden_size: usize,
        num_classes: usize,
    ) -> Result<Self> {
        let mut base = ModelBase::new();
        base.add_param("w1", &[hidden_size, input_size])
            .add_param("b1", &[hidden_size])
            .add_param("w2", &[num_classes, hidden_size])
            .add_param("b2", &[num_classes]);

        let x = Symbol::variable("X");
        let fc1 = Symbol::fully_connected("fc1", &x, hidden_size);
        let act = Symbol::activation(&fc1, ActType::Relu);
        let fc2 = Symbol::fully_connected("fc2", &act, num_classes);

        let x_shape = [batch_size, input_size];
        let function = Function::compile(&fc2, &[("X", x_shape.as_slice())], registry)?;
        Ok(TwoLayerNet { base, function })
    }
}

impl Model for TwoLayerNet {
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

fn batches(
    factory: &ArrayFactory,
    samples: Samples,
    dtype: DType,
    batch_size: usize,
    shuffle: bool,
) -> Result<BatchIter> {
    let labels = samples.labels_usize();
    let data = factory.array(samples.images, &[labels.len(), IMAGE_BYTES], dtype)?;
    BatchIter::new(data, labels, batch_size, shuffle, LastBatch::Pad)
}

fn run(cli: Cli) -> Result<()> {
    let registry = Registry::standard()?;

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::new(),
    }
    .with_env_overrides()?;
    if let Some(backend) = cli.backend {
        config = config.with_backend(backend);
    }
    let backend = config.resolve(&registry)?;
    let factory = registry.factory(&backend.name)?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let solver_config = SolverConfig::new()
        .with_init_rule(cli.init)
        .with_dtype(config.dtype)
        .with_print_every(cli.print_every);
    solver_config.validate()?;

    let cifar_split = Cifar10Split {
        num_validation: 0,
        ..Cifar10Split::default()
    };
    let data = load_cifar10(&cli.data_dir, cifar_split)?;
    let train_iter = batches(&factory, data.train, config.dtype, cli.batch_size, true)?;
    let test_iter = batches(&factory, data.test, config.dtype, cli.batch_size, false)?;

    let model = TwoLayerNet::new(
        &registry,
        cli.batch_size,
        IMAGE_BYTES,
        cli.hidden_size,
        NUM_CLASSES,
    )?;
    let mut solver = Solver::new(model, train_iter, test_iter, solver_config);

    solver.init(&factory, &mut rng)?;
    for split in [Split::Train, Split::Test] {
        let report = solver.evaluate(split, &mut rng)?;
        info!(?split, ?report, "done");
        println!(
            "{split:?} loss {:.4}, accuracy {:.4} ({} samples, {} batches)",
            report.loss, report.accuracy, report.samples, report.batches
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging_from_env() {
        eprintln!("logging disabled: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "mlp_sym failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
