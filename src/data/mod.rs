pub mod cifar;
pub mod iter;
pub mod transforms;

pub use cifar::{Cifar10, Cifar10Split, Samples, load_cifar10, load_cifar10_batch};
pub use iter::{Batch, BatchIter, LastBatch};
pub use transforms::{mean_image, subtract_mean};
