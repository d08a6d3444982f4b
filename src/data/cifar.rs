use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::info;

use crate::data::transforms::{mean_image, subtract_mean};
use crate::error::{HybridError, Result};

pub const IMAGE_BYTES: usize = 3 * 32 * 32;
const RECORD_BYTES: usize = 1 + IMAGE_BYTES;
pub const NUM_CLASSES: usize = 10;

const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILE: &str = "test_batch.bin";

/// Load one CIFAR-10 binary batch
///
/// Each record is one label byte followed by 3072 pixel bytes (channel-major
/// 3x32x32). Returns pixels scaled to [0, 1] and the labels.
/// # Errors
/// file errors, or a file whose length is not a whole number of records
pub fn load_cifar10_batch<P: AsRef<Path>>(path: P) -> io::Result<(Vec<f32>, Vec<u8>)> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    if bytes.len() % RECORD_BYTES != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "CIFAR-10 batch length {} is not a multiple of {RECORD_BYTES}",
                bytes.len()
            ),
        ));
    }

    let count = bytes.len() / RECORD_BYTES;
    let mut images = Vec::with_capacity(count * IMAGE_BYTES);
    let mut labels = Vec::with_capacity(count);
    for record in bytes.chunks_exact(RECORD_BYTES) {
        let (&label, pixels) = record
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty record"))?;
        if usize::from(label) >= NUM_CLASSES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid CIFAR-10 label {label}"),
            ));
        }
        labels.push(label);
        images.extend(pixels.iter().map(|&p| f32::from(p) / 255.0));
    }
    Ok((images, labels))
}

/// Sizes of the train / validation / test splits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cifar10Split {
    pub num_training: usize,
    pub num_validation: usize,
    pub num_test: usize,
}

impl Default for Cifar10Split {
    fn default() -> Self {
        Cifar10Split {
            num_training: 49_000,
            num_validation: 1_000,
            num_test: 1_000,
        }
    }
}

/// Flattened images and labels of one split
#[derive(Debug, Clone, Default)]
pub struct Samples {
    pub images: Vec<f32>,
    pub labels: Vec<u8>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels_usize(&self) -> Vec<usize> {
        self.labels.iter().map(|&l| usize::from(l)).collect()
    }

    fn take(images: &[f32], labels: &[u8], start: usize, count: usize) -> Samples {
        Samples {
            images: images[start * IMAGE_BYTES..(start + count) * IMAGE_BYTES].to_vec(),
            labels: labels[start..start + count].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cifar10 {
    pub train: Samples,
    pub val: Samples,
    pub test: Samples,
}

/// Load CIFAR-10 from the binary distribution in `dir`.
///
/// Training and validation rows come from the training batches in order; the
/// training mean image is subtracted from every split.
pub fn load_cifar10<P: AsRef<Path>>(dir: P, split: Cifar10Split) -> Result<Cifar10> {
    let dir = dir.as_ref();
    let mut train_images = Vec::new();
    let mut train_labels = Vec::new();
    for name in TRAIN_FILES {
        let (images, labels) = load_cifar10_batch(dir.join(name))?;
        train_images.extend(images);
        train_labels.extend(labels);
    }
    let (test_images, test_labels) = load_cifar10_batch(dir.join(TEST_FILE))?;

    if split.num_training + split.num_validation > train_labels.len() {
        return Err(HybridError::InvalidParameter(format!(
            "requested {} train + {} val samples but only {} available",
            split.num_training,
            split.num_validation,
            train_labels.len()
        )));
    }
    if split.num_test > test_labels.len() {
        return Err(HybridError::InvalidParameter(format!(
            "requested {} test samples but only {} available",
            split.num_test,
            test_labels.len()
        )));
    }

    let mut data = Cifar10 {
        train: Samples::take(&train_images, &train_labels, 0, split.num_training),
        val: Samples::take(
            &train_images,
            &train_labels,
            split.num_training,
            split.num_validation,
        ),
        test: Samples::take(&test_images, &test_labels, 0, split.num_test),
    };

    if !data.train.is_empty() {
        let mean = mean_image(&data.train.images, IMAGE_BYTES);
        for samples in [&mut data.train, &mut data.val, &mut data.test] {
            subtract_mean(&mut samples.images, &mean);
        }
    }

    info!(
        train = data.train.len(),
        val = data.val.len(),
        test = data.test.len(),
        "loaded CIFAR-10"
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(label: u8, pixel: u8) -> Vec<u8> {
        let mut r = vec![label];
        r.extend(std::iter::repeat_n(pixel, IMAGE_BYTES));
        r
    }

    #[test]
    fn test_batch_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&record(3, 255)).unwrap();
        file.write_all(&record(7, 0)).unwrap();
        let (images, labels) = load_cifar10_batch(file.path()).unwrap();
        assert_eq!(labels, vec![3, 7]);
        assert_eq!(images.len(), 2 * IMAGE_BYTES);
        assert_eq!(images[0], 1.0);
        assert_eq!(images[IMAGE_BYTES], 0.0);
    }

    #[test]
    fn test_batch_rejects_truncated_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&record(1, 1)[..100]).unwrap();
        let err = load_cifar10_batch(file.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_batch_rejects_bad_label() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&record(10, 1)).unwrap();
        assert!(load_cifar10_batch(file.path()).is_err());
    }

    #[test]
    fn test_load_splits_and_centers() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in TRAIN_FILES.iter().enumerate() {
            let mut f = File::create(dir.path().join(name)).unwrap();
            // one black and one white image per file
            f.write_all(&record(i as u8, 0)).unwrap();
            f.write_all(&record(i as u8, 255)).unwrap();
        }
        let mut f = File::create(dir.path().join(TEST_FILE)).unwrap();
        f.write_all(&record(9, 255)).unwrap();

        let split = Cifar10Split {
            num_training: 8,
            num_validation: 2,
            num_test: 1,
        };
        let data = load_cifar10(dir.path(), split).unwrap();
        assert_eq!(data.train.len(), 8);
        assert_eq!(data.val.labels, vec![4, 4]);
        assert_eq!(data.test.labels_usize(), vec![9]);
        // training mean is 0.5 everywhere
        assert!((data.train.images[0] + 0.5).abs() < 1e-6);
        assert!((data.test.images[0] - 0.5).abs() < 1e-6);

        let too_many = Cifar10Split {
            num_training: 10,
            num_validation: 1,
            num_test: 1,
        };
        assert!(load_cifar10(dir.path(), too_many).is_err());
    }
}
