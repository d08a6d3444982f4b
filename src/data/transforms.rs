/// Per-position mean over images stored back to back, `image_len` values each
#[must_use]
pub fn mean_image(images: &[f32], image_len: usize) -> Vec<f32> {
    let mut mean = vec![0.0; image_len];
    if image_len == 0 {
        return mean;
    }
    let count = images.len() / image_len;
    if count == 0 {
        return mean;
    }
    for image in images.chunks_exact(image_len) {
        for (m, &x) in mean.iter_mut().zip(image) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= count as f32;
    }
    mean
}

/// Subtract `mean` from every image in place
pub fn subtract_mean(images: &mut [f32], mean: &[f32]) {
    if mean.is_empty() {
        return;
    }
    for image in images.chunks_mut(mean.len()) {
        for (x, m) in image.iter_mut().zip(mean) {
            *x -= m;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_image() {
        let images = vec![0.0, 2.0, 4.0, 6.0];
        assert_eq!(mean_image(&images, 2), vec![2.0, 4.0]);
        assert_eq!(mean_image(&[], 3), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_subtract_mean() {
        let mut images = vec![1.0, 2.0, 3.0, 4.0];
        subtract_mean(&mut images, &[1.0, 1.0]);
        assert_eq!(images, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
