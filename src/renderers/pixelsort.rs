//! CPU passes over the quarter resolution background buffer.

use crate::canvas::PixelBuffer;
use itertools::Itertools;
use std::f64::consts::TAU;

/// Longest luminance distance a sorted run may span at full strength.
pub const MAX_THRESHOLD: f64 = 512.;

fn luminance(pixel: &[u8]) -> u16 {
    pixel[..3].iter().map(|&channel| channel as u16).sum()
}

/// Sorts each row in runs by luminance. A run keeps growing while pixels stay
/// within `threshold` of the pixel that opened it, so zero leaves the image
/// untouched and large thresholds sort whole rows.
pub fn pixel_sort(buffer: &mut PixelBuffer, threshold: f64) {
    if threshold <= 0. || buffer.width == 0 {
        return;
    }

    buffer
        .data
        .chunks_exact_mut(buffer.width as usize * 4)
        .for_each(|row| sort_row(row, threshold));
}

fn sort_row(row: &mut [u8], threshold: f64) {
    let pixels = row.chunks_exact(4).map(<[u8]>::to_vec).collect_vec();

    let sorted = pixels
        .iter()
        .peekable()
        .batching(|rest| {
            let opener = luminance(rest.next()?) as f64;
            let mut len = 1;
            while rest
                .next_if(|pixel| (luminance(pixel) as f64 - opener).abs() < threshold)
                .is_some()
            {
                len += 1;
            }
            Some(len)
        })
        .scan(0, |offset, len| {
            let run = *offset..*offset + len;
            *offset += len;
            Some(run)
        })
        .flat_map(|run| {
            pixels[run]
                .iter()
                .sorted_by_key(|pixel| luminance(pixel))
                .collect_vec()
        })
        .flatten()
        .copied()
        .collect_vec();

    row.copy_from_slice(&sorted);
}

/// Block pixelisation with a horizontal sine displacement per block row.
/// `wave` is the displacement in pixels at the crest.
#[rustfmt::skip]
pub fn pixelize(source: &PixelBuffer, target: &mut PixelBuffer, block: u32, wave: f64) {
    let (width, height) = (source.width, source.height);
    let block = block.max(1);
    if target.width != width || target.height != height {
        *target = PixelBuffer::new(width, height);
    }

    (0..height).cartesian_product(0..width).for_each(|(y, x)| {
        let (bx, by) = (x / block * block, y / block * block);
        let shift = (wave * (TAU * by as f64 / height as f64).sin()).round() as i64;
        let sx = (bx as i64 + shift).rem_euclid(width as i64) as usize;

        let from = (by as usize * width as usize + sx) * 4;
        let to = (y as usize * width as usize + x as usize) * 4;
        target.data[to..to + 4].copy_from_slice(&source.data[from..from + 4]);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(levels: &[u8]) -> PixelBuffer {
        PixelBuffer {
            width: levels.len() as u32,
            height: 1,
            data: levels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        }
    }

    fn levels(buffer: &PixelBuffer) -> Vec<u8> {
        buffer.data.chunks_exact(4).map(|pixel| pixel[0]).collect()
    }

    #[test]
    fn zero_threshold_is_identity() {
        let mut buffer = row(&[200, 10, 90, 30]);
        pixel_sort(&mut buffer, 0.);
        assert_eq!(levels(&buffer), vec![200, 10, 90, 30]);
    }

    #[test]
    fn full_threshold_sorts_rows() {
        let mut buffer = row(&[200, 10, 90, 30]);
        pixel_sort(&mut buffer, MAX_THRESHOLD * 2.);
        assert_eq!(levels(&buffer), vec![10, 30, 90, 200]);
    }

    #[test]
    fn runs_break_on_large_steps() {
        // Luminance is the channel sum, so a step of 100 per channel is 300.
        let mut buffer = row(&[50, 20, 250, 240, 30, 10]);
        pixel_sort(&mut buffer, 200.);
        assert_eq!(levels(&buffer), vec![20, 50, 240, 250, 10, 30]);
    }

    #[test]
    fn rows_sort_independently() {
        let mut buffer = PixelBuffer {
            width: 2,
            height: 2,
            data: [9, 1, 8, 2].iter().flat_map(|&l| [l, l, l, 255]).collect(),
        };
        pixel_sort(&mut buffer, MAX_THRESHOLD);
        assert_eq!(levels(&buffer), vec![1, 9, 2, 8]);
    }

    #[test]
    fn pixelize_repeats_block_origin() {
        let source = PixelBuffer {
            width: 4,
            height: 2,
            data: (0..8u8).flat_map(|l| [l, l, l, 255]).collect(),
        };
        let mut target = PixelBuffer::new(0, 0);
        pixelize(&source, &mut target, 2, 0.);
        assert_eq!(levels(&target), vec![0, 0, 2, 2, 0, 0, 2, 2]);
    }

    #[test]
    fn wave_shifts_rows() {
        let source = PixelBuffer {
            width: 4,
            height: 4,
            data: (0..16u8).flat_map(|l| [l, l, l, 255]).collect(),
        };
        let mut target = PixelBuffer::new(4, 4);
        pixelize(&source, &mut target, 1, 1.);
        // sin is zero on the first row and one on the second.
        assert_eq!(&levels(&target)[..8], &[0, 1, 2, 3, 5, 6, 7, 4]);
    }
}
