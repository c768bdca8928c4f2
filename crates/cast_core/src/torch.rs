//! Cutting torch at a fixed distance from the mold.

use serde::{Deserialize, Serialize};

use crate::Product;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Torch {
    pub location_m: f64,
    /// Strand meters accumulated since the last cut.
    acc_m: f64,
    next_product: Option<Product>,
    is_last_cut: bool,
    optimization_in_progress: bool,
}

impl Torch {
    pub fn new(location_m: f64) -> Self {
        Torch {
            location_m,
            acc_m: 0.0,
            next_product: None,
            is_last_cut: false,
            optimization_in_progress: false,
        }
    }

    pub fn set_next_product(&mut self, product: Product, is_last: bool) {
        self.next_product = Some(product);
        self.is_last_cut = is_last;
    }

    pub fn reset_next_product(&mut self) {
        self.next_product = None;
        self.is_last_cut = false;
    }

    pub fn next_product(&self) -> Option<&Product> {
        self.next_product.as_ref()
    }

    pub fn set_optimization_in_progress(&mut self, in_progress: bool) {
        self.optimization_in_progress = in_progress;
    }

    /// Length of strand currently past the torch.
    pub fn measured_cut_length_m(&self) -> f64 {
        (self.acc_m - self.location_m).max(0.0)
    }

    /// Account one strand advance. Returns the finished product when the
    /// armed cut length has been reached.
    ///
    /// The last cut of a sequence waits for the strand tail to clear the
    /// torch; measurements are also suspended while the cut schedule is
    /// being reshaped.
    pub fn measure(&mut self, increment_m: f64, tail_position_m: f64) -> Option<Product> {
        self.acc_m += increment_m;
        if self.optimization_in_progress {
            return None;
        }
        if self.is_last_cut && tail_position_m <= self.location_m {
            return None;
        }
        let measured = self.measured_cut_length_m();
        let ready = self
            .next_product
            .as_ref()
            .is_some_and(|p| measured >= p.length_aim_m);
        if !ready {
            return None;
        }
        let mut done = self.next_product.take()?;
        done.cut_length_m = measured;
        self.acc_m = self.location_m;
        Some(done)
    }
}
