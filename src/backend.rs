//! Backend selection.
//!
//! The default build trains on CPU through the ndarray backend so the crate
//! runs (and tests) anywhere. Enabling the `wgpu` cargo feature switches the
//! whole binary to GPU.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = burn::backend::NdArray;

/// The autodiff backend used for training.
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the selected backend.
pub fn default_device() -> <DefaultBackend as Backend>::Device {
    Default::default()
}

/// Human-readable name of the compiled-in backend.
pub fn backend_name() -> &'static str {
    #[cfg(feature = "wgpu")]
    {
        "wgpu (GPU)"
    }
    #[cfg(not(feature = "wgpu"))]
    {
        "ndarray (CPU)"
    }
}

/// Seed the framework RNG once at startup. The seed is process-wide.
pub fn seed_backend<B: Backend>(seed: u64) {
    B::seed(seed);
}
