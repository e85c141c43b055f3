//! Energy-based silence/speech detection.
//!
//! Frames a PCM signal, models log-energies with two Gaussians (silence and
//! speech), labels each frame and turns the result into a segmentation that
//! can be written as text or used to splice the speech out of a WAV file.

pub mod bigauss;
pub mod config;
pub mod detector;
pub mod energy;
pub mod error;
pub mod segment;
pub mod segmenter;
pub mod signal;
#[cfg(feature = "wav")]
pub mod splice;
#[cfg(feature = "wav")]
pub mod wav;

pub use bigauss::{BiGaussian, FitReport, Gaussian};
pub use config::{load_config, AnalysisConfig, Config, SpliceConfig};
pub use detector::{Detection, Detector, RunReport};
pub use energy::{extract_profile, EnergyProfile, ExtractionOptions, FrameGeometry};
pub use error::{SadError, SadResult};
pub use segment::{FieldSelector, Label, Segment, SegmentBuilder, Segmentation};
pub use segmenter::{OutputMode, SegmentStats, Segmenter, SegmenterOptions};
pub use signal::{InterleavedSource, PcmSource, SignalSource, WindowKind};
#[cfg(feature = "wav")]
pub use splice::{splice, SpliceSummary};
#[cfg(feature = "wav")]
pub use wav::{read_info, WavInfo, WavSource};
