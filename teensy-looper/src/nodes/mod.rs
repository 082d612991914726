//! Stock processing nodes that sit around the looper in a typical graph.

pub mod analyze_peak;
pub mod analyze_rms;
pub mod mixer;
pub mod synth_dc;

pub use analyze_peak::PeakMeter;
pub use analyze_rms::RmsMeter;
pub use mixer::Mixer;
pub use synth_dc::DcSource;
