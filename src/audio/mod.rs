pub mod normalize;
pub mod silence;
pub mod stretch;
pub mod track;
pub mod wav;

pub use normalize::AudioNormalizer;
pub use silence::{NonSilentInterval, SilenceAnalyzer, SilenceReport};
pub use stretch::TimeStretcher;
pub use track::AudioTrack;
