//! Codecs for each card family.
mod broadening;
mod data_reduction;
mod external_r;
mod fixed_radii;
mod isotope;
mod normalization;
mod orres;
mod paramagnetic;
mod particle_pair;
mod radii;
mod resonance;
mod unused;
mod user_resolution;

pub use broadening::{BroadeningCodec, BroadeningRecord};
pub use data_reduction::{DataReductionCodec, DataReductionRecord};
pub use external_r::{CompactExternalRCodec, CompactExternalRRecord, ExternalRCodec, ExternalRRecord};
pub use fixed_radii::{FixedRadiiCodec, FixedRadiusRecord};
pub use isotope::{IsotopeCodec, IsotopeRecord};
pub use normalization::{NormalizationCodec, NormalizationRecord};
pub use orres::{
    CrossSectionPoint, Detector, LithiumDetector, Moderator, Ne110Detector, OrresCodec, OrresParameter,
    OrresRecord, TantalumModerator, WaterModerator,
};
pub use paramagnetic::{Nuclide, ParamagneticCodec, ParamagneticRecord};
pub use particle_pair::{sniff_pair_encoding, ParticlePairCodec, ParticlePairRecord};
pub use radii::{ChannelAssignment, GroupChannels, RadiiCodec, RadiusRecord};
pub use resonance::{ResonanceCodec, ResonanceRecord};
pub use unused::{UnusedCorrelatedCodec, UnusedVariable};
pub use user_resolution::{BurstParameter, ChannelParameter, UserResolutionCodec, UserResolutionRecord};
