//! Technique lookup by name.

use std::fmt;
use std::str::FromStr;

use showcase_renderer::{Capability, Technique};

use crate::{Barycentric, FluidDisplay, MeshShader, MultiViewport, PushConstants};

#[derive(Debug, thiserror::Error)]
#[error("unknown technique '{name}' (expected one of: {expected})")]
pub struct UnknownTechnique {
    pub name: String,
    expected: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TechniqueKind {
    PushConstants,
    MeshShader,
    MultiViewport,
    Barycentric,
    FluidDisplay,
}

impl TechniqueKind {
    pub const ALL: [TechniqueKind; 5] = [
        TechniqueKind::PushConstants,
        TechniqueKind::MeshShader,
        TechniqueKind::MultiViewport,
        TechniqueKind::Barycentric,
        TechniqueKind::FluidDisplay,
    ];

    pub fn all() -> impl Iterator<Item = TechniqueKind> {
        Self::ALL.into_iter()
    }

    pub fn name(self) -> &'static str {
        match self {
            TechniqueKind::PushConstants => PushConstants::NAME,
            TechniqueKind::MeshShader => MeshShader::NAME,
            TechniqueKind::MultiViewport => MultiViewport::NAME,
            TechniqueKind::Barycentric => Barycentric::NAME,
            TechniqueKind::FluidDisplay => FluidDisplay::NAME,
        }
    }

    pub fn required_capabilities(self) -> &'static [Capability] {
        match self {
            TechniqueKind::PushConstants | TechniqueKind::FluidDisplay => &[],
            TechniqueKind::MeshShader => MeshShader::REQUIRED,
            TechniqueKind::MultiViewport => MultiViewport::REQUIRED,
            TechniqueKind::Barycentric => Barycentric::REQUIRED,
        }
    }

    /// A fresh, unprepared technique of this kind.
    pub fn build(self) -> Box<dyn Technique> {
        match self {
            TechniqueKind::PushConstants => Box::new(PushConstants::new()),
            TechniqueKind::MeshShader => Box::new(MeshShader::new()),
            TechniqueKind::MultiViewport => Box::new(MultiViewport::new()),
            TechniqueKind::Barycentric => Box::new(Barycentric::new()),
            TechniqueKind::FluidDisplay => Box::new(FluidDisplay::new()),
        }
    }
}

impl fmt::Display for TechniqueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TechniqueKind {
    type Err = UnknownTechnique;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTechnique {
                name: s.to_string(),
                expected: Self::all().map(|k| k.name()).collect::<Vec<_>>().join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in TechniqueKind::all() {
            assert_eq!(kind.to_string().parse::<TechniqueKind>().unwrap(), kind);
        }
        assert_eq!(
            " Mesh-Shader ".parse::<TechniqueKind>().unwrap(),
            TechniqueKind::MeshShader
        );
    }

    #[test]
    fn test_unknown_name_lists_choices() {
        let err = "raytracing".parse::<TechniqueKind>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("raytracing"));
        assert!(message.contains("push-constants"));
        assert!(message.contains("fluid-display"));
    }

    #[test]
    fn test_built_technique_matches_kind() {
        for kind in TechniqueKind::all() {
            let technique = kind.build();
            assert_eq!(technique.name(), kind.name());
            assert_eq!(technique.required_capabilities(), kind.required_capabilities());
        }
    }
}
