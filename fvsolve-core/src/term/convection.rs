//! Convection term and its face interpolation schemes.

use super::{interior_faces, Contribution, Term, TermContext};
use crate::coefficient::Coefficient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// How the face value is interpolated from the two adjacent cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvectionScheme {
    /// Upstream cell value.
    Upwind,
    /// Arithmetic mean.
    Central,
    /// Patankar power-law weighting by the face Péclet number.
    #[default]
    PowerLaw,
}

impl ConvectionScheme {
    /// Weight α of the first cell in `φ_f = α·φ_P + (1 − α)·φ_N`, for a
    /// face Péclet number `peclet = F/D`.
    pub fn alpha(self, peclet: f64) -> f64 {
        match self {
            ConvectionScheme::Central => 0.5,
            ConvectionScheme::Upwind => {
                if peclet > 0.0 {
                    1.0
                } else if peclet < 0.0 {
                    0.0
                } else {
                    0.5
                }
            }
            ConvectionScheme::PowerLaw => power_law_alpha(peclet),
        }
    }
}

fn power_law_alpha(p: f64) -> f64 {
    if p > 10.0 {
        1.0 - 1.0 / p
    } else if p > 0.0 {
        ((p - 1.0) + (1.0 - p / 10.0).powi(5)) / p
    } else if p < -10.0 {
        -1.0 / p
    } else if p < 0.0 {
        ((1.0 + p / 10.0).powi(5) - 1.0) / p
    } else {
        0.5
    }
}

/// `∇·(uφ)` with a uniform velocity.
///
/// The face flux is `F = (u·n)·A`. With `φ_f = α·φ_P + (1 − α)·φ_N` the
/// first cell gains `F·φ_f` and the second loses it. Boundary faces are
/// left to boundary conditions.
#[derive(Debug, Clone)]
pub struct ConvectionTerm {
    velocity: [f64; 2],
    scheme: ConvectionScheme,
    /// Face diffusivity used to form the Péclet number.
    diffusion: Coefficient,
}

impl ConvectionTerm {
    /// Convection with no competing diffusion; every scheme but Central
    /// reduces to upwind.
    pub fn new(velocity: [f64; 2], scheme: ConvectionScheme) -> Self {
        Self::with_diffusion(velocity, scheme, 0.0)
    }

    pub fn with_diffusion(velocity: [f64; 2], scheme: ConvectionScheme, diffusion: impl Into<Coefficient>) -> Self {
        Self {
            velocity,
            scheme,
            diffusion: diffusion.into(),
        }
    }

    pub fn scheme(&self) -> ConvectionScheme {
        self.scheme
    }
}

impl Term for ConvectionTerm {
    fn name(&self) -> &'static str {
        "convection"
    }

    fn contribution(&self, ctx: &TermContext<'_>) -> Result<Contribution> {
        let mesh = ctx.mesh;
        let gamma = self.diffusion.evaluate(mesh, ctx.values, mesh.n_faces())?;
        let mut out = Contribution::zeros(ctx.n_cells());

        for (face, p, n) in interior_faces(mesh) {
            let normal = mesh.face_normal(face);
            let area = mesh.face_area(face);
            let flux = (self.velocity[0] * normal[0] + self.velocity[1] * normal[1]) * area;
            if flux == 0.0 {
                continue;
            }
            let conductance = gamma[face] * area / mesh.cell_distance(face);
            let peclet = if conductance == 0.0 {
                flux.signum() * f64::INFINITY
            } else {
                flux / conductance
            };
            let alpha = self.scheme.alpha(peclet);

            out.matrix.add(p, p, flux * alpha);
            out.matrix.add(p, n, flux * (1.0 - alpha));
            out.matrix.add(n, p, -flux * alpha);
            out.matrix.add(n, n, -flux * (1.0 - alpha));
        }
        Ok(out)
    }
}
