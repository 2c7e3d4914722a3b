//! Image-based-lighting precomputation.
//!
//! Bakes the three lookup textures the PBR shaders sample at runtime:
//!
//! - a BRDF integration LUT ([`brdf_lut`]),
//! - a diffuse irradiance cube map ([`cubemap`]),
//! - a specular prefiltered environment cube map ([`cubemap`]).
//!
//! All three bakes run synchronously on one queue at startup. Every
//! intermediate Vulkan object lives in a [`scratch`] guard, so teardown is
//! the reverse of construction on success and failure alike.

use std::f32::consts::FRAC_PI_2;

use ash::vk;
use glam::Mat4;

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::mesh::CubeMesh;
use crate::shader::ShaderStage;
use crate::texture::Texture;

pub mod brdf_lut;
pub mod cubemap;
pub mod scratch;

pub use brdf_lut::bake_brdf_lut;
pub use cubemap::{bake_cube_map, CubeMapKind};

/// Side length of the BRDF integration LUT.
pub const BRDF_LUT_DIM: u32 = 512;
/// Two-channel float format holding the scale/bias BRDF terms.
pub const BRDF_LUT_FORMAT: vk::Format = vk::Format::R16G16_SFLOAT;

/// Full mip chain length for a square texture of side `dim`.
pub fn mip_level_count(dim: u32) -> u32 {
    (dim as f32).log2().floor() as u32 + 1
}

/// Roughness encoded into mip `mip` of a prefiltered cube with `num_mips`
/// levels: 0.0 at the base level, 1.0 at the last.
pub fn roughness_for_mip(mip: u32, num_mips: u32) -> f32 {
    mip as f32 / (num_mips - 1) as f32
}

/// View matrix orienting the camera towards cube face `face`
/// (+X, -X, +Y, -Y, +Z, -Z in Vulkan layer order).
pub fn face_matrix(face: usize) -> Mat4 {
    let half_turn_x = Mat4::from_rotation_x(std::f32::consts::PI);
    match face {
        0 => Mat4::from_rotation_y(FRAC_PI_2) * half_turn_x,
        1 => Mat4::from_rotation_y(-FRAC_PI_2) * half_turn_x,
        2 => Mat4::from_rotation_x(-FRAC_PI_2),
        3 => Mat4::from_rotation_x(FRAC_PI_2),
        4 => half_turn_x,
        _ => Mat4::from_rotation_z(std::f32::consts::PI),
    }
}

/// Projection-view matrix pushed to the cube bakers for face `face`.
///
/// A 90 degree vertical field of view over a square viewport covers exactly
/// one cube face.
pub fn face_mvp(face: usize) -> Mat4 {
    Mat4::perspective_rh(FRAC_PI_2, 1.0, 0.1, 512.0) * face_matrix(face)
}

/// One render-and-copy step of a cube bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeStep {
    pub mip: u32,
    pub face: usize,
    pub extent: vk::Extent2D,
}

/// Enumerates every (mip, face) pair of a cube bake, mip-major, with the
/// viewport extent for that mip.
#[derive(Debug, Clone, Copy)]
pub struct BakePlan {
    pub dim: u32,
    pub num_mips: u32,
}

impl BakePlan {
    pub fn new(dim: u32) -> Self {
        Self {
            dim,
            num_mips: mip_level_count(dim),
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = BakeStep> + '_ {
        (0..self.num_mips).flat_map(move |mip| {
            let side = self.dim >> mip;
            (0..6).map(move |face| BakeStep {
                mip,
                face,
                extent: vk::Extent2D {
                    width: side,
                    height: side,
                },
            })
        })
    }
}

/// Single-subpass render pass for offscreen baking.
///
/// One color attachment, cleared on load and stored, transitioned from
/// UNDEFINED to `final_layout` by the pass itself. The two external
/// dependencies order the attachment writes against surrounding transfer
/// and sampling work.
pub fn create_bake_render_pass(
    device: &ash::Device,
    format: vk::Format,
    final_layout: vk::ImageLayout,
) -> Result<vk::RenderPass, RenderError> {
    let attachment = vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout,
        ..Default::default()
    };

    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let color_refs = [color_ref];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);

    let dependencies = [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::MEMORY_READ,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
        vk::SubpassDependency {
            src_subpass: 0,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::MEMORY_READ,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
    ];

    let attachments = [attachment];
    let subpasses = [subpass];
    let info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&info, None) }
        .map_err(RenderError::creation("bake render pass"))
}

/// Shader stages consumed by the three bakers.
///
/// The cube bakers share one vertex shader; each pass has its own fragment
/// shader. The caller keeps ownership and destroys the modules after
/// [`IblMaps::bake`] returns.
#[derive(Debug, Clone, Copy)]
pub struct IblShaders {
    pub brdf_vert: ShaderStage,
    pub brdf_frag: ShaderStage,
    pub cube_vert: ShaderStage,
    pub irradiance_frag: ShaderStage,
    pub prefilter_frag: ShaderStage,
}

/// The three baked lookup textures.
pub struct IblMaps {
    pub brdf_lut: Texture,
    pub irradiance: Texture,
    pub prefiltered: Texture,
}

impl IblMaps {
    /// Run all three bakes against the environment cube map `env`.
    pub fn bake(
        ctx: &RenderContext,
        env: &Texture,
        skybox: &CubeMesh,
        shaders: &IblShaders,
    ) -> Result<Self, RenderError> {
        let mut brdf_lut = bake_brdf_lut(ctx, shaders.brdf_vert, shaders.brdf_frag)?;

        let mut irradiance = match bake_cube_map(
            ctx,
            CubeMapKind::Irradiance,
            env,
            skybox,
            shaders.cube_vert,
            shaders.irradiance_frag,
        ) {
            Ok(t) => t,
            Err(e) => {
                brdf_lut.destroy(ctx);
                return Err(e);
            }
        };

        let prefiltered = match bake_cube_map(
            ctx,
            CubeMapKind::Prefiltered,
            env,
            skybox,
            shaders.cube_vert,
            shaders.prefilter_frag,
        ) {
            Ok(t) => t,
            Err(e) => {
                irradiance.destroy(ctx);
                brdf_lut.destroy(ctx);
                return Err(e);
            }
        };

        Ok(Self {
            brdf_lut,
            irradiance,
            prefiltered,
        })
    }

    /// Release all three textures. Idempotent.
    pub fn destroy(&mut self, ctx: &RenderContext) {
        self.prefiltered.destroy(ctx);
        self.irradiance.destroy(ctx);
        self.brdf_lut.destroy(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use rstest::rstest;

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(64, 7)]
    #[case(512, 10)]
    #[case(1024, 11)]
    fn test_mip_level_count(#[case] dim: u32, #[case] expected: u32) {
        assert_eq!(mip_level_count(dim), expected);
    }

    #[test]
    fn test_roughness_spans_unit_interval() {
        let num_mips = mip_level_count(512);
        assert_eq!(roughness_for_mip(0, num_mips), 0.0);
        assert_eq!(roughness_for_mip(num_mips - 1, num_mips), 1.0);
        for mip in 1..num_mips {
            assert!(roughness_for_mip(mip, num_mips) > roughness_for_mip(mip - 1, num_mips));
        }
    }

    #[test]
    fn test_bake_plan_covers_every_mip_and_face() {
        let plan = BakePlan::new(64);
        let steps: Vec<BakeStep> = plan.steps().collect();
        assert_eq!(steps.len(), 6 * 7);

        // Mip-major ordering with all six faces per mip, viewport halving
        // at every level.
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.mip as usize, i / 6);
            assert_eq!(step.face, i % 6);
            assert_eq!(step.extent.width, 64 >> step.mip);
            assert_eq!(step.extent.height, step.extent.width);
        }
        assert_eq!(steps.last().map(|s| s.extent.width), Some(1));
    }

    #[test]
    fn test_face_matrices_are_rotations() {
        for face in 0..6 {
            let m = face_matrix(face);
            // Pure rotation: orthonormal basis, determinant one, no
            // translation.
            assert!((m.determinant() - 1.0).abs() < 1e-5, "face {face}");
            assert!(m.w_axis.abs_diff_eq(Vec4::W, 1e-6), "face {face}");
            let x = m.x_axis.truncate();
            let y = m.y_axis.truncate();
            assert!((x.length() - 1.0).abs() < 1e-5);
            assert!(x.dot(y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_face_matrices_look_down_distinct_axes() {
        // The camera looks down -Z in view space; transforming the world
        // axes through each matrix must produce six distinct forward
        // directions.
        let forwards: Vec<Vec3> = (0..6)
            .map(|f| face_matrix(f).inverse().transform_vector3(Vec3::NEG_Z))
            .collect();
        for i in 0..6 {
            for j in (i + 1)..6 {
                assert!(
                    forwards[i].distance(forwards[j]) > 1.0,
                    "faces {i} and {j} share a direction"
                );
            }
        }
    }

    #[test]
    fn test_face_mvp_applies_projection() {
        let mvp = face_mvp(4);
        assert!(!mvp.abs_diff_eq(face_matrix(4), 1e-6));
    }
}
