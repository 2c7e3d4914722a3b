//! Vertex layout description and the unit-cube mesh.
//!
//! The cube is the only geometry the core owns: the cube bakers render it
//! from each face's point of view, and the skybox pass draws it around the
//! camera. The PBR object itself is loaded by the surrounding application.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::context::RenderContext;
use crate::error::RenderError;

/// Vertex format shared by the skybox cube and the PBR object.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Owned vertex input layout (binding + attribute descriptions).
///
/// Plain data with no Vulkan object handles, so it can be built once and
/// handed to any number of pipeline constructions.
#[derive(Debug, Clone, Default)]
pub struct VertexInputLayout {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl Vertex {
    /// Layout with position, normal and uv at locations 0..2.
    pub fn input_layout() -> VertexInputLayout {
        VertexInputLayout {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: std::mem::size_of::<Vertex>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            attributes: vec![
                vk::VertexInputAttributeDescription {
                    location: 0,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: 0,
                },
                vk::VertexInputAttributeDescription {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: 12,
                },
                vk::VertexInputAttributeDescription {
                    location: 2,
                    binding: 0,
                    format: vk::Format::R32G32_SFLOAT,
                    offset: 24,
                },
            ],
        }
    }
}

/// A host-uploaded unit cube around the origin.
pub struct CubeMesh {
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    vertex_allocation: Option<Allocation>,
    index_allocation: Option<Allocation>,
    index_count: u32,
}

impl CubeMesh {
    /// Upload the unit cube through host-visible memory.
    pub fn new(ctx: &RenderContext) -> Result<Self, RenderError> {
        let (vertices, indices) = unit_cube();

        let (vertex_buffer, vertex_allocation) = create_filled_buffer(
            ctx,
            bytemuck::cast_slice(&vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "cube vertex buffer",
        )?;
        let (index_buffer, index_allocation) = match create_filled_buffer(
            ctx,
            bytemuck::cast_slice(&indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
            "cube index buffer",
        ) {
            Ok(pair) => pair,
            Err(e) => {
                unsafe { ctx.device().destroy_buffer(vertex_buffer, None) };
                if let Err(free_err) = ctx.allocator().lock().free(vertex_allocation) {
                    log::warn!("failed to free mesh allocation: {}", free_err);
                }
                return Err(e);
            }
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_allocation: Some(vertex_allocation),
            index_allocation: Some(index_allocation),
            index_count: indices.len() as u32,
        })
    }

    /// Record the bind + indexed draw into `cmd`.
    pub fn draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, self.index_buffer, 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
        }
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Destroy buffers and return their memory. Idempotent.
    pub fn destroy(&mut self, ctx: &RenderContext) {
        let device = ctx.device();
        unsafe {
            device.destroy_buffer(self.vertex_buffer, None);
            device.destroy_buffer(self.index_buffer, None);
        }
        self.vertex_buffer = vk::Buffer::null();
        self.index_buffer = vk::Buffer::null();
        let mut allocator = ctx.allocator().lock();
        for allocation in [
            self.vertex_allocation.take(),
            self.index_allocation.take(),
        ]
        .into_iter()
        .flatten()
        {
            if let Err(e) = allocator.free(allocation) {
                log::warn!("failed to free mesh allocation: {}", e);
            }
        }
    }
}

fn create_filled_buffer(
    ctx: &RenderContext,
    data: &[u8],
    usage: vk::BufferUsageFlags,
    name: &'static str,
) -> Result<(vk::Buffer, Allocation), RenderError> {
    let device = ctx.device();

    let buffer_info = vk::BufferCreateInfo::default()
        .size(data.len() as u64)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer = unsafe { device.create_buffer(&buffer_info, None) }
        .map_err(RenderError::creation("mesh buffer"))?;

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let mut allocation = ctx
        .allocator()
        .lock()
        .allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })
        .map_err(|e| RenderError::Allocation(e.to_string()))?;

    let cleanup = |allocation: Allocation| {
        if let Err(e) = ctx.allocator().lock().free(allocation) {
            log::warn!("failed to free mesh allocation: {}", e);
        }
        unsafe { device.destroy_buffer(buffer, None) };
    };

    if let Err(result) =
        unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
    {
        cleanup(allocation);
        return Err(RenderError::ResourceCreation {
            what: "mesh buffer memory binding",
            result,
        });
    }

    let copied = match allocation.mapped_slice_mut() {
        Some(mapped) => {
            mapped[..data.len()].copy_from_slice(data);
            true
        }
        None => false,
    };
    if !copied {
        cleanup(allocation);
        return Err(RenderError::Allocation(
            "mesh buffer memory is not mappable".into(),
        ));
    }

    Ok((buffer, allocation))
}

/// 24 vertices (4 per face, outward normals) and 36 indices.
fn unit_cube() -> (Vec<Vertex>, Vec<u32>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // (normal, tangent u, tangent v) per face
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (face, (normal, u_axis, v_axis)) in faces.iter().enumerate() {
        let corners: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (u, v) in corners {
            let position = [
                normal[0] + u_axis[0] * u + v_axis[0] * v,
                normal[1] + u_axis[1] * u + v_axis[1] * v,
                normal[2] + u_axis[2] * u + v_axis[2] * v,
            ];
            vertices.push(Vertex {
                position,
                normal: *normal,
                uv: [(u + 1.0) * 0.5, (v + 1.0) * 0.5],
            });
        }
        let base = (face * 4) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_stride_and_offsets() {
        let layout = Vertex::input_layout();
        assert_eq!(layout.bindings.len(), 1);
        assert_eq!(layout.bindings[0].stride, 32);
        assert_eq!(layout.attributes.len(), 3);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn test_unit_cube_counts() {
        let (vertices, indices) = unit_cube();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn test_unit_cube_extents() {
        let (vertices, _) = unit_cube();
        for v in &vertices {
            for c in v.position {
                assert!(c.abs() <= 1.0 + f32::EPSILON);
            }
            // Every corner sits on the unit cube surface.
            assert!(v.position.iter().any(|c| (c.abs() - 1.0).abs() < 1e-6));
        }
    }
}
