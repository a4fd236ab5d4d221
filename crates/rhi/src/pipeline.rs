//! Graphics pipeline management.
//!
//! This module handles VkPipeline and VkPipelineLayout creation.
//!
//! # Overview
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout and validates push constant
//!   ranges against the device budget the engine selects for
//! - [`Pipeline`] wraps VkPipeline
//! - [`GraphicsPipelineBuilder`] provides a builder for graphics pipeline creation
//!
//! The engine feeds shaders exclusively through push constants, so a layout
//! holds no descriptor set layouts; it is push constant ranges plus defaults.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use facet_rhi::device::Device;
//! use facet_rhi::shader::{Shader, ShaderStage};
//! use facet_rhi::pipeline::{PipelineLayout, GraphicsPipelineBuilder};
//! use facet_rhi::vertex::Vertex;
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), facet_rhi::RhiError> {
//! let vertex_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/mesh.vert.spv"),
//!     ShaderStage::Vertex,
//!     "main",
//! )?;
//! let fragment_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/mesh.frag.spv"),
//!     ShaderStage::Fragment,
//!     "main",
//! )?;
//!
//! let range = vk::PushConstantRange {
//!     stage_flags: vk::ShaderStageFlags::VERTEX,
//!     offset: 0,
//!     size: 64,
//! };
//! let layout = PipelineLayout::new(device.clone(), &[range])?;
//!
//! let pipeline = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vertex_shader)
//!     .fragment_shader(&fragment_shader)
//!     .vertex_binding(Vertex::binding_description())
//!     .vertex_attributes(&Vertex::attribute_descriptions())
//!     .color_attachment_format(vk::Format::B8G8R8A8_SRGB)
//!     .depth_attachment_format(vk::Format::D32_SFLOAT)
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::physical_device::REQUIRED_PUSH_CONSTANT_BYTES;
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
///
/// A pipeline layout describes the resources a pipeline can access. Here
/// that is push constant ranges only; the ranges are validated against
/// [`REQUIRED_PUSH_CONSTANT_BYTES`], the budget every selected device is
/// guaranteed to provide.
///
/// # Thread Safety
///
/// The pipeline layout is immutable after creation and can be safely shared
/// between threads.
pub struct PipelineLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline layout handle.
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a new pipeline layout from push constant ranges.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `push_constant_ranges` - Slice of push constant ranges
    ///
    /// # Errors
    ///
    /// Returns an error if a range is empty, misaligned, or reaches past
    /// the push constant budget, or if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        if let Err(reason) = validate_push_constant_ranges(push_constant_ranges) {
            return Err(RhiError::PipelineError(reason));
        }

        let create_info =
            vk::PipelineLayoutCreateInfo::default().push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} push constant range(s)",
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Checks push constant ranges against Vulkan alignment rules and the
/// engine's device budget.
fn validate_push_constant_ranges(ranges: &[vk::PushConstantRange]) -> Result<(), String> {
    for range in ranges {
        if range.size == 0 {
            return Err("Push constant range must not be empty".to_string());
        }
        if range.offset % 4 != 0 || range.size % 4 != 0 {
            return Err(format!(
                "Push constant range offset {} and size {} must be multiples of 4",
                range.offset, range.size
            ));
        }
        let end = range.offset + range.size;
        if end > REQUIRED_PUSH_CONSTANT_BYTES {
            return Err(format!(
                "Push constant range ends at byte {} but only {} bytes are available",
                end, REQUIRED_PUSH_CONSTANT_BYTES
            ));
        }
    }
    Ok(())
}

/// Vulkan graphics pipeline wrapper.
///
/// A pipeline encapsulates the shader stages and fixed-function state
/// needed to process vertices and generate fragments.
///
/// # Thread Safety
///
/// The pipeline is immutable after creation and can be safely shared
/// between threads.
pub struct Pipeline {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline handle.
    pipeline: vk::Pipeline,
    /// Pipeline bind point.
    bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
    /// Creates a graphics pipeline from a builder configuration.
    fn create_graphics_internal(
        device: Arc<Device>,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> RhiResult<Self> {
        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[*create_info], None)
                .map_err(|(_, result)| result)?[0]
        };

        info!("Graphics pipeline created");

        Ok(Self {
            device,
            pipeline,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Returns the pipeline bind point.
    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!("Graphics pipeline destroyed");
    }
}

/// Primitive topology for input assembly.
///
/// Defines how vertices are assembled into primitives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Connected triangles with shared edges.
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Converts to Vulkan primitive topology.
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Do not cull any faces.
    None,
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles.
    #[default]
    Back,
}

impl CullMode {
    /// Converts to Vulkan cull mode flags.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise winding is front-facing.
    #[default]
    CounterClockwise,
    /// Clockwise winding is front-facing.
    Clockwise,
}

impl FrontFace {
    /// Converts to Vulkan front face.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Depth comparison operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareOp {
    /// Never passes.
    Never,
    /// Passes if less than.
    #[default]
    Less,
    /// Passes if less than or equal.
    LessOrEqual,
    /// Passes if greater than.
    Greater,
    /// Passes if greater than or equal.
    GreaterOrEqual,
    /// Always passes.
    Always,
}

impl CompareOp {
    /// Converts to Vulkan compare op.
    pub fn to_vk(self) -> vk::CompareOp {
        match self {
            CompareOp::Never => vk::CompareOp::NEVER,
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk::CompareOp::GREATER,
            CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

/// Builder for creating graphics pipelines.
///
/// Configures the state the engine draws with and leaves the rest at
/// fixed defaults:
///
/// - Primitive topology: Triangle list
/// - Polygon mode: Fill
/// - Cull mode: Back-face culling
/// - Front face: Counter-clockwise
/// - Depth test and write: Enabled when a depth format is set
/// - Depth compare op: Less
/// - Multisampling: 1 sample (no MSAA)
/// - Blending: Disabled, RGBA write mask
/// - Dynamic states: Viewport and Scissor
#[derive(Default)]
pub struct GraphicsPipelineBuilder<'a> {
    // Shader stages
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,

    // Vertex input state
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,

    // Input assembly state
    topology: PrimitiveTopology,

    // Rasterization state
    cull_mode: CullMode,
    front_face: FrontFace,

    // Depth state
    depth_test_enable: bool,
    depth_write_enable: bool,
    depth_compare_op: CompareOp,

    // Dynamic rendering
    color_attachment_formats: Vec<vk::Format>,
    depth_attachment_format: Option<vk::Format>,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Creates a new graphics pipeline builder with default settings.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
            color_attachment_formats: Vec::new(),
            depth_attachment_format: None,
        }
    }

    /// Sets the vertex shader.
    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    /// Sets the fragment shader.
    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Adds a vertex input binding description.
    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    /// Adds vertex input attribute descriptions.
    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    /// Sets the primitive topology.
    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Sets the face culling mode.
    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Sets the front face winding order.
    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Enables or disables depth testing.
    pub fn depth_test_enable(mut self, enable: bool) -> Self {
        self.depth_test_enable = enable;
        self
    }

    /// Enables or disables depth writing.
    pub fn depth_write_enable(mut self, enable: bool) -> Self {
        self.depth_write_enable = enable;
        self
    }

    /// Sets the depth comparison operation.
    pub fn depth_compare_op(mut self, op: CompareOp) -> Self {
        self.depth_compare_op = op;
        self
    }

    /// Adds a color attachment format for dynamic rendering.
    pub fn color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_attachment_formats.push(format);
        self
    }

    /// Sets the depth attachment format for dynamic rendering.
    pub fn depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_attachment_format = Some(format);
        self
    }

    /// Builds the graphics pipeline.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `layout` - The pipeline layout
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Vertex shader is not set
    /// - Fragment shader is not set
    /// - No color attachment formats are specified
    /// - Pipeline creation fails
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        // Validate required fields
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("Vertex shader is required".to_string()))?;

        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("Fragment shader is required".to_string()))?;

        if self.color_attachment_formats.is_empty() {
            return Err(RhiError::PipelineError(
                "At least one color attachment format is required".to_string(),
            ));
        }

        // Create shader stage infos
        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        // Vertex input state
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        // Input assembly state
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology.to_vk())
            .primitive_restart_enable(false);

        // Viewport state (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        // Rasterization state
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk())
            .depth_bias_enable(false);

        // Multisample state
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Depth state
        let has_depth = self.depth_attachment_format.is_some();
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth && self.depth_test_enable)
            .depth_write_enable(has_depth && self.depth_write_enable)
            .depth_compare_op(self.depth_compare_op.to_vk())
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // One opaque attachment state per color format
        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = self
            .color_attachment_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        // Dynamic state
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        // Dynamic rendering info (Vulkan 1.3)
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&self.color_attachment_formats);

        if let Some(depth_format) = self.depth_attachment_format {
            rendering_info = rendering_info.depth_attachment_format(depth_format);
        }

        // Create pipeline
        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        Pipeline::create_graphics_internal(device, &pipeline_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_topology_to_vk() {
        assert_eq!(
            PrimitiveTopology::PointList.to_vk(),
            vk::PrimitiveTopology::POINT_LIST
        );
        assert_eq!(
            PrimitiveTopology::LineList.to_vk(),
            vk::PrimitiveTopology::LINE_LIST
        );
        assert_eq!(
            PrimitiveTopology::TriangleList.to_vk(),
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert_eq!(
            PrimitiveTopology::TriangleStrip.to_vk(),
            vk::PrimitiveTopology::TRIANGLE_STRIP
        );
    }

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
    }

    #[test]
    fn test_front_face_to_vk() {
        assert_eq!(
            FrontFace::CounterClockwise.to_vk(),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
    }

    #[test]
    fn test_compare_op_to_vk() {
        assert_eq!(CompareOp::Never.to_vk(), vk::CompareOp::NEVER);
        assert_eq!(CompareOp::Less.to_vk(), vk::CompareOp::LESS);
        assert_eq!(CompareOp::LessOrEqual.to_vk(), vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(CompareOp::Greater.to_vk(), vk::CompareOp::GREATER);
        assert_eq!(
            CompareOp::GreaterOrEqual.to_vk(),
            vk::CompareOp::GREATER_OR_EQUAL
        );
        assert_eq!(CompareOp::Always.to_vk(), vk::CompareOp::ALWAYS);
    }

    #[test]
    fn test_graphics_pipeline_builder_default() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert!(builder.vertex_bindings.is_empty());
        assert!(builder.vertex_attributes.is_empty());
        assert_eq!(builder.topology, PrimitiveTopology::TriangleList);
        assert_eq!(builder.cull_mode, CullMode::Back);
        assert_eq!(builder.front_face, FrontFace::CounterClockwise);
        assert!(builder.depth_test_enable);
        assert!(builder.depth_write_enable);
        assert_eq!(builder.depth_compare_op, CompareOp::Less);
    }

    #[test]
    fn test_graphics_pipeline_builder_overrides() {
        let builder = GraphicsPipelineBuilder::new()
            .topology(PrimitiveTopology::LineList)
            .cull_mode(CullMode::None)
            .front_face(FrontFace::Clockwise)
            .depth_test_enable(false);
        assert_eq!(builder.topology, PrimitiveTopology::LineList);
        assert_eq!(builder.cull_mode, CullMode::None);
        assert_eq!(builder.front_face, FrontFace::Clockwise);
        assert!(!builder.depth_test_enable);
    }

    #[test]
    fn test_push_constant_ranges_within_budget() {
        let ranges = [
            vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: 192,
            },
            vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                offset: 192,
                size: 64,
            },
        ];
        assert!(validate_push_constant_ranges(&ranges).is_ok());
    }

    #[test]
    fn test_push_constant_range_over_budget_rejected() {
        let ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 128,
            size: REQUIRED_PUSH_CONSTANT_BYTES,
        }];
        assert!(validate_push_constant_ranges(&ranges).is_err());
    }

    #[test]
    fn test_push_constant_range_alignment_rules() {
        let misaligned = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 2,
            size: 64,
        }];
        assert!(validate_push_constant_ranges(&misaligned).is_err());

        let empty = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: 0,
        }];
        assert!(validate_push_constant_ranges(&empty).is_err());
    }
}
