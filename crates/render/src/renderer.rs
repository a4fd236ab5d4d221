//! Main renderer orchestration.
//!
//! This module provides the main [`Renderer`] struct that coordinates
//! all Vulkan resources and drives the frame lifecycle: acquire a back
//! buffer, record and submit through the command queue, present, and pace
//! the CPU against the queue's timeline.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::time::Duration;

use ash::vk;
use glam::{Mat4, Vec3};
use tracing::{debug, error, info, warn};

use facet_core::FrameStats;
use facet_platform::{Surface, Window};
use facet_resources::Model;
use facet_rhi::attachments::{AttachmentKind, AttachmentTable};
use facet_rhi::buffer::{Buffer, BufferUsage};
use facet_rhi::command::CommandBuffer;
use facet_rhi::device::Device;
use facet_rhi::instance::Instance;
use facet_rhi::physical_device::select_physical_device;
use facet_rhi::pipeline::{FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use facet_rhi::queue::CommandQueue;
use facet_rhi::shader::{Shader, ShaderStage};
use facet_rhi::swapchain::{Swapchain, plan_resize};
use facet_rhi::sync::Semaphore;
use facet_rhi::upload::{ResourceUploader, UploadRequest};
use facet_rhi::vertex::Vertex;
use facet_rhi::{RhiError, RhiResult};
use facet_scene::Camera;

use crate::constants::{MvpConstants, PASS_CONSTANTS_OFFSET, PassConstants, push_constant_ranges};
use crate::depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};

/// Background clear color (dark blue-gray).
const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

/// World position of the point light.
const LIGHT_POSITION: Vec3 = Vec3::new(-2.0, 2.0, 2.0);

/// Light color.
const LIGHT_COLOR: Vec3 = Vec3::ONE;

/// Light intensity multiplier.
const LIGHT_INTENSITY: f32 = 5.0;

/// Ambient lighting color.
const AMBIENT_COLOR: Vec3 = Vec3::splat(0.5);

/// Blinn-Phong specular exponent.
const SPECULAR_POWER: f32 = 128.0;

/// Spin rate of the model around the Y axis (90 degrees per second).
const SPIN_RADIANS_PER_SEC: f32 = std::f32::consts::FRAC_PI_2;

/// Compiled shader locations, relative to the working directory.
const VERTEX_SHADER_PATH: &str = "shaders/spirv/mesh.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/spirv/mesh.frag.spv";

/// Per-back-buffer binary semaphores for the acquire/present boundary.
struct FrameSync {
    /// Signaled when the back buffer is ready to be rendered to.
    image_available: Semaphore,
    /// Signaled when rendering to the back buffer has finished.
    render_finished: Semaphore,
}

/// Mesh GPU resources.
struct MeshGpuData {
    /// Vertex buffer for this mesh.
    vertex_buffer: Buffer,
    /// Index buffer for this mesh.
    index_buffer: Buffer,
    /// Number of indices.
    index_count: u32,
}

/// Main renderer that manages all Vulkan resources.
///
/// # Frame Pacing
///
/// Every submission signals the command queue's timeline, and the value it
/// signed is remembered per back buffer. Before rendering into a back buffer
/// again the renderer waits for that buffer's previous value, so the CPU
/// never runs more than the swap chain's image count of frames ahead and
/// per-buffer resources are free for reuse the moment the wait returns.
///
/// # Resource Destruction Order
///
/// Vulkan resources must be destroyed in the correct order:
/// 1. Flush the command queue and wait for presentation to settle
/// 2. Destroy per-buffer semaphores and mesh buffers
/// 3. Destroy pipeline resources
/// 4. Destroy depth buffer and attachment tables
/// 5. Destroy swapchain
/// 6. Destroy the command queue and uploader
/// 7. Destroy surface
/// 8. Destroy device
/// 9. Destroy instance
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct Renderer {
    // Core Vulkan resources (in reverse destruction order)
    /// Vulkan instance (destroyed last).
    instance: ManuallyDrop<Instance>,
    /// Logical device (destroyed after every resource, before the instance).
    device: ManuallyDrop<std::sync::Arc<Device>>,
    /// Window surface (destroyed after swapchain, before device).
    surface: ManuallyDrop<Surface>,
    /// Command queue with the engine's timeline.
    queue: ManuallyDrop<CommandQueue>,
    /// Staging upload tracker.
    uploader: ManuallyDrop<ResourceUploader>,
    /// Swapchain (destroyed after the attachment tables).
    swapchain: ManuallyDrop<Swapchain>,
    /// Color views of the swapchain images, addressed by back-buffer index.
    back_buffers: ManuallyDrop<AttachmentTable>,
    /// Depth view, slot 0.
    depth_attachments: ManuallyDrop<AttachmentTable>,
    /// Depth buffer sized to the swapchain.
    depth_buffer: ManuallyDrop<DepthBuffer>,

    // Pipeline resources
    /// Mesh graphics pipeline with depth testing.
    mesh_pipeline: ManuallyDrop<Pipeline>,
    /// Mesh pipeline layout (push constants only).
    mesh_pipeline_layout: ManuallyDrop<PipelineLayout>,

    // Model resources
    /// GPU data for each mesh in the model.
    mesh_gpu_data: Vec<MeshGpuData>,
    /// Static transform centering and scaling the model into view.
    base_transform: Mat4,

    // Frame pacing
    /// Per-back-buffer acquire/present semaphores.
    frame_sync: Vec<FrameSync>,
    /// Timeline value signed the last time each back buffer was rendered.
    submitted_values: Vec<u64>,
    /// Next acquire semaphore to use (cycles through the back buffers).
    current_sync: usize,

    // Scene state
    /// Main camera.
    camera: Camera,
    /// Accumulated spin angle in radians.
    spin_angle: f32,
    /// Rolling frames-per-second counter.
    stats: FrameStats,

    // Deferred swapchain changes, applied before the next acquire
    /// Resize the swapchain to this extent.
    pending_resize: Option<vk::Extent2D>,
    /// Switch the swapchain to this vsync mode.
    pending_vsync: Option<bool>,
}

impl Renderer {
    /// Creates a new renderer for the given window.
    ///
    /// This initializes all Vulkan resources and uploads the model's meshes
    /// to device-local memory.
    ///
    /// # Arguments
    ///
    /// * `window` - The window to render to
    /// * `model` - The model to draw
    /// * `vsync` - Whether presentation waits for vertical sync
    /// * `prefer_software` - Prefer a software (CPU) device over dedicated
    ///   hardware
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan resource creation fails.
    pub fn new(
        window: &Window,
        model: &Model,
        vsync: bool,
        prefer_software: bool,
    ) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing Vulkan renderer ({}x{})", width, height);

        // Create Vulkan instance with validation in debug builds
        let enable_validation = cfg!(debug_assertions);
        let instance = Instance::new(enable_validation)?;

        // Create surface
        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        // Select physical device
        let physical_device_info = select_physical_device(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            prefer_software,
        )?;

        // Create logical device
        let device = Device::new(&instance, &physical_device_info)?;

        // Create the command queue and its timeline
        let mut queue = CommandQueue::new(device.clone())?;
        let mut uploader = ResourceUploader::new(device.clone());

        // Create swapchain
        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            vsync,
        )?;

        // Publish back-buffer views, one slot per swapchain image
        let image_count = swapchain.image_count() as usize;
        let mut back_buffers =
            AttachmentTable::new(device.clone(), AttachmentKind::Color, image_count)?;
        swapchain.update_attachment_table(&mut back_buffers)?;

        // Create depth buffer and publish its view to slot 0
        let mut depth_attachments = AttachmentTable::new(device.clone(), AttachmentKind::Depth, 1)?;
        let depth_buffer =
            DepthBuffer::with_default_format(device.clone(), swapchain.width(), swapchain.height())?;
        depth_buffer.update_attachment_table(&mut depth_attachments)?;

        // Create mesh pipeline
        let (mesh_pipeline, mesh_pipeline_layout) =
            Self::create_mesh_pipeline(device.clone(), swapchain.format())?;

        // Upload mesh data through staging buffers
        let mesh_gpu_data = Self::upload_model(&mut uploader, &mut queue, model)?;
        let base_transform = fit_transform(model.aabb_min, model.aabb_max);

        // Per-back-buffer semaphores and pacing values
        let frame_sync = Self::create_frame_sync(&device, image_count)?;
        let submitted_values = vec![0; image_count];

        // Initialize camera
        let mut camera = Camera::new();
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.set_perspective(
            45.0_f32.to_radians(),
            swapchain.width() as f32 / swapchain.height() as f32,
            0.1,
            100.0,
        );

        info!(
            "Renderer initialized: {} back buffers, vsync {}, {} meshes uploaded",
            image_count,
            vsync,
            mesh_gpu_data.len()
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            queue: ManuallyDrop::new(queue),
            uploader: ManuallyDrop::new(uploader),
            swapchain: ManuallyDrop::new(swapchain),
            back_buffers: ManuallyDrop::new(back_buffers),
            depth_attachments: ManuallyDrop::new(depth_attachments),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            mesh_pipeline: ManuallyDrop::new(mesh_pipeline),
            mesh_pipeline_layout: ManuallyDrop::new(mesh_pipeline_layout),
            mesh_gpu_data,
            base_transform,
            frame_sync,
            submitted_values,
            current_sync: 0,
            camera,
            spin_angle: 0.0,
            stats: FrameStats::new(),
            pending_resize: None,
            pending_vsync: None,
        })
    }

    /// Creates per-back-buffer semaphores.
    fn create_frame_sync(
        device: &std::sync::Arc<Device>,
        count: usize,
    ) -> RhiResult<Vec<FrameSync>> {
        let mut sync = Vec::with_capacity(count);
        for i in 0..count {
            sync.push(FrameSync {
                image_available: Semaphore::new(device.clone())?,
                render_finished: Semaphore::new(device.clone())?,
            });
            debug!("Created frame sync for back buffer {}", i);
        }
        Ok(sync)
    }

    /// Creates the mesh rendering pipeline with depth testing.
    fn create_mesh_pipeline(
        device: std::sync::Arc<Device>,
        swapchain_format: vk::Format,
    ) -> RhiResult<(Pipeline, PipelineLayout)> {
        // Load shaders
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(VERTEX_SHADER_PATH),
            ShaderStage::Vertex,
            "main",
        )?;

        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(FRAGMENT_SHADER_PATH),
            ShaderStage::Fragment,
            "main",
        )?;

        // Push constants carry all shader data, so the layout has no sets
        let pipeline_layout = PipelineLayout::new(device.clone(), &push_constant_ranges())?;

        // The projection flips Y for Vulkan, which mirrors the winding, so
        // counter-clockwise meshes arrive clockwise at the rasterizer.
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .color_attachment_format(swapchain_format)
            .depth_attachment_format(DEFAULT_DEPTH_FORMAT)
            .front_face(FrontFace::Clockwise)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .build(device, &pipeline_layout)?;

        info!("Mesh pipeline created with depth testing");

        Ok((pipeline, pipeline_layout))
    }

    /// Uploads every mesh of `model` to device-local buffers in one batch.
    fn upload_model(
        uploader: &mut ResourceUploader,
        queue: &mut CommandQueue,
        model: &Model,
    ) -> RhiResult<Vec<MeshGpuData>> {
        // Interleave the attribute streams into the pipeline's vertex format
        let interleaved: Vec<Vec<Vertex>> = model
            .meshes
            .iter()
            .map(|mesh| {
                (0..mesh.positions.len())
                    .map(|i| Vertex::new(mesh.positions[i], mesh.normals[i]))
                    .collect()
            })
            .collect();

        let mut requests = Vec::with_capacity(model.meshes.len() * 2);
        for (vertices, mesh) in interleaved.iter().zip(&model.meshes) {
            requests.push(UploadRequest {
                usage: BufferUsage::Vertex,
                data: bytemuck::cast_slice(vertices),
            });
            requests.push(UploadRequest {
                usage: BufferUsage::Index,
                data: bytemuck::cast_slice(&mesh.indices),
            });
        }

        let mut buffers = uploader.upload_buffers(queue, &requests)?.into_iter();

        let mut mesh_gpu_data = Vec::with_capacity(model.meshes.len());
        for mesh in &model.meshes {
            let vertex_buffer = buffers.next().ok_or_else(|| {
                RhiError::InvalidHandle("upload returned fewer buffers than requested".to_string())
            })?;
            let index_buffer = buffers.next().ok_or_else(|| {
                RhiError::InvalidHandle("upload returned fewer buffers than requested".to_string())
            })?;

            mesh_gpu_data.push(MeshGpuData {
                vertex_buffer,
                index_buffer,
                index_count: mesh.index_count() as u32,
            });
        }

        debug!(
            "Uploaded {} mesh(es), {} staging buffer(s) pending",
            mesh_gpu_data.len(),
            uploader.pending_staging_buffers()
        );

        Ok(mesh_gpu_data)
    }

    /// Advances animation time and records a finished frame.
    ///
    /// Returns a frames-per-second sample when one completes, about once a
    /// second.
    pub fn update(&mut self, delta: Duration) -> Option<f32> {
        self.spin_angle =
            (self.spin_angle + SPIN_RADIANS_PER_SEC * delta.as_secs_f32()) % std::f32::consts::TAU;
        self.stats.record_frame(delta)
    }

    /// Notifies the renderer that the window has been resized.
    ///
    /// The swapchain is recreated on the next frame. Resizing to the current
    /// size cancels any queued resize instead.
    pub fn resize(&mut self, width: u32, height: u32) {
        match plan_resize(self.swapchain.extent(), width, height) {
            Some(extent) => {
                debug!(
                    "Resize queued: {}x{} -> {}x{}",
                    self.swapchain.width(),
                    self.swapchain.height(),
                    extent.width,
                    extent.height
                );
                self.pending_resize = Some(extent);
            }
            None => {
                self.pending_resize = None;
                debug!("Ignoring resize to the current size");
            }
        }
    }

    /// Returns the vsync state the next presented frame will use.
    pub fn is_vsync(&self) -> bool {
        self.pending_vsync.unwrap_or_else(|| self.swapchain.is_vsync())
    }

    /// Requests a vsync mode, recreating the swapchain on the next frame.
    ///
    /// Requesting the mode already in effect cancels any queued switch.
    pub fn set_vsync(&mut self, enabled: bool) {
        if enabled == self.swapchain.is_vsync() {
            self.pending_vsync = None;
        } else {
            debug!("Vsync switch queued: {}", enabled);
            self.pending_vsync = Some(enabled);
        }
    }

    /// Flips the vsync mode and returns the state that will take effect.
    pub fn toggle_vsync(&mut self) -> bool {
        let target = !self.is_vsync();
        self.set_vsync(target);
        target
    }

    /// Renders a frame.
    ///
    /// Applies any queued resize or vsync switch, acquires a back buffer,
    /// records and submits the frame, and presents it. A swapchain reported
    /// out of date or suboptimal is recreated and the frame skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan operation fails.
    pub fn render_frame(&mut self) -> RhiResult<()> {
        if self.pending_resize.is_some() || self.pending_vsync.is_some() {
            debug!("Swapchain change queued, recreating before acquire");
            self.recreate_swapchain()?;
        }

        // Acquire the next back buffer
        let acquire_semaphore = self.frame_sync[self.current_sync].image_available.handle();
        let (image_index, _suboptimal) = match self.swapchain.acquire_next_image(acquire_semaphore)
        {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date, recreating");
                self.recreate_swapchain()?;
                return Ok(());
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        };
        let image = image_index as usize;

        // Pace against this back buffer's previous frame
        self.queue.wait_for_value(self.submitted_values[image])?;

        // Staging buffers from completed uploads can go now
        self.uploader.reclaim(&self.queue)?;

        // Record the frame
        let list = self.queue.command_list()?;
        self.record_frame(list.commands(), image)?;

        // Submit, waiting on the acquire and signaling for presentation
        let render_finished = self.frame_sync[image].render_finished.handle();
        let value = self.queue.execute_with_semaphores(
            list,
            Some((
                acquire_semaphore,
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            )),
            Some(render_finished),
        )?;
        self.submitted_values[image] = value;

        // Present
        let present_result =
            self.swapchain
                .present(self.device.present_queue(), image_index, render_finished);

        // Advance the acquire semaphore cycle
        self.current_sync = (self.current_sync + 1) % self.frame_sync.len();

        let should_recreate = match present_result {
            Ok(suboptimal) => {
                if suboptimal {
                    debug!("Present returned suboptimal=true");
                }
                suboptimal
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Present returned ERROR_OUT_OF_DATE_KHR");
                true
            }
            Err(vk::Result::SUBOPTIMAL_KHR) => {
                debug!("Present returned SUBOPTIMAL_KHR");
                true
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        };

        if should_recreate {
            debug!("Swapchain needs recreation, recreating");
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Records the commands for one frame into `cmd`.
    fn record_frame(&self, cmd: &CommandBuffer, image: usize) -> RhiResult<()> {
        // Move the back buffer and depth image into attachment layouts
        Self::transition_image_layout(
            cmd,
            self.swapchain.image(image),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        Self::transition_image_layout(
            cmd,
            self.depth_buffer.image(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::DEPTH,
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.back_buffers.view(image)?)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            });

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_attachments.view(0)?)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);

        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.swapchain.width() as f32,
            height: self.swapchain.height() as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.swapchain.extent(),
        });

        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.mesh_pipeline.handle());

        // Push the frame's constants
        let mvp = MvpConstants::new(
            self.model_matrix(),
            self.camera.view_matrix(),
            self.camera.projection_matrix(),
        );
        let pass = PassConstants::new(
            LIGHT_POSITION,
            self.camera.position,
            AMBIENT_COLOR,
            LIGHT_INTENSITY,
            LIGHT_COLOR,
            SPECULAR_POWER,
        );
        let layout = self.mesh_pipeline_layout.handle();
        cmd.push_constants_bytes(layout, vk::ShaderStageFlags::VERTEX, 0, bytemuck::bytes_of(&mvp));
        cmd.push_constants_bytes(
            layout,
            vk::ShaderStageFlags::FRAGMENT,
            PASS_CONSTANTS_OFFSET,
            bytemuck::bytes_of(&pass),
        );

        // Draw all meshes
        for mesh in &self.mesh_gpu_data {
            cmd.bind_vertex_buffers(0, &[mesh.vertex_buffer.handle()], &[0]);
            cmd.bind_index_buffer(mesh.index_buffer.handle(), 0, vk::IndexType::UINT32);
            cmd.draw_indexed(mesh.index_count, 1, 0, 0, 0);
        }

        cmd.end_rendering();

        // Hand the back buffer to the presentation engine
        Self::transition_image_layout(
            cmd,
            self.swapchain.image(image),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        );

        Ok(())
    }

    /// The model's transform for this frame: fit into view, then spin.
    fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.spin_angle) * self.base_transform
    }

    /// Recreates the swapchain and everything sized to it.
    ///
    /// Consumes any queued resize or vsync switch; with neither queued the
    /// swapchain is recreated at its current size, which refreshes it after
    /// an out-of-date or suboptimal report.
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        // Nothing may reference the old back buffers or depth view once the
        // flush returns
        self.uploader.flush(&mut self.queue)?;

        let extent = self
            .pending_resize
            .take()
            .unwrap_or_else(|| self.swapchain.extent());
        let vsync = self
            .pending_vsync
            .take()
            .unwrap_or_else(|| self.swapchain.is_vsync());

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            extent.width,
            extent.height,
            vsync,
        )?;

        // Republish back-buffer views; grow the table if the image count did
        let image_count = self.swapchain.image_count() as usize;
        if image_count > self.back_buffers.capacity() {
            let table = AttachmentTable::new(
                (*self.device).clone(),
                AttachmentKind::Color,
                image_count,
            )?;
            unsafe { ManuallyDrop::drop(&mut self.back_buffers) };
            self.back_buffers = ManuallyDrop::new(table);
        } else {
            self.back_buffers.clear();
        }
        self.swapchain.update_attachment_table(&mut self.back_buffers)?;

        // Rebuild the depth buffer at the new extent
        let depth_buffer = DepthBuffer::with_default_format(
            (*self.device).clone(),
            self.swapchain.width(),
            self.swapchain.height(),
        )?;
        unsafe { ManuallyDrop::drop(&mut self.depth_buffer) };
        self.depth_buffer = ManuallyDrop::new(depth_buffer);
        self.depth_buffer
            .update_attachment_table(&mut self.depth_attachments)?;

        // Fresh semaphores and pacing values for the new back buffers
        self.frame_sync = Self::create_frame_sync(&self.device, image_count)?;
        self.submitted_values = vec![0; image_count];
        self.current_sync = 0;

        // Keep the projection in step with the surface
        self.camera
            .set_aspect(self.swapchain.width() as f32 / self.swapchain.height() as f32);

        info!(
            "Swapchain recreated: {}x{}, {} back buffers, vsync {}",
            self.swapchain.width(),
            self.swapchain.height(),
            image_count,
            self.swapchain.is_vsync()
        );
        Ok(())
    }

    /// Records an image layout transition.
    fn transition_image_layout(
        cmd: &CommandBuffer,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        aspect_mask: vk::ImageAspectFlags,
    ) {
        let (src_stage, src_access, dst_stage, dst_access) =
            transition_masks(old_layout, new_layout);

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        cmd.pipeline_barrier(src_stage, dst_stage, &[barrier]);
    }

    /// Returns the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Returns the swapchain format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }
}

/// Stage and access masks for the layout transitions the frame loop records.
fn transition_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> (
    vk::PipelineStageFlags,
    vk::AccessFlags,
    vk::PipelineStageFlags,
    vk::AccessFlags,
) {
    match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL) => (
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL) => (
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR) => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::AccessFlags::empty(),
        ),
        _ => {
            warn!(
                "Unhandled layout transition: {:?} -> {:?}",
                old_layout, new_layout
            );
            (
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            )
        }
    }
}

/// Transform that centers a model's bounds on the origin and scales its
/// largest dimension to 2 units.
fn fit_transform(aabb_min: Vec3, aabb_max: Vec3) -> Mat4 {
    let center = (aabb_min + aabb_max) * 0.5;
    let size = aabb_max - aabb_min;
    let scale_factor = 2.0 / size.max_element().max(0.001);
    Mat4::from_scale(Vec3::splat(scale_factor)) * Mat4::from_translation(-center)
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Drain the queue and the presentation engine before tearing down
        if let Err(e) = self.uploader.flush(&mut self.queue) {
            error!("Failed to flush command queue during renderer drop: {:?}", e);
        }
        if let Err(e) = self.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        // Semaphores and mesh buffers clean themselves up
        self.frame_sync.clear();
        self.mesh_gpu_data.clear();

        // Manually drop resources in correct order
        unsafe {
            ManuallyDrop::drop(&mut self.mesh_pipeline);
            ManuallyDrop::drop(&mut self.mesh_pipeline_layout);
            ManuallyDrop::drop(&mut self.depth_buffer);
            ManuallyDrop::drop(&mut self.depth_attachments);
            ManuallyDrop::drop(&mut self.back_buffers);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.uploader);
            ManuallyDrop::drop(&mut self.queue);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_transform_centers_and_scales_to_two_units() {
        let transform = fit_transform(Vec3::new(1.0, 1.0, 1.0), Vec3::new(5.0, 3.0, 2.0));

        // The center of the box lands on the origin
        let center = transform.transform_point3(Vec3::new(3.0, 2.0, 1.5));
        assert!(center.abs_diff_eq(Vec3::ZERO, 1e-6));

        // The largest dimension (x, 4 units) spans exactly 2 units
        let lo = transform.transform_point3(Vec3::new(1.0, 2.0, 1.5));
        let hi = transform.transform_point3(Vec3::new(5.0, 2.0, 1.5));
        assert!((hi.x - lo.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn fit_transform_survives_degenerate_bounds() {
        let transform = fit_transform(Vec3::ZERO, Vec3::ZERO);
        let moved = transform.transform_point3(Vec3::ZERO);
        assert!(moved.is_finite());
    }

    #[test]
    fn color_attachment_transition_masks() {
        let (src_stage, src_access, dst_stage, dst_access) = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(src_access, vk::AccessFlags::empty());
        assert_eq!(dst_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dst_access, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn depth_attachment_transition_masks() {
        let (_, _, dst_stage, dst_access) = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );
        assert_eq!(dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
        assert_eq!(dst_access, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);
    }

    #[test]
    fn present_transition_releases_color_writes() {
        let (src_stage, src_access, dst_stage, _) = transition_masks(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        assert_eq!(src_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(src_access, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(dst_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
    }

    #[test]
    fn unknown_transition_falls_back_to_full_barrier() {
        let (src_stage, _, dst_stage, dst_access) = transition_masks(
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert_eq!(src_stage, vk::PipelineStageFlags::ALL_COMMANDS);
        assert_eq!(dst_stage, vk::PipelineStageFlags::ALL_COMMANDS);
        assert!(dst_access.contains(vk::AccessFlags::MEMORY_WRITE));
    }
}
